//! Concurrent registry of admitted connections and their last reported state
//!
//! Entries live in a sharded map, so a session updating its own entry only
//! contends with sessions hashed to the same shard, and a snapshot walks the
//! shards one at a time instead of freezing the whole map. Each entry is
//! replaced whole under its shard lock; readers never see a torn state.
//!
//! `update` never inserts. Once `remove` has run for a handle, a late update
//! from the same session fails with [`RegistryError::UnknownConnection`] and
//! cannot bring the entry back.

use crate::broadcast::Outbox;
use crate::error::RegistryError;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use rand::Rng;
use shared::{ClientId, ClientState, MAX_CLIENT_ID};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Random draws before falling back to a linear search for a free id
const RANDOM_ID_ATTEMPTS: usize = 32;

/// Identity of one live connection. Handles are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionHandle(u64);

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

#[derive(Debug)]
struct Slot {
    state: ClientState,
    outbox: Outbox,
}

/// A registered connection as seen by the broadcaster.
#[derive(Debug, Clone)]
pub struct Peer {
    pub handle: ConnectionHandle,
    pub state: ClientState,
    pub outbox: Outbox,
}

pub struct ConnectionRegistry {
    entries: DashMap<ConnectionHandle, Slot>,
    /// Ids of registered and still-bootstrapping connections
    issued_ids: DashSet<ClientId>,
    next_handle: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            issued_ids: DashSet::new(),
            next_handle: AtomicU64::new(1),
        }
    }

    pub fn allocate_handle(&self) -> ConnectionHandle {
        ConnectionHandle(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    /// Picks an unused client id in `1..=MAX_CLIENT_ID`.
    ///
    /// Returns `None` when every id is taken. The id stays reserved until
    /// [`release_id`](Self::release_id) or the removal of the entry that
    /// carries it.
    pub fn reserve_id(&self) -> Option<ClientId> {
        if self.issued_ids.len() >= MAX_CLIENT_ID as usize {
            return None;
        }

        let mut rng = rand::thread_rng();
        for _ in 0..RANDOM_ID_ATTEMPTS {
            let id = rng.gen_range(1..=MAX_CLIENT_ID);
            if self.issued_ids.insert(id) {
                return Some(id);
            }
        }

        (1..=MAX_CLIENT_ID).find(|id| self.issued_ids.insert(*id))
    }

    pub fn release_id(&self, id: ClientId) {
        self.issued_ids.remove(&id);
    }

    pub fn register(
        &self,
        handle: ConnectionHandle,
        initial: ClientState,
        outbox: Outbox,
    ) -> Result<(), RegistryError> {
        match self.entries.entry(handle) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyRegistered(handle)),
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    state: initial,
                    outbox,
                });
                Ok(())
            }
        }
    }

    pub fn update(&self, handle: ConnectionHandle, state: ClientState) -> Result<(), RegistryError> {
        match self.entries.get_mut(&handle) {
            Some(mut slot) => {
                slot.state = state;
                Ok(())
            }
            None => Err(RegistryError::UnknownConnection(handle)),
        }
    }

    /// Removes the entry and frees its client id. Removing twice is harmless.
    pub fn remove(&self, handle: ConnectionHandle) -> Option<ClientState> {
        let (_, slot) = self.entries.remove(&handle)?;
        self.issued_ids.remove(&slot.state.id);
        Some(slot.state)
    }

    /// Point-in-time copy of every entry, ordered by handle.
    pub fn snapshot(&self) -> Vec<(ConnectionHandle, ClientState)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|entry| (*entry.key(), entry.value().state))
            .collect();
        entries.sort_by_key(|(handle, _)| *handle);
        entries
    }

    /// Like [`snapshot`](Self::snapshot) but with each connection's outbox.
    pub fn peers(&self) -> Vec<Peer> {
        let mut peers: Vec<_> = self
            .entries
            .iter()
            .map(|entry| Peer {
                handle: *entry.key(),
                state: entry.value().state,
                outbox: entry.value().outbox.clone(),
            })
            .collect();
        peers.sort_by_key(|peer| peer.handle);
        peers
    }

    pub fn state(&self, handle: ConnectionHandle) -> Option<ClientState> {
        self.entries.get(&handle).map(|slot| slot.state)
    }

    pub fn outbox(&self, handle: ConnectionHandle) -> Option<Outbox> {
        self.entries.get(&handle).map(|slot| slot.outbox.clone())
    }

    pub fn contains(&self, handle: ConnectionHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
