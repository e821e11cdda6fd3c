//! Fixed-rate world broadcast
//!
//! Every tick the broadcaster copies the registry, encodes the world once and
//! hands the same frame to every connection's outbox without waiting. Writing
//! to the socket is left to each connection's writer task, so one slow peer
//! can neither hold back the others nor delay the next tick.

use crate::error::DeliveryFailure;
use crate::registry::ConnectionRegistry;
use log::{debug, info, warn};
use shared::codec::encode_snapshot;
use shared::frame::encode_frame;
use shared::{ClientState, EncodeError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// How often per-tick statistics are logged
const STATS_EVERY_TICKS: u64 = 100;

/// An encoded, length-prefixed broadcast shared by all recipients.
pub type Frame = Arc<[u8]>;

/// Bounded queue of frames waiting to be written to one connection.
///
/// Cloned into the registry entry; the receiving end belongs to the
/// connection's writer task.
#[derive(Debug, Clone)]
pub struct Outbox {
    frames: mpsc::Sender<Frame>,
    evict: CancellationToken,
}

impl Outbox {
    /// `evict` is cancelled when the connection has to be dropped.
    pub fn new(capacity: usize, evict: CancellationToken) -> (Self, mpsc::Receiver<Frame>) {
        let (frames, receiver) = mpsc::channel(capacity);
        (Self { frames, evict }, receiver)
    }

    pub fn deliver(&self, frame: &Frame) -> Result<(), DeliveryFailure> {
        self.frames
            .try_send(Arc::clone(frame))
            .map_err(|e| match e {
                TrySendError::Full(_) => DeliveryFailure::Stalled,
                TrySendError::Closed(_) => DeliveryFailure::Closed,
            })
    }

    /// Marks the connection for removal. Its session does the removing.
    pub fn evict(&self) {
        self.evict.cancel();
    }

    pub fn is_evicted(&self) -> bool {
        self.evict.is_cancelled()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub recipients: usize,
    pub failures: usize,
    pub payload_len: usize,
}

pub struct TickBroadcaster {
    registry: Arc<ConnectionRegistry>,
    tick_interval: Duration,
    tick: u64,
}

impl TickBroadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>, tick_interval: Duration) -> Self {
        Self {
            registry,
            tick_interval,
            tick: 0,
        }
    }

    /// Runs a single tick: snapshot, encode, fan out.
    ///
    /// An empty registry still produces a well-formed, empty broadcast.
    pub fn broadcast_once(&mut self) -> Result<TickReport, EncodeError> {
        self.tick += 1;

        let peers = self.registry.peers();
        let world: Vec<ClientState> = peers.iter().map(|peer| peer.state).collect();
        let payload = encode_snapshot(&world)?;
        let frame: Frame = encode_frame(&payload)?.into();

        let mut failures = 0;
        for peer in &peers {
            if let Err(failure) = peer.outbox.deliver(&frame) {
                if failure == DeliveryFailure::Stalled {
                    warn!(
                        "Dropping client {} ({}): {}",
                        peer.state.id, peer.handle, failure
                    );
                }
                peer.outbox.evict();
                failures += 1;
            }
        }

        Ok(TickReport {
            tick: self.tick,
            recipients: peers.len() - failures,
            failures,
            payload_len: payload.len(),
        })
    }

    /// Broadcasts on every tick until `shutdown` is cancelled.
    ///
    /// A tick that overruns the interval is followed immediately by the next
    /// one; ticks missed in the meantime are not replayed.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut window_start = Instant::now();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Broadcaster stopped after {} ticks", self.tick);
                    break;
                }

                _ = ticker.tick() => {
                    let report = match self.broadcast_once() {
                        Ok(report) => report,
                        Err(e) => {
                            warn!("Skipping broadcast {}: {}", self.tick, e);
                            continue;
                        }
                    };

                    // Periodic performance monitoring
                    if report.tick % STATS_EVERY_TICKS == 0 {
                        let elapsed = window_start.elapsed().as_secs_f32();
                        window_start = Instant::now();
                        if report.recipients > 0 {
                            debug!(
                                "Tick {}: {} clients, {:.1}Hz, {} byte snapshot",
                                report.tick,
                                report.recipients,
                                STATS_EVERY_TICKS as f32 / elapsed,
                                report.payload_len
                            );
                        }
                    }
                }
            }
        }
    }
}
