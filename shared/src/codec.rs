//! Wire codec for client states.
//!
//! A payload is a bincode-serialized `Vec<i64>`: a `u64` length followed by
//! fixed-width little-endian values.
//!
//! Snapshots (server to client) carry `id, x, y, last_input, 0` for every
//! client. Records are read with a fixed stride and the trailing `0` is
//! checked rather than searched for, so a field that is itself zero never
//! splits a record.
//!
//! Reports (client to server) carry a single record without separator,
//! either `id, x, y, last_input` or the identity-less `x, y, last_input`.

use crate::error::{DecodeError, EncodeError};
use crate::ClientState;
use bincode::{deserialize, serialize};

pub const FIELDS_PER_RECORD: usize = 4;
pub const RECORD_SEPARATOR: i64 = 0;

const STRIDE: usize = FIELDS_PER_RECORD + 1;

pub fn flatten_snapshot(states: &[ClientState]) -> Vec<i64> {
    let mut values = Vec::with_capacity(states.len() * STRIDE);
    for state in states {
        values.extend_from_slice(&[state.id, state.x, state.y, state.last_input]);
        values.push(RECORD_SEPARATOR);
    }
    values
}

pub fn unflatten_snapshot(values: &[i64]) -> Result<Vec<ClientState>, DecodeError> {
    if values.len() % STRIDE != 0 {
        return Err(DecodeError::Truncated { len: values.len() });
    }

    values
        .chunks_exact(STRIDE)
        .enumerate()
        .map(|(record, chunk)| {
            if chunk[FIELDS_PER_RECORD] != RECORD_SEPARATOR {
                return Err(DecodeError::MissingSeparator {
                    record,
                    found: chunk[FIELDS_PER_RECORD],
                });
            }
            Ok(ClientState::new(chunk[0], chunk[1], chunk[2], chunk[3]))
        })
        .collect()
}

pub fn encode_snapshot(states: &[ClientState]) -> Result<Vec<u8>, EncodeError> {
    Ok(serialize(&flatten_snapshot(states))?)
}

/// Decodes a broadcast. An empty payload is an empty world.
pub fn decode_snapshot(bytes: &[u8]) -> Result<Vec<ClientState>, DecodeError> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    let values: Vec<i64> = deserialize(bytes)?;
    unflatten_snapshot(&values)
}

pub fn encode_report(state: &ClientState) -> Result<Vec<u8>, EncodeError> {
    let values = [state.id, state.x, state.y, state.last_input];
    Ok(serialize(&values[..])?)
}

/// Decodes a client report.
///
/// Returns `Ok(None)` for an empty payload, which carries no new state. The
/// identity-less form yields an id of `0`; callers overwrite the id with the
/// one they assigned at bootstrap either way.
pub fn decode_report(bytes: &[u8]) -> Result<Option<ClientState>, DecodeError> {
    if bytes.is_empty() {
        return Ok(None);
    }
    let values: Vec<i64> = deserialize(bytes)?;
    match values[..] {
        [] => Ok(None),
        [x, y, last_input] => Ok(Some(ClientState::new(0, x, y, last_input))),
        [id, x, y, last_input] => Ok(Some(ClientState::new(id, x, y, last_input))),
        _ => Err(DecodeError::BadReportLength(values.len())),
    }
}
