//! Fixed-width little-endian encoding of the control-channel payloads
//!
//! One value per write: node id and subevent id are single bytes, the
//! wall-clock value is a 4-byte tick count, the clock correction a 4-byte
//! signed tick delta.

use byteorder::{ByteOrder, LittleEndian};
use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, TimeSyncError};
use crate::types::{NodeId, SubeventId};

fn wrong_length(what: &str, expected: usize, got: usize) -> TimeSyncError {
    TimeSyncError::Codec {
        message: format!("{what}: expected {expected} bytes, got {got}"),
    }
}

/// Encode a node id payload
#[must_use]
pub fn encode_node_id(id: NodeId) -> Bytes {
    Bytes::copy_from_slice(&[id.0])
}

/// Decode a node id payload
///
/// # Errors
///
/// Returns a codec error unless the payload is exactly one byte.
pub fn decode_node_id(value: &[u8]) -> Result<NodeId> {
    match value {
        [id] => Ok(NodeId(*id)),
        _ => Err(wrong_length("node id", 1, value.len())),
    }
}

/// Encode a subevent id payload
#[must_use]
pub fn encode_subevent_id(subevent: SubeventId) -> Bytes {
    Bytes::copy_from_slice(&[subevent.0])
}

/// Decode a subevent id payload
///
/// # Errors
///
/// Returns a codec error unless the payload is exactly one byte.
pub fn decode_subevent_id(value: &[u8]) -> Result<SubeventId> {
    match value {
        [id] => Ok(SubeventId(*id)),
        _ => Err(wrong_length("subevent id", 1, value.len())),
    }
}

/// Encode a wall-clock tick count
#[must_use]
pub fn encode_wall_clock(ticks: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(4);
    buf.put_u32_le(ticks);
    buf.freeze()
}

/// Decode a wall-clock tick count
///
/// # Errors
///
/// Returns a codec error unless the payload is exactly four bytes.
pub fn decode_wall_clock(value: &[u8]) -> Result<u32> {
    if value.len() != 4 {
        return Err(wrong_length("wall clock", 4, value.len()));
    }
    Ok(LittleEndian::read_u32(value))
}

/// Encode a signed clock-correction tick delta
#[must_use]
pub fn encode_clock_correction(delta: i32) -> Bytes {
    let mut buf = BytesMut::with_capacity(4);
    buf.put_i32_le(delta);
    buf.freeze()
}

/// Decode a signed clock-correction tick delta
///
/// # Errors
///
/// Returns a codec error unless the payload is exactly four bytes.
pub fn decode_clock_correction(value: &[u8]) -> Result<i32> {
    if value.len() != 4 {
        return Err(wrong_length("clock correction", 4, value.len()));
    }
    Ok(LittleEndian::read_i32(value))
}
