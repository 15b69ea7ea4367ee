use rmp_serde::{decode, encode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::{Command, Event, TransformSample, WorldSnapshot};

#[derive(Debug, Error)]
pub enum WireError {
    #[error("encode error: {0}")]
    Encode(#[from] encode::Error),
    #[error("decode error: {0}")]
    Decode(#[from] decode::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// MessagePack with field names, so enums tagged by `type` survive the trip.
pub fn to_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, WireError> {
    Ok(encode::to_vec_named(value)?)
}

pub fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, WireError> {
    Ok(decode::from_slice(bytes)?)
}

pub fn serialize_command(cmd: &Command) -> Result<Vec<u8>, WireError> {
    to_bytes(cmd)
}

pub fn deserialize_command(bytes: &[u8]) -> Result<Command, WireError> {
    from_bytes(bytes)
}

pub fn serialize_events(events: &[Event]) -> Result<Vec<u8>, WireError> {
    to_bytes(events)
}

pub fn deserialize_events(bytes: &[u8]) -> Result<Vec<Event>, WireError> {
    from_bytes(bytes)
}

pub fn serialize_transforms(samples: &[TransformSample]) -> Result<Vec<u8>, WireError> {
    to_bytes(samples)
}

pub fn deserialize_transforms(bytes: &[u8]) -> Result<Vec<TransformSample>, WireError> {
    from_bytes(bytes)
}

pub fn serialize_snapshot(snapshot: &WorldSnapshot) -> Result<Vec<u8>, WireError> {
    to_bytes(snapshot)
}

pub fn deserialize_snapshot(bytes: &[u8]) -> Result<WorldSnapshot, WireError> {
    from_bytes(bytes)
}

/// Human-readable dump for logs and debugging tools.
pub fn snapshot_json(snapshot: &WorldSnapshot) -> Result<String, WireError> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

/// Deterministic snapshot hash for desync checks and reproducibility tests.
///
/// Hashes the MessagePack-serialized snapshot using FNV-1a 64-bit.
pub fn snapshot_hash(snapshot: &WorldSnapshot) -> Result<u64, WireError> {
    let bytes = serialize_snapshot(snapshot)?;
    Ok(hash_bytes_fnv1a64(&bytes))
}

/// Deterministic, stable 64-bit hash for raw bytes (FNV-1a).
pub fn hash_bytes_fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    bytes.iter().fold(OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(PRIME)
    })
}
