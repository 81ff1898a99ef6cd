//! Deterministic input digests for generated artifacts.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::domain::error::Result;

/// SHA-256 hex digest of the canonical JSON form of `value`.
///
/// `serde_json::Value` objects are key-sorted maps, so converting through
/// `Value` makes the encoding independent of struct field order.
pub fn compute_digest<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let canonical = serde_json::to_value(value)?;
    let bytes = serde_json::to_vec(&canonical)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}
