//! Hashing System - SHA-256 fingerprints for seal versions
//!
//! Identical specs hash identically, which makes rendering drift visible
//! when two versions share a `spec_hash` but not a `content_hash`.

use serde::Serialize;
use serde_json::{to_string, Value};
use sha2::{Digest, Sha256};

use crate::model::SealVersionSpec;

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    to_string(&sort_value(&v))
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                sorted
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sort_value(v)))
                    .collect(),
            )
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_value).collect()),
        _ => v.clone(),
    }
}

/// Fingerprint of the layout input.
pub fn compute_spec_hash(spec: &SealVersionSpec) -> Result<String, serde_json::Error> {
    Ok(sha256_hex(canonical_json(spec)?.as_bytes()))
}

/// Fingerprint of the produced artifact.
pub fn compute_content_hash(artifact: &[u8]) -> String {
    sha256_hex(artifact)
}
