// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Content hashing and canonical encoding for the DRP hash graph.
//!
//! A [`Hash`] addresses a vertex by the SHA-256 digest of a canonical
//! encoding of its `(peer_id, operation, dependencies, timestamp)` tuple.
//! Canonicalization relies on [`serde_json::Map`] defaulting to a
//! `BTreeMap` (the `preserve_order` feature is deliberately not enabled on
//! the `serde_json` dependency here) so that object keys serialize in
//! sorted order at every nesting level, with no insignificant whitespace.
//! That is the full determinism contract this module provides; it is not
//! a general-purpose canonical-JSON library.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions,
    clippy::multiple_crate_versions
)]

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A 32-byte SHA-256 content hash, used as the vertex key throughout the
/// hash graph.
///
/// Thin newtype over `[u8; 32]`, in the `BlobHash`-style pattern: the inner
/// bytes are public for zero-cost access, `Ord` is derived directly over
/// the byte array (so sorting a `Vec<Hash>` is the same lexicographic
/// order the spec calls for when breaking linearization ties), and
/// `Display` renders lowercase hex.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// View the hash as a byte slice.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding.
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    /// Parse a lowercase (or uppercase) hex string into a hash.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::InvalidHex`] if `s` is not exactly 64 hex
    /// characters.
    pub fn from_hex(s: &str) -> Result<Self, HashError> {
        let bytes = hex::decode(s).map_err(|_| HashError::InvalidHex)?;
        let arr: [u8; 32] = bytes.try_into().map_err(|_| HashError::InvalidHex)?;
        Ok(Self(arr))
    }
}

impl std::fmt::Display for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Errors raised while hashing or decoding hashes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HashError {
    /// Input was not a well-formed 64-character hex string.
    #[error("invalid hex-encoded hash")]
    InvalidHex,
    /// The preimage could not be serialized into canonical form.
    #[error("failed to canonicalize preimage: {0}")]
    Canonicalize(String),
}

/// Canonicalize `value` into deterministic, sorted-key, whitespace-free
/// bytes suitable as a hash preimage.
///
/// # Errors
///
/// Returns [`HashError::Canonicalize`] if `value` cannot be represented as
/// a `serde_json::Value` (e.g. non-string map keys).
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, HashError> {
    let as_value =
        serde_json::to_value(value).map_err(|e| HashError::Canonicalize(e.to_string()))?;
    serde_json::to_vec(&as_value).map_err(|e| HashError::Canonicalize(e.to_string()))
}

/// SHA-256 digest of `bytes`.
pub fn digest(bytes: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let out = hasher.finalize();
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&out);
    Hash(arr)
}

/// The exact fields hashed to address a vertex.
///
/// Field order here is irrelevant to the resulting hash (canonicalization
/// sorts keys), but is kept alphabetical for readability.
#[derive(Debug, Serialize)]
pub struct VertexPreimage<'a, Op: Serialize> {
    /// Dependency hashes, as hex strings (so the preimage is itself plain
    /// JSON-compatible data, not a nested binary type).
    pub deps: &'a [String],
    /// The operation payload.
    pub operation: &'a Op,
    /// Author peer id.
    pub peer_id: &'a str,
    /// Vertex creation timestamp, milliseconds since the epoch.
    pub timestamp: u64,
}

/// Compute the vertex hash `H(peer_id, operation, deps, timestamp)`.
///
/// # Errors
///
/// Returns [`HashError::Canonicalize`] if `operation` cannot be
/// canonicalized.
pub fn vertex_hash<Op: Serialize>(
    peer_id: &str,
    operation: &Op,
    deps: &[Hash],
    timestamp: u64,
) -> Result<Hash, HashError> {
    let deps: Vec<String> = deps.iter().map(|h| h.to_hex()).collect();
    let preimage = VertexPreimage {
        deps: &deps,
        operation,
        peer_id,
        timestamp,
    };
    let bytes = to_canonical_bytes(&preimage)?;
    Ok(digest(&bytes))
}

/// Compute a default object id from a peer id and a random nonce.
///
/// The nonce is expected to already be a 16-byte buffer from a
/// cryptographic RNG (see `drp-object`'s `EngineOptions` construction);
/// this function only performs the deterministic hashing step so it stays
/// unit-testable without pulling in `rand` here.
pub fn object_id(peer_id: &str, nonce: &[u8; 16]) -> Hash {
    let mut buf = Vec::with_capacity(peer_id.len() + 16);
    buf.extend_from_slice(peer_id.as_bytes());
    buf.extend_from_slice(nonce);
    digest(&buf)
}

/// The sentinel root vertex hash: `H("", "ROOT", [], 0)`.
///
/// The root is a legitimate instance of the same hashing formula (not an
/// arbitrary magic constant), so "equal hash implies equal vertex" holds
/// for it too.
pub fn root_hash() -> Hash {
    #[derive(Serialize)]
    struct RootOp<'a> {
        sentinel: &'a str,
    }
    #[allow(clippy::unwrap_used)] // infallible: static input, always serializable
    vertex_hash("", &RootOp { sentinel: "ROOT" }, &[], 0).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hex_round_trip() {
        let h = digest(b"hello");
        let hex = h.to_hex();
        let parsed = Hash::from_hex(&hex).unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn from_hex_rejects_bad_length() {
        assert_eq!(Hash::from_hex("abcd"), Err(HashError::InvalidHex));
    }

    #[test]
    fn canonical_bytes_are_key_order_independent() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(
            to_canonical_bytes(&a).unwrap(),
            to_canonical_bytes(&b).unwrap()
        );
    }

    #[test]
    fn canonical_bytes_have_no_insignificant_whitespace() {
        let v = json!({"a": 1});
        let bytes = to_canonical_bytes(&v).unwrap();
        assert_eq!(bytes, b"{\"a\":1}");
    }

    #[test]
    fn vertex_hash_is_deterministic() {
        let op = json!({"opType": "increment", "value": [1]});
        let deps = vec![digest(b"root")];
        let h1 = vertex_hash("p1", &op, &deps, 10).unwrap();
        let h2 = vertex_hash("p1", &op, &deps, 10).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn vertex_hash_changes_with_any_field() {
        let op = json!({"opType": "increment", "value": [1]});
        let deps = vec![digest(b"root")];
        let base = vertex_hash("p1", &op, &deps, 10).unwrap();
        assert_ne!(base, vertex_hash("p2", &op, &deps, 10).unwrap());
        assert_ne!(base, vertex_hash("p1", &op, &deps, 11).unwrap());
        assert_ne!(
            base,
            vertex_hash("p1", &op, &[digest(b"other")], 10).unwrap()
        );
    }

    #[test]
    fn root_hash_is_stable() {
        assert_eq!(root_hash(), root_hash());
    }

    #[test]
    fn object_id_is_deterministic_given_nonce() {
        let nonce = [7u8; 16];
        assert_eq!(object_id("p1", &nonce), object_id("p1", &nonce));
        assert_ne!(object_id("p1", &nonce), object_id("p2", &nonce));
    }
}
