// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The immutable vertex type admitted into the hash graph.

use drp_hash::Hash;
use serde::{Deserialize, Serialize};

use crate::operation::Operation;

/// A single admitted mutation, content-addressed by [`Hash`].
///
/// Immutable once constructed. `dependencies` is empty only for the
/// engine-defined root vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// Content address, `H(peer_id, operation, dependencies, timestamp)`.
    pub hash: Hash,
    /// Author peer id.
    pub peer_id: String,
    /// The recorded operation.
    pub operation: Operation,
    /// Causal parents. Non-empty except for the root.
    pub dependencies: Vec<Hash>,
    /// Creation timestamp, milliseconds since the epoch.
    pub timestamp: u64,
    /// Opaque signature blob. Verified by a collaborator, not this crate.
    pub signature: Vec<u8>,
}

impl Vertex {
    /// Recompute `H(peer_id, operation, dependencies, timestamp)` for this
    /// vertex and compare against the stored [`Hash`].
    ///
    /// # Errors
    ///
    /// Propagates [`drp_hash::HashError`] if the operation cannot be
    /// canonicalized.
    pub fn recompute_hash(&self) -> Result<Hash, drp_hash::HashError> {
        drp_hash::vertex_hash(
            &self.peer_id,
            &self.operation,
            &self.dependencies,
            self.timestamp,
        )
    }

    /// `true` if this vertex declares no dependencies (only legal for the
    /// engine-defined root).
    pub fn is_root_shaped(&self) -> bool {
        self.dependencies.is_empty()
    }
}
