// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Typed error hierarchy. One `thiserror` enum per error kind named in the
//! engine's error-handling design, plus an `EngineError` that wraps all of
//! them for the engine's public fallible entry points.

use drp_hash::Hash;
use thiserror::Error;

/// Neither an ACL nor a public credential was supplied at construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    /// `EngineOptions` had neither `acl` nor `public_credential` set.
    #[error("exactly one of `acl` or `public_credential` must be supplied")]
    MissingAclOrCredential,
}

/// Hash-graph structural violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// `add_vertex` referenced a dependency hash not present in the graph.
    #[error("unknown dependency {0}")]
    UnknownDependency(Hash),
    /// `add_vertex` was called with a hash already present in the graph.
    #[error("duplicate vertex {0}")]
    DuplicateVertex(Hash),
    /// `lowest_common_ancestor` was called with an empty head set.
    #[error("cannot compute LCA of an empty head set")]
    EmptyHeads,
}

/// Vertex validation failures (see `drp-object::validate_vertex`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Stored hash does not match the recomputed hash.
    #[error("hash mismatch: stored {stored}, recomputed {recomputed}")]
    HashMismatch {
        /// The hash carried on the wire.
        stored: Hash,
        /// The hash recomputed from the vertex's own fields.
        recomputed: Hash,
    },
    /// `dependencies` was empty on a non-root vertex.
    #[error("non-root vertex {0} has no dependencies")]
    MissingDependencies(Hash),
    /// A dependency hash is not present in the local graph.
    #[error("dependency {0} is not known locally")]
    UnknownDependency(Hash),
    /// A dependency's timestamp is newer than this vertex's timestamp.
    #[error("dependency {dep} timestamp {dep_ts} exceeds vertex timestamp {vertex_ts}")]
    TimestampNotMonotonic {
        /// The offending dependency.
        dep: Hash,
        /// The dependency's timestamp.
        dep_ts: u64,
        /// This vertex's timestamp.
        vertex_ts: u64,
    },
    /// The vertex's timestamp is later than wall-clock now (plus the
    /// configured skew tolerance).
    #[error("vertex timestamp {vertex_ts} is in the future (now {now})")]
    FutureTimestamp {
        /// This vertex's timestamp.
        vertex_ts: u64,
        /// The clock's current reading at validation time.
        now: u64,
    },
    /// The author is not a writer in the ACL reconstructed at `deps`.
    #[error("peer {0} is not a writer at this vertex's dependencies")]
    PermissionDenied(String),
}

/// DRP method-dispatch failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    /// `op_type` did not match any mutating method the DRP exposes.
    #[error("unknown operation `{0}`")]
    UnknownOperation(String),
    /// `op_type` named a `query_*` method (pure read, not a mutation).
    #[error("`{0}` is a query method and cannot be used as a mutating operation")]
    QueryMethodNotMutating(String),
    /// The DRP method itself reported a domain error.
    #[error("operation `{op_type}` failed: {message}")]
    MethodFailed {
        /// The operation that was attempted.
        op_type: String,
        /// The DRP's error message.
        message: String,
    },
    /// Arguments did not deserialize into the shape the method expects.
    #[error("invalid arguments for `{op_type}`: {message}")]
    InvalidArguments {
        /// The operation that was attempted.
        op_type: String,
        /// The deserialization error message.
        message: String,
    },
}

/// Internal consistency failures. Indicates an engine bug; not expected
/// to occur under correct use of the public API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// A state cache lookup expected to succeed (per an already-admitted
    /// vertex) found nothing.
    #[error("missing cached state at vertex {0}")]
    MissingCachedState(Hash),
    /// A finality entry expected to exist (per an already-admitted
    /// vertex) was not found.
    #[error("missing finality entry at vertex {0}")]
    MissingFinalityEntry(Hash),
}

/// Top-level error type returned from the engine's public fallible entry
/// points. Wraps every specific error kind so call sites can still match
/// on e.g. `EngineError::Validation(ValidationError::HashMismatch { .. })`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// See [`ConstructionError`].
    #[error(transparent)]
    Construction(#[from] ConstructionError),
    /// See [`GraphError`].
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// See [`ValidationError`].
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// See [`OperationError`].
    #[error(transparent)]
    Operation(#[from] OperationError),
    /// See [`StateError`].
    #[error(transparent)]
    State(#[from] StateError),
    /// A hash preimage could not be canonicalized. See
    /// [`drp_hash::HashError`].
    #[error(transparent)]
    Hash(#[from] drp_hash::HashError),
}
