// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Distributed Replicated-object Protocol object engine.
//!
//! An object is a user-defined replicated data structure whose
//! mutations are recorded as vertices in a content-addressed,
//! causal hash graph. Peers apply local operations and merge remote
//! vertices; the engine deterministically reconstructs object state at
//! any causal cut by linearizing the operations that cut implies,
//! resolving concurrent operations through the DRP's own conflict
//! resolver. A companion access-control list, itself a replicated
//! object tracked on the same graph, gates write permission.
//!
//! This crate re-exports the full public surface; embedders typically
//! only need this one dependency, plus their own [`Drp`] implementation.
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

pub use drp_acl::DefaultAcl;
pub use drp_contract::{Acl, AclClone, ConflictVerdict, Drp, DrpClone};
pub use drp_finality::{Attestation, FinalityState, FinalityStore};
pub use drp_graph::{HashGraph, Resolvers};
pub use drp_hash::{digest, object_id, root_hash, to_canonical_bytes, Hash, HashError};
pub use drp_object::{ApplyOutcome, Clock, DrpObject, EngineConfig, EngineOptions, FixedClock, MergeReport, SystemClock};
pub use drp_types::{
    ConstructionError, DrpKind, DrpState, EngineError, GraphError, Operation, OperationError, SemanticsTag,
    StateError, ValidationError, Vertex,
};
