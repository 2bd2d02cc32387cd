// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Immutable value types shared by every DRP engine crate: operations,
//! vertices, per-vertex state snapshots, and the typed error hierarchy.
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

mod error;
mod operation;
mod state;
mod vertex;

pub use error::{ConstructionError, EngineError, GraphError, OperationError, StateError, ValidationError};
pub use operation::{DrpKind, Operation, SemanticsTag};
pub use state::DrpState;
pub use vertex::Vertex;

pub use drp_hash::Hash;
