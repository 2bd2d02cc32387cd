// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The contract an embedder implements to plug a replicated data
//! structure into the DRP engine: a polymorphic object exposing mutating
//! operations, pure `query_*` reads, a conflict resolver, and a semantics
//! tag. The ACL contract extends it with the two read predicates the
//! engine needs to gate writes and determine finality signers.
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

use std::collections::BTreeSet;

use drp_types::{DrpState, Operation, OperationError, SemanticsTag};

/// The verdict a `PAIRWISE` resolver returns for one unordered pair of
/// concurrent operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictVerdict {
    /// The first operand loses; it is dropped from the linearization.
    DropLeft,
    /// The second operand loses; it is dropped from the linearization.
    DropRight,
    /// Neither operand conflicts; both survive.
    NoConflict,
}

/// Object-safe clone, so `Box<dyn Drp>` values can be deep-cloned the way
/// `_compute_*` requires ("start from a deep clone of the original
/// snapshot").
pub trait DrpClone {
    /// Clone `self` into a new boxed trait object.
    fn clone_box(&self) -> Box<dyn Drp>;
}

impl<T> DrpClone for T
where
    T: 'static + Drp + Clone,
{
    fn clone_box(&self) -> Box<dyn Drp> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Drp> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A user-supplied replicated data structure.
///
/// Method dispatch is by an explicit operation-descriptor table (an
/// embedder implements `apply`/`query` as a match over `op_type` strings)
/// rather than by dynamic-proxy interception — the source's approach of
/// inspecting method names at a language boundary has no portable
/// equivalent here, and an explicit table is also a stronger contract: an
/// unknown `op_type` is a typed [`OperationError`], not a silent no-op.
pub trait Drp: DrpClone + Send + Sync {
    /// Apply a mutating operation in place.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError`] if `op.op_type` is unknown, is a
    /// `query_*` name, or the method's own logic rejects the arguments.
    fn apply(&mut self, op: &Operation) -> Result<(), OperationError>;

    /// Invoke a pure `query_*` read. Must never mutate `self`.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::UnknownOperation`] if `op_type` does not
    /// name a known query method.
    fn query(&self, op_type: &str, args: &serde_json::Value) -> Result<serde_json::Value, OperationError>;

    /// Which conflict-resolution protocol this DRP expects.
    fn semantics(&self) -> SemanticsTag;

    /// Resolve one concurrent pair under `PAIRWISE` semantics. The engine
    /// only calls this when [`Drp::semantics`] returns
    /// [`SemanticsTag::Pairwise`].
    fn resolve_pair(&self, a: &Operation, b: &Operation) -> ConflictVerdict;

    /// Resolve a full concurrent set under `MULTIPLE` semantics, returning
    /// the ordered (possibly trimmed) sub-sequence to emit. The engine
    /// only calls this when [`Drp::semantics`] returns
    /// [`SemanticsTag::Multiple`].
    fn resolve_many(&self, ops: &[Operation]) -> Vec<Operation>;

    /// Snapshot the DRP's non-function attributes as a [`DrpState`].
    fn snapshot_state(&self) -> DrpState;

    /// Overwrite attributes from a cached state onto `self` ("assign
    /// every (key, value) onto the clone, overwriting defaults").
    fn load_state(&mut self, state: &DrpState);

    /// `true` if every attribute of `self` deep-equals `other`'s — used
    /// by `apply_local` to detect a no-op call.
    fn state_eq(&self, other: &dyn Drp) -> bool {
        self.snapshot_state() == other.snapshot_state()
    }
}

/// The access-control DRP: gates write permission and names finality
/// signers. An ACL is itself a [`Drp`] tracked on the same graph.
pub trait Acl: Drp {
    /// `true` if `peer_id` may author a vertex given the ACL state this
    /// instance represents.
    fn is_writer(&self, peer_id: &str) -> bool;

    /// The set of peers whose attestations are required for finality at
    /// the vertex this ACL state describes.
    fn finality_signers(&self) -> BTreeSet<String>;
}

/// Object-safe clone for `Box<dyn Acl>`.
pub trait AclClone {
    /// Clone `self` into a new boxed trait object.
    fn clone_box(&self) -> Box<dyn Acl>;
}

impl<T> AclClone for T
where
    T: 'static + Acl + Clone,
{
    fn clone_box(&self) -> Box<dyn Acl> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Acl> {
    fn clone(&self) -> Self {
        AclClone::clone_box(&**self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drp_types::DrpKind;
    use serde_json::json;

    #[derive(Clone, Default)]
    struct ToyCounter {
        count: i64,
    }

    impl Drp for ToyCounter {
        fn apply(&mut self, op: &Operation) -> Result<(), OperationError> {
            match op.op_type.as_str() {
                "increment" => {
                    let by = op.value.as_i64().unwrap_or(1);
                    self.count += by;
                    Ok(())
                }
                other => Err(OperationError::UnknownOperation(other.to_string())),
            }
        }

        fn query(&self, op_type: &str, _args: &serde_json::Value) -> Result<serde_json::Value, OperationError> {
            match op_type {
                "query_value" => Ok(json!(self.count)),
                other => Err(OperationError::UnknownOperation(other.to_string())),
            }
        }

        fn semantics(&self) -> SemanticsTag {
            SemanticsTag::Multiple
        }

        fn resolve_pair(&self, _a: &Operation, _b: &Operation) -> ConflictVerdict {
            ConflictVerdict::NoConflict
        }

        fn resolve_many(&self, ops: &[Operation]) -> Vec<Operation> {
            ops.to_vec()
        }

        fn snapshot_state(&self) -> DrpState {
            DrpState::from_entries([("count".to_string(), json!(self.count))])
        }

        fn load_state(&mut self, state: &DrpState) {
            if let Some(v) = state.get("count").and_then(serde_json::Value::as_i64) {
                self.count = v;
            }
        }
    }

    #[test]
    fn boxed_drp_clones_independently() {
        let mut boxed: Box<dyn Drp> = Box::new(ToyCounter::default());
        boxed
            .apply(&Operation::new(DrpKind::Drp, "increment", json!(1)))
            .unwrap();
        let cloned = boxed.clone();
        boxed
            .apply(&Operation::new(DrpKind::Drp, "increment", json!(1)))
            .unwrap();
        assert_ne!(boxed.snapshot_state(), cloned.snapshot_state());
    }

    #[test]
    fn state_eq_detects_no_op() {
        let a = ToyCounter { count: 3 };
        let b = ToyCounter { count: 3 };
        assert!(a.state_eq(&b));
        let c = ToyCounter { count: 4 };
        assert!(!a.state_eq(&c));
    }

    #[test]
    fn unknown_operation_is_typed_error() {
        let mut c = ToyCounter::default();
        let err = c
            .apply(&Operation::new(DrpKind::Drp, "nonexistent", json!(null)))
            .unwrap_err();
        assert!(matches!(err, OperationError::UnknownOperation(op) if op == "nonexistent"));
    }
}
