// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The default access-control DRP: permissionless until an admin locks
//! it down, after which only the admin set may write.
//!
//! Every mutating method here is admin-gated, but [`drp_contract::Drp`]
//! carries no notion of "caller" separate from the operation payload —
//! the engine is the only party that knows which peer authored a call.
//! So the gated methods expect the caller's own peer id embedded in the
//! operation value under the `caller` key, alongside whatever argument
//! the method itself needs. This is the one place in this crate that
//! deviates from a pure "args are just the method's own parameters"
//! reading of the operation payload.
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

use drp_contract::{Acl, ConflictVerdict, Drp};
use drp_types::{DrpState, OperationError, SemanticsTag};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Deserialize)]
struct GrantArgs {
    caller: String,
    peer_id: String,
}

#[derive(Debug, Deserialize)]
struct SetPermissionlessArgs {
    caller: String,
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct IsWriterArgs {
    peer_id: String,
}

/// Permissionless-by-default admin-gated ACL.
///
/// While `permissionless` is `true`, every peer is a writer. Once an
/// admin calls `set_permissionless(false)`, only the admin set may
/// write. `get_finality_signers` always returns the current admin set,
/// independent of the permissionless flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultAcl {
    admins: BTreeSet<String>,
    permissionless: bool,
}

impl DefaultAcl {
    /// A fresh ACL with `admin_peer_id` as sole admin and writes open to
    /// everyone (the constructor-time default per the engine's
    /// "no explicit ACL supplied" fallback).
    pub fn new_with_admin(admin_peer_id: impl Into<String>) -> Self {
        let mut admins = BTreeSet::new();
        admins.insert(admin_peer_id.into());
        Self {
            admins,
            permissionless: true,
        }
    }

    fn require_admin(&self, caller: &str, op_type: &str) -> Result<(), OperationError> {
        if self.admins.contains(caller) {
            Ok(())
        } else {
            Err(OperationError::MethodFailed {
                op_type: op_type.to_string(),
                message: format!("{caller} is not an admin"),
            })
        }
    }

    fn invalid_args(op_type: &str, err: serde_json::Error) -> OperationError {
        OperationError::InvalidArguments {
            op_type: op_type.to_string(),
            message: err.to_string(),
        }
    }
}

impl Drp for DefaultAcl {
    fn apply(&mut self, op: &drp_types::Operation) -> Result<(), OperationError> {
        match op.op_type.as_str() {
            "grant" => {
                let args: GrantArgs =
                    serde_json::from_value(op.value.clone()).map_err(|e| Self::invalid_args("grant", e))?;
                self.require_admin(&args.caller, "grant")?;
                self.admins.insert(args.peer_id);
                Ok(())
            }
            "revoke" => {
                let args: GrantArgs =
                    serde_json::from_value(op.value.clone()).map_err(|e| Self::invalid_args("revoke", e))?;
                self.require_admin(&args.caller, "revoke")?;
                self.admins.remove(&args.peer_id);
                Ok(())
            }
            "set_permissionless" => {
                let args: SetPermissionlessArgs = serde_json::from_value(op.value.clone())
                    .map_err(|e| Self::invalid_args("set_permissionless", e))?;
                self.require_admin(&args.caller, "set_permissionless")?;
                self.permissionless = args.enabled;
                Ok(())
            }
            other if other.starts_with("query_") => {
                Err(OperationError::QueryMethodNotMutating(other.to_string()))
            }
            other => Err(OperationError::UnknownOperation(other.to_string())),
        }
    }

    fn query(&self, op_type: &str, args: &serde_json::Value) -> Result<serde_json::Value, OperationError> {
        match op_type {
            "query_is_writer" => {
                let args: IsWriterArgs =
                    serde_json::from_value(args.clone()).map_err(|e| Self::invalid_args(op_type, e))?;
                Ok(json!(self.is_writer(&args.peer_id)))
            }
            "query_get_finality_signers" => Ok(json!(self.finality_signers())),
            other => Err(OperationError::UnknownOperation(other.to_string())),
        }
    }

    fn semantics(&self) -> SemanticsTag {
        SemanticsTag::Pairwise
    }

    fn resolve_pair(&self, _a: &drp_types::Operation, _b: &drp_types::Operation) -> ConflictVerdict {
        // Admin-set edits are commutative enough (insert/remove into a
        // set, or a boolean flip) that concurrent calls never need a
        // loser; the linearizer's hash tie-break already gives every
        // peer the same final order.
        ConflictVerdict::NoConflict
    }

    fn resolve_many(&self, ops: &[drp_types::Operation]) -> Vec<drp_types::Operation> {
        ops.to_vec()
    }

    fn snapshot_state(&self) -> DrpState {
        let admins: Vec<String> = self.admins.iter().cloned().collect();
        DrpState::from_entries([
            ("admins".to_string(), json!(admins)),
            ("permissionless".to_string(), json!(self.permissionless)),
        ])
    }

    fn load_state(&mut self, state: &DrpState) {
        if let Some(admins) = state.get("admins").and_then(|v| v.as_array()) {
            self.admins = admins
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
        }
        if let Some(permissionless) = state.get("permissionless").and_then(serde_json::Value::as_bool) {
            self.permissionless = permissionless;
        }
    }
}

impl Acl for DefaultAcl {
    fn is_writer(&self, peer_id: &str) -> bool {
        self.permissionless || self.admins.contains(peer_id)
    }

    fn finality_signers(&self) -> BTreeSet<String> {
        self.admins.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drp_types::{DrpKind, Operation};

    #[test]
    fn fresh_acl_is_permissionless_with_sole_admin() {
        let acl = DefaultAcl::new_with_admin("alice");
        assert!(acl.is_writer("alice"));
        assert!(acl.is_writer("bob"));
        assert_eq!(acl.finality_signers(), BTreeSet::from(["alice".to_string()]));
    }

    #[test]
    fn non_admin_cannot_grant() {
        let mut acl = DefaultAcl::new_with_admin("alice");
        let op = Operation::new(
            DrpKind::Acl,
            "grant",
            json!({"caller": "bob", "peer_id": "carol"}),
        );
        let err = acl.apply(&op).unwrap_err();
        assert!(matches!(err, OperationError::MethodFailed { .. }));
    }

    #[test]
    fn admin_can_toggle_permissionless_and_lock_writers() {
        let mut acl = DefaultAcl::new_with_admin("alice");
        acl.apply(&Operation::new(
            DrpKind::Acl,
            "set_permissionless",
            json!({"caller": "alice", "enabled": false}),
        ))
        .unwrap();
        assert!(acl.is_writer("alice"));
        assert!(!acl.is_writer("bob"));
    }

    #[test]
    fn admin_can_grant_and_revoke() {
        let mut acl = DefaultAcl::new_with_admin("alice");
        acl.apply(&Operation::new(
            DrpKind::Acl,
            "grant",
            json!({"caller": "alice", "peer_id": "bob"}),
        ))
        .unwrap();
        assert!(acl.finality_signers().contains("bob"));
        acl.apply(&Operation::new(
            DrpKind::Acl,
            "revoke",
            json!({"caller": "alice", "peer_id": "bob"}),
        ))
        .unwrap();
        assert!(!acl.finality_signers().contains("bob"));
    }

    #[test]
    fn state_round_trips_through_snapshot_and_load() {
        let mut acl = DefaultAcl::new_with_admin("alice");
        acl.apply(&Operation::new(
            DrpKind::Acl,
            "set_permissionless",
            json!({"caller": "alice", "enabled": false}),
        ))
        .unwrap();
        let snapshot = acl.snapshot_state();

        let mut fresh = DefaultAcl::new_with_admin("nobody");
        fresh.load_state(&snapshot);
        assert!(fresh.is_writer("alice"));
        assert!(!fresh.is_writer("bob"));
    }

    #[test]
    fn boxed_acl_clones_through_trait_object() {
        let acl: Box<dyn Acl> = Box::new(DefaultAcl::new_with_admin("alice"));
        let cloned = acl.clone();
        assert_eq!(acl.finality_signers(), cloned.finality_signers());
    }
}
