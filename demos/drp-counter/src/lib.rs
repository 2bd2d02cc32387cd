// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! A grow-only counter: the simplest possible [`Drp`], used as a
//! contract-conformance fixture by the engine's test suite. Not shipped
//! product.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

use drp_contract::{ConflictVerdict, Drp};
use drp_types::{DrpState, Operation, OperationError, SemanticsTag};
use serde_json::json;

/// A counter that only ever increases. Concurrent increments always
/// commute, so conflict resolution never needs to drop anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrowOnlyCounter {
    value: u64,
}

impl GrowOnlyCounter {
    /// Current value.
    pub fn value(&self) -> u64 {
        self.value
    }
}

impl Drp for GrowOnlyCounter {
    fn apply(&mut self, op: &Operation) -> Result<(), OperationError> {
        match op.op_type.as_str() {
            "increment" => {
                let by = op
                    .value
                    .as_u64()
                    .ok_or_else(|| OperationError::InvalidArguments {
                        op_type: "increment".to_string(),
                        message: "expected a non-negative integer".to_string(),
                    })?;
                self.value += by;
                Ok(())
            }
            other => Err(OperationError::UnknownOperation(other.to_string())),
        }
    }

    fn query(&self, op_type: &str, _args: &serde_json::Value) -> Result<serde_json::Value, OperationError> {
        match op_type {
            "query_value" => Ok(json!(self.value)),
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
        DrpState::from_entries([("value".to_string(), json!(self.value))])
    }

    fn load_state(&mut self, state: &DrpState) {
        if let Some(v) = state.get("value").and_then(serde_json::Value::as_u64) {
            self.value = v;
        }
    }
}
