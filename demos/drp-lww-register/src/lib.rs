// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! A last-writer-wins register: a minimal `PAIRWISE`-semantics [`Drp`],
//! used as a contract-conformance fixture by the engine's test suite.
//! Not shipped product.
//!
//! `write` operations carry their own logical timestamp in the
//! operation value (`{"value": ..., "at": <u64>}`) rather than relying
//! on vertex admission time, since the conflict resolver only ever sees
//! [`Operation`] values, never the enclosing [`drp_types::Vertex`].
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

#[derive(Debug, serde::Deserialize)]
struct WriteArgs {
    value: serde_json::Value,
    at: u64,
}

/// A single-slot register where the write carrying the highest logical
/// timestamp wins over any write concurrent with it.
#[derive(Debug, Clone, Default)]
pub struct LastWriterWinsRegister {
    value: Option<serde_json::Value>,
    written_at: u64,
}

impl LastWriterWinsRegister {
    /// The current value, or `None` if nothing has been written yet.
    pub fn value(&self) -> Option<&serde_json::Value> {
        self.value.as_ref()
    }
}

impl Drp for LastWriterWinsRegister {
    fn apply(&mut self, op: &Operation) -> Result<(), OperationError> {
        match op.op_type.as_str() {
            "write" => {
                let args: WriteArgs =
                    serde_json::from_value(op.value.clone()).map_err(|e| OperationError::InvalidArguments {
                        op_type: "write".to_string(),
                        message: e.to_string(),
                    })?;
                self.value = Some(args.value);
                self.written_at = args.at;
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
        SemanticsTag::Pairwise
    }

    fn resolve_pair(&self, a: &Operation, b: &Operation) -> ConflictVerdict {
        let at = |op: &Operation| -> Option<u64> { serde_json::from_value::<WriteArgs>(op.value.clone()).ok().map(|w| w.at) };
        match (at(a), at(b)) {
            (Some(at_a), Some(at_b)) if at_a < at_b => ConflictVerdict::DropLeft,
            (Some(at_a), Some(at_b)) if at_a > at_b => ConflictVerdict::DropRight,
            _ => ConflictVerdict::NoConflict,
        }
    }

    fn resolve_many(&self, ops: &[Operation]) -> Vec<Operation> {
        ops.to_vec()
    }

    fn snapshot_state(&self) -> DrpState {
        DrpState::from_entries([
            ("value".to_string(), json!(self.value)),
            ("written_at".to_string(), json!(self.written_at)),
        ])
    }

    fn load_state(&mut self, state: &DrpState) {
        if let Some(v) = state.get("value") {
            self.value = if v.is_null() { None } else { Some(v.clone()) };
        }
        if let Some(w) = state.get("written_at").and_then(serde_json::Value::as_u64) {
            self.written_at = w;
        }
    }
}
