// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Operation values: the immutable record of one intercepted method call.

use serde::{Deserialize, Serialize};

/// Which state track an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DrpKind {
    /// Targets the user-supplied DRP.
    Drp,
    /// Targets the ACL track.
    Acl,
}

/// Conflict-resolution protocol a DRP's `resolve_conflicts` expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SemanticsTag {
    /// Resolver is invoked once per unordered pair of concurrent operations.
    Pairwise,
    /// Resolver is invoked once with the full concurrent set.
    Multiple,
}

/// One intercepted method invocation, recorded as the payload of a vertex.
///
/// `op_type` never names a `query_*` method — those are pass-through reads
/// and never become operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Which track (DRP or ACL) this operation mutates.
    pub drp_type: DrpKind,
    /// Dotted method path, e.g. `"increment"` or `"acl.grant"`.
    pub op_type: String,
    /// Opaque argument list, serialized as JSON.
    pub value: serde_json::Value,
}

impl Operation {
    /// Construct a new operation.
    pub fn new(drp_type: DrpKind, op_type: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            drp_type,
            op_type: op_type.into(),
            value,
        }
    }
}
