// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Cached per-vertex state snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A snapshot of a DRP (or ACL) track's non-function attributes at one
/// vertex, as an explicit, typed, canonically-ordered record.
///
/// Backed by a `BTreeMap` rather than an ordered `Vec` of pairs: key
/// uniqueness is then a structural guarantee rather than an asserted
/// invariant, and iteration order is always the sorted key order the spec
/// calls "ordered sequence, keys unique" — there is no reflective
/// attribute walk to get wrong.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrpState(BTreeMap<String, serde_json::Value>);

impl DrpState {
    /// An empty state (used for the root vertex).
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Build a state from an iterator of `(key, value)` pairs.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, serde_json::Value)>) -> Self {
        Self(entries.into_iter().collect())
    }

    /// Look up a single attribute.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Iterate attributes in sorted-key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` if there are no attributes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overlay `other`'s entries onto a clone of `self`, `other` winning on
    /// key collisions. Used to apply a cached state onto a fresh default
    /// snapshot ("assign every (key, value) onto the clone, overwriting
    /// defaults").
    pub fn overlaid_with(&self, other: &Self) -> Self {
        let mut merged = self.0.clone();
        for (k, v) in &other.0 {
            merged.insert(k.clone(), v.clone());
        }
        Self(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_entries_dedupes_last_write_wins() {
        let s = DrpState::from_entries([
            ("a".to_string(), json!(1)),
            ("a".to_string(), json!(2)),
        ]);
        assert_eq!(s.len(), 1);
        assert_eq!(s.get("a"), Some(&json!(2)));
    }

    #[test]
    fn overlay_overwrites_defaults() {
        let defaults = DrpState::from_entries([("count".to_string(), json!(0))]);
        let cached = DrpState::from_entries([("count".to_string(), json!(7))]);
        let merged = defaults.overlaid_with(&cached);
        assert_eq!(merged.get("count"), Some(&json!(7)));
    }

    #[test]
    fn overlay_preserves_defaults_not_present_in_cached() {
        let defaults = DrpState::from_entries([
            ("count".to_string(), json!(0)),
            ("name".to_string(), json!("x")),
        ]);
        let cached = DrpState::from_entries([("count".to_string(), json!(7))]);
        let merged = defaults.overlaid_with(&cached);
        assert_eq!(merged.get("name"), Some(&json!("x")));
        assert_eq!(merged.get("count"), Some(&json!(7)));
    }

    #[test]
    fn iteration_order_is_sorted_by_key() {
        let s = DrpState::from_entries([
            ("z".to_string(), json!(1)),
            ("a".to_string(), json!(2)),
            ("m".to_string(), json!(3)),
        ]);
        let keys: Vec<&str> = s.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "m", "z"]);
    }
}
