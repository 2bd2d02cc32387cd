// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The append-only causal hash graph: vertex storage, frontier tracking,
//! lowest-common-ancestor computation, and the deterministic linearizer
//! that turns a concurrent subgraph into one agreed operation order.
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

use std::collections::{BTreeMap, BTreeSet, HashMap};

use drp_contract::{ConflictVerdict, Drp};
use drp_types::{DrpKind, GraphError, Operation, Vertex};

pub use drp_hash::Hash;

/// Per-kind conflict resolvers consulted while linearizing a concurrent
/// set. Either slot may be absent (no DRP registered yet, or ACL-only
/// mode); an absent resolver leaves its operations ordered by hash with
/// no drops.
#[derive(Default)]
pub struct Resolvers<'a> {
    /// Resolver for operations targeting the user DRP track.
    pub drp: Option<&'a dyn Drp>,
    /// Resolver for operations targeting the ACL track.
    pub acl: Option<&'a dyn Drp>,
}

impl<'a> Resolvers<'a> {
    fn for_kind(&self, kind: DrpKind) -> Option<&'a dyn Drp> {
        match kind {
            DrpKind::Drp => self.drp,
            DrpKind::Acl => self.acl,
        }
    }
}

/// The append-only hash graph of admitted vertices.
#[derive(Debug, Clone, Default)]
pub struct HashGraph {
    vertices: HashMap<Hash, Vertex>,
    frontier: BTreeSet<Hash>,
}

impl HashGraph {
    /// An empty graph (before the root vertex is admitted).
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of admitted vertices.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// `true` if no vertex has been admitted.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Look up an admitted vertex by hash.
    pub fn get(&self, hash: Hash) -> Option<&Vertex> {
        self.vertices.get(&hash)
    }

    /// `true` if `hash` names an admitted vertex.
    pub fn contains(&self, hash: Hash) -> bool {
        self.vertices.contains_key(&hash)
    }

    /// Insert `v`: adds edges dep→v, removes every dep from the frontier,
    /// adds v to the frontier.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownDependency`] if any declared
    /// dependency is not already admitted, or
    /// [`GraphError::DuplicateVertex`] if `v.hash` is already present.
    pub fn add_vertex(&mut self, v: Vertex) -> Result<(), GraphError> {
        if self.vertices.contains_key(&v.hash) {
            return Err(GraphError::DuplicateVertex(v.hash));
        }
        for dep in &v.dependencies {
            if !self.vertices.contains_key(dep) {
                return Err(GraphError::UnknownDependency(*dep));
            }
        }
        for dep in &v.dependencies {
            self.frontier.remove(dep);
        }
        let hash = v.hash;
        self.frontier.insert(hash);
        self.vertices.insert(hash, v);
        Ok(())
    }

    /// The current frontier, sorted by hash for determinism.
    pub fn get_frontier(&self) -> Vec<Hash> {
        self.frontier.iter().copied().collect()
    }

    /// Every ancestor of `h`, including `h` itself.
    fn ancestors_inclusive(&self, h: Hash) -> BTreeSet<Hash> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![h];
        while let Some(cur) = stack.pop() {
            if !seen.insert(cur) {
                continue;
            }
            if let Some(v) = self.vertices.get(&cur) {
                for dep in &v.dependencies {
                    stack.push(*dep);
                }
            }
        }
        seen
    }

    fn is_ancestor_of(&self, candidate: Hash, of: Hash) -> bool {
        candidate != of && self.ancestors_inclusive(of).contains(&candidate)
    }

    /// Classic two-head LCA: the common ancestor of `a` and `b` with no
    /// descendant (restricted to the common-ancestor set) also common.
    /// Ties among equally-valid candidates broken by lexicographic hash
    /// order.
    fn pairwise_lca(&self, a: Hash, b: Hash) -> Hash {
        let anc_a = self.ancestors_inclusive(a);
        let anc_b = self.ancestors_inclusive(b);
        let common: Vec<Hash> = anc_a.intersection(&anc_b).copied().collect();
        let mut candidates: Vec<Hash> = common
            .iter()
            .copied()
            .filter(|&c| !common.iter().any(|&other| other != c && self.is_ancestor_of(c, other)))
            .collect();
        candidates.sort_unstable();
        candidates
            .into_iter()
            .next()
            .unwrap_or_else(drp_hash::root_hash)
    }

    /// Compute the lowest common ancestor of `heads` and the subgraph of
    /// every vertex on a path from that ancestor (exclusive) to any head
    /// (inclusive).
    ///
    /// For N heads the ancestor itself is computed by iterated pairwise
    /// LCA folding of the candidate set, per the general algorithm; a
    /// single head is the degenerate case documented in
    /// `single_parent_has_empty_subgraph` below, where the head is its
    /// own LCA and the subgraph is empty.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::EmptyHeads`] if `heads` is empty.
    pub fn lowest_common_ancestor(
        &self,
        heads: &[Hash],
    ) -> Result<(Hash, BTreeSet<Hash>), GraphError> {
        let Some((&first, rest)) = heads.split_first() else {
            return Err(GraphError::EmptyHeads);
        };
        if rest.is_empty() {
            return Ok((first, BTreeSet::new()));
        }

        let mut candidates: Vec<Hash> = heads.to_vec();
        while candidates.len() > 1 {
            // unwraps are infallible: the loop guard guarantees at least two elements.
            #[allow(clippy::unwrap_used)]
            let b = candidates.pop().unwrap();
            #[allow(clippy::unwrap_used)]
            let a = candidates.pop().unwrap();
            candidates.push(self.pairwise_lca(a, b));
        }
        #[allow(clippy::unwrap_used)]
        let lca = candidates.into_iter().next().unwrap();

        let anc_lca = self.ancestors_inclusive(lca);
        let mut subgraph = BTreeSet::new();
        for &head in heads {
            for v in self.ancestors_inclusive(head) {
                if !anc_lca.contains(&v) {
                    subgraph.insert(v);
                }
            }
        }
        Ok((lca, subgraph))
    }

    /// Deterministically linearize every vertex in `subgraph`.
    ///
    /// Restricted topological sort with concurrent sets resolved per the
    /// relevant track's conflict-resolution protocol; operations a
    /// resolver drops are excluded from the returned sequence, but the
    /// owning vertex still counts as processed for the purpose of the
    /// sort.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownDependency`] if `subgraph` names a
    /// hash this graph has not admitted.
    pub fn linearize_operations(
        &self,
        subgraph: &BTreeSet<Hash>,
        resolvers: &Resolvers<'_>,
    ) -> Result<Vec<(Hash, Operation)>, GraphError> {
        let mut deps_in_subgraph: BTreeMap<Hash, BTreeSet<Hash>> = BTreeMap::new();
        for &h in subgraph {
            let v = self.vertices.get(&h).ok_or(GraphError::UnknownDependency(h))?;
            let deps = v
                .dependencies
                .iter()
                .copied()
                .filter(|d| subgraph.contains(d))
                .collect();
            deps_in_subgraph.insert(h, deps);
        }

        let mut emitted: BTreeSet<Hash> = BTreeSet::new();
        let mut remaining: BTreeSet<Hash> = subgraph.clone();
        let mut result = Vec::with_capacity(subgraph.len());

        while !remaining.is_empty() {
            let ready: Vec<Hash> = remaining
                .iter()
                .copied()
                .filter(|h| deps_in_subgraph[h].is_subset(&emitted))
                .collect();
            if ready.is_empty() {
                // Every vertex in `subgraph` was reachable from the
                // ancestors-based construction in `lowest_common_ancestor`,
                // so a finite DAG always has a ready set here; stop rather
                // than loop forever if that invariant is ever violated.
                break;
            }
            let mut sorted_ready = ready.clone();
            sorted_ready.sort_unstable();

            let mut by_kind: BTreeMap<DrpKind, Vec<(Hash, Operation)>> = BTreeMap::new();
            for h in &sorted_ready {
                let v = &self.vertices[h];
                by_kind
                    .entry(v.operation.drp_type)
                    .or_default()
                    .push((*h, v.operation.clone()));
            }

            for kind in [DrpKind::Drp, DrpKind::Acl] {
                if let Some(ops) = by_kind.remove(&kind) {
                    let resolver = resolvers.for_kind(kind);
                    result.extend(resolve_concurrent_set(ops, resolver));
                }
            }

            for h in sorted_ready {
                emitted.insert(h);
                remaining.remove(&h);
            }
        }

        Ok(result)
    }
}

fn resolve_concurrent_set(
    ops: Vec<(Hash, Operation)>,
    resolver: Option<&dyn Drp>,
) -> Vec<(Hash, Operation)> {
    if ops.len() <= 1 {
        return ops;
    }
    let Some(resolver) = resolver else {
        return ops;
    };
    match resolver.semantics() {
        drp_types::SemanticsTag::Multiple => {
            let plain: Vec<Operation> = ops.iter().map(|(_, op)| op.clone()).collect();
            let survivors = resolver.resolve_many(&plain);
            ops.into_iter()
                .filter(|(_, op)| survivors.contains(op))
                .collect()
        }
        drp_types::SemanticsTag::Pairwise => {
            let mut dropped: BTreeSet<Hash> = BTreeSet::new();
            for i in 0..ops.len() {
                for j in (i + 1)..ops.len() {
                    let (ha, a) = &ops[i];
                    let (hb, b) = &ops[j];
                    match resolver.resolve_pair(a, b) {
                        ConflictVerdict::DropLeft => {
                            dropped.insert(*ha);
                        }
                        ConflictVerdict::DropRight => {
                            dropped.insert(*hb);
                        }
                        ConflictVerdict::NoConflict => {}
                    }
                }
            }
            ops.into_iter().filter(|(h, _)| !dropped.contains(h)).collect()
        }
    }
}
