// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The object engine: owns the hash graph, the two state caches (DRP and
//! ACL), the finality store, and the subscriber list. Provides the
//! local-application, merge, and validation entry points that turn
//! intercepted method calls and remote vertices into a converging,
//! causally-ordered object.
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

mod clock;
mod config;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{EngineConfig, EngineOptions};

use std::collections::{BTreeSet, HashMap};

use drp_acl::DefaultAcl;
use drp_contract::{Acl, Drp};
use drp_graph::{HashGraph, Resolvers};
use drp_finality::FinalityStore;
use drp_hash::Hash;
use drp_types::{ConstructionError, DrpKind, DrpState, EngineError, Operation, OperationError, StateError, Vertex};
use rand::RngCore;

/// The outcome of a local mutating call.
#[derive(Debug)]
pub enum ApplyOutcome {
    /// The call changed state; a new vertex was admitted at this hash.
    Applied(Hash),
    /// The call succeeded but left state unchanged; no vertex created.
    NoOp,
    /// The call was rejected by the DRP; no vertex created.
    Failed(EngineError),
}

/// The outcome of merging a batch of remote vertices.
#[derive(Debug, Default)]
pub struct MergeReport {
    /// `true` if every vertex in the batch was admitted.
    pub all_merged: bool,
    /// Hashes that failed validation or referenced unmet dependencies;
    /// the caller should fetch ancestors and retry.
    pub missing: BTreeSet<Hash>,
    /// Hashes newly admitted by this call, in admission order.
    pub admitted: Vec<Hash>,
}

type Subscriber = Box<dyn Fn(&DrpObject, &str, &[Vertex]) + Send + Sync>;

/// The replicated object: one hash graph plus the live DRP/ACL pair
/// tracked on it.
pub struct DrpObject {
    id: Hash,
    peer_id: String,
    graph: HashGraph,
    drp: Option<Box<dyn Drp>>,
    acl: Box<dyn Acl>,
    original_drp: Option<Box<dyn Drp>>,
    original_acl: Box<dyn Acl>,
    drp_states: HashMap<Hash, DrpState>,
    acl_states: HashMap<Hash, DrpState>,
    finality: FinalityStore,
    subscribers: Vec<Subscriber>,
    config: EngineConfig,
}

impl DrpObject {
    /// Construct a fresh object. Exactly one of `opts.acl` /
    /// `opts.public_credential` must be set.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::MissingAclOrCredential`] if neither
    /// is set.
    pub fn new(opts: EngineOptions) -> Result<Self, EngineError> {
        let acl: Box<dyn Acl> = match (opts.acl, opts.public_credential) {
            (Some(acl), _) => acl,
            (None, Some(credential)) => Box::new(DefaultAcl::new_with_admin(credential)),
            (None, None) => return Err(ConstructionError::MissingAclOrCredential.into()),
        };

        let root_hash = drp_hash::root_hash();
        let mut graph = HashGraph::new();
        let root = Vertex {
            hash: root_hash,
            peer_id: String::new(),
            operation: Operation::new(DrpKind::Drp, "root", serde_json::json!({"sentinel": "ROOT"})),
            dependencies: Vec::new(),
            timestamp: 0,
            signature: Vec::new(),
        };
        // Infallible: an empty graph has no duplicate or unknown-dependency
        // vertex to conflict with.
        #[allow(clippy::unwrap_used)]
        graph.add_vertex(root).unwrap();

        let mut drp_states = HashMap::new();
        drp_states.insert(root_hash, DrpState::empty());
        let mut acl_states = HashMap::new();
        acl_states.insert(root_hash, DrpState::empty());

        let mut finality = FinalityStore::new();
        finality.init_for_vertex(root_hash, acl.finality_signers());

        let id = opts.id.unwrap_or_else(|| {
            let mut nonce = [0u8; 16];
            rand::rngs::OsRng.fill_bytes(&mut nonce);
            drp_hash::object_id(&opts.peer_id, &nonce)
        });

        Ok(Self {
            id,
            peer_id: opts.peer_id,
            graph,
            original_drp: opts.drp.clone(),
            drp: opts.drp,
            original_acl: acl.clone(),
            acl,
            drp_states,
            acl_states,
            finality,
            subscribers: Vec::new(),
            config: opts.config,
        })
    }

    /// This object's content-addressed id.
    pub fn id(&self) -> Hash {
        self.id
    }

    /// This object's local peer id.
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// The underlying hash graph.
    pub fn graph(&self) -> &HashGraph {
        &self.graph
    }

    /// The current frontier.
    pub fn frontier(&self) -> Vec<Hash> {
        self.graph.get_frontier()
    }

    /// The live user DRP, if one is registered (`None` in ACL-only mode).
    pub fn drp(&self) -> Option<&dyn Drp> {
        self.drp.as_deref()
    }

    /// The live ACL.
    pub fn acl(&self) -> &dyn Acl {
        self.acl.as_ref()
    }

    /// Register a subscriber notified with `(self, origin, vertices)` on
    /// every state-changing call. `origin` is `"callFn"` for
    /// [`DrpObject::apply_local`] and `"merge"` for [`DrpObject::merge`].
    pub fn subscribe(&mut self, cb: impl Fn(&DrpObject, &str, &[Vertex]) + Send + Sync + 'static) {
        self.subscribers.push(Box::new(cb));
    }

    fn notify(&self, origin: &str, vertices: &[Vertex]) {
        for sub in &self.subscribers {
            sub(self, origin, vertices);
        }
    }

    /// Reconstruct the DRP and ACL exactly as they stood at `lca`, with
    /// none of the subgraph's own operations replayed yet.
    ///
    /// Resolvers consulted while linearizing a concurrent set must reflect
    /// the state at the frontier being linearized, not whichever state
    /// happens to be live on the local peer right now — otherwise two
    /// peers merging the same frontier could linearize it differently.
    fn reconstruct_at(&self, lca: Hash) -> Result<(Option<Box<dyn Drp>>, Box<dyn Acl>), EngineError> {
        let drp = match self.original_drp.as_ref() {
            Some(original) => {
                let cached = self
                    .drp_states
                    .get(&lca)
                    .ok_or(StateError::MissingCachedState(lca))?;
                let mut obj = original.clone();
                obj.load_state(cached);
                Some(obj)
            }
            None => None,
        };
        let acl_cached = self
            .acl_states
            .get(&lca)
            .ok_or(StateError::MissingCachedState(lca))?;
        let mut acl = self.original_acl.clone();
        acl.load_state(acl_cached);
        Ok((drp, acl))
    }

    /// Reconstruct the user DRP at `deps`. `Ok(None)` in ACL-only mode.
    fn compute_drp_at(&self, deps: &[Hash]) -> Result<Option<Box<dyn Drp>>, EngineError> {
        if self.original_drp.is_none() {
            return Ok(None);
        }
        let (lca, subgraph) = self.graph.lowest_common_ancestor(deps)?;
        let (drp_at_lca, acl_at_lca) = self.reconstruct_at(lca)?;
        let Some(mut drp_obj) = drp_at_lca else {
            return Ok(None);
        };
        let acl_ref: &dyn Drp = acl_at_lca.as_ref();
        let resolvers = Resolvers {
            drp: Some(drp_obj.as_ref()),
            acl: Some(acl_ref),
        };
        let ops = self.graph.linearize_operations(&subgraph, &resolvers)?;
        for (_, op) in ops.iter().filter(|(_, op)| op.drp_type == DrpKind::Drp) {
            drp_obj.apply(op)?;
        }
        Ok(Some(drp_obj))
    }

    /// Reconstruct the ACL at `deps`.
    fn compute_acl_at(&self, deps: &[Hash]) -> Result<Box<dyn Acl>, EngineError> {
        let (lca, subgraph) = self.graph.lowest_common_ancestor(deps)?;
        let (drp_at_lca, mut acl_obj) = self.reconstruct_at(lca)?;
        let acl_ref: &dyn Drp = acl_obj.as_ref();
        let resolvers = Resolvers {
            drp: drp_at_lca.as_deref(),
            acl: Some(acl_ref),
        };
        let ops = self.graph.linearize_operations(&subgraph, &resolvers)?;
        for (_, op) in ops.iter().filter(|(_, op)| op.drp_type == DrpKind::Acl) {
            acl_obj.apply(op)?;
        }
        Ok(acl_obj)
    }

    /// Invoke a pure `query_*` read against the live DRP or ACL. Leaves
    /// `vertices`, the frontier, and the state caches unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::UnknownOperation`] if no DRP is
    /// registered and `kind` is [`DrpKind::Drp`], or if the query method
    /// itself is unknown.
    pub fn query(&self, kind: DrpKind, op_type: &str, args: &serde_json::Value) -> Result<serde_json::Value, OperationError> {
        match kind {
            DrpKind::Drp => self
                .drp
                .as_deref()
                .ok_or_else(|| OperationError::UnknownOperation(op_type.to_string()))?
                .query(op_type, args),
            DrpKind::Acl => self.acl.query(op_type, args),
        }
    }

    /// Apply a local mutating call, turning it into a new vertex if
    /// state changes.
    pub fn apply_local(&mut self, kind: DrpKind, op_type: &str, value: serde_json::Value) -> ApplyOutcome {
        let deps = self.graph.get_frontier();
        let operation = Operation::new(kind, op_type, value);
        let result = match kind {
            DrpKind::Drp => self.apply_local_drp(&deps, &operation),
            DrpKind::Acl => self.apply_local_acl(&deps, &operation),
        };
        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(op_type = %operation.op_type, peer_id = %self.peer_id, error = %e, "apply_local failed");
                ApplyOutcome::Failed(e)
            }
        }
    }

    fn apply_local_drp(&mut self, deps: &[Hash], operation: &Operation) -> Result<ApplyOutcome, EngineError> {
        let Some(pre) = self.compute_drp_at(deps)? else {
            return Ok(ApplyOutcome::Failed(
                OperationError::UnknownOperation(operation.op_type.clone()).into(),
            ));
        };
        let mut next = pre.clone();
        if let Err(e) = next.apply(operation) {
            return Ok(ApplyOutcome::Failed(e.into()));
        }
        if next.state_eq(pre.as_ref()) {
            return Ok(ApplyOutcome::NoOp);
        }
        let acl_here = self.compute_acl_at(deps)?;
        let timestamp = self.config.clock.now_millis();
        let hash = drp_hash::vertex_hash(&self.peer_id, operation, deps, timestamp)?;
        let vertex = Vertex {
            hash,
            peer_id: self.peer_id.clone(),
            operation: operation.clone(),
            dependencies: deps.to_vec(),
            timestamp,
            signature: Vec::new(),
        };
        self.graph.add_vertex(vertex.clone())?;
        self.drp_states.insert(hash, next.snapshot_state());
        self.acl_states.insert(hash, acl_here.snapshot_state());
        self.finality.init_for_vertex(hash, acl_here.finality_signers());
        self.drp = Some(next);
        tracing::debug!(hash = %hash, peer_id = %self.peer_id, "applied local drp operation");
        self.notify("callFn", std::slice::from_ref(&vertex));
        Ok(ApplyOutcome::Applied(hash))
    }

    fn apply_local_acl(&mut self, deps: &[Hash], operation: &Operation) -> Result<ApplyOutcome, EngineError> {
        let pre = self.compute_acl_at(deps)?;
        let mut next = pre.clone();
        if let Err(e) = next.apply(operation) {
            return Ok(ApplyOutcome::Failed(e.into()));
        }
        if next.state_eq(pre.as_ref()) {
            return Ok(ApplyOutcome::NoOp);
        }
        let drp_here = self.compute_drp_at(deps)?;
        let timestamp = self.config.clock.now_millis();
        let hash = drp_hash::vertex_hash(&self.peer_id, operation, deps, timestamp)?;
        let vertex = Vertex {
            hash,
            peer_id: self.peer_id.clone(),
            operation: operation.clone(),
            dependencies: deps.to_vec(),
            timestamp,
            signature: Vec::new(),
        };
        self.graph.add_vertex(vertex.clone())?;
        self.acl_states.insert(hash, next.snapshot_state());
        self.drp_states.insert(
            hash,
            drp_here.map_or_else(DrpState::empty, |d| d.snapshot_state()),
        );
        self.finality.init_for_vertex(hash, next.finality_signers());
        self.acl = next;
        tracing::debug!(hash = %hash, peer_id = %self.peer_id, "applied local acl operation");
        self.notify("callFn", std::slice::from_ref(&vertex));
        Ok(ApplyOutcome::Applied(hash))
    }

    /// Validate `v` against every admission rule. Callers of
    /// [`DrpObject::merge`] check "already present" themselves before
    /// calling this, so a replayed vertex is a no-op rather than a
    /// validation failure; this function does not repeat that check.
    ///
    /// # Errors
    ///
    /// Returns the specific [`drp_types::ValidationError`] (wrapped in
    /// [`EngineError`]) that failed, or a [`StateError`] if internal
    /// state needed to evaluate the writer check is missing.
    pub fn validate_vertex(&self, v: &Vertex) -> Result<(), EngineError> {
        let recomputed = v.recompute_hash().unwrap_or(Hash([0u8; 32]));
        if recomputed != v.hash {
            return Err(drp_types::ValidationError::HashMismatch {
                stored: v.hash,
                recomputed,
            }
            .into());
        }
        if v.dependencies.is_empty() {
            return Err(drp_types::ValidationError::MissingDependencies(v.hash).into());
        }
        for dep in &v.dependencies {
            let Some(dep_vertex) = self.graph.get(*dep) else {
                return Err(drp_types::ValidationError::UnknownDependency(*dep).into());
            };
            if dep_vertex.timestamp > v.timestamp {
                return Err(drp_types::ValidationError::TimestampNotMonotonic {
                    dep: *dep,
                    dep_ts: dep_vertex.timestamp,
                    vertex_ts: v.timestamp,
                }
                .into());
            }
        }
        let now = self.config.clock.now_millis();
        if v.timestamp > now.saturating_add(self.config.max_future_skew_millis) {
            return Err(drp_types::ValidationError::FutureTimestamp {
                vertex_ts: v.timestamp,
                now,
            }
            .into());
        }
        let acl_at_deps = self.compute_acl_at(&v.dependencies)?;
        if !acl_at_deps.is_writer(&v.peer_id) {
            return Err(drp_types::ValidationError::PermissionDenied(v.peer_id.clone()).into());
        }
        Ok(())
    }

    /// Admit a batch of remote vertices.
    ///
    /// Vertices that fail validation (a [`drp_types::ValidationError`]) or
    /// reference dependencies this peer hasn't seen yet (a
    /// [`drp_types::GraphError`]) are recorded in `missing` rather than
    /// aborting the whole batch; the caller should fetch ancestors and
    /// retry. A [`StateError`] indicates cached state this peer's own
    /// prior admissions guarantee should exist is missing — an internal
    /// consistency fault, not a property of the incoming vertex — and is
    /// propagated instead of being folded into `missing`.
    ///
    /// # Errors
    ///
    /// Returns the [`StateError`] (wrapped in [`EngineError`]) encountered
    /// while validating or admitting any vertex in the batch, or while
    /// refreshing the live DRP/ACL references afterward.
    pub fn merge(&mut self, vertices: Vec<Vertex>) -> Result<MergeReport, EngineError> {
        let mut missing = BTreeSet::new();
        let mut admitted = Vec::new();

        for v in vertices {
            if v.operation.op_type.is_empty() || self.graph.contains(v.hash) {
                continue;
            }
            if let Err(e) = self.validate_vertex(&v) {
                if matches!(e, EngineError::State(_)) {
                    return Err(e);
                }
                tracing::warn!(hash = %v.hash, error = %e, "rejected vertex during merge");
                missing.insert(v.hash);
                continue;
            }
            match self.admit_validated_vertex(v.clone()) {
                Ok(()) => admitted.push(v.hash),
                Err(e) => {
                    if matches!(e, EngineError::State(_)) {
                        return Err(e);
                    }
                    tracing::warn!(hash = %v.hash, error = %e, "failed to admit validated vertex");
                    missing.insert(v.hash);
                }
            }
        }

        self.refresh_live_refs()?;

        if !admitted.is_empty() {
            let admitted_vertices: Vec<Vertex> = admitted
                .iter()
                .filter_map(|h| self.graph.get(*h).cloned())
                .collect();
            self.notify("merge", &admitted_vertices);
        }

        Ok(MergeReport {
            all_merged: missing.is_empty(),
            missing,
            admitted,
        })
    }

    fn admit_validated_vertex(&mut self, v: Vertex) -> Result<(), EngineError> {
        let deps = v.dependencies.clone();
        let drp_pre = self.compute_drp_at(&deps)?;
        let acl_pre = self.compute_acl_at(&deps)?;

        let (drp_snapshot, acl_snapshot, signers) = match v.operation.drp_type {
            DrpKind::Drp => {
                let mut drp_next = drp_pre.ok_or_else(|| StateError::MissingCachedState(v.hash))?;
                drp_next.apply(&v.operation)?;
                (drp_next.snapshot_state(), acl_pre.snapshot_state(), acl_pre.finality_signers())
            }
            DrpKind::Acl => {
                let mut acl_next = acl_pre;
                acl_next.apply(&v.operation)?;
                let drp_snapshot = drp_pre.map_or_else(DrpState::empty, |d| d.snapshot_state());
                (drp_snapshot, acl_next.snapshot_state(), acl_next.finality_signers())
            }
        };

        self.graph.add_vertex(v.clone())?;
        self.drp_states.insert(v.hash, drp_snapshot);
        self.acl_states.insert(v.hash, acl_snapshot);
        self.finality.init_for_vertex(v.hash, signers);
        tracing::debug!(hash = %v.hash, peer_id = %v.peer_id, "admitted merged vertex");
        Ok(())
    }

    fn refresh_live_refs(&mut self) -> Result<(), EngineError> {
        let frontier = self.graph.get_frontier();
        if frontier.is_empty() {
            return Ok(());
        }
        if let Some(drp) = self.compute_drp_at(&frontier)? {
            self.drp = Some(drp);
        }
        self.acl = self.compute_acl_at(&frontier)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drp_contract::ConflictVerdict;
    use drp_types::SemanticsTag;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Counter {
        value: i64,
    }

    impl Drp for Counter {
        fn apply(&mut self, op: &Operation) -> Result<(), OperationError> {
            match op.op_type.as_str() {
                "increment" => {
                    self.value += op.value.as_i64().unwrap_or(1);
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
            if let Some(v) = state.get("value").and_then(serde_json::Value::as_i64) {
                self.value = v;
            }
        }
    }

    #[derive(Clone)]
    struct LastWriterWins {
        value: Option<String>,
    }

    impl Drp for LastWriterWins {
        fn apply(&mut self, op: &Operation) -> Result<(), OperationError> {
            match op.op_type.as_str() {
                "write" => {
                    self.value = op.value.as_str().map(str::to_string);
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

        fn resolve_pair(&self, _a: &Operation, _b: &Operation) -> ConflictVerdict {
            ConflictVerdict::DropLeft
        }

        fn resolve_many(&self, ops: &[Operation]) -> Vec<Operation> {
            ops.to_vec()
        }

        fn snapshot_state(&self) -> DrpState {
            DrpState::from_entries([("value".to_string(), json!(self.value))])
        }

        fn load_state(&mut self, state: &DrpState) {
            if let Some(v) = state.get("value") {
                self.value = v.as_str().map(str::to_string);
            }
        }
    }

    fn fresh_counter_object(peer_id: &str) -> DrpObject {
        let opts = EngineOptions::new(peer_id)
            .with_public_credential(peer_id)
            .with_drp(Box::new(Counter::default()));
        DrpObject::new(opts).expect("valid construction")
    }

    #[test]
    fn three_local_increments_reach_counter_three() {
        let mut obj = fresh_counter_object("p1");
        for _ in 0..3 {
            let outcome = obj.apply_local(DrpKind::Drp, "increment", json!(1));
            assert!(matches!(outcome, ApplyOutcome::Applied(_)));
        }
        assert_eq!(obj.frontier().len(), 1);
        assert_eq!(obj.graph().len(), 4);
        let value = obj.query(DrpKind::Drp, "query_value", &json!(null)).unwrap();
        assert_eq!(value, json!(3));
    }

    #[test]
    fn query_never_creates_a_vertex() {
        let mut obj = fresh_counter_object("p1");
        let before = obj.graph().len();
        let _ = obj.apply_local(DrpKind::Drp, "increment", json!(1));
        let after_increment = obj.graph().len();
        let _ = obj.query(DrpKind::Drp, "query_value", &json!(null));
        assert_eq!(obj.graph().len(), after_increment);
        assert!(after_increment > before);
    }

    #[test]
    fn no_op_local_call_does_not_create_a_vertex() {
        let mut obj = fresh_counter_object("p1");
        let before = obj.graph().len();
        let outcome = obj.apply_local(DrpKind::Drp, "increment", json!(0));
        assert!(matches!(outcome, ApplyOutcome::NoOp));
        assert_eq!(obj.graph().len(), before);
    }

    fn fresh_lww_object(peer_id: &str, admin: &str) -> DrpObject {
        let opts = EngineOptions::new(peer_id)
            .with_public_credential(admin)
            .with_drp(Box::new(LastWriterWins { value: None }));
        DrpObject::new(opts).expect("valid construction")
    }

    #[test]
    fn concurrent_writes_converge_on_drop_left_resolution() {
        let mut p1 = fresh_lww_object("p1", "p1");
        let mut p2 = fresh_lww_object("p1", "p1");

        p1.apply_local(DrpKind::Drp, "write", json!("A"));
        p2.apply_local(DrpKind::Drp, "write", json!("B"));

        let p1_vertices: Vec<Vertex> = p1
            .frontier()
            .iter()
            .filter_map(|h| p1.graph().get(*h).cloned())
            .collect();
        let p2_vertices: Vec<Vertex> = p2
            .frontier()
            .iter()
            .filter_map(|h| p2.graph().get(*h).cloned())
            .collect();

        let report_on_p1 = p1.merge(p2_vertices).unwrap();
        assert!(report_on_p1.all_merged);
        let report_on_p2 = p2.merge(p1_vertices).unwrap();
        assert!(report_on_p2.all_merged);

        assert_eq!(p1.frontier().len(), 2);
        assert_eq!(p2.frontier().len(), 2);
        assert_eq!(
            p1.query(DrpKind::Drp, "query_value", &json!(null)).unwrap(),
            p2.query(DrpKind::Drp, "query_value", &json!(null)).unwrap()
        );
        assert_eq!(
            p1.query(DrpKind::Drp, "query_value", &json!(null)).unwrap(),
            json!("B")
        );
    }

    #[test]
    fn tampered_vertex_is_rejected_and_reported_missing() {
        let mut p1 = fresh_counter_object("p1");
        p1.apply_local(DrpKind::Drp, "increment", json!(1));
        let head = p1.frontier()[0];
        let mut tampered = p1.graph().get(head).unwrap().clone();
        tampered.hash = drp_hash::digest(b"tampered");

        let mut p2 = fresh_counter_object("p1");
        let report = p2.merge(vec![tampered.clone()]).unwrap();
        assert!(!report.all_merged);
        assert!(report.missing.contains(&tampered.hash));
    }

    #[test]
    fn non_writer_vertex_is_rejected() {
        let mut admin_side = fresh_counter_object("admin");
        let outcome = admin_side.apply_local(
            DrpKind::Acl,
            "set_permissionless",
            json!({"caller": "admin", "enabled": false}),
        );
        let locked_head = match outcome {
            ApplyOutcome::Applied(h) => h,
            other => panic!("expected the toggle to be applied, got {other:?}"),
        };

        let operation = Operation::new(DrpKind::Drp, "increment", json!(1));
        let timestamp = 2;
        let hash = drp_hash::vertex_hash("outsider", &operation, &[locked_head], timestamp).unwrap();
        let forged = Vertex {
            hash,
            peer_id: "outsider".to_string(),
            operation,
            dependencies: vec![locked_head],
            timestamp,
            signature: Vec::new(),
        };

        let report = admin_side.merge(vec![forged.clone()]).unwrap();
        assert!(!report.all_merged);
        assert!(report.missing.contains(&forged.hash));
    }

    #[test]
    fn permissionless_admits_any_writer_until_toggled_off() {
        let mut obj = fresh_counter_object("admin");
        let root = drp_hash::root_hash();
        let operation = Operation::new(DrpKind::Drp, "increment", json!(1));
        let timestamp = 1;
        let hash = drp_hash::vertex_hash("anyone", &operation, &[root], timestamp).unwrap();
        let vertex = Vertex {
            hash,
            peer_id: "anyone".to_string(),
            operation,
            dependencies: vec![root],
            timestamp,
            signature: Vec::new(),
        };
        let report = obj.merge(vec![vertex]).unwrap();
        assert!(report.all_merged);
    }

    #[test]
    fn subscribers_observe_local_applications() {
        let mut obj = fresh_counter_object("p1");
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        obj.subscribe(move |_object, origin, vertices| {
            seen_clone.lock().unwrap().push(format!("{origin}:{}", vertices.len()));
        });
        obj.apply_local(DrpKind::Drp, "increment", json!(1));
        assert_eq!(seen.lock().unwrap().as_slice(), ["callFn:1"]);
    }

    #[test]
    fn construction_requires_acl_or_credential() {
        let opts = EngineOptions::new("p1");
        let err = DrpObject::new(opts).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Construction(ConstructionError::MissingAclOrCredential)
        ));
    }

    #[test]
    fn re_merging_the_same_vertex_is_a_no_op() {
        let mut p1 = fresh_counter_object("p1");
        p1.apply_local(DrpKind::Drp, "increment", json!(1));
        let head = p1.frontier()[0];
        let vertex = p1.graph().get(head).unwrap().clone();

        let mut p2 = fresh_counter_object("p1");
        let first = p2.merge(vec![vertex.clone()]).unwrap();
        assert!(first.all_merged);
        assert_eq!(first.admitted, vec![vertex.hash]);
        let len_after_first = p2.graph().len();
        let value_after_first = p2.query(DrpKind::Drp, "query_value", &json!(null)).unwrap();

        let second = p2.merge(vec![vertex]).unwrap();
        assert!(second.all_merged);
        assert!(second.admitted.is_empty());
        assert_eq!(p2.graph().len(), len_after_first);
        assert_eq!(
            p2.query(DrpKind::Drp, "query_value", &json!(null)).unwrap(),
            value_after_first
        );
    }

    #[test]
    fn merge_order_does_not_affect_converged_state() {
        let mut p1 = fresh_lww_object("p1", "p1");
        let mut p2 = fresh_lww_object("p1", "p1");
        p1.apply_local(DrpKind::Drp, "write", json!("A"));
        p2.apply_local(DrpKind::Drp, "write", json!("B"));

        let a_vertices: Vec<Vertex> = p1
            .frontier()
            .iter()
            .filter_map(|h| p1.graph().get(*h).cloned())
            .collect();
        let b_vertices: Vec<Vertex> = p2
            .frontier()
            .iter()
            .filter_map(|h| p2.graph().get(*h).cloned())
            .collect();

        let mut recv_ab = fresh_lww_object("observer", "p1");
        recv_ab.merge(a_vertices.clone()).unwrap();
        recv_ab.merge(b_vertices.clone()).unwrap();

        let mut recv_ba = fresh_lww_object("observer", "p1");
        recv_ba.merge(b_vertices).unwrap();
        recv_ba.merge(a_vertices).unwrap();

        assert_eq!(recv_ab.frontier().len(), recv_ba.frontier().len());
        assert_eq!(
            recv_ab.query(DrpKind::Drp, "query_value", &json!(null)).unwrap(),
            recv_ba.query(DrpKind::Drp, "query_value", &json!(null)).unwrap()
        );
    }
}
