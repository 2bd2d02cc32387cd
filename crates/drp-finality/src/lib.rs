// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-vertex finality bookkeeping.
//!
//! On admission, each vertex gets a finality entry keyed by its hash
//! with the ACL's signer set at that vertex and an empty attestation
//! set. This crate only owns correct signer-set determination at
//! admission time and bookkeeping of attestations handed to it;
//! signature verification is a collaborator's responsibility.
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

use std::collections::{BTreeSet, HashMap};

use drp_hash::Hash;
use drp_types::StateError;

/// An opaque attestation: a signer asserting finality over a vertex.
/// The signature blob is carried verbatim and never interpreted here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attestation {
    /// The attesting peer.
    pub signer: String,
    /// Opaque signature bytes.
    pub signature: Vec<u8>,
}

/// Finality bookkeeping for a single vertex.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalityState {
    /// Peers whose attestation is required for this vertex to be final.
    pub required_signers: BTreeSet<String>,
    /// Attestations collected so far, keyed by signer.
    pub attestations: HashMap<String, Attestation>,
}

impl FinalityState {
    /// `true` once every required signer has attested.
    pub fn is_final(&self) -> bool {
        self.required_signers
            .iter()
            .all(|signer| self.attestations.contains_key(signer))
    }
}

/// The full set of per-vertex finality entries for one object.
#[derive(Debug, Clone, Default)]
pub struct FinalityStore {
    entries: HashMap<Hash, FinalityState>,
}

impl FinalityStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the finality entry for a newly admitted vertex, recording
    /// the ACL-derived signer set in force at that vertex.
    pub fn init_for_vertex(&mut self, hash: Hash, required_signers: BTreeSet<String>) {
        self.entries.insert(
            hash,
            FinalityState {
                required_signers,
                attestations: HashMap::new(),
            },
        );
    }

    /// Record an attestation without verifying it.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::MissingFinalityEntry`] if `hash` has no
    /// finality entry (it must be admitted first).
    pub fn add_attestation(
        &mut self,
        hash: Hash,
        signer: impl Into<String>,
        signature: Vec<u8>,
    ) -> Result<(), StateError> {
        let entry = self
            .entries
            .get_mut(&hash)
            .ok_or(StateError::MissingFinalityEntry(hash))?;
        let signer = signer.into();
        entry.attestations.insert(signer.clone(), Attestation { signer, signature });
        Ok(())
    }

    /// `true` once the collected signer set is a superset of the
    /// required signer set for `hash`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::MissingFinalityEntry`] if `hash` has no
    /// finality entry.
    pub fn is_final(&self, hash: Hash) -> Result<bool, StateError> {
        self.entries
            .get(&hash)
            .map(FinalityState::is_final)
            .ok_or(StateError::MissingFinalityEntry(hash))
    }

    /// Look up the finality state for `hash`, if admitted.
    pub fn get(&self, hash: Hash) -> Option<&FinalityState> {
        self.entries.get(&hash)
    }
}
