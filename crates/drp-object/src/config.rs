// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Construction-time configuration for a [`crate::DrpObject`].

use std::sync::Arc;

use drp_contract::{Acl, Drp};

use crate::clock::{Clock, SystemClock};

/// Tunables that do not change the causal model, only operational
/// tolerances.
#[derive(Clone)]
pub struct EngineConfig {
    /// How far into the future (in milliseconds) an incoming vertex's
    /// timestamp may read before validation rejects it as "from the
    /// future".
    pub max_future_skew_millis: u64,
    /// The clock consulted by `apply_local` and `validate_vertex`.
    pub clock: Arc<dyn Clock>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_future_skew_millis: 5_000,
            clock: Arc::new(SystemClock),
        }
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("max_future_skew_millis", &self.max_future_skew_millis)
            .finish_non_exhaustive()
    }
}

/// Construction-time options for [`crate::DrpObject::new`].
///
/// Exactly one of `acl` or `public_credential` must be supplied: either
/// an explicit ACL instance, or a bare credential the engine wraps in a
/// default permissionless [`drp_acl::DefaultAcl`] naming that credential
/// as sole admin.
pub struct EngineOptions {
    /// This object's local peer id.
    pub peer_id: String,
    /// A bare credential used to construct the default ACL when `acl`
    /// is not supplied.
    pub public_credential: Option<String>,
    /// An explicit ACL instance, taking precedence over
    /// `public_credential` when both are set.
    pub acl: Option<Box<dyn Acl>>,
    /// The user-supplied replicated data structure. `None` runs the
    /// engine in ACL-only mode.
    pub drp: Option<Box<dyn Drp>>,
    /// Override the computed object id instead of deriving one from
    /// `peer_id` and a fresh random nonce.
    pub id: Option<drp_hash::Hash>,
    /// Operational tunables.
    pub config: EngineConfig,
}

impl EngineOptions {
    /// Start building options for `peer_id` with every optional field
    /// unset. Callers must still supply exactly one of `acl` /
    /// `public_credential` before passing this to
    /// [`crate::DrpObject::new`].
    pub fn new(peer_id: impl Into<String>) -> Self {
        Self {
            peer_id: peer_id.into(),
            public_credential: None,
            acl: None,
            drp: None,
            id: None,
            config: EngineConfig::default(),
        }
    }

    /// Set the public credential used to mint a default ACL.
    #[must_use]
    pub fn with_public_credential(mut self, credential: impl Into<String>) -> Self {
        self.public_credential = Some(credential.into());
        self
    }

    /// Set an explicit ACL instance.
    #[must_use]
    pub fn with_acl(mut self, acl: Box<dyn Acl>) -> Self {
        self.acl = Some(acl);
        self
    }

    /// Set the user DRP.
    #[must_use]
    pub fn with_drp(mut self, drp: Box<dyn Drp>) -> Self {
        self.drp = Some(drp);
        self
    }

    /// Override the computed object id.
    #[must_use]
    pub fn with_id(mut self, id: drp_hash::Hash) -> Self {
        self.id = Some(id);
        self
    }

    /// Override the default operational config.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }
}
