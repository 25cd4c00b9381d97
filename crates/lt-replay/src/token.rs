//! # Replay Tokens and Verdicts

use lt_core::{Jti, TenantId, Timestamp, ValidationError};
use serde::{Deserialize, Serialize};

/// Longest TTL a single-use token may request (24 hours).
pub const MAX_TTL_SECS: u64 = 86_400;

/// Shortest TTL a single-use token may request. A zero TTL would make the
/// token expire at the instant it is consumed, which is never single-use.
pub const MIN_TTL_SECS: u64 = 1;

/// Store key: a token id scoped to its tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplayKey {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Token identifier.
    pub jti: Jti,
}

impl ReplayKey {
    /// Build a key from borrowed parts.
    pub fn new(tenant_id: &TenantId, jti: &Jti) -> Self {
        Self {
            tenant_id: tenant_id.clone(),
            jti: jti.clone(),
        }
    }
}

impl std::fmt::Display for ReplayKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.jti)
    }
}

/// A consumption request: the key plus the window it should stay consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayToken {
    key: ReplayKey,
    ttl_secs: u64,
}

impl ReplayToken {
    /// Validate the TTL and build a token.
    pub fn new(tenant_id: &TenantId, jti: &Jti, ttl_secs: u64) -> Result<Self, ValidationError> {
        if !(MIN_TTL_SECS..=MAX_TTL_SECS).contains(&ttl_secs) {
            return Err(ValidationError::DurationOutOfRange {
                value: ttl_secs,
                min: MIN_TTL_SECS,
                max: MAX_TTL_SECS,
            });
        }
        Ok(Self {
            key: ReplayKey::new(tenant_id, jti),
            ttl_secs,
        })
    }

    /// The store key.
    pub fn key(&self) -> &ReplayKey {
        &self.key
    }

    /// Requested TTL in seconds.
    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Expiry this token receives if consumed at `now`.
    pub fn expires_at(&self, now: Timestamp) -> Timestamp {
        now.plus_secs(self.ttl_secs)
    }
}

/// Raw answer from a [`crate::ReplayStore`] consume call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// The key was unseen (or expired) and is now recorded.
    Accepted {
        /// Expiry written for the key.
        expires_at: Timestamp,
    },
    /// The key is already consumed and not yet expired.
    Rejected {
        /// Expiry of the existing record, if the store could report it.
        expires_at: Option<Timestamp>,
    },
}

/// Decision handed to callers by [`crate::ReplayGuard::consume`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayVerdict {
    /// First use within the window.
    Fresh {
        /// When the token becomes reusable.
        expires_at: Timestamp,
    },
    /// The token was already used inside its window.
    Replayed {
        /// Seconds until the existing record expires, when known.
        retry_after_secs: Option<u64>,
    },
}

impl ReplayVerdict {
    /// Whether the token was accepted.
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh { .. })
    }
}
