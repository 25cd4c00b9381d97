//! # Replay Guard Errors

use lt_core::ValidationError;
use thiserror::Error;

/// Failure inside a [`crate::ReplayStore`] backend.
#[derive(Error, Debug)]
pub enum ReplayStoreError {
    /// The backing database rejected or failed the operation.
    #[error("replay store database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The backend is not reachable or not configured.
    #[error("replay store unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned by [`crate::ReplayGuard`].
///
/// Every variant means "the token could not be verified as unused" and must
/// be handled as a rejection of the request.
#[derive(Error, Debug)]
pub enum ReplayError {
    /// The token itself is invalid (e.g. TTL out of range).
    #[error("invalid replay token: {0}")]
    InvalidToken(#[from] ValidationError),

    /// The backing store failed or is unreachable.
    #[error("replay store unavailable: {0}")]
    Unavailable(#[from] ReplayStoreError),

    /// The backing store did not answer within the configured timeout.
    #[error("replay store timed out after {after_ms}ms")]
    Timeout {
        /// The timeout that elapsed, in milliseconds.
        after_ms: u64,
    },
}

impl ReplayError {
    /// Whether this error stems from store availability rather than input.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout { .. })
    }
}
