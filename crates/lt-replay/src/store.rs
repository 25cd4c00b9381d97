//! # Replay Store Contract

use async_trait::async_trait;
use lt_core::Timestamp;

use crate::error::ReplayStoreError;
use crate::token::{ConsumeOutcome, ReplayKey};

/// Persistence behind the replay guard.
///
/// Implementations must make [`ReplayStore::consume`] atomic per key: of any
/// number of concurrent calls for the same unexpired key, exactly one returns
/// [`ConsumeOutcome::Accepted`]. A record whose `expires_at <= now` counts as
/// absent.
#[async_trait]
pub trait ReplayStore: Send + Sync + std::fmt::Debug {
    /// Check-and-set: record `key` until `expires_at` unless an unexpired
    /// record already exists. An existing record is never modified.
    async fn consume(
        &self,
        key: &ReplayKey,
        expires_at: Timestamp,
        now: Timestamp,
    ) -> Result<ConsumeOutcome, ReplayStoreError>;

    /// Expiry of the unexpired record for `key`, if any.
    async fn get(
        &self,
        key: &ReplayKey,
        now: Timestamp,
    ) -> Result<Option<Timestamp>, ReplayStoreError>;

    /// Unconditionally write `key` with the given expiry.
    async fn put(&self, key: &ReplayKey, expires_at: Timestamp) -> Result<(), ReplayStoreError>;

    /// Delete the record for `key` if it still carries `expires_at`, handing
    /// the key back to the next caller. Returns whether a record was removed.
    async fn release(
        &self,
        key: &ReplayKey,
        expires_at: Timestamp,
    ) -> Result<bool, ReplayStoreError>;

    /// Drop expired records; returns how many were removed.
    async fn purge_expired(&self, now: Timestamp) -> Result<u64, ReplayStoreError>;

    /// Short backend label for logs and metrics.
    fn backend(&self) -> &'static str;
}
