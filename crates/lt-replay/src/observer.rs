//! # Replay Observers
//!
//! Hook for counting replay rejections without coupling this crate to a
//! metrics recorder. The API layer supplies an implementation that feeds its
//! `replay_rejected` counter.

use std::sync::atomic::{AtomicU64, Ordering};

use lt_core::TenantId;

/// Receives replay-guard events.
pub trait ReplayObserver: Send + Sync + std::fmt::Debug {
    /// A token was consumed for the first time in its window.
    fn token_accepted(&self, _tenant_id: &TenantId) {}

    /// A token was rejected because it was already consumed.
    fn replay_rejected(&self, tenant_id: &TenantId);

    /// The store failed or timed out.
    fn store_unavailable(&self, _tenant_id: &TenantId) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ReplayObserver for NoopObserver {
    fn replay_rejected(&self, _tenant_id: &TenantId) {}
}

/// Observer that counts events in memory. Used by tests.
#[derive(Debug, Default)]
pub struct CountingObserver {
    accepted: AtomicU64,
    rejected: AtomicU64,
    unavailable: AtomicU64,
}

impl CountingObserver {
    /// First-use consumptions seen so far.
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Replays seen so far.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::SeqCst)
    }

    /// Store failures seen so far.
    pub fn unavailable(&self) -> u64 {
        self.unavailable.load(Ordering::SeqCst)
    }
}

impl ReplayObserver for CountingObserver {
    fn token_accepted(&self, _tenant_id: &TenantId) {
        self.accepted.fetch_add(1, Ordering::SeqCst);
    }

    fn replay_rejected(&self, _tenant_id: &TenantId) {
        self.rejected.fetch_add(1, Ordering::SeqCst);
    }

    fn store_unavailable(&self, _tenant_id: &TenantId) {
        self.unavailable.fetch_add(1, Ordering::SeqCst);
    }
}
