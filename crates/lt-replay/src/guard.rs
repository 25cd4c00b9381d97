//! # Replay Guard
//!
//! Front door to a [`ReplayStore`]: validates the TTL, computes the expiry,
//! bounds the store call with a timeout and turns the raw outcome into a
//! [`ReplayVerdict`].

use std::sync::Arc;
use std::time::Duration;

use lt_core::{Jti, TenantId, Timestamp};

use crate::error::ReplayError;
use crate::observer::{NoopObserver, ReplayObserver};
use crate::store::ReplayStore;
use crate::token::{ConsumeOutcome, ReplayKey, ReplayToken, ReplayVerdict};

/// Store timeout used when none is configured.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(500);

/// Single-use token consumption with fail-closed error handling.
#[derive(Debug, Clone)]
pub struct ReplayGuard {
    store: Arc<dyn ReplayStore>,
    timeout: Duration,
    observer: Arc<dyn ReplayObserver>,
}

impl ReplayGuard {
    /// Guard over `store` with the default timeout and no observer.
    pub fn new(store: Arc<dyn ReplayStore>) -> Self {
        Self {
            store,
            timeout: DEFAULT_STORE_TIMEOUT,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Override the per-call store timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Attach an observer for rejection and failure events.
    pub fn with_observer(mut self, observer: Arc<dyn ReplayObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The configured store timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Backend label of the underlying store.
    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Consume `(tenant_id, jti)` for `ttl_secs` seconds starting at `now`.
    ///
    /// Returns [`ReplayVerdict::Fresh`] exactly once per unexpired key. Any
    /// store failure or timeout is an `Err`, never a `Fresh` verdict.
    pub async fn consume(
        &self,
        tenant_id: &TenantId,
        jti: &Jti,
        ttl_secs: u64,
        now: Timestamp,
    ) -> Result<ReplayVerdict, ReplayError> {
        let token = ReplayToken::new(tenant_id, jti, ttl_secs)?;
        let expires_at = token.expires_at(now);

        let call = self.store.consume(token.key(), expires_at, now);
        let outcome = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                tracing::error!(
                    tenant_id = %tenant_id,
                    backend = self.store.backend(),
                    error = %e,
                    "replay store failed; rejecting request"
                );
                self.observer.store_unavailable(tenant_id);
                return Err(e.into());
            }
            Err(_) => {
                let after_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                tracing::error!(
                    tenant_id = %tenant_id,
                    backend = self.store.backend(),
                    after_ms,
                    "replay store timed out; rejecting request"
                );
                self.observer.store_unavailable(tenant_id);
                return Err(ReplayError::Timeout { after_ms });
            }
        };

        match outcome {
            ConsumeOutcome::Accepted { expires_at } => {
                tracing::debug!(tenant_id = %tenant_id, %expires_at, "token consumed");
                self.observer.token_accepted(tenant_id);
                Ok(ReplayVerdict::Fresh { expires_at })
            }
            ConsumeOutcome::Rejected { expires_at } => {
                tracing::warn!(tenant_id = %tenant_id, jti = %jti, "token replay rejected");
                self.observer.replay_rejected(tenant_id);
                Ok(ReplayVerdict::Replayed {
                    retry_after_secs: expires_at.map(|exp| now.secs_until(&exp)),
                })
            }
        }
    }

    /// Hand a consumed key back, so the next [`ReplayGuard::consume`] is
    /// fresh again. Only the record written with `expires_at` (the expiry of
    /// the caller's own [`ReplayVerdict::Fresh`]) is removed.
    pub async fn release(
        &self,
        tenant_id: &TenantId,
        jti: &Jti,
        expires_at: Timestamp,
    ) -> Result<bool, ReplayError> {
        let key = ReplayKey::new(tenant_id, jti);
        match tokio::time::timeout(self.timeout, self.store.release(&key, expires_at)).await {
            Ok(Ok(released)) => {
                tracing::debug!(tenant_id = %tenant_id, released, "token released");
                Ok(released)
            }
            Ok(Err(e)) => {
                self.observer.store_unavailable(tenant_id);
                Err(e.into())
            }
            Err(_) => {
                self.observer.store_unavailable(tenant_id);
                Err(ReplayError::Timeout {
                    after_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }

    /// Sweep expired records from the store.
    pub async fn purge_expired(&self, now: Timestamp) -> Result<u64, ReplayError> {
        match tokio::time::timeout(self.timeout, self.store.purge_expired(now)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ReplayError::Timeout {
                after_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReplayStoreError;
    use crate::memory::MemoryReplayStore;
    use crate::observer::CountingObserver;
    use async_trait::async_trait;

    fn tenant() -> TenantId {
        TenantId::new("tenant-a").unwrap()
    }

    fn jti(s: &str) -> Jti {
        Jti::new(s).unwrap()
    }

    fn at(secs: i64) -> Timestamp {
        Timestamp::from_epoch_secs(secs).unwrap()
    }

    fn memory_guard() -> ReplayGuard {
        ReplayGuard::new(Arc::new(MemoryReplayStore::new()))
    }

    #[tokio::test]
    async fn window_accept_reject_accept() {
        let guard = memory_guard();
        let t0 = 1_700_000_000;
        let first = guard.consume(&tenant(), &jti("abc"), 5, at(t0)).await.unwrap();
        assert!(first.is_fresh());

        let replay = guard.consume(&tenant(), &jti("abc"), 5, at(t0 + 4)).await.unwrap();
        assert_eq!(
            replay,
            ReplayVerdict::Replayed {
                retry_after_secs: Some(1)
            }
        );

        let later = guard.consume(&tenant(), &jti("abc"), 5, at(t0 + 6)).await.unwrap();
        assert!(later.is_fresh());
    }

    #[tokio::test]
    async fn expiry_boundary_is_exclusive() {
        let guard = memory_guard();
        guard.consume(&tenant(), &jti("b"), 5, at(100)).await.unwrap();
        let at_expiry = guard.consume(&tenant(), &jti("b"), 5, at(105)).await.unwrap();
        assert!(at_expiry.is_fresh());
    }

    #[tokio::test]
    async fn rejected_attempt_does_not_extend_window() {
        let guard = memory_guard();
        guard.consume(&tenant(), &jti("c"), 10, at(0)).await.unwrap();
        // A replay at t=9 with a long TTL must not push expiry past t=10.
        let replay = guard.consume(&tenant(), &jti("c"), 3600, at(9)).await.unwrap();
        assert!(!replay.is_fresh());
        assert!(guard.consume(&tenant(), &jti("c"), 10, at(10)).await.unwrap().is_fresh());
    }

    #[tokio::test]
    async fn zero_ttl_is_an_error() {
        let guard = memory_guard();
        let err = guard.consume(&tenant(), &jti("z"), 0, at(0)).await.unwrap_err();
        assert!(matches!(err, ReplayError::InvalidToken(_)));
        assert!(!err.is_unavailable());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_consumers_accept_exactly_once() {
        let guard = memory_guard();
        let mut set = tokio::task::JoinSet::new();
        for _ in 0..10 {
            let guard = guard.clone();
            set.spawn(async move {
                guard
                    .consume(&tenant(), &jti("race"), 60, at(1_000))
                    .await
                    .unwrap()
            });
        }
        let mut fresh = 0;
        let mut replayed = 0;
        while let Some(verdict) = set.join_next().await {
            if verdict.unwrap().is_fresh() {
                fresh += 1;
            } else {
                replayed += 1;
            }
        }
        assert_eq!(fresh, 1);
        assert_eq!(replayed, 9);
    }

    #[tokio::test]
    async fn released_key_is_fresh_again() {
        let guard = memory_guard();
        let verdict = guard.consume(&tenant(), &jti("r"), 60, at(0)).await.unwrap();
        let ReplayVerdict::Fresh { expires_at } = verdict else {
            panic!("expected a fresh verdict");
        };
        assert!(!guard.consume(&tenant(), &jti("r"), 60, at(1)).await.unwrap().is_fresh());

        assert!(guard.release(&tenant(), &jti("r"), expires_at).await.unwrap());
        assert!(guard.consume(&tenant(), &jti("r"), 60, at(2)).await.unwrap().is_fresh());
        // The stale expiry no longer matches the new record.
        assert!(!guard.release(&tenant(), &jti("r"), expires_at).await.unwrap());
    }

    #[tokio::test]
    async fn release_failure_is_an_error() {
        let guard = ReplayGuard::new(Arc::new(BrokenStore));
        let err = guard.release(&tenant(), &jti("x"), at(60)).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn observer_counts_rejections() {
        let observer = Arc::new(CountingObserver::default());
        let guard = memory_guard().with_observer(observer.clone());
        guard.consume(&tenant(), &jti("o"), 30, at(0)).await.unwrap();
        guard.consume(&tenant(), &jti("o"), 30, at(1)).await.unwrap();
        guard.consume(&tenant(), &jti("o"), 30, at(2)).await.unwrap();
        assert_eq!(observer.accepted(), 1);
        assert_eq!(observer.rejected(), 2);
        assert_eq!(observer.unavailable(), 0);
    }

    // -- Failing stores ------------------------------------------------------

    #[derive(Debug)]
    struct BrokenStore;

    #[async_trait]
    impl ReplayStore for BrokenStore {
        async fn consume(
            &self,
            _key: &ReplayKey,
            _expires_at: Timestamp,
            _now: Timestamp,
        ) -> Result<ConsumeOutcome, ReplayStoreError> {
            Err(ReplayStoreError::Unavailable("connection refused".into()))
        }
        async fn get(
            &self,
            _key: &ReplayKey,
            _now: Timestamp,
        ) -> Result<Option<Timestamp>, ReplayStoreError> {
            Err(ReplayStoreError::Unavailable("connection refused".into()))
        }
        async fn put(&self, _key: &ReplayKey, _exp: Timestamp) -> Result<(), ReplayStoreError> {
            Err(ReplayStoreError::Unavailable("connection refused".into()))
        }
        async fn release(&self, _key: &ReplayKey, _exp: Timestamp) -> Result<bool, ReplayStoreError> {
            Err(ReplayStoreError::Unavailable("connection refused".into()))
        }
        async fn purge_expired(&self, _now: Timestamp) -> Result<u64, ReplayStoreError> {
            Err(ReplayStoreError::Unavailable("connection refused".into()))
        }
        fn backend(&self) -> &'static str {
            "broken"
        }
    }

    #[derive(Debug)]
    struct StalledStore;

    #[async_trait]
    impl ReplayStore for StalledStore {
        async fn consume(
            &self,
            _key: &ReplayKey,
            expires_at: Timestamp,
            _now: Timestamp,
        ) -> Result<ConsumeOutcome, ReplayStoreError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(ConsumeOutcome::Accepted { expires_at })
        }
        async fn get(
            &self,
            _key: &ReplayKey,
            _now: Timestamp,
        ) -> Result<Option<Timestamp>, ReplayStoreError> {
            Ok(None)
        }
        async fn put(&self, _key: &ReplayKey, _exp: Timestamp) -> Result<(), ReplayStoreError> {
            Ok(())
        }
        async fn release(&self, _key: &ReplayKey, _exp: Timestamp) -> Result<bool, ReplayStoreError> {
            Ok(false)
        }
        async fn purge_expired(&self, _now: Timestamp) -> Result<u64, ReplayStoreError> {
            Ok(0)
        }
        fn backend(&self) -> &'static str {
            "stalled"
        }
    }

    #[tokio::test]
    async fn store_error_fails_closed() {
        let observer = Arc::new(CountingObserver::default());
        let guard = ReplayGuard::new(Arc::new(BrokenStore)).with_observer(observer.clone());
        let err = guard.consume(&tenant(), &jti("x"), 60, at(0)).await.unwrap_err();
        assert!(matches!(err, ReplayError::Unavailable(_)));
        assert!(err.is_unavailable());
        assert_eq!(observer.unavailable(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_store_times_out() {
        let guard = ReplayGuard::new(Arc::new(StalledStore)).with_timeout(Duration::from_millis(50));
        let err = guard.consume(&tenant(), &jti("x"), 60, at(0)).await.unwrap_err();
        assert!(matches!(err, ReplayError::Timeout { after_ms: 50 }));
    }
}
