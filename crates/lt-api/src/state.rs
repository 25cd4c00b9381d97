//! # Application State
//!
//! Shared state for the Axum application, passed to middleware and route
//! handlers via the `State` extractor. Every collaborator sits behind an
//! `Arc<dyn Trait>` so tests and deployments choose implementations at
//! construction time:
//!
//! | Field | Trait | Default |
//! |-------|-------|---------|
//! | `clock` | [`Clock`] | [`SystemClock`] |
//! | `devices` | [`DeviceRegistry`] | [`MemoryDeviceRegistry`] |
//! | `replay` | [`ReplayGuard`] over a `ReplayStore` | [`MemoryReplayStore`] |
//! | `plans` | [`TenantPlanLookup`] | [`MemoryTenantPlanStore`] |
//! | `counter` | [`RateLimitCounter`] | [`MemoryRateLimitCounter`] |
//! | `audit` | [`AuditSink`] | [`TracingAuditSink`] |
//! | `metrics` | [`MetricsCounter`] | [`FacadeMetrics`] |

use std::sync::Arc;

use lt_core::{Clock, SystemClock};
use lt_policy::{
    MemoryRateLimitCounter, MemoryTenantPlanStore, PolicyDocument, PolicyError,
    RateLimitCounter, TenantPlanLookup,
};
use lt_replay::{MemoryReplayStore, ReplayGuard, ReplayStore, ReplayStoreError};
use metrics_exporter_prometheus::PrometheusHandle;
use thiserror::Error;

use crate::config::AppConfig;
use crate::devices::{DeviceRegistry, MemoryDeviceRegistry};
use crate::telemetry::{
    AuditSink, FacadeMetrics, MetricsCounter, MetricsReplayObserver, TracingAuditSink,
};

/// Failures while assembling state at startup.
#[derive(Error, Debug)]
pub enum StartupError {
    /// The rate-limit policy could not be loaded.
    #[error(transparent)]
    Policy(#[from] PolicyError),
    /// The replay store could not be constructed.
    #[error(transparent)]
    ReplayStore(#[from] ReplayStoreError),
}

/// Shared application state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Validated configuration.
    pub config: Arc<AppConfig>,
    /// Time source for skew checks and replay windows.
    pub clock: Arc<dyn Clock>,
    /// Enrolled staff devices.
    pub devices: Arc<dyn DeviceRegistry>,
    /// Single-use token guard (device nonces, idempotency keys).
    pub replay: ReplayGuard,
    /// Tenant plan source.
    pub plans: Arc<dyn TenantPlanLookup>,
    /// Rate-limit policy.
    pub policy: Arc<PolicyDocument>,
    /// Rate-limit counters.
    pub counter: Arc<dyn RateLimitCounter>,
    /// Audit destination.
    pub audit: Arc<dyn AuditSink>,
    /// Metrics destination.
    pub metrics: Arc<dyn MetricsCounter>,
    /// Prometheus exposition handle, when a recorder is installed.
    pub prometheus: Option<PrometheusHandle>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("replay_backend", &self.replay.backend())
            .field("routes", &self.policy.routes.len())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// In-memory state with the default configuration.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// In-memory state for `config`. The replay backend and policy path in
    /// `config` are ignored; use [`AppState::from_config`] to honour them.
    pub fn with_config(config: AppConfig) -> Self {
        let metrics: Arc<dyn MetricsCounter> = Arc::new(FacadeMetrics);
        let replay = ReplayGuard::new(Arc::new(MemoryReplayStore::new()))
            .with_timeout(config.replay_timeout)
            .with_observer(Arc::new(MetricsReplayObserver::new(metrics.clone())));
        Self {
            plans: Arc::new(MemoryTenantPlanStore::new(config.default_plan)),
            config: Arc::new(config),
            clock: Arc::new(SystemClock),
            devices: Arc::new(MemoryDeviceRegistry::new()),
            replay,
            policy: Arc::new(PolicyDocument::v1()),
            counter: Arc::new(MemoryRateLimitCounter::new()),
            audit: Arc::new(TracingAuditSink),
            metrics,
            prometheus: None,
        }
    }

    /// Build state from configuration: load the policy document and
    /// construct the configured replay backend.
    pub async fn from_config(config: AppConfig) -> Result<Self, StartupError> {
        let policy = match &config.policy_path {
            Some(path) => PolicyDocument::load(path)?,
            None => PolicyDocument::v1(),
        };
        let store = config.replay_backend.build().await?;
        tracing::info!(
            backend = store.backend(),
            timeout_ms = config.replay_timeout.as_millis() as u64,
            "Replay store ready"
        );
        let mut state = Self::with_config(config).with_replay_store(store);
        state.policy = Arc::new(policy);
        Ok(state)
    }

    /// Replace the replay store, keeping timeout and metrics observer.
    pub fn with_replay_store(mut self, store: Arc<dyn ReplayStore>) -> Self {
        self.replay = ReplayGuard::new(store)
            .with_timeout(self.config.replay_timeout)
            .with_observer(Arc::new(MetricsReplayObserver::new(self.metrics.clone())));
        self
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the device registry.
    pub fn with_devices(mut self, devices: Arc<dyn DeviceRegistry>) -> Self {
        self.devices = devices;
        self
    }

    /// Replace the plan lookup.
    pub fn with_plans(mut self, plans: Arc<dyn TenantPlanLookup>) -> Self {
        self.plans = plans;
        self
    }

    /// Replace the rate-limit policy.
    pub fn with_policy(mut self, policy: PolicyDocument) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Replace the rate-limit counter.
    pub fn with_counter(mut self, counter: Arc<dyn RateLimitCounter>) -> Self {
        self.counter = counter;
        self
    }

    /// Replace the audit sink.
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Replace the metrics counter, re-wiring the replay observer to it.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsCounter>) -> Self {
        self.replay = self
            .replay
            .with_observer(Arc::new(MetricsReplayObserver::new(metrics.clone())));
        self.metrics = metrics;
        self
    }

    /// Attach a Prometheus handle for `/metrics`.
    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
