//! # Audit and Metrics Emission
//!
//! Guards report through two collaborator traits so that the destination
//! (log pipeline, Prometheus, a test recorder) is chosen at startup:
//!
//! - [`AuditSink::audit`] receives security-relevant decisions.
//! - [`MetricsCounter::increment`] receives named counter bumps.
//!
//! Neither trait ever sees key material, signatures or raw client IPs.

use std::sync::Arc;

use lt_core::{DeviceId, TenantId, Timestamp};
use lt_replay::ReplayObserver;
use parking_lot::Mutex;
use serde::Serialize;

/// Counter: a device proof was rejected (missing, malformed, skewed, bad signature).
pub const DEVICE_PROOF_FAILED: &str = "device_proof_failed";
/// Counter: a single-use token was presented twice.
pub const REPLAY_REJECTED: &str = "replay_rejected";
/// Counter: a plan gate denied a feature.
pub const PLAN_DENIED: &str = "plan_denied";
/// Counter: a request exceeded a rate limit.
pub const RATE_LIMITED: &str = "rate_limited";
/// Counter: every HTTP request, labelled by method, route and status.
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

/// One security-relevant decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    /// Event name, e.g. `device_proof.rejected`.
    pub event: &'static str,
    /// Tenant, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
    /// Device, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
    /// Route id, `"METHOD /path"`.
    pub route: String,
    /// Machine-readable reason (usually the problem `error_code`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// When the decision was made.
    pub at: Timestamp,
}

impl AuditEvent {
    /// Start an event for `route` at `at`.
    pub fn new(event: &'static str, route: impl Into<String>, at: Timestamp) -> Self {
        Self {
            event,
            tenant_id: None,
            device_id: None,
            route: route.into(),
            reason: None,
            at,
        }
    }

    /// Attach the tenant.
    pub fn tenant(mut self, tenant_id: Option<&TenantId>) -> Self {
        self.tenant_id = tenant_id.cloned();
        self
    }

    /// Attach the device.
    pub fn device(mut self, device_id: Option<&DeviceId>) -> Self {
        self.device_id = device_id.cloned();
        self
    }

    /// Attach a reason code.
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Destination for audit events.
pub trait AuditSink: Send + Sync + std::fmt::Debug {
    /// Record one event. Must not block.
    fn audit(&self, event: AuditEvent);
}

/// Writes audit events as structured `tracing` records on the `audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn audit(&self, event: AuditEvent) {
        tracing::info!(
            target: "audit",
            event = event.event,
            tenant_id = event.tenant_id.as_ref().map(TenantId::as_str),
            device_id = event.device_id.as_ref().map(DeviceId::as_str),
            route = %event.route,
            reason = event.reason.as_deref(),
            at = %event.at,
            "audit"
        );
    }
}

/// Keeps audit events in memory for inspection.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    /// Recorded events with the given name.
    pub fn named(&self, event: &str) -> Vec<AuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event == event)
            .cloned()
            .collect()
    }
}

impl AuditSink for RecordingAuditSink {
    fn audit(&self, event: AuditEvent) {
        self.events.lock().push(event);
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Destination for counter increments.
pub trait MetricsCounter: Send + Sync + std::fmt::Debug {
    /// Add one to counter `name` with the given label set.
    fn increment(&self, name: &'static str, attributes: &[(&'static str, String)]);
}

/// Forwards to the global `metrics` recorder (Prometheus in production).
#[derive(Debug, Default, Clone, Copy)]
pub struct FacadeMetrics;

impl MetricsCounter for FacadeMetrics {
    fn increment(&self, name: &'static str, attributes: &[(&'static str, String)]) {
        let labels: Vec<metrics::Label> = attributes
            .iter()
            .map(|(k, v)| metrics::Label::new(*k, v.clone()))
            .collect();
        metrics::counter!(name, labels).increment(1);
    }
}

/// Keeps counter increments in memory for inspection.
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    increments: Mutex<Vec<(&'static str, Vec<(&'static str, String)>)>>,
}

impl RecordingMetrics {
    /// Number of increments recorded for `name`.
    pub fn count(&self, name: &str) -> usize {
        self.increments
            .lock()
            .iter()
            .filter(|(n, _)| *n == name)
            .count()
    }

    /// Label sets of every increment recorded for `name`.
    pub fn labels(&self, name: &str) -> Vec<Vec<(&'static str, String)>> {
        self.increments
            .lock()
            .iter()
            .filter(|(n, _)| *n == name)
            .map(|(_, labels)| labels.clone())
            .collect()
    }
}

impl MetricsCounter for RecordingMetrics {
    fn increment(&self, name: &'static str, attributes: &[(&'static str, String)]) {
        self.increments.lock().push((name, attributes.to_vec()));
    }
}

/// Bridges replay-guard events into [`REPLAY_REJECTED`].
#[derive(Debug, Clone)]
pub struct MetricsReplayObserver {
    metrics: Arc<dyn MetricsCounter>,
}

impl MetricsReplayObserver {
    /// Observer feeding `metrics`.
    pub fn new(metrics: Arc<dyn MetricsCounter>) -> Self {
        Self { metrics }
    }
}

impl ReplayObserver for MetricsReplayObserver {
    fn replay_rejected(&self, tenant_id: &TenantId) {
        self.metrics
            .increment(REPLAY_REJECTED, &[("tenant_id", tenant_id.to_string())]);
    }
}
