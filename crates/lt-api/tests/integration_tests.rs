//! # Integration Tests for lt-api
//!
//! Drives the assembled router with `oneshot`: health probes, idempotent
//! stamp claims, signed reward redemption, plan gating, rate limiting,
//! fail-closed behaviour, and correlation ids on problem documents.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use tokio::task::JoinSet;
use tower::ServiceExt;

use lt_api::config::AppConfig;
use lt_api::devices::{DeviceRecord, MemoryDeviceRegistry};
use lt_api::error::DEVICE_PROOF_INVALID_DETAIL;
use lt_api::telemetry::{
    RecordingAuditSink, RecordingMetrics, DEVICE_PROOF_FAILED, HTTP_REQUESTS_TOTAL, PLAN_DENIED,
    RATE_LIMITED, REPLAY_REJECTED,
};
use lt_api::AppState;
use lt_core::{CanonicalMessage, Clock, DeviceId, FixedClock, TenantId, Timestamp};
use lt_crypto::DeviceKeyPair;
use lt_policy::{MemoryTenantPlanStore, TenantPlan};
use lt_replay::{ConsumeOutcome, ReplayKey, ReplayStore, ReplayStoreError};

const TENANT: &str = "cafe-42";
const DEVICE: &str = "tablet-1";
const NOW: i64 = 1_760_000_000;

struct Harness {
    app: axum::Router,
    clock: Arc<FixedClock>,
    devices: Arc<MemoryDeviceRegistry>,
    plans: Arc<MemoryTenantPlanStore>,
    metrics: Arc<RecordingMetrics>,
    audit: Arc<RecordingAuditSink>,
    key: DeviceKeyPair,
}

impl Harness {
    fn new() -> Self {
        Self::build(|state| state)
    }

    fn build(customize: impl FnOnce(AppState) -> AppState) -> Self {
        Self::build_with_config(AppConfig::default(), customize)
    }

    fn build_with_config(
        config: AppConfig,
        customize: impl FnOnce(AppState) -> AppState,
    ) -> Self {
        let clock = Arc::new(FixedClock::at(Timestamp::from_epoch_secs(NOW).unwrap()));
        let devices = Arc::new(MemoryDeviceRegistry::new());
        let plans = Arc::new(MemoryTenantPlanStore::new(TenantPlan::Starter));
        let metrics = Arc::new(RecordingMetrics::default());
        let audit = Arc::new(RecordingAuditSink::default());
        let key = DeviceKeyPair::from_seed(&[7u8; 32]);

        devices.register(DeviceRecord {
            tenant_id: TenantId::new(TENANT).unwrap(),
            device_id: DeviceId::new(DEVICE).unwrap(),
            public_key: key.public_key(),
            enabled: true,
        });

        let state = AppState::with_config(config)
            .with_clock(clock.clone())
            .with_devices(devices.clone())
            .with_plans(plans.clone())
            .with_metrics(metrics.clone())
            .with_audit(audit.clone());
        let app = lt_api::app(customize(state));

        Self {
            app,
            clock,
            devices,
            plans,
            metrics,
            audit,
            key,
        }
    }

    async fn send(&self, request: Request<Body>) -> axum::http::Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    fn claim(&self, idempotency_key: &str, card: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/stamps/claim")
            .header("x-tenant-id", TENANT)
            .header("x-card-id", card)
            .header("idempotency-key", idempotency_key)
            .body(Body::empty())
            .unwrap()
    }

    /// A correctly signed redeem request, signed at `signed_at`.
    fn redeem_at(&self, signed_at: i64, nonce: &str, idempotency_key: &str) -> Request<Body> {
        let timestamp = signed_at.to_string();
        let message = CanonicalMessage::build("POST", "/rewards/redeem", &timestamp, nonce);
        let proof = self.key.sign(&message).to_base64();
        Request::builder()
            .method("POST")
            .uri("/rewards/redeem")
            .header("x-tenant-id", TENANT)
            .header("x-device-key", DEVICE)
            .header("x-device-timestamp", timestamp)
            .header("x-device-nonce", nonce)
            .header("x-device-proof", proof)
            .header("idempotency-key", idempotency_key)
            .body(Body::empty())
            .unwrap()
    }

    /// A redeem request whose headers carry exactly the given strings,
    /// signed over `signed_timestamp` and `signed_nonce`.
    fn redeem_raw(
        &self,
        signed_timestamp: &str,
        signed_nonce: &str,
        sent_timestamp: &str,
        sent_nonce: &str,
        idempotency_key: &str,
    ) -> Request<Body> {
        let message =
            CanonicalMessage::build("POST", "/rewards/redeem", signed_timestamp, signed_nonce);
        Request::builder()
            .method("POST")
            .uri("/rewards/redeem")
            .header("x-tenant-id", TENANT)
            .header("x-device-key", DEVICE)
            .header("x-device-timestamp", sent_timestamp)
            .header("x-device-nonce", sent_nonce)
            .header("x-device-proof", self.key.sign(&message).to_base64())
            .header("idempotency-key", idempotency_key)
            .body(Body::empty())
            .unwrap()
    }

    fn redeem(&self, nonce: &str, idempotency_key: &str) -> Request<Body> {
        self.redeem_at(self.clock.now().epoch_secs(), nonce, idempotency_key)
    }

    fn referral(&self, tenant: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/referrals/link");
        if let Some(tenant) = tenant {
            builder = builder.header("x-tenant-id", tenant);
        }
        builder.body(Body::empty()).unwrap()
    }
}

/// Helper: read response body as string.
async fn body_string(response: axum::http::Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::http::Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

/// Replay store whose backend is always down.
#[derive(Debug)]
struct DownStore;

#[async_trait]
impl ReplayStore for DownStore {
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

    async fn put(&self, _key: &ReplayKey, _expires_at: Timestamp) -> Result<(), ReplayStoreError> {
        Err(ReplayStoreError::Unavailable("connection refused".into()))
    }

    async fn release(
        &self,
        _key: &ReplayKey,
        _expires_at: Timestamp,
    ) -> Result<bool, ReplayStoreError> {
        Err(ReplayStoreError::Unavailable("connection refused".into()))
    }

    async fn purge_expired(&self, _now: Timestamp) -> Result<u64, ReplayStoreError> {
        Ok(0)
    }

    fn backend(&self) -> &'static str {
        "down"
    }
}

// -- Health Probes ------------------------------------------------------------

#[tokio::test]
async fn test_liveness_probe() {
    let h = Harness::new();
    let response = h
        .send(
            Request::builder()
                .uri("/health/liveness")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");
}

#[tokio::test]
async fn test_readiness_probe() {
    let h = Harness::new();
    let response = h
        .send(
            Request::builder()
                .uri("/health/readiness")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ready");
}

#[tokio::test]
async fn test_metrics_endpoint_without_recorder_is_404() {
    let h = Harness::new();
    let response = h
        .send(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// -- Idempotency --------------------------------------------------------------

#[tokio::test]
async fn test_claim_returns_201() {
    let h = Harness::new();
    let response = h.send(h.claim("claim-key-0001", "card-1")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "claimed");
    assert_eq!(body["card_id"], "card-1");
    assert_eq!(h.metrics.count(HTTP_REQUESTS_TOTAL), 1);
    assert_eq!(
        h.metrics.labels(HTTP_REQUESTS_TOTAL)[0],
        vec![
            ("method", "POST".to_string()),
            ("route", "/stamps/claim".to_string()),
            ("status", "201".to_string()),
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_claims_with_same_key_succeed_once() {
    let h = Harness::new();
    let mut tasks = JoinSet::new();
    for _ in 0..10 {
        let app = h.app.clone();
        let request = h.claim("same-key-123456", "card-1");
        tasks.spawn(async move { app.oneshot(request).await.unwrap().status() });
    }

    let mut created = 0;
    let mut conflicts = 0;
    while let Some(status) = tasks.join_next().await {
        match status.unwrap() {
            StatusCode::CREATED => created += 1,
            StatusCode::CONFLICT => conflicts += 1,
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(conflicts, 9);
}

#[tokio::test]
async fn test_reused_key_is_conflict() {
    let h = Harness::new();
    assert_eq!(
        h.send(h.claim("reuse-key-0001", "card-1")).await.status(),
        StatusCode::CREATED
    );
    let response = h.send(h.claim("reuse-key-0001", "card-1")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "IDEMPOTENCY_KEY_REUSED");
    assert_eq!(h.audit.named("idempotency.reused").len(), 1);
}

#[tokio::test]
async fn test_key_expires_after_24_hours() {
    let h = Harness::new();
    assert_eq!(
        h.send(h.claim("daily-key-0001", "card-1")).await.status(),
        StatusCode::CREATED
    );
    h.clock.advance(24 * 60 * 60);
    assert_eq!(
        h.send(h.claim("daily-key-0001", "card-1")).await.status(),
        StatusCode::CREATED
    );
}

#[tokio::test]
async fn test_failed_claim_releases_key_for_retry() {
    let h = Harness::new();
    let response = h.send(h.claim("retry-key-0001", &"c".repeat(500))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.audit.named("idempotency.released").len(), 1);

    let response = h.send(h.claim("retry-key-0001", "card-1")).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = h.send(h.claim("retry-key-0001", "card-1")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_key_scope_includes_request_body() {
    let h = Harness::new();
    let with_body = |body: &'static str| {
        let mut request = h.claim("body-key-0001", "card-1");
        *request.body_mut() = Body::from(body);
        request
    };
    assert_eq!(h.send(with_body("{\"stamps\":1}")).await.status(), StatusCode::CREATED);
    assert_eq!(h.send(with_body("{\"stamps\":2}")).await.status(), StatusCode::CREATED);
    assert_eq!(h.send(with_body("{\"stamps\":1}")).await.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_missing_idempotency_key_is_400() {
    let h = Harness::new();
    let response = h
        .send(
            Request::builder()
                .method("POST")
                .uri("/stamps/claim")
                .header("x-tenant-id", TENANT)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/problem+json"
    );
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "IDEMPOTENCY_KEY_REQUIRED");
}

#[tokio::test]
async fn test_short_idempotency_key_is_400() {
    let h = Harness::new();
    let response = h.send(h.claim("short", "card-1")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// -- Device Proof -------------------------------------------------------------

#[tokio::test]
async fn test_signed_redeem_succeeds() {
    let h = Harness::new();
    let response = h.send(h.redeem("nonce-0001", "redeem-key-0001")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "redeemed");
    assert_eq!(body["tenant_id"], TENANT);
    assert_eq!(body["device_id"], DEVICE);
}

#[tokio::test]
async fn test_replayed_nonce_is_409() {
    let h = Harness::new();
    assert_eq!(
        h.send(h.redeem("nonce-0002", "redeem-key-0002")).await.status(),
        StatusCode::OK
    );
    let response = h.send(h.redeem("nonce-0002", "redeem-key-0003")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "DEVICE_PROOF_REPLAY");
    assert_eq!(h.metrics.count(REPLAY_REJECTED), 1);
}

#[tokio::test]
async fn test_bad_proof_does_not_burn_idempotency_key() {
    let h = Harness::new();
    let wrong_message = CanonicalMessage::build("POST", "/other", "1", "n");
    let mut tampered = h.redeem("nonce-0003", "redeem-key-0004");
    tampered.headers_mut().insert(
        "x-device-proof",
        h.key.sign(&wrong_message).to_base64().parse().unwrap(),
    );
    let response = h.send(tampered).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "DEVICE_PROOF_INVALID");

    let response = h.send(h.redeem("nonce-0004", "redeem-key-0004")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_signature_from_other_key_is_401() {
    let h = Harness::new();
    let other = DeviceKeyPair::from_seed(&[9u8; 32]);
    let timestamp = NOW.to_string();
    let message = CanonicalMessage::build("POST", "/rewards/redeem", &timestamp, "nonce-0005");
    let mut request = h.redeem("nonce-0005", "redeem-key-0005");
    request.headers_mut().insert(
        "x-device-proof",
        other.sign(&message).to_base64().parse().unwrap(),
    );
    let response = h.send(request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        h.metrics.labels(DEVICE_PROOF_FAILED)[0][1],
        ("reason", "DEVICE_PROOF_INVALID".to_string())
    );
}

#[tokio::test]
async fn test_clock_skew_is_401() {
    let h = Harness::new();
    let within = h.send(h.redeem_at(NOW - 30, "nonce-0006", "redeem-key-0006")).await;
    assert_eq!(within.status(), StatusCode::OK);

    let response = h.send(h.redeem_at(NOW - 31, "nonce-0007", "redeem-key-0007")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "DEVICE_PROOF_SKEW");
}

#[tokio::test]
async fn test_nonce_outlives_widened_skew_window() {
    let config = AppConfig {
        device_skew_secs: 120,
        ..AppConfig::default()
    };
    let h = Harness::build_with_config(config, |state| state);
    let first = h.send(h.redeem_at(NOW, "nonce-wide", "wide-key-0001")).await;
    assert_eq!(first.status(), StatusCode::OK);

    // Still inside the 120 s skew window, past the 90 s base nonce TTL.
    h.clock.advance(91);
    let response = h.send(h.redeem_at(NOW, "nonce-wide", "wide-key-0002")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "DEVICE_PROOF_REPLAY");

    h.clock.advance(120);
    let response = h.send(h.redeem_at(NOW, "nonce-wide", "wide-key-0003")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_proofs_share_one_detail_and_burn_the_nonce() {
    let h = Harness::new();

    let mut malformed = h.redeem("nonce-bad-len", "oracle-key-0001");
    malformed
        .headers_mut()
        .insert("x-device-proof", "AAAAAAAAAAAAAA==".parse().unwrap());
    let malformed = h.send(malformed).await;
    assert_eq!(malformed.status(), StatusCode::UNAUTHORIZED);
    let malformed = body_json(malformed).await;

    let other = DeviceKeyPair::from_seed(&[9u8; 32]);
    let timestamp = NOW.to_string();
    let message = CanonicalMessage::build("POST", "/rewards/redeem", &timestamp, "nonce-bad-sig");
    let mut wrong = h.redeem("nonce-bad-sig", "oracle-key-0002");
    wrong.headers_mut().insert(
        "x-device-proof",
        other.sign(&message).to_base64().parse().unwrap(),
    );
    let wrong = h.send(wrong).await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    let wrong = body_json(wrong).await;

    assert_eq!(malformed["error_code"], wrong["error_code"]);
    assert_eq!(malformed["detail"], wrong["detail"]);
    assert_eq!(malformed["detail"], DEVICE_PROOF_INVALID_DETAIL);

    for nonce in ["nonce-bad-len", "nonce-bad-sig"] {
        let response = h.send(h.redeem(nonce, &format!("retry-{nonce}"))).await;
        assert_eq!(response.status(), StatusCode::CONFLICT, "{nonce}");
    }
}

#[tokio::test]
async fn test_signed_values_must_use_canonical_encoding() {
    let h = Harness::new();
    let ts = NOW.to_string();

    let padded_nonce = h.redeem_raw(&ts, "nonce-pad", &ts, "nonce-pad ", "canon-key-0001");
    assert_eq!(h.send(padded_nonce).await.status(), StatusCode::UNAUTHORIZED);

    let zero_ts = format!("0{ts}");
    let zero_padded =
        h.redeem_raw(&zero_ts, "nonce-zero", &zero_ts, "nonce-zero", "canon-key-0002");
    assert_eq!(h.send(zero_padded).await.status(), StatusCode::UNAUTHORIZED);

    let plus_ts = format!("+{ts}");
    let plus = h.redeem_raw(&plus_ts, "nonce-plus", &plus_ts, "nonce-plus", "canon-key-0003");
    assert_eq!(h.send(plus).await.status(), StatusCode::UNAUTHORIZED);

    let mut unpadded = h.redeem("nonce-b64", "canon-key-0004");
    let proof = unpadded.headers()["x-device-proof"]
        .to_str()
        .unwrap()
        .trim_end_matches('=')
        .to_string();
    unpadded.headers_mut().insert("x-device-proof", proof.parse().unwrap());
    assert_eq!(h.send(unpadded).await.status(), StatusCode::UNAUTHORIZED);

    let exact = h.redeem_raw(&ts, "nonce-exact", &ts, "nonce-exact", "canon-key-0005");
    assert_eq!(h.send(exact).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_disabled_device_is_403() {
    let h = Harness::new();
    h.devices
        .set_enabled(&DeviceId::new(DEVICE).unwrap(), false);
    let response = h.send(h.redeem("nonce-0008", "redeem-key-0008")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "DEVICE_DISABLED");
}

#[tokio::test]
async fn test_unknown_device_is_403() {
    let h = Harness::new();
    let mut request = h.redeem("nonce-0009", "redeem-key-0009");
    request
        .headers_mut()
        .insert("x-device-key", "tablet-unknown".parse().unwrap());
    let response = h.send(request).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_tenant_mismatch_is_401() {
    let h = Harness::new();
    let mut request = h.redeem("nonce-0010", "redeem-key-0010");
    request
        .headers_mut()
        .insert("x-tenant-id", "other-shop".parse().unwrap());
    let response = h.send(request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "DEVICE_PROOF_INVALID");
}

#[tokio::test]
async fn test_missing_proof_headers_is_401() {
    let h = Harness::new();
    let response = h
        .send(
            Request::builder()
                .method("POST")
                .uri("/rewards/redeem")
                .header("idempotency-key", "redeem-key-0011")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "DEVICE_PROOF_MISSING");
    assert_eq!(h.audit.named("device_proof.rejected").len(), 1);
}

// -- Plan Gate ----------------------------------------------------------------

#[tokio::test]
async fn test_starter_plan_cannot_use_referrals() {
    let h = Harness::new();
    let response = h.send(h.referral(Some(TENANT))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "PLAN_NOT_ALLOWED");
    assert_eq!(body["type"], "https://errors.lokaltreu.example/plan/not-allowed");
    assert_eq!(h.metrics.count(PLAN_DENIED), 1);
    assert_eq!(h.audit.named("plan.denied").len(), 1);
}

#[tokio::test]
async fn test_plus_plan_gets_referral_link() {
    let h = Harness::new();
    h.plans
        .set_plan(TenantId::new(TENANT).unwrap(), TenantPlan::Plus);
    let response = h.send(h.referral(Some(TENANT))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["plan"], "plus");
    assert_eq!(body["tenant_id"], TENANT);
}

#[tokio::test]
async fn test_referrals_require_tenant() {
    let h = Harness::new();
    let response = h.send(h.referral(None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// -- Rate Limiting ------------------------------------------------------------

#[tokio::test]
async fn test_31st_claim_for_card_is_rate_limited() {
    let h = Harness::new();
    for i in 0..30 {
        let response = h.send(h.claim(&format!("rl-key-{i:04}"), "card-rl")).await;
        assert_eq!(response.status(), StatusCode::CREATED, "request {i}");
    }
    let response = h.send(h.claim("rl-key-9999", "card-rl")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::RETRY_AFTER], "60");
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "RATE_LIMITED");
    assert_eq!(body["detail"], "Rate limit exceeded for card");
    assert_eq!(h.metrics.count(RATE_LIMITED), 1);

    // Another card is unaffected.
    let response = h.send(h.claim("rl-key-other", "card-other")).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    // The window resets.
    h.clock.advance(60);
    let response = h.send(h.claim("rl-key-after", "card-rl")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

// -- Fail Closed --------------------------------------------------------------

#[tokio::test]
async fn test_replay_store_outage_is_503() {
    let h = Harness::build(|state| state.with_replay_store(Arc::new(DownStore)));
    let response = h.send(h.claim("outage-key-0001", "card-1")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "SERVICE_UNAVAILABLE");
    assert!(!body.to_string().contains("connection refused"));

    let response = h.send(h.redeem("nonce-0012", "outage-key-0002")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// -- Correlation --------------------------------------------------------------

#[tokio::test]
async fn test_correlation_id_is_echoed_into_problem() {
    let h = Harness::new();
    let mut request = h.claim("short", "card-1");
    request
        .headers_mut()
        .insert("x-correlation-id", "req-abc-123".parse().unwrap());
    let response = h.send(request).await;
    assert_eq!(response.headers()["x-correlation-id"], "req-abc-123");
    let body = body_json(response).await;
    assert_eq!(body["correlation_id"], "req-abc-123");
    assert_eq!(body["instance"], "/stamps/claim");
}

#[tokio::test]
async fn test_correlation_id_is_generated_when_absent() {
    let h = Harness::new();
    let response = h.send(h.claim("corr-key-0001", "card-1")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = response.headers()["x-correlation-id"].to_str().unwrap();
    assert_eq!(id.len(), 36);
}
