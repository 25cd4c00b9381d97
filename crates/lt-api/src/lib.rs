//! # lt-api — Lokaltreu Request Guard Service
//!
//! Axum service that fronts the loyalty routes with the request guards:
//! device-proof verification, replay protection for nonces and idempotency
//! keys, rate limiting, and plan gating.
//!
//! ## API Surface
//!
//! | Route | Guards | Success |
//! |-------|--------|---------|
//! | `POST /stamps/claim` | rate limit, idempotency | 201 |
//! | `POST /rewards/redeem` | rate limit, idempotency, device proof | 200 |
//! | `GET /referrals/link` | rate limit, plan gate (`referral`) | 200 |
//! | `GET /health/liveness` | none | 200 `ok` |
//! | `GET /health/readiness` | none | 200 `ready` |
//! | `GET /metrics` | none | Prometheus text, 404 without a recorder |
//!
//! ## Middleware Stack (Tower)
//!
//! TraceLayer → correlation → metrics → rate limit → per-route guards
//!
//! Every rejection is an RFC 7807 problem document carrying `error_code`,
//! `correlation_id` and `instance`.
//!
//! ## Crate Policy
//!
//! - Guard decisions live in the domain crates (`lt-crypto`, `lt-replay`,
//!   `lt-policy`); middleware only maps requests and results.
//! - All errors map to structured HTTP responses via [`AppError`].
//! - Backends fail closed: an unreachable store is 503, never a pass.

pub mod config;
pub mod devices;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use error::AppError;
pub use state::AppState;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Assemble the application router.
pub fn app(state: AppState) -> Router {
    let api = routes::router(&state)
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit_middleware,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(from_fn(middleware::correlation::correlation_middleware))
                .layer(from_fn_with_state(
                    state.clone(),
                    middleware::metrics::metrics_middleware,
                )),
        )
        .with_state(state.clone());

    let unauthenticated = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state);

    Router::new().merge(unauthenticated).merge(api)
}

/// Liveness probe — always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: 200 "ready" once a policy is loaded, 503 otherwise.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if state.policy.routes.is_empty() {
        return (StatusCode::SERVICE_UNAVAILABLE, "no rate-limit policy").into_response();
    }
    "ready".into_response()
}

/// GET /metrics — Prometheus text exposition.
async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.prometheus {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
