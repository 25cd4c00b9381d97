//! # Route Modules
//!
//! Each module defines the handlers for one API surface area. Per-route
//! guards are attached in [`router`]; the rate limiter and outer layers
//! are added in [`crate::app`].

pub mod referrals;
pub mod rewards;
pub mod stamps;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;

use crate::middleware::{device_proof, idempotency};
use crate::AppState;

/// The guarded loyalty routes.
///
/// `route_layer` calls wrap outward, so the last one listed runs first.
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/stamps/claim",
            post(stamps::claim)
                .route_layer(from_fn_with_state(
                    state.clone(),
                    idempotency::consume_idempotency_key,
                ))
                .route_layer(from_fn(idempotency::require_idempotency_key)),
        )
        .route(
            "/rewards/redeem",
            post(rewards::redeem)
                .route_layer(from_fn_with_state(
                    state.clone(),
                    idempotency::consume_idempotency_key,
                ))
                .route_layer(from_fn_with_state(
                    state.clone(),
                    device_proof::device_proof_middleware,
                ))
                .route_layer(from_fn(idempotency::require_idempotency_key)),
        )
        .route("/referrals/link", get(referrals::link))
}
