//! # Request Guards
//!
//! Middleware applied in front of the loyalty routes. Outer layers run
//! first:
//!
//! ```text
//! TraceLayer → correlation → metrics → rate_limit → [per-route guards] → handler
//! ```
//!
//! Per-route guards:
//!
//! | Route | Guards (in order) |
//! |-------|-------------------|
//! | `POST /stamps/claim` | `require_idempotency_key` → `consume_idempotency_key` |
//! | `POST /rewards/redeem` | `require_idempotency_key` → `device_proof` → `consume_idempotency_key` |
//! | `GET /referrals/link` | plan gate inside the handler ([`plan_gate::require_feature`]) |

pub mod correlation;
pub mod device_proof;
pub mod idempotency;
pub mod metrics;
pub mod plan_gate;
pub mod rate_limit;

use axum::extract::{MatchedPath, Request};
use axum::http::HeaderMap;
use lt_core::TenantId;

use crate::error::AppError;

/// Tenant header.
pub const TENANT_HEADER: &str = "x-tenant-id";
/// Loyalty card header.
pub const CARD_HEADER: &str = "x-card-id";
/// Forwarded client address header.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Route id `"METHOD /path"`, using the router's matched path template when
/// available.
pub fn route_id(request: &Request) -> String {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str)
        .unwrap_or_else(|| request.uri().path());
    format!("{} {}", request.method(), path)
}

/// A header value as trimmed, non-empty text.
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// A header value exactly as sent, for values covered by a signature.
/// Blank values count as absent but nothing is trimmed.
pub fn header_raw<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
}

/// The `X-Tenant-Id` header, validated. Absent is `Ok(None)`.
pub fn tenant_header(headers: &HeaderMap) -> Result<Option<TenantId>, AppError> {
    header_str(headers, TENANT_HEADER)
        .map(TenantId::new)
        .transpose()
        .map_err(AppError::from)
}

/// The `X-Tenant-Id` header, required.
pub fn require_tenant(headers: &HeaderMap) -> Result<TenantId, AppError> {
    tenant_header(headers)?
        .ok_or_else(|| AppError::BadRequest("X-Tenant-Id header is required".into()))
}
