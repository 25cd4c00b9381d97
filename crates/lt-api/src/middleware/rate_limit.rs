//! # Rate-Limit Middleware
//!
//! Evaluates the policy document for the matched route before any other
//! guard runs. Header values that fail validation are treated as absent
//! here; the guard that owns the header rejects them later.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use lt_core::{CardId, DeviceId, TenantId};
use lt_policy::{PolicyError, RateLimitRequest};

use super::device_proof::DEVICE_KEY_HEADER;
use super::{header_str, route_id, CARD_HEADER, FORWARDED_FOR_HEADER, TENANT_HEADER};
use crate::error::AppError;
use crate::state::AppState;
use crate::telemetry::{AuditEvent, RATE_LIMITED};

/// Client address: first `X-Forwarded-For` entry, else the socket peer.
pub fn client_ip(request: &Request) -> Option<String> {
    if let Some(forwarded) = header_str(request.headers(), FORWARDED_FOR_HEADER) {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return Some(first.to_string());
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
}

struct Dimensions {
    tenant_id: Option<TenantId>,
    card_id: Option<CardId>,
    device_id: Option<DeviceId>,
}

impl Dimensions {
    fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            tenant_id: header_str(headers, TENANT_HEADER).and_then(|v| TenantId::new(v).ok()),
            card_id: header_str(headers, CARD_HEADER).and_then(|v| CardId::new(v).ok()),
            device_id: header_str(headers, DEVICE_KEY_HEADER).and_then(|v| DeviceId::new(v).ok()),
        }
    }
}

/// Reject with 429 once any configured dimension exceeds its quota.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let route = route_id(&request);
    let dims = Dimensions::from_headers(request.headers());
    let ip = client_ip(&request);
    let now = state.clock.now();

    let req = RateLimitRequest {
        route: &route,
        tenant_id: dims.tenant_id.as_ref(),
        card_id: dims.card_id.as_ref(),
        device_id: dims.device_id.as_ref(),
        ip: ip.as_deref(),
    };

    match lt_policy::evaluate(&state.policy, state.counter.as_ref(), &req, now).await {
        Ok(None) => next.run(request).await,
        Ok(Some(hit)) => {
            state.metrics.increment(
                RATE_LIMITED,
                &[("route", route.clone()), ("scope", hit.scope.to_string())],
            );
            state.audit.audit(
                AuditEvent::new("rate_limit.exceeded", &route, now)
                    .tenant(dims.tenant_id.as_ref())
                    .device(dims.device_id.as_ref())
                    .reason(hit.scope.as_str()),
            );
            tracing::warn!(
                route = %route,
                scope = %hit.scope,
                limit = hit.limit,
                retry_after = hit.retry_after_secs,
                "rate limit exceeded"
            );
            AppError::RateLimited(hit).into_response()
        }
        Err(PolicyError::CounterUnavailable(reason)) => {
            AppError::ServiceUnavailable(format!("rate-limit counter: {reason}")).into_response()
        }
        Err(e) => AppError::Internal(format!("rate-limit policy: {e}")).into_response(),
    }
}
