//! # Idempotency Keys
//!
//! Mutating routes require an `Idempotency-Key` header. The guard is split
//! in two so other guards can sit between the format check and the
//! consumption:
//!
//! - [`require_idempotency_key`] validates the header (400 when missing or
//!   malformed) and stores an [`IdempotencyKey`] in request extensions.
//! - [`consume_idempotency_key`] consumes the key in the replay store for
//!   24 hours. A second use inside that window is 409.
//!
//! A key is scoped by tenant, route and the SHA-256 of the request body.
//! Requests without a tenant share one anonymous scope.
//!
//! The key is only kept when the request succeeds. If the handler answers
//! with anything other than 2xx the key is released again, so a client can
//! retry a failed request with the same key.

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use lt_core::{Jti, TenantId, Timestamp};
use sha2::{Digest, Sha256};

use super::device_proof::VerifiedDevice;
use super::{header_str, route_id, tenant_header};
use crate::config::IDEMPOTENCY_TTL_SECS;
use crate::error::AppError;
use crate::state::AppState;
use crate::telemetry::AuditEvent;

/// Idempotency header name.
pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

/// Tenant scope for requests that carry no tenant.
pub const ANONYMOUS_TENANT: &str = "anonymous";

/// Largest request body accepted on an idempotent route.
pub const MAX_IDEMPOTENT_BODY_BYTES: usize = 64 * 1024;

/// A validated idempotency key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyKey(Jti);

impl IdempotencyKey {
    /// Shortest accepted key.
    pub const MIN_LEN: usize = 8;
    /// Longest accepted key.
    pub const MAX_LEN: usize = 128;

    /// Validate a raw header value: 8..=128 visible ASCII characters.
    pub fn parse(raw: Option<&str>) -> Result<Self, AppError> {
        let raw = raw.ok_or_else(|| {
            AppError::IdempotencyKeyRequired("Idempotency-Key header is required".into())
        })?;
        if !(Self::MIN_LEN..=Self::MAX_LEN).contains(&raw.len()) {
            return Err(AppError::IdempotencyKeyRequired(format!(
                "Idempotency-Key must be {}..={} characters",
                Self::MIN_LEN,
                Self::MAX_LEN
            )));
        }
        if !raw.chars().all(|c| c.is_ascii_graphic()) {
            return Err(AppError::IdempotencyKeyRequired(
                "Idempotency-Key must be printable ASCII without spaces".into(),
            ));
        }
        Jti::new(raw)
            .map(Self)
            .map_err(|e| AppError::IdempotencyKeyRequired(e.to_string()))
    }

    fn from_headers(headers: &HeaderMap) -> Result<Self, AppError> {
        Self::parse(header_str(headers, IDEMPOTENCY_HEADER))
    }

    /// The key text.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Everything the replay record is keyed on, read from the request before
/// the body is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
struct IdempotencyScope {
    key: IdempotencyKey,
    tenant: TenantId,
    route: String,
}

impl IdempotencyScope {
    fn from_request(request: &Request) -> Result<Self, AppError> {
        let key = match request.extensions().get::<IdempotencyKey>() {
            Some(key) => key.clone(),
            None => IdempotencyKey::from_headers(request.headers())?,
        };
        Ok(Self {
            key,
            tenant: scope_tenant(request)?,
            route: route_id(request),
        })
    }

    /// Replay-store token for this scope and a body digest.
    fn jti(&self, body_hash: &str) -> Jti {
        self.key.0.namespaced(&["idem", &self.route, body_hash])
    }
}

/// Reject requests without a well-formed `Idempotency-Key`.
pub async fn require_idempotency_key(mut request: Request, next: Next) -> Response {
    match IdempotencyKey::from_headers(request.headers()) {
        Ok(key) => {
            request.extensions_mut().insert(key);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

/// Consume the request's idempotency key; a reused key is 409. The key is
/// released again when the downstream response is not a success.
pub async fn consume_idempotency_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let scope = match IdempotencyScope::from_request(&request) {
        Ok(scope) => scope,
        Err(err) => return err.into_response(),
    };

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, MAX_IDEMPOTENT_BODY_BYTES).await {
        Ok(body) => body,
        Err(_) => {
            return AppError::BadRequest(format!(
                "request body must be readable and at most {MAX_IDEMPOTENT_BODY_BYTES} bytes"
            ))
            .into_response()
        }
    };
    let jti = scope.jti(&body_hash(&body));

    let expires_at = match consume(&state, &scope, &jti).await {
        Ok(expires_at) => expires_at,
        Err(err) => return err.into_response(),
    };

    let response = next.run(Request::from_parts(parts, Body::from(body))).await;
    if !response.status().is_success() {
        release(&state, &scope, &jti, expires_at, response.status().as_u16()).await;
    }
    response
}

async fn consume(
    state: &AppState,
    scope: &IdempotencyScope,
    jti: &Jti,
) -> Result<Timestamp, AppError> {
    let now = state.clock.now();
    let verdict = state
        .replay
        .consume(&scope.tenant, jti, IDEMPOTENCY_TTL_SECS, now)
        .await
        .map_err(|e| {
            if e.is_unavailable() {
                AppError::ServiceUnavailable(e.to_string())
            } else {
                AppError::Internal(e.to_string())
            }
        })?;

    if let lt_replay::ReplayVerdict::Fresh { expires_at } = verdict {
        return Ok(expires_at);
    }
    tracing::info!(route = %scope.route, tenant_id = %scope.tenant, "idempotency key reused");
    state.audit.audit(
        AuditEvent::new("idempotency.reused", &scope.route, now)
            .tenant(Some(&scope.tenant))
            .reason("IDEMPOTENCY_KEY_REUSED"),
    );
    Err(AppError::IdempotencyKeyReused)
}

async fn release(
    state: &AppState,
    scope: &IdempotencyScope,
    jti: &Jti,
    expires_at: Timestamp,
    status: u16,
) {
    match state.replay.release(&scope.tenant, jti, expires_at).await {
        Ok(_) => {
            tracing::info!(
                route = %scope.route,
                tenant_id = %scope.tenant,
                status,
                "idempotency key released after unsuccessful response"
            );
            state.audit.audit(
                AuditEvent::new("idempotency.released", &scope.route, state.clock.now())
                    .tenant(Some(&scope.tenant))
                    .reason(format!("status {status}")),
            );
        }
        Err(e) => {
            tracing::warn!(
                route = %scope.route,
                tenant_id = %scope.tenant,
                status,
                error = %e,
                "idempotency key could not be released; it stays consumed"
            );
        }
    }
}

/// SHA-256 hex digest of a request body.
fn body_hash(body: &Bytes) -> String {
    Sha256::digest(body).iter().map(|b| format!("{b:02x}")).collect()
}

/// The tenant that scopes a key: the verified device's tenant, then the
/// `X-Tenant-Id` header, then the anonymous scope.
fn scope_tenant(request: &Request) -> Result<TenantId, AppError> {
    if let Some(device) = request.extensions().get::<VerifiedDevice>() {
        return Ok(device.tenant_id.clone());
    }
    match tenant_header(request.headers())? {
        Some(tenant) => Ok(tenant),
        None => TenantId::new(ANONYMOUS_TENANT).map_err(AppError::from),
    }
}
