//! # API Error Types
//!
//! One error type for the HTTP boundary. Every variant renders as an
//! RFC 7807 `application/problem+json` document with a stable `error_code`.
//! 5xx variants never expose their message; it is logged instead.
//!
//! The rendered [`ProblemDetails`] is also stored in the response
//! extensions so [`crate::middleware::correlation`] can stamp
//! `correlation_id` and `instance` without re-parsing the body.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use lt_core::problem::PROBLEM_JSON;
use lt_core::ProblemDetails;
use lt_policy::{PlanDenied, RateLimitHit};
use thiserror::Error;

/// The one client-facing detail for every `DEVICE_PROOF_INVALID` response.
/// Callers cannot tell a malformed proof from a wrong signature.
pub const DEVICE_PROOF_INVALID_DETAIL: &str = "Device proof could not be verified";

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Required device-proof headers are absent (401).
    #[error("device proof missing: {0}")]
    DeviceProofMissing(String),

    /// Device proof is malformed or its signature does not verify (401).
    /// The message is logged only; clients see [`DEVICE_PROOF_INVALID_DETAIL`].
    #[error("device proof invalid: {0}")]
    DeviceProofInvalid(String),

    /// Device timestamp is outside the accepted skew window (401).
    #[error("device timestamp skew of {skew_secs}s exceeds {max_secs}s")]
    DeviceProofSkew {
        /// Observed distance from server time.
        skew_secs: u64,
        /// Configured maximum.
        max_secs: u64,
    },

    /// Device is unknown or disabled (403).
    #[error("device disabled")]
    DeviceDisabled,

    /// Device-proof nonce was already used (409).
    #[error("device proof replay detected")]
    DeviceProofReplay,

    /// `Idempotency-Key` header is missing or malformed (400).
    #[error("{0}")]
    IdempotencyKeyRequired(String),

    /// `Idempotency-Key` was already used for this route (409).
    #[error("Idempotency-Key has already been used")]
    IdempotencyKeyReused,

    /// Tenant plan does not include the feature (403).
    #[error(transparent)]
    PlanNotAllowed(#[from] PlanDenied),

    /// A rate limit was exceeded (429).
    #[error("rate limit exceeded for {}", .0.scope)]
    RateLimited(RateLimitHit),

    /// Request is malformed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A backing store is unreachable or timed out (503). Message is logged only.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error (500). Message is logged only.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status and machine-readable error code.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::DeviceProofMissing(_) => (StatusCode::UNAUTHORIZED, "DEVICE_PROOF_MISSING"),
            Self::DeviceProofInvalid(_) => (StatusCode::UNAUTHORIZED, "DEVICE_PROOF_INVALID"),
            Self::DeviceProofSkew { .. } => (StatusCode::UNAUTHORIZED, "DEVICE_PROOF_SKEW"),
            Self::DeviceDisabled => (StatusCode::FORBIDDEN, "DEVICE_DISABLED"),
            Self::DeviceProofReplay => (StatusCode::CONFLICT, "DEVICE_PROOF_REPLAY"),
            Self::IdempotencyKeyRequired(_) => (StatusCode::BAD_REQUEST, "IDEMPOTENCY_KEY_REQUIRED"),
            Self::IdempotencyKeyReused => (StatusCode::CONFLICT, "IDEMPOTENCY_KEY_REUSED"),
            Self::PlanNotAllowed(_) => (StatusCode::FORBIDDEN, "PLAN_NOT_ALLOWED"),
            Self::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn type_and_title(&self) -> (&'static str, &'static str) {
        match self {
            Self::DeviceProofMissing(_) => ("device/proof-missing", "Unauthorized"),
            Self::DeviceProofInvalid(_) => ("device/proof-invalid", "Unauthorized"),
            Self::DeviceProofSkew { .. } => ("device/proof-skew", "Unauthorized"),
            Self::DeviceDisabled => ("device/disabled", "Forbidden"),
            Self::DeviceProofReplay => ("device/proof-replay", "Conflict"),
            Self::IdempotencyKeyRequired(_) => ("idempotency/key-required", "Bad Request"),
            Self::IdempotencyKeyReused => ("idempotency/key-reused", "Conflict"),
            Self::PlanNotAllowed(_) => (lt_policy::plan::PLAN_NOT_ALLOWED_TYPE, "Plan not allowed"),
            Self::RateLimited(_) => ("rate/limited", "Rate limited"),
            Self::BadRequest(_) => ("request/bad", "Bad Request"),
            Self::ServiceUnavailable(_) => ("service/unavailable", "Service Unavailable"),
            Self::Internal(_) => ("internal", "Internal Server Error"),
        }
    }

    /// Whether the message must be withheld from the client.
    fn is_server_error(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_) | Self::Internal(_))
    }

    /// The problem document this error renders to (without correlation id).
    pub fn to_problem(&self) -> ProblemDetails {
        if let Self::PlanNotAllowed(denied) = self {
            return denied.to_problem();
        }
        let (status, code) = self.status_and_code();
        let (type_path, title) = self.type_and_title();
        let problem = ProblemDetails::new(type_path, title, status.as_u16(), code);
        match self {
            Self::Internal(_) => problem.with_detail("An internal error occurred"),
            Self::DeviceProofInvalid(_) => problem.with_detail(DEVICE_PROOF_INVALID_DETAIL),
            Self::ServiceUnavailable(_) => {
                problem.with_detail("A required backend is temporarily unavailable")
            }
            Self::RateLimited(hit) => problem
                .with_detail(hit.detail())
                .with_retry_after(hit.retry_after_secs),
            other => problem.with_detail(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if self.is_server_error() {
            tracing::error!(error = %self, error_code = code, "request failed");
        }

        let problem = self.to_problem();
        let mut response = (status, Json(problem.clone())).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(PROBLEM_JSON),
        );
        if let Some(retry_after) = problem.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        }
        response.extensions_mut().insert(problem);
        response
    }
}

impl From<lt_core::ValidationError> for AppError {
    fn from(err: lt_core::ValidationError) -> Self {
        Self::BadRequest(err.to_string())
    }
}
