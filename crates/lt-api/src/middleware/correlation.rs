//! # Correlation IDs
//!
//! Every response carries `X-Correlation-Id`: the caller's value when it is
//! well-formed, otherwise a fresh UUID. Problem documents produced further
//! in get the same id (and the request path as `instance`) stamped into
//! their body here.

use axum::body::Body;
use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{header, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use lt_core::ProblemDetails;
use uuid::Uuid;

/// Correlation header name.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

const MAX_LEN: usize = 128;

/// The correlation id of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    /// Accept a caller-supplied id if it is 1..=128 visible ASCII characters.
    pub fn from_header(raw: Option<&str>) -> Option<Self> {
        raw.map(str::trim)
            .filter(|v| !v.is_empty() && v.len() <= MAX_LEN)
            .filter(|v| v.chars().all(|c| c.is_ascii_graphic()))
            .map(|v| Self(v.to_string()))
    }

    /// A fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The id as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CorrelationId {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CorrelationId>()
            .cloned()
            .unwrap_or_else(CorrelationId::generate))
    }
}

/// Assign a correlation id, echo it, and stamp it into problem bodies.
pub async fn correlation_middleware(mut request: Request, next: Next) -> Response {
    let raw = request
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok());
    let id = CorrelationId::from_header(raw).unwrap_or_else(CorrelationId::generate);
    let instance = request.uri().path().to_string();
    request.extensions_mut().insert(id.clone());

    let mut response = next.run(request).await;

    if let Some(problem) = response.extensions_mut().remove::<ProblemDetails>() {
        let mut problem = problem.with_correlation_id(id.as_str());
        if problem.instance.is_none() {
            problem = problem.with_instance(instance);
        }
        match serde_json::to_vec(&problem) {
            Ok(bytes) => {
                response.headers_mut().remove(header::CONTENT_LENGTH);
                *response.body_mut() = Body::from(bytes);
            }
            Err(e) => tracing::error!(error = %e, "failed to re-serialize problem document"),
        }
    }

    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}
