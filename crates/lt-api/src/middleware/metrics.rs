//! Request counter middleware.

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::state::AppState;
use crate::telemetry::HTTP_REQUESTS_TOTAL;

/// Count every routed request by method, route template and status.
pub async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;

    state.metrics.increment(
        HTTP_REQUESTS_TOTAL,
        &[
            ("method", method),
            ("route", route),
            ("status", response.status().as_u16().to_string()),
        ],
    );
    response
}
