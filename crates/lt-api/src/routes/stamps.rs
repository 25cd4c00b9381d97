//! # Stamps
//!
//! - POST /stamps/claim — claim a stamp for a card (idempotent)

use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use lt_core::CardId;
use serde::Serialize;

use crate::error::AppError;
use crate::middleware::idempotency::IdempotencyKey;
use crate::middleware::{header_str, tenant_header, CARD_HEADER};

/// Response for a successful claim.
#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    /// Always `"claimed"`.
    pub status: &'static str,
    /// Tenant from `X-Tenant-Id`, if sent.
    pub tenant_id: Option<String>,
    /// Card from `X-Card-Id`, if sent.
    pub card_id: Option<String>,
    /// The idempotency key that was consumed.
    pub idempotency_key: String,
}

/// POST /stamps/claim
pub async fn claim(
    axum::Extension(key): axum::Extension<IdempotencyKey>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<ClaimResponse>), AppError> {
    let tenant_id = tenant_header(&headers)?;
    let card_id = header_str(&headers, CARD_HEADER)
        .map(CardId::new)
        .transpose()?;

    Ok((
        StatusCode::CREATED,
        Json(ClaimResponse {
            status: "claimed",
            tenant_id: tenant_id.map(|t| t.to_string()),
            card_id: card_id.map(|c| c.to_string()),
            idempotency_key: key.as_str().to_string(),
        }),
    ))
}
