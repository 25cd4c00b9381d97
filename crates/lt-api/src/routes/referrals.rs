//! # Referrals
//!
//! - GET /referrals/link — referral link for the tenant (Plus and above)

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use lt_policy::PlanFeature;
use serde::Serialize;

use crate::error::AppError;
use crate::middleware::plan_gate::require_feature;
use crate::middleware::require_tenant;
use crate::AppState;

const ROUTE: &str = "GET /referrals/link";

/// Referral link payload.
#[derive(Debug, Serialize)]
pub struct ReferralLinkResponse {
    /// Tenant the link belongs to.
    pub tenant_id: String,
    /// Tenant's current plan.
    pub plan: String,
    /// Shareable link.
    pub link: String,
}

/// GET /referrals/link
pub async fn link(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ReferralLinkResponse>, AppError> {
    let tenant = require_tenant(&headers)?;
    let plan = require_feature(&state, &tenant, PlanFeature::Referral, ROUTE).await?;

    Ok(Json(ReferralLinkResponse {
        link: format!("/r/{tenant}"),
        tenant_id: tenant.to_string(),
        plan: plan.to_string(),
    }))
}
