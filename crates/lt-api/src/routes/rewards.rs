//! # Rewards
//!
//! - POST /rewards/redeem — redeem a reward from a signed staff device

use axum::Json;
use serde::Serialize;

use crate::middleware::device_proof::VerifiedDevice;

/// Response for a successful redemption.
#[derive(Debug, Serialize)]
pub struct RedeemResponse {
    /// Always `"redeemed"`.
    pub status: &'static str,
    /// Tenant of the signing device.
    pub tenant_id: String,
    /// Signing device.
    pub device_id: String,
}

/// POST /rewards/redeem
pub async fn redeem(device: VerifiedDevice) -> Json<RedeemResponse> {
    Json(RedeemResponse {
        status: "redeemed",
        tenant_id: device.tenant_id.to_string(),
        device_id: device.device_id.to_string(),
    })
}
