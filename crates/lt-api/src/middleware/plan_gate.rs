//! Plan gate for tenant features.

use lt_core::TenantId;
use lt_policy::{PlanFeature, TenantPlan};

use crate::error::AppError;
use crate::state::AppState;
use crate::telemetry::{AuditEvent, PLAN_DENIED};

/// Resolve `tenant`'s plan and fail with 403 `PLAN_NOT_ALLOWED` if it does
/// not include `feature`. A failed plan lookup is 503.
pub async fn require_feature(
    state: &AppState,
    tenant: &TenantId,
    feature: PlanFeature,
    route: &str,
) -> Result<TenantPlan, AppError> {
    let plan = state
        .plans
        .plan_for(tenant)
        .await
        .map_err(|e| AppError::ServiceUnavailable(e.to_string()))?;

    if let Err(denied) = lt_policy::resolve(plan, feature) {
        state.metrics.increment(
            PLAN_DENIED,
            &[
                ("tenant_id", tenant.to_string()),
                ("feature", feature.to_string()),
            ],
        );
        state.audit.audit(
            AuditEvent::new("plan.denied", route, state.clock.now())
                .tenant(Some(tenant))
                .reason(format!("{} requires {}", feature, denied.required)),
        );
        tracing::info!(tenant_id = %tenant, plan = %plan, feature = %feature, "feature not in plan");
        return Err(denied.into());
    }
    Ok(plan)
}
