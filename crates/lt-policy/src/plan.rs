//! # Plan Gate
//!
//! Subscription tiers are ordered `Starter < Plus < Premium`. Each
//! [`PlanFeature`] maps to the lowest tier that may use it, and
//! [`resolve`] compares ordinals. Nothing here performs I/O; tenant plans
//! come from a [`TenantPlanLookup`] supplied by the caller.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use lt_core::{ProblemDetails, TenantId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::PolicyError;

/// Problem type path for plan denials.
pub const PLAN_NOT_ALLOWED_TYPE: &str = "plan/not-allowed";
/// Machine-readable code for plan denials.
pub const PLAN_NOT_ALLOWED_CODE: &str = "PLAN_NOT_ALLOWED";

/// Subscription tier, ordered by capability.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TenantPlan {
    /// Entry tier; the default for tenants without a recorded plan.
    #[default]
    Starter,
    /// Middle tier.
    Plus,
    /// Top tier.
    Premium,
}

impl TenantPlan {
    /// Lowercase plan code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starter => "starter",
            Self::Plus => "plus",
            Self::Premium => "premium",
        }
    }
}

impl std::fmt::Display for TenantPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TenantPlan {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "starter" => Ok(Self::Starter),
            "plus" => Ok(Self::Plus),
            "premium" => Ok(Self::Premium),
            _ => Err(PolicyError::UnknownPlan {
                value: s.to_string(),
            }),
        }
    }
}

/// A capability gated by plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanFeature {
    /// Customer referral links.
    Referral,
    /// Promotional offers.
    Offers,
}

impl PlanFeature {
    /// Lowercase feature name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Referral => "referral",
            Self::Offers => "offers",
        }
    }

    /// Lowest plan allowed to use this feature.
    pub fn minimum_plan(&self) -> TenantPlan {
        match self {
            Self::Referral => TenantPlan::Plus,
            Self::Offers => TenantPlan::Starter,
        }
    }
}

impl std::fmt::Display for PlanFeature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanFeature {
    type Err = PolicyError;

    /// Accepts the legacy plural `referrals` as an alias.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "referral" | "referrals" => Ok(Self::Referral),
            "offers" => Ok(Self::Offers),
            _ => Err(PolicyError::UnknownFeature {
                name: s.to_string(),
            }),
        }
    }
}

/// A tenant's plan does not include the requested feature.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("plan {plan} does not include {feature} (requires {required} or higher)")]
pub struct PlanDenied {
    /// The tenant's plan.
    pub plan: TenantPlan,
    /// The feature requested.
    pub feature: PlanFeature,
    /// Lowest plan that would have been allowed.
    pub required: TenantPlan,
}

impl PlanDenied {
    /// HTTP status for the denial.
    pub const STATUS: u16 = 403;

    /// Problem document describing the denial. The caller stamps
    /// `instance` and `correlation_id`.
    pub fn to_problem(&self) -> ProblemDetails {
        ProblemDetails::new(
            PLAN_NOT_ALLOWED_TYPE,
            "Plan not allowed",
            Self::STATUS,
            PLAN_NOT_ALLOWED_CODE,
        )
        .with_detail(format!(
            "Feature '{}' requires plan '{}' or higher",
            self.feature, self.required
        ))
    }
}

/// Allow `feature` for `plan`, or explain why not.
pub fn resolve(plan: TenantPlan, feature: PlanFeature) -> Result<(), PlanDenied> {
    let required = feature.minimum_plan();
    if plan >= required {
        Ok(())
    } else {
        Err(PlanDenied {
            plan,
            feature,
            required,
        })
    }
}

// ---------------------------------------------------------------------------
// Tenant plan lookup
// ---------------------------------------------------------------------------

/// Plan lookup failed; callers must deny rather than guess a plan.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("tenant plan lookup failed: {0}")]
pub struct PlanLookupError(pub String);

/// Source of tenant subscription plans.
#[async_trait]
pub trait TenantPlanLookup: Send + Sync + std::fmt::Debug {
    /// The plan for `tenant_id`, falling back to the store's default for
    /// tenants it does not know.
    async fn plan_for(&self, tenant_id: &TenantId) -> Result<TenantPlan, PlanLookupError>;
}

/// In-memory plan table with a configurable default.
#[derive(Debug, Default)]
pub struct MemoryTenantPlanStore {
    plans: RwLock<HashMap<TenantId, TenantPlan>>,
    default_plan: TenantPlan,
}

impl MemoryTenantPlanStore {
    /// Empty store; unknown tenants get `default_plan`.
    pub fn new(default_plan: TenantPlan) -> Self {
        Self {
            plans: RwLock::new(HashMap::new()),
            default_plan,
        }
    }

    /// Assign a plan to a tenant.
    pub fn set_plan(&self, tenant_id: TenantId, plan: TenantPlan) {
        self.plans.write().insert(tenant_id, plan);
    }

    /// Builder form of [`Self::set_plan`].
    pub fn with_plan(self, tenant_id: TenantId, plan: TenantPlan) -> Self {
        self.set_plan(tenant_id, plan);
        self
    }

    /// The fallback plan.
    pub fn default_plan(&self) -> TenantPlan {
        self.default_plan
    }
}

#[async_trait]
impl TenantPlanLookup for MemoryTenantPlanStore {
    async fn plan_for(&self, tenant_id: &TenantId) -> Result<TenantPlan, PlanLookupError> {
        Ok(self
            .plans
            .read()
            .get(tenant_id)
            .copied()
            .unwrap_or(self.default_plan))
    }
}
