//! # lt-policy — Rate Limits and Plan Gating
//!
//! Two independent policy checks consulted by the HTTP layer:
//!
//! - [`rate_limit`]: static per-tenant, per-IP and per-route quotas plus the
//!   evaluation that charges a request against them.
//! - [`plan`]: subscription-tier feature gating.
//!
//! Both are configuration loaded once and then read-only. Counters and plan
//! tables are injected behind [`RateLimitCounter`] and [`TenantPlanLookup`].
//!
//! ## Crate Policy
//!
//! - Unknown routes, plans and features are typed errors, never defaults.
//! - Client IPs are hashed before they become counter keys.

pub mod counter;
pub mod error;
pub mod plan;
pub mod rate_limit;

pub use counter::{CounterError, CounterSnapshot, MemoryRateLimitCounter, RateLimitCounter};
pub use error::PolicyError;
pub use plan::{
    resolve, MemoryTenantPlanStore, PlanDenied, PlanFeature, PlanLookupError, TenantPlan,
    TenantPlanLookup,
};
pub use rate_limit::{
    evaluate, hash_ip, PolicyDocument, RateLimitHit, RateLimitRequest, RateLimitRule,
    RateLimitScope, RoutePolicy,
};
