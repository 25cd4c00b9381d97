//! # Rate-Limit Policy
//!
//! Static quotas keyed on four dimensions:
//!
//! | Scope | Applies to | v1 limit |
//! |-------|-----------|----------|
//! | `tenant` | every guarded route, when a tenant is known | 600 / 60s |
//! | `ip` | every guarded route, only for anonymous requests | 120 / 60s |
//! | `card` | `POST /stamps/claim` | 30 / 60s |
//! | `device` | `POST /rewards/redeem` | 10 / 60s |
//!
//! A [`PolicyDocument`] is loaded once (YAML, or [`PolicyDocument::v1()`]),
//! validated, and then only read. [`evaluate`] walks the applicable
//! dimensions in a fixed order and reports the first exceeded one.

use std::collections::HashSet;
use std::path::Path;

use lt_core::{CardId, DeviceId, TenantId, Timestamp};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::counter::RateLimitCounter;
use crate::error::PolicyError;

/// Window used by every v1 rule.
pub const DEFAULT_WINDOW_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// The key dimension a rule counts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitScope {
    /// Per tenant, across all its routes.
    Tenant,
    /// Per client IP, only when no tenant is known.
    Ip,
    /// Per loyalty card on one route.
    Card,
    /// Per staff device on one route.
    Device,
}

impl RateLimitScope {
    /// Stable lowercase name, used in counter keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tenant => "tenant",
            Self::Ip => "ip",
            Self::Card => "card",
            Self::Device => "device",
        }
    }

    /// Whether this scope belongs in the global rule set (as opposed to a
    /// route's own rules).
    pub fn is_global(&self) -> bool {
        matches!(self, Self::Tenant | Self::Ip)
    }
}

impl std::fmt::Display for RateLimitScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `limit` requests per `window_seconds` on one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
    /// Key dimension.
    pub scope: RateLimitScope,
    /// Maximum requests per window.
    pub limit: u64,
    /// Fixed window length.
    pub window_seconds: u64,
}

impl RateLimitRule {
    /// Rule with the default 60-second window.
    pub const fn per_minute(scope: RateLimitScope, limit: u64) -> Self {
        Self {
            scope,
            limit,
            window_seconds: DEFAULT_WINDOW_SECS,
        }
    }
}

/// Route-specific rules. `route` is `"METHOD /path"` with the path as
/// registered on the router (no query string).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePolicy {
    /// Route id.
    pub route: String,
    /// Rules applied in addition to the global ones. May be empty.
    #[serde(default)]
    pub rules: Vec<RateLimitRule>,
}

/// A complete, validated rate-limit configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// Document format version.
    pub version: u32,
    /// Tenant and IP rules.
    pub global: Vec<RateLimitRule>,
    /// Per-route rules.
    pub routes: Vec<RoutePolicy>,
}

impl PolicyDocument {
    /// The built-in v1 policy.
    pub fn v1() -> Self {
        use RateLimitScope::*;
        Self {
            version: 1,
            global: vec![
                RateLimitRule::per_minute(Tenant, 600),
                RateLimitRule::per_minute(Ip, 120),
            ],
            routes: vec![
                RoutePolicy {
                    route: "POST /stamps/claim".into(),
                    rules: vec![RateLimitRule::per_minute(Card, 30)],
                },
                RoutePolicy {
                    route: "POST /rewards/redeem".into(),
                    rules: vec![RateLimitRule::per_minute(Device, 10)],
                },
                RoutePolicy {
                    route: "GET /referrals/link".into(),
                    rules: Vec::new(),
                },
            ],
        }
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, PolicyError> {
        let doc: Self = serde_yaml::from_str(yaml)?;
        doc.validate()?;
        Ok(doc)
    }

    /// Read, parse and validate a YAML document from disk.
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let raw = std::fs::read_to_string(path).map_err(|e| PolicyError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let doc = Self::from_yaml(&raw)?;
        tracing::info!(
            path = %path.display(),
            routes = doc.routes.len(),
            "Loaded rate-limit policy"
        );
        Ok(doc)
    }

    /// Check structural invariants: positive limits and windows, global
    /// rules only on tenant/ip, route rules only on card/device, no
    /// duplicate scopes within a rule set, no duplicate routes.
    pub fn validate(&self) -> Result<(), PolicyError> {
        check_rules("global", &self.global, true)?;
        let mut seen = HashSet::new();
        for route in &self.routes {
            if !seen.insert(route.route.as_str()) {
                return Err(PolicyError::DuplicateRoute {
                    route: route.route.clone(),
                });
            }
            if route.route.split_once(' ').is_none() {
                return Err(PolicyError::InvalidRule {
                    location: route.route.clone(),
                    reason: "route id must be \"METHOD /path\"".into(),
                });
            }
            check_rules(&route.route, &route.rules, false)?;
        }
        Ok(())
    }

    /// Route-specific rules, or [`PolicyError::UnknownRoute`].
    pub fn rules_for(&self, route: &str) -> Result<&[RateLimitRule], PolicyError> {
        self.routes
            .iter()
            .find(|r| r.route == route)
            .map(|r| r.rules.as_slice())
            .ok_or_else(|| PolicyError::UnknownRoute {
                route: route.to_string(),
            })
    }

    /// Every key dimension that applies to `route`, in evaluation order.
    pub fn dimensions_for(&self, route: &str) -> Result<Vec<RateLimitScope>, PolicyError> {
        let route_rules = self.rules_for(route)?;
        Ok(self
            .global
            .iter()
            .chain(route_rules)
            .map(|r| r.scope)
            .collect())
    }

    fn global_rule(&self, scope: RateLimitScope) -> Option<&RateLimitRule> {
        self.global.iter().find(|r| r.scope == scope)
    }
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self::v1()
    }
}

fn check_rules(location: &str, rules: &[RateLimitRule], global: bool) -> Result<(), PolicyError> {
    let invalid = |reason: String| PolicyError::InvalidRule {
        location: location.to_string(),
        reason,
    };
    let mut scopes = HashSet::new();
    for rule in rules {
        if rule.limit == 0 {
            return Err(invalid(format!("{} limit must be positive", rule.scope)));
        }
        if rule.window_seconds == 0 {
            return Err(invalid(format!("{} window must be positive", rule.scope)));
        }
        if rule.scope.is_global() != global {
            return Err(invalid(format!("scope {} not allowed here", rule.scope)));
        }
        if !scopes.insert(rule.scope) {
            return Err(invalid(format!("scope {} listed twice", rule.scope)));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// The identifiers known for one request.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitRequest<'a> {
    /// Route id, `"METHOD /path"`.
    pub route: &'a str,
    /// Tenant, if the request carries one.
    pub tenant_id: Option<&'a TenantId>,
    /// Card, if the request carries one.
    pub card_id: Option<&'a CardId>,
    /// Device, if the request carries one.
    pub device_id: Option<&'a DeviceId>,
    /// Client IP in clear text. Hashed before use as a counter key.
    pub ip: Option<&'a str>,
}

/// The first dimension whose quota was exceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitHit {
    /// Which dimension tripped.
    pub scope: RateLimitScope,
    /// Its configured limit.
    pub limit: u64,
    /// Requests left in the window (always zero on a hit).
    pub remaining: u64,
    /// Seconds until the window resets; at least 1.
    pub retry_after_secs: u64,
    /// Route id the request was evaluated against.
    pub route: String,
}

impl RateLimitHit {
    /// Human-readable detail for the problem document.
    pub fn detail(&self) -> &'static str {
        match self.scope {
            RateLimitScope::Tenant => "Rate limit exceeded for tenant",
            RateLimitScope::Ip => "Rate limit exceeded for IP",
            RateLimitScope::Card => "Rate limit exceeded for card",
            RateLimitScope::Device => "Rate limit exceeded for device",
        }
    }
}

/// SHA-256 hex digest of a client IP. Raw IPs never reach counter keys or logs.
pub fn hash_ip(ip: &str) -> String {
    let digest = Sha256::digest(ip.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Count the request against every applicable dimension and return the
/// first exceeded one.
///
/// Order: tenant (or anonymous IP when no tenant is known), then the route's
/// card and device rules. Dimensions whose identifier is absent are skipped.
/// Counting stops at the first hit, so later dimensions are not charged for
/// a rejected request.
pub async fn evaluate(
    policy: &PolicyDocument,
    counter: &dyn RateLimitCounter,
    req: &RateLimitRequest<'_>,
    now: Timestamp,
) -> Result<Option<RateLimitHit>, PolicyError> {
    let route_rules = policy.rules_for(req.route)?;

    let mut checks: Vec<(RateLimitRule, String)> = Vec::with_capacity(3);
    match (req.tenant_id, req.ip) {
        (Some(tenant), _) => {
            if let Some(rule) = policy.global_rule(RateLimitScope::Tenant) {
                checks.push((*rule, format!("rl:tenant:{tenant}")));
            }
        }
        (None, Some(ip)) => {
            if let Some(rule) = policy.global_rule(RateLimitScope::Ip) {
                checks.push((*rule, format!("rl:ip:{}", hash_ip(ip))));
            }
        }
        (None, None) => {}
    }
    for rule in route_rules {
        let id = match rule.scope {
            RateLimitScope::Card => req.card_id.map(CardId::as_str),
            RateLimitScope::Device => req.device_id.map(DeviceId::as_str),
            RateLimitScope::Tenant | RateLimitScope::Ip => None,
        };
        if let Some(id) = id {
            checks.push((*rule, format!("rl:{}:{}:{id}", rule.scope, req.route)));
        }
    }

    for (rule, key) in checks {
        let snapshot = counter.incr(&key, rule.window_seconds, now).await?;
        if snapshot.count > rule.limit {
            return Ok(Some(RateLimitHit {
                scope: rule.scope,
                limit: rule.limit,
                remaining: rule.limit.saturating_sub(snapshot.count),
                retry_after_secs: snapshot.ttl_secs.max(1),
                route: req.route.to_string(),
            }));
        }
    }
    Ok(None)
}
