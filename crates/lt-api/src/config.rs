//! # Service Configuration
//!
//! Read once from the environment at startup, validated, then shared
//! read-only through [`crate::state::AppState`].
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `PORT` | `8080` | listen port |
//! | `LT_REPLAY_BACKEND` | `memory` | `memory` or `postgres` |
//! | `DATABASE_URL` | none | required when the backend is `postgres` |
//! | `LT_REPLAY_TIMEOUT_MS` | `500` | per-call replay store timeout |
//! | `LT_DEVICE_SKEW_SECS` | `30` | accepted device clock skew |
//! | `LT_POLICY_PATH` | built-in v1 | rate-limit policy YAML |
//! | `LT_DEFAULT_PLAN` | `starter` | plan for tenants without a record |
//! | `LOG_FORMAT` | `text` | `text` or `json` |

use std::path::PathBuf;
use std::time::Duration;

use lt_policy::TenantPlan;
use lt_replay::ReplayBackend;
use thiserror::Error;

/// Accepted distance between a device timestamp and server time.
pub const DEFAULT_DEVICE_SKEW_SECS: u64 = 30;
/// Shortest time a device-proof nonce stays consumed.
pub const DEVICE_NONCE_TTL_SECS: u64 = 90;
/// Slack added on top of the full skew window when sizing the nonce TTL.
pub const DEVICE_NONCE_TTL_MARGIN_SECS: u64 = 30;
/// How long an `Idempotency-Key` stays consumed.
pub const IDEMPOTENCY_TTL_SECS: u64 = 24 * 60 * 60;

const MAX_REPLAY_TIMEOUT_MS: u64 = 30_000;
const MAX_DEVICE_SKEW_SECS: u64 = 300;

/// Configuration errors. Startup aborts on any of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is present but unparseable or out of range.
    #[error("invalid value for {var}: {reason}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// What is wrong with it.
        reason: String,
    },
    /// A variable required by another setting is missing.
    #[error("{var} is required when {because}")]
    Missing {
        /// Variable name.
        var: &'static str,
        /// The setting that requires it.
        because: &'static str,
    },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Validated service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Listen port.
    pub port: u16,
    /// Replay store selection.
    pub replay_backend: ReplayBackend,
    /// Replay store call timeout.
    pub replay_timeout: Duration,
    /// Accepted device clock skew in seconds.
    pub device_skew_secs: u64,
    /// Policy document path; `None` uses the built-in v1 policy.
    pub policy_path: Option<PathBuf>,
    /// Plan for tenants without a recorded plan.
    pub default_plan: TenantPlan,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            replay_backend: ReplayBackend::Memory,
            replay_timeout: lt_replay::DEFAULT_STORE_TIMEOUT,
            device_skew_secs: DEFAULT_DEVICE_SKEW_SECS,
            policy_path: None,
            default_plan: TenantPlan::Starter,
            log_format: LogFormat::Text,
        }
    }
}

impl AppConfig {
    /// How long a device-proof nonce stays consumed.
    ///
    /// A signed timestamp is accepted anywhere in `now ± device_skew_secs`,
    /// so one proof can be presented for up to `2 * device_skew_secs`
    /// seconds. The nonce must outlive that whole window.
    pub fn device_nonce_ttl_secs(&self) -> u64 {
        self.device_skew_secs
            .saturating_mul(2)
            .saturating_add(DEVICE_NONCE_TTL_MARGIN_SECS)
            .max(DEVICE_NONCE_TTL_SECS)
    }

    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let port = match get("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                var: "PORT",
                reason: e.to_string(),
            })?,
            None => defaults.port,
        };

        let replay_backend = match get("LT_REPLAY_BACKEND").as_deref() {
            None | Some("memory") => ReplayBackend::Memory,
            Some("postgres") => ReplayBackend::Postgres {
                database_url: get("DATABASE_URL").ok_or(ConfigError::Missing {
                    var: "DATABASE_URL",
                    because: "LT_REPLAY_BACKEND=postgres",
                })?,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "LT_REPLAY_BACKEND",
                    reason: format!("expected memory or postgres, got {other:?}"),
                })
            }
        };

        let replay_timeout = match get("LT_REPLAY_TIMEOUT_MS") {
            Some(raw) => Duration::from_millis(parse_bounded(
                "LT_REPLAY_TIMEOUT_MS",
                &raw,
                1,
                MAX_REPLAY_TIMEOUT_MS,
            )?),
            None => defaults.replay_timeout,
        };

        let device_skew_secs = match get("LT_DEVICE_SKEW_SECS") {
            Some(raw) => parse_bounded("LT_DEVICE_SKEW_SECS", &raw, 1, MAX_DEVICE_SKEW_SECS)?,
            None => defaults.device_skew_secs,
        };

        let default_plan = match get("LT_DEFAULT_PLAN") {
            Some(raw) => raw.parse::<TenantPlan>().map_err(|e| ConfigError::Invalid {
                var: "LT_DEFAULT_PLAN",
                reason: e.to_string(),
            })?,
            None => defaults.default_plan,
        };

        let log_format = match get("LOG_FORMAT").map(|v| v.to_ascii_lowercase()).as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "LOG_FORMAT",
                    reason: format!("expected text or json, got {other:?}"),
                })
            }
        };

        Ok(Self {
            port,
            replay_backend,
            replay_timeout,
            device_skew_secs,
            policy_path: get("LT_POLICY_PATH").map(PathBuf::from),
            default_plan,
            log_format,
        })
    }
}

fn parse_bounded(var: &'static str, raw: &str, min: u64, max: u64) -> Result<u64, ConfigError> {
    let value = raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })?;
    if !(min..=max).contains(&value) {
        return Err(ConfigError::Invalid {
            var,
            reason: format!("expected {min}..={max}, got {value}"),
        });
    }
    Ok(value)
}
