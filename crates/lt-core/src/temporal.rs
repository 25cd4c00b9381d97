//! # Temporal Types — UTC-Only Timestamps and Clocks
//!
//! Defines [`Timestamp`], a UTC timestamp truncated to seconds precision, and
//! the [`Clock`] abstraction the request guard reads "now" from.
//!
//! Device proofs carry their timestamp as a decimal Unix second count, and
//! replay expiry is computed in whole seconds, so sub-second precision is
//! discarded at construction.
//!
//! Time is injected rather than read from a global: the replay guard takes
//! `now` as an argument, and the HTTP layer holds an `Arc<dyn Clock>`. Tests
//! drive the replay window with a [`FixedClock`].

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A UTC-only timestamp, truncated to seconds precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp from the current UTC time, truncated.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Create a timestamp from a Unix epoch second count.
    pub fn from_epoch_secs(secs: i64) -> Result<Self, ValidationError> {
        DateTime::from_timestamp(secs, 0)
            .map(Self)
            .ok_or_else(|| ValidationError::InvalidTimestamp {
                value: secs.to_string(),
                reason: "out of representable range".to_string(),
            })
    }

    /// Parse the decimal Unix-seconds form used by the `X-Device-Timestamp`
    /// header (e.g. `"1767225600"`).
    pub fn parse_epoch_secs(raw: &str) -> Result<Self, ValidationError> {
        let secs: i64 = raw
            .trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| ValidationError::InvalidTimestamp {
                value: raw.to_string(),
                reason: e.to_string(),
            })?;
        Self::from_epoch_secs(secs)
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Returns the Unix epoch timestamp in seconds.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// Add a number of seconds, saturating at the representable maximum.
    pub fn plus_secs(&self, secs: u64) -> Self {
        let secs = i64::try_from(secs).unwrap_or(i64::MAX);
        chrono::Duration::try_seconds(secs)
            .and_then(|d| self.0.checked_add_signed(d))
            .map(Self)
            .unwrap_or(Self(DateTime::<Utc>::MAX_UTC))
    }

    /// Absolute distance to another timestamp, in whole seconds.
    pub fn abs_diff_secs(&self, other: &Timestamp) -> u64 {
        self.epoch_secs().abs_diff(other.epoch_secs())
    }

    /// Seconds from `self` until `later`, or zero if `later` is not after `self`.
    pub fn secs_until(&self, later: &Timestamp) -> u64 {
        u64::try_from(later.epoch_secs() - self.epoch_secs()).unwrap_or(0)
    }

    /// Render as ISO8601 with Z suffix (e.g., `2026-01-15T12:00:00Z`).
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

/// Truncate a `DateTime<Utc>` to seconds precision (discard nanoseconds).
fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

// ---------------------------------------------------------------------------
// Clocks
// ---------------------------------------------------------------------------

/// Source of the current time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// The current time.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A manually advanced clock.
#[derive(Debug)]
pub struct FixedClock {
    epoch_secs: AtomicI64,
}

impl FixedClock {
    /// Create a clock frozen at the given instant.
    pub fn at(ts: Timestamp) -> Self {
        Self {
            epoch_secs: AtomicI64::new(ts.epoch_secs()),
        }
    }

    /// Move the clock forward by `secs` seconds.
    pub fn advance(&self, secs: i64) {
        self.epoch_secs.fetch_add(secs, Ordering::SeqCst);
    }

    /// Set the clock to the given instant.
    pub fn set(&self, ts: Timestamp) {
        self.epoch_secs.store(ts.epoch_secs(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        let secs = self.epoch_secs.load(Ordering::SeqCst);
        Timestamp::from_epoch_secs(secs).unwrap_or_else(|_| Timestamp::now())
    }
}
