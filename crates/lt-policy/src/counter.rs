//! # Fixed-Window Counters
//!
//! Backing store for rate-limit evaluation. A window starts at the first
//! increment of a key and lasts `window_secs`; the count resets once it has
//! expired. The in-memory implementation suits a single instance and tests.
//! A shared deployment plugs in its own [`RateLimitCounter`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use lt_core::Timestamp;
use parking_lot::Mutex;
use thiserror::Error;

use crate::error::PolicyError;

/// Counter backend failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CounterError(pub String);

impl From<CounterError> for PolicyError {
    fn from(e: CounterError) -> Self {
        Self::CounterUnavailable(e.0)
    }
}

/// State of a key's current window after an increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Requests counted in the window, including this one.
    pub count: u64,
    /// Seconds until the window resets; at least 1.
    pub ttl_secs: u64,
}

/// Increment-and-read counter keyed by string.
#[async_trait]
pub trait RateLimitCounter: Send + Sync + std::fmt::Debug {
    /// Count one request for `key` and report the window state.
    async fn incr(
        &self,
        key: &str,
        window_secs: u64,
        now: Timestamp,
    ) -> Result<CounterSnapshot, CounterError>;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u64,
    expires_at: Timestamp,
}

/// Sweep interval for expired windows, in increments.
const SWEEP_EVERY: u64 = 4096;

/// In-process fixed-window counter.
#[derive(Debug, Default)]
pub struct MemoryRateLimitCounter {
    windows: Mutex<HashMap<String, Window>>,
    ops: AtomicU64,
}

impl MemoryRateLimitCounter {
    /// Create an empty counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.windows.lock().len()
    }

    /// Whether no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.windows.lock().is_empty()
    }
}

#[async_trait]
impl RateLimitCounter for MemoryRateLimitCounter {
    async fn incr(
        &self,
        key: &str,
        window_secs: u64,
        now: Timestamp,
    ) -> Result<CounterSnapshot, CounterError> {
        let sweep = self.ops.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1;
        let mut windows = self.windows.lock();
        if sweep {
            windows.retain(|_, w| w.expires_at > now);
        }

        let window = match windows.get_mut(key) {
            Some(w) if w.expires_at > now => {
                w.count += 1;
                *w
            }
            _ => {
                let fresh = Window {
                    count: 1,
                    expires_at: now.plus_secs(window_secs),
                };
                windows.insert(key.to_string(), fresh);
                fresh
            }
        };

        Ok(CounterSnapshot {
            count: window.count,
            ttl_secs: now.secs_until(&window.expires_at).max(1),
        })
    }
}
