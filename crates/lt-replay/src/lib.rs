//! # lt-replay — Replay Guard
//!
//! Single-use consumption of token identifiers (`jti`) within a bounded TTL
//! window. Backs device-proof nonces and `Idempotency-Key` handling.
//!
//! ## State Machine (per `(tenant_id, jti)`)
//!
//! ```text
//! unseen ──consume──▶ consumed(expires_at) ──now ≥ expires_at──▶ unseen
//!                         │
//!                         └──consume (now < expires_at)──▶ rejected, expiry unchanged
//! ```
//!
//! The first accepted consumption sets `expires_at = now + ttl`. Rejected
//! attempts never extend it. [`ReplayGuard::release`] returns a consumed key
//! to `unseen` early, for callers whose protected operation failed.
//!
//! ## Stores
//!
//! The contract lives in the [`ReplayStore`] trait; the backend is chosen by
//! [`ReplayBackend`] at construction time:
//!
//! | Backend | Type | Atomicity |
//! |---------|------|-----------|
//! | `memory` | [`MemoryReplayStore`] | one mutex critical section |
//! | `postgres` | [`PgReplayStore`] | one conditional upsert statement |
//!
//! ## Failure Policy
//!
//! [`ReplayGuard`] bounds every store call with a timeout. Store errors and
//! timeouts are returned as [`ReplayError`] and must be treated as a hard
//! failure by the caller, never as acceptance.

pub mod backend;
pub mod error;
pub mod guard;
pub mod memory;
pub mod observer;
pub mod postgres;
pub mod store;
pub mod token;

pub use backend::ReplayBackend;
pub use error::{ReplayError, ReplayStoreError};
pub use guard::{ReplayGuard, DEFAULT_STORE_TIMEOUT};
pub use memory::MemoryReplayStore;
pub use observer::{CountingObserver, NoopObserver, ReplayObserver};
pub use postgres::PgReplayStore;
pub use store::ReplayStore;
pub use token::{ConsumeOutcome, ReplayKey, ReplayToken, ReplayVerdict, MAX_TTL_SECS};
