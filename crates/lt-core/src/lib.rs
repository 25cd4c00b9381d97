#![deny(missing_docs)]

//! # lt-core — Foundational Types for the Lokaltreu Request Guard
//!
//! Every other crate in the workspace depends on `lt-core`; it depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **[`CanonicalMessage`] is the sole signing input.** Device proofs are
//!    Ed25519 signatures over `method \n path \n timestamp \n nonce`. Signer
//!    and verifier both go through [`CanonicalMessage::build()`], so the byte
//!    layout cannot drift between the two sides.
//!
//! 2. **Newtype wrappers for identifiers.** [`TenantId`], [`DeviceId`],
//!    [`CardId`] and [`Jti`] are distinct types with validated constructors.
//!    A tenant id cannot be passed where a replay token id is expected.
//!
//! 3. **UTC-only timestamps.** [`Timestamp`] is second-precision UTC, which is
//!    what both the device clock-skew check and replay expiry operate on.
//!
//! 4. **One problem document.** [`ProblemDetails`] is the RFC 7807 body every
//!    rejection in the stack serializes to.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `lt-*` crates.
//! - No `unsafe` code.
//! - No `.unwrap()` outside tests.

pub mod canonical;
pub mod error;
pub mod identity;
pub mod problem;
pub mod temporal;

pub use canonical::CanonicalMessage;
pub use error::{CanonicalMessageError, ValidationError};
pub use identity::{CardId, DeviceId, Jti, TenantId};
pub use problem::ProblemDetails;
pub use temporal::{Clock, FixedClock, SystemClock, Timestamp};
