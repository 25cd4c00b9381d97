//! # lt-cli — Device-Side CLI for the Request Guard
//!
//! Provides the `ltguard` command-line interface: the staff-device half of
//! the device-proof protocol, for enrolment and smoke tests.
//!
//! ## Subcommands
//!
//! - `ltguard keygen` — Generate an Ed25519 device key.
//! - `ltguard sign` — Sign a request and print the proof headers.
//! - `ltguard verify` — Verify a proof against a public key.
//! - `ltguard message` — Print the canonical message for a request.
//!
//! ```bash
//! ltguard keygen
//! ltguard sign --seed "$SEED" --device-id tablet-1 --method POST --path /rewards/redeem
//! ```

pub mod device;
