//! # lt-crypto — Device-Proof Cryptography
//!
//! Ed25519 key material and verification for staff-device proofs.
//!
//! - Keys and signatures travel as canonical base64: standard alphabet,
//!   padded, nothing else accepted on input.
//! - Signing and verification accept only [`lt_core::CanonicalMessage`], so a
//!   device proof can only ever cover the canonical
//!   `method \n path \n timestamp \n nonce` layout.
//! - [`verify_device_signature`] returns a bare `bool`: malformed base64, a
//!   wrong-length key or signature, and a bad signature are indistinguishable
//!   to the caller.
//!
//! ## Crate Policy
//!
//! - Depends only on `lt-core` internally.
//! - No mocking of cryptographic operations in tests — all tests use real
//!   Ed25519 keys.

pub mod ed25519;
pub mod error;

pub use ed25519::{
    verify_device_signature, verify_with_key, DeviceKeyPair, DevicePublicKey, DeviceSignature,
};
pub use error::CryptoError;
