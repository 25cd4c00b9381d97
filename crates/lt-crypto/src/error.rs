//! # Cryptographic Error Types
//!
//! Structured errors for key-material parsing in `lt-crypto`.
//!
//! These errors exist for provisioning paths (loading a device key, the CLI).
//! Request-time verification never surfaces them: [`crate::verify_device_signature`]
//! folds every failure into `false`.

use thiserror::Error;

/// Errors from parsing or using Ed25519 key material.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Input is not valid base64 in any accepted alphabet.
    #[error("base64 decode error: {0}")]
    Base64Decode(String),

    /// Invalid Ed25519 signature length.
    #[error("invalid Ed25519 signature length: expected 64 bytes, got {0}")]
    InvalidSignatureLength(usize),

    /// Invalid Ed25519 public key length or encoding.
    #[error("invalid Ed25519 public key: {0}")]
    InvalidPublicKey(String),

    /// Invalid Ed25519 private key seed.
    #[error("invalid Ed25519 seed: expected 32 bytes, got {0}")]
    InvalidSeedLength(usize),

    /// Signature did not verify.
    #[error("Ed25519 verification failed")]
    VerificationFailed,
}
