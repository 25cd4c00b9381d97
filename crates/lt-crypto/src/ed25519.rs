//! # Ed25519 Device Proofs
//!
//! Key material and verification for the `X-Device-Proof` header.
//!
//! ## Security Invariant
//!
//! - Signing input MUST be `&CanonicalMessage` — you cannot sign raw bytes.
//!   Signer and verifier therefore agree on the byte layout by construction.
//! - Private keys are never serialized or logged. `DeviceKeyPair` does not
//!   implement `Serialize` and its `Debug` output is redacted.
//! - [`verify_device_signature`] never errors and never panics. Every failure
//!   mode collapses to `false`, so a caller cannot learn *why* a proof failed.
//!
//! ## Serde
//!
//! Public keys and signatures serialize/deserialize as standard base64.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ed25519_dalek::Signer;
use lt_core::CanonicalMessage;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CryptoError;

/// Length of an Ed25519 public key in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Length of an Ed25519 signature in bytes.
pub const SIGNATURE_LEN: usize = 64;

/// An Ed25519 public key registered for a staff device.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DevicePublicKey([u8; PUBLIC_KEY_LEN]);

/// A detached Ed25519 signature (exactly 64 bytes).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DeviceSignature([u8; SIGNATURE_LEN]);

/// An Ed25519 key pair held by a device (or by provisioning tooling).
///
/// Does not implement `Serialize`; private keys must not be accidentally
/// serialized into logs, responses, or artifacts.
pub struct DeviceKeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

// ---------------------------------------------------------------------------
// DevicePublicKey impls
// ---------------------------------------------------------------------------

impl DevicePublicKey {
    /// Create a public key from raw 32 bytes.
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Return the raw 32-byte public key.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    /// Parse a public key from base64.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = decode_base64(encoded)?;
        let arr: [u8; PUBLIC_KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
            CryptoError::InvalidPublicKey(format!(
                "expected {PUBLIC_KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Render the public key as standard base64.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// Convert to an `ed25519_dalek::VerifyingKey`. Fails for byte strings
    /// that are not a valid curve point.
    pub fn to_verifying_key(&self) -> Result<ed25519_dalek::VerifyingKey, CryptoError> {
        ed25519_dalek::VerifyingKey::from_bytes(&self.0)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
    }
}

impl Serialize for DevicePublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for DevicePublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Debug for DevicePublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DevicePublicKey({}...)", hex_prefix(&self.0))
    }
}

impl std::fmt::Display for DevicePublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_base64())
    }
}

// ---------------------------------------------------------------------------
// DeviceSignature impls
// ---------------------------------------------------------------------------

impl DeviceSignature {
    /// Create a signature from raw 64 bytes.
    pub fn from_bytes(bytes: [u8; SIGNATURE_LEN]) -> Self {
        Self(bytes)
    }

    /// Return the raw 64-byte signature.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }

    /// Parse a signature from base64. The decoded length must be exactly 64.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = decode_base64(encoded)?;
        let arr: [u8; SIGNATURE_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidSignatureLength(bytes.len()))?;
        Ok(Self(arr))
    }

    /// Render the signature as standard base64.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }
}

impl Serialize for DeviceSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for DeviceSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Debug for DeviceSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeviceSignature({}...)", hex_prefix(&self.0))
    }
}

// ---------------------------------------------------------------------------
// DeviceKeyPair impls
// ---------------------------------------------------------------------------

impl DeviceKeyPair {
    /// Generate a new random key pair from the OS RNG.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut csprng),
        }
    }

    /// Create a key pair from a raw 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(seed),
        }
    }

    /// Create a key pair from a base64-encoded 32-byte seed.
    pub fn from_seed_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = decode_base64(encoded)?;
        let seed: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidSeedLength(bytes.len()))?;
        Ok(Self::from_seed(&seed))
    }

    /// Export the seed as base64. Only provisioning tooling calls this; the
    /// server never holds device private keys.
    pub fn export_seed_base64(&self) -> String {
        STANDARD.encode(self.signing_key.to_bytes())
    }

    /// The public key for this key pair.
    pub fn public_key(&self) -> DevicePublicKey {
        DevicePublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a canonical message.
    pub fn sign(&self, message: &CanonicalMessage) -> DeviceSignature {
        DeviceSignature(self.signing_key.sign(message.as_bytes()).to_bytes())
    }
}

impl std::fmt::Debug for DeviceKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeviceKeyPair(<private>)")
    }
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Verify a device proof given base64 key and signature.
///
/// Returns `false` for malformed base64, a key that is not 32 bytes or not a
/// valid curve point, a signature that is not exactly 64 bytes, and a
/// signature that does not verify. Never panics, never errors.
pub fn verify_device_signature(
    public_key_b64: &str,
    signature_b64: &str,
    message: &CanonicalMessage,
) -> bool {
    let Ok(public_key) = DevicePublicKey::from_base64(public_key_b64) else {
        return false;
    };
    let Ok(signature) = DeviceSignature::from_base64(signature_b64) else {
        return false;
    };
    verify_with_key(&public_key, &signature, message)
}

/// Verify a device proof given parsed key material.
///
/// Uses strict verification, which additionally rejects small-order public
/// keys and non-canonical signature encodings.
pub fn verify_with_key(
    public_key: &DevicePublicKey,
    signature: &DeviceSignature,
    message: &CanonicalMessage,
) -> bool {
    let Ok(verifying_key) = public_key.to_verifying_key() else {
        return false;
    };
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key
        .verify_strict(message.as_bytes(), &sig)
        .is_ok()
}

// ---------------------------------------------------------------------------
// Encoding utilities
// ---------------------------------------------------------------------------

/// Decode canonical base64: standard alphabet, padded, no surrounding
/// whitespace. Each key or signature therefore has exactly one accepted
/// encoding.
fn decode_base64(encoded: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(encoded)
        .map_err(|e| CryptoError::Base64Decode(e.to_string()))
}

fn hex_prefix(bytes: &[u8]) -> String {
    bytes.iter().take(4).map(|b| format!("{b:02x}")).collect()
}
