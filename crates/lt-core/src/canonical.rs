//! # Canonical Device-Proof Message
//!
//! Defines [`CanonicalMessage`], the only byte sequence a device signs and the
//! only byte sequence the verifier checks a device proof against.
//!
//! ## Layout
//!
//! ```text
//! METHOD \n PATH \n TIMESTAMP \n NONCE
//! ```
//!
//! Field order and the `\n` separator are fixed. Fields are concatenated
//! verbatim: there is no escaping and no normalization (the caller passes the
//! method already upper-cased and the path without query string).
//!
//! ## Security Invariant
//!
//! The separator only delimits fields unambiguously while no field contains a
//! line break. [`CanonicalMessage::build()`] is total and accepts anything;
//! request-handling code MUST use [`CanonicalMessage::try_build()`], which
//! rejects a line break in any field instead of signing or verifying a
//! message whose field boundaries could be spliced.

use crate::error::CanonicalMessageError;

/// Character separating two fields of the canonical message.
pub const FIELD_SEPARATOR: char = '\n';

/// The exact bytes signed by a device and verified by the server.
///
/// The inner buffer is private: a `CanonicalMessage` can only be produced by
/// the two constructors below, both of which apply the same layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalMessage(String);

impl CanonicalMessage {
    /// Build the canonical message from its four fields.
    ///
    /// Pure and infallible. Empty fields are allowed and still produce a
    /// well-formed message that differs from any message with a non-empty
    /// field in the same position.
    pub fn build(method: &str, path: &str, timestamp: &str, nonce: &str) -> Self {
        let mut out =
            String::with_capacity(method.len() + path.len() + timestamp.len() + nonce.len() + 3);
        out.push_str(method);
        out.push(FIELD_SEPARATOR);
        out.push_str(path);
        out.push(FIELD_SEPARATOR);
        out.push_str(timestamp);
        out.push(FIELD_SEPARATOR);
        out.push_str(nonce);
        Self(out)
    }

    /// Build the canonical message, failing closed if any field contains a
    /// line break (`\n` or `\r`).
    ///
    /// Produces byte-identical output to [`CanonicalMessage::build()`] for
    /// every input it accepts.
    pub fn try_build(
        method: &str,
        path: &str,
        timestamp: &str,
        nonce: &str,
    ) -> Result<Self, CanonicalMessageError> {
        for (field, value) in [
            ("method", method),
            ("path", path),
            ("timestamp", timestamp),
            ("nonce", nonce),
        ] {
            if value.contains(['\n', '\r']) {
                return Err(CanonicalMessageError::LineBreakInField { field });
            }
        }
        Ok(Self::build(method, path, timestamp, nonce))
    }

    /// The message bytes, as passed to Ed25519 sign/verify.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// The message as text (always valid UTF-8, since all fields are `&str`).
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0.into_bytes()
    }
}

impl AsRef<[u8]> for CanonicalMessage {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}
