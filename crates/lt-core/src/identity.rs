//! # Identity Newtypes
//!
//! Domain-primitive newtypes for the identifiers the request guard keys on.
//! Each identifier is a distinct type; you cannot pass a [`TenantId`] where
//! a [`Jti`] is expected.
//!
//! ## Validation
//!
//! All identifiers arrive from request headers, so they are validated at
//! construction time: non-empty after trimming, bounded length, and free of
//! control characters. The last rule matters for [`Jti`] in particular: a
//! nonce is one field of the newline-delimited canonical message.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Shared validation for string identifiers.
fn validate(kind: &'static str, raw: String, max: usize) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyIdentifier { kind });
    }
    if trimmed.len() > max {
        return Err(ValidationError::IdentifierTooLong {
            kind,
            len: trimmed.len(),
            max,
        });
    }
    if trimmed.chars().any(char::is_control) {
        return Err(ValidationError::ControlCharacter { kind });
    }
    if trimmed.len() == raw.len() {
        Ok(raw)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Defines a validated string identifier newtype.
///
/// Deserializes as a plain `String`, then routes through `new()` so that
/// invalid values are rejected at deserialization time.
macro_rules! string_identifier {
    ($(#[$meta:meta])* $ty:ident, $kind:literal, $max:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $ty(String);

        impl $ty {
            /// Maximum length in bytes.
            pub const MAX_LEN: usize = $max;

            /// Validate and wrap a raw identifier. Surrounding whitespace is trimmed.
            pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
                validate($kind, raw.into(), Self::MAX_LEN).map(Self)
            }

            /// Access the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $ty {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::new(raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

string_identifier!(
    /// Identifier of a tenant (a merchant running a loyalty program).
    TenantId,
    "tenant id",
    128
);

string_identifier!(
    /// Identifier of a registered staff device.
    DeviceId,
    "device id",
    128
);

string_identifier!(
    /// Identifier of a customer loyalty card.
    CardId,
    "card id",
    128
);

string_identifier!(
    /// Single-use token identifier: a device-proof nonce, an action-token
    /// `jti` claim, or an `Idempotency-Key` value.
    Jti,
    "jti",
    256
);

impl Jti {
    /// Prefix this token id with namespace segments, so that tokens from
    /// different carriers (device nonces vs idempotency keys) and different
    /// owners never collide in one replay store.
    ///
    /// Every segment is written as `<byte length>:<segment>:`, which keeps
    /// the encoding injective even when a segment (a device id, a route)
    /// itself contains `:`. Segments come from validated identifiers and
    /// constants, so the result is not re-validated against [`Jti::MAX_LEN`].
    pub fn namespaced(&self, segments: &[&str]) -> Jti {
        let mut out = String::with_capacity(
            self.0.len() + segments.iter().map(|s| s.len() + 6).sum::<usize>(),
        );
        for segment in segments {
            out.push_str(&segment.len().to_string());
            out.push(':');
            out.push_str(segment);
            out.push(':');
        }
        out.push_str(&self.0);
        Jti(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_id_accepts_plain_value() {
        let id = TenantId::new("tenant-1").unwrap();
        assert_eq!(id.as_str(), "tenant-1");
        assert_eq!(id.to_string(), "tenant-1");
    }

    #[test]
    fn identifiers_trim_whitespace() {
        let id = DeviceId::new("  device-7 ").unwrap();
        assert_eq!(id.as_str(), "device-7");
    }

    #[test]
    fn empty_identifier_rejected() {
        assert_eq!(
            CardId::new("   ").unwrap_err(),
            ValidationError::EmptyIdentifier { kind: "card id" }
        );
    }

    #[test]
    fn overlong_identifier_rejected() {
        let err = TenantId::new("t".repeat(129)).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::IdentifierTooLong { len: 129, max: 128, .. }
        ));
        assert!(Jti::new("j".repeat(256)).is_ok());
    }

    #[test]
    fn control_characters_rejected() {
        assert_eq!(
            Jti::new("abc\ndef").unwrap_err(),
            ValidationError::ControlCharacter { kind: "jti" }
        );
        assert!(DeviceId::new("dev\u{0}ice").is_err());
    }

    #[test]
    fn from_str_validates() {
        let id: TenantId = "tenant-9".parse().unwrap();
        assert_eq!(id.as_str(), "tenant-9");
        assert!("".parse::<TenantId>().is_err());
    }

    #[test]
    fn serde_is_transparent_and_validating() {
        let id = Jti::new("nonce-1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"nonce-1\"");
        let back: Jti = serde_json::from_str("\"nonce-1\"").unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<Jti>("\"\"").is_err());
    }

    #[test]
    fn namespaced_jti_prefixes() {
        let jti = Jti::new("abc").unwrap();
        assert_eq!(jti.namespaced(&["idem"]).as_str(), "4:idem:abc");
        assert_eq!(
            jti.namespaced(&["device-proof", "d-1"]).as_str(),
            "12:device-proof:3:d-1:abc"
        );
    }

    #[test]
    fn namespaced_segments_with_colons_do_not_collide() {
        let a = Jti::new("x:nonce").unwrap().namespaced(&["device-proof", "tablet"]);
        let b = Jti::new("nonce").unwrap().namespaced(&["device-proof", "tablet:x"]);
        assert_ne!(a, b);

        let c = Jti::new("n").unwrap().namespaced(&["device-proof", "a:b"]);
        let d = Jti::new("b:n").unwrap().namespaced(&["device-proof", "a"]);
        assert_ne!(c, d);
    }
}
