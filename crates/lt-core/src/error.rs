//! # Error Types
//!
//! Error types shared across the request guard. All errors use `thiserror`
//! for derive-based `Display` and `Error` implementations.
//!
//! Validation errors carry the offending input (or the field name, when the
//! input itself may be sensitive) and the expected format, so operators can
//! diagnose a misbehaving client from the log line alone.

use thiserror::Error;

/// Failure to build a canonical message in strict mode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CanonicalMessageError {
    /// A field contains `\n` or `\r`, which would make field boundaries
    /// ambiguous in the newline-delimited layout.
    #[error("canonical message field `{field}` contains a line break")]
    LineBreakInField {
        /// Name of the offending field.
        field: &'static str,
    },
}

/// Validation errors for domain primitive newtypes and configuration values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Identifier is empty or whitespace only.
    #[error("invalid {kind}: must be non-empty")]
    EmptyIdentifier {
        /// Identifier kind (e.g. "tenant id").
        kind: &'static str,
    },

    /// Identifier exceeds the maximum length.
    #[error("invalid {kind}: length {len} exceeds maximum of {max}")]
    IdentifierTooLong {
        /// Identifier kind.
        kind: &'static str,
        /// Actual length in bytes.
        len: usize,
        /// Maximum permitted length in bytes.
        max: usize,
    },

    /// Identifier contains a control character (including line breaks).
    #[error("invalid {kind}: contains control characters")]
    ControlCharacter {
        /// Identifier kind.
        kind: &'static str,
    },

    /// Timestamp is not a valid Unix epoch second count.
    #[error("invalid timestamp: \"{value}\" ({reason})")]
    InvalidTimestamp {
        /// The value that failed to parse.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A TTL or window length outside the permitted range.
    #[error("invalid duration: {value}s (expected {min}..={max} seconds)")]
    DurationOutOfRange {
        /// Offending value in seconds.
        value: u64,
        /// Inclusive lower bound.
        min: u64,
        /// Inclusive upper bound.
        max: u64,
    },
}
