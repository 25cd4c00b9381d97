//! # Policy Errors

use thiserror::Error;

/// Errors from loading or querying rate-limit and plan policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// The route has no entry in the policy document.
    #[error("no rate-limit policy for route {route:?}")]
    UnknownRoute {
        /// Route id as `"METHOD /path"`.
        route: String,
    },

    /// A feature name that no plan gate knows.
    #[error("unknown plan feature {name:?}")]
    UnknownFeature {
        /// The unrecognized name.
        name: String,
    },

    /// A plan code that is not `starter`, `plus` or `premium`.
    #[error("unknown tenant plan {value:?}")]
    UnknownPlan {
        /// The unrecognized code.
        value: String,
    },

    /// A rule failed validation.
    #[error("invalid rate-limit rule in {location}: {reason}")]
    InvalidRule {
        /// `global` or the route id.
        location: String,
        /// What is wrong.
        reason: String,
    },

    /// The same route appears twice in one document.
    #[error("duplicate route entry {route:?}")]
    DuplicateRoute {
        /// The repeated route id.
        route: String,
    },

    /// The document could not be parsed.
    #[error("policy document parse error: {0}")]
    Parse(String),

    /// The document file could not be read.
    #[error("failed to read policy document {path}: {reason}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying I/O error text.
        reason: String,
    },

    /// The counter backend failed.
    #[error("rate-limit counter unavailable: {0}")]
    CounterUnavailable(String),
}

impl From<serde_yaml::Error> for PolicyError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Parse(e.to_string())
    }
}
