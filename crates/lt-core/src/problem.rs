//! # Problem Details (RFC 7807)
//!
//! The structured rejection document every guard in the stack produces.
//! Components build the document; the HTTP boundary stamps the
//! `correlation_id` and serializes it as `application/problem+json`.

use serde::{Deserialize, Serialize};

/// Media type for serialized problem documents.
pub const PROBLEM_JSON: &str = "application/problem+json";

/// Base URI for problem `type` fields.
pub const PROBLEM_TYPE_BASE: &str = "https://errors.lokaltreu.example";

/// An RFC 7807 problem document with the stack's extension members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// URI identifying the problem type.
    #[serde(rename = "type")]
    pub type_uri: String,
    /// Short, human-readable summary.
    pub title: String,
    /// HTTP status code.
    pub status: u16,
    /// Human-readable explanation specific to this occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// URI reference identifying this occurrence (usually the request path).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    /// Stable machine-readable code, e.g. `PLAN_NOT_ALLOWED`.
    pub error_code: String,
    /// Request correlation id, stamped at the HTTP boundary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Seconds until a rate-limited request may be retried.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ProblemDetails {
    /// Create a problem document. `type_path` is appended to
    /// [`PROBLEM_TYPE_BASE`] (e.g. `"plan/not-allowed"`).
    pub fn new(type_path: &str, title: &str, status: u16, error_code: &str) -> Self {
        Self {
            type_uri: format!("{PROBLEM_TYPE_BASE}/{}", type_path.trim_start_matches('/')),
            title: title.to_string(),
            status,
            detail: None,
            instance: None,
            error_code: error_code.to_string(),
            correlation_id: None,
            retry_after: None,
        }
    }

    /// Attach a human-readable detail.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attach the instance URI.
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Attach the correlation id.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Attach retry guidance (clamped to at least one second).
    pub fn with_retry_after(mut self, secs: u64) -> Self {
        self.retry_after = Some(secs.max(1));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_uri_joins_base() {
        let p = ProblemDetails::new("/plan/not-allowed", "Plan not allowed", 403, "PLAN_NOT_ALLOWED");
        assert_eq!(p.type_uri, "https://errors.lokaltreu.example/plan/not-allowed");
    }

    #[test]
    fn serializes_type_field_and_skips_empty_members() {
        let p = ProblemDetails::new("rate/limited", "Too Many Requests", 429, "RATE_LIMITED");
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["type"], "https://errors.lokaltreu.example/rate/limited");
        assert_eq!(json["status"], 429);
        assert_eq!(json["error_code"], "RATE_LIMITED");
        assert!(json.get("detail").is_none());
        assert!(json.get("correlation_id").is_none());
        assert!(json.get("retry_after").is_none());
    }

    #[test]
    fn builders_populate_members() {
        let p = ProblemDetails::new("rate/limited", "Too Many Requests", 429, "RATE_LIMITED")
            .with_detail("Rate limit exceeded for card")
            .with_instance("/stamps/claim")
            .with_correlation_id("cid-1")
            .with_retry_after(0);
        assert_eq!(p.detail.as_deref(), Some("Rate limit exceeded for card"));
        assert_eq!(p.instance.as_deref(), Some("/stamps/claim"));
        assert_eq!(p.correlation_id.as_deref(), Some("cid-1"));
        assert_eq!(p.retry_after, Some(1));
    }

    #[test]
    fn deserializes_from_wire_form() {
        let raw = r#"{"type":"https://errors.lokaltreu.example/x","title":"X","status":409,"error_code":"DEVICE_PROOF_REPLAY","correlation_id":"c"}"#;
        let p: ProblemDetails = serde_json::from_str(raw).unwrap();
        assert_eq!(p.status, 409);
        assert_eq!(p.error_code, "DEVICE_PROOF_REPLAY");
        assert_eq!(p.correlation_id.as_deref(), Some("c"));
    }
}
