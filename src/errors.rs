use crate::model::Coordinate;
use strum_macros::{Display, EnumString};
use thiserror::Error;

/// Closed set of error categories surfaced to tool clients.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidInput,
    OutOfCoverage,
    RateLimited,
    UpstreamUnavailable,
    InternalError,
}

impl ErrorCode {
    /// Retryability is a pure function of the code.
    pub const fn retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::UpstreamUnavailable)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinate>,
}

impl ErrorDetails {
    pub fn is_empty(&self) -> bool {
        self.upstream_status.is_none()
            && self.retry_after_seconds.is_none()
            && self.request_id.is_none()
            && self.location.is_none()
    }
}

/// Typed tool failure. Once raised, a `ToolError` travels through the
/// pipeline unchanged; only raw I/O failures get wrapped into one.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ToolError {
    pub code: ErrorCode,
    pub message: String,
    pub details: ErrorDetails,
    pub(crate) fatal: bool,
}

impl ToolError {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), details: ErrorDetails::default(), fatal: false }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn out_of_coverage(message: impl Into<String>, location: Coordinate) -> Self {
        let mut error = Self::new(ErrorCode::OutOfCoverage, message);
        error.details.location = Some(location);
        error
    }

    pub fn rate_limited(message: impl Into<String>, retry_after_seconds: Option<u64>) -> Self {
        let mut error = Self::new(ErrorCode::RateLimited, message);
        error.details.retry_after_seconds = retry_after_seconds;
        error
    }

    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamUnavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// A tool body escaped with a panic. The wrapper logs and records it,
    /// then the transport answers with a protocol-level error instead of an
    /// error envelope.
    pub(crate) fn internal_panic() -> Self {
        let mut error = Self::new(ErrorCode::InternalError, "Internal server error");
        error.fatal = true;
        error
    }

    /// Maps an upstream HTTP status into the taxonomy.
    pub fn from_upstream_status(
        status: u16, retry_after_seconds: Option<u64>, request_id: impl Into<String>,
    ) -> Self {
        let mut error = match status {
            400 | 404 => Self::invalid_input(format!("upstream rejected the request ({status})")),
            403 => Self::internal(format!("upstream refused access ({status})")),
            429 | 503 => {
                Self::rate_limited(format!("upstream rate limit hit ({status})"), retry_after_seconds)
            },
            500..=599 => {
                Self::upstream_unavailable(format!("upstream failed with status {status}"))
            },
            _ => Self::internal(format!("unexpected upstream status {status}")),
        };
        error.details.upstream_status = Some(status);
        error.details.request_id = Some(request_id.into());
        error
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.details.request_id = Some(request_id.into());
        self
    }

    pub fn retryable(&self) -> bool {
        self.code.retryable()
    }

    pub(crate) fn is_fatal(&self) -> bool {
        self.fatal
    }

    /// The wire-shaped record embedded in error envelopes.
    pub fn record(&self) -> serde_json::Value {
        let mut record = serde_json::json!({
            "code": self.code,
            "message": self.message,
            "retryable": self.retryable(),
        });
        if !self.details.is_empty() {
            record["details"] = serde_json::to_value(&self.details).unwrap_or_default();
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (400, ErrorCode::InvalidInput),
            (404, ErrorCode::InvalidInput),
            (403, ErrorCode::InternalError),
            (429, ErrorCode::RateLimited),
            (503, ErrorCode::RateLimited),
            (500, ErrorCode::UpstreamUnavailable),
            (502, ErrorCode::UpstreamUnavailable),
            (504, ErrorCode::UpstreamUnavailable),
            (302, ErrorCode::InternalError),
        ];
        for (status, expected) in cases {
            let error = ToolError::from_upstream_status(status, None, "req-1");
            assert_eq!(error.code, expected, "status {status}");
            assert_eq!(error.details.upstream_status, Some(status));
        }
    }

    #[test]
    fn test_retryable_is_pure_function_of_code() {
        assert!(ErrorCode::RateLimited.retryable());
        assert!(ErrorCode::UpstreamUnavailable.retryable());
        assert!(!ErrorCode::InvalidInput.retryable());
        assert!(!ErrorCode::OutOfCoverage.retryable());
        assert!(!ErrorCode::InternalError.retryable());
    }

    #[test]
    fn test_retry_after_carried_into_record() {
        let error = ToolError::from_upstream_status(429, Some(30), "req-2");
        let record = error.record();
        assert_eq!(record["code"], "RATE_LIMITED");
        assert_eq!(record["retryable"], true);
        assert_eq!(record["details"]["retryAfterSeconds"], 30);
    }

    #[test]
    fn test_code_round_trips_through_display() {
        use std::str::FromStr;
        assert_eq!(ErrorCode::OutOfCoverage.to_string(), "OUT_OF_COVERAGE");
        assert_eq!(
            ErrorCode::from_str("UPSTREAM_UNAVAILABLE").unwrap(),
            ErrorCode::UpstreamUnavailable
        );
    }
}
