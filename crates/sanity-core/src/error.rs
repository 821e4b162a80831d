//! Error taxonomy for sanity check execution.
//!
//! Nothing here escapes the orchestrator: every variant is eventually turned
//! into a failing [`ResultRecord`](crate::domain::ResultRecord) or a no-op
//! outcome reported back to the caller.

use crate::registry::TraceToken;

/// A malformed fragment of a check specification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed check specification at {fragment}: {reason}")]
pub struct SpecParseError {
    /// Location of the offending fragment, e.g. `checks[1].type`.
    pub fragment: String,

    /// Human-readable reason.
    pub reason: String,
}

impl SpecParseError {
    pub fn new(fragment: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
            reason: reason.into(),
        }
    }
}

/// Sanity checker errors.
#[derive(Debug, thiserror::Error)]
pub enum SanityError {
    #[error(transparent)]
    SpecParse(#[from] SpecParseError),

    #[error("check '{check}' failed: {reason}")]
    CheckExecution { check: String, reason: String },

    #[error("check run failed: {0}")]
    RunnerFatal(String),

    #[error("unknown or expired trace token: {0}")]
    StaleToken(TraceToken),

    #[error("unknown check type: {0}")]
    UnknownCheck(String),

    #[error("check '{check}' is missing required parameter '{parameter}'")]
    MissingParameter { check: String, parameter: String },

    #[error("check execution cancelled")]
    Cancelled,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SanityError {
    /// Whether this error represents a cooperative cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SanityError::Cancelled)
    }
}

/// Result type for sanity checker operations.
pub type Result<T> = std::result::Result<T, SanityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_parse_error_names_fragment() {
        let err = SpecParseError::new("checks[1].type", "missing string field 'type'");
        let msg = err.to_string();
        assert!(msg.contains("checks[1].type"));
        assert!(msg.contains("missing string field"));
    }

    #[test]
    fn test_spec_parse_error_is_transparent() {
        let err: SanityError = SpecParseError::new("<document>", "expected a JSON object").into();
        assert_eq!(
            err.to_string(),
            "malformed check specification at <document>: expected a JSON object"
        );
    }

    #[test]
    fn test_missing_parameter_display() {
        let err = SanityError::MissingParameter {
            check: "receivesyncs".to_string(),
            parameter: "channel".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("receivesyncs"));
        assert!(msg.contains("channel"));
    }

    #[test]
    fn test_is_cancelled() {
        assert!(SanityError::Cancelled.is_cancelled());
        assert!(!SanityError::RunnerFatal("boom".to_string()).is_cancelled());
    }
}
