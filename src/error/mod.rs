//! Error types for threadrun.

pub mod unified;

pub use unified::{ErrorCategory, ErrorCode};

use thiserror::Error;

/// Primary error type for all run-engine operations.
#[derive(Error, Debug)]
pub enum ThreadRunError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Quota exceeded: {message}")]
    QuotaExceeded {
        message: String,
        retry_after_ms: Option<u64>,
    },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Run failed: {message}")]
    RunFailed {
        code: Option<ErrorCode>,
        message: String,
    },

    #[error("Run expired before completion")]
    RunExpired,

    #[error("Tool execution error: {tool} ({message})")]
    ToolExecution { tool: String, message: String },

    #[error("Pre-send hook failed: {0}")]
    HookFailed(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Run cancelled")]
    Cancelled,
}

impl ThreadRunError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Build the causal error for a `thread.run.failed` frame.
    ///
    /// Quota codes are promoted to [`ThreadRunError::QuotaExceeded`] so the
    /// session can route them to the blocking notice.
    pub fn run_failed(code: Option<&str>, message: impl Into<String>) -> Self {
        let message = message.into();
        let code = code.map(ErrorCode::parse);
        if code.as_ref().is_some_and(ErrorCode::is_quota) {
            return Self::QuotaExceeded {
                message,
                retry_after_ms: None,
            };
        }
        Self::RunFailed { code, message }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::QuotaExceeded { .. } => ErrorCategory::Quota,
            Self::Network(_) | Self::Io(_) => ErrorCategory::Network,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Stream(_) | Self::Protocol(_) => ErrorCategory::Protocol,
            Self::RunFailed { .. } | Self::RunExpired => ErrorCategory::Run,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::Quota,
                _ => ErrorCategory::Api,
            },
            Self::ToolExecution { .. } => ErrorCategory::ToolExecution,
            Self::InvalidState(_) => ErrorCategory::Precondition,
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::HookFailed(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether the session should raise the quota notice for this error.
    pub fn is_quota_exceeded(&self) -> bool {
        self.category() == ErrorCategory::Quota
    }

    /// Whether this error is the cancellation path rather than a failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ThreadRunError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_codes_promote_run_failures() {
        let err = ThreadRunError::run_failed(Some("rate_limit_exceeded"), "slow down");
        assert!(err.is_quota_exceeded());

        let err = ThreadRunError::run_failed(Some("server_error"), "boom");
        assert!(matches!(
            err,
            ThreadRunError::RunFailed { code: Some(ErrorCode::ServerError), ref message } if message == "boom"
        ));
    }

    #[test]
    fn unknown_codes_are_kept_verbatim() {
        let err = ThreadRunError::run_failed(Some("tool_crashed"), "x");
        assert!(matches!(
            err,
            ThreadRunError::RunFailed { code: Some(ErrorCode::Other(ref c)), .. } if c == "tool_crashed"
        ));
    }

    #[test]
    fn status_429_counts_as_quota() {
        assert_eq!(ThreadRunError::api(429, "x").category(), ErrorCategory::Quota);
        assert_eq!(ThreadRunError::api(500, "x").category(), ErrorCategory::Api);
    }

    #[test]
    fn cancellation_is_not_a_failure_category() {
        assert!(ThreadRunError::Cancelled.is_cancellation());
        assert_eq!(ThreadRunError::Cancelled.category(), ErrorCategory::Cancelled);
    }
}
