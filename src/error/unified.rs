//! Unified error classification.

use strum::EnumString;

/// Machine-readable error code reported by the run service.
#[derive(Debug, Clone, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCode {
    InvalidApiKey,
    InsufficientQuota,
    RateLimitExceeded,
    InvalidRequest,
    ServerError,
    #[strum(default)]
    Other(String),
}

impl ErrorCode {
    /// Parse a server-supplied code, falling back to [`ErrorCode::Other`].
    pub fn parse(code: &str) -> Self {
        code.parse().unwrap_or_else(|_| Self::Other(code.to_string()))
    }

    /// Whether the code means the account ran out of quota or hit a rate limit.
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::InsufficientQuota | Self::RateLimitExceeded)
    }
}

/// Broad error category used to route user-visible handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caller asked for something the current state does not allow.
    Precondition,
    Authentication,
    /// Quota exhausted or rate limited; surfaced as a blocking notice.
    Quota,
    Network,
    /// The server broke the streaming protocol; a programming error.
    Protocol,
    /// The run itself failed or expired on the server.
    Run,
    Api,
    Configuration,
    Serialization,
    ToolExecution,
    Cancelled,
    Unknown,
}
