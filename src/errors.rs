/*!
 * Error types for linesync.
 *
 * Component errors are typed with thiserror so callers can tell a transient
 * oracle hiccup from a structural failure. Application plumbing (config,
 * files, database) uses anyhow on top of these.
 */

use thiserror::Error;

/// Errors that can occur when talking to a provider API
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The call did not finish within the per-call timeout
    #[error("Request timed out after {0} ms")]
    Timeout(u64),
}

impl ProviderError {
    /// Whether a retry with backoff may succeed.
    ///
    /// Timeouts are handled exactly like rate limiting.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimitExceeded(_)
            | Self::Timeout(_)
            | Self::ConnectionError(_)
            | Self::RequestFailed(_) => true,
            Self::ApiError { status_code, .. } => *status_code == 429 || *status_code >= 500,
            Self::ParseError(_) | Self::AuthenticationError(_) => false,
        }
    }
}

/// Placeholder protect/restore failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderError {
    #[error("placeholder token {0} is missing from the translated text")]
    MissingToken(String),

    #[error("placeholder token {0} appears more than once in the translated text")]
    DuplicatedToken(String),

    #[error("unknown placeholder token {0} in the translated text")]
    UnknownToken(String),

    #[error("input already contains placeholder token syntax")]
    TokenSyntaxInInput,
}

/// Reflow policy violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReflowError {
    /// Fewer breakable pieces than non-blank lines to fill
    #[error("translated text has {pieces} breakable piece(s) but {required} non-blank line(s) are required")]
    InsufficientContent { pieces: usize, required: usize },

    /// Non-empty text but no line may hold it
    #[error("translated text is not empty but no non-blank line is available for it")]
    ContentWithoutLines,
}

/// Errors raised by the sync engine
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    /// Retries exhausted while the oracle kept rate limiting or timing out
    #[error("rate limited: {0}")]
    RateLimit(String),

    /// Malformed or uncountable oracle response
    #[error("oracle format error: {0}")]
    OracleFormat(String),

    /// Structural invariant broken; the file is not written
    #[error("alignment violation: {0}")]
    AlignmentViolation(String),

    /// Durable cache could not be read or written
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("placeholder corruption: {0}")]
    PlaceholderCorruption(#[from] PlaceholderError),

    #[error("reflow policy violation: {0}")]
    ReflowPolicy(#[from] ReflowError),

    /// Non-retryable provider failure
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The run was aborted before this work item was attempted
    #[error("run aborted: {0}")]
    Aborted(String),
}

impl SyncError {
    /// Errors that fail the whole file rather than a single block
    pub fn is_file_fatal(&self) -> bool {
        matches!(
            self,
            Self::AlignmentViolation(_) | Self::PlaceholderCorruption(_) | Self::ReflowPolicy(_)
        )
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from the sync engine
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isRetryable_withTransientErrors_shouldBeTrue() {
        assert!(ProviderError::RateLimitExceeded("slow down".into()).is_retryable());
        assert!(ProviderError::Timeout(30_000).is_retryable());
        assert!(ProviderError::ConnectionError("reset".into()).is_retryable());
        assert!(ProviderError::ApiError { status_code: 503, message: "busy".into() }.is_retryable());
    }

    #[test]
    fn test_isRetryable_withClientErrors_shouldBeFalse() {
        assert!(!ProviderError::AuthenticationError("bad key".into()).is_retryable());
        assert!(!ProviderError::ApiError { status_code: 400, message: "bad".into() }.is_retryable());
        assert!(!ProviderError::ParseError("junk".into()).is_retryable());
    }

    #[test]
    fn test_isFileFatal_shouldSeparateBlockAndFileFailures() {
        assert!(SyncError::PlaceholderCorruption(PlaceholderError::MissingToken("⟦PH0⟧".into())).is_file_fatal());
        assert!(SyncError::AlignmentViolation("lines".into()).is_file_fatal());
        assert!(!SyncError::OracleFormat("count".into()).is_file_fatal());
        assert!(!SyncError::RateLimit("429".into()).is_file_fatal());
        assert!(!SyncError::CacheUnavailable("locked".into()).is_file_fatal());
    }

    #[test]
    fn test_appError_fromSyncError_shouldWrap() {
        let err: AppError = SyncError::Aborted("limit".into()).into();
        assert!(err.to_string().contains("run aborted"));
    }
}
