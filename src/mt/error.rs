use thiserror::Error;

/// Error types for the translator boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MtError {
    /// Transient failure: network, auth, rate limit or server error
    #[error("Translator unavailable: {0}")]
    Unavailable(String),
    /// The service answered, but the body could not be understood
    #[error("Invalid translator response: {0}")]
    InvalidResponse(String),
    /// The service returned a different number of lines than it was sent
    #[error("Batch length mismatch: expected {expected} lines, got {actual}")]
    BatchLengthMismatch { expected: usize, actual: usize },
    /// Provider misconfiguration (missing key, bad URL)
    #[error("Translator configuration error: {0}")]
    Config(String),
    /// Locale code rejected before sending
    #[error("Invalid locale: {0}")]
    InvalidLocale(String),
}

impl MtError {
    /// Whether a batch that failed with this error should be sent again
    pub fn is_retryable(&self) -> bool {
        matches!(self, MtError::Unavailable(_) | MtError::InvalidResponse(_))
    }
}

impl From<reqwest::Error> for MtError {
    fn from(err: reqwest::Error) -> Self {
        MtError::Unavailable(err.to_string())
    }
}

/// Result type for translator operations
pub type MtResult<T> = Result<T, MtError>;
