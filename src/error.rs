//! Seal Engine Error Types
//!
//! Validation errors block the mutating operation entirely.
//! Storage and rendering errors are retryable and reported generically.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SealError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Rendering failed: {0}")]
    RenderingFailure(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type SealResult<T> = Result<T, SealError>;

impl SealError {
    /// Storage and rendering failures may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SealError::RenderingFailure(_) | SealError::Storage(_))
    }

    /// Message safe to show to the end user.
    pub fn public_message(&self) -> String {
        match self {
            SealError::NotFound(reason) | SealError::InvalidState(reason) => reason.clone(),
            SealError::RenderingFailure(_) | SealError::Storage(_) => {
                "The seal service is temporarily unavailable, please retry".to_string()
            }
            SealError::Serialization(_) | SealError::Configuration(_) => {
                "Internal error while processing the seal".to_string()
            }
        }
    }
}

impl From<std::io::Error> for SealError {
    fn from(e: std::io::Error) -> Self {
        SealError::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(SealError::Storage("disk full".into()).is_retryable());
        assert!(SealError::RenderingFailure("timeout".into()).is_retryable());
        assert!(!SealError::NotFound("seal".into()).is_retryable());
        assert!(!SealError::InvalidState("inactive".into()).is_retryable());
    }

    #[test]
    fn test_public_message_hides_internals() {
        let err = SealError::Storage("connection refused 10.0.0.3:5432".into());
        assert!(!err.public_message().contains("10.0.0.3"));

        let err = SealError::InvalidState("seal x has expired since 2024-12-31".into());
        assert_eq!(err.public_message(), "seal x has expired since 2024-12-31");
    }
}
