use thiserror::Error;

/// Application-wide error types for Trackline.
///
/// Fast-path misses (no data, rejected credentials) are deliberately absent:
/// they are ordinary values of [`crate::traits::FastPathOutcome`].
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// LLM API call failed.
    #[error("LLM error (HTTP {status_code}): {message}")]
    LlmError {
        message: String,
        status_code: u16,
        retryable: bool,
    },

    /// HTML-to-Markdown conversion failed.
    #[error("Cleaner error: {0}")]
    CleanerError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A browser primitive (navigate, click, evaluate, ...) failed.
    #[error("Browser error: {0}")]
    BrowserError(String),

    /// A carrier driver could not complete its phases or could not validate
    /// the content it extracted.
    #[error("[{driver}] {message}")]
    SiteInteraction {
        driver: &'static str,
        message: String,
    },

    /// The image challenge loop used all of its attempts.
    #[error("Challenge not solved after {attempts} attempts")]
    ChallengeExhausted { attempts: u32 },

    /// Unexpected failure while a browser session was open.
    #[error("Browser session crashed: {0}")]
    SessionCrash(String),

    /// The semantic step could not produce a valid status record.
    #[error("Interpretation failed: {0}")]
    InterpretationFailure(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Shorthand for a [`AppError::SiteInteraction`] raised by `driver`.
    pub fn site(driver: &'static str, message: impl Into<String>) -> Self {
        AppError::SiteInteraction {
            driver,
            message: message.into(),
        }
    }

    /// Stable snake_case label, used in logs and degraded records.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::HttpError(_) => "http_error",
            AppError::LlmError { .. } => "llm_error",
            AppError::CleanerError(_) => "cleaner_error",
            AppError::SerializationError(_) => "serialization_error",
            AppError::Timeout(_) => "timeout",
            AppError::RateLimitExceeded => "rate_limit_exceeded",
            AppError::NetworkError(_) => "network_error",
            AppError::ConfigError(_) => "config_error",
            AppError::BrowserError(_) => "browser_error",
            AppError::SiteInteraction { .. } => "site_interaction",
            AppError::ChallengeExhausted { .. } => "challenge_exhausted",
            AppError::SessionCrash(_) => "session_crash",
            AppError::InterpretationFailure(_) => "interpretation_failure",
            AppError::Generic(_) => "generic",
        }
    }

    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) | AppError::RateLimitExceeded => true,
            AppError::LlmError { retryable, .. } => *retryable,
            AppError::HttpError(msg) => {
                msg.contains("timeout") || msg.contains("connect") || msg.contains("reset")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(AppError::NetworkError("reset".into()).is_retryable());
        assert!(AppError::Timeout(30).is_retryable());
        assert!(AppError::RateLimitExceeded.is_retryable());
        assert!(
            AppError::LlmError {
                message: "server error".into(),
                status_code: 500,
                retryable: true,
            }
            .is_retryable()
        );
        assert!(!AppError::site("air_india", "no results").is_retryable());
        assert!(!AppError::ChallengeExhausted { attempts: 2 }.is_retryable());
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(AppError::site("x", "y").kind(), "site_interaction");
        assert_eq!(
            AppError::ChallengeExhausted { attempts: 2 }.kind(),
            "challenge_exhausted"
        );
        assert_eq!(AppError::SessionCrash("boom".into()).kind(), "session_crash");
    }

    #[test]
    fn test_site_interaction_display_names_driver() {
        let err = AppError::site("silk_way", "could not attach to tracking frame");
        assert_eq!(err.to_string(), "[silk_way] could not attach to tracking frame");
    }
}
