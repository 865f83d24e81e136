use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeployGuardError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Invalid date format: {0}")]
    DateParseError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Event stream closed")]
    ChannelClosed,

    #[error("Rate limit exceeded")]
    RateLimitError,

    #[error("Timeout occurred")]
    TimeoutError,
}

impl DeployGuardError {
    /// Whether repeating the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            DeployGuardError::NetworkError(_)
            | DeployGuardError::RateLimitError
            | DeployGuardError::TimeoutError => true,
            DeployGuardError::ApiError(msg) => msg.starts_with("HTTP 5"),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, DeployGuardError>;
