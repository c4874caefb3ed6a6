use std::time::Duration;

/// Client-specific result type
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors from the Paddock client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Relay rejected the turn before streaming
    #[error("{status} {error_type}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error type identifier
        error_type: String,
        /// Human-readable error message
        message: String,
    },

    /// The turn did not finish in time
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Failed to parse response
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}
