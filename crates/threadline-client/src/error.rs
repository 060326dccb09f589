use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP error ({status}): {body}")]
    Http { status: StatusCode, body: String },

    #[error("Response has no readable body")]
    MissingBody,

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl GatewayError {
    /// HTTP status carried by the error, if the server answered at all
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(e) => e.status(),
            _ => None,
        }
    }
}

/// Failures while consuming a chat stream. Malformed lines are not errors;
/// they are skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Stream transport error: {0}")]
    Transport(String),

    #[error("Stream reported an error: {0}")]
    Remote(String),

    #[error("Stream was cancelled")]
    Cancelled,
}

impl From<GatewayError> for StreamError {
    fn from(error: GatewayError) -> Self {
        Self::Transport(error.to_string())
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
