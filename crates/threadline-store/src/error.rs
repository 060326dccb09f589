use thiserror::Error;
use threadline_client::{GatewayError, StreamError, ThreadId};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No active thread")]
    NoActiveThread,

    #[error("Thread not found: {0}")]
    ThreadNotFound(ThreadId),

    #[error("A message is already being sent in thread {0}")]
    SendInFlight(ThreadId),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("Response stream was cancelled")]
    Cancelled,
}

impl StoreError {
    /// Whether this failure belongs in `last_error`
    pub(crate) fn is_recorded(&self) -> bool {
        !matches!(self, Self::NoActiveThread | Self::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
