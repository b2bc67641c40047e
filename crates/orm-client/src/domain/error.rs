//! Client error types and their mapping onto the caller-visible error list.

use crate::adapters::pending::CorrelationError;
use crate::domain::config::ConfigError;
use shared_bus::TransportError;
use shared_types::{ErrorKind, ModelError};
use thiserror::Error;

/// Errors raised while establishing a session or running a call.
#[derive(Debug, Error)]
pub enum OrmError {
    /// Connect, subscribe or publish failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The correlation entry could not be registered.
    #[error(transparent)]
    Correlation(#[from] CorrelationError),

    /// The request body could not be serialized.
    #[error("failed to encode request: {0}")]
    EncodeRequest(#[source] serde_json::Error),

    /// The reply body could not be deserialized.
    #[error("failed to decode reply: {0}")]
    DecodeResponse(#[source] serde_json::Error),

    /// No reply before the deadline.
    #[error("{}", shared_types::TIMEOUT_DESCRIPTION)]
    Timeout,

    /// The session configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl OrmError {
    /// Category reported to the caller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) | Self::Correlation(_) | Self::Config(_) => ErrorKind::Transport,
            Self::EncodeRequest(_) | Self::DecodeResponse(_) => ErrorKind::Encoding,
            Self::Timeout => ErrorKind::Timeout,
        }
    }

    /// Metric label for the call outcome this error ends.
    pub fn outcome(&self) -> &'static str {
        self.kind().as_str()
    }
}

impl From<OrmError> for ModelError {
    fn from(error: OrmError) -> Self {
        match error {
            OrmError::Timeout => ModelError::timeout(),
            other => ModelError::new(other.kind(), other.to_string()),
        }
    }
}

/// Result alias for client operations
pub type OrmResult<T> = Result<T, OrmError>;
