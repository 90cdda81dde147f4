//! Error types for search engine requests.

use thiserror::Error;

/// A result type using `EngineError`.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors returned by a [`SearchEngine`](crate::SearchEngine).
#[derive(Debug, Error)]
pub enum EngineError {
    /// The index, document, or alias does not exist.
    #[error("not found: {reason}")]
    NotFound {
        /// Engine-provided explanation.
        reason: String,
    },

    /// The engine failed to serve the request (5xx).
    #[error("engine server error ({status}): {reason}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Engine-provided explanation.
        reason: String,
    },

    /// The engine rejected the request (4xx other than 404).
    #[error("engine rejected request ({status}): {reason}")]
    Client {
        /// HTTP status code.
        status: u16,
        /// Engine-provided explanation.
        reason: String,
    },

    /// The request never produced a response.
    #[error("engine transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("invalid engine response: {0}")]
    Decode(String),

    /// The engine reported a version that could not be parsed.
    #[error("invalid engine version: {0}")]
    InvalidVersion(String),
}

impl EngineError {
    /// Classify an unsuccessful HTTP status.
    #[must_use]
    pub fn from_status(status: u16, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        match status {
            404 => Self::NotFound { reason },
            500..=599 => Self::Server { status, reason },
            _ => Self::Client { status, reason },
        }
    }

    /// Returns true if the resource addressed by the request is missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if the failure is on the engine side and might clear up
    /// on its own.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Server { .. } | Self::Transport(_))
    }

    /// The HTTP status behind this error, if there was one.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::Server { status, .. } | Self::Client { status, .. } => Some(*status),
            Self::Transport(_) | Self::Decode(_) | Self::InvalidVersion(_) => None,
        }
    }
}
