//! Common error types for es-rotator.

use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while building core types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A configuration id was empty.
    #[error("configuration id must not be empty")]
    EmptyConfigurationId,
}
