//! Error types for index rotation.
//!
//! `MissingPrimaryIndex` is the expected outcome on a prefix that has never
//! been rotated; `PrimaryIndexCopyFailure` means archiving gave up after
//! retrying transient engine failures. Engine errors that are not classified
//! pass through unchanged.

use es_rotator_core::CoreError;
use es_rotator_engine::EngineError;
use thiserror::Error;

/// A result type using `RotatorError`.
pub type Result<T> = std::result::Result<T, RotatorError>;

/// Errors that can occur during rotation operations.
#[derive(Debug, Error)]
pub enum RotatorError {
    /// The pointer to the current primary index cannot be resolved.
    #[error("primary index missing: {0}")]
    MissingPrimaryIndex(String),

    /// Archiving the primary failed after exhausting retries.
    #[error("unable to copy primary to secondary index after {attempts} attempts")]
    PrimaryIndexCopyFailure {
        /// Number of reads attempted.
        attempts: u32,
        /// The last failure.
        #[source]
        source: Box<RotatorError>,
    },

    /// A strategy or rotator was built with missing or invalid options.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Search engine error.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Core type error.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl RotatorError {
    /// Returns true if this error is a transient engine failure worth retrying.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Engine(err) => err.is_transient(),
            _ => false,
        }
    }

    /// Returns true if there is no primary index to resolve.
    #[must_use]
    pub const fn is_missing_primary(&self) -> bool {
        matches!(self, Self::MissingPrimaryIndex(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_engine_server_errors_are_transient() {
        let server: RotatorError = EngineError::from_status(503, "unavailable").into();
        assert!(server.is_transient());

        let missing = RotatorError::MissingPrimaryIndex("none".into());
        assert!(!missing.is_transient());
        assert!(missing.is_missing_primary());

        let rejected: RotatorError = EngineError::from_status(400, "parsing_exception").into();
        assert!(!rejected.is_transient());
    }

    #[test]
    fn engine_errors_pass_through_display() {
        let err: RotatorError = EngineError::from_status(400, "parsing_exception: bad").into();
        assert_eq!(
            err.to_string(),
            "engine rejected request (400): parsing_exception: bad"
        );
    }

    #[test]
    fn copy_failure_keeps_source() {
        let err = RotatorError::PrimaryIndexCopyFailure {
            attempts: 6,
            source: Box::new(EngineError::from_status(503, "unavailable").into()),
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("6 attempts"));
    }
}
