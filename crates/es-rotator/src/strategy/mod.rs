//! Where the primary index pointer lives.
//!
//! Two implementations are provided:
//!
//! - [`ConfigurationStrategy`]: a `primary` record in the configuration index
//! - [`AliasStrategy`]: an engine alias, re-pointed with one atomic request

mod alias;
mod configuration;

pub use alias::AliasStrategy;
pub use configuration::ConfigurationStrategy;

use async_trait::async_trait;

use crate::error::Result;

/// Resolves and re-points the primary index.
#[async_trait]
pub trait PrimaryIndexStrategy: Send + Sync {
    /// Name of the index currently serving as primary.
    ///
    /// # Errors
    ///
    /// Returns `RotatorError::MissingPrimaryIndex` if no primary has been set.
    async fn get_primary_index(&self) -> Result<String>;

    /// Point the primary at `name`, whether or not one was set before.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the update.
    async fn set_primary_index(&self, name: &str) -> Result<()>;
}
