//! Primary pointer realized as an engine alias.

use std::sync::Arc;

use async_trait::async_trait;
use es_rotator_engine::{AliasAction, SearchEngine};
use tracing::{debug, error};

use super::PrimaryIndexStrategy;
use crate::error::{Result, RotatorError};

/// Points an alias at the primary index.
///
/// Re-pointing removes the alias from every index matching `index_pattern`
/// and adds it to the new index in a single alias update, so readers of the
/// alias never see it unbound or bound twice.
#[derive(Debug)]
pub struct AliasStrategy<E> {
    engine: Arc<E>,
    alias_name: String,
    index_pattern: String,
}

impl<E> AliasStrategy<E> {
    /// Create an alias strategy.
    ///
    /// # Errors
    ///
    /// Returns `RotatorError::InvalidConfiguration` if either option is empty.
    pub fn new(
        engine: Arc<E>,
        alias_name: impl Into<String>,
        index_pattern: impl Into<String>,
    ) -> Result<Self> {
        let alias_name = alias_name.into();
        let index_pattern = index_pattern.into();
        if alias_name.is_empty() {
            return Err(RotatorError::InvalidConfiguration(
                "alias name must be specified".to_string(),
            ));
        }
        if index_pattern.is_empty() {
            return Err(RotatorError::InvalidConfiguration(
                "index pattern must be specified".to_string(),
            ));
        }
        Ok(Self {
            engine,
            alias_name,
            index_pattern,
        })
    }

    /// The alias applications read through.
    #[must_use]
    pub fn alias_name(&self) -> &str {
        &self.alias_name
    }

    /// Pattern matching every index the alias may be bound to.
    #[must_use]
    pub fn index_pattern(&self) -> &str {
        &self.index_pattern
    }
}

#[async_trait]
impl<E: SearchEngine> PrimaryIndexStrategy for AliasStrategy<E> {
    async fn get_primary_index(&self) -> Result<String> {
        let bound = match self.engine.get_alias(&self.alias_name).await {
            Ok(bound) => bound,
            Err(err) if err.is_not_found() => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        bound.into_iter().next().ok_or_else(|| {
            error!(alias = %self.alias_name, "Primary index alias not available.");
            RotatorError::MissingPrimaryIndex(format!(
                "alias {} is not bound to an index",
                self.alias_name
            ))
        })
    }

    async fn set_primary_index(&self, name: &str) -> Result<()> {
        debug!(name, alias = %self.alias_name, "Setting primary index.");
        let actions = [
            AliasAction::remove(&self.index_pattern, &self.alias_name),
            AliasAction::add(name, &self.alias_name),
        ];
        match self.engine.update_aliases(&actions).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_not_found() => {
                debug!(
                    pattern = %self.index_pattern,
                    "No aliases matched the pattern. Retrying without the removal of old indices."
                );
                self.engine.update_aliases(&actions[1..]).await?;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
