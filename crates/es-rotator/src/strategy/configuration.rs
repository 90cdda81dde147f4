//! Primary pointer stored as a record in the configuration index.

use std::sync::Arc;

use async_trait::async_trait;
use es_rotator_core::{ConfigurationId, ConfigurationRecord};
use es_rotator_engine::SearchEngine;
use tracing::{debug, error};

use super::PrimaryIndexStrategy;
use crate::configuration_index::ConfigurationIndex;
use crate::error::{Result, RotatorError};

/// Keeps the primary index name in the reserved `primary` record.
#[derive(Debug)]
pub struct ConfigurationStrategy<E> {
    configuration: Arc<ConfigurationIndex<E>>,
}

impl<E> ConfigurationStrategy<E> {
    /// Create a strategy backed by `configuration`.
    #[must_use]
    pub const fn new(configuration: Arc<ConfigurationIndex<E>>) -> Self {
        Self { configuration }
    }
}

#[async_trait]
impl<E: SearchEngine> PrimaryIndexStrategy for ConfigurationStrategy<E> {
    async fn get_primary_index(&self) -> Result<String> {
        if !self.configuration.exists().await? {
            error!(
                index = %self.configuration,
                "Primary index configuration index not available."
            );
            return Err(RotatorError::MissingPrimaryIndex(
                "primary index configuration index not available".to_string(),
            ));
        }

        match self
            .configuration
            .get_record(&ConfigurationId::primary())
            .await?
        {
            Some(record) => Ok(record.name),
            None => {
                error!(index = %self.configuration, "Primary index does not exist.");
                Err(RotatorError::MissingPrimaryIndex(
                    "primary index not available".to_string(),
                ))
            }
        }
    }

    async fn set_primary_index(&self, name: &str) -> Result<()> {
        self.configuration.ensure_created().await?;
        self.configuration
            .put_record(
                Some(&ConfigurationId::primary()),
                &ConfigurationRecord::now(name),
            )
            .await?;
        debug!(name, "Primary index set.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use es_rotator_engine::{EngineError, MemoryEngine, Operation};
    use serde_json::json;

    fn strategy(engine: &Arc<MemoryEngine>) -> ConfigurationStrategy<MemoryEngine> {
        ConfigurationStrategy::new(Arc::new(ConfigurationIndex::new(
            Arc::clone(engine),
            "some",
        )))
    }

    #[tokio::test]
    async fn missing_configuration_index() {
        let engine = Arc::new(MemoryEngine::new());
        let err = strategy(&engine).get_primary_index().await.unwrap_err();
        assert!(err.is_missing_primary());
        assert_eq!(engine.calls(Operation::GetDocument), 0);
    }

    #[tokio::test]
    async fn missing_primary_record() {
        let engine = Arc::new(MemoryEngine::new());
        engine.add_index(".some_configuration");
        let err = strategy(&engine).get_primary_index().await.unwrap_err();
        assert!(err.is_missing_primary());
    }

    #[tokio::test]
    async fn reads_primary_from_primary_shard() {
        let engine = Arc::new(MemoryEngine::new());
        engine.put_document(
            ".some_configuration",
            "primary",
            json!({"name": "some_index_1", "timestamp": 1}),
        );
        let name = strategy(&engine).get_primary_index().await.unwrap();
        assert_eq!(name, "some_index_1");
        assert_eq!(engine.last_preference().as_deref(), Some("_primary"));
    }

    #[tokio::test]
    async fn set_creates_index_and_overwrites() {
        let engine = Arc::new(MemoryEngine::new());
        let strategy = strategy(&engine);

        strategy.set_primary_index("some_index_1").await.unwrap();
        strategy.set_primary_index("some_index_2").await.unwrap();

        assert_eq!(strategy.get_primary_index().await.unwrap(), "some_index_2");
        assert_eq!(engine.document_ids(".some_configuration"), vec!["primary"]);
        assert_eq!(engine.calls(Operation::CreateIndex), 1);
    }

    #[tokio::test]
    async fn server_errors_pass_through() {
        let engine = Arc::new(MemoryEngine::new());
        engine.add_index(".some_configuration");
        engine.fail_next(Operation::GetDocument, 1, 503);

        let err = strategy(&engine).get_primary_index().await.unwrap_err();
        assert!(err.is_transient());
        assert!(matches!(err, RotatorError::Engine(EngineError::Server { status: 503, .. })));
    }
}
