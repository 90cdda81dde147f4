//! The rotation facade.
//!
//! [`IndexRotator`] delegates primary get/set to its strategy and manages
//! secondaries through the configuration index, whichever strategy is active.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use es_rotator_core::{ConfigurationId, ConfigurationRecord, Disposition, SecondaryIndices};
use es_rotator_engine::{DocumentDeletion, EngineError, IndexDeletion, SearchEngine};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{RetryConfig, RotatorConfig, StrategyConfig};
use crate::configuration_index::ConfigurationIndex;
use crate::error::{Result, RotatorError};
use crate::retry::{Sleeper, TokioSleeper};
use crate::strategy::{AliasStrategy, ConfigurationStrategy, PrimaryIndexStrategy};

/// Outcome of deleting one secondary.
///
/// Both halves are reported independently so a failure on one entry never
/// hides what happened to the others.
#[derive(Debug)]
pub struct SecondaryDeletion {
    /// Physical index the record pointed to.
    pub index_name: String,
    /// Index deletion outcome; `None` when the index was already gone.
    pub index: Option<std::result::Result<IndexDeletion, EngineError>>,
    /// Configuration record deletion outcome.
    pub config: std::result::Result<DocumentDeletion, EngineError>,
}

impl SecondaryDeletion {
    /// Returns true if neither deletion failed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.config.is_ok() && self.index.as_ref().map_or(true, std::result::Result::is_ok)
    }
}

/// Result of [`IndexRotator::rotate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rotation {
    /// Primary before the rotation, if there was one.
    pub previous: Option<String>,
    /// Secondary record created for `previous`.
    pub secondary_id: Option<ConfigurationId>,
    /// Primary after the rotation.
    pub primary: String,
}

/// Rotates the primary index of one prefix and tracks its secondaries.
pub struct IndexRotator<E> {
    configuration: Arc<ConfigurationIndex<E>>,
    strategy: Box<dyn PrimaryIndexStrategy>,
    retry: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl<E: SearchEngine + 'static> IndexRotator<E> {
    /// Create a rotator for `prefix` using the configuration strategy and
    /// default retry settings.
    #[must_use]
    pub fn new(engine: Arc<E>, prefix: &str) -> Self {
        let configuration = Arc::new(ConfigurationIndex::new(engine, prefix));
        Self {
            strategy: Box::new(ConfigurationStrategy::new(Arc::clone(&configuration))),
            configuration,
            retry: RetryConfig::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Build a rotator from configuration.
    ///
    /// # Errors
    ///
    /// Returns `RotatorError::InvalidConfiguration` if the configuration is
    /// incomplete.
    pub fn from_config(engine: Arc<E>, config: &RotatorConfig) -> Result<Self> {
        config.validate()?;
        let configuration = Arc::new(
            ConfigurationIndex::new(Arc::clone(&engine), &config.prefix)
                .with_page_size(config.secondary_page_size),
        );
        let strategy: Box<dyn PrimaryIndexStrategy> = match &config.strategy {
            StrategyConfig::Configuration => {
                Box::new(ConfigurationStrategy::new(Arc::clone(&configuration)))
            }
            StrategyConfig::Alias {
                alias_name,
                index_pattern,
            } => Box::new(AliasStrategy::new(engine, alias_name, index_pattern)?),
        };
        Ok(Self {
            configuration,
            strategy,
            retry: config.retry,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replace the primary index strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: impl PrimaryIndexStrategy + 'static) -> Self {
        self.strategy = Box::new(strategy);
        self
    }

    /// Switch to an alias strategy on the same engine.
    ///
    /// # Errors
    ///
    /// Returns `RotatorError::InvalidConfiguration` if either option is empty.
    pub fn with_alias_strategy(
        self,
        alias_name: impl Into<String>,
        index_pattern: impl Into<String>,
    ) -> Result<Self> {
        let engine = Arc::clone(self.configuration.engine());
        Ok(self.with_strategy(AliasStrategy::new(engine, alias_name, index_pattern)?))
    }

    /// Replace the retry settings used when archiving the primary.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Replace how the rotator waits between retries.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// The configuration index tracking this prefix.
    #[must_use]
    pub fn configuration_index(&self) -> &ConfigurationIndex<E> {
        &self.configuration
    }

    /// The active primary index strategy.
    #[must_use]
    pub fn strategy(&self) -> &dyn PrimaryIndexStrategy {
        self.strategy.as_ref()
    }

    /// Retry settings used when archiving the primary.
    #[must_use]
    pub const fn retry(&self) -> RetryConfig {
        self.retry
    }

    /// Name of the current primary index.
    ///
    /// # Errors
    ///
    /// Returns `RotatorError::MissingPrimaryIndex` if no primary has been set.
    pub async fn get_primary_index(&self) -> Result<String> {
        self.strategy.get_primary_index().await
    }

    /// Point the primary at `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the strategy's engine update fails.
    pub async fn set_primary_index(&self, name: &str) -> Result<()> {
        self.strategy.set_primary_index(name).await
    }

    /// Record the current primary as a secondary and return the new record's
    /// id.
    ///
    /// Transient failures reading the primary are retried after the
    /// configured delay.
    ///
    /// # Errors
    ///
    /// Returns `RotatorError::MissingPrimaryIndex` if there is no primary,
    /// `RotatorError::PrimaryIndexCopyFailure` once retries are exhausted, or
    /// any other engine error unchanged.
    pub async fn copy_primary_index_to_secondary(&self) -> Result<ConfigurationId> {
        self.archive_primary().await.map(|(_, id)| id)
    }

    /// List secondaries recorded strictly before `older_than` (default: now),
    /// in storage order.
    ///
    /// # Errors
    ///
    /// Returns an error if a request fails.
    pub async fn get_secondary_indices(
        &self,
        older_than: Option<DateTime<Utc>>,
        disposition: Disposition,
    ) -> Result<SecondaryIndices> {
        let entries = self
            .configuration
            .secondary_entries(older_than.unwrap_or_else(Utc::now))
            .await?;
        Ok(SecondaryIndices::from_entries(entries, disposition))
    }

    /// Delete every secondary recorded strictly before `older_than` (default:
    /// now): its physical index when present, then its configuration record.
    ///
    /// The result is keyed by configuration id, in listing order. Failures on
    /// one entry are recorded in its outcome and do not stop the rest.
    ///
    /// # Errors
    ///
    /// Returns an error only if listing the secondaries fails.
    pub async fn delete_secondary_indices(
        &self,
        older_than: Option<DateTime<Utc>>,
    ) -> Result<IndexMap<ConfigurationId, SecondaryDeletion>> {
        let engine = self.configuration.engine();
        let entries = self
            .configuration
            .secondary_entries(older_than.unwrap_or_else(Utc::now))
            .await?;

        let mut results = IndexMap::with_capacity(entries.len());
        for entry in entries {
            let index = match engine.index_exists(&entry.index).await {
                Ok(true) => match engine.delete_index(&entry.index).await {
                    Err(err) if err.is_not_found() => None,
                    outcome => Some(outcome),
                },
                Ok(false) => None,
                Err(err) => Some(Err(err)),
            };
            let config = self
                .configuration
                .delete_record(&entry.configuration_id)
                .await;

            match &index {
                Some(Ok(_)) => debug!(
                    index = %entry.index,
                    configuration_id = %entry.configuration_id,
                    "Deleted secondary index."
                ),
                Some(Err(err)) => warn!(
                    index = %entry.index,
                    error = %err,
                    "Unable to delete secondary index."
                ),
                None => debug!(
                    index = %entry.index,
                    configuration_id = %entry.configuration_id,
                    "Index not found to delete."
                ),
            }
            if let Err(err) = &config {
                warn!(
                    configuration_id = %entry.configuration_id,
                    error = %err,
                    "Unable to delete secondary configuration entry."
                );
            }

            results.insert(
                entry.configuration_id,
                SecondaryDeletion {
                    index_name: entry.index,
                    index,
                    config,
                },
            );
        }
        Ok(results)
    }

    /// Archive the current primary (if any) and point the primary at
    /// `new_index`.
    ///
    /// # Errors
    ///
    /// Returns an error if archiving fails for any reason other than there
    /// being no primary yet, or if setting the new primary fails.
    pub async fn rotate(&self, new_index: &str) -> Result<Rotation> {
        let (previous, secondary_id) = match self.archive_primary().await {
            Ok((previous, id)) => (Some(previous), Some(id)),
            Err(err) if err.is_missing_primary() => (None, None),
            Err(err) => return Err(err),
        };
        self.set_primary_index(new_index).await?;
        Ok(Rotation {
            previous,
            secondary_id,
            primary: new_index.to_string(),
        })
    }

    async fn archive_primary(&self) -> Result<(String, ConfigurationId)> {
        self.configuration.ensure_created().await?;
        let primary = self.read_primary_with_retry().await?;
        let id = self
            .configuration
            .put_record(None, &ConfigurationRecord::now(&primary))
            .await?;
        debug!(id = %id, index = %primary, "Secondary entry created.");
        Ok((primary, id))
    }

    /// One initial read plus up to `max_retries` retries of transient failures.
    async fn read_primary_with_retry(&self) -> Result<String> {
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            match self.strategy.get_primary_index().await {
                Ok(name) => return Ok(name),
                Err(err) if err.is_transient() => {
                    if attempts > self.retry.max_retries {
                        return Err(RotatorError::PrimaryIndexCopyFailure {
                            attempts,
                            source: Box::new(err),
                        });
                    }
                    warn!(attempt = attempts, error = %err, "Unable to get primary index.");
                    self.sleeper.sleep(self.retry.delay()).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use es_rotator_engine::{MemoryEngine, Operation};
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default, Clone)]
    struct RecordingSleeper(Arc<Mutex<Vec<Duration>>>);

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.0.lock().push(duration);
        }
    }

    fn rotator(engine: &Arc<MemoryEngine>, sleeper: &RecordingSleeper) -> IndexRotator<MemoryEngine> {
        IndexRotator::new(Arc::clone(engine), "some").with_sleeper(sleeper.clone())
    }

    fn with_primary(name: &str) -> Arc<MemoryEngine> {
        let engine = Arc::new(MemoryEngine::new());
        engine.put_document(
            ".some_configuration",
            "primary",
            json!({"name": name, "timestamp": 1}),
        );
        engine
    }

    #[tokio::test]
    async fn copy_creates_secondary_record() {
        let engine = with_primary("some_index_1");
        let rotator = rotator(&engine, &RecordingSleeper::default());

        let id = rotator.copy_primary_index_to_secondary().await.unwrap();

        assert!(!id.is_primary());
        let record = rotator
            .configuration_index()
            .get_record(&id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.name, "some_index_1");
    }

    #[tokio::test]
    async fn copy_retries_transient_failures() {
        let engine = with_primary("some_index_1");
        engine.fail_next(Operation::GetDocument, 2, 503);
        let sleeper = RecordingSleeper::default();

        rotator(&engine, &sleeper)
            .copy_primary_index_to_secondary()
            .await
            .unwrap();

        assert_eq!(engine.calls(Operation::GetDocument), 3);
        assert_eq!(*sleeper.0.lock(), vec![Duration::from_millis(500); 2]);
    }

    #[tokio::test]
    async fn copy_gives_up_after_max_retries() {
        let engine = with_primary("some_index_1");
        engine.fail_next(Operation::GetDocument, 100, 503);
        let sleeper = RecordingSleeper::default();
        let rotator = rotator(&engine, &sleeper).with_retry(RetryConfig {
            max_retries: 3,
            delay_ms: 10,
        });

        let err = rotator.copy_primary_index_to_secondary().await.unwrap_err();

        match err {
            RotatorError::PrimaryIndexCopyFailure { attempts, source } => {
                assert_eq!(attempts, 4);
                assert!(source.is_transient());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(engine.calls(Operation::GetDocument), 4);
        assert_eq!(sleeper.0.lock().len(), 3);
        assert_eq!(engine.document_ids(".some_configuration"), vec!["primary"]);
    }

    #[tokio::test]
    async fn copy_does_not_retry_missing_primary() {
        let engine = Arc::new(MemoryEngine::new());
        let sleeper = RecordingSleeper::default();

        let err = rotator(&engine, &sleeper)
            .copy_primary_index_to_secondary()
            .await
            .unwrap_err();

        assert!(err.is_missing_primary());
        assert!(sleeper.0.lock().is_empty());
        // The configuration index is still created for later writes.
        assert!(engine.has_index(".some_configuration"));
    }

    #[tokio::test]
    async fn copy_does_not_retry_client_errors() {
        let engine = with_primary("some_index_1");
        engine.fail_next(Operation::GetDocument, 1, 400);

        let err = rotator(&engine, &RecordingSleeper::default())
            .copy_primary_index_to_secondary()
            .await
            .unwrap_err();

        assert!(matches!(err, RotatorError::Engine(EngineError::Client { .. })));
        assert_eq!(engine.calls(Operation::GetDocument), 1);
    }

    #[tokio::test]
    async fn delete_tolerates_missing_index() {
        let engine = Arc::new(MemoryEngine::new());
        engine.put_document(
            ".some_configuration",
            "gone",
            json!({"name": "some_index_0", "timestamp": 1}),
        );

        let results = rotator(&engine, &RecordingSleeper::default())
            .delete_secondary_indices(None)
            .await
            .unwrap();

        let outcome = &results[&ConfigurationId::new("gone").unwrap()];
        assert_eq!(outcome.index_name, "some_index_0");
        assert!(outcome.index.is_none());
        assert!(outcome.config.as_ref().unwrap().found);
        assert!(outcome.is_complete());
        assert!(engine.document_ids(".some_configuration").is_empty());
    }

    #[tokio::test]
    async fn delete_reports_per_entry_failures() {
        let engine = Arc::new(MemoryEngine::new());
        let source = |name: &str| json!({"name": name, "timestamp": 1});
        engine.put_document(".some_configuration", "a", source("some_index_2"));
        engine.put_document(".some_configuration", "b", source("some_index_3"));
        engine.add_index("some_index_2");
        engine.add_index("some_index_3");
        engine.fail_next(Operation::DeleteIndex, 1, 500);

        let results = rotator(&engine, &RecordingSleeper::default())
            .delete_secondary_indices(None)
            .await
            .unwrap();

        let keys: Vec<&str> = results.keys().map(ConfigurationId::as_str).collect();
        assert_eq!(keys, vec!["a", "b"]);

        let first = &results[0];
        assert!(matches!(first.index, Some(Err(EngineError::Server { .. }))));
        assert!(first.config.is_ok());
        assert!(!first.is_complete());

        let second = &results[1];
        assert!(second.index.as_ref().unwrap().as_ref().unwrap().acknowledged);
        assert!(second.is_complete());
        assert!(engine.has_index("some_index_2"));
        assert!(!engine.has_index("some_index_3"));
    }

    #[tokio::test]
    async fn delete_treats_index_removed_concurrently_as_missing() {
        let engine = Arc::new(MemoryEngine::new());
        engine.put_document(
            ".some_configuration",
            "raced",
            json!({"name": "some_index_4", "timestamp": 1}),
        );
        engine.add_index("some_index_4");
        engine.fail_next(Operation::DeleteIndex, 1, 404);

        let results = rotator(&engine, &RecordingSleeper::default())
            .delete_secondary_indices(None)
            .await
            .unwrap();

        let outcome = &results[&ConfigurationId::new("raced").unwrap()];
        assert!(outcome.index.is_none());
        assert!(outcome.config.as_ref().unwrap().found);
        assert!(outcome.is_complete());
        assert_eq!(engine.calls(Operation::DeleteIndex), 1);
    }

    #[tokio::test]
    async fn delete_reports_record_failure_after_index_deleted() {
        let engine = Arc::new(MemoryEngine::new());
        engine.put_document(
            ".some_configuration",
            "stuck",
            json!({"name": "some_index_5", "timestamp": 1}),
        );
        engine.add_index("some_index_5");
        engine.fail_next(Operation::DeleteDocument, 1, 503);

        let results = rotator(&engine, &RecordingSleeper::default())
            .delete_secondary_indices(None)
            .await
            .unwrap();

        let outcome = &results[&ConfigurationId::new("stuck").unwrap()];
        assert!(outcome.index.as_ref().unwrap().as_ref().unwrap().acknowledged);
        assert!(matches!(
            outcome.config,
            Err(EngineError::Server { status: 503, .. })
        ));
        assert!(!outcome.is_complete());
        assert!(!engine.has_index("some_index_5"));
        assert_eq!(engine.document_ids(".some_configuration"), vec!["stuck"]);
    }

    #[tokio::test]
    async fn rotate_first_time_skips_archive() {
        let engine = Arc::new(MemoryEngine::new());
        let rotator = rotator(&engine, &RecordingSleeper::default());

        let rotation = rotator.rotate("some_index_1").await.unwrap();

        assert_eq!(
            rotation,
            Rotation {
                previous: None,
                secondary_id: None,
                primary: "some_index_1".into(),
            }
        );
        assert_eq!(rotator.get_primary_index().await.unwrap(), "some_index_1");
    }

    #[tokio::test]
    async fn rotate_archives_previous_primary() {
        let engine = with_primary("some_index_1");
        let rotator = rotator(&engine, &RecordingSleeper::default());

        let rotation = rotator.rotate("some_index_2").await.unwrap();

        assert_eq!(rotation.previous.as_deref(), Some("some_index_1"));
        assert_eq!(rotation.primary, "some_index_2");
        let cutoff = Utc::now() + chrono::Duration::seconds(1);
        let listed = rotator
            .get_secondary_indices(Some(cutoff), Disposition::IncludeId)
            .await
            .unwrap();
        assert_eq!(listed.names(), vec!["some_index_1"]);
        let SecondaryIndices::WithIds(entries) = listed else {
            panic!("expected ids");
        };
        assert_eq!(Some(&entries[0].configuration_id), rotation.secondary_id.as_ref());
        assert_eq!(rotator.get_primary_index().await.unwrap(), "some_index_2");
    }

    #[tokio::test]
    async fn from_config_selects_alias_strategy() {
        let engine = Arc::new(MemoryEngine::new());
        engine.bind_alias("some_index_1", "some_alias");
        let config: RotatorConfig = serde_json::from_value(json!({
            "prefix": "some",
            "strategy": {"kind": "alias", "alias_name": "some_alias", "index_pattern": "some_index_*"}
        }))
        .unwrap();

        let rotator = IndexRotator::from_config(Arc::clone(&engine), &config).unwrap();

        assert_eq!(rotator.get_primary_index().await.unwrap(), "some_index_1");
        assert_eq!(rotator.configuration_index().name(), ".some_configuration");
    }

    #[test]
    fn from_config_rejects_empty_alias() {
        let config = RotatorConfig {
            strategy: StrategyConfig::Alias {
                alias_name: String::new(),
                index_pattern: "some_index_*".into(),
            },
            ..RotatorConfig::new("some")
        };
        let err = IndexRotator::from_config(Arc::new(MemoryEngine::new()), &config)
            .err()
            .unwrap();
        assert!(matches!(err, RotatorError::InvalidConfiguration(_)));
    }
}
