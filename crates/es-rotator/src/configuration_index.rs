//! The per-prefix configuration index.
//!
//! Holds one `primary` record and any number of secondary records, each
//! naming a physical index and the epoch second it was recorded. The index is
//! created lazily on first write with a mapping suited to the engine version,
//! and the engine version is read at most once per instance.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use es_rotator_core::{
    configuration_index_name, ConfigurationId, ConfigurationRecord, SecondaryIndex,
};
use es_rotator_engine::{
    DocumentDeletion, EngineProfile, QueryDialect, SearchEngine, PREFER_PRIMARY,
};
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::Result;

/// Default number of secondaries returned by one listing.
pub const DEFAULT_PAGE_SIZE: usize = 10_000;

/// Bookkeeping index for one prefix.
pub struct ConfigurationIndex<E> {
    engine: Arc<E>,
    name: String,
    page_size: usize,
    profile: OnceCell<EngineProfile>,
}

impl<E: SearchEngine> ConfigurationIndex<E> {
    /// Create a handle for the configuration index of `prefix`.
    ///
    /// Nothing is sent to the engine until an operation needs it.
    #[must_use]
    pub fn new(engine: Arc<E>, prefix: &str) -> Self {
        Self {
            engine,
            name: configuration_index_name(prefix),
            page_size: DEFAULT_PAGE_SIZE,
            profile: OnceCell::new(),
        }
    }

    /// Set the maximum number of secondaries returned by one listing.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Name of the backing index, e.g. `.catalog_configuration`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The engine this index lives on.
    #[must_use]
    pub const fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Check whether the backing index has been created.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine request fails.
    pub async fn exists(&self) -> Result<bool> {
        Ok(self.engine.index_exists(&self.name).await?)
    }

    /// Create the backing index with its mapping unless it already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the version lookup or an engine request fails.
    pub async fn ensure_created(&self) -> Result<()> {
        if self.exists().await? {
            return Ok(());
        }
        let mappings = configuration_mappings(self.profile().await?);
        self.engine.create_index(&self.name, &mappings).await?;
        debug!(index = %self.name, "Configuration index created.");
        Ok(())
    }

    /// Read a record, routed to the primary shard copy.
    ///
    /// Returns `None` when the record (or the whole index) is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the stored body is not a
    /// configuration record.
    pub async fn get_record(&self, id: &ConfigurationId) -> Result<Option<ConfigurationRecord>> {
        match self
            .engine
            .get_document(&self.name, id.as_str(), Some(PREFER_PRIMARY))
            .await
        {
            Ok(document) => Ok(Some(document.source_as()?)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Write a record, overwriting `id` when given; otherwise the engine
    /// assigns a new id. Returns the id written.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn put_record(
        &self,
        id: Option<&ConfigurationId>,
        record: &ConfigurationRecord,
    ) -> Result<ConfigurationId> {
        let body = json!(record);
        let written = self
            .engine
            .index_document(&self.name, id.map(ConfigurationId::as_str), &body)
            .await?;
        Ok(ConfigurationId::new(written.id)?)
    }

    /// Delete a record by id.
    ///
    /// A missing record is not an error; it shows up as `found == false` in
    /// the returned outcome.
    ///
    /// # Errors
    ///
    /// Returns the engine error unchanged so callers can report it per
    /// record.
    pub async fn delete_record(
        &self,
        id: &ConfigurationId,
    ) -> es_rotator_engine::Result<DocumentDeletion> {
        self.engine.delete_document(&self.name, id.as_str()).await
    }

    /// Version-dependent facts about the engine, read on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the info request fails or reports an unparseable
    /// version. A failed lookup is retried on the next call.
    pub async fn profile(&self) -> Result<&EngineProfile> {
        let profile = self
            .profile
            .get_or_try_init(|| async {
                let info = self.engine.info().await?;
                EngineProfile::from_info(&info)
            })
            .await?;
        Ok(profile)
    }

    /// List secondary records stamped strictly before `older_than`, in
    /// storage order.
    ///
    /// # Errors
    ///
    /// Returns an error if a request fails or a stored record cannot be
    /// decoded.
    pub async fn secondary_entries(&self, older_than: DateTime<Utc>) -> Result<Vec<SecondaryIndex>> {
        if !self.exists().await? {
            return Ok(Vec::new());
        }

        let profile = self.profile().await?;
        if profile.dialect.is_legacy() {
            info!(
                version = %profile.version,
                "Using deprecated query format due to engine version < 2.0."
            );
        }
        let body = secondary_query(profile.dialect, older_than.timestamp(), self.page_size);
        let response = self.engine.search(&self.name, &body).await?;

        response
            .hits
            .hits
            .into_iter()
            .map(|hit| -> Result<SecondaryIndex> {
                let record: ConfigurationRecord = hit.source_as()?;
                Ok(SecondaryIndex {
                    index: record.name,
                    configuration_id: ConfigurationId::new(hit.id)?,
                })
            })
            .collect()
    }
}

impl<E> fmt::Display for ConfigurationIndex<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl<E> fmt::Debug for ConfigurationIndex<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationIndex")
            .field("name", &self.name)
            .field("page_size", &self.page_size)
            .field("profile", &self.profile.get())
            .finish_non_exhaustive()
    }
}

/// Mapping for the configuration index on the engine described by `profile`.
#[must_use]
pub fn configuration_mappings(profile: &EngineProfile) -> Value {
    let name = if profile.keyword_strings {
        json!({ "type": "keyword" })
    } else {
        json!({ "type": "string", "index": "not_analyzed" })
    };
    let timestamp = if profile.epoch_second_dates {
        json!({ "type": "date", "format": "epoch_second" })
    } else {
        json!({ "type": "date" })
    };
    json!({ "properties": { "name": name, "timestamp": timestamp } })
}

/// Search body selecting non-primary records older than `cutoff` (epoch
/// seconds).
fn secondary_query(dialect: QueryDialect, cutoff: i64, size: usize) -> Value {
    let not_primary = json!({ "term": { "_id": es_rotator_core::PRIMARY_ID } });
    let older = json!({ "range": { "timestamp": { "lt": cutoff } } });
    match dialect {
        QueryDialect::Combined => json!({
            "query": { "bool": { "must_not": not_primary, "filter": older } },
            "sort": { "_doc": "asc" },
            "size": size,
        }),
        QueryDialect::Legacy => json!({
            "query": { "bool": { "must_not": not_primary } },
            "filter": older,
            "sort": { "_doc": "asc" },
            "size": size,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use es_rotator_engine::{MemoryEngine, Operation};

    fn index(engine: &Arc<MemoryEngine>) -> ConfigurationIndex<MemoryEngine> {
        ConfigurationIndex::new(Arc::clone(engine), "some")
    }

    #[test]
    fn name_and_display() {
        let config = index(&Arc::new(MemoryEngine::new()));
        assert_eq!(config.name(), ".some_configuration");
        assert_eq!(config.to_string(), ".some_configuration");
    }

    #[test]
    fn combined_query_shape() {
        let body = secondary_query(QueryDialect::Combined, 1_422_748_800, 25);
        assert_eq!(
            body,
            json!({
                "query": {"bool": {
                    "must_not": {"term": {"_id": "primary"}},
                    "filter": {"range": {"timestamp": {"lt": 1_422_748_800}}}
                }},
                "sort": {"_doc": "asc"},
                "size": 25
            })
        );
    }

    #[test]
    fn legacy_query_moves_filter_to_top_level() {
        let body = secondary_query(QueryDialect::Legacy, 10, 5);
        assert!(body["query"]["bool"].get("filter").is_none());
        assert_eq!(body["filter"], json!({"range": {"timestamp": {"lt": 10}}}));
    }

    #[tokio::test]
    async fn ensure_created_is_idempotent() {
        let engine = Arc::new(MemoryEngine::new());
        let config = index(&engine);
        assert!(!config.exists().await.unwrap());

        config.ensure_created().await.unwrap();
        config.ensure_created().await.unwrap();

        assert!(config.exists().await.unwrap());
        assert_eq!(engine.calls(Operation::CreateIndex), 1);
        assert_eq!(
            engine.mappings(".some_configuration").unwrap(),
            json!({"properties": {
                "name": {"type": "keyword"},
                "timestamp": {"type": "date", "format": "epoch_second"}
            }})
        );
    }

    #[tokio::test]
    async fn legacy_engine_gets_string_mapping() {
        let engine = Arc::new(MemoryEngine::with_version("1.7.5"));
        index(&engine).ensure_created().await.unwrap();
        assert_eq!(
            engine.mappings(".some_configuration").unwrap(),
            json!({"properties": {
                "name": {"type": "string", "index": "not_analyzed"},
                "timestamp": {"type": "date"}
            }})
        );
    }

    #[tokio::test]
    async fn profile_is_read_once() {
        let engine = Arc::new(MemoryEngine::new());
        let config = index(&engine);
        config.profile().await.unwrap();
        config.profile().await.unwrap();
        assert_eq!(engine.calls(Operation::Info), 1);
    }

    #[tokio::test]
    async fn records_round_trip_through_engine() {
        let engine = Arc::new(MemoryEngine::new());
        let config = index(&engine);
        config.ensure_created().await.unwrap();

        let primary = ConfigurationId::primary();
        let record = ConfigurationRecord::new("some_index_1", 1_420_070_400);
        let id = config.put_record(Some(&primary), &record).await.unwrap();
        assert!(id.is_primary());
        assert_eq!(config.get_record(&primary).await.unwrap(), Some(record));
        assert_eq!(engine.last_preference().as_deref(), Some("_primary"));

        let generated = config
            .put_record(None, &ConfigurationRecord::new("some_index_0", 1))
            .await
            .unwrap();
        assert!(!generated.is_primary());
    }

    #[tokio::test]
    async fn missing_record_reads_as_none() {
        let engine = Arc::new(MemoryEngine::new());
        let config = index(&engine);
        let primary = ConfigurationId::primary();
        assert_eq!(config.get_record(&primary).await.unwrap(), None);

        config.ensure_created().await.unwrap();
        assert_eq!(config.get_record(&primary).await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_missing_record_reports_not_found() {
        let engine = Arc::new(MemoryEngine::new());
        let config = index(&engine);
        config.ensure_created().await.unwrap();

        let outcome = config
            .delete_record(&ConfigurationId::new("gone").unwrap())
            .await
            .unwrap();
        assert!(!outcome.found);
        assert_eq!(outcome.result, "not_found");
    }

    #[tokio::test]
    async fn secondary_entries_without_index_is_empty() {
        let engine = Arc::new(MemoryEngine::new());
        let entries = index(&engine).secondary_entries(Utc::now()).await.unwrap();
        assert!(entries.is_empty());
        assert_eq!(engine.calls(Operation::Search), 0);
    }

    #[tokio::test]
    async fn secondary_entries_filter_by_cutoff_in_both_dialects() {
        for version in ["8.11.0", "1.7.5"] {
            let engine = Arc::new(MemoryEngine::with_version(version));
            let source = |name: &str, ts: i64| json!({"name": name, "timestamp": ts});
            engine.put_document(".some_configuration", "primary", source("some_index_1", 1));
            engine.put_document(".some_configuration", "a", source("some_index_2", 100));
            engine.put_document(".some_configuration", "b", source("some_index_3", 200));

            let config = index(&engine);
            let cutoff = Utc.timestamp_opt(200, 0).unwrap();
            let entries = config.secondary_entries(cutoff).await.unwrap();
            assert_eq!(
                entries,
                vec![SecondaryIndex {
                    index: "some_index_2".into(),
                    configuration_id: ConfigurationId::new("a").unwrap(),
                }],
                "engine {version}"
            );
        }
    }

    #[tokio::test]
    async fn page_size_bounds_listing() {
        let engine = Arc::new(MemoryEngine::new());
        for i in 0..15 {
            engine.put_document(
                ".some_configuration",
                &format!("s{i}"),
                json!({"name": format!("some_index_{i}"), "timestamp": i}),
            );
        }
        let all = index(&engine).secondary_entries(Utc::now()).await.unwrap();
        assert_eq!(all.len(), 15);

        let paged = index(&engine)
            .with_page_size(4)
            .secondary_entries(Utc::now())
            .await
            .unwrap();
        assert_eq!(paged.len(), 4);
    }
}
