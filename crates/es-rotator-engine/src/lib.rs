//! Search engine client capability for es-rotator.
//!
//! The rotator only needs a narrow slice of an Elasticsearch-compatible API.
//! That slice is the [`SearchEngine`] trait:
//!
//! - index existence, creation with mappings, and deletion
//! - document get (with a read preference), index/overwrite, and delete by id
//! - search with a JSON query body
//! - alias lookup and atomic batched alias updates
//! - a cluster info request used to pick the [`QueryDialect`] and mapping type
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │   IndexRotator   │────▶│   SearchEngine   │
//! │   + strategies   │     │   (trait)        │
//! └──────────────────┘     └────────┬─────────┘
//!                                   │
//!                   ┌───────────────┴───────────────┐
//!          ┌────────▼─────────┐           ┌─────────▼────────┐
//!          │   HttpEngine     │           │   MemoryEngine   │
//!          │   (reqwest)      │           │   (test-utils)   │
//!          └────────┬─────────┘           └──────────────────┘
//!                   │ HTTP
//!          ┌────────▼─────────┐
//!          │  Elasticsearch   │
//!          └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use es_rotator_engine::{EngineConfig, HttpEngine, SearchEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = HttpEngine::new(EngineConfig::new("http://localhost:9200"))?;
//! if !engine.index_exists(".catalog_configuration").await? {
//!     println!("nothing rotated yet");
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod http;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod types;
pub mod version;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use http::HttpEngine;
#[cfg(any(test, feature = "test-utils"))]
pub use memory::{MemoryEngine, Operation};
pub use types::{
    AliasAction, Document, DocumentDeletion, EngineInfo, EngineVersion, IndexDeletion,
    IndexedDocument, SearchHit, SearchHits, SearchResponse, TotalHits,
};
pub use version::{
    parse_version, EngineProfile, QueryDialect, LEGACY_MAPPING_TYPE, TYPELESS_DOCUMENT,
};

use async_trait::async_trait;
use serde_json::Value;

/// Read preference that routes a get to the primary shard copy.
pub const PREFER_PRIMARY: &str = "_primary";

/// The search engine operations the rotator depends on.
///
/// This trait abstracts the engine client, allowing an in-memory
/// implementation in tests.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Check whether an index (or alias) exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn index_exists(&self, index: &str) -> Result<bool>;

    /// Create an index with the given typeless mappings
    /// (`{"properties": {...}}`). Implementations wrap them in a mapping
    /// type when the engine still requires one.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails. Creating an index that already
    /// exists is not an error.
    async fn create_index(&self, index: &str, mappings: &Value) -> Result<()>;

    /// Delete an index.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotFound` if the index does not exist.
    async fn delete_index(&self, index: &str) -> Result<IndexDeletion>;

    /// Fetch a document by id.
    ///
    /// `preference` is passed through as the engine's read preference.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotFound` if the index or document does not exist.
    async fn get_document(
        &self,
        index: &str,
        id: &str,
        preference: Option<&str>,
    ) -> Result<Document>;

    /// Index a document, overwriting `id` when given or letting the engine
    /// generate an id otherwise. The write is visible to searches on return.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn index_document(
        &self,
        index: &str,
        id: Option<&str>,
        body: &Value,
    ) -> Result<IndexedDocument>;

    /// Delete a document by id.
    ///
    /// A missing document is reported through [`DocumentDeletion::found`].
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the index does not exist.
    async fn delete_document(&self, index: &str, id: &str) -> Result<DocumentDeletion>;

    /// Run a search request body against an index.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the query is rejected.
    async fn search(&self, index: &str, body: &Value) -> Result<SearchResponse>;

    /// List the indices an alias is bound to.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotFound` if the alias does not exist.
    async fn get_alias(&self, alias: &str) -> Result<Vec<String>>;

    /// Apply a batch of alias actions atomically.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotFound` if a remove action matches nothing or an
    /// add action names a missing index; no action is applied in that case.
    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<()>;

    /// Fetch cluster information.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn info(&self) -> Result<EngineInfo>;
}
