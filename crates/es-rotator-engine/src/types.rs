//! Request and response types exchanged with the search engine.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EngineError, Result};

/// A document fetched by id.
#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    /// Index holding the document.
    #[serde(rename = "_index")]
    pub index: String,
    /// Document id.
    #[serde(rename = "_id")]
    pub id: String,
    /// Stored document body.
    #[serde(rename = "_source", default)]
    pub source: Value,
}

impl Document {
    /// Decode the stored body.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Decode` if the body does not match `T`.
    pub fn source_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.source.clone())
            .map_err(|e| EngineError::Decode(format!("document {}: {e}", self.id)))
    }
}

/// Acknowledgement of a document write.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexedDocument {
    /// Index the document was written to.
    #[serde(rename = "_index")]
    pub index: String,
    /// Id of the written document; engine-generated when none was given.
    #[serde(rename = "_id")]
    pub id: String,
    /// `created` or `updated`.
    #[serde(default)]
    pub result: Option<String>,
}

/// Outcome of deleting a single document.
///
/// A missing document is reported here with `found == false` rather than
/// surfaced as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentDeletion {
    /// Index the document was deleted from.
    pub index: String,
    /// Id of the deleted document.
    pub id: String,
    /// Whether the document existed.
    pub found: bool,
    /// Engine result string (`deleted` / `not_found`).
    pub result: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawDocumentDeletion {
    #[serde(rename = "_index")]
    index: String,
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    found: Option<bool>,
}

impl From<RawDocumentDeletion> for DocumentDeletion {
    fn from(raw: RawDocumentDeletion) -> Self {
        // Older engines only report `found`; newer ones only `result`.
        let found = raw
            .found
            .unwrap_or_else(|| raw.result.as_deref() == Some("deleted"));
        let result = raw
            .result
            .unwrap_or_else(|| String::from(if found { "deleted" } else { "not_found" }));
        Self {
            index: raw.index,
            id: raw.id,
            found,
            result,
        }
    }
}

/// Outcome of deleting a whole index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDeletion {
    /// Whether the cluster acknowledged the deletion.
    pub acknowledged: bool,
}

/// Response to a search request.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    /// Matched documents.
    pub hits: SearchHits,
}

/// The hits section of a search response.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHits {
    /// Total match count, when reported.
    #[serde(default)]
    pub total: Option<TotalHits>,
    /// Returned documents, in the requested sort order.
    #[serde(default)]
    pub hits: Vec<SearchHit>,
}

/// Total hit count; a bare number on old engines, an object on newer ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TotalHits {
    /// Pre-7.x form.
    Count(u64),
    /// 7.x+ form.
    Tracked {
        /// Hit count.
        value: u64,
    },
}

impl TotalHits {
    /// The hit count.
    #[must_use]
    pub const fn value(self) -> u64 {
        match self {
            Self::Count(value) | Self::Tracked { value } => value,
        }
    }
}

/// A single search hit.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    /// Document id.
    #[serde(rename = "_id")]
    pub id: String,
    /// Stored document body.
    #[serde(rename = "_source", default)]
    pub source: Value,
}

impl SearchHit {
    /// Decode the stored body.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Decode` if the body does not match `T`.
    pub fn source_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.source.clone())
            .map_err(|e| EngineError::Decode(format!("hit {}: {e}", self.id)))
    }
}

/// One step of an alias update batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasAction {
    /// Bind `alias` to `index`.
    Add {
        /// Index name.
        index: String,
        /// Alias name.
        alias: String,
    },
    /// Unbind `alias` from every index matching `index` (wildcards allowed).
    Remove {
        /// Index name or pattern.
        index: String,
        /// Alias name.
        alias: String,
    },
}

impl AliasAction {
    /// Build an add action.
    #[must_use]
    pub fn add(index: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::Add {
            index: index.into(),
            alias: alias.into(),
        }
    }

    /// Build a remove action.
    #[must_use]
    pub fn remove(index: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::Remove {
            index: index.into(),
            alias: alias.into(),
        }
    }
}

/// Cluster information returned by the root endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineInfo {
    /// Cluster name.
    #[serde(default)]
    pub cluster_name: Option<String>,
    /// Version details.
    pub version: EngineVersion,
}

/// Version section of [`EngineInfo`].
#[derive(Debug, Clone, Deserialize)]
pub struct EngineVersion {
    /// Version string, e.g. `8.11.0`.
    pub number: String,
    /// Distribution name; only OpenSearch reports one.
    #[serde(default)]
    pub distribution: Option<String>,
}
