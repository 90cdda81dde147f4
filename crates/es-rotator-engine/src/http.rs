//! HTTP client for Elasticsearch-compatible clusters.
//!
//! This module provides [`HttpEngine`], the production [`SearchEngine`]
//! implementation. Every trait method maps to one REST call.

use async_trait::async_trait;
use base64::prelude::*;
use indexmap::IndexMap;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::types::{
    AliasAction, Document, DocumentDeletion, EngineInfo, IndexDeletion, IndexedDocument,
    RawDocumentDeletion, SearchResponse,
};
use crate::version::{EngineProfile, TYPELESS_DOCUMENT};
use crate::SearchEngine;

/// Error types returned when creating an index that is already there.
const ALREADY_EXISTS: [&str; 2] = [
    "resource_already_exists_exception",
    "index_already_exists_exception",
];

/// HTTP client for an Elasticsearch-compatible cluster.
#[derive(Debug, Clone)]
pub struct HttpEngine {
    client: reqwest::Client,
    base_url: String,
    config: EngineConfig,
    profile: OnceCell<EngineProfile>,
}

impl HttpEngine {
    /// Create a client from connection settings.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Transport` if the HTTP client cannot be built.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| EngineError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self::with_client(client, config))
    }

    /// Create a client around an existing reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: EngineConfig) -> Self {
        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            config,
            profile: OnceCell::new(),
        }
    }

    /// Get the base URL of the cluster.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}/{path}", self.base_url));
        self.authorize(builder)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        if let Some(api_key) = &self.config.api_key {
            builder.header(
                reqwest::header::AUTHORIZATION,
                format!("ApiKey {}", encode_api_key(api_key)),
            )
        } else if let Some(username) = &self.config.username {
            builder.basic_auth(username, self.config.password.as_deref())
        } else {
            builder
        }
    }

    /// Mapping type for this cluster: the configured override, or the one
    /// its version requires. The version is fetched once.
    async fn mapping_type(&self) -> Result<Option<&str>> {
        if let Some(doc_type) = &self.config.document_type {
            return Ok(Some(doc_type.as_str()));
        }
        let profile = self
            .profile
            .get_or_try_init(|| async {
                let profile = EngineProfile::from_info(&self.info().await?)?;
                tracing::debug!(
                    version = %profile.version,
                    mapping_type = ?profile.mapping_type,
                    "Read cluster version"
                );
                Ok::<_, EngineError>(profile)
            })
            .await?;
        Ok(profile.mapping_type)
    }

    async fn document_path(&self, index: &str, id: Option<&str>) -> Result<String> {
        let doc_type = self.mapping_type().await?.unwrap_or(TYPELESS_DOCUMENT);
        Ok(match id {
            Some(id) => format!("{index}/{doc_type}/{id}"),
            None => format!("{index}/{doc_type}"),
        })
    }

    /// Wrap typeless mappings in a type when the engine still needs one.
    async fn create_body(&self, mappings: &Value) -> Result<Value> {
        Ok(match self.mapping_type().await? {
            Some(doc_type) => json!({ "mappings": { doc_type: mappings } }),
            None => json!({ "mappings": mappings }),
        })
    }
}

/// Accept either `id:key` or an already encoded key.
fn encode_api_key(api_key: &str) -> String {
    if api_key.contains(':') {
        BASE64_STANDARD.encode(api_key)
    } else {
        api_key.to_string()
    }
}

async fn send(builder: RequestBuilder) -> Result<Response> {
    builder
        .send()
        .await
        .map_err(|e| EngineError::Transport(e.to_string()))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    if !response.status().is_success() {
        return Err(error_from(response).await);
    }
    response
        .json::<T>()
        .await
        .map_err(|e| EngineError::Decode(e.to_string()))
}

async fn error_from(response: Response) -> EngineError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    error_from_body(status, &body)
}

fn error_from_body(status: StatusCode, body: &str) -> EngineError {
    let reason = error_reason(body).unwrap_or_else(|| status.to_string());
    EngineError::from_status(status.as_u16(), reason)
}

/// Pull `type: reason` out of an engine error body.
fn error_reason(body: &str) -> Option<String> {
    if body.trim().is_empty() {
        return None;
    }
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return Some(body.to_string());
    };
    match value.get("error") {
        Some(Value::Object(error)) => {
            let kind = error.get("type").and_then(Value::as_str).unwrap_or("error");
            let reason = error.get("reason").and_then(Value::as_str).unwrap_or("");
            Some(format!("{kind}: {reason}"))
        }
        Some(Value::String(reason)) => Some(reason.clone()),
        _ => Some(body.to_string()),
    }
}

fn error_type(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("type")?
        .as_str()
        .map(str::to_string)
}

#[async_trait]
impl SearchEngine for HttpEngine {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        let response = send(self.request(Method::HEAD, index)).await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(error_from(response).await),
        }
    }

    async fn create_index(&self, index: &str, mappings: &Value) -> Result<()> {
        let body = self.create_body(mappings).await?;
        let response = send(self.request(Method::PUT, index).json(&body)).await?;
        let status = response.status();
        if status.is_success() {
            tracing::debug!(index = %index, "Created index");
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST
            && error_type(&text).is_some_and(|kind| ALREADY_EXISTS.contains(&kind.as_str()))
        {
            tracing::debug!(index = %index, "Index already exists");
            return Ok(());
        }
        Err(error_from_body(status, &text))
    }

    async fn delete_index(&self, index: &str) -> Result<IndexDeletion> {
        decode(send(self.request(Method::DELETE, index)).await?).await
    }

    async fn get_document(
        &self,
        index: &str,
        id: &str,
        preference: Option<&str>,
    ) -> Result<Document> {
        let path = self.document_path(index, Some(id)).await?;
        let mut builder = self.request(Method::GET, &path);
        if let Some(preference) = preference {
            builder = builder.query(&[("preference", preference)]);
        }
        let response = send(builder).await?;

        if response.status() == StatusCode::NOT_FOUND {
            let text = response.text().await.unwrap_or_default();
            // A missing document comes back as `{"found": false}` without an error object.
            if error_type(&text).is_none() {
                return Err(EngineError::NotFound {
                    reason: format!("document {id} not found in {index}"),
                });
            }
            return Err(error_from_body(StatusCode::NOT_FOUND, &text));
        }
        decode(response).await
    }

    async fn index_document(
        &self,
        index: &str,
        id: Option<&str>,
        body: &Value,
    ) -> Result<IndexedDocument> {
        let method = if id.is_some() { Method::PUT } else { Method::POST };
        let path = self.document_path(index, id).await?;
        let builder = self
            .request(method, &path)
            .query(&[("refresh", "true")])
            .json(body);
        decode(send(builder).await?).await
    }

    async fn delete_document(&self, index: &str, id: &str) -> Result<DocumentDeletion> {
        let path = self.document_path(index, Some(id)).await?;
        let builder = self
            .request(Method::DELETE, &path)
            .query(&[("refresh", "true")]);
        let response = send(builder).await?;
        let status = response.status();

        if status.is_success() || status == StatusCode::NOT_FOUND {
            let text = response.text().await.unwrap_or_default();
            // A 404 for a missing document still carries the deletion outcome;
            // a 404 for a missing index carries an error object instead.
            if let Ok(raw) = serde_json::from_str::<RawDocumentDeletion>(&text) {
                return Ok(raw.into());
            }
            return Err(if status.is_success() {
                EngineError::Decode(format!("unexpected delete response: {text}"))
            } else {
                error_from_body(status, &text)
            });
        }
        Err(error_from(response).await)
    }

    async fn search(&self, index: &str, body: &Value) -> Result<SearchResponse> {
        let builder = self
            .request(Method::POST, &format!("{index}/_search"))
            .json(body);
        decode(send(builder).await?).await
    }

    async fn get_alias(&self, alias: &str) -> Result<Vec<String>> {
        let response = send(self.request(Method::GET, &format!("_alias/{alias}"))).await?;
        // Keep the cluster's listing order whatever serde_json features are enabled.
        let bindings: IndexMap<String, Value> = decode(response).await?;
        if bindings.is_empty() {
            return Err(EngineError::NotFound {
                reason: format!("alias [{alias}] missing"),
            });
        }
        Ok(bindings.into_keys().collect())
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<()> {
        let body = json!({ "actions": actions });
        let response = send(self.request(Method::POST, "_aliases").json(&body)).await?;
        if response.status().is_success() {
            return Ok(());
        }
        Err(error_from(response).await)
    }

    async fn info(&self) -> Result<EngineInfo> {
        decode(send(self.request(Method::GET, "")).await?).await
    }
}
