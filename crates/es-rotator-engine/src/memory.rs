//! In-memory search engine for tests.
//!
//! [`MemoryEngine`] keeps indices, documents, and aliases in process and
//! understands the subset of the query DSL the rotator issues. It reports a
//! configurable version, rejects query shapes that version would reject, and
//! can be told to fail upcoming calls so retry paths can be exercised.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::types::{
    AliasAction, Document, DocumentDeletion, EngineInfo, EngineVersion, IndexDeletion,
    IndexedDocument, SearchHit, SearchHits, SearchResponse, TotalHits,
};
use crate::version::{parse_version, QueryDialect};
use crate::SearchEngine;

/// Engine calls that can be counted or made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// [`SearchEngine::index_exists`].
    IndexExists,
    /// [`SearchEngine::create_index`].
    CreateIndex,
    /// [`SearchEngine::delete_index`].
    DeleteIndex,
    /// [`SearchEngine::get_document`].
    GetDocument,
    /// [`SearchEngine::index_document`].
    IndexDocument,
    /// [`SearchEngine::delete_document`].
    DeleteDocument,
    /// [`SearchEngine::search`].
    Search,
    /// [`SearchEngine::get_alias`].
    GetAlias,
    /// [`SearchEngine::update_aliases`].
    UpdateAliases,
    /// [`SearchEngine::info`].
    Info,
}

#[derive(Debug, Default)]
struct MemoryIndex {
    mappings: Value,
    documents: IndexMap<String, Value>,
    aliases: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    indices: IndexMap<String, MemoryIndex>,
    calls: HashMap<Operation, usize>,
    faults: HashMap<Operation, (usize, u16)>,
    last_preference: Option<String>,
}

impl State {
    /// Record a call and fire an injected fault if one is pending.
    fn enter(&mut self, operation: Operation) -> Result<()> {
        *self.calls.entry(operation).or_default() += 1;
        if let Some((remaining, status)) = self.faults.get_mut(&operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(EngineError::from_status(*status, "injected failure"));
            }
        }
        Ok(())
    }

    fn index(&self, name: &str) -> Result<&MemoryIndex> {
        self.indices.get(name).ok_or_else(|| no_such_index(name))
    }

    fn index_mut(&mut self, name: &str) -> Result<&mut MemoryIndex> {
        self.indices.get_mut(name).ok_or_else(|| no_such_index(name))
    }

    fn matching(&self, expression: &str) -> Vec<String> {
        self.indices
            .keys()
            .filter(|name| {
                expression
                    .split(',')
                    .any(|pattern| wildcard_match(pattern.trim(), name))
            })
            .cloned()
            .collect()
    }
}

fn no_such_index(name: &str) -> EngineError {
    EngineError::NotFound {
        reason: format!("index_not_found_exception: no such index [{name}]"),
    }
}

fn parsing_error(reason: impl Into<String>) -> EngineError {
    EngineError::Client {
        status: 400,
        reason: format!("parsing_exception: {}", reason.into()),
    }
}

/// In-process [`SearchEngine`] used by tests.
#[derive(Debug)]
pub struct MemoryEngine {
    version: String,
    state: Mutex<State>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    /// Create an empty engine reporting a current version.
    #[must_use]
    pub fn new() -> Self {
        Self::with_version("8.11.0")
    }

    /// Create an empty engine reporting the given version.
    #[must_use]
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            state: Mutex::new(State::default()),
        }
    }

    fn dialect(&self) -> QueryDialect {
        parse_version(&self.version)
            .map_or(QueryDialect::Combined, |v| QueryDialect::for_version(&v))
    }

    /// Create an empty index, as a fixture.
    pub fn add_index(&self, name: &str) {
        self.state.lock().indices.entry(name.to_string()).or_default();
    }

    /// Store a document under an explicit id, creating the index if needed.
    pub fn put_document(&self, index: &str, id: &str, source: Value) {
        self.state
            .lock()
            .indices
            .entry(index.to_string())
            .or_default()
            .documents
            .insert(id.to_string(), source);
    }

    /// Bind an alias to an index, as a fixture.
    pub fn bind_alias(&self, index: &str, alias: &str) {
        let mut state = self.state.lock();
        let entry = state.indices.entry(index.to_string()).or_default();
        if !entry.aliases.iter().any(|a| a == alias) {
            entry.aliases.push(alias.to_string());
        }
    }

    /// Returns true if the index exists.
    #[must_use]
    pub fn has_index(&self, name: &str) -> bool {
        self.state.lock().indices.contains_key(name)
    }

    /// Stored body of a document, if present.
    #[must_use]
    pub fn document(&self, index: &str, id: &str) -> Option<Value> {
        self.state
            .lock()
            .indices
            .get(index)
            .and_then(|i| i.documents.get(id).cloned())
    }

    /// Document ids of an index in storage order.
    #[must_use]
    pub fn document_ids(&self, index: &str) -> Vec<String> {
        self.state
            .lock()
            .indices
            .get(index)
            .map(|i| i.documents.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Mappings the index was created with.
    #[must_use]
    pub fn mappings(&self, index: &str) -> Option<Value> {
        self.state.lock().indices.get(index).map(|i| i.mappings.clone())
    }

    /// Indices the alias is currently bound to.
    #[must_use]
    pub fn alias_targets(&self, alias: &str) -> Vec<String> {
        self.state
            .lock()
            .indices
            .iter()
            .filter(|(_, index)| index.aliases.iter().any(|a| a == alias))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Make the next `times` calls of `operation` fail with `status`.
    pub fn fail_next(&self, operation: Operation, times: usize, status: u16) {
        self.state.lock().faults.insert(operation, (times, status));
    }

    /// Number of times `operation` was called.
    #[must_use]
    pub fn calls(&self, operation: Operation) -> usize {
        self.state
            .lock()
            .calls
            .get(&operation)
            .copied()
            .unwrap_or_default()
    }

    /// Read preference passed to the most recent document get.
    #[must_use]
    pub fn last_preference(&self) -> Option<String> {
        self.state.lock().last_preference.clone()
    }

    fn run_search(&self, index: &MemoryIndex, body: &Value) -> Result<SearchResponse> {
        let legacy = self.dialect().is_legacy();
        let query = body.get("query").cloned().unwrap_or(Value::Null);
        let top_level_filter = body.get("filter");

        if top_level_filter.is_some() && !legacy {
            return Err(parsing_error("request does not support [filter]"));
        }

        let size = body
            .get("size")
            .and_then(Value::as_u64)
            .map_or(10, |s| usize::try_from(s).unwrap_or(usize::MAX));
        let from = body
            .get("from")
            .and_then(Value::as_u64)
            .map_or(0, |s| usize::try_from(s).unwrap_or(usize::MAX));

        let mut matched = Vec::new();
        for (id, source) in &index.documents {
            let query_hit = query.is_null() || matches(&query, id, source, legacy)?;
            let filter_hit = match top_level_filter {
                Some(filter) => matches(filter, id, source, legacy)?,
                None => true,
            };
            if query_hit && filter_hit {
                matched.push(SearchHit {
                    id: id.clone(),
                    source: source.clone(),
                });
            }
        }

        let total = matched.len() as u64;
        let hits = matched.into_iter().skip(from).take(size).collect();
        Ok(SearchResponse {
            hits: SearchHits {
                total: Some(if legacy {
                    TotalHits::Count(total)
                } else {
                    TotalHits::Tracked { value: total }
                }),
                hits,
            },
        })
    }
}

/// Evaluate the query subset used by the rotator against one document.
fn matches(query: &Value, id: &str, source: &Value, legacy: bool) -> Result<bool> {
    let Some(object) = query.as_object() else {
        return Err(parsing_error("query must be an object"));
    };
    let Some((kind, body)) = object.iter().next() else {
        return Ok(true);
    };

    match kind.as_str() {
        "match_all" => Ok(true),
        "bool" => matches_bool(body, id, source, legacy),
        "term" => {
            let (field, expected) = single_field(body, "term")?;
            let expected = expected.get("value").unwrap_or(expected);
            Ok(field_value(field, id, source).is_some_and(|actual| actual == *expected))
        }
        "range" => {
            let (field, bounds) = single_field(body, "range")?;
            Ok(field_value(field, id, source)
                .and_then(|actual| actual.as_f64())
                .is_some_and(|actual| in_range(actual, bounds)))
        }
        other => Err(parsing_error(format!("unknown query [{other}]"))),
    }
}

fn matches_bool(body: &Value, id: &str, source: &Value, legacy: bool) -> Result<bool> {
    let Some(clauses) = body.as_object() else {
        return Err(parsing_error("[bool] query malformed"));
    };
    if legacy && clauses.contains_key("filter") {
        return Err(parsing_error("[bool] query does not support [filter]"));
    }

    for (occur, clause) in clauses {
        let queries = match clause {
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        };
        for query in &queries {
            let hit = matches(query, id, source, legacy)?;
            match occur.as_str() {
                "must" | "filter" if !hit => return Ok(false),
                "must_not" if hit => return Ok(false),
                "must" | "filter" | "must_not" => {}
                other => return Err(parsing_error(format!("[bool] unsupported clause [{other}]"))),
            }
        }
    }
    Ok(true)
}

fn single_field<'a>(body: &'a Value, kind: &str) -> Result<(&'a str, &'a Value)> {
    body.as_object()
        .and_then(|fields| fields.iter().next())
        .map(|(field, value)| (field.as_str(), value))
        .ok_or_else(|| parsing_error(format!("[{kind}] query malformed")))
}

fn field_value(field: &str, id: &str, source: &Value) -> Option<Value> {
    if field == "_id" {
        return Some(Value::String(id.to_string()));
    }
    source.get(field).cloned()
}

fn in_range(actual: f64, bounds: &Value) -> bool {
    let bound = |key: &str| bounds.get(key).and_then(bound_value);
    bound("lt").map_or(true, |b| actual < b)
        && bound("lte").map_or(true, |b| actual <= b)
        && bound("gt").map_or(true, |b| actual > b)
        && bound("gte").map_or(true, |b| actual >= b)
}

/// Bounds may be numbers or numeric strings.
fn bound_value(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// Match an index name against a pattern where `*` matches any run of characters.
fn wildcard_match(pattern: &str, name: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    let [first, middle @ .., last] = parts.as_slice() else {
        return pattern == name;
    };
    let Some(mut rest) = name.strip_prefix(first) else {
        return false;
    };
    for part in middle {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

#[async_trait]
impl SearchEngine for MemoryEngine {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        let mut state = self.state.lock();
        state.enter(Operation::IndexExists)?;
        Ok(state.indices.contains_key(index))
    }

    async fn create_index(&self, index: &str, mappings: &Value) -> Result<()> {
        let mut state = self.state.lock();
        state.enter(Operation::CreateIndex)?;
        state
            .indices
            .entry(index.to_string())
            .or_insert_with(|| MemoryIndex {
                mappings: mappings.clone(),
                ..MemoryIndex::default()
            });
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<IndexDeletion> {
        let mut state = self.state.lock();
        state.enter(Operation::DeleteIndex)?;
        state
            .indices
            .shift_remove(index)
            .map(|_| IndexDeletion { acknowledged: true })
            .ok_or_else(|| no_such_index(index))
    }

    async fn get_document(
        &self,
        index: &str,
        id: &str,
        preference: Option<&str>,
    ) -> Result<Document> {
        let mut state = self.state.lock();
        state.enter(Operation::GetDocument)?;
        state.last_preference = preference.map(str::to_string);
        let source = state
            .index(index)?
            .documents
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound {
                reason: format!("document {id} not found in {index}"),
            })?;
        Ok(Document {
            index: index.to_string(),
            id: id.to_string(),
            source,
        })
    }

    async fn index_document(
        &self,
        index: &str,
        id: Option<&str>,
        body: &Value,
    ) -> Result<IndexedDocument> {
        let mut state = self.state.lock();
        state.enter(Operation::IndexDocument)?;
        let id = id.map_or_else(|| uuid::Uuid::new_v4().simple().to_string(), str::to_string);
        let previous = state
            .indices
            .entry(index.to_string())
            .or_default()
            .documents
            .insert(id.clone(), body.clone());
        Ok(IndexedDocument {
            index: index.to_string(),
            id,
            result: Some(String::from(if previous.is_some() {
                "updated"
            } else {
                "created"
            })),
        })
    }

    async fn delete_document(&self, index: &str, id: &str) -> Result<DocumentDeletion> {
        let mut state = self.state.lock();
        state.enter(Operation::DeleteDocument)?;
        let found = state.index_mut(index)?.documents.shift_remove(id).is_some();
        Ok(DocumentDeletion {
            index: index.to_string(),
            id: id.to_string(),
            found,
            result: String::from(if found { "deleted" } else { "not_found" }),
        })
    }

    async fn search(&self, index: &str, body: &Value) -> Result<SearchResponse> {
        let mut state = self.state.lock();
        state.enter(Operation::Search)?;
        self.run_search(state.index(index)?, body)
    }

    async fn get_alias(&self, alias: &str) -> Result<Vec<String>> {
        let mut state = self.state.lock();
        state.enter(Operation::GetAlias)?;
        let bound: Vec<String> = state
            .indices
            .iter()
            .filter(|(_, index)| index.aliases.iter().any(|a| a == alias))
            .map(|(name, _)| name.clone())
            .collect();
        if bound.is_empty() {
            return Err(EngineError::NotFound {
                reason: format!("alias [{alias}] missing"),
            });
        }
        Ok(bound)
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<()> {
        let mut state = self.state.lock();
        state.enter(Operation::UpdateAliases)?;

        // Stage every action and commit only if all of them apply.
        let mut staged: HashSet<String> = HashSet::new();
        let mut bindings: IndexMap<String, Vec<String>> = state
            .indices
            .iter()
            .map(|(name, index)| (name.clone(), index.aliases.clone()))
            .collect();

        for action in actions {
            match action {
                AliasAction::Remove { index, alias } => {
                    let targets: Vec<String> = state
                        .matching(index)
                        .into_iter()
                        .filter(|name| bindings[name].iter().any(|a| a == alias))
                        .collect();
                    if targets.is_empty() {
                        return Err(EngineError::NotFound {
                            reason: format!("aliases_not_found_exception: aliases [{alias}] missing"),
                        });
                    }
                    for target in targets {
                        if let Some(aliases) = bindings.get_mut(&target) {
                            aliases.retain(|a| a != alias);
                        }
                        staged.insert(target);
                    }
                }
                AliasAction::Add { index, alias } => {
                    let targets = state.matching(index);
                    if targets.is_empty() {
                        return Err(no_such_index(index));
                    }
                    for target in targets {
                        if let Some(aliases) = bindings.get_mut(&target) {
                            if !aliases.iter().any(|a| a == alias) {
                                aliases.push(alias.clone());
                            }
                        }
                        staged.insert(target);
                    }
                }
            }
        }

        for (name, aliases) in bindings {
            if staged.contains(&name) {
                if let Some(index) = state.indices.get_mut(&name) {
                    index.aliases = aliases;
                }
            }
        }
        Ok(())
    }

    async fn info(&self) -> Result<EngineInfo> {
        let mut state = self.state.lock();
        state.enter(Operation::Info)?;
        Ok(EngineInfo {
            cluster_name: Some("memory".to_string()),
            version: EngineVersion {
                number: self.version.clone(),
                distribution: None,
            },
        })
    }
}
