//! JSON rendering of command results.

use es_rotator::{ConfigurationId, SecondaryDeletion};
use indexmap::IndexMap;
use serde_json::{json, Value};

/// Render deletion outcomes keyed by configuration id, in listing order,
/// keeping per-entry failures visible.
pub fn deletion_report(
    results: &IndexMap<ConfigurationId, SecondaryDeletion>,
) -> IndexMap<String, Value> {
    results
        .iter()
        .map(|(id, outcome)| {
            let index = match &outcome.index {
                None => Value::Null,
                Some(Ok(deletion)) => json!(deletion),
                Some(Err(err)) => json!({ "error": err.to_string() }),
            };
            let config = match &outcome.config {
                Ok(deletion) => json!(deletion),
                Err(err) => json!({ "error": err.to_string() }),
            };
            (
                id.to_string(),
                json!({ "index_name": outcome.index_name, "index": index, "config": config }),
            )
        })
        .collect()
}
