//! Records stored in the configuration index and views derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ConfigurationId;

/// A record in the configuration index.
///
/// The primary record points at the current index; secondary records point at
/// indices that used to be primary, tagged with the time they were archived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationRecord {
    /// Physical index name this record points to.
    pub name: String,
    /// Creation time in epoch seconds.
    pub timestamp: i64,
}

impl ConfigurationRecord {
    /// Create a record with an explicit timestamp (epoch seconds).
    #[must_use]
    pub fn new(name: impl Into<String>, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            timestamp,
        }
    }

    /// Create a record stamped with the current time.
    #[must_use]
    pub fn now(name: impl Into<String>) -> Self {
        Self::at(name, Utc::now())
    }

    /// Create a record stamped with the given instant.
    #[must_use]
    pub fn at(name: impl Into<String>, when: DateTime<Utc>) -> Self {
        Self::new(name, when.timestamp())
    }

    /// The creation time, if the stored timestamp is representable.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

/// A secondary index together with the id of its configuration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryIndex {
    /// Physical index name.
    pub index: String,
    /// Id of the configuration record tracking this index.
    pub configuration_id: ConfigurationId,
}

/// Output shape requested from a secondary listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Only the index names.
    #[default]
    NameOnly,
    /// Index names paired with their configuration ids.
    IncludeId,
}

/// Result of a secondary listing, shaped by a [`Disposition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SecondaryIndices {
    /// Index names, in storage order.
    Names(Vec<String>),
    /// Index names with configuration ids, in storage order.
    WithIds(Vec<SecondaryIndex>),
}

impl SecondaryIndices {
    /// Shape a listing according to `disposition`.
    #[must_use]
    pub fn from_entries(entries: Vec<SecondaryIndex>, disposition: Disposition) -> Self {
        match disposition {
            Disposition::NameOnly => Self::Names(entries.into_iter().map(|e| e.index).collect()),
            Disposition::IncludeId => Self::WithIds(entries),
        }
    }

    /// The index names regardless of shape.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::Names(names) => names.iter().map(String::as_str).collect(),
            Self::WithIds(entries) => entries.iter().map(|e| e.index.as_str()).collect(),
        }
    }

    /// Number of secondaries listed.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Names(names) => names.len(),
            Self::WithIds(entries) => entries.len(),
        }
    }

    /// Returns true if nothing was listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(index: &str, id: &str) -> SecondaryIndex {
        SecondaryIndex {
            index: index.to_string(),
            configuration_id: ConfigurationId::new(id).unwrap(),
        }
    }

    #[test]
    fn record_serializes_as_name_and_timestamp() {
        let record = ConfigurationRecord::new("some_index_1", 1_422_748_800);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "some_index_1", "timestamp": 1_422_748_800})
        );
    }

    #[test]
    fn record_at_uses_epoch_seconds() {
        let when = Utc.with_ymd_and_hms(2015, 2, 1, 0, 0, 0).unwrap();
        let record = ConfigurationRecord::at("some_index_3", when);
        assert_eq!(record.timestamp, 1_422_748_800);
        assert_eq!(record.created_at(), Some(when));
    }

    #[test]
    fn name_only_drops_ids() {
        let listing = SecondaryIndices::from_entries(
            vec![entry("some_index_2", "a"), entry("some_index_3", "b")],
            Disposition::NameOnly,
        );
        assert_eq!(
            listing,
            SecondaryIndices::Names(vec!["some_index_2".into(), "some_index_3".into()])
        );
        assert_eq!(listing.names(), vec!["some_index_2", "some_index_3"]);
    }

    #[test]
    fn include_id_serializes_pairs() {
        let listing =
            SecondaryIndices::from_entries(vec![entry("some_index_2", "a")], Disposition::IncludeId);
        assert_eq!(listing.len(), 1);
        assert_eq!(
            serde_json::to_value(&listing).unwrap(),
            serde_json::json!([{"index": "some_index_2", "configuration_id": "a"}])
        );
    }

    #[test]
    fn default_disposition_is_name_only() {
        assert_eq!(Disposition::default(), Disposition::NameOnly);
        assert!(SecondaryIndices::Names(vec![]).is_empty());
    }
}
