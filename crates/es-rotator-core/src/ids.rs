//! Identifier types for configuration records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// The reserved document id of the primary record.
pub const PRIMARY_ID: &str = "primary";

/// Identifier of a record in the configuration index.
///
/// Exactly one record per configuration index uses the reserved
/// [`PRIMARY_ID`]; secondary records carry opaque ids generated by the
/// search engine.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConfigurationId(String);

impl ConfigurationId {
    /// Create a `ConfigurationId` from an engine-provided id.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is empty.
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        if id.is_empty() {
            return Err(CoreError::EmptyConfigurationId);
        }
        Ok(Self(id))
    }

    /// The reserved id of the primary record.
    #[must_use]
    pub fn primary() -> Self {
        Self(PRIMARY_ID.to_string())
    }

    /// Returns true if this is the reserved primary id.
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.0 == PRIMARY_ID
    }

    /// Return the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ConfigurationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigurationId({})", self.0)
    }
}

impl fmt::Display for ConfigurationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ConfigurationId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ConfigurationId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ConfigurationId> for String {
    fn from(id: ConfigurationId) -> Self {
        id.0
    }
}

impl AsRef<str> for ConfigurationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
