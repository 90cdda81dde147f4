//! Engine version detection and query dialect selection.

use semver::Version;

use crate::error::{EngineError, Result};
use crate::types::EngineInfo;

/// First version accepting a `filter` clause inside a `bool` query.
const COMBINED_FILTER_MIN: Version = Version::new(2, 0, 0);

/// First version with the `keyword` field type.
const KEYWORD_MIN: Version = Version::new(5, 0, 0);

/// First version accepting typeless mappings and `_doc` document URLs.
const TYPELESS_MIN: Version = Version::new(7, 0, 0);

/// Mapping type used on engines that still require one.
pub const LEGACY_MAPPING_TYPE: &str = "configuration";

/// Type segment of document URLs on typeless engines.
pub const TYPELESS_DOCUMENT: &str = "_doc";

/// Shape used for filtered queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryDialect {
    /// `bool` query carrying both `must_not` and `filter`.
    Combined,
    /// Filter placed at the top level of the request body (1.x DSL).
    Legacy,
}

impl QueryDialect {
    /// Pick the dialect for a parsed version.
    #[must_use]
    pub fn for_version(version: &Version) -> Self {
        if *version >= COMBINED_FILTER_MIN {
            Self::Combined
        } else {
            Self::Legacy
        }
    }

    /// Returns true for the 1.x dialect.
    #[must_use]
    pub const fn is_legacy(self) -> bool {
        matches!(self, Self::Legacy)
    }
}

/// What the rotator needs to know about an engine, derived once from
/// [`EngineInfo`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineProfile {
    /// Reported version.
    pub version: Version,
    /// Query shape for filtered searches.
    pub dialect: QueryDialect,
    /// Whether exact-match strings are mapped as `keyword` (5.x+) rather than
    /// `not_analyzed` strings.
    pub keyword_strings: bool,
    /// Whether dates accept the `epoch_second` format (2.x+).
    pub epoch_second_dates: bool,
    /// Mapping type required in index mappings and document URLs. `None`
    /// on typeless engines (7.x+).
    pub mapping_type: Option<&'static str>,
}

impl EngineProfile {
    /// Build the profile of the engine described by `info`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidVersion` if the version cannot be parsed.
    pub fn from_info(info: &EngineInfo) -> Result<Self> {
        let version = parse_version(&info.version.number)?;
        // OpenSearch restarted numbering at 1.0 but forked from a typeless 7.10.
        if info.version.distribution.as_deref() == Some("opensearch") {
            return Ok(Self {
                version,
                dialect: QueryDialect::Combined,
                keyword_strings: true,
                epoch_second_dates: true,
                mapping_type: None,
            });
        }
        Ok(Self {
            dialect: QueryDialect::for_version(&version),
            keyword_strings: version >= KEYWORD_MIN,
            epoch_second_dates: version >= COMBINED_FILTER_MIN,
            mapping_type: (version < TYPELESS_MIN).then_some(LEGACY_MAPPING_TYPE),
            version,
        })
    }
}

/// Parse an engine version string, padding short forms such as `1.7`.
///
/// # Errors
///
/// Returns `EngineError::InvalidVersion` if the string is not a version.
pub fn parse_version(number: &str) -> Result<Version> {
    if let Ok(version) = Version::parse(number) {
        return Ok(version);
    }

    let (core, pre) = match number.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (number, None),
    };
    let mut parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return Err(EngineError::InvalidVersion(number.to_string()));
    }
    while parts.len() < 3 {
        parts.push("0");
    }
    let padded = match pre {
        Some(pre) => format!("{}-{pre}", parts.join(".")),
        None => parts.join("."),
    };
    Version::parse(&padded).map_err(|_| EngineError::InvalidVersion(number.to_string()))
}
