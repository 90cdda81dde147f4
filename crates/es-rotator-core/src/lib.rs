//! Core types for es-rotator.
//!
//! This crate provides the bookkeeping vocabulary shared by the engine client
//! and the rotator:
//!
//! - **Identifiers**: [`ConfigurationId`], including the reserved `primary` id
//! - **Records**: [`ConfigurationRecord`] as stored in the configuration index
//! - **Secondary listings**: [`SecondaryIndex`], [`Disposition`], [`SecondaryIndices`]
//!
//! # Example
//!
//! ```
//! use es_rotator_core::{configuration_index_name, ConfigurationId, ConfigurationRecord};
//!
//! assert_eq!(configuration_index_name("catalog"), ".catalog_configuration");
//!
//! let id = ConfigurationId::primary();
//! assert!(id.is_primary());
//!
//! let record = ConfigurationRecord::new("catalog_20240101", 1_704_067_200);
//! assert_eq!(record.name, "catalog_20240101");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod types;

pub use error::{CoreError, Result};
pub use ids::{ConfigurationId, PRIMARY_ID};
pub use types::{ConfigurationRecord, Disposition, SecondaryIndex, SecondaryIndices};

/// Derive the configuration index name for a caller-supplied prefix.
///
/// The prefix is opaque; the result is always `.{prefix}_configuration`.
#[must_use]
pub fn configuration_index_name(prefix: &str) -> String {
    format!(".{prefix}_configuration")
}
