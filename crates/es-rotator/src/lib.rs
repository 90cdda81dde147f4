//! Blue/green rotation of search engine indices.
//!
//! An [`IndexRotator`] tracks which physical index is the primary for one
//! prefix, archives the previous primary as a timestamped secondary when a
//! new index takes over, and prunes secondaries past a cutoff.
//!
//! Where the primary pointer lives is decided by a [`PrimaryIndexStrategy`]:
//!
//! - [`ConfigurationStrategy`] keeps a `primary` record in the configuration
//!   index (`.{prefix}_configuration`)
//! - [`AliasStrategy`] binds an engine alias and swaps it atomically
//!
//! Secondaries are always recorded in the configuration index.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────────────┐
//!                 │       IndexRotator       │
//!                 │  archive / list / prune  │
//!                 └─────┬──────────────┬─────┘
//!                       │              │
//!       ┌───────────────▼───┐   ┌──────▼──────────────┐
//!       │ PrimaryIndex      │   │ ConfigurationIndex  │
//!       │ Strategy (trait)  │   │ .{prefix}_config... │
//!       └──┬─────────────┬──┘   └──────▲──────────────┘
//!          │             │             │
//!  ┌───────▼──────┐ ┌────▼─────────┐   │
//!  │ Alias        │ │ Configuration│───┘
//!  │ Strategy     │ │ Strategy     │
//!  └───────┬──────┘ └──────────────┘
//!          │
//!  ┌───────▼────────────────────────────┐
//!  │        SearchEngine (trait)        │
//!  └────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use es_rotator::IndexRotator;
//! use es_rotator_engine::{EngineConfig, HttpEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Arc::new(HttpEngine::new(EngineConfig::new("http://localhost:9200"))?);
//! let rotator = IndexRotator::new(engine, "catalog");
//!
//! let rotation = rotator.rotate("catalog_20150201").await?;
//! println!("now serving {}", rotation.primary);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod configuration_index;
pub mod error;
pub mod retry;
pub mod rotator;
pub mod strategy;

pub use config::{RetryConfig, RotatorConfig, StrategyConfig};
pub use configuration_index::{configuration_mappings, ConfigurationIndex};
pub use error::{Result, RotatorError};
pub use retry::{Sleeper, TokioSleeper};
pub use rotator::{IndexRotator, Rotation, SecondaryDeletion};
pub use strategy::{AliasStrategy, ConfigurationStrategy, PrimaryIndexStrategy};

pub use es_rotator_core::{
    ConfigurationId, ConfigurationRecord, Disposition, SecondaryIndex, SecondaryIndices,
};
