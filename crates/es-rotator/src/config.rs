//! Rotator configuration types.
//!
//! Everything is supplied programmatically by the embedding application;
//! these structs only give that input a serde shape with defaults.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, RotatorError};

/// Configuration for an [`IndexRotator`](crate::IndexRotator).
#[derive(Debug, Clone, Deserialize)]
pub struct RotatorConfig {
    /// Prefix identifying whose configuration this is.
    pub prefix: String,

    /// How the primary index pointer is stored.
    #[serde(default)]
    pub strategy: StrategyConfig,

    /// Retry behaviour when archiving the primary.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Maximum number of secondaries returned by a single listing.
    #[serde(default = "RotatorConfig::default_page_size")]
    pub secondary_page_size: usize,
}

impl RotatorConfig {
    const fn default_page_size() -> usize {
        10_000
    }

    /// Create a configuration with the given prefix and default settings.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            strategy: StrategyConfig::default(),
            retry: RetryConfig::default(),
            secondary_page_size: Self::default_page_size(),
        }
    }

    /// Check the options that cannot be enforced by types.
    ///
    /// # Errors
    ///
    /// Returns `RotatorError::InvalidConfiguration` for an empty prefix or a
    /// zero page size.
    pub fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() {
            return Err(RotatorError::InvalidConfiguration(
                "prefix must be specified".to_string(),
            ));
        }
        if self.secondary_page_size == 0 {
            return Err(RotatorError::InvalidConfiguration(
                "secondary page size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Selects where the primary index pointer lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// A `primary` record in the configuration index.
    #[default]
    Configuration,
    /// A search engine alias re-pointed atomically.
    Alias {
        /// Alias name queried by the application.
        alias_name: String,
        /// Pattern matching every index the alias may point to.
        index_pattern: String,
    },
}

/// Retry settings for reading the primary while archiving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    #[serde(default = "RetryConfig::default_max_retries")]
    pub max_retries: u32,

    /// Delay before each retry, in milliseconds.
    #[serde(default = "RetryConfig::default_delay_ms")]
    pub delay_ms: u64,
}

impl RetryConfig {
    const fn default_max_retries() -> u32 {
        5
    }

    const fn default_delay_ms() -> u64 {
        500
    }

    /// Get the retry delay as a `Duration`.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: Self::default_max_retries(),
            delay_ms: Self::default_delay_ms(),
        }
    }
}
