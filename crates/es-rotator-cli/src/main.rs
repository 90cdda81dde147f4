//! es-rotator CLI - operator tool for blue/green index rotation.
//!
//! This is the entry point for the `esrotate` binary. Results are written to
//! stdout as JSON; logs go to stderr.

mod cutoff;
mod output;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use es_rotator::{Disposition, IndexRotator, RetryConfig, RotatorConfig, StrategyConfig};
use es_rotator_engine::{EngineConfig, HttpEngine, SearchEngine};
use serde_json::{json, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Rotate search engine indices behind a stable primary pointer.
#[derive(Parser, Debug)]
#[command(name = "esrotate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Search engine URL.
    #[arg(long, env = "ES_URL", default_value = "http://localhost:9200")]
    url: String,

    /// Basic auth user name.
    #[arg(long, env = "ES_USERNAME")]
    username: Option<String>,

    /// Basic auth password.
    #[arg(long, env = "ES_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// API key (`id:key` or base64-encoded).
    #[arg(long, env = "ES_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Mapping type for index mappings and document URLs. Detected from the
    /// cluster version when unset.
    #[arg(long, env = "ES_DOCUMENT_TYPE")]
    document_type: Option<String>,

    /// Prefix naming the configuration index (`.{prefix}_configuration`).
    #[arg(long, env = "ROTATOR_PREFIX")]
    prefix: String,

    /// Where the primary index pointer is kept.
    #[arg(long, env = "ROTATOR_STRATEGY", value_enum, default_value_t = StrategyKind::Configuration)]
    strategy: StrategyKind,

    /// Alias name (alias strategy).
    #[arg(long, env = "ROTATOR_ALIAS")]
    alias: Option<String>,

    /// Pattern matching every index the alias may point to (alias strategy).
    #[arg(long, env = "ROTATOR_INDEX_PATTERN")]
    index_pattern: Option<String>,

    /// Retries when reading the primary fails transiently.
    #[arg(long, default_value_t = 5)]
    max_retries: u32,

    /// Delay between retries in milliseconds.
    #[arg(long, default_value_t = 500)]
    retry_delay_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyKind {
    Configuration,
    Alias,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Print the current primary index.
    GetPrimary,
    /// Point the primary at an index.
    SetPrimary {
        /// Index to make primary.
        index: String,
    },
    /// Record the current primary as a secondary.
    Archive,
    /// Archive the current primary, then point the primary at an index.
    Rotate {
        /// Index to make primary.
        index: String,
    },
    /// List secondary indices.
    ListSecondaries {
        /// Only secondaries recorded before this time (RFC 3339, YYYY-MM-DD or epoch seconds).
        #[arg(long, value_parser = cutoff::parse_cutoff)]
        older_than: Option<DateTime<Utc>>,
        /// Include configuration ids.
        #[arg(long)]
        with_ids: bool,
    },
    /// Delete secondary indices and their records.
    DeleteSecondaries {
        /// Only secondaries recorded before this time (RFC 3339, YYYY-MM-DD or epoch seconds).
        #[arg(long, value_parser = cutoff::parse_cutoff)]
        older_than: Option<DateTime<Utc>>,
    },
}

impl Args {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            username: self.username.clone(),
            password: self.password.clone(),
            api_key: self.api_key.clone(),
            document_type: self.document_type.clone(),
            ..EngineConfig::new(&self.url)
        }
    }

    fn rotator_config(&self) -> anyhow::Result<RotatorConfig> {
        let strategy = match self.strategy {
            StrategyKind::Configuration => StrategyConfig::Configuration,
            StrategyKind::Alias => StrategyConfig::Alias {
                alias_name: self
                    .alias
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("--alias is required for the alias strategy"))?,
                index_pattern: self.index_pattern.clone().ok_or_else(|| {
                    anyhow::anyhow!("--index-pattern is required for the alias strategy")
                })?,
            },
        };
        Ok(RotatorConfig {
            strategy,
            retry: RetryConfig {
                max_retries: self.max_retries,
                delay_ms: self.retry_delay_ms,
            },
            ..RotatorConfig::new(self.prefix.clone())
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,es_rotator=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let engine = Arc::new(HttpEngine::new(args.engine_config())?);
    let rotator = IndexRotator::from_config(engine, &args.rotator_config()?)?;
    tracing::debug!(
        configuration_index = %rotator.configuration_index(),
        "Rotator ready"
    );

    let result = run(&rotator, args.command).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Execute one command and return its JSON result.
async fn run<E: SearchEngine + 'static>(
    rotator: &IndexRotator<E>,
    command: Command,
) -> anyhow::Result<Value> {
    let result = match command {
        Command::GetPrimary => {
            let primary = rotator.get_primary_index().await?;
            json!({ "primary": primary })
        }
        Command::SetPrimary { index } => {
            rotator.set_primary_index(&index).await?;
            json!({ "primary": index })
        }
        Command::Archive => {
            let id = rotator.copy_primary_index_to_secondary().await?;
            json!({ "configuration_id": id })
        }
        Command::Rotate { index } => {
            let rotation = rotator.rotate(&index).await?;
            json!(rotation)
        }
        Command::ListSecondaries {
            older_than,
            with_ids,
        } => {
            let disposition = if with_ids {
                Disposition::IncludeId
            } else {
                Disposition::NameOnly
            };
            let listing = rotator.get_secondary_indices(older_than, disposition).await?;
            json!(listing)
        }
        Command::DeleteSecondaries { older_than } => {
            let results = rotator.delete_secondary_indices(older_than).await?;
            json!(output::deletion_report(&results))
        }
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use es_rotator_engine::MemoryEngine;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn parses_list_with_cutoff() {
        let args = parse(&[
            "esrotate",
            "--prefix",
            "some",
            "list-secondaries",
            "--older-than",
            "2015-02-01",
            "--with-ids",
        ]);
        assert_eq!(args.prefix, "some");
        assert_eq!(
            args.command,
            Command::ListSecondaries {
                older_than: Some(cutoff::parse_cutoff("2015-02-01").unwrap()),
                with_ids: true,
            }
        );
    }

    #[test]
    fn alias_strategy_requires_options() {
        let args = parse(&[
            "esrotate",
            "--prefix",
            "some",
            "--strategy",
            "alias",
            "--alias",
            "some_alias",
            "get-primary",
        ]);
        assert!(args.rotator_config().is_err());

        let args = parse(&[
            "esrotate",
            "--prefix",
            "some",
            "--strategy",
            "alias",
            "--alias",
            "some_alias",
            "--index-pattern",
            "some_index_*",
            "get-primary",
        ]);
        assert_eq!(
            args.rotator_config().unwrap().strategy,
            StrategyConfig::Alias {
                alias_name: "some_alias".into(),
                index_pattern: "some_index_*".into(),
            }
        );
    }

    #[test]
    fn engine_config_carries_credentials() {
        let args = parse(&[
            "esrotate",
            "--url",
            "https://search:9200",
            "--api-key",
            "id:secret",
            "--prefix",
            "some",
            "archive",
        ]);
        let config = args.engine_config();
        assert_eq!(config.url, "https://search:9200");
        assert_eq!(config.api_key.as_deref(), Some("id:secret"));
        assert!(config.username.is_none());
        assert!(config.document_type.is_none());
    }

    #[test]
    fn engine_config_carries_document_type() {
        let args = parse(&[
            "esrotate",
            "--document-type",
            "configuration",
            "--prefix",
            "some",
            "get-primary",
        ]);
        assert_eq!(
            args.engine_config().document_type.as_deref(),
            Some("configuration")
        );
    }

    #[tokio::test]
    async fn run_rotate_then_get() {
        let rotator = IndexRotator::new(Arc::new(MemoryEngine::new()), "some");

        let rotated = run(
            &rotator,
            Command::Rotate {
                index: "some_index_1".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(rotated["primary"], json!("some_index_1"));
        assert_eq!(rotated["previous"], Value::Null);

        let primary = run(&rotator, Command::GetPrimary).await.unwrap();
        assert_eq!(primary, json!({"primary": "some_index_1"}));

        let listed = run(
            &rotator,
            Command::ListSecondaries {
                older_than: None,
                with_ids: false,
            },
        )
        .await
        .unwrap();
        assert_eq!(listed, json!([]));
    }
}
