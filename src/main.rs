//! semantic - command line front end for semantic-protocol

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use semantic_protocol::commands::{self, OutputFormat};
use semantic_protocol::config::{load_config, load_config_from, Config};

#[derive(Parser)]
#[command(name = "semantic")]
#[command(author, version, about = "Semantic field classification and manifest discovery")]
struct Cli {
    /// Config file (defaults to ~/.semantic-protocol/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a field by name, type and optional sample value
    Analyze {
        /// Field name (e.g., "created_at")
        name: String,

        /// Field type: string, number, integer, float, boolean, date, timestamp, array, object
        #[arg(short = 't', long = "type", default_value = "string")]
        field_type: String,

        /// Sample value (JSON, or a bare string)
        #[arg(short, long)]
        value: Option<String>,

        /// Render context: list, detail, form, timeline
        #[arg(short, long, default_value = "list")]
        context: String,

        /// Override the configured confidence threshold
        #[arg(long)]
        threshold: Option<u8>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Query a manifests file
    Find {
        /// JSON file with an array of manifests
        manifests: PathBuf,

        /// Query document, e.g. '{"type": "action"}'
        query: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the relationship graph of a manifests file
    Graph {
        /// JSON file with an array of manifests
        manifests: PathBuf,

        /// Relation keys to include (comma separated)
        #[arg(short, long, value_delimiter = ',')]
        keys: Option<Vec<String>>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate manifests and their relationships
    Validate {
        /// JSON file with an array of manifests
        manifests: PathBuf,

        /// Strict mode (fail on warnings)
        #[arg(long)]
        strict: bool,
    },

    /// Check for a relationship cycle starting at a manifest
    Cycles {
        /// JSON file with an array of manifests
        manifests: PathBuf,

        /// Manifest id to start from
        id: String,

        /// Relation key to follow (defaults to the configured cycle key)
        #[arg(short, long)]
        key: Option<String>,
    },

    /// List supported semantics and render contexts
    Semantics {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config: Config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    match cli.command {
        Commands::Analyze {
            name,
            field_type,
            value,
            context,
            threshold,
            json,
        } => {
            commands::analyze(
                &config,
                &name,
                &field_type,
                value.as_deref(),
                &context,
                threshold,
                OutputFormat::from_flag(json),
            )?;
        }
        Commands::Find {
            manifests,
            query,
            json,
        } => {
            commands::find(&config, &manifests, &query, OutputFormat::from_flag(json))?;
        }
        Commands::Graph {
            manifests,
            keys,
            json,
        } => {
            commands::graph(
                &config,
                &manifests,
                keys.as_deref(),
                OutputFormat::from_flag(json),
            )?;
        }
        Commands::Validate { manifests, strict } => {
            commands::validate(&config, &manifests, strict)?;
        }
        Commands::Cycles { manifests, id, key } => {
            commands::cycles(&config, &manifests, &id, key.as_deref())?;
        }
        Commands::Semantics { json } => {
            commands::semantics(&config, OutputFormat::from_flag(json))?;
        }
    }

    Ok(())
}
