//! uxdf: command-line access to the UXDF graph model
//!
//! Parses chain expressions, validates documents and mints identifiers
//! against a schema file.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uxdf::definition::{Catalog, Registry};
use uxdf::graph::{SdData, UxdfDocument};
use uxdf::id::{is_effective_id, IdMaker};

#[derive(Parser)]
#[command(name = "uxdf", version, about = "UXDF graph model tools")]
struct Cli {
    /// Schema document (JSON, or YAML by .yaml/.yml extension)
    #[arg(long, global = true, env = "UXDF_SCHEMA")]
    schema: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Output format
    #[arg(long, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a chain expression and list every concrete alternative
    Chain {
        /// The chain, e.g. "Person-*>Car"
        expression: String,
    },
    /// Load a document into a store and report what it holds
    Check {
        /// UXDF document with "sd" and "data" sections
        document: PathBuf,
    },
    /// Mint new identifiers
    Id {
        #[arg(long, short, default_value_t = 1)]
        count: usize,
    },
    /// Verify an identifier's check digit
    Verify { id: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Chain { expression } => run_chain(&cli, expression),
        Commands::Check { document } => run_check(&cli, document),
        Commands::Id { count } => run_id(*count),
        Commands::Verify { id } => run_verify(id),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_schema(path: &Path) -> Result<Registry> {
    Registry::load_path(path).with_context(|| format!("failed to load schema {}", path.display()))
}

fn run_chain(cli: &Cli, expression: &str) -> Result<()> {
    let registry = match &cli.schema {
        Some(path) => load_schema(path)?,
        None => Registry::new(Catalog::new()),
    };
    let Some(chain) = uxdf::chain::parse(expression, &registry)
        .with_context(|| format!("invalid chain {:?}", expression))?
    else {
        bail!("empty chain expression");
    };

    match cli.format {
        OutputFormat::Json => {
            let alternatives: Vec<Vec<String>> = chain
                .iter()
                .map(|items| items.iter().map(ToString::to_string).collect())
                .collect();
            let output = serde_json::json!({
                "alternatives": alternatives,
                "labels": chain.label_types(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            if chain.is_empty() {
                println!("(no matching chain)");
            }
            for (index, items) in chain.iter().enumerate() {
                let hops: Vec<String> = items.iter().map(ToString::to_string).collect();
                println!("{}: {}", index + 1, hops.join(" "));
            }
            for (label, type_name) in chain.label_types() {
                println!("  {} -> {}", label, type_name);
            }
        }
    }
    Ok(())
}

fn run_check(cli: &Cli, path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read document {}", path.display()))?;
    let document: UxdfDocument = match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&text)?,
        _ => serde_json::from_str(&text)?,
    };

    // An explicit schema replaces the document's own "sd" section.
    let registry = match &cli.schema {
        Some(schema) => load_schema(schema)?,
        None => document.registry().context("invalid schema section")?,
    };
    let data = SdData::from_document(Arc::new(registry), document.data)
        .context("document data violates the schema")?;

    match cli.format {
        OutputFormat::Json => {
            let events: serde_json::Map<String, serde_json::Value> = data
                .unmodifiable_events()
                .into_iter()
                .map(|(name, events)| (name.to_string(), events.len().into()))
                .collect();
            let output = serde_json::json!({
                "nodes": data.node_count(),
                "events": events,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            println!("nodes: {}", data.node_count());
            println!("events: {}", data.event_count());
            for (name, events) in data.unmodifiable_events() {
                println!("  {}: {}", name, events.len());
            }
        }
    }
    Ok(())
}

fn run_id(count: usize) -> Result<()> {
    let maker = IdMaker::new();
    for _ in 0..count {
        println!("{}", maker.next()?);
    }
    Ok(())
}

fn run_verify(id: &str) -> Result<()> {
    if !is_effective_id(id) {
        bail!("{} is not a valid identifier", id);
    }
    println!("{} is valid", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_schema_from_flag_or_environment() {
        let command = Cli::command();
        let schema = command
            .get_arguments()
            .find(|arg| arg.get_id() == "schema")
            .unwrap();
        assert_eq!(schema.get_env().and_then(|env| env.to_str()), Some("UXDF_SCHEMA"));

        let cli = Cli::try_parse_from(["uxdf", "chain", "A-E>B", "--schema", "schema.yaml"]).unwrap();
        assert_eq!(cli.schema, Some(PathBuf::from("schema.yaml")));
        assert!(matches!(cli.command, Commands::Chain { ref expression } if expression == "A-E>B"));
    }
}
