//! Form Command Line Interface
//!
//! Checks schemas and validates value documents without any UI.
//!
//! # Usage
//!
//! ```bash
//! # Compile a schema and print its shape
//! form_cli check user-registration
//!
//! # Validate a JSON value document against a schema
//! form_cli validate user-registration --file values.json
//! echo '{"age": 5}' | form_cli validate schemas/user-registration.yaml -o json
//!
//! # Run a full session submit with a handler that echoes the values
//! form_cli submit user-registration --file values.json
//!
//! # List schemas found in the schema directory
//! form_cli list --dir schemas
//! ```

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use formkit::{
    validate, CompiledRecord, CompiledSchema, FormSession, RecordValues, SchemaLoader,
    SubmitFailure, SubmitHandler, SubmitOutcome,
};

#[derive(Parser)]
#[command(name = "form_cli")]
#[command(version = "0.1.0")]
#[command(about = "Check form schemas and validate value documents")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: json, text, or pretty (default)
    #[arg(long, short = 'o', global = true, default_value = "pretty", value_enum)]
    format: OutputFormat,

    /// Schema directory (overrides FORMKIT_SCHEMA_DIR)
    #[arg(long, global = true, env = "FORMKIT_SCHEMA_DIR")]
    dir: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a schema and print a summary
    Check {
        /// Schema name or path to a schema file
        schema: String,
    },

    /// Validate a JSON value document
    Validate {
        /// Schema name or path to a schema file
        schema: String,

        /// Value document (reads stdin if not provided)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Mount a session, submit, and print the outcome
    Submit {
        /// Schema name or path to a schema file
        schema: String,

        /// Value document (reads stdin if not provided)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// List schemas in the schema directory
    List,
}

// =============================================================================
// MAIN
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let loader = match &cli.dir {
        Some(dir) => SchemaLoader::new(dir),
        None => SchemaLoader::from_env(),
    };

    let result = match cli.command {
        Commands::Check { schema } => cmd_check(&loader, &schema, cli.format),
        Commands::Validate { schema, file } => cmd_validate(&loader, &schema, file, cli.format),
        Commands::Submit { schema, file } => cmd_submit(&loader, &schema, file, cli.format).await,
        Commands::List => cmd_list(&loader, cli.format),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
            } else {
                eprintln!("{}: {:#}", "error".red().bold(), e);
            }
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

fn cmd_check(loader: &SchemaLoader, schema: &str, format: OutputFormat) -> Result<bool> {
    let compiled = load_schema(loader, schema)?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "name": compiled.name(),
                "records": compiled.source().records.keys().collect::<Vec<_>>(),
                "aggregates": compiled.aggregates().iter().map(|a| &a.name).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text | OutputFormat::Pretty => {
            println!("{} Schema '{}' compiled", "OK".green().bold(), compiled.name());
            print_record(compiled.root(), 1);
            for aggregate in compiled.aggregates() {
                println!(
                    "  {} {} = {:?}({}.{})",
                    "aggregate".cyan(),
                    aggregate.name,
                    aggregate.op,
                    aggregate.slot,
                    aggregate.field.as_deref().unwrap_or("*")
                );
            }
        }
    }
    Ok(true)
}

fn cmd_validate(
    loader: &SchemaLoader,
    schema: &str,
    file: Option<PathBuf>,
    format: OutputFormat,
) -> Result<bool> {
    let compiled = load_schema(loader, schema)?;
    let values = read_values(file)?;
    let outcome = validate(&compiled, &values);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        OutputFormat::Text | OutputFormat::Pretty => {
            if outcome.valid {
                println!("{} Values are valid", "OK".green().bold());
            } else {
                for (path, error) in outcome.errors.iter() {
                    let path = if path.is_root() {
                        "(form)".to_string()
                    } else {
                        path.to_string()
                    };
                    println!(
                        "{} {}: {} {}",
                        "error".red().bold(),
                        path.bold(),
                        error.message,
                        format!("[{}]", error.kind.as_str()).dimmed()
                    );
                }
                println!(
                    "{} {} message(s)",
                    "FAILED".red().bold(),
                    outcome.errors.message_count()
                );
            }
            for aggregate in compiled.aggregates() {
                println!("  {} = {}", aggregate.name, aggregate.evaluate(&values));
            }
        }
    }
    Ok(outcome.valid)
}

async fn cmd_submit(
    loader: &SchemaLoader,
    schema: &str,
    file: Option<PathBuf>,
    format: OutputFormat,
) -> Result<bool> {
    let compiled = Arc::new(load_schema(loader, schema)?);
    let values = read_values(file)?;
    let session = FormSession::new(compiled, Arc::new(EchoHandler), values);
    let outcome = session.submit().await;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        OutputFormat::Text | OutputFormat::Pretty => match &outcome {
            SubmitOutcome::Succeeded { result } => {
                println!("{} Submitted", "OK".green().bold());
                if let Some(result) = result {
                    println!("{}", serde_json::to_string_pretty(result)?);
                }
            }
            SubmitOutcome::Failed { reason } => {
                println!("{} Submit failed: {}", "FAILED".red().bold(), reason);
            }
            SubmitOutcome::Rejected { errors } => {
                for (path, error) in errors.iter() {
                    println!("{} {}: {}", "error".red().bold(), path.to_string().bold(), error.message);
                }
                println!("{} Submit aborted, form is invalid", "FAILED".red().bold());
            }
            SubmitOutcome::Ignored => println!("{} Submit ignored", "WARN".yellow().bold()),
        },
    }
    Ok(outcome.is_success())
}

fn cmd_list(loader: &SchemaLoader, format: OutputFormat) -> Result<bool> {
    let registry = loader.load_all()?;

    match format {
        OutputFormat::Json => {
            let names: Vec<&str> = registry.names().collect();
            println!("{}", serde_json::to_string_pretty(&names)?);
        }
        OutputFormat::Text | OutputFormat::Pretty => {
            println!(
                "{} schema(s) in {}",
                registry.len(),
                loader.schema_dir().display()
            );
            for schema in registry.iter() {
                println!(
                    "  {} ({} records)",
                    schema.name().bold(),
                    schema.source().records.len()
                );
            }
        }
    }
    Ok(true)
}

// =============================================================================
// HELPERS
// =============================================================================

/// Submit handler that accepts everything and returns the submitted values
struct EchoHandler;

#[async_trait]
impl SubmitHandler for EchoHandler {
    async fn submit(&self, values: RecordValues) -> Result<Option<serde_json::Value>, SubmitFailure> {
        Ok(Some(values.to_json()))
    }
}

fn load_schema(loader: &SchemaLoader, schema: &str) -> Result<CompiledSchema> {
    let path = Path::new(schema);
    if path.is_file() {
        loader.load_file(path)
    } else {
        loader.load(schema)
    }
}

fn read_values(file: Option<PathBuf>) -> Result<RecordValues> {
    let source = match file {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read '{}'", path.display()))?,
        None => {
            if io::stdin().is_terminal() {
                return Err(anyhow!(
                    "No input provided. Use --file or pipe input via stdin."
                ));
            }
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            buffer
        }
    };
    let json: serde_json::Value =
        serde_json::from_str(&source).context("Value document is not valid JSON")?;
    Ok(RecordValues::from_json(&json)?)
}

fn print_record(record: &CompiledRecord, depth: usize) {
    let indent = "  ".repeat(depth);
    for field in record.fields.iter() {
        let optional = if field.is_optional() { "?" } else { "" };
        println!(
            "{}{}{}: {} ({} constraint(s))",
            indent,
            field.name(),
            optional,
            field.kind().name().cyan(),
            field.spec().constraints.len()
        );
    }
    for slot in record.slots.iter() {
        let max = slot
            .max_rows
            .map(|m| m.to_string())
            .unwrap_or_else(|| "*".to_string());
        println!(
            "{}{}: [{}] rows {}..{}",
            indent,
            slot.name,
            slot.record.name.cyan(),
            slot.min_rows,
            max
        );
        print_record(&slot.record, depth + 1);
    }
}
