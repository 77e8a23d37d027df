// src/main.rs
mod app;
mod db;
mod error;
mod export;
mod lineage;

use anyhow::{Context, Result};
use app::export_flow::{export_schema, generate_lineage, LineageSettings};
use app::prompt::{ConnectionDetails, PresetAnswers, Prompter, TerminalSecretReader};
use clap::{ArgAction, Parser, ValueEnum};
use db::accessors::PostgresConnector;
use db::models::{AuthMode, ConnectionParams, ObjectCategory, DEFAULT_CONNECT_TIMEOUT};
use export::exporter::{DefinitionWriter, ManifestFormat, DEFAULT_BATCH_SEPARATOR};
use lineage::render::{DotRenderer, DEFAULT_DOT_EXECUTABLE, DEFAULT_IMAGE_FORMAT, DEFAULT_RENDER_TIMEOUT};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Procedures, views and table placeholders as .sql files
    Schema,
    /// Dependency graph as DOT plus rendered image
    Lineage,
    All,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host, host:port or Unix socket directory
    #[arg(long)]
    server: Option<String>,
    #[arg(long)]
    database: Option<String>,
    #[arg(long, conflicts_with = "trusted")]
    username: Option<String>,
    #[arg(long, env = "DB_EXPORT_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    /// Authenticate as the current OS user without prompting
    #[arg(long, default_value_t = false)]
    trusted: bool,
    #[arg(long)]
    output_dir: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = Mode::Schema)]
    mode: Mode,
    #[arg(long, default_value_t = false)]
    skip_render: bool,
    #[arg(long, default_value = DEFAULT_DOT_EXECUTABLE)]
    dot_executable: String,
    #[arg(long, default_value = DEFAULT_IMAGE_FORMAT)]
    image_format: String,
    /// Seconds before a hung Graphviz run is killed
    #[arg(long, default_value_t = DEFAULT_RENDER_TIMEOUT.as_secs())]
    render_timeout: u64,
    /// Seconds to wait for the database connection
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT.as_secs())]
    connect_timeout: u64,
    #[arg(long, default_value = DEFAULT_BATCH_SEPARATOR)]
    batch_separator: String,
    /// Also write the lineage graph as JSON or YAML
    #[arg(long, value_enum)]
    manifest_format: Option<ManifestFormat>,
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn preset_answers(&self) -> PresetAnswers {
        PresetAnswers {
            server: self.server.clone(),
            database: self.database.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            trusted: self.trusted,
            output_dir: self.output_dir.clone(),
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn connection_params(details: &ConnectionDetails, connect_timeout: Duration) -> ConnectionParams {
    let mut params = ConnectionParams::new(&details.server, &details.database);
    params.connect_timeout = connect_timeout;
    match &details.username {
        Some(username) => params.with_credentials(username, details.password.clone()),
        None => params,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<bool> {
    let details = Prompter::new(io::stdin().lock(), io::stdout(), TerminalSecretReader)
        .collect(args.preset_answers())
        .context("Failed to read connection details")?;
    let params = connection_params(&details, Duration::from_secs(args.connect_timeout));
    let output_dir = details.output_dir.clone();

    println!("--- SQL Schema Exporter ---");
    println!("Server: {}", params.host);
    println!("Database: {}", params.database);
    match params.auth_mode() {
        AuthMode::Trusted => println!("Authentication: trusted (OS user)"),
        AuthMode::Credentialed => {
            println!("Authentication: {} / [REDACTED]", params.username.as_deref().unwrap_or_default())
        }
    }
    println!("Mode: {:?}", args.mode);
    println!("Output: {}", output_dir.display());
    println!("---------------------------");

    let connector = PostgresConnector;
    let mut succeeded = true;

    if matches!(args.mode, Mode::Schema | Mode::All) {
        info!("Starting schema export to directory: {}", output_dir.display());
        let writer = DefinitionWriter::new(args.batch_separator.clone());
        match export_schema(&connector, &params, &output_dir, &writer).await {
            Ok(summary) => {
                let shown = std::fs::canonicalize(&output_dir).unwrap_or_else(|_| output_dir.clone());
                println!("\nSchema export completed successfully to {}", shown.display());
                for category in ObjectCategory::ALL {
                    if summary.failed.contains(&category) {
                        println!("  {}: could not be fetched, see log", category);
                    } else {
                        println!("  {}: {} file(s)", category, summary.written_for(category));
                    }
                }
            }
            Err(e) => {
                println!("\nSchema export failed: {}. Check logs for details.", e);
                if e.is_connection_failure() {
                    println!("Check the server address, database name and credentials.");
                }
                succeeded = false;
            }
        }
    }

    if matches!(args.mode, Mode::Lineage | Mode::All) {
        info!("Starting lineage generation in directory: {}", output_dir.display());
        let renderer = DotRenderer::new(
            args.dot_executable.clone(),
            args.image_format.clone(),
            Duration::from_secs(args.render_timeout),
        );
        let settings = LineageSettings {
            output_dir: output_dir.clone(),
            skip_render: args.skip_render,
            manifest_format: args.manifest_format,
        };
        match generate_lineage(&connector, &params, &settings, &renderer).await {
            Ok(result) => {
                match &result.description_path {
                    Some(path) if result.description_written => {
                        println!("\nLineage graph description written to {}", path.display())
                    }
                    _ => println!("\nNo dependencies found; no lineage graph was written."),
                }
                if let Some(image) = &result.image_path {
                    println!("Lineage graph rendered to {}", image.display());
                }
                if let Some(manifest) = &result.manifest_path {
                    println!("Lineage manifest written to {}", manifest.display());
                }
                if let Some(render_error) = &result.render_error {
                    println!("Graph rendering failed: {}", render_error);
                }
            }
            Err(e) => {
                println!("\nLineage generation failed: {}", e);
                if e.is_connection_failure() {
                    println!("Check the server address, database name and credentials.");
                }
                succeeded = false;
            }
        }
    }

    Ok(succeeded)
}
