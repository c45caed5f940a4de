//! mdgraph CLI - GraphQL over markdown content

use clap::{Parser, Subcommand};
use mdgraph::config::Config;
use mdgraph::database::{BuildOptions, Database};
use mdgraph::server::{self, ServeOptions};
use mdgraph::{audit, schema};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mdgraph")]
#[command(about = "Compile a content schema to GraphQL and serve markdown documents", long_about = None)]
struct Cli {
    /// Project root (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    root: PathBuf,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the schema, write generated files and index the content
    Build {
        /// Compile only; do not index documents
        #[arg(long)]
        skip_index: bool,

        /// Do not write the client SDK files
        #[arg(long)]
        no_sdk: bool,
    },

    /// Build, then serve GraphQL and rebuild on changes
    #[command(name = "server:start")]
    ServerStart {
        /// Port to listen on (overrides the config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not rebuild on file changes
        #[arg(long)]
        no_watch: bool,
    },

    /// Check every document against the schema
    Audit {
        /// Rewrite documents in canonical form instead of a dry run
        #[arg(long)]
        clean: bool,
    },

    /// List collections
    Collections,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default = if cli.verbose { "mdgraph=debug" } else { "mdgraph=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();

    let config = Config::load(&cli.root)?;

    let result = match cli.command {
        Commands::Build { skip_index, no_sdk } => build(&cli.root, &config, skip_index, !no_sdk).await,
        Commands::ServerStart { port, no_watch } => start_server(&cli.root, &config, port, !no_watch).await,
        Commands::Audit { clean } => run_audit(&cli.root, &config, clean).await,
        Commands::Collections => list_collections(&cli.root, &config),
    };

    if let Err(e) = &result {
        if let Some(hint) = e.downcast_ref::<mdgraph::Error>().and_then(|e| e.suggestion()) {
            eprintln!("hint: {}", hint);
        }
    }
    result
}

fn build_options(root: &Path, config: &Config, skip_index: bool, sdk: bool) -> BuildOptions {
    BuildOptions {
        output_dir: Some(config.generated_dir(root)),
        skip_index,
        sdk,
        retry: config.retry_policy(),
    }
}

async fn build(root: &Path, config: &Config, skip_index: bool, sdk: bool) -> anyhow::Result<()> {
    let source = schema::load_source(&config.schema_path(root))?;
    let db = Database::new(config.open_bridge(root)?, config.open_store(root)?);
    let snapshot = db.build(&source, &build_options(root, config, skip_index, sdk)).await?;

    println!(
        "Built {} collection(s) into {}",
        snapshot.schema.collections.len(),
        config.generated_dir(root).display()
    );
    Ok(())
}

async fn start_server(root: &Path, config: &Config, port: Option<u16>, watch: bool) -> anyhow::Result<()> {
    let options = ServeOptions {
        port: port.unwrap_or(config.server.port),
        watch: watch && config.server.watch,
        build: build_options(root, config, false, true),
    };
    server::serve(root, config, options).await?;
    Ok(())
}

async fn run_audit(root: &Path, config: &Config, clean: bool) -> anyhow::Result<()> {
    let report = audit::run(root, config, clean).await?;

    for error in &report.errors {
        eprintln!("✗ {}: {}", error.path, error.message);
    }
    println!(
        "Audited {} document(s): {} warning(s), {} error(s)",
        report.documents,
        report.warnings,
        report.errors.len()
    );
    if clean {
        println!("Rewrote {} document(s)", report.writes);
    } else if report.writes > 0 {
        println!("{} document(s) would change; run with --clean to rewrite them", report.writes);
    }

    if !report.errors.is_empty() {
        anyhow::bail!("audit found {} error(s)", report.errors.len());
    }
    Ok(())
}

fn list_collections(root: &Path, config: &Config) -> anyhow::Result<()> {
    let schema = schema::load(&config.schema_path(root))?;

    if schema.collections.is_empty() {
        println!("No collections");
        return Ok(());
    }

    println!("Collections:");
    for collection in &schema.collections {
        println!(
            "  {} ({}) - {}/{}.{}",
            collection.name,
            collection.label,
            collection.path,
            collection.matches,
            collection.format.extension()
        );
    }
    Ok(())
}
