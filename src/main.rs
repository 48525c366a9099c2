use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use r2sync::config::{parse_concurrency, ClientConfig, ConfigOverrides, FileConfig, SyncOptions, Target};
use r2sync::store::CloudStore;
use r2sync::sync::path::normalize;
use r2sync::sync::Syncer;

/// Sync a local directory to an S3, R2 or GCS bucket prefix.
#[derive(Parser, Debug)]
#[command(name = "r2sync", version, about)]
struct Args {
    /// Local directory to upload from.
    source: String,

    /// Destination, e.g. r2://bucket/prefix, s3://bucket/prefix or gs://bucket/prefix.
    target: String,

    /// Show what would be uploaded or deleted without doing it.
    #[arg(long)]
    dryrun: bool,

    /// Delete remote objects that have no local counterpart.
    #[arg(long)]
    delete: bool,

    /// Descend into subdirectories.
    #[arg(long)]
    recursive: bool,

    /// Maximum number of concurrent uploads or deletes.
    #[arg(long, default_value_t = 5, allow_negative_numbers = true)]
    concurrency: i64,

    /// Compare sizes only and never read file contents.
    #[arg(long)]
    size_only: bool,

    /// Glob pattern to exclude; may be repeated.
    #[arg(long = "exclude", value_name = "PATTERN")]
    excludes: Vec<String>,

    /// Config file (default: <config dir>/r2sync/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Storage endpoint URL.
    #[arg(long)]
    endpoint: Option<String>,

    /// Storage region.
    #[arg(long)]
    region: Option<String>,

    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let target = Target::parse(&args.target)?;
    let options = SyncOptions {
        prefix: target.prefix.clone(),
        delete: args.delete,
        dry_run: args.dryrun,
        recursive: args.recursive,
        concurrency: parse_concurrency(args.concurrency)?,
        size_only: args.size_only,
        excludes: args.excludes.iter().map(|p| normalize(p)).collect(),
    };

    let file = FileConfig::load(args.config.as_deref())?;
    let overrides = ConfigOverrides {
        endpoint: args.endpoint,
        region: args.region,
    };
    let client = ClientConfig::from_env(&target, &file, &overrides)?;
    tracing::debug!(?client, "resolved storage client");

    let store = CloudStore::new(&client).with_context(|| format!("Failed to configure storage for {}", target))?;
    let syncer = Syncer::new(Arc::new(store), normalize(&args.source), options)?;
    let summary = syncer.run().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}
