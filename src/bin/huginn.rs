//! huginn: metadata lookups from the command line.
//!
//! Fetches metadata for one or more items through a [`Scheduler`], so
//! duplicate items on the command line share one request and the persisted
//! cache answers repeated runs.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use futures_util::future::join_all;
use tracing::info;

use huginn::cache::{CachePersistence, JsonFileStore};
use huginn::config::Config;
use huginn::fetcher::HttpFetcher;
use huginn::{FetchOptions, Huginn, HuginnError, Metadata, Scheduler, with_retry};

/// Deduplicating media metadata client.
#[derive(Parser)]
#[command(name = "huginn")]
#[command(version = huginn::PKG_VERSION)]
#[command(about = "Cached, deduplicated media metadata lookups")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "HUGINN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch metadata for one or more items
    Fetch {
        /// Item identifiers (usually page URLs)
        #[arg(required = true)]
        items: Vec<String>,
        /// Metadata endpoint (overrides the config file)
        #[arg(short, long, env = "HUGINN_ENDPOINT")]
        endpoint: Option<String>,
        /// Fetcher option as name=value (repeatable)
        #[arg(short = 'o', long = "option", value_parser = parse_option)]
        options: Vec<(String, String)>,
        /// Lightweight preview lookup
        #[arg(short, long)]
        quick: bool,
        /// Don't read or write the cache file
        #[arg(long)]
        no_cache: bool,
    },

    /// List entries in the cache file
    Cache,

    /// Delete the cache file
    ClearCache,

    /// Print version information
    Version,
}

fn parse_option(pair: &str) -> Result<(String, String), String> {
    FetchOptions::parse_pair(pair).ok_or_else(|| format!("expected name=value, got {pair:?}"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    match args.command {
        Command::Fetch {
            items,
            endpoint,
            options,
            quick,
            no_cache,
        } => {
            let options = options
                .into_iter()
                .fold(FetchOptions::new().quick(quick), |opts, (name, value)| {
                    opts.param(name, value)
                });
            let persist = config.cache.persist && !no_cache;
            let scheduler = build_scheduler(&config, endpoint, persist)?;

            let retry = config.retry_config();
            let results = join_all(items.iter().map(|item| {
                let scheduler = scheduler.clone();
                let options = &options;
                let retry = &retry;
                async move {
                    let result = with_retry(retry, "fetch", || scheduler.fetch(item, options)).await;
                    (item, result)
                }
            }))
            .await;

            scheduler.shutdown().await;

            let mut failed = 0;
            for (item, result) in results {
                match result {
                    Ok(metadata) => print_metadata(&metadata)?,
                    Err(e) => {
                        failed += 1;
                        eprintln!("{item}: {e}");
                    }
                }
            }
            if failed > 0 {
                return Err(format!("{failed} of {} lookups failed", items.len()).into());
            }
        }

        Command::Cache => {
            let store = JsonFileStore::new(config.cache.resolved_path());
            let entries = store.load()?;
            if entries.is_empty() {
                println!("cache is empty ({})", store.path().display());
            }
            for entry in entries {
                println!("{}  {}", entry.key, entry.value.title);
            }
        }

        Command::ClearCache => {
            let path = config.cache.resolved_path();
            match std::fs::remove_file(&path) {
                Ok(()) => println!("removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    println!("no cache at {}", path.display())
                }
                Err(e) => return Err(e.into()),
            }
        }

        Command::Version => {
            println!("huginn {}", huginn::version_string());
            if let Some(built) = huginn::build_timestamp() {
                println!("built {built}");
            }
        }
    }

    Ok(())
}

fn build_scheduler(
    config: &Config,
    endpoint: Option<String>,
    persist: bool,
) -> Result<Scheduler, HuginnError> {
    let mut fetcher_section = config.fetcher.clone();
    if endpoint.is_some() {
        fetcher_section.endpoint = endpoint;
    }
    let http_config = fetcher_section.http_config().ok_or_else(|| {
        HuginnError::Configuration(
            "no metadata endpoint: pass --endpoint or set [fetcher] endpoint".into(),
        )
    })?;

    info!(
        version = huginn::version_string(),
        endpoint = %http_config.endpoint,
        "huginn starting"
    );

    let mut builder = Huginn::builder()
        .fetcher(HttpFetcher::new(http_config)?)
        .config(config.scheduler_config());
    if persist {
        builder = builder.persistence(JsonFileStore::new(config.cache.resolved_path()));
    }
    builder.build()
}

fn print_metadata(metadata: &Metadata) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(metadata)?);
    Ok(())
}
