//! Batch query driver for the semantic caching proxy.
//!
//! Feeds query files through one shared proxy so later queries in a
//! batch can be answered from the caches the earlier ones populated.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use futures::StreamExt;
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use semcache_proxy::{CachingProxy, MemoryDocumentSource, ProxyConfig};
use semcache_storage::JsonFileRecordStore;

#[derive(Parser, Debug)]
#[command(name = "semcache")]
#[command(about = "Semantic caching proxy for aggregate queries", long_about = None)]
#[command(version)]
struct Cli {
    /// Query input: a .json query file, or a .txt batch file listing
    /// .json file names relative to itself
    input: PathBuf,

    /// JSON file holding the source document corpus (array of documents)
    #[arg(long, env = "SEMCACHE_DATA")]
    data: PathBuf,

    /// Maximum number of cached query texts
    #[arg(long, env = "SEMCACHE_QUERY_CAPACITY", default_value = "3")]
    query_capacity: usize,

    /// Maximum number of cached result documents
    #[arg(long, env = "SEMCACHE_RESULT_CAPACITY", default_value = "5000")]
    result_capacity: usize,

    /// Directory for the persistent cache files
    #[arg(long, env = "SEMCACHE_CACHE_DIR", default_value = "data")]
    cache_dir: PathBuf,

    /// Keep cache contents from a previous run instead of starting fresh
    #[arg(long)]
    keep_cache: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let cli = Cli::parse();

    let batch = collect_batch(&cli.input)?;
    if batch.is_empty() {
        warn!(input = %cli.input.display(), "no query files to run");
        return Ok(());
    }

    let corpus: Vec<Value> = serde_json::from_str(&tokio::fs::read_to_string(&cli.data).await?)?;
    info!(documents = corpus.len(), "loaded source corpus");

    let config = ProxyConfig {
        query_capacity: cli.query_capacity,
        result_capacity: cli.result_capacity,
        clear_on_start: !cli.keep_cache,
    };
    let proxy = CachingProxy::open(
        Arc::new(MemoryDocumentSource::new(corpus)),
        Arc::new(JsonFileRecordStore::open(cli.cache_dir.join("queries.json")).await?),
        Arc::new(JsonFileRecordStore::open(cli.cache_dir.join("results.json")).await?),
        &config,
    )
    .await?;

    for path in batch {
        run_query(&proxy, &path).await?;
    }

    Ok(())
}

/// Expands the input into the list of query files to run. A `.txt` batch
/// file names one `.json` file per line, relative to itself; entries
/// that do not exist are skipped.
fn collect_batch(input: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    match input.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(vec![input.to_path_buf()]),
        Some("txt") => {
            let directory = input.parent().unwrap_or_else(|| Path::new(""));
            let listing = std::fs::read_to_string(input)?;
            Ok(listing
                .lines()
                .filter(|line| line.ends_with(".json"))
                .map(|line| directory.join(line))
                .filter(|path| {
                    let exists = path.exists();
                    if !exists {
                        warn!(path = %path.display(), "listed query file does not exist");
                    }
                    exists
                })
                .collect())
        }
        _ => Err(format!("unrecognized input file: {}", input.display()).into()),
    }
}

async fn run_query(
    proxy: &CachingProxy,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    info!(path = %path.display(), "running query file");
    let query_text = tokio::fs::read_to_string(path).await?;
    let source_file = path.file_name().and_then(|n| n.to_str());

    let started = Instant::now();
    let mut stream = proxy.exec_query_tagged(&query_text, source_file).await?;
    let mut count = 0usize;
    while let Some(item) = stream.next().await {
        item?;
        count += 1;
    }

    info!(
        documents = count,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "query finished"
    );
    Ok(())
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).with_target(false).init();
}
