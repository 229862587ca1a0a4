//! Watch the corpus root and rerun incremental ingestion on changes.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use docindex::embeddings::OpenAIEmbedder;
use docindex::watch::run_watcher;
use docindex::{Config, Ingestor, VectorStore};

#[derive(Parser, Debug)]
#[command(name = "watch")]
#[command(about = "Watch the corpus for changes and re-index automatically")]
struct Args {
    /// Quiet period in milliseconds before a change triggers a pass
    #[arg(long, default_value = "500")]
    debounce_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", "info"),
    )
    .init();

    let args = Args::parse();

    log::info!("Starting docindex watcher");
    let config = Config::load()?;
    log::info!("Corpus root: {}", config.corpus_root().display());
    log::info!("Debounce: {} ms", args.debounce_ms);

    let store = VectorStore::open(config.db_path(), config.store.collection.clone()).await?;
    let embedder = Arc::new(OpenAIEmbedder::from_config(&config.embeddings)?);
    let root = config.corpus_root().to_path_buf();

    log::info!("Watching for changes (Ctrl+C to stop)");
    run_watcher(Ingestor::new(config.ingest.clone()), embedder, store, root, args.debounce_ms).await?;
    Ok(())
}
