use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use docindex::embeddings::OpenAIEmbedder;
use docindex::{Config, Ingestor, RunOptions, VectorStore};

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Index the document corpus (incremental by default)")]
struct Args {
    /// Reprocess every supported file, ignoring the ledger
    #[arg(short, long)]
    force: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", "info")
    ).init();

    let args = Args::parse();

    log::info!("Starting docindex ingestion");

    let config = Config::load()?;
    log::info!("Corpus root: {}", config.corpus_root().display());
    log::info!("Database path: {}", config.db_path().display());
    log::info!("Ledger: {}", config.ingest.ledger_path.display());

    let store = VectorStore::open(config.db_path(), config.store.collection.clone()).await?;
    let embedder = Arc::new(OpenAIEmbedder::from_config(&config.embeddings)?);

    let stats = Ingestor::new(config.ingest.clone())
        .run(embedder, store, RunOptions { force: args.force })
        .await?;

    if stats.errored > 0 {
        log::warn!("{} file(s) failed and will be retried on the next run", stats.errored);
    }

    Ok(())
}
