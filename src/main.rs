use anyhow::Result;
use docindex::ingest::Ledger;
use docindex::{Config, VectorStore};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", "info")
    ).init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("verify");

    match command {
        "sources" => list_sources().await?,
        _ => verify().await?,
    }

    Ok(())
}

/// Open the store (creating or migrating it) and report what is indexed
async fn verify() -> Result<()> {
    log::info!("Starting docindex v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    log::info!("Corpus root: {}", config.corpus_root().display());
    log::info!("Database path: {}", config.db_path().display());
    log::info!("Embedding model: {} ({} dims)", config.embeddings.model, config.embeddings.dimensions);

    let store = VectorStore::open(config.db_path(), config.store.collection.clone()).await?;
    let vectors = store.count().await?;
    let ledger = Ledger::load(&config.ingest.ledger_path);

    log::info!("Collection '{}': {} vector(s)", store.collection(), vectors);
    log::info!("Ledger {}: {} file(s) seen", ledger.path().display(), ledger.len());

    if vectors == 0 && !ledger.is_empty() {
        log::warn!("Ledger lists files but the collection is empty; run `ingest --force` to rebuild");
    }

    Ok(())
}

async fn list_sources() -> Result<()> {
    let config = Config::load()?;
    let store = VectorStore::open(config.db_path(), config.store.collection.clone()).await?;
    for source in store.sources().await? {
        println!("{}", source);
    }
    Ok(())
}
