use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use docindex::embeddings::OpenAIEmbedder;
use docindex::retrieval::ChatClient;
use docindex::{Config, Retriever, VectorStore};

#[derive(Parser, Debug)]
#[command(name = "ask")]
#[command(about = "Answer a question from the indexed documents")]
struct Args {
    /// Question to answer
    query: String,

    /// Only consider records labelled with this year
    #[arg(short, long)]
    year: Option<i32>,

    /// Print the answer as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", "warn")
    ).init();

    let args = Args::parse();
    let config = Config::load()?;

    let store = VectorStore::open(config.db_path(), config.store.collection.clone()).await?;
    let embedder = Arc::new(OpenAIEmbedder::from_config(&config.embeddings)?);
    let generator = Arc::new(ChatClient::from_config(&config.retrieval)?);
    let retriever = Retriever::new(embedder, store, generator, config.retrieval.k);

    let answer = retriever.answer_filtered(&args.query, args.year).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        println!("{}", answer.answer);
        if !answer.sources.is_empty() {
            println!();
            println!("Sources:");
            for source in &answer.sources {
                println!("  - {}", source);
            }
        }
    }

    Ok(())
}
