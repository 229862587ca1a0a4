pub mod config;
pub mod error;
pub mod ingest;
pub mod embeddings;
pub mod store;
pub mod cache;
pub mod retrieval;
pub mod watch;

pub use config::Config;
pub use error::{DocindexError, Result};
pub use ingest::{Ingestor, RunOptions, RunStatistics};
pub use retrieval::{Answer, Retriever};
pub use store::VectorStore;
