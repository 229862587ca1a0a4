//! Query side: nearest-neighbour lookup plus one grounded generation call.

pub mod chat;
pub mod prompt;

pub use chat::{ChatClient, Generator};

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;

use crate::embeddings::Embedder;
use crate::error::Result;
use crate::store::{ScoredRecord, VectorStore};

/// An answer with the file names it was grounded on
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: BTreeSet<String>,
}

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: VectorStore,
    generator: Arc<dyn Generator>,
    k: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: VectorStore, generator: Arc<dyn Generator>, k: usize) -> Self {
        Self {
            embedder,
            store,
            generator,
            k,
        }
    }

    /// Top-k records for `query`, optionally limited to one year.
    pub async fn retrieve(&self, query: &str, year: Option<i32>) -> Result<Vec<ScoredRecord>> {
        let embedding = self.embedder.embed_query(query).await?;
        self.store.query_filtered(&embedding, self.k, year).await
    }

    pub async fn answer(&self, query: &str) -> Result<Answer> {
        self.answer_filtered(query, None).await
    }

    /// Retrieve, build the prompt, ask the generator once.
    ///
    /// An empty store still reaches the generator with an empty context, which
    /// the template instructs to reply "No data".
    pub async fn answer_filtered(&self, query: &str, year: Option<i32>) -> Result<Answer> {
        let hits = self.retrieve(query, year).await?;
        log::debug!("Retrieved {} record(s) for query", hits.len());

        let context = prompt::build_context(&hits);
        let answer = self
            .generator
            .generate(&prompt::build_prompt(query, &context))
            .await?;

        Ok(Answer {
            answer,
            sources: hits.into_iter().map(|h| h.record.source).collect(),
        })
    }
}
