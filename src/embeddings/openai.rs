use crate::cache::EmbeddingCache;
use crate::config::EmbeddingsConfig;
use crate::embeddings::Embedder;
use crate::error::{DocindexError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Request structure for OpenAI-compatible embeddings API
#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

/// Response structure from the embeddings API
#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

/// Individual embedding data in API response
#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Client for any OpenAI-compatible `/embeddings` endpoint
///
/// Splits document batches to respect the provider limit and retries query
/// embeddings on rate limits and server errors. Query embeddings can be
/// served from an LRU cache.
pub struct OpenAIEmbedder {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    batch_size: usize,
    dimensions: usize,
    cache: Option<Arc<EmbeddingCache>>,
}

impl OpenAIEmbedder {
    /// Create a new embedder
    ///
    /// # Arguments
    ///
    /// * `base_url` - API root, e.g. `https://api.openai.com/v1`
    /// * `api_key` - Bearer token
    /// * `model` - Model name (e.g., "text-embedding-3-small")
    /// * `batch_size` - Maximum number of texts to send per API request (max 2048)
    /// * `dimensions` - Expected vector length, checked on every response
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
        batch_size: usize,
        dimensions: usize,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DocindexError::Embedding(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            batch_size: batch_size.clamp(1, 2048),
            dimensions,
            cache: None,
        })
    }

    /// Build from the `[embeddings]` config section, reading the key from the environment.
    pub fn from_config(config: &EmbeddingsConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            DocindexError::Config(format!(
                "Environment variable {} not set. Set it in your .env file or as an environment variable.",
                config.api_key_env
            ))
        })?;

        let cache = if config.cache_capacity > 0 {
            Some(Arc::new(EmbeddingCache::new(config.cache_capacity)))
        } else {
            None
        };

        Ok(Self::new(
            config.base_url.clone(),
            api_key,
            config.model.clone(),
            config.batch_size,
            config.dimensions,
        )?
        .with_cache(cache))
    }

    /// Attach a query-embedding cache
    pub fn with_cache(mut self, cache: Option<Arc<EmbeddingCache>>) -> Self {
        self.cache = cache;
        self
    }

    /// Internal method to make a single API request
    async fn embed_batch_internal(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let expected = texts.len();
        let request = EmbeddingRequest {
            model: self.model.clone(),
            input: texts,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| DocindexError::Embedding(format!("Network error: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(DocindexError::Embedding(format!(
                "API error {}: {}",
                status, body
            )));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| DocindexError::Embedding(format!("Failed to parse response: {}", e)))?;

        let embeddings: Vec<Vec<f32>> = result.data.into_iter().map(|d| d.embedding).collect();
        self.check_shape(expected, &embeddings)?;
        Ok(embeddings)
    }

    fn check_shape(&self, expected: usize, embeddings: &[Vec<f32>]) -> Result<()> {
        if embeddings.len() != expected {
            return Err(DocindexError::Embedding(format!(
                "Expected {} embeddings, got {}",
                expected,
                embeddings.len()
            )));
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimensions) {
            return Err(DocindexError::Embedding(format!(
                "Unexpected embedding dimension: expected {}, got {}",
                self.dimensions,
                bad.len()
            )));
        }
        Ok(())
    }

    /// Embed a single text with retry logic (no caching)
    async fn embed_with_retry(&self, text: &str, max_retries: usize) -> Result<Vec<f32>> {
        let start = std::time::Instant::now();
        let mut attempt = 0;
        let mut delay = Duration::from_secs(1);

        loop {
            match self.embed_batch_internal(vec![text.to_string()]).await {
                Ok(mut embeddings) => {
                    log::debug!("Embedding API call took {:?} (attempt {})", start.elapsed(), attempt + 1);
                    return Ok(embeddings.remove(0));
                }
                Err(e) if attempt < max_retries && is_retryable(&e) => {
                    log::warn!("Retry {}/{} after error: {}", attempt + 1, max_retries, e);
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// 429 rate limits and 5xx server errors are worth another attempt.
/// Only the status code that follows "API error " is considered, never the body.
fn is_retryable(e: &DocindexError) -> bool {
    let msg = e.to_string();
    let status = msg
        .split_once("API error ")
        .and_then(|(_, rest)| rest.get(..3))
        .and_then(|code| code.parse::<u16>().ok());
    matches!(status, Some(429) | Some(500..=599))
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(self.batch_size) {
            let embeddings = self.embed_batch_internal(chunk.to_vec()).await?;
            all_embeddings.extend(embeddings);

            // small delay between full batches to stay under rate limits
            if chunk.len() == self.batch_size {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }

        Ok(all_embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(text) {
                log::debug!("Cache hit for query: {}", text);
                return Ok(cached);
            }
        }

        let embedding = self.embed_with_retry(text, 3).await?;

        if let Some(cache) = &self.cache {
            cache.put(text.to_string(), embedding.clone());
        }

        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder(batch_size: usize) -> OpenAIEmbedder {
        OpenAIEmbedder::new(
            "https://api.openai.com/v1/".to_string(),
            "test-key".to_string(),
            "text-embedding-3-small".to_string(),
            batch_size,
            3,
        )
        .unwrap()
    }

    #[test]
    fn test_embedder_new() {
        let embedder = embedder(100);
        assert_eq!(embedder.model, "text-embedding-3-small");
        assert_eq!(embedder.batch_size, 100);
        assert_eq!(embedder.base_url, "https://api.openai.com/v1");
        assert_eq!(embedder.dimensions(), 3);
    }

    #[test]
    fn test_embedder_batch_size_limit() {
        assert_eq!(embedder(5000).batch_size, 2048);
        assert_eq!(embedder(2048).batch_size, 2048);
        assert_eq!(embedder(0).batch_size, 1);
    }

    #[test]
    fn test_check_shape() {
        let embedder = embedder(10);
        assert!(embedder.check_shape(1, &[vec![0.0, 1.0, 2.0]]).is_ok());
        assert!(embedder.check_shape(2, &[vec![0.0, 1.0, 2.0]]).is_err());
        assert!(embedder.check_shape(1, &[vec![0.0, 1.0]]).is_err());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(is_retryable(&DocindexError::Embedding("API error 429 Too Many Requests: slow down".into())));
        assert!(is_retryable(&DocindexError::Embedding("API error 503 Service Unavailable: x".into())));
        assert!(!is_retryable(&DocindexError::Embedding("API error 401 Unauthorized: bad key".into())));
        assert!(!is_retryable(&DocindexError::Embedding(
            "API error 401 Unauthorized: quota 1500 of 429 used, see 503".into()
        )));
        assert!(!is_retryable(&DocindexError::Embedding("connection reset after 500ms".into())));
    }

    #[tokio::test]
    async fn test_cached_query_skips_network() {
        let cache = Arc::new(EmbeddingCache::new(4));
        cache.put("contas 2021".to_string(), vec![1.0, 2.0, 3.0]);
        let embedder = embedder(10).with_cache(Some(cache));

        let v = embedder.embed_query("contas 2021").await.unwrap();
        assert_eq!(v, vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn test_empty_batch_skips_network() {
        let v = embedder(10).embed_batch(Vec::new()).await.unwrap();
        assert!(v.is_empty());
    }
}
