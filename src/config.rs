use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ingest: IngestConfig,
    pub store: StoreConfig,
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// Ingestion pass settings.
///
/// `max_rows_per_file` and `max_pages_per_file` are sampling caps: a tabular
/// file never yields more than `max_rows_per_file` records and a paginated
/// file never more than `max_pages_per_file`.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_corpus_root")]
    pub corpus_root: PathBuf,
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
    #[serde(default = "default_flush_size")]
    pub flush_size: usize,
    #[serde(default = "default_max_rows")]
    pub max_rows_per_file: usize,
    #[serde(default = "default_max_pages")]
    pub max_pages_per_file: usize,
    #[serde(default = "default_content_year_window")]
    pub content_year_window: usize,
    #[serde(default = "default_csv_delimiter")]
    pub csv_delimiter: String,
    #[serde(default = "default_year")]
    pub default_year: i32,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            corpus_root: default_corpus_root(),
            ledger_path: default_ledger_path(),
            flush_size: default_flush_size(),
            max_rows_per_file: default_max_rows(),
            max_pages_per_file: default_max_pages(),
            content_year_window: default_content_year_window(),
            csv_delimiter: default_csv_delimiter(),
            default_year: default_year(),
            concurrency: default_concurrency(),
        }
    }
}

impl IngestConfig {
    /// Delimiter as the single byte the csv reader expects.
    pub fn delimiter_byte(&self) -> u8 {
        self.csv_delimiter.as_bytes().first().copied().unwrap_or(b';')
    }
}

fn default_corpus_root() -> PathBuf {
    PathBuf::from("./dados")
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("controle_ingestao.json")
}

fn default_flush_size() -> usize {
    500
}

fn default_max_rows() -> usize {
    10
}

fn default_max_pages() -> usize {
    5
}

fn default_content_year_window() -> usize {
    1000
}

fn default_csv_delimiter() -> String {
    ";".to_string()
}

fn default_year() -> i32 {
    2024
}

fn default_concurrency() -> usize {
    4
}

/// Vector store location
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_collection() -> String {
    "langchain".to_string()
}

/// Embeddings configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    #[serde(default = "default_embeddings_base_url")]
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub batch_size: usize,
    pub dimensions: usize,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_embeddings_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_cache_capacity() -> usize {
    1000
}

/// Retrieval + answer generation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_chat_base_url")]
    pub base_url: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_chat_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub temperature: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            base_url: default_chat_base_url(),
            model: default_chat_model(),
            api_key_env: default_chat_api_key_env(),
            temperature: 0.0,
        }
    }
}

fn default_k() -> usize {
    4
}

fn default_chat_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_chat_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

fn default_chat_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in DOCINDEX_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("DOCINDEX_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str).context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        let root = &self.ingest.corpus_root;
        if !root.exists() {
            anyhow::bail!(
                "corpus_root path does not exist: {}. Set ingest.corpus_root in config.toml.",
                root.display()
            );
        }

        if !root.is_dir() {
            anyhow::bail!("corpus_root must be a directory, not a file: {}", root.display());
        }

        std::env::var(&self.embeddings.api_key_env).with_context(|| {
            format!(
                "Environment variable {} not set. Set it in your .env file or as an environment variable.",
                self.embeddings.api_key_env
            )
        })?;

        if self.ingest.flush_size == 0 {
            anyhow::bail!("ingest.flush_size must be greater than 0");
        }

        if self.ingest.max_rows_per_file == 0 || self.ingest.max_pages_per_file == 0 {
            anyhow::bail!("ingest.max_rows_per_file and ingest.max_pages_per_file must be greater than 0");
        }

        if self.ingest.concurrency == 0 {
            anyhow::bail!("ingest.concurrency must be greater than 0");
        }

        if self.ingest.csv_delimiter.len() != 1 || !self.ingest.csv_delimiter.is_ascii() {
            anyhow::bail!(
                "ingest.csv_delimiter must be a single ASCII character, got {:?}",
                self.ingest.csv_delimiter
            );
        }

        if self.embeddings.dimensions == 0 || self.embeddings.batch_size == 0 {
            anyhow::bail!("embeddings.dimensions and embeddings.batch_size must be greater than 0");
        }

        if self.retrieval.k == 0 {
            anyhow::bail!("retrieval.k must be greater than 0");
        }

        Ok(())
    }

    /// Get vector store database path
    pub fn db_path(&self) -> &Path {
        &self.store.db_path
    }

    /// Get the corpus root
    pub fn corpus_root(&self) -> &Path {
        &self.ingest.corpus_root
    }
}
