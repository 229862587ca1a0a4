use std::sync::Arc;
use std::time::Instant;

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tokio::task;

use crate::config::IngestConfig;
use crate::embeddings::Embedder;
use crate::error::{DocindexError, Result};
use crate::ingest::{
    compute_fingerprint, discover_files, dispatch, enrich, BatchIndexer, ExtractOptions, ExtractorKind,
    Fingerprint, Ledger, Record, SourceFile,
};
use crate::store::VectorStore;

/// Counters for a single ingestion pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStatistics {
    /// Files found under the corpus root
    pub discovered: usize,
    /// Changed or new files that were extracted
    pub read: usize,
    /// Supported files whose fingerprint matched the ledger
    pub skipped: usize,
    /// Files with no extractor for their extension
    pub skipped_by_type: usize,
    /// Files that failed fingerprinting or extraction
    pub errored: usize,
    pub records_generated: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Reprocess every supported file regardless of the ledger
    pub force: bool,
}

/// What happened to one file on the worker side
enum FileOutcome {
    Unchanged,
    Extracted {
        fingerprint: Fingerprint,
        records: Vec<Record>,
    },
    Failed(DocindexError),
}

/// Drives one incremental pass over the corpus.
///
/// Fingerprinting and extraction run on the blocking pool, at most
/// `concurrency` files at a time. Results are consumed in discovery order by
/// a single loop that enriches records and feeds the [`BatchIndexer`].
pub struct Ingestor {
    config: IngestConfig,
    options: ExtractOptions,
}

impl Ingestor {
    pub fn new(config: IngestConfig) -> Self {
        let options = ExtractOptions::from_config(&config);
        Self { config, options }
    }

    pub async fn run(
        &self,
        embedder: Arc<dyn Embedder>,
        store: VectorStore,
        run_options: RunOptions,
    ) -> Result<RunStatistics> {
        let start = Instant::now();
        let root = &self.config.corpus_root;
        if !root.is_dir() {
            return Err(DocindexError::Config(format!(
                "corpus root {} is not a directory",
                root.display()
            )));
        }

        let discovery = discover_files(root);
        let ledger = Ledger::load(&self.config.ledger_path);
        log::info!(
            "Discovered {} file(s) under {}; ledger has {} entries",
            discovery.files.len(),
            root.display(),
            ledger.len()
        );
        if run_options.force {
            log::info!("Mode: full re-index (ignoring ledger)");
        }

        let mut stats = RunStatistics {
            discovered: discovery.files.len() + discovery.failures.len(),
            errored: discovery.failures.len(),
            ..Default::default()
        };
        for (path, e) in &discovery.failures {
            log::error!("✗ {}: {}", path, e);
        }

        let mut candidates = Vec::new();
        for file in discovery.files {
            match dispatch(&file.extension) {
                Some(kind) => {
                    let prior = if run_options.force {
                        None
                    } else {
                        ledger.get(&file.relative_path).cloned()
                    };
                    candidates.push((file, kind, prior));
                }
                None => {
                    log::debug!("Unsupported type, skipping: {}", file.relative_path);
                    stats.skipped_by_type += 1;
                }
            }
        }

        let mut indexer = BatchIndexer::new(embedder, store, ledger, self.config.flush_size);

        let mut outcomes = stream::iter(candidates)
            .map(|(file, kind, prior)| {
                let options = self.options.clone();
                task::spawn_blocking(move || {
                    let outcome = process_file(&file, kind, prior.as_ref(), &options);
                    (file, outcome)
                })
            })
            .buffered(self.config.concurrency.max(1));

        while let Some(joined) = outcomes.next().await {
            let (file, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    log::error!("✗ worker failed: {}", e);
                    stats.errored += 1;
                    continue;
                }
            };

            match outcome {
                FileOutcome::Unchanged => {
                    log::debug!("Unchanged: {}", file.relative_path);
                    stats.skipped += 1;
                }
                FileOutcome::Failed(e) if e.is_per_file() => {
                    log::error!("✗ {}: {}", file.relative_path, e);
                    stats.errored += 1;
                }
                FileOutcome::Failed(e) => return Err(e),
                FileOutcome::Extracted { fingerprint, records } => {
                    let records: Vec<Record> = records
                        .into_iter()
                        .map(|r| enrich(r, self.config.default_year))
                        .collect();

                    log::info!("✓ {} ({} record(s))", file.relative_path, records.len());
                    stats.read += 1;
                    stats.records_generated += records.len();

                    indexer.add(&file.relative_path, fingerprint, records).await?;
                }
            }
        }

        indexer.finish().await?;

        log::info!(
            "Ingestion complete in {:.2}s: discovered={} read={} skipped={} skipped_by_type={} errored={} records={}",
            start.elapsed().as_secs_f64(),
            stats.discovered,
            stats.read,
            stats.skipped,
            stats.skipped_by_type,
            stats.errored,
            stats.records_generated
        );

        Ok(stats)
    }
}

/// Fingerprint, compare against the ledger, extract. Runs on a blocking thread.
fn process_file(
    file: &SourceFile,
    kind: ExtractorKind,
    prior: Option<&Fingerprint>,
    options: &ExtractOptions,
) -> FileOutcome {
    let fingerprint = match compute_fingerprint(&file.absolute_path) {
        Ok(fp) => fp,
        Err(e) => return FileOutcome::Failed(e),
    };

    if prior == Some(&fingerprint) {
        return FileOutcome::Unchanged;
    }

    match kind.extractor().extract(file, options) {
        Ok(records) => FileOutcome::Extracted { fingerprint, records },
        Err(e) => FileOutcome::Failed(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::testing::FakeEmbedder;
    use crate::ingest::extractors::paginated::test_pdf::write_pdf;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        config: IngestConfig,
        db_path: std::path::PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let temp_dir = TempDir::new().unwrap();
            let corpus = temp_dir.path().join("dados");
            fs::create_dir_all(corpus.join("contas")).unwrap();
            let config = IngestConfig {
                corpus_root: corpus,
                ledger_path: temp_dir.path().join("controle_ingestao.json"),
                flush_size: 3,
                ..Default::default()
            };
            let db_path = temp_dir.path().join("db").join("index.db");
            Self {
                _temp_dir: temp_dir,
                config,
                db_path,
            }
        }

        fn write(&self, relative: &str, bytes: &[u8]) {
            let path = self.config.corpus_root.join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, bytes).unwrap();
        }

        fn path(&self, relative: &str) -> std::path::PathBuf {
            self.config.corpus_root.join(relative)
        }

        async fn store(&self) -> VectorStore {
            VectorStore::open(&self.db_path, "test").await.unwrap()
        }

        async fn run_with(&self, embedder: Arc<FakeEmbedder>, force: bool) -> Result<RunStatistics> {
            Ingestor::new(self.config.clone())
                .run(embedder, self.store().await, RunOptions { force })
                .await
        }

        async fn run(&self) -> RunStatistics {
            self.run_with(Arc::new(FakeEmbedder::new()), false).await.unwrap()
        }

        fn ledger(&self) -> Ledger {
            Ledger::load(&self.config.ledger_path)
        }
    }

    fn seed_mixed_corpus(fx: &Fixture) {
        fx.write(
            "contas/despesas.csv",
            "exercicio;orgao;valor\n2019;saude;10\n2020;educacao;20\n".as_bytes(),
        );
        fx.write("contas/nota.txt", "nota tecnica de 2016".as_bytes());
        fx.write("contas/planilha.xlsx", b"PK\x03\x04 not really");
        fs::create_dir_all(fx.path("relatorios")).unwrap();
        write_pdf(&fx.path("relatorios/relatorio.pdf"), &["Pagina um 2013", "Pagina dois"]);
    }

    #[tokio::test]
    async fn test_first_run_indexes_everything_supported() {
        let fx = Fixture::new();
        seed_mixed_corpus(&fx);

        let stats = fx.run().await;
        assert_eq!(
            stats,
            RunStatistics {
                discovered: 4,
                read: 3,
                skipped: 0,
                skipped_by_type: 1,
                errored: 0,
                records_generated: 5,
            }
        );

        assert_eq!(fx.store().await.count().await.unwrap(), 5);
        let ledger = fx.ledger();
        assert_eq!(ledger.len(), 3);
        assert!(ledger.get("contas/despesas.csv").is_some());
        assert!(ledger.get("relatorios/relatorio.pdf").is_some());
        assert!(ledger.get("contas/planilha.xlsx").is_none());
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let fx = Fixture::new();
        seed_mixed_corpus(&fx);

        fx.run().await;
        let ledger_before = fs::read_to_string(&fx.config.ledger_path).unwrap();
        let count_before = fx.store().await.count().await.unwrap();

        let embedder = Arc::new(FakeEmbedder::new());
        let stats = fx.run_with(embedder.clone(), false).await.unwrap();
        assert_eq!(stats.read, 0);
        assert_eq!(stats.skipped, 3);
        assert_eq!(stats.skipped_by_type, 1);
        assert_eq!(stats.records_generated, 0);
        assert_eq!(embedder.batches.load(std::sync::atomic::Ordering::SeqCst), 0);

        assert_eq!(fs::read_to_string(&fx.config.ledger_path).unwrap(), ledger_before);
        assert_eq!(fx.store().await.count().await.unwrap(), count_before);

        // and a third run reports the same thing again
        assert_eq!(fx.run().await, stats);
    }

    #[tokio::test]
    async fn test_one_byte_change_reprocesses_only_that_file() {
        let fx = Fixture::new();
        seed_mixed_corpus(&fx);
        fx.run().await;
        let old = fx.ledger().get("contas/nota.txt").cloned();

        fx.write("contas/nota.txt", "nota tecnica de 2017".as_bytes());
        let stats = fx.run().await;

        assert_eq!(stats.read, 1);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.records_generated, 1);
        let new = fx.ledger().get("contas/nota.txt").cloned();
        assert_ne!(old, new);
        assert_eq!(new, Some(compute_fingerprint(&fx.path("contas/nota.txt")).unwrap()));
    }

    #[tokio::test]
    async fn test_force_reprocesses_without_duplicating() {
        let fx = Fixture::new();
        seed_mixed_corpus(&fx);
        fx.run().await;

        let stats = fx.run_with(Arc::new(FakeEmbedder::new()), true).await.unwrap();
        assert_eq!(stats.read, 3);
        assert_eq!(stats.skipped, 0);
        assert_eq!(fx.store().await.count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_extraction_error_is_counted_and_retried() {
        let fx = Fixture::new();
        fx.write("contas/ok.txt", "conteudo valido".as_bytes());
        fx.write("contas/quebrado.txt", b"relat\xf3rio");
        fx.write("contas/falso.pdf", b"this is not a pdf");

        let stats = fx.run().await;
        assert_eq!(stats.read, 1);
        assert_eq!(stats.errored, 2);
        assert!(fx.ledger().get("contas/quebrado.txt").is_none());
        assert!(fx.ledger().get("contas/falso.pdf").is_none());

        // failed files are attempted again on the next run
        let stats = fx.run().await;
        assert_eq!(stats.errored, 2);
        assert_eq!(stats.skipped, 1);
    }

    #[tokio::test]
    async fn test_file_name_year_beats_column_year() {
        let fx = Fixture::new();
        fx.write(
            "contas/report_2021_q.csv",
            "exercicio;valor\n2019;10\n".as_bytes(),
        );
        fx.write("contas/sem_ano.txt", "texto sem ano".as_bytes());
        fx.run().await;

        let store = fx.store().await;
        let embedder = FakeEmbedder::new();

        let hits = store.query(&embedder.vectorize("valor 10 exercicio 2019"), 1).await.unwrap();
        assert_eq!(hits[0].record.source, "report_2021_q.csv");
        assert_eq!(hits[0].record.year, 2021);

        let hits = store.query(&embedder.vectorize("texto sem ano"), 1).await.unwrap();
        assert_eq!(hits[0].record.source, "sem_ano.txt");
        assert_eq!(hits[0].record.year, 2024);
    }

    #[tokio::test]
    async fn test_backend_failure_then_recovery() {
        let fx = Fixture::new();
        seed_mixed_corpus(&fx);

        let err = fx.run_with(Arc::new(FakeEmbedder::failing()), false).await.unwrap_err();
        assert!(matches!(err, DocindexError::IndexBackend { .. }));
        assert!(fx.ledger().is_empty());

        let stats = fx.run().await;
        assert_eq!(stats.read, 3);
        assert_eq!(fx.ledger().len(), 3);
        assert_eq!(fx.store().await.count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_crash_before_ledger_write_reprocesses_without_duplicates() {
        let mut fx = Fixture::new();
        seed_mixed_corpus(&fx);
        let ledger_dir = fx.config.ledger_path.parent().unwrap().join("estado");
        fx.config.ledger_path = ledger_dir.join("controle_ingestao.json");

        // vectors get committed, the ledger write fails
        let err = fx.run_with(Arc::new(FakeEmbedder::new()), false).await.unwrap_err();
        assert!(matches!(err, DocindexError::IndexBackend { .. }));
        let committed = fx.store().await.count().await.unwrap();
        assert!(committed > 0);

        fs::create_dir_all(&ledger_dir).unwrap();
        let stats = fx.run().await;
        assert_eq!(stats.read, 3);
        assert_eq!(fx.store().await.count().await.unwrap(), 5);
        assert_eq!(fx.ledger().len(), 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unwalkable_entries_count_as_errors_and_run_continues() {
        use std::os::unix::fs::symlink;

        let fx = Fixture::new();
        fx.write("contas/nota.txt", "nota tecnica".as_bytes());
        symlink(fx.path("contas/removido.csv"), fx.path("contas/orfao.csv")).unwrap();

        let stats = fx.run().await;
        assert_eq!(stats.discovered, 2);
        assert_eq!(stats.read, 1);
        assert_eq!(stats.errored, 1);
        assert!(fx.ledger().get("contas/nota.txt").is_some());
        assert!(fx.ledger().get("contas/orfao.csv").is_none());
    }

    /// Keeps the prompt it was given and answers with a fixed string
    struct CannedGenerator {
        prompts: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl crate::retrieval::Generator for CannedGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("resposta".to_string())
        }
    }

    #[tokio::test]
    async fn test_ingested_corpus_answers_from_its_sources() {
        use crate::retrieval::Retriever;

        let fx = Fixture::new();
        seed_mixed_corpus(&fx);
        fx.write(
            "obras/pavimentacao.txt",
            "obras de pavimentacao quilombola na zona norte em 2022".as_bytes(),
        );

        let embedder = Arc::new(FakeEmbedder::new());
        let stats = fx.run_with(embedder.clone(), false).await.unwrap();
        assert_eq!(stats.read, 4);
        assert_eq!(stats.errored, 0);

        let generator = Arc::new(CannedGenerator {
            prompts: std::sync::Mutex::new(Vec::new()),
        });
        let retriever = Retriever::new(embedder, fx.store().await, generator.clone(), 4);

        let answer = retriever.answer("quilombola").await.unwrap();
        assert_eq!(answer.answer, "resposta");
        assert!(answer.sources.contains("pavimentacao.txt"));
        assert!(answer.sources.len() <= 4);

        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("zona norte"));

        // the year enricher ran on the way in
        let hits = retriever.retrieve("quilombola", Some(2022)).await.unwrap();
        assert!(hits.iter().any(|h| h.record.source == "pavimentacao.txt"));
    }

    #[tokio::test]
    async fn test_missing_corpus_root_is_config_error() {
        let mut fx = Fixture::new();
        fx.config.corpus_root = Path::new("/definitely/not/here").to_path_buf();
        let err = fx.run_with(Arc::new(FakeEmbedder::new()), false).await.unwrap_err();
        assert!(matches!(err, DocindexError::Config(_)));
    }
}
