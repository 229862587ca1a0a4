pub mod walker;
pub mod fingerprint;
pub mod ledger;
pub mod record;
pub mod metadata;
pub mod extractors;
pub mod indexer;
pub mod orchestrator;

pub use walker::{Discovery, SourceFile, discover_files};
pub use fingerprint::{Fingerprint, compute_fingerprint};
pub use ledger::Ledger;
pub use record::{Record, RecordKind};
pub use metadata::{YearDetector, enrich};
pub use extractors::{ExtractOptions, Extractor, ExtractorKind, dispatch};
pub use indexer::BatchIndexer;
pub use orchestrator::{Ingestor, RunOptions, RunStatistics};
