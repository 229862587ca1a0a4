use serde::{Deserialize, Serialize};

/// Which extractor family produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// One record per delimited row
    Tabular,
    /// One record per page
    Paginated,
    /// One record per file
    Flat,
}

/// One unit of embeddable content plus the metadata stored beside its vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub content: String,
    /// File name the record came from
    pub source: String,
    /// Corpus-relative path of that file
    pub path: String,
    pub parent_folder: String,
    /// Detected year; 0 means undetermined until enrichment
    pub year: i32,
    pub kind: RecordKind,
    /// Lowercased file extension
    pub format: String,
    /// 1-based page number for paginated sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}
