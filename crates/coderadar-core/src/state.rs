use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-file breakdown retained alongside `FileMetadata` so `merge_stats` can
/// subtract a file's exact prior contribution without re-scanning it, keeping
/// the merge a pure function over explicit data rather than a re-derivation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileContribution {
    pub language: String,
    /// component type (as `ComponentType::as_str()`) -> count, for this file only.
    pub component_counts: HashMap<String, usize>,
    pub package_root: String,
    pub lines: usize,
}

/// One entry per tracked file in `IndexerState.files`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub path: String,
    pub hash: String,
    pub last_modified: DateTime<Utc>,
    pub last_indexed: DateTime<Utc>,
    pub document_ids: Vec<String>,
    pub size: u64,
    pub language: String,
    pub contribution: FileContribution,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LanguageStats {
    pub files: usize,
    pub components: usize,
    pub lines: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackageStats {
    pub name: String,
    pub path: String,
    pub files: usize,
    pub components: usize,
    pub languages: HashMap<String, usize>,
}

/// The aggregate counters produced by `StatsAggregator` and consumed/produced
/// by `merge_stats` (StatsMerger). Deliberately free of `total_files`/
/// `total_vectors`, which are context (current file set / store round-trip),
/// not something a pure aggregation over a document stream can know.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    pub by_language: HashMap<String, LanguageStats>,
    pub by_component_type: HashMap<String, usize>,
    pub by_package: HashMap<String, PackageStats>,
    pub total_documents: usize,
}

/// Full snapshot returned by `IndexerEngine::getStats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedStats {
    pub total_files: usize,
    pub total_documents: usize,
    pub total_vectors: usize,
    pub by_language: HashMap<String, LanguageStats>,
    pub by_component_type: HashMap<String, usize>,
    pub by_package: HashMap<String, PackageStats>,
    /// Set when `incremental_updates_since` exceeds the reindex threshold (10).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

pub const REINDEX_WARNING_THRESHOLD: u32 = 10;

/// Persistent root written to `<storage>/indexer-state.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerState {
    pub version: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub repository_path: String,
    pub last_index_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
    pub files: HashMap<String, FileMetadata>,
    pub stats: AggregateStats,
    #[serde(default)]
    pub total_vectors: usize,
    #[serde(default)]
    pub incremental_updates_since: u32,
}

/// Current schema version. A mismatch triggers a warning and a soft
/// full-reindex recommendation, not a hard rejection.
pub const CURRENT_STATE_VERSION: &str = "1";

impl IndexerState {
    pub fn empty(repository_path: impl Into<String>, embedding_model: impl Into<String>, embedding_dimension: usize) -> Self {
        Self {
            version: CURRENT_STATE_VERSION.to_string(),
            embedding_model: embedding_model.into(),
            embedding_dimension,
            repository_path: repository_path.into(),
            last_index_time: Utc::now(),
            last_update: None,
            files: HashMap::new(),
            stats: AggregateStats::default(),
            total_vectors: 0,
            incremental_updates_since: 0,
        }
    }

    /// Structural validation: a corrupt or nonsensical state is rejected
    /// wholesale rather than partially trusted, so callers can safely fall
    /// back to `IndexerState::empty`.
    pub fn validate(&self) -> Result<(), String> {
        if self.version.is_empty() {
            return Err("state version is empty".to_string());
        }
        if self.embedding_dimension == 0 {
            return Err("embedding dimension must be non-zero".to_string());
        }
        for (path, meta) in &self.files {
            if meta.path != *path {
                return Err(format!(
                    "file key {path} does not match FileMetadata.path {}",
                    meta.path
                ));
            }
        }
        Ok(())
    }

    pub fn needs_reindex_warning(&self) -> bool {
        self.incremental_updates_since > REINDEX_WARNING_THRESHOLD
    }
}
