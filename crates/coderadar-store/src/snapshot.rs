use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What triggered a `Snapshot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Index,
    Update,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Index => "index",
            Trigger::Update => "update",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "index" => Some(Trigger::Index),
            "update" => Some(Trigger::Update),
            _ => None,
        }
    }
}

/// Embedded run summary carried by a `Snapshot` and by the `index.updated`
/// event payload's `stats` field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IndexStats {
    pub files_scanned: usize,
    pub documents_indexed: usize,
    pub errors: usize,
    pub duration_ms: u64,
}

/// Append-only MetricsStore row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub repository_path: String,
    pub timestamp: DateTime<Utc>,
    pub trigger: Trigger,
    pub stats: IndexStats,
}

/// Per-file enrichment attached to a snapshot. Populated by a pluggable
/// `MetricsCollector` collaborator; failure to collect it is non-fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeMetadata {
    pub file_path: String,
    pub commit_count: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub author_count: u64,
    pub lines_of_code: u64,
    pub num_functions: u64,
    pub num_imports: u64,
}
