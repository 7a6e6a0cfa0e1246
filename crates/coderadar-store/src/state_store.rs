use std::path::{Path, PathBuf};

use coderadar_core::{IndexerState, CURRENT_STATE_VERSION};

use crate::error::Result;

/// Outcome of a `StateStore::load`. Both `Missing` and `Rejected` are a
/// silent miss as far as the engine is concerned — a corrupt state file is
/// reported and treated as empty — but kept distinct here so callers can
/// log the right message.
#[derive(Debug)]
pub enum LoadOutcome {
    Missing,
    Loaded(Box<IndexerState>),
    Rejected { reason: String },
}

/// Result of comparing loaded state against the engine's configured
/// embedding model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    Compatible,
    /// Soft mismatch: `state.version != current`. Engine may continue but
    /// should consider a full re-index.
    VersionMismatch,
    /// Hard mismatch: `(model, dim)` differ from engine config. Forces a
    /// full re-index (state is discarded).
    EmbeddingMismatch,
}

pub fn check_compatibility(state: &IndexerState, expected_model: &str, expected_dim: usize) -> Compatibility {
    if state.embedding_model != expected_model || state.embedding_dimension != expected_dim {
        return Compatibility::EmbeddingMismatch;
    }
    if state.version != CURRENT_STATE_VERSION {
        return Compatibility::VersionMismatch;
    }
    Compatibility::Compatible
}

/// Loads/saves/validates the persisted `IndexerState`. Single writer is
/// assumed by the caller (the engine holds the concurrency lock); this
/// type does no locking of its own.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<LoadOutcome> {
        if !self.path.exists() {
            return Ok(LoadOutcome::Missing);
        }
        let bytes = std::fs::read(&self.path)?;
        let state: IndexerState = match serde_json::from_slice(&bytes) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "state file failed to parse, treating as empty");
                return Ok(LoadOutcome::Rejected { reason: e.to_string() });
            }
        };
        if let Err(reason) = state.validate() {
            tracing::warn!(path = %self.path.display(), %reason, "state file failed structural validation, treating as empty");
            return Ok(LoadOutcome::Rejected { reason });
        }
        Ok(LoadOutcome::Loaded(Box::new(state)))
    }

    /// Convenience for the common case: missing or rejected state both
    /// collapse to a fresh empty state.
    pub fn load_or_empty(&self, repository_path: &str, embedding_model: &str, embedding_dimension: usize) -> Result<IndexerState> {
        match self.load()? {
            LoadOutcome::Loaded(state) => Ok(*state),
            LoadOutcome::Missing | LoadOutcome::Rejected { .. } => {
                Ok(IndexerState::empty(repository_path, embedding_model, embedding_dimension))
            }
        }
    }

    /// Serializes atomically: write to a sibling temp file, then rename,
    /// so the state file is never partially observable.
    pub fn save(&self, state: &IndexerState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = self.tmp_path();
        let bytes = serde_json::to_vec_pretty(state)?;
        std::fs::write(&tmp_path, &bytes)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| format!("{}.tmp", n.to_string_lossy()))
            .unwrap_or_else(|| "indexer-state.json.tmp".to_string());
        self.path.with_file_name(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_missing_is_missing_not_an_error() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("indexer-state.json"));
        assert!(matches!(store.load().unwrap(), LoadOutcome::Missing));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("indexer-state.json"));
        let state = IndexerState::empty("/repo", "hash-projection-256", 256);
        store.save(&state).unwrap();

        match store.load().unwrap() {
            LoadOutcome::Loaded(loaded) => {
                assert_eq!(loaded.repository_path, "/repo");
                assert_eq!(loaded.embedding_dimension, 256);
            }
            other => panic!("expected Loaded, got {other:?}"),
        }
    }

    #[test]
    fn corrupt_state_is_rejected_not_propagated_as_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("indexer-state.json");
        std::fs::write(&path, b"{not valid json").unwrap();
        let store = StateStore::new(path);
        assert!(matches!(store.load().unwrap(), LoadOutcome::Rejected { .. }));
    }

    #[test]
    fn load_or_empty_falls_back_on_corrupt_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("indexer-state.json");
        std::fs::write(&path, b"{not valid json").unwrap();
        let store = StateStore::new(path);
        let state = store.load_or_empty("/repo", "model", 128).unwrap();
        assert!(state.files.is_empty());
    }

    #[test]
    fn save_does_not_leave_tmp_file_behind() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("indexer-state.json"));
        store.save(&IndexerState::empty("/repo", "model", 128)).unwrap();
        assert!(!dir.path().join("indexer-state.json.tmp").exists());
    }

    #[test]
    fn embedding_mismatch_forces_full_reindex() {
        let state = IndexerState::empty("/repo", "model-a", 768);
        assert_eq!(check_compatibility(&state, "model-a", 384), Compatibility::EmbeddingMismatch);
    }

    #[test]
    fn version_mismatch_is_soft() {
        let mut state = IndexerState::empty("/repo", "model-a", 768);
        state.version = "0".to_string();
        assert_eq!(check_compatibility(&state, "model-a", 768), Compatibility::VersionMismatch);
    }

    #[test]
    fn matching_state_is_compatible() {
        let state = IndexerState::empty("/repo", "model-a", 768);
        assert_eq!(check_compatibility(&state, "model-a", 768), Compatibility::Compatible);
    }
}
