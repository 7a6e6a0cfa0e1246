use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CoreError, Result};
use crate::state::FileMetadata;

/// Directories excluded from scanning by default.
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "dist",
    "coverage",
    "target",
    "build",
    ".venv",
    "venv",
    "__pycache__",
    ".idea",
    ".vscode",
];

/// File-name glob patterns excluded from scanning by default, regardless of
/// directory.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] =
    &["*.min.js", "*.min.css", "*.map", "*.lock", "*.log", "*.sqlite", "*.sqlite3"];

/// The three-way classification of the repository tree against prior state.
/// `unchanged` is implicit (everything else).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub deleted: Vec<String>,
}

impl ChangeSet {
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.changed.is_empty() || !self.deleted.is_empty()
    }

    pub fn total_changes(&self) -> usize {
        self.added.len() + self.changed.len() + self.deleted.len()
    }

    /// Files that must be (re)scanned to produce fresh documents: added and
    /// changed, not deleted.
    pub fn files_to_reindex(&self) -> Vec<String> {
        self.added.iter().chain(self.changed.iter()).cloned().collect()
    }
}

/// SHA-256 over the whole file, buffered in 8 KiB chunks so large files
/// don't balloon memory.
pub fn hash_file(path: &Path) -> Result<String> {
    use std::io::Read;

    let mut file = std::fs::File::open(path).map_err(|e| CoreError::Hashing {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf).map_err(|e| CoreError::Hashing {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn compile_patterns<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Vec<glob::Pattern> {
    patterns.into_iter().filter_map(|p| glob::Pattern::new(p).ok()).collect()
}

/// Classifies current files against prior state. Does not itself produce
/// `Document`s — that is the `Scanner` collaborator's job; this only
/// decides *which* files a caller should hand to the Scanner.
pub struct ChangeDetector {
    exclude_dirs: HashSet<String>,
    exclude_patterns: Vec<glob::Pattern>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self {
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect(),
            exclude_patterns: compile_patterns(DEFAULT_EXCLUDE_PATTERNS.iter().copied()),
        }
    }

    pub fn with_exclude_dirs(exclude_dirs: impl IntoIterator<Item = String>) -> Self {
        Self {
            exclude_dirs: exclude_dirs.into_iter().collect(),
            exclude_patterns: compile_patterns(DEFAULT_EXCLUDE_PATTERNS.iter().copied()),
        }
    }

    /// Adds extra file-name glob patterns (e.g. from config) on top of the
    /// defaults.
    pub fn with_extra_patterns(mut self, patterns: impl IntoIterator<Item = String>) -> Self {
        self.exclude_patterns.extend(compile_patterns(patterns.into_iter().collect::<Vec<_>>().iter().map(String::as_str)));
        self
    }

    /// Enumerate every file currently on disk under `repo_root`, following
    /// symlinks; `ignore`'s walker provides loop protection.
    fn enumerate_current_files(&self, repo_root: &Path) -> Result<Vec<String>> {
        let exclude_dirs = self.exclude_dirs.clone();
        let exclude_patterns = self.exclude_patterns.clone();
        let mut out = Vec::new();
        let walker = ignore::WalkBuilder::new(repo_root)
            .follow_links(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .filter_entry(move |entry| {
                match entry.file_name().to_str() {
                    Some(name) if exclude_dirs.contains(name) => return false,
                    Some(name) if exclude_patterns.iter().any(|p| p.matches(name)) => return false,
                    _ => {}
                }
                true
            })
            .build();

        for result in walker {
            let entry = result?;
            let Some(file_type) = entry.file_type() else { continue };
            if !file_type.is_file() {
                continue;
            }
            let relpath = entry
                .path()
                .strip_prefix(repo_root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            out.push(relpath);
        }
        Ok(out)
    }

    /// Full classification of the tree against `state_files`. `since`
    /// restricts hashing to files modified after the given time (mtime-only
    /// fast path).
    pub fn detect_changes(
        &self,
        repo_root: &Path,
        state_files: &HashMap<String, FileMetadata>,
        since: Option<DateTime<Utc>>,
    ) -> Result<ChangeSet> {
        let mut changed = Vec::new();
        let mut deleted = Vec::new();
        let mut to_hash = Vec::new();

        for (relpath, meta) in state_files {
            let full_path = repo_root.join(relpath);
            let stat = match std::fs::metadata(&full_path) {
                Ok(s) => s,
                Err(_) => {
                    deleted.push(relpath.clone());
                    continue;
                }
            };

            if let Some(since) = since {
                if let Ok(modified) = stat.modified() {
                    let modified: DateTime<Utc> = modified.into();
                    if modified <= since {
                        continue;
                    }
                }
            }

            to_hash.push((relpath.clone(), full_path, meta.hash.clone()));
        }

        tracing::debug!(candidates = to_hash.len(), "hashing candidate files in parallel");

        let hashed: Vec<(String, Result<String>, String)> = to_hash
            .par_iter()
            .map(|(relpath, full_path, prior_hash)| (relpath.clone(), hash_file(full_path), prior_hash.clone()))
            .collect();

        for (relpath, result, prior_hash) in hashed {
            match result {
                Ok(hash) => {
                    if hash != prior_hash {
                        changed.push(relpath);
                    }
                }
                Err(e) => {
                    tracing::debug!(%relpath, error = %e, "file unreadable during hashing, treating as deleted");
                    deleted.push(relpath);
                }
            }
        }

        let current_files = self.enumerate_current_files(repo_root)?;
        let current_set: HashSet<&String> = current_files.iter().collect();
        let mut added: Vec<String> = current_files
            .iter()
            .filter(|p| !state_files.contains_key(*p))
            .cloned()
            .collect();
        added.sort();
        added.dedup();

        // A path might appear both in `deleted` (stat failed transiently at
        // the start of this pass) and in `current_set` (it exists again by
        // the time we enumerate) — prefer "changed" in that race, matching
        // "classify deleted only if truly absent now".
        deleted.retain(|p| !current_set.contains(p));

        changed.sort();
        changed.dedup();
        deleted.sort();
        deleted.dedup();

        Ok(ChangeSet { added, changed, deleted })
    }
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::FileContribution;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, relpath: &str, contents: &str) {
        let full = dir.join(relpath);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let mut f = std::fs::File::create(full).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    fn metadata_for(hash: &str) -> FileMetadata {
        FileMetadata {
            path: "a.ts".to_string(),
            hash: hash.to_string(),
            last_modified: Utc::now(),
            last_indexed: Utc::now(),
            document_ids: vec!["a.ts:greet:1".to_string()],
            size: 0,
            language: "typescript".to_string(),
            contribution: FileContribution::default(),
        }
    }

    #[test]
    fn hash_file_matches_known_sha256() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "hello.txt", "hello world");
        let hash = hash_file(&dir.path().join("hello.txt")).unwrap();
        assert_eq!(hash, "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9");
    }

    #[test]
    fn detects_added_file() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.ts", "content");
        let detector = ChangeDetector::new();
        let changes = detector.detect_changes(dir.path(), &HashMap::new(), None).unwrap();
        assert_eq!(changes.added, vec!["a.ts".to_string()]);
        assert!(changes.changed.is_empty());
        assert!(changes.deleted.is_empty());
    }

    #[test]
    fn detects_changed_file() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.ts", "new content");
        let mut state_files = HashMap::new();
        state_files.insert("a.ts".to_string(), metadata_for("stale-hash"));
        let detector = ChangeDetector::new();
        let changes = detector.detect_changes(dir.path(), &state_files, None).unwrap();
        assert_eq!(changes.changed, vec!["a.ts".to_string()]);
        assert!(changes.added.is_empty());
    }

    #[test]
    fn detects_deleted_file() {
        let dir = TempDir::new().unwrap();
        let mut state_files = HashMap::new();
        state_files.insert("gone.ts".to_string(), metadata_for("whatever"));
        let detector = ChangeDetector::new();
        let changes = detector.detect_changes(dir.path(), &state_files, None).unwrap();
        assert_eq!(changes.deleted, vec!["gone.ts".to_string()]);
    }

    #[test]
    fn unchanged_file_produces_no_changes() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.ts", "content");
        let hash = hash_file(&dir.path().join("a.ts")).unwrap();
        let mut state_files = HashMap::new();
        state_files.insert("a.ts".to_string(), metadata_for(&hash));
        let detector = ChangeDetector::new();
        let changes = detector.detect_changes(dir.path(), &state_files, None).unwrap();
        assert!(!changes.has_changes());
    }

    #[test]
    fn excludes_default_dirs() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "node_modules/dep/index.js", "noise");
        write_file(dir.path(), "src/a.ts", "content");
        let detector = ChangeDetector::new();
        let changes = detector.detect_changes(dir.path(), &HashMap::new(), None).unwrap();
        assert_eq!(changes.added, vec!["src/a.ts".to_string()]);
    }

    #[test]
    fn excludes_default_file_patterns() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "dist.min.js", "noise");
        write_file(dir.path(), "src/a.ts", "content");
        let detector = ChangeDetector::new();
        let changes = detector.detect_changes(dir.path(), &HashMap::new(), None).unwrap();
        assert_eq!(changes.added, vec!["src/a.ts".to_string()]);
    }

    #[test]
    fn with_extra_patterns_excludes_additional_files() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "generated.pb.go", "noise");
        write_file(dir.path(), "src/a.ts", "content");
        let detector = ChangeDetector::new().with_extra_patterns(["*.pb.go".to_string()]);
        let changes = detector.detect_changes(dir.path(), &HashMap::new(), None).unwrap();
        assert_eq!(changes.added, vec!["src/a.ts".to_string()]);
    }
}
