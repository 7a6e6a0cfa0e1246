use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::error::Result;
use crate::snapshot::{CodeMetadata, IndexStats, Snapshot, Trigger};

/// Query for `getSnapshots`.
#[derive(Debug, Default, Clone)]
pub struct SnapshotQuery {
    pub repository_path: Option<String>,
    pub limit: Option<usize>,
}

/// Append-only log of index/update runs plus per-file `CodeMetadata`,
/// backed by SQLite via bundled `rusqlite`. Any error from this store is
/// meant to be logged and swallowed by the caller (IndexerEngine), never
/// surfaced as an index failure — that policy lives at the call site, not
/// here, since this type still needs to report errors truthfully to
/// whoever catches them.
pub struct MetricsStore {
    conn: Mutex<Option<Connection>>,
}

impl MetricsStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::migrate(&conn)?;
        Ok(Self { conn: Mutex::new(Some(conn)) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::migrate(&conn)?;
        Ok(Self { conn: Mutex::new(Some(conn)) })
    }

    fn migrate(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS snapshots (
                id TEXT PRIMARY KEY,
                repository_path TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                trigger TEXT NOT NULL,
                files_scanned INTEGER NOT NULL,
                documents_indexed INTEGER NOT NULL,
                errors INTEGER NOT NULL,
                duration_ms INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_snapshots_repo_ts ON snapshots(repository_path, timestamp DESC);

            CREATE TABLE IF NOT EXISTS code_metadata (
                snapshot_id TEXT NOT NULL,
                file_path TEXT NOT NULL,
                commit_count INTEGER NOT NULL,
                last_modified TEXT,
                author_count INTEGER NOT NULL,
                lines_of_code INTEGER NOT NULL,
                num_functions INTEGER NOT NULL,
                num_imports INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_code_metadata_snapshot ON code_metadata(snapshot_id);
            ",
        )?;
        Ok(())
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(crate::error::StoreError::CorruptState {
                reason: "metrics store is closed".to_string(),
            }),
        }
    }

    pub fn record_snapshot(&self, repository_path: &str, trigger: Trigger, stats: IndexStats) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO snapshots (id, repository_path, timestamp, trigger, files_scanned, documents_indexed, errors, duration_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id,
                    repository_path,
                    now.to_rfc3339(),
                    trigger.as_str(),
                    stats.files_scanned as i64,
                    stats.documents_indexed as i64,
                    stats.errors as i64,
                    stats.duration_ms as i64,
                ],
            )?;
            Ok(())
        })?;
        Ok(id)
    }

    pub fn append_code_metadata(&self, snapshot_id: &str, entries: &[CodeMetadata]) -> Result<()> {
        self.with_conn(|conn| {
            for entry in entries {
                conn.execute(
                    "INSERT INTO code_metadata (snapshot_id, file_path, commit_count, last_modified, author_count, lines_of_code, num_functions, num_imports)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        snapshot_id,
                        entry.file_path,
                        entry.commit_count as i64,
                        entry.last_modified.map(|t| t.to_rfc3339()),
                        entry.author_count as i64,
                        entry.lines_of_code as i64,
                        entry.num_functions as i64,
                        entry.num_imports as i64,
                    ],
                )?;
            }
            Ok(())
        })
    }

    pub fn get_latest_snapshot(&self, repository_path: &str) -> Result<Option<Snapshot>> {
        let snapshots = self.get_snapshots(&SnapshotQuery {
            repository_path: Some(repository_path.to_string()),
            limit: Some(1),
        })?;
        Ok(snapshots.into_iter().next())
    }

    pub fn get_snapshots(&self, query: &SnapshotQuery) -> Result<Vec<Snapshot>> {
        self.with_conn(|conn| {
            let limit = query.limit.unwrap_or(usize::MAX) as i64;
            let mut rows = Vec::new();
            let mut collect = |repo: Option<&str>| -> Result<()> {
                let sql = if repo.is_some() {
                    "SELECT id, repository_path, timestamp, trigger, files_scanned, documents_indexed, errors, duration_ms
                     FROM snapshots WHERE repository_path = ?1 ORDER BY timestamp DESC LIMIT ?2"
                } else {
                    "SELECT id, repository_path, timestamp, trigger, files_scanned, documents_indexed, errors, duration_ms
                     FROM snapshots ORDER BY timestamp DESC LIMIT ?1"
                };
                let mut stmt = conn.prepare(sql)?;
                let mapper = |row: &rusqlite::Row| -> rusqlite::Result<Snapshot> {
                    let timestamp: String = row.get(2)?;
                    let trigger: String = row.get(3)?;
                    Ok(Snapshot {
                        id: row.get(0)?,
                        repository_path: row.get(1)?,
                        timestamp: DateTime::parse_from_rfc3339(&timestamp)
                            .map(|t| t.with_timezone(&Utc))
                            .unwrap_or_else(|_| Utc::now()),
                        trigger: Trigger::parse(&trigger).unwrap_or(Trigger::Index),
                        stats: IndexStats {
                            files_scanned: row.get::<_, i64>(4)? as usize,
                            documents_indexed: row.get::<_, i64>(5)? as usize,
                            errors: row.get::<_, i64>(6)? as usize,
                            duration_ms: row.get::<_, i64>(7)? as u64,
                        },
                    })
                };
                let iter = if let Some(repo) = repo {
                    stmt.query_map(params![repo, limit], mapper)?
                } else {
                    stmt.query_map(params![limit], mapper)?
                };
                for row in iter {
                    rows.push(row?);
                }
                Ok(())
            };
            collect(query.repository_path.as_deref())?;
            Ok(rows)
        })
    }

    pub fn get_code_metadata(&self, snapshot_id: &str, limit: Option<usize>) -> Result<Vec<CodeMetadata>> {
        self.with_conn(|conn| {
            let limit = limit.unwrap_or(usize::MAX) as i64;
            let mut stmt = conn.prepare(
                "SELECT file_path, commit_count, last_modified, author_count, lines_of_code, num_functions, num_imports
                 FROM code_metadata WHERE snapshot_id = ?1 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![snapshot_id, limit], |row| {
                let last_modified: Option<String> = row.get(2)?;
                Ok(CodeMetadata {
                    file_path: row.get(0)?,
                    commit_count: row.get::<_, i64>(1)? as u64,
                    last_modified: last_modified
                        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                        .map(|t| t.with_timezone(&Utc)),
                    author_count: row.get::<_, i64>(3)? as u64,
                    lines_of_code: row.get::<_, i64>(4)? as u64,
                    num_functions: row.get::<_, i64>(5)? as u64,
                    num_imports: row.get::<_, i64>(6)? as u64,
                })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Deletes the oldest snapshots for `repository_path` beyond
    /// `max_history`, once the store's history bound is configured.
    pub fn prune(&self, repository_path: &str, max_history: usize) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM snapshots WHERE repository_path = ?1 AND id NOT IN (
                    SELECT id FROM snapshots WHERE repository_path = ?1 ORDER BY timestamp DESC LIMIT ?2
                 )",
                params![repository_path, max_history as i64],
            )?;
            Ok(())
        })
    }

    /// Idempotent close: calling twice is a no-op.
    pub fn close(&self) {
        let mut guard = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(n: usize) -> IndexStats {
        IndexStats {
            files_scanned: n,
            documents_indexed: n,
            errors: 0,
            duration_ms: 10,
        }
    }

    #[test]
    fn record_and_fetch_latest_snapshot() {
        let store = MetricsStore::open_in_memory().unwrap();
        let id = store.record_snapshot("/repo", Trigger::Index, stats(3)).unwrap();
        let latest = store.get_latest_snapshot("/repo").unwrap().unwrap();
        assert_eq!(latest.id, id);
        assert_eq!(latest.stats.files_scanned, 3);
        assert_eq!(latest.trigger, Trigger::Index);
    }

    #[test]
    fn snapshots_are_returned_newest_first() {
        let store = MetricsStore::open_in_memory().unwrap();
        store.record_snapshot("/repo", Trigger::Index, stats(1)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = store.record_snapshot("/repo", Trigger::Update, stats(2)).unwrap();
        let snapshots = store.get_snapshots(&SnapshotQuery { repository_path: Some("/repo".to_string()), limit: None }).unwrap();
        assert_eq!(snapshots[0].id, second);
    }

    #[test]
    fn code_metadata_round_trips() {
        let store = MetricsStore::open_in_memory().unwrap();
        let id = store.record_snapshot("/repo", Trigger::Index, stats(1)).unwrap();
        store
            .append_code_metadata(
                &id,
                &[CodeMetadata {
                    file_path: "a.ts".to_string(),
                    commit_count: 4,
                    last_modified: Some(Utc::now()),
                    author_count: 2,
                    lines_of_code: 40,
                    num_functions: 3,
                    num_imports: 1,
                }],
            )
            .unwrap();
        let metadata = store.get_code_metadata(&id, None).unwrap();
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata[0].file_path, "a.ts");
    }

    #[test]
    fn prune_keeps_only_recent_snapshots() {
        let store = MetricsStore::open_in_memory().unwrap();
        for i in 0..5 {
            store.record_snapshot("/repo", Trigger::Index, stats(i)).unwrap();
        }
        store.prune("/repo", 2).unwrap();
        let snapshots = store.get_snapshots(&SnapshotQuery { repository_path: Some("/repo".to_string()), limit: None }).unwrap();
        assert_eq!(snapshots.len(), 2);
    }

    #[test]
    fn close_is_idempotent() {
        let store = MetricsStore::open_in_memory().unwrap();
        store.close();
        store.close();
        assert!(store.record_snapshot("/repo", Trigger::Index, stats(1)).is_err());
    }
}
