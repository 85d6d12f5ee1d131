//! Persistent split cache.
//!
//! Maps (original commit, configuration fingerprint) to the commit's
//! `Resolution`, so repeated splits only rewrite new history.
//! - Storage: SQLite database inside the git directory, WAL journal
//! - Scoping: lookups only match the fingerprint they were written with, so
//!   a new prefix set starts from scratch without touching other entries
//! - Flush: `--scratch` drops every entry
//! - Corruption: an unreadable database is moved aside and recreated; an
//!   unparseable row is a miss
//!
//! Values are deterministic, so concurrent writers of one key always agree
//! and `INSERT OR REPLACE` is enough.
//!
//! Used by: `CommitRewriter` in rewrite.rs, `split()` in splitter.rs

use git2::Oid;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Result, SplitError};
use crate::models::Resolution;

pub const CACHE_FILE: &str = "subtree-split.db";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS splits (
    fingerprint TEXT NOT NULL,
    commit_id   TEXT NOT NULL,
    kind        INTEGER NOT NULL,
    value       TEXT NOT NULL,
    PRIMARY KEY (fingerprint, commit_id)
) WITHOUT ROWID;
"#;

/// Row kinds.
const KIND_COLLAPSED: i64 = 0;
const KIND_CREATED: i64 = 1;
const KIND_ELIDED: i64 = 2;

pub struct SplitCache {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SplitCache {
    /// Open the cache stored in `git_dir`.
    pub fn open(git_dir: &Path) -> Result<Self> {
        Self::open_at(&git_dir.join(CACHE_FILE))
    }

    /// Open a cache database at an explicit path, recreating it if the
    /// existing file is unreadable.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = match Self::connect(path) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!("Split cache at {} is unreadable ({}), starting over", path.display(), e);
                quarantine(path)?;
                Self::connect(path)?
            }
        };

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Cache that lives for the process only.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    fn connect(path: &Path) -> rusqlite::Result<Connection> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        // WAL mode for concurrent readers; the returned mode is not needed
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(conn)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| SplitError::Internal("Lock poisoned".to_string()))
    }

    /// Look up a commit. Read failures and malformed rows count as misses.
    pub fn get(&self, commit: Oid, fingerprint: &str) -> Option<Resolution> {
        let conn = self.lock().ok()?;
        let row: Option<(i64, String)> = conn
            .prepare_cached("SELECT kind, value FROM splits WHERE fingerprint = ?1 AND commit_id = ?2")
            .and_then(|mut stmt| {
                stmt.query_row(params![fingerprint, commit.to_string()], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })
                .optional()
            })
            .unwrap_or_else(|e| {
                tracing::warn!("Split cache read failed for {}: {}", commit, e);
                None
            });

        let (kind, value) = row?;
        let resolution = decode(kind, &value);
        if resolution.is_none() {
            tracing::debug!("Ignoring malformed cache entry for {}", commit);
        }
        resolution
    }

    pub fn put(&self, commit: Oid, fingerprint: &str, resolution: &Resolution) -> Result<()> {
        let (kind, value) = encode(resolution);
        let conn = self.lock()?;
        conn.prepare_cached(
            "INSERT OR REPLACE INTO splits (fingerprint, commit_id, kind, value) VALUES (?1, ?2, ?3, ?4)",
        )?
        .execute(params![fingerprint, commit.to_string(), kind, value])?;
        Ok(())
    }

    /// Drop every entry, for all fingerprints.
    pub fn flush(&self) -> Result<()> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM splits", [])?;
        tracing::info!("Flushed {} split cache entries", removed);
        Ok(())
    }

    /// Entries recorded under `fingerprint`.
    pub fn len(&self, fingerprint: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM splits WHERE fingerprint = ?1",
            [fingerprint],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn is_empty(&self, fingerprint: &str) -> Result<bool> {
        Ok(self.len(fingerprint)? == 0)
    }

    /// Fingerprints with at least one entry.
    pub fn fingerprints(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT DISTINCT fingerprint FROM splits ORDER BY fingerprint")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

fn encode(resolution: &Resolution) -> (i64, String) {
    match resolution {
        Resolution::Commit { id, created: true } => (KIND_CREATED, id.to_string()),
        Resolution::Commit { id, created: false } => (KIND_COLLAPSED, id.to_string()),
        Resolution::Elided { parents } => (
            KIND_ELIDED,
            parents.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(" "),
        ),
    }
}

fn decode(kind: i64, value: &str) -> Option<Resolution> {
    match kind {
        KIND_CREATED | KIND_COLLAPSED => Some(Resolution::Commit {
            id: Oid::from_str(value).ok()?,
            created: kind == KIND_CREATED,
        }),
        KIND_ELIDED => {
            let parents = value
                .split_whitespace()
                .map(Oid::from_str)
                .collect::<std::result::Result<Vec<_>, _>>()
                .ok()?;
            Some(Resolution::Elided { parents })
        }
        _ => None,
    }
}

/// Move an unreadable database (and its WAL files) out of the way.
fn quarantine(path: &Path) -> Result<()> {
    let mut aside = path.as_os_str().to_owned();
    aside.push(".corrupt");
    if path.exists() {
        std::fs::rename(path, PathBuf::from(aside))
            .map_err(|e| SplitError::Internal(format!("cannot move aside {}: {}", path.display(), e)))?;
    }
    for suffix in ["-wal", "-shm"] {
        let mut side = path.as_os_str().to_owned();
        side.push(suffix);
        let side = PathBuf::from(side);
        match std::fs::remove_file(&side) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(SplitError::Internal(format!(
                    "cannot remove {}: {}",
                    side.display(),
                    e
                )));
            }
        }
    }
    Ok(())
}
