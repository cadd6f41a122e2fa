// SPDX-License-Identifier: MPL-2.0

use crate::cache::CacheError;
use crate::cache::schema::SCHEMA;
use crate::config::APP_ID;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Profiles not seen for this long are dropped at startup
const PROFILE_RETENTION_SECS: i64 = 7 * 24 * 60 * 60;

/// Handle to the cache database for a specific user
#[derive(Clone)]
pub struct CacheDb {
    conn: Arc<Mutex<Connection>>,
}

impl CacheDb {
    /// Open or create the cache database for a user
    /// Path: ~/.local/share/io.github.parley.Parley/{user_id}/cache.db
    pub fn open(user_id: &str) -> Result<Self, CacheError> {
        let path = Self::cache_path(user_id)?;
        Self::open_at(&path)
    }

    pub fn open_at(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CacheError::Path(format!("failed to create cache dir: {}", e)))?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn cache_path(user_id: &str) -> Result<PathBuf, CacheError> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| CacheError::Path("could not find data directory".to_string()))?;

        // User ids are UUIDs; anything else is reduced to a safe directory name
        let safe_id: String = user_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        if safe_id.is_empty() {
            return Err(CacheError::Path("empty user id".to_string()));
        }

        Ok(data_dir.join(APP_ID).join(safe_id).join("cache.db"))
    }

    /// Access connection for operations
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves SQLite consistent; keep using it
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current unix timestamp
    pub fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    /// Drop profiles that haven't been refreshed in a week
    pub fn cleanup_stale(&self) -> Result<usize, CacheError> {
        let cutoff = Self::now() - PROFILE_RETENTION_SECS;
        let removed = self
            .conn()
            .execute("DELETE FROM profiles WHERE fetched_at < ?", [cutoff])?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_parent_dirs_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("cache.db");
        let db = CacheDb::open_at(&path).unwrap();
        assert!(path.exists());

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        {
            let db = CacheDb::open_at(&path).unwrap();
            db.conn()
                .execute(
                    "INSERT INTO profiles (id, username, created_at, fetched_at) VALUES ('u1', 'a', '', 1)",
                    [],
                )
                .unwrap();
        }
        let db = CacheDb::open_at(&path).unwrap();
        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_cleanup_removes_only_old_rows() {
        let dir = tempfile::tempdir().unwrap();
        let db = CacheDb::open_at(&dir.path().join("cache.db")).unwrap();
        let now = CacheDb::now();
        {
            let conn = db.conn();
            conn.execute(
                "INSERT INTO profiles (id, username, created_at, fetched_at) VALUES ('old', 'o', '', ?1), ('new', 'n', '', ?2)",
                [now - PROFILE_RETENTION_SECS - 10, now],
            )
            .unwrap();
        }

        assert_eq!(db.cleanup_stale().unwrap(), 1);
        let remaining: String = db
            .conn()
            .query_row("SELECT id FROM profiles", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, "new");
    }
}
