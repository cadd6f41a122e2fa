// SPDX-License-Identifier: MPL-2.0

use crate::cache::{CacheDb, CacheError};
use crate::supabase::Profile;
use rusqlite::{OptionalExtension, params};

/// Cache operations for sender profiles
pub struct ProfileCache<'a> {
    db: &'a CacheDb,
}

impl<'a> ProfileCache<'a> {
    pub fn new(db: &'a CacheDb) -> Self {
        Self { db }
    }

    /// Upsert a profile, stamping it as fetched now
    pub fn store(&self, profile: &Profile) -> Result<(), CacheError> {
        self.store_at(profile, CacheDb::now())
    }

    fn store_at(&self, profile: &Profile, fetched_at: i64) -> Result<(), CacheError> {
        let conn = self.db.conn();

        conn.execute(
            r#"
            INSERT INTO profiles (
                id, username, display_name, avatar_url, is_owner, created_at, fetched_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                username = excluded.username,
                display_name = excluded.display_name,
                avatar_url = excluded.avatar_url,
                is_owner = excluded.is_owner,
                created_at = excluded.created_at,
                fetched_at = excluded.fetched_at
            "#,
            params![
                profile.id,
                profile.username,
                profile.display_name,
                profile.avatar_url,
                profile.is_owner,
                profile.created_at,
                fetched_at,
            ],
        )?;

        Ok(())
    }

    /// Store every embedded sender of a page of messages
    pub fn store_all<'p>(
        &self,
        profiles: impl IntoIterator<Item = &'p Profile>,
    ) -> Result<(), CacheError> {
        let now = CacheDb::now();
        for profile in profiles {
            self.store_at(profile, now)?;
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Profile, CacheError> {
        self.get_fresh(id, i64::MAX)?.ok_or(CacheError::NotFound)
    }

    /// Profile fetched within the last `max_age_secs`, if cached
    pub fn get_fresh(&self, id: &str, max_age_secs: i64) -> Result<Option<Profile>, CacheError> {
        let conn = self.db.conn();
        let cutoff = CacheDb::now().saturating_sub(max_age_secs);

        let mut stmt = conn.prepare(
            r#"
            SELECT id, username, display_name, avatar_url, is_owner, created_at
            FROM profiles
            WHERE id = ? AND fetched_at >= ?
            "#,
        )?;

        let profile = stmt
            .query_row(params![id, cutoff], |row| {
                Ok(Profile {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    display_name: row.get(2)?,
                    avatar_url: row.get(3)?,
                    is_owner: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })
            .optional()?;

        Ok(profile)
    }

    /// Forget a profile, e.g. after the admin deletes the user
    pub fn remove(&self, id: &str) -> Result<(), CacheError> {
        self.db
            .conn()
            .execute("DELETE FROM profiles WHERE id = ?", [id])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str, display_name: Option<&str>) -> Profile {
        Profile {
            id: id.into(),
            username: format!("user_{id}"),
            display_name: display_name.map(str::to_string),
            avatar_url: None,
            is_owner: id == "owner",
            created_at: "2025-01-01T00:00:00Z".into(),
        }
    }

    fn db() -> (tempfile::TempDir, CacheDb) {
        let dir = tempfile::tempdir().unwrap();
        let db = CacheDb::open_at(&dir.path().join("cache.db")).unwrap();
        (dir, db)
    }

    #[test]
    fn test_store_and_get() {
        let (_dir, db) = db();
        let cache = ProfileCache::new(&db);

        cache.store(&profile("owner", Some("Boss"))).unwrap();
        let loaded = cache.get("owner").unwrap();
        assert_eq!(loaded, profile("owner", Some("Boss")));
        assert!(loaded.is_owner);

        assert!(matches!(cache.get("nobody"), Err(CacheError::NotFound)));
    }

    #[test]
    fn test_upsert_replaces_fields() {
        let (_dir, db) = db();
        let cache = ProfileCache::new(&db);

        cache.store(&profile("u1", Some("Old"))).unwrap();
        cache.store(&profile("u1", None)).unwrap();
        assert_eq!(cache.get("u1").unwrap().display_name, None);
    }

    #[test]
    fn test_get_fresh_respects_age() {
        let (_dir, db) = db();
        let cache = ProfileCache::new(&db);

        cache
            .store_at(&profile("u1", None), CacheDb::now() - 3_600)
            .unwrap();
        assert_eq!(cache.get_fresh("u1", 600).unwrap(), None);
        assert!(cache.get_fresh("u1", 7_200).unwrap().is_some());

        cache.store(&profile("u1", None)).unwrap();
        assert!(cache.get_fresh("u1", 600).unwrap().is_some());
    }

    #[test]
    fn test_store_all_and_remove() {
        let (_dir, db) = db();
        let cache = ProfileCache::new(&db);
        let senders = [profile("a", None), profile("b", None)];

        cache.store_all(&senders).unwrap();
        assert!(cache.get("a").is_ok());

        cache.remove("a").unwrap();
        assert!(cache.get("a").is_err());
        assert!(cache.get("b").is_ok());
    }
}
