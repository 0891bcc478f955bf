/*!
 * Repository layer for database operations.
 *
 * This module provides a high-level API for the translation cache,
 * abstracting away the SQL details and providing type-safe access.
 */

use anyhow::Result;
use log::debug;
use rusqlite::{params, OptionalExtension};
use sha2::{Digest, Sha256};

use super::connection::DatabaseConnection;
use super::models::CacheRecord;

/// Repository for database operations
#[derive(Clone, Debug)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Compute SHA256 hash of text
    pub fn hash_text(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Get a cached translation, counting the hit
    pub async fn get_cached_translation(
        &self,
        path: &str,
        base_revision: &str,
        content_hash: &str,
        target_language: &str,
    ) -> Result<Option<CacheRecord>> {
        let path = path.to_string();
        let base_revision = base_revision.to_string();
        let content_hash = content_hash.to_string();
        let target_language = target_language.to_string();

        self.db
            .execute_async(move |conn| {
                let result: Option<CacheRecord> = conn
                    .query_row(
                        r#"
                        SELECT id, path, base_revision, content_hash, target_language,
                               translated_text, model_used, created_at, hit_count
                        FROM translation_cache
                        WHERE path = ?1
                          AND base_revision = ?2
                          AND content_hash = ?3
                          AND target_language = ?4
                        "#,
                        params![path, base_revision, content_hash, target_language],
                        |row| {
                            Ok(CacheRecord {
                                id: row.get(0)?,
                                path: row.get(1)?,
                                base_revision: row.get(2)?,
                                content_hash: row.get(3)?,
                                target_language: row.get(4)?,
                                translated_text: row.get(5)?,
                                model_used: row.get(6)?,
                                created_at: row.get(7)?,
                                hit_count: row.get(8)?,
                            })
                        },
                    )
                    .optional()?;

                if let Some(record) = &result {
                    conn.execute(
                        "UPDATE translation_cache SET hit_count = hit_count + 1 WHERE id = ?1",
                        [record.id],
                    )?;
                    debug!("Cache hit for {}@{}", record.path, record.base_revision);
                }
                Ok(result)
            })
            .await
    }

    /// Store a translation; an existing entry for the key is overwritten
    pub async fn store_translation(&self, record: &CacheRecord) -> Result<()> {
        let record = record.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO translation_cache (
                        path, base_revision, content_hash, target_language,
                        translated_text, model_used, created_at, hit_count
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(path, base_revision, content_hash, target_language)
                    DO UPDATE SET translated_text = excluded.translated_text,
                                  model_used = excluded.model_used,
                                  created_at = excluded.created_at
                    "#,
                    params![
                        record.path,
                        record.base_revision,
                        record.content_hash,
                        record.target_language,
                        record.translated_text,
                        record.model_used,
                        record.created_at,
                        record.hit_count,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Get cache statistics
    pub async fn get_cache_stats(&self) -> Result<CacheStats> {
        let file_size_bytes = self.db.file_size_bytes();
        self.db
            .execute_async(move |conn| {
                let (total_entries, total_hits, revisions): (i64, i64, i64) = conn.query_row(
                    "SELECT COUNT(*), COALESCE(SUM(hit_count), 0), COUNT(DISTINCT base_revision) FROM translation_cache",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )?;

                Ok(CacheStats {
                    total_entries,
                    total_hits,
                    revisions,
                    file_size_bytes,
                })
            })
            .await
    }

    /// Clear the translation cache
    pub async fn clear_cache(&self) -> Result<i64> {
        self.db
            .execute_async(|conn| {
                let deleted = conn.execute("DELETE FROM translation_cache", [])?;
                Ok(deleted as i64)
            })
            .await
    }

    /// Remove the entries produced against one base revision
    pub async fn clear_revision(&self, base_revision: &str) -> Result<i64> {
        let base_revision = base_revision.to_string();
        self.db
            .execute_async(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM translation_cache WHERE base_revision = ?1",
                    [base_revision],
                )?;
                Ok(deleted as i64)
            })
            .await
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of cache entries
    pub total_entries: i64,
    /// Total number of cache hits
    pub total_hits: i64,
    /// Distinct base revisions in the cache
    pub revisions: i64,
    /// Database file size in bytes
    pub file_size_bytes: u64,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache entries: {}, Hits: {}, Revisions: {}, Size: {} KB",
            self.total_entries,
            self.total_hits,
            self.revisions,
            self.file_size_bytes / 1024
        )
    }
}
