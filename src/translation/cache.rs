/*!
 * Translation caching functionality.
 *
 * Two layers: a process-local map that every worker can read concurrently,
 * and the optional SQLite repository that survives between runs. A key is
 * (path, base revision, content hash), namespaced by the target language.
 * The durable layer is best effort: when it fails the cache degrades to a
 * miss or a skipped write and the oracle is consulted instead.
 */

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use log::{debug, warn};
use parking_lot::RwLock;

use crate::database::{CacheRecord, CacheStats, Repository};
use crate::errors::SyncError;

/// Cache key for one translation unit
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Document path relative to the tree root
    pub path: String,

    /// Upstream revision the unit was translated against
    pub base_revision: String,

    /// SHA256 of the unit text before protection
    pub content_hash: String,
}

impl CacheKey {
    /// Build a key, hashing the unprotected unit text
    pub fn new(path: &str, base_revision: &str, text: &str) -> Self {
        Self {
            path: path.to_string(),
            base_revision: base_revision.to_string(),
            content_hash: Repository::hash_text(text),
        }
    }
}

/// A cached oracle answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedTranslation {
    /// Masked translated text, exactly as the oracle returned it
    pub text: String,

    /// Model that produced it
    pub model_used: String,
}

/// Hit/miss counters of this process
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheSnapshot {
    pub entries: usize,
    pub hits: usize,
    pub misses: usize,
    pub hit_rate: f64,
}

/// Translation cache for storing and retrieving translations
pub struct TranslationCache {
    /// In-process layer
    memory: Arc<RwLock<HashMap<CacheKey, CachedTranslation>>>,

    /// Durable layer, if configured
    repository: Option<Repository>,

    /// Namespace for the durable layer
    target_language: String,

    /// Cache hit counter
    hits: Arc<RwLock<usize>>,

    /// Cache miss counter
    misses: Arc<RwLock<usize>>,

    /// Whether caching is enabled
    enabled: bool,
}

impl TranslationCache {
    /// Create a new translation cache
    pub fn new(enabled: bool, target_language: &str, repository: Option<Repository>) -> Self {
        Self {
            memory: Arc::new(RwLock::new(HashMap::new())),
            repository,
            target_language: target_language.to_string(),
            hits: Arc::new(RwLock::new(0)),
            misses: Arc::new(RwLock::new(0)),
            enabled,
        }
    }

    /// Memory-only cache
    pub fn in_memory(target_language: &str) -> Self {
        Self::new(true, target_language, None)
    }

    /// A cache that never hits
    pub fn disabled() -> Self {
        Self::new(false, "", None)
    }

    /// Look a unit up, memory first, then the durable store
    pub async fn lookup(&self, key: &CacheKey) -> Option<CachedTranslation> {
        if !self.enabled {
            return None;
        }

        let found = self.memory.read().get(key).cloned();
        if let Some(entry) = found {
            *self.hits.write() += 1;
            debug!("Cache hit (memory) for {} [{}]", key.path, truncate_hash(&key.content_hash));
            return Some(entry);
        }

        if let Some(entry) = self.lookup_durable(key).await {
            self.memory.write().insert(key.clone(), entry.clone());
            *self.hits.write() += 1;
            debug!("Cache hit (database) for {} [{}]", key.path, truncate_hash(&key.content_hash));
            return Some(entry);
        }

        *self.misses.write() += 1;
        debug!("Cache miss for {} [{}]", key.path, truncate_hash(&key.content_hash));
        None
    }

    async fn lookup_durable(&self, key: &CacheKey) -> Option<CachedTranslation> {
        let repository = self.repository.as_ref()?;
        match repository
            .get_cached_translation(&key.path, &key.base_revision, &key.content_hash, &self.target_language)
            .await
        {
            Ok(record) => record.map(|r| CachedTranslation {
                text: r.translated_text,
                model_used: r.model_used,
            }),
            Err(e) => {
                let err = SyncError::CacheUnavailable(e.to_string());
                warn!("Bypassing cache: {}", err);
                None
            }
        }
    }

    /// Store a translation in both layers
    pub async fn store(&self, key: &CacheKey, text: &str, model_used: &str) {
        if !self.enabled {
            return;
        }

        let entry = CachedTranslation {
            text: text.to_string(),
            model_used: model_used.to_string(),
        };
        self.memory.write().insert(key.clone(), entry);

        if let Some(repository) = &self.repository {
            let record = CacheRecord::new(
                key.path.clone(),
                key.base_revision.clone(),
                key.content_hash.clone(),
                self.target_language.clone(),
                text.to_string(),
                model_used.to_string(),
            );
            if let Err(e) = repository.store_translation(&record).await {
                warn!("Skipping durable cache write: {}", SyncError::CacheUnavailable(e.to_string()));
            }
        }

        debug!("Cached translation for {} [{}]", key.path, truncate_hash(&key.content_hash));
    }

    /// Get cache statistics for this process
    pub fn stats(&self) -> CacheSnapshot {
        let hits = *self.hits.read();
        let misses = *self.misses.read();
        let total = hits + misses;

        let hit_rate = if total > 0 { hits as f64 / total as f64 } else { 0.0 };

        CacheSnapshot {
            entries: self.memory.read().len(),
            hits,
            misses,
            hit_rate,
        }
    }

    /// Statistics of the durable store, if any
    pub async fn durable_stats(&self) -> Option<CacheStats> {
        let repository = self.repository.as_ref()?;
        match repository.get_cache_stats().await {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!("Could not read cache statistics: {}", e);
                None
            }
        }
    }

    /// Clear both layers, returning the number of durable rows removed
    pub async fn clear(&self) -> Result<i64> {
        self.memory.write().clear();
        *self.hits.write() = 0;
        *self.misses.write() = 0;

        let removed = match &self.repository {
            Some(repository) => repository.clear_cache().await?,
            None => 0,
        };
        debug!("Translation cache cleared ({} durable entries)", removed);
        Ok(removed)
    }

    /// Get the number of entries in the memory layer
    pub fn len(&self) -> usize {
        self.memory.read().len()
    }

    /// Check if the memory layer is empty
    pub fn is_empty(&self) -> bool {
        self.memory.read().is_empty()
    }

    /// Check if the cache is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::in_memory("")
    }
}

impl Clone for TranslationCache {
    fn clone(&self) -> Self {
        Self {
            memory: self.memory.clone(),
            repository: self.repository.clone(),
            target_language: self.target_language.clone(),
            hits: self.hits.clone(),
            misses: self.misses.clone(),
            enabled: self.enabled,
        }
    }
}

fn truncate_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
