/*!
 * Database record types.
 */

use serde::{Deserialize, Serialize};

/// Translation cache record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Database ID
    pub id: i64,
    /// Document path the block belongs to
    pub path: String,
    /// Upstream revision the translation was produced against
    pub base_revision: String,
    /// SHA256 of the block text before placeholder protection
    pub content_hash: String,
    /// Target language code
    pub target_language: String,
    /// Translated (still masked) text
    pub translated_text: String,
    /// Model used for translation
    pub model_used: String,
    /// Creation timestamp
    pub created_at: String,
    /// Number of cache hits
    pub hit_count: i64,
}

impl CacheRecord {
    /// Create a new cache record
    pub fn new(
        path: String,
        base_revision: String,
        content_hash: String,
        target_language: String,
        translated_text: String,
        model_used: String,
    ) -> Self {
        Self {
            id: 0, // Will be assigned by database
            path,
            base_revision,
            content_hash,
            target_language,
            translated_text,
            model_used,
            created_at: chrono::Utc::now().to_rfc3339(),
            hit_count: 0,
        }
    }
}
