/*!
 * Tests for the durable translation cache
 */

use anyhow::Result;
use std::path::Path;

use linesync::database::{DatabaseConnection, Repository};
use linesync::translation::{CacheKey, TranslationCache};

use crate::common;

fn open_cache(db_path: &Path, language: &str) -> Result<TranslationCache> {
    let repository = Repository::new(DatabaseConnection::new(db_path)?);
    Ok(TranslationCache::new(true, language, Some(repository)))
}

/// Entries written by one run are served to the next one
#[tokio::test]
async fn test_lookup_afterReopen_shouldHitDurableStore() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let db_path = temp_dir.path().join("cache/linesync.db");
    let key = CacheKey::new("docs/guide.md", "rev-1", "Hello world");

    {
        let cache = open_cache(&db_path, "ja")?;
        cache.store(&key, "こんにちは世界", "mock-fast").await;
    }

    let cache = open_cache(&db_path, "ja")?;
    let hit = cache.lookup(&key).await.expect("entry should survive reopening");
    assert_eq!(hit.text, "こんにちは世界");
    assert_eq!(hit.model_used, "mock-fast");

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 0);
    Ok(())
}

/// The same key in another target language is a different entry
#[tokio::test]
async fn test_lookup_withOtherTargetLanguage_shouldMiss() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let db_path = temp_dir.path().join("linesync.db");
    let key = CacheKey::new("docs/guide.md", "rev-1", "Hello world");

    open_cache(&db_path, "ja")?.store(&key, "こんにちは世界", "mock-fast").await;

    let french = open_cache(&db_path, "fr")?;
    assert!(french.lookup(&key).await.is_none());
    assert_eq!(french.stats().misses, 1);
    Ok(())
}

/// Revision and path are both part of the key
#[tokio::test]
async fn test_lookup_withOtherRevisionOrPath_shouldMiss() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let cache = open_cache(&temp_dir.path().join("linesync.db"), "ja")?;
    cache
        .store(&CacheKey::new("docs/guide.md", "rev-1", "Hello"), "こんにちは", "mock-fast")
        .await;

    assert!(cache.lookup(&CacheKey::new("docs/guide.md", "rev-2", "Hello")).await.is_none());
    assert!(cache.lookup(&CacheKey::new("docs/other.md", "rev-1", "Hello")).await.is_none());
    assert!(cache.lookup(&CacheKey::new("docs/guide.md", "rev-1", "Hello")).await.is_some());
    Ok(())
}

/// Clearing removes durable rows too
#[tokio::test]
async fn test_clear_shouldRemoveDurableRows() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let db_path = temp_dir.path().join("linesync.db");
    let cache = open_cache(&db_path, "ja")?;
    cache.store(&CacheKey::new("a.md", "rev-1", "One"), "一", "mock-fast").await;
    cache.store(&CacheKey::new("b.md", "rev-1", "Two"), "二", "mock-fast").await;

    let durable = cache.durable_stats().await.expect("durable store is configured");
    assert_eq!(durable.total_entries, 2);

    assert_eq!(cache.clear().await?, 2);
    assert!(cache.is_empty());
    assert!(open_cache(&db_path, "ja")?.lookup(&CacheKey::new("a.md", "rev-1", "One")).await.is_none());
    Ok(())
}
