/*!
 * Common test utilities for the linesync test suite
 */

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use linesync::app_config::Config;
use linesync::policy::semantic::HeuristicJudge;
use linesync::providers::Provider;
use linesync::sync::{FileSyncRequest, SyncContext, SyncPipeline};
use linesync::translation::{RateLimiter, TranslationCache};

// Re-export the mock providers module
pub mod mock_providers;

/// Route library logs to the test harness; set RUST_LOG to see them
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content, parents included
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Split a literal into document lines
pub fn lines(text: &str) -> Vec<String> {
    text.lines().map(String::from).collect()
}

/// Config with no backoff delays and no rate limit
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.sync.requests_per_minute = None;
    config.translation.common.retry_backoff_ms = 0;
    config.translation.common.max_backoff_ms = 0;
    config.translation.common.jitter_ratio = 0.0;
    config
}

/// Pipeline over `provider` with the heuristic judge and an in-memory cache
pub fn pipeline_with(provider: Arc<dyn Provider>, cache: TranslationCache) -> SyncPipeline {
    pipeline_with_config(test_config(), provider, cache)
}

pub fn pipeline_with_config(config: Config, provider: Arc<dyn Provider>, cache: TranslationCache) -> SyncPipeline {
    init_logging();
    let context = SyncContext::with_judge(
        config,
        provider,
        cache,
        Arc::new(RateLimiter::unlimited()),
        Arc::new(HeuristicJudge),
    )
    .expect("test context should build");
    SyncPipeline::new(Arc::new(context))
}

/// A sync request for `docs/guide.md` at revision `rev-1`
pub fn request(previous: &str, current: &str, target: &str) -> FileSyncRequest {
    FileSyncRequest {
        path: "docs/guide.md".to_string(),
        base_revision: "rev-1".to_string(),
        previous_source: lines(previous),
        current_source: lines(current),
        current_target: lines(target),
    }
}

/// A documentation page exercising every block type
pub const SAMPLE_DOC: &str = "---
title: Guide
---

# Getting started

Install the tool with `cargo install linesync` and read
the [configuration guide](https://example.com/config) before
running it for the first time.

```bash
linesync sync --dry-run
```

| Option | Meaning |
|--------|---------|
| `--dry-run` | Write nothing |
| `--limit` | Cap the file count |

> Note: the cache lives in your data directory.

- First item
- Second item";
