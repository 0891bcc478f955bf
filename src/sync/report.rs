/*!
 * Per-file and per-run reports.
 *
 * The change report is what a pull request description is rendered from;
 * the verification report lists structural violations. Both serialize to
 * JSON as part of the run report.
 */

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::policy::{ChangeAction, ResolvedOperation};
use crate::translation::cache::CacheSnapshot;
use crate::validation::Violation;

/// How a file was brought up to date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStrategy {
    /// No line needed translation
    KeepExisting,
    /// Some lines were translated, the rest kept
    Incremental,
    /// Every line was new
    FullTranslation,
}

/// Line counts per action for one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeReport {
    pub path: String,
    pub base_revision: String,
    pub strategy: SyncStrategy,
    /// Current lines whose translation was kept
    pub kept: usize,
    /// Current lines translated for the first time
    pub inserted: usize,
    /// Current lines retranslated after a meaningful replace
    pub replaced: usize,
    /// Previous lines whose translation was removed
    pub deleted: usize,
    pub net_line_delta: i64,
    pub operations: Vec<ResolvedOperation>,
}

impl ChangeReport {
    pub fn new(path: &str, base_revision: &str, operations: Vec<ResolvedOperation>) -> Self {
        let mut report = Self {
            path: path.to_string(),
            base_revision: base_revision.to_string(),
            strategy: SyncStrategy::KeepExisting,
            kept: 0,
            inserted: 0,
            replaced: 0,
            deleted: 0,
            net_line_delta: 0,
            operations: Vec::new(),
        };

        let mut previous_lines = 0usize;
        let mut current_lines = 0usize;
        for resolved in &operations {
            let op = &resolved.operation;
            previous_lines += op.previous.len();
            current_lines += op.current.len();
            match resolved.action {
                ChangeAction::KeepExisting => report.kept += op.current.len(),
                ChangeAction::TranslateNew => report.inserted += op.current.len(),
                ChangeAction::Retranslate => report.replaced += op.current.len(),
                ChangeAction::DeleteExisting => report.deleted += op.previous.len(),
            }
        }

        report.net_line_delta = current_lines as i64 - previous_lines as i64;
        report.strategy = if report.inserted + report.replaced == 0 {
            SyncStrategy::KeepExisting
        } else if previous_lines == 0 {
            SyncStrategy::FullTranslation
        } else {
            SyncStrategy::Incremental
        };
        report.operations = operations;
        report
    }

    /// Whether any line needed the oracle
    pub fn needs_translation(&self) -> bool {
        self.inserted + self.replaced > 0
    }
}

/// Structural check outcome for one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub path: String,
    pub passed: bool,
    pub violations: Vec<Violation>,
}

impl VerificationReport {
    pub fn new(path: &str, violations: Vec<Violation>) -> Self {
        Self {
            path: path.to_string(),
            passed: violations.is_empty(),
            violations,
        }
    }
}

/// A unit that fell back to its source lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedUnit {
    /// First line, 1-based
    pub start_line: usize,
    /// Last line, 1-based and inclusive
    pub end_line: usize,
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Target rewritten and verified
    Synced,
    /// Nothing to do
    Unchanged,
    /// Write withheld
    Failed,
}

/// Everything known about one file after a sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    pub path: String,
    pub status: FileStatus,
    pub change: Option<ChangeReport>,
    pub verification: Option<VerificationReport>,
    pub translated_units: usize,
    pub cached_units: usize,
    pub failed_units: Vec<FailedUnit>,
    pub error: Option<String>,
}

impl FileReport {
    pub fn failed(path: &str, error: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            status: FileStatus::Failed,
            change: None,
            verification: None,
            translated_units: 0,
            cached_units: 0,
            failed_units: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == FileStatus::Failed
    }
}

/// Cache counters at the end of a run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheSummary {
    pub entries: usize,
    pub hits: usize,
    pub misses: usize,
    pub hit_rate: f64,
}

impl From<CacheSnapshot> for CacheSummary {
    fn from(snapshot: CacheSnapshot) -> Self {
        Self {
            entries: snapshot.entries,
            hits: snapshot.hits,
            misses: snapshot.misses,
            hit_rate: snapshot.hit_rate,
        }
    }
}

/// Report of a whole run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: String,
    pub base_revision: String,
    pub dry_run: bool,
    pub files: Vec<FileReport>,
    pub oracle_requests: usize,
    pub aborted: bool,
    pub cache: Option<CacheSummary>,
}

impl RunReport {
    pub fn new(base_revision: &str, dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Local::now().to_rfc3339(),
            base_revision: base_revision.to_string(),
            dry_run,
            files: Vec::new(),
            oracle_requests: 0,
            aborted: false,
            cache: None,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.files.iter().any(FileReport::is_failed)
    }

    pub fn count(&self, status: FileStatus) -> usize {
        self.files.iter().filter(|f| f.status == status).count()
    }

    /// One-line summary for the log
    pub fn summary(&self) -> String {
        let cache = self
            .cache
            .map(|c| format!(", cache hit rate {:.1}%", c.hit_rate * 100.0))
            .unwrap_or_default();
        format!(
            "{} file(s): {} synced, {} unchanged, {} failed; {} oracle request(s){}{}",
            self.files.len(),
            self.count(FileStatus::Synced),
            self.count(FileStatus::Unchanged),
            self.count(FileStatus::Failed),
            self.oracle_requests,
            cache,
            if self.aborted { " (aborted: request limit reached)" } else { "" }
        )
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize run report")
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create report directory: {}", parent.display()))?;
        }
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write run report: {}", path.display()))
    }
}
