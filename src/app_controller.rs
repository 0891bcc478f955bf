use anyhow::Result;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::Config;
use crate::database::{CacheStats, DatabaseConnection, Repository};
use crate::errors::AppError;
use crate::file_utils::FileManager;
use crate::language_utils;
use crate::providers::mock::MockProvider;
use crate::providers::{self, Provider};
use crate::sync::report::{FileReport, FileStatus, RunReport, VerificationReport};
use crate::sync::{FileSyncRequest, SyncContext, SyncPipeline};
use crate::translation::TranslationCache;
use crate::validation::AlignmentVerifier;

// @module: Application controller for document synchronization

/// Where the three document versions live; files or directories
#[derive(Debug, Clone)]
pub struct SyncPaths {
    /// Source as of the base revision
    pub previous: PathBuf,
    /// Source as it is now
    pub current: PathBuf,
    /// Translation aligned with `previous`
    pub target: PathBuf,
    /// Where to write; defaults to `target`
    pub output: Option<PathBuf>,
}

/// Run options from the command line
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub base_revision: String,
    pub dry_run: bool,
    /// Maximum number of files to process
    pub limit: Option<usize>,
    /// JSON run report destination
    pub report: Option<PathBuf>,
}

/// One file to sync
#[derive(Debug, Clone)]
struct SyncJob {
    /// Label used in reports and cache keys
    path: String,
    previous: PathBuf,
    current: PathBuf,
    target: PathBuf,
    output: PathBuf,
}

/// Main application controller for document synchronization
pub struct Controller {
    // @field: App configuration
    config: Config,
}

impl Controller {
    /// Create a new controller for test purposes with default configuration
    pub fn new_for_test() -> Result<Self> {
        Self::with_config(Config::default())
    }

    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check if the controller is properly initialized with configuration
    pub fn is_initialized(&self) -> bool {
        !self.config.source_language.is_empty() && !self.config.target_language.is_empty()
    }

    /// Provider for a run; dry runs never reach the network
    pub fn create_provider(&self, dry_run: bool) -> Arc<dyn Provider> {
        if dry_run {
            info!("Dry run: using the mock provider, nothing will be written");
            Arc::new(MockProvider::working().with_language(self.config.target_language.clone()))
        } else {
            providers::create_provider(&self.config.translation)
        }
    }

    fn open_repository(&self) -> Result<Repository> {
        let path = self.config.cache_database_path()?;
        Ok(Repository::new(DatabaseConnection::new(path)?))
    }

    /// Translation cache for a run; falls back to memory when the database is unavailable
    pub fn open_cache(&self) -> TranslationCache {
        let language = language_utils::normalize_to_part1_or_part2t(&self.config.target_language)
            .unwrap_or_else(|_| self.config.target_language.clone());

        if !self.config.cache.enabled {
            return TranslationCache::disabled();
        }

        match self.open_repository() {
            Ok(repository) => TranslationCache::new(true, &language, Some(repository)),
            Err(e) => {
                warn!("Cache database unavailable, using memory only: {}", e);
                TranslationCache::new(true, &language, None)
            }
        }
    }

    /// Run a sync with the configured provider and cache
    pub async fn run_sync(&self, paths: &SyncPaths, options: &SyncOptions) -> Result<RunReport> {
        let provider = self.create_provider(options.dry_run);
        // mock answers must never reach the durable store
        let cache = if options.dry_run {
            TranslationCache::in_memory(&self.config.target_language)
        } else {
            self.open_cache()
        };
        self.run_sync_with(provider, cache, paths, options).await
    }

    /// Run a sync with an explicit provider and cache
    pub async fn run_sync_with(
        &self,
        provider: Arc<dyn Provider>,
        cache: TranslationCache,
        paths: &SyncPaths,
        options: &SyncOptions,
    ) -> Result<RunReport> {
        let start_time = std::time::Instant::now();
        let mut jobs = self.collect_jobs(paths)?;
        if let Some(limit) = options.limit {
            if jobs.len() > limit {
                info!("Limiting run to {} of {} file(s)", limit, jobs.len());
                jobs.truncate(limit);
            }
        }

        let context = Arc::new(SyncContext::new(self.config.clone(), provider, cache)?);
        let pipeline = SyncPipeline::new(Arc::clone(&context));

        info!(
            "🚀 linesync: {} - {} ({} → {}), {} file(s) at revision {}",
            self.config.translation.provider.display_name(),
            self.config.translation.get_model(),
            self.config.source_language,
            self.config.target_language,
            jobs.len(),
            options.base_revision
        );

        let progress_bar = Self::progress_bar(jobs.len());
        let concurrency = self.config.sync.file_concurrency.max(1);
        let mut files: Vec<FileReport> = stream::iter(jobs)
            .map(|job| {
                let pipeline = pipeline.clone();
                let progress_bar = progress_bar.clone();
                let base_revision = options.base_revision.clone();
                let dry_run = options.dry_run;
                async move {
                    progress_bar.set_message(job.path.clone());
                    let report = Self::sync_job(&pipeline, &job, &base_revision, dry_run).await;
                    progress_bar.inc(1);
                    report
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;
        progress_bar.finish_and_clear();
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let mut report = RunReport::new(&options.base_revision, options.dry_run);
        report.files = files;
        report.oracle_requests = context.orchestrator.request_count();
        report.aborted = context.orchestrator.is_aborted();
        report.cache = Some(context.cache().stats().into());

        info!(
            "{} in {}",
            report.summary(),
            Self::format_duration(start_time.elapsed())
        );

        if let Some(path) = &options.report {
            report.write_to(path)?;
            info!("Run report written to {}", path.display());
        }

        Ok(report)
    }

    /// Read, sync and write one file
    async fn sync_job(pipeline: &SyncPipeline, job: &SyncJob, base_revision: &str, dry_run: bool) -> FileReport {
        let request = match Self::load_request(job, base_revision) {
            Ok(request) => request,
            Err(e) => {
                error!("❌ {}: {:#}", job.path, e);
                return FileReport::failed(&job.path, format!("{:#}", e));
            }
        };

        let outcome = pipeline.sync_file(&request).await;
        let mut report = outcome.report;
        let Some(lines) = outcome.lines else {
            return report;
        };

        let needs_write = report.status == FileStatus::Synced || job.output != job.target;
        if dry_run || !needs_write {
            return report;
        }

        if let Err(e) = FileManager::write_lines(&job.output, &lines) {
            error!("❌ {}: {:#}", job.path, e);
            report.status = FileStatus::Failed;
            report.error = Some(format!("{:#}", e));
        }
        report
    }

    fn load_request(job: &SyncJob, base_revision: &str) -> Result<FileSyncRequest> {
        Ok(FileSyncRequest {
            path: job.path.clone(),
            base_revision: base_revision.to_string(),
            previous_source: FileManager::read_lines_or_empty(&job.previous)?,
            current_source: FileManager::read_lines(&job.current)?,
            current_target: FileManager::read_lines_or_empty(&job.target)?,
        })
    }

    /// Pair files across the three trees by relative path
    fn collect_jobs(&self, paths: &SyncPaths) -> Result<Vec<SyncJob>> {
        let output_root = paths.output.clone().unwrap_or_else(|| paths.target.clone());

        if FileManager::file_exists(&paths.current) {
            return Ok(vec![SyncJob {
                path: paths
                    .current
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| paths.current.display().to_string()),
                previous: paths.previous.clone(),
                current: paths.current.clone(),
                target: paths.target.clone(),
                output: output_root,
            }]);
        }

        if !FileManager::dir_exists(&paths.current) {
            return Err(AppError::File(format!("Current source does not exist: {:?}", paths.current)).into());
        }

        let documents = FileManager::find_documents(&paths.current, &self.config.sync.file_extensions)?;
        if documents.is_empty() {
            warn!("No documents found in {:?}", paths.current);
        }

        Ok(documents
            .into_iter()
            .map(|current| {
                let relative = FileManager::relative_path(&paths.current, &current);
                SyncJob {
                    previous: paths.previous.join(&relative),
                    target: paths.target.join(&relative),
                    output: output_root.join(&relative),
                    current,
                    path: relative,
                }
            })
            .collect())
    }

    /// Check existing translations against their sources
    pub fn verify_paths(&self, source: &Path, target: &Path) -> Result<Vec<VerificationReport>> {
        let verifier = AlignmentVerifier::new();
        let pairs: Vec<(String, PathBuf, PathBuf)> = if FileManager::file_exists(source) {
            let label = source.display().to_string();
            vec![(label, source.to_path_buf(), target.to_path_buf())]
        } else if FileManager::dir_exists(source) {
            FileManager::find_documents(source, &self.config.sync.file_extensions)?
                .into_iter()
                .map(|path| {
                    let relative = FileManager::relative_path(source, &path);
                    (relative.clone(), path, target.join(&relative))
                })
                .collect()
        } else {
            return Err(AppError::File(format!("Source does not exist: {:?}", source)).into());
        };

        let mut reports = Vec::with_capacity(pairs.len());
        for (label, source_path, target_path) in pairs {
            let source_lines = FileManager::read_lines(&source_path)?;
            let target_lines = FileManager::read_lines_or_empty(&target_path)?;
            let report = VerificationReport::new(&label, verifier.verify(&source_lines, &target_lines));
            if report.passed {
                info!("✅ {}", label);
            } else {
                for violation in &report.violations {
                    error!("❌ {}: {}", label, violation);
                }
            }
            reports.push(report);
        }
        Ok(reports)
    }

    /// Durable cache statistics
    pub async fn cache_stats(&self) -> Result<CacheStats> {
        self.open_repository()?.get_cache_stats().await
    }

    /// Remove every durable cache entry
    pub async fn clear_cache(&self) -> Result<i64> {
        let removed = self.open_repository()?.clear_cache().await?;
        info!("Removed {} cached translation(s)", removed);
        Ok(removed)
    }

    fn progress_bar(files: usize) -> ProgressBar {
        if files < 2 {
            return ProgressBar::hidden();
        }
        let progress_bar = ProgressBar::new(files as u64);
        let template_result = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(template_result.progress_chars("█▓▒░"));
        progress_bar
    }

    // Format duration in a human-readable format
    fn format_duration(duration: std::time::Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}
