/*!
 * Integration tests for application lifecycle
 */

use anyhow::Result;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use linesync::app_config::Config;
use linesync::file_utils::FileManager;
use linesync::providers::mock::MockProvider;
use linesync::sync::FileStatus;
use linesync::translation::TranslationCache;
use linesync::{Controller, RunReport, SyncOptions, SyncPaths};

use crate::common;

const GUIDE_PREVIOUS: &str = "# Guide\n\nFirst paragraph.\n";
const GUIDE_CURRENT: &str = "# Guide\n\nFirst paragraph.\n\nSecond paragraph.\n";
const GUIDE_TARGET: &str = "# ガイド\n\n最初の段落。\n";

/// previous/, current/ and target/ trees with one changed and one new document
fn create_trees(root: &Path) -> Result<SyncPaths> {
    common::create_test_file(root, "previous/guide.md", GUIDE_PREVIOUS)?;
    common::create_test_file(root, "current/guide.md", GUIDE_CURRENT)?;
    common::create_test_file(root, "target/guide.md", GUIDE_TARGET)?;
    common::create_test_file(root, "current/nested/intro.md", "# Intro\n\nWelcome.\n")?;
    common::create_test_file(root, "current/image.png", "not a document")?;

    Ok(SyncPaths {
        previous: root.join("previous"),
        current: root.join("current"),
        target: root.join("target"),
        output: None,
    })
}

fn test_controller() -> Result<Controller> {
    common::init_logging();
    let mut config = common::test_config();
    config.cache.enabled = false;
    Controller::with_config(config)
}

fn options() -> SyncOptions {
    SyncOptions {
        base_revision: "rev-1".to_string(),
        ..Default::default()
    }
}

async fn run(controller: &Controller, paths: &SyncPaths, options: &SyncOptions) -> Result<RunReport> {
    controller
        .run_sync_with(
            Arc::new(MockProvider::working()),
            TranslationCache::in_memory("ja"),
            paths,
            options,
        )
        .await
}

/// Test the controller initialization with default config
#[test]
fn test_controller_withDefaultConfig_shouldInitialize() -> Result<()> {
    let controller = Controller::with_config(Config::default())?;
    assert!(controller.is_initialized());
    assert_eq!(controller.config().target_language, "ja");
    Ok(())
}

/// A directory sync updates changed documents and creates new ones
#[tokio::test]
async fn test_runSync_withDirectories_shouldWriteTargets() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let paths = create_trees(temp_dir.path())?;
    let controller = test_controller()?;

    let report = run(&controller, &paths, &options()).await?;

    let reported: Vec<&str> = report.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(reported, vec!["guide.md", "nested/intro.md"]);
    assert!(report.files.iter().all(|f| f.status == FileStatus::Synced));
    assert!(!report.has_failures());
    assert_eq!(report.base_revision, "rev-1");

    let guide = FileManager::read_to_string(paths.target.join("guide.md"))?;
    assert_eq!(guide, "# ガイド\n\n最初の段落。\n\n[ja] Second paragraph.\n");
    let intro = FileManager::read_to_string(paths.target.join("nested/intro.md"))?;
    assert_eq!(intro, "# [ja] Intro\n\n[ja] Welcome.\n");
    Ok(())
}

/// A second run over the synced trees changes nothing
#[tokio::test]
async fn test_runSync_afterSync_shouldReportUnchanged() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let paths = create_trees(temp_dir.path())?;
    let controller = test_controller()?;
    run(&controller, &paths, &options()).await?;

    // The synced trees become the new baseline
    fs::remove_dir_all(&paths.previous)?;
    fs::create_dir_all(&paths.previous)?;
    for relative in ["guide.md", "nested/intro.md"] {
        let content = FileManager::read_to_string(paths.current.join(relative))?;
        FileManager::write_to_file(paths.previous.join(relative), &content)?;
    }

    let mock = MockProvider::working();
    let report = controller
        .run_sync_with(Arc::new(mock.clone()), TranslationCache::in_memory("ja"), &paths, &options())
        .await?;

    assert!(report.files.iter().all(|f| f.status == FileStatus::Unchanged));
    assert_eq!(report.oracle_requests, 0);
    assert_eq!(mock.request_count(), 0);
    Ok(())
}

/// A dry run reports what would change and writes nothing
#[tokio::test]
async fn test_runSync_withDryRun_shouldNotWriteFiles() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let paths = create_trees(temp_dir.path())?;
    let controller = test_controller()?;
    let options = SyncOptions {
        dry_run: true,
        ..options()
    };

    let report = controller.run_sync(&paths, &options).await?;

    assert!(report.dry_run);
    assert_eq!(report.count(FileStatus::Synced), 2);
    assert_eq!(FileManager::read_to_string(paths.target.join("guide.md"))?, GUIDE_TARGET);
    assert!(!FileManager::file_exists(paths.target.join("nested/intro.md")));
    Ok(())
}

/// Results go to the output tree when one is given
#[tokio::test]
async fn test_runSync_withOutputDir_shouldLeaveTargetUntouched() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut paths = create_trees(temp_dir.path())?;
    paths.output = Some(temp_dir.path().join("out"));
    let controller = test_controller()?;

    run(&controller, &paths, &options()).await?;

    assert_eq!(FileManager::read_to_string(paths.target.join("guide.md"))?, GUIDE_TARGET);
    assert!(FileManager::file_exists(temp_dir.path().join("out/guide.md")));
    assert!(FileManager::file_exists(temp_dir.path().join("out/nested/intro.md")));
    Ok(())
}

/// The run report is written as JSON and reads back
#[tokio::test]
async fn test_runSync_withReportPath_shouldWriteJsonReport() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let paths = create_trees(temp_dir.path())?;
    let controller = test_controller()?;
    let report_path = temp_dir.path().join("reports/run.json");
    let options = SyncOptions {
        report: Some(report_path.clone()),
        ..options()
    };

    let report = run(&controller, &paths, &options).await?;

    let written: RunReport = serde_json::from_str(&FileManager::read_to_string(&report_path)?)?;
    assert_eq!(written.run_id, report.run_id);
    assert_eq!(written.files.len(), 2);
    assert!(written.cache.is_some());
    Ok(())
}

/// The file limit caps the run in path order
#[tokio::test]
async fn test_runSync_withLimit_shouldProcessFirstFilesOnly() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let paths = create_trees(temp_dir.path())?;
    let controller = test_controller()?;
    let options = SyncOptions {
        limit: Some(1),
        ..options()
    };

    let report = run(&controller, &paths, &options).await?;

    assert_eq!(report.files.len(), 1);
    assert_eq!(report.files[0].path, "guide.md");
    assert!(!FileManager::file_exists(paths.target.join("nested/intro.md")));
    Ok(())
}

/// One broken target fails its file without stopping the others
#[tokio::test]
async fn test_runSync_withMisalignedTarget_shouldFailOnlyThatFile() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let paths = create_trees(temp_dir.path())?;
    common::create_test_file(temp_dir.path(), "target/guide.md", "# ガイド\n")?;
    let controller = test_controller()?;

    let report = run(&controller, &paths, &options()).await?;

    assert!(report.has_failures());
    assert_eq!(report.count(FileStatus::Failed), 1);
    assert_eq!(FileManager::read_to_string(paths.target.join("guide.md"))?, "# ガイド\n");
    assert!(FileManager::file_exists(paths.target.join("nested/intro.md")));
    Ok(())
}

/// Single-file mode syncs one document against explicit paths
#[tokio::test]
async fn test_runSync_withSingleFile_shouldUseFileName() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let root = temp_dir.path();
    let previous = common::create_test_file(root, "old.md", GUIDE_PREVIOUS)?;
    let current = common::create_test_file(root, "new.md", GUIDE_CURRENT)?;
    let target = common::create_test_file(root, "ja.md", GUIDE_TARGET)?;
    let paths = SyncPaths {
        previous,
        current,
        target: target.clone(),
        output: None,
    };

    let report = run(&test_controller()?, &paths, &options()).await?;

    assert_eq!(report.files.len(), 1);
    assert_eq!(report.files[0].path, "new.md");
    assert_eq!(
        FileManager::read_lines(&target)?,
        common::lines("# ガイド\n\n最初の段落。\n\n[ja] Second paragraph.")
    );
    Ok(())
}

/// Verification flags translations that lost structure
#[tokio::test]
async fn test_verifyPaths_shouldReportBrokenTranslations() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let paths = create_trees(temp_dir.path())?;
    let controller = test_controller()?;
    run(&controller, &paths, &options()).await?;

    let reports = controller.verify_paths(&paths.current, &paths.target)?;
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.passed));

    common::create_test_file(temp_dir.path(), "target/nested/intro.md", "[ja] Intro\n\n[ja] Welcome.\n")?;
    let reports = controller.verify_paths(&paths.current, &paths.target)?;
    let broken: Vec<&str> = reports.iter().filter(|r| !r.passed).map(|r| r.path.as_str()).collect();
    assert_eq!(broken, vec!["nested/intro.md"]);
    Ok(())
}
