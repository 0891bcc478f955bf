/*!
 * Integration tests for batching, retries and recovery from bad oracle answers
 */

use std::sync::Arc;

use linesync::providers::ModelTier;
use linesync::providers::mock::{MockJudgement, MockProvider};
use linesync::sync::{FileStatus, SyncContext, SyncPipeline};
use linesync::translation::TranslationCache;

use crate::common::{self, SAMPLE_DOC};

async fn reference_translation() -> Vec<String> {
    let outcome = common::pipeline_with(Arc::new(MockProvider::working()), TranslationCache::in_memory("ja"))
        .sync_file(&common::request("", SAMPLE_DOC, ""))
        .await;
    outcome.lines.expect("reference translation should verify")
}

/// Rate-limited calls are retried until the oracle answers
#[tokio::test]
async fn test_sync_withRateLimitedProvider_shouldRecoverAfterRetries() {
    let expected = reference_translation().await;

    let mock = MockProvider::rate_limited(2);
    let outcome = common::pipeline_with(Arc::new(mock.clone()), TranslationCache::in_memory("ja"))
        .sync_file(&common::request("", SAMPLE_DOC, ""))
        .await;

    assert_eq!(outcome.report.status, FileStatus::Synced);
    assert!(outcome.report.failed_units.is_empty());
    assert_eq!(outcome.lines, Some(expected));
    // one batch, two refusals
    assert_eq!(mock.request_count(), 3);
}

/// Transient server errors do not cost any translation
#[tokio::test]
async fn test_sync_withIntermittentProvider_shouldTranslateEverything() {
    let expected = reference_translation().await;

    let mut config = common::test_config();
    config.sync.batch_size = 2;
    // one call at a time, so a failure is always followed by a success
    config.sync.max_concurrent_requests = 1;
    let mock = MockProvider::intermittent(2);
    let outcome = common::pipeline_with_config(config, Arc::new(mock.clone()), TranslationCache::in_memory("ja"))
        .sync_file(&common::request("", SAMPLE_DOC, ""))
        .await;

    assert!(outcome.report.failed_units.is_empty());
    assert_eq!(outcome.lines, Some(expected));
}

/// Answers with missing items are split until every item comes back
#[tokio::test]
async fn test_sync_withDroppedItems_shouldSplitBatchesAndSucceed() {
    let expected = reference_translation().await;

    let mock = MockProvider::dropping(1);
    let outcome = common::pipeline_with(Arc::new(mock.clone()), TranslationCache::in_memory("ja"))
        .sync_file(&common::request("", SAMPLE_DOC, ""))
        .await;

    assert!(outcome.report.failed_units.is_empty());
    assert_eq!(outcome.lines, Some(expected));
    assert!(mock.batch_request_count() > 1);
}

/// Prose answers exhaust every fallback and leave the source in place
#[tokio::test]
async fn test_sync_withGarbageAnswers_shouldFallBackToSource() {
    let mock = MockProvider::garbage();
    let outcome = common::pipeline_with(Arc::new(mock.clone()), TranslationCache::in_memory("ja"))
        .sync_file(&common::request("", "# Title\n\nFirst line of text\nsecond line of text", ""))
        .await;

    assert_eq!(outcome.report.failed_units.len(), 2);
    assert_eq!(outcome.report.translated_units, 0);
    assert_eq!(
        outcome.lines,
        Some(common::lines("# Title\n\nFirst line of text\nsecond line of text"))
    );
}

/// The request budget aborts the run but keeps the file consistent
#[tokio::test]
async fn test_sync_withRequestBudget_shouldAbortAndKeepSourceLines() {
    let mut config = common::test_config();
    config.sync.batch_size = 1;
    config.sync.max_concurrent_requests = 1;
    config.sync.max_oracle_requests = Some(1);

    let mock = MockProvider::working();
    let pipeline = common::pipeline_with_config(config, Arc::new(mock.clone()), TranslationCache::in_memory("ja"));
    let outcome = pipeline
        .sync_file(&common::request("", "First paragraph.\n\nSecond paragraph.\n\nThird paragraph.", ""))
        .await;

    assert!(pipeline.context().orchestrator.is_aborted());
    assert_eq!(mock.request_count(), 1);
    assert_eq!(outcome.report.translated_units, 1);
    assert_eq!(outcome.report.failed_units.len(), 2);
    assert_eq!(outcome.lines.map(|l| l.len()), Some(5));
}

/// Each unit travels with the surrounding source text
#[tokio::test]
async fn test_sync_withNewParagraph_shouldSendNeighboursAsContext() {
    let mock = MockProvider::working();
    common::pipeline_with(Arc::new(mock.clone()), TranslationCache::in_memory("ja"))
        .sync_file(&common::request(
            "Opening paragraph.\n\nClosing paragraph.",
            "Opening paragraph.\n\nInserted paragraph.\n\nClosing paragraph.",
            "冒頭の段落。\n\n結びの段落。",
        ))
        .await;

    let requests = mock.recorded_requests();
    assert_eq!(requests.len(), 1);
    let prompt = &requests[0].prompt;
    assert!(prompt.contains("Inserted paragraph."));
    assert!(prompt.contains("Opening paragraph."));
    assert!(prompt.contains("Closing paragraph."));
    assert!(prompt.contains("Japanese"));
}

/// Large batches go to the high-accuracy model
#[tokio::test]
async fn test_sync_withLargeContent_shouldUseHighAccuracyTier() {
    let mut config = common::test_config();
    config.sync.high_accuracy_char_threshold = 20;

    let mock = MockProvider::working();
    let outcome = common::pipeline_with_config(config, Arc::new(mock.clone()), TranslationCache::in_memory("ja"))
        .sync_file(&common::request("", "A paragraph that is clearly longer than twenty characters.", ""))
        .await;

    let requests = mock.recorded_requests();
    assert_eq!(requests[0].tier, ModelTier::HighAccuracy);
    assert_eq!(outcome.report.status, FileStatus::Synced);
}

/// Semantic judgments count against the request budget like translations
#[tokio::test]
async fn test_sync_withSpentBudget_shouldNotAskSemanticJudge() {
    common::init_logging();
    let mut config = common::test_config();
    config.sync.max_oracle_requests = Some(0);

    let mock = MockProvider::working().with_judgement(MockJudgement::Always(false));
    let context = SyncContext::new(config, Arc::new(mock.clone()), TranslationCache::in_memory("ja"))
        .expect("context should build");
    let pipeline = SyncPipeline::new(Arc::new(context));
    let outcome = pipeline
        .sync_file(&common::request("Run the tests", "Deploy to production", "テストを実行"))
        .await;

    assert_eq!(mock.request_count(), 0);
    assert_eq!(mock.judge_request_count(), 0);
    assert!(pipeline.context().orchestrator.is_aborted());
    // the heuristic calls the rewrite meaningful and the aborted unit keeps the source
    assert_eq!(outcome.report.failed_units.len(), 1);
    assert_eq!(outcome.lines, Some(common::lines("Deploy to production")));
}

/// Judgments share the orchestrator's budget counter
#[tokio::test]
async fn test_sync_withOracleJudge_shouldCountJudgmentRequests() {
    let mock = MockProvider::working().with_judgement(MockJudgement::Always(true));
    let context = SyncContext::new(common::test_config(), Arc::new(mock.clone()), TranslationCache::in_memory("ja"))
        .expect("context should build");
    let pipeline = SyncPipeline::new(Arc::new(context));
    let outcome = pipeline
        .sync_file(&common::request("Run the tests", "Deploy to production", "テストを実行"))
        .await;

    assert_eq!(outcome.lines, Some(common::lines("[ja] Deploy to production")));
    assert_eq!(mock.judge_request_count(), 1);
    assert_eq!(mock.batch_request_count(), 1);
    assert_eq!(pipeline.context().orchestrator.request_count(), 2);
}
