/*!
 * End-to-end tests for syncing a single document
 */

use std::sync::Arc;

use linesync::providers::mock::MockProvider;
use linesync::sync::{FileStatus, FileSyncOutcome, SyncPipeline, SyncStrategy};
use linesync::translation::TranslationCache;

use crate::common::mock_providers::OneLineProvider;
use crate::common::{self, SAMPLE_DOC};

fn working_pipeline(mock: &MockProvider, cache: TranslationCache) -> SyncPipeline {
    common::pipeline_with(Arc::new(mock.clone()), cache)
}

fn synced_lines(outcome: FileSyncOutcome) -> Vec<String> {
    assert!(
        !outcome.report.is_failed(),
        "sync failed: {:?}",
        outcome.report.error
    );
    outcome.lines.expect("verified files carry lines")
}

/// Translate SAMPLE_DOC from scratch and return the translation
async fn translated_sample() -> Vec<String> {
    let mock = MockProvider::working();
    let outcome = working_pipeline(&mock, TranslationCache::in_memory("ja"))
        .sync_file(&common::request("", SAMPLE_DOC, ""))
        .await;
    synced_lines(outcome)
}

/// A first sync translates every prose line and leaves structure alone
#[tokio::test]
async fn test_syncFile_withEmptyTarget_shouldTranslateWholeDocument() {
    let mock = MockProvider::working();
    let outcome = working_pipeline(&mock, TranslationCache::in_memory("ja"))
        .sync_file(&common::request("", SAMPLE_DOC, ""))
        .await;

    let change = outcome.report.change.clone().expect("change report");
    assert_eq!(change.strategy, SyncStrategy::FullTranslation);
    assert_eq!(outcome.report.status, FileStatus::Synced);

    let source = common::lines(SAMPLE_DOC);
    let lines = synced_lines(outcome);
    assert_eq!(lines.len(), source.len());
    assert_eq!(lines[0..3], source[0..3], "frontmatter is copied");
    assert_eq!(lines[4], "# [ja] Getting started");
    assert_eq!(lines[10..13], source[10..13], "code fence is copied");
    assert_eq!(lines[15], source[15], "table separator is copied");
    assert_eq!(lines[17], "| [ja] `--limit` | Cap the file count |");
    assert_eq!(lines[19], "> [ja] Note: the cache lives in your data directory.");
    assert_eq!(lines[22], "- [ja] Second item");
    assert!(lines[7].contains("(https://example.com/config)"));
}

/// Structural edits of every kind keep the output aligned with the source
#[tokio::test]
async fn test_syncFile_withAssortedEdits_shouldKeepLineCountAndStructure() {
    let target = translated_sample().await;
    let edits = [
        SAMPLE_DOC.replace(
            "# Getting started\n",
            "# Getting started\n\nA brand new introduction paragraph for readers.\n",
        ),
        SAMPLE_DOC.replace("> Note: the cache lives in your data directory.\n\n", ""),
        SAMPLE_DOC.replace("- Second item", "- Second item with considerably more words than before"),
        SAMPLE_DOC.replace(
            "| `--limit` | Cap the file count |",
            "| `--limit` | Cap the file count |\n| `--report` | Write a JSON report |",
        ),
        SAMPLE_DOC.replace("linesync sync --dry-run", "linesync sync --dry-run --limit 3"),
        SAMPLE_DOC.replace("---\ntitle: Guide\n---\n\n", ""),
    ];

    for current in edits {
        let mock = MockProvider::working();
        let outcome = working_pipeline(&mock, TranslationCache::in_memory("ja"))
            .sync_file(&common::request(SAMPLE_DOC, &current, &target.join("\n")))
            .await;

        let verification = outcome.report.verification.clone().expect("verification report");
        assert!(verification.passed, "violations: {:?}", verification.violations);
        let lines = synced_lines(outcome);
        assert_eq!(lines.len(), common::lines(&current).len());
    }
}

/// Code inside fences always follows the current source
#[tokio::test]
async fn test_syncFile_withEditedCodeBlock_shouldCopyFenceFromSource() {
    let target = translated_sample().await;
    let current = SAMPLE_DOC.replace("linesync sync --dry-run", "linesync sync --dry-run --limit 3");

    let mock = MockProvider::working();
    let lines = synced_lines(
        working_pipeline(&mock, TranslationCache::in_memory("ja"))
            .sync_file(&common::request(SAMPLE_DOC, &current, &target.join("\n")))
            .await,
    );

    let source = common::lines(&current);
    assert_eq!(lines[10..13], source[10..13]);
    assert_eq!(mock.batch_request_count(), 0);
}

/// Running the same sync again is served from the cache with identical output
#[tokio::test]
async fn test_syncFile_twiceWithSharedCache_shouldNotCallOracleAgain() {
    let cache = TranslationCache::in_memory("ja");
    let request = common::request("", SAMPLE_DOC, "");

    let first_mock = MockProvider::working();
    let first = synced_lines(working_pipeline(&first_mock, cache.clone()).sync_file(&request).await);
    assert!(first_mock.batch_request_count() > 0);

    let second_mock = MockProvider::working();
    let outcome = working_pipeline(&second_mock, cache.clone()).sync_file(&request).await;
    assert_eq!(outcome.report.translated_units, 0);
    assert!(outcome.report.cached_units > 0);
    assert_eq!(synced_lines(outcome), first);
    assert_eq!(second_mock.request_count(), 0);
}

/// An unchanged source leaves the target untouched without any oracle call
#[tokio::test]
async fn test_syncFile_withUnchangedSource_shouldKeepTarget() {
    let target = translated_sample().await;
    let mock = MockProvider::working();
    let outcome = working_pipeline(&mock, TranslationCache::in_memory("ja"))
        .sync_file(&common::request(SAMPLE_DOC, SAMPLE_DOC, &target.join("\n")))
        .await;

    assert_eq!(outcome.report.status, FileStatus::Unchanged);
    assert_eq!(outcome.report.change.as_ref().map(|c| c.strategy), Some(SyncStrategy::KeepExisting));
    assert_eq!(synced_lines(outcome), target);
    assert_eq!(mock.request_count(), 0);
}

/// A typo fix on a long line keeps the existing translation
#[tokio::test]
async fn test_syncFile_withTypoFix_shouldKeepExistingTranslation() {
    let previous = "# Guide\n\nThe configuration file is read once at startup and cached for the remainder of the sesion.";
    let current = "# Guide\n\nThe configuration file is read once at startup and cached for the remainder of the session.";
    let target = "# ガイド\n\n設定ファイルは起動時に一度だけ読み込まれ、セッションの間キャッシュされます。";

    let mock = MockProvider::working();
    let outcome = working_pipeline(&mock, TranslationCache::in_memory("ja"))
        .sync_file(&common::request(previous, current, target))
        .await;

    assert_eq!(outcome.report.status, FileStatus::Unchanged);
    assert_eq!(outcome.report.change.as_ref().map(|c| c.kept), Some(3));
    assert_eq!(synced_lines(outcome), common::lines(target));
    assert_eq!(mock.request_count(), 0);
}

/// Added punctuation is cosmetic even when the line is short
#[tokio::test]
async fn test_syncFile_withPunctuationOnlyEdit_shouldKeepTargetWithoutOracle() {
    let mock = MockProvider::working();
    let outcome = working_pipeline(&mock, TranslationCache::in_memory("ja"))
        .sync_file(&common::request("A\nB\nC", "A\nB!\nC", "あ\nい\nう"))
        .await;

    assert_eq!(outcome.report.status, FileStatus::Unchanged);
    assert_eq!(outcome.report.change.as_ref().map(|c| c.kept), Some(3));
    assert_eq!(synced_lines(outcome), common::lines("あ\nい\nう"));
    assert_eq!(mock.request_count(), 0);
}

/// A heading moved to another level keeps its translation at the new level
#[tokio::test]
async fn test_syncFile_withHeadingLevelChange_shouldPassVerification() {
    let mock = MockProvider::working();
    let outcome = working_pipeline(&mock, TranslationCache::in_memory("ja"))
        .sync_file(&common::request(
            "# Installation guide\n\nText",
            "## Installation guide\n\nText",
            "# インストールガイド\n\nテキスト",
        ))
        .await;

    assert_eq!(outcome.report.status, FileStatus::Synced);
    assert_eq!(synced_lines(outcome), common::lines("## インストールガイド\n\nテキスト"));
    assert_eq!(mock.request_count(), 0);
}

/// A new paragraph is translated; everything around it is kept
#[tokio::test]
async fn test_syncFile_withAppendedParagraph_shouldTranslateOnlyNewLines() {
    let previous = "First paragraph.\n\nSecond paragraph.";
    let current = "First paragraph.\n\nSecond paragraph.\n\nThird paragraph.";
    let target = "最初の段落。\n\n二番目の段落。";

    let mock = MockProvider::working();
    let outcome = working_pipeline(&mock, TranslationCache::in_memory("ja"))
        .sync_file(&common::request(previous, current, target))
        .await;

    assert_eq!(outcome.report.translated_units, 1);
    assert_eq!(outcome.report.change.as_ref().map(|c| c.inserted), Some(2));
    assert_eq!(
        synced_lines(outcome),
        common::lines("最初の段落。\n\n二番目の段落。\n\n[ja] Third paragraph.")
    );
    assert_eq!(mock.batch_request_count(), 1);
}

/// A rewritten, longer paragraph answered on one line is reflowed into the source shape
#[tokio::test]
async fn test_syncFile_withOneLineAnswer_shouldReflowIntoParagraphShape() {
    let previous = "The sync command compares two snapshots\n\
                    of the source tree and decides, line by\n\
                    line, which translated lines can stay\n\
                    and which ones must be sent back to the\n\
                    translator for a fresh translation.";
    let current = "Every run begins by loading the cache from disk so that\n\
                   blocks translated in earlier runs are never paid for twice,\n\
                   even when the surrounding paragraphs have moved to another\n\
                   place in the file or the whole section was renamed by a\n\
                   contributor who did not touch the text of the block itself.";
    let target = "La commande compare deux instantanés\n\
                  de l'arbre source et décide, ligne par\n\
                  ligne, quelles lignes traduites restent\n\
                  et lesquelles doivent être renvoyées au\n\
                  traducteur pour une nouvelle traduction.";

    let provider = OneLineProvider::new();
    let outcome = common::pipeline_with(Arc::new(provider.clone()), TranslationCache::in_memory("fr"))
        .sync_file(&common::request(previous, current, target))
        .await;

    assert_eq!(outcome.report.change.as_ref().map(|c| c.replaced), Some(5));
    let lines = synced_lines(outcome);
    assert_eq!(lines.len(), 5);
    assert!(lines.iter().all(|line| !line.trim().is_empty()));

    let expected: Vec<String> = std::iter::once("[fr]".to_string())
        .chain(common::lines(current).join(" ").split_whitespace().map(String::from))
        .collect();
    let actual: Vec<String> = lines.join(" ").split_whitespace().map(String::from).collect();
    assert_eq!(actual, expected);
    assert_eq!(provider.call_count(), 1);
}

/// Removed lines drop their translations and nothing is sent out
#[tokio::test]
async fn test_syncFile_withDeletedParagraph_shouldDropItsTranslation() {
    let previous = "First paragraph.\n\nSecond paragraph.\n\nThird paragraph.";
    let current = "First paragraph.\n\nThird paragraph.";
    let target = "最初の段落。\n\n二番目の段落。\n\n三番目の段落。";

    let mock = MockProvider::working();
    let outcome = working_pipeline(&mock, TranslationCache::in_memory("ja"))
        .sync_file(&common::request(previous, current, target))
        .await;

    assert_eq!(outcome.report.status, FileStatus::Synced);
    assert_eq!(outcome.report.change.as_ref().map(|c| c.deleted), Some(2));
    assert_eq!(synced_lines(outcome), common::lines("最初の段落。\n\n三番目の段落。"));
    assert_eq!(mock.request_count(), 0);
}

/// An unreachable oracle leaves new lines in the source language
#[tokio::test]
async fn test_syncFile_withFailingProvider_shouldKeepSourceForNewLines() {
    let target = translated_sample().await;
    let current = SAMPLE_DOC.replace(
        "# Getting started\n",
        "# Getting started\n\nA brand new introduction paragraph for readers.\n",
    );

    let mock = MockProvider::failing();
    let outcome = working_pipeline(&mock, TranslationCache::in_memory("ja"))
        .sync_file(&common::request(SAMPLE_DOC, &current, &target.join("\n")))
        .await;

    assert_eq!(outcome.report.status, FileStatus::Synced);
    assert_eq!(outcome.report.failed_units.len(), 1);
    assert_eq!(outcome.report.failed_units[0].start_line, 7);

    let lines = synced_lines(outcome);
    assert_eq!(lines[6], "A brand new introduction paragraph for readers.");
    assert_eq!(lines[4], target[4], "kept lines stay translated");
}

/// Answers that lose placeholders fall back to the source; clean answers are used
#[tokio::test]
async fn test_syncFile_withCorruptedPlaceholders_shouldFallBackOnlyForMaskedUnits() {
    let previous = "Intro.";
    let current = "Intro.\n\nRun `linesync verify` after every sync.\n\nPlain words only here.";
    let target = "導入。";

    let mock = MockProvider::corrupting();
    let outcome = working_pipeline(&mock, TranslationCache::in_memory("ja"))
        .sync_file(&common::request(previous, current, target))
        .await;

    assert_eq!(outcome.report.failed_units.len(), 1);
    assert_eq!(outcome.report.failed_units[0].start_line, 3);
    let lines = synced_lines(outcome);
    assert_eq!(lines[2], "Run `linesync verify` after every sync.");
    assert_eq!(lines[4], "[ja] Plain words only here.");
    assert!(lines.iter().all(|line| !line.contains('⟦')));
}

/// A target out of step with the previous source is refused
#[tokio::test]
async fn test_syncFile_withMisalignedTarget_shouldFailWithoutLines() {
    let mock = MockProvider::working();
    let outcome = working_pipeline(&mock, TranslationCache::in_memory("ja"))
        .sync_file(&common::request("A\n\nB", "A\n\nB\n\nC", "あ"))
        .await;

    assert!(outcome.report.is_failed());
    assert!(outcome.report.error.as_deref().unwrap_or_default().contains("line"));
    assert!(outcome.lines.is_none());
    assert_eq!(mock.request_count(), 0);
}
