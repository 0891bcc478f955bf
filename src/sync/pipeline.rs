/*!
 * Line-locked synchronization of one document.
 *
 * Diff the previous and current source, resolve an action per operation,
 * carry kept translations over one for one, and translate the rest block by
 * block: frame each line, protect spans, translate through the
 * orchestrator, reflow into the original line count, restore spans and
 * re-attach frames. The result is written only if it passes the alignment
 * verifier.
 */

use std::ops::Range;
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::document::placeholder::strip_tokens;
use crate::document::segmenter::is_table_separator;
use crate::document::{Block, BlockKind, FramedText, LineFrame, LineShape, TokenMap};
use crate::errors::SyncError;
use crate::policy::ChangeAction;
use crate::sync::context::SyncContext;
use crate::sync::report::{ChangeReport, FailedUnit, FileReport, FileStatus, VerificationReport};
use crate::translation::{CacheKey, TranslationUnit};

/// Inputs for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSyncRequest {
    /// Path relative to the document root
    pub path: String,
    pub base_revision: String,
    pub previous_source: Vec<String>,
    pub current_source: Vec<String>,
    pub current_target: Vec<String>,
}

/// Result of one file
#[derive(Debug, Clone)]
pub struct FileSyncOutcome {
    pub report: FileReport,
    /// New target lines, present only when the file passed verification
    pub lines: Option<Vec<String>>,
}

impl FileSyncOutcome {
    fn failed(report: FileReport) -> Self {
        Self { report, lines: None }
    }
}

/// A unit waiting for its translation
struct PendingUnit {
    id: usize,
    range: Range<usize>,
    framed: FramedText,
    tokens: TokenMap,
}

/// Target lines under construction
struct Draft<'a> {
    source: &'a [String],
    slots: Vec<Option<String>>,
}

impl<'a> Draft<'a> {
    fn copy_source(&mut self, range: Range<usize>) {
        for index in range {
            self.slots[index] = Some(self.source[index].clone());
        }
    }

    fn fill(&mut self, start: usize, lines: Vec<String>) {
        for (offset, line) in lines.into_iter().enumerate() {
            self.slots[start + offset] = Some(line);
        }
    }

    fn finish(self) -> Result<Vec<String>, SyncError> {
        self.slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| SyncError::AlignmentViolation(format!("line {} has no translation", index + 1)))
            })
            .collect()
    }
}

/// Syncs documents against a shared context
#[derive(Clone)]
pub struct SyncPipeline {
    context: Arc<SyncContext>,
}

impl SyncPipeline {
    pub fn new(context: Arc<SyncContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &SyncContext {
        &self.context
    }

    /// Sync one file; failures are reported, never raised
    pub async fn sync_file(&self, request: &FileSyncRequest) -> FileSyncOutcome {
        let ctx = &self.context;
        let path = request.path.as_str();
        let previous = &request.previous_source;
        let current = &request.current_source;

        if request.current_target.len() != previous.len() {
            let err = SyncError::AlignmentViolation(format!(
                "target has {} line(s) but the previous source has {}",
                request.current_target.len(),
                previous.len()
            ));
            error!("❌ {}: {}", path, err);
            return FileSyncOutcome::failed(FileReport::failed(path, err.to_string()));
        }

        let operations = ctx.diff.diff(previous, current);
        let resolved = ctx.resolver.resolve_all(&operations, previous, current).await;
        let change = ChangeReport::new(path, &request.base_revision, resolved);

        let mut report = FileReport {
            path: path.to_string(),
            status: FileStatus::Unchanged,
            change: None,
            verification: None,
            translated_units: 0,
            cached_units: 0,
            failed_units: Vec::new(),
            error: None,
        };

        let mut draft = Draft {
            source: current,
            slots: vec![None; current.len()],
        };
        let mut dirty = vec![false; current.len()];

        for resolved in &change.operations {
            let op = &resolved.operation;
            match resolved.action {
                ChangeAction::KeepExisting => {
                    for (offset, index) in op.current.clone().enumerate() {
                        let old_index = op.previous.start + offset;
                        draft.slots[index] = request
                            .current_target
                            .get(old_index)
                            .map(|target| carry_over(&previous[old_index], &current[index], target));
                    }
                }
                ChangeAction::TranslateNew | ChangeAction::Retranslate => {
                    dirty[op.current.clone()].iter_mut().for_each(|d| *d = true);
                }
                ChangeAction::DeleteExisting => {}
            }
        }

        let blocks = ctx.segmenter.segment(current);
        let mut pending = Vec::new();
        let mut units = Vec::new();
        for block in &blocks {
            self.plan_block(request, block, &dirty, &mut draft, &mut pending, &mut units);
        }

        debug!("{}: {} unit(s) to translate", path, units.len());
        let mut results = if units.is_empty() {
            Default::default()
        } else {
            ctx.orchestrator.translate(path, units).await
        };

        for unit in pending {
            let start = unit.range.start;
            match results.remove(&unit.id) {
                Some(Ok(result)) => {
                    if result.from_cache {
                        report.cached_units += 1;
                    } else {
                        report.translated_units += 1;
                    }
                    match self.render(unit.framed, unit.tokens, &result.text) {
                        Ok(lines) => draft.fill(start, lines),
                        Err(e) => return Self::fail(report, change, e),
                    }
                }
                Some(Err(e)) if e.is_file_fatal() => return Self::fail(report, change, e),
                Some(Err(e)) => {
                    warn!(
                        "{}: lines {}-{} left untranslated: {}",
                        path,
                        unit.range.start + 1,
                        unit.range.end,
                        e
                    );
                    report.failed_units.push(FailedUnit {
                        start_line: unit.range.start + 1,
                        end_line: unit.range.end,
                        error: e.to_string(),
                    });
                    draft.copy_source(unit.range);
                }
                None => {
                    report.failed_units.push(FailedUnit {
                        start_line: unit.range.start + 1,
                        end_line: unit.range.end,
                        error: "no translation returned".to_string(),
                    });
                    draft.copy_source(unit.range);
                }
            }
        }

        let lines = match draft.finish() {
            Ok(lines) => lines,
            Err(e) => return Self::fail(report, change, e),
        };

        let verification = VerificationReport::new(path, ctx.verifier.verify(current, &lines));
        if !verification.passed {
            for violation in &verification.violations {
                error!("❌ {}: {}", path, violation);
            }
            report.status = FileStatus::Failed;
            report.error = Some(format!(
                "alignment violation: {} structural violation(s)",
                verification.violations.len()
            ));
            report.change = Some(change);
            report.verification = Some(verification);
            return FileSyncOutcome::failed(report);
        }

        report.status = if lines == request.current_target {
            FileStatus::Unchanged
        } else {
            FileStatus::Synced
        };
        info!(
            "{}: kept {}, inserted {}, replaced {}, deleted {} ({} translated, {} cached, {} failed unit(s))",
            path,
            change.kept,
            change.inserted,
            change.replaced,
            change.deleted,
            report.translated_units,
            report.cached_units,
            report.failed_units.len()
        );
        report.change = Some(change);
        report.verification = Some(verification);
        FileSyncOutcome {
            report,
            lines: Some(lines),
        }
    }

    fn fail(mut report: FileReport, change: ChangeReport, error: SyncError) -> FileSyncOutcome {
        error!("❌ {}: {}", report.path, error);
        report.status = FileStatus::Failed;
        report.error = Some(error.to_string());
        report.change = Some(change);
        FileSyncOutcome::failed(report)
    }

    /// Decide per block what is copied and what becomes a unit
    fn plan_block(
        &self,
        request: &FileSyncRequest,
        block: &Block,
        dirty: &[bool],
        draft: &mut Draft,
        pending: &mut Vec<PendingUnit>,
        units: &mut Vec<TranslationUnit>,
    ) {
        // fences, frontmatter and markup-only HTML always follow the source
        if !block.translatable {
            draft.copy_source(block.range.clone());
            return;
        }

        for run in dirty_runs(dirty, block.range.clone()) {
            if block.kind == BlockKind::Table {
                for index in run {
                    let row = &request.current_source[index..index + 1];
                    if !is_table_separator(&row[0]) {
                        self.plan_unit(request, index..index + 1, FramedText::from_table_rows(row), draft, pending, units);
                    }
                }
            } else {
                let framed = FramedText::from_lines(&request.current_source[run.clone()]);
                self.plan_unit(request, run, framed, draft, pending, units);
            }
        }

        if block.kind == BlockKind::Table {
            for index in block.range.clone() {
                if is_table_separator(&request.current_source[index]) {
                    draft.copy_source(index..index + 1);
                }
            }
        }
    }

    fn plan_unit(
        &self,
        request: &FileSyncRequest,
        range: Range<usize>,
        framed: FramedText,
        draft: &mut Draft,
        pending: &mut Vec<PendingUnit>,
        units: &mut Vec<TranslationUnit>,
    ) {
        let ctx = &self.context;
        let lines = &request.current_source[range.clone()];
        if framed.is_all_blank() {
            draft.copy_source(range);
            return;
        }

        let protected = match ctx.protector.protect(&framed.body_text()) {
            Ok(protected) => protected,
            Err(e) => {
                warn!("{}: lines {}-{} copied as is: {}", request.path, range.start + 1, range.end, e);
                draft.copy_source(range);
                return;
            }
        };
        if !strip_tokens(&protected.masked).chars().any(char::is_alphabetic) {
            draft.copy_source(range);
            return;
        }

        let context_chars = ctx.config.sync.context_chars;
        let id = units.len();
        units.push(
            TranslationUnit::new(id, protected.masked)
                .with_context(
                    context_before(&request.current_source, range.start, context_chars),
                    context_after(&request.current_source, range.end, context_chars),
                )
                .with_cache_key(CacheKey::new(&request.path, &request.base_revision, &lines.join("\n"))),
        );
        pending.push(PendingUnit {
            id,
            range,
            framed,
            tokens: protected.tokens,
        });
    }

    /// Reflow, restore and re-frame one translated unit
    fn render(&self, framed: FramedText, tokens: TokenMap, text: &str) -> Result<Vec<String>, SyncError> {
        let ctx = &self.context;
        let shape = LineShape::from_widths(framed.body_widths());
        let bodies = ctx.reflow.reflow(text, &shape)?;
        let restored = ctx.protector.restore(&bodies.join("\n"), tokens)?;
        let bodies: Vec<String> = restored.split('\n').map(str::to_string).collect();
        if bodies.len() != framed.len() {
            return Err(SyncError::AlignmentViolation(format!(
                "restored text has {} line(s), expected {}",
                bodies.len(),
                framed.len()
            )));
        }
        Ok(framed.wrap_all(&bodies))
    }
}

/// A kept translation line re-framed to the current source line.
///
/// Cosmetic edits may still change the markdown around a line, such as a
/// heading level or list marker; the target takes the new frame and keeps
/// its translated body.
fn carry_over(previous: &str, current: &str, target: &str) -> String {
    let old_frame = LineFrame::split(previous);
    let new_frame = LineFrame::split(current);
    if old_frame.prefix == new_frame.prefix && old_frame.suffix == new_frame.suffix {
        return target.to_string();
    }
    new_frame.wrap(&LineFrame::split(target).body)
}

/// Maximal runs of dirty lines inside `range`
fn dirty_runs(dirty: &[bool], range: Range<usize>) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    let mut start = None;
    for index in range.clone() {
        match (dirty[index], start) {
            (true, None) => start = Some(index),
            (false, Some(s)) => {
                runs.push(s..index);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push(s..range.end);
    }
    runs
}

/// Up to `max_chars` of source text just before line `start`
fn context_before(lines: &[String], start: usize, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    let mut picked = Vec::new();
    let mut total = 0;
    for line in lines[..start].iter().rev() {
        if total >= max_chars {
            break;
        }
        total += line.chars().count() + 1;
        picked.push(line.as_str());
    }
    picked.reverse();
    let text = picked.join("\n");
    let text = text.trim();
    let skip = text.chars().count().saturating_sub(max_chars);
    text.chars().skip(skip).collect()
}

/// Up to `max_chars` of source text from line `end` on
fn context_after(lines: &[String], end: usize, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    let mut picked = Vec::new();
    let mut total = 0;
    for line in &lines[end.min(lines.len())..] {
        if total >= max_chars {
            break;
        }
        total += line.chars().count() + 1;
        picked.push(line.as_str());
    }
    picked.join("\n").trim().chars().take(max_chars).collect()
}
