/*!
 * Line-level diffing between two revisions of a source document.
 *
 * The engine aligns the previous and current line sequences with a
 * longest-common-subsequence diff and coalesces the result into an ordered,
 * gap-free list of [`LineOperation`]s. Runs that both remove and add lines
 * become a single `replace` carrying a character-level similarity ratio.
 */

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use similar::{capture_diff_slices, Algorithm, DiffTag, TextDiff};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// Kind of a line operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Equal,
    Insert,
    Delete,
    Replace,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Equal => "equal",
            Self::Insert => "insert",
            Self::Delete => "delete",
            Self::Replace => "replace",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for OpKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "equal" => Ok(Self::Equal),
            "insert" => Ok(Self::Insert),
            "delete" => Ok(Self::Delete),
            "replace" => Ok(Self::Replace),
            _ => Err(anyhow!("Unknown line operation type: {}", s)),
        }
    }
}

/// One aligned run between the previous and current line sequences.
///
/// `previous` indexes the prior source snapshot, `current` the new one.
/// Ranges are half-open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineOperation {
    pub kind: OpKind,
    pub previous: Range<usize>,
    pub current: Range<usize>,
    /// Only set for `replace`
    pub similarity: Option<f64>,
}

impl LineOperation {
    /// Build an operation, rejecting shapes that contradict the kind
    pub fn new(
        kind: OpKind,
        previous: Range<usize>,
        current: Range<usize>,
        similarity: Option<f64>,
    ) -> Result<Self> {
        if previous.start > previous.end || current.start > current.end {
            return Err(anyhow!("Inverted range in {} operation", kind));
        }

        let valid = match kind {
            OpKind::Equal => previous.len() == current.len() && similarity.is_none(),
            OpKind::Insert => previous.is_empty() && !current.is_empty() && similarity.is_none(),
            OpKind::Delete => !previous.is_empty() && current.is_empty() && similarity.is_none(),
            OpKind::Replace => {
                !previous.is_empty()
                    && !current.is_empty()
                    && similarity.is_some_and(|s| (0.0..=1.0).contains(&s))
            }
        };

        if !valid {
            return Err(anyhow!(
                "Invalid {} operation: previous={:?} current={:?} similarity={:?}",
                kind,
                previous,
                current,
                similarity
            ));
        }

        Ok(Self {
            kind,
            previous,
            current,
            similarity,
        })
    }

    /// Number of lines this operation contributes to the current document
    pub fn current_len(&self) -> usize {
        self.current.len()
    }
}

/// Computes line operations between two line sequences
#[derive(Debug, Default, Clone, Copy)]
pub struct LineDiffEngine;

impl LineDiffEngine {
    pub fn new() -> Self {
        Self
    }

    /// Diff `previous` against `current`.
    ///
    /// Both empty yields an empty list; otherwise the operations partition
    /// both sequences in order.
    pub fn diff(&self, previous: &[String], current: &[String]) -> Vec<LineOperation> {
        let mut operations = Vec::new();
        let mut pending: Option<(Range<usize>, Range<usize>)> = None;

        for op in capture_diff_slices(Algorithm::Lcs, previous, current) {
            let (tag, old, new) = op.as_tag_tuple();
            if tag == DiffTag::Equal {
                if let Some((old_run, new_run)) = pending.take() {
                    operations.push(Self::classify_run(previous, current, old_run, new_run));
                }
                Self::push_equal(&mut operations, old, new);
            } else {
                pending = Some(match pending.take() {
                    Some((old_run, new_run)) => (
                        old_run.start.min(old.start)..old_run.end.max(old.end),
                        new_run.start.min(new.start)..new_run.end.max(new.end),
                    ),
                    None => (old, new),
                });
            }
        }

        if let Some((old_run, new_run)) = pending {
            operations.push(Self::classify_run(previous, current, old_run, new_run));
        }

        operations
    }

    // Adjacent equal runs from the diff backend are merged into one
    fn push_equal(operations: &mut Vec<LineOperation>, old: Range<usize>, new: Range<usize>) {
        if old.is_empty() {
            return;
        }
        if let Some(last) = operations.last_mut() {
            if last.kind == OpKind::Equal
                && last.previous.end == old.start
                && last.current.end == new.start
            {
                last.previous.end = old.end;
                last.current.end = new.end;
                return;
            }
        }
        operations.push(LineOperation {
            kind: OpKind::Equal,
            previous: old,
            current: new,
            similarity: None,
        });
    }

    fn classify_run(
        previous: &[String],
        current: &[String],
        old: Range<usize>,
        new: Range<usize>,
    ) -> LineOperation {
        let (kind, similarity) = if old.is_empty() {
            (OpKind::Insert, None)
        } else if new.is_empty() {
            (OpKind::Delete, None)
        } else {
            let before = previous[old.clone()].join("\n");
            let after = current[new.clone()].join("\n");
            (OpKind::Replace, Some(similarity_ratio(&before, &after)))
        };

        LineOperation {
            kind,
            previous: old,
            current: new,
            similarity,
        }
    }
}

/// LCS-based similarity ratio in `[0, 1]`: `2 * matches / (len_a + len_b)`
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Lcs)
        .diff_chars(a, b);
    f64::from(diff.ratio())
}

/// True when the operations cover both sequences in order with no gaps or overlaps
pub fn is_complete_partition(
    operations: &[LineOperation],
    previous_len: usize,
    current_len: usize,
) -> bool {
    let mut prev_cursor = 0;
    let mut cur_cursor = 0;
    for op in operations {
        if op.previous.start != prev_cursor || op.current.start != cur_cursor {
            return false;
        }
        prev_cursor = op.previous.end;
        cur_cursor = op.current.end;
    }
    prev_cursor == previous_len && cur_cursor == current_len
}
