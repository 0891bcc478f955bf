/*!
 * Structural comparison of a source document and its translation.
 *
 * The translation must have the same number of lines, the same fenced code
 * (count, info language and bytes), the same tables (count, rows, cells per
 * row) and the same headings (count and level). Placeholder syntax must not
 * survive into the target.
 */

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::document::placeholder::contains_token_syntax;
use crate::document::segmenter::{count_cells, heading_level, Block, BlockKind, Fence, Segmenter};

/// A structural difference between source and target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    LineCount { source: usize, target: usize },
    FenceCount { source: usize, target: usize },
    FenceLanguage { fence: usize, source: String, target: String },
    /// First differing line (1-based) inside a fence
    FenceContent { fence: usize, line: usize },
    TableCount { source: usize, target: usize },
    TableRows { table: usize, source: usize, target: usize },
    TableColumns { table: usize, row: usize, source: usize, target: usize },
    HeadingCount { source: usize, target: usize },
    HeadingLevel { heading: usize, source: usize, target: usize },
    LeakedPlaceholder { line: usize },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LineCount { source, target } => {
                write!(f, "line count differs: source has {}, target has {}", source, target)
            }
            Self::FenceCount { source, target } => {
                write!(f, "code fence count differs: source has {}, target has {}", source, target)
            }
            Self::FenceLanguage { fence, source, target } => write!(
                f,
                "code fence #{} language differs: source '{}', target '{}'",
                fence + 1,
                source,
                target
            ),
            Self::FenceContent { fence, line } => {
                write!(f, "code fence #{} content differs at line {}", fence + 1, line)
            }
            Self::TableCount { source, target } => {
                write!(f, "table count differs: source has {}, target has {}", source, target)
            }
            Self::TableRows { table, source, target } => write!(
                f,
                "table #{} row count differs: source has {}, target has {}",
                table + 1,
                source,
                target
            ),
            Self::TableColumns { table, row, source, target } => write!(
                f,
                "table #{} row {} has {} cell(s), source has {}",
                table + 1,
                row + 1,
                target,
                source
            ),
            Self::HeadingCount { source, target } => {
                write!(f, "heading count differs: source has {}, target has {}", source, target)
            }
            Self::HeadingLevel { heading, source, target } => write!(
                f,
                "heading #{} level differs: source h{}, target h{}",
                heading + 1,
                source,
                target
            ),
            Self::LeakedPlaceholder { line } => write!(f, "placeholder token left in target at line {}", line),
        }
    }
}

/// Structural summary of one document
struct Outline<'a> {
    lines: &'a [String],
    fences: Vec<Block>,
    tables: Vec<Block>,
    headings: Vec<usize>,
}

impl<'a> Outline<'a> {
    fn of(segmenter: &Segmenter, lines: &'a [String]) -> Self {
        let mut fences = Vec::new();
        let mut tables = Vec::new();
        let mut headings = Vec::new();

        for block in segmenter.segment(lines) {
            match block.kind {
                BlockKind::CodeFence => fences.push(block),
                BlockKind::Table => tables.push(block),
                BlockKind::Heading => headings.extend(block.lines.iter().filter_map(|l| heading_level(l))),
                _ => {}
            }
        }

        Self {
            lines,
            fences,
            tables,
            headings,
        }
    }
}

/// Checks that a translated document kept the source structure
#[derive(Debug, Default, Clone, Copy)]
pub struct AlignmentVerifier {
    segmenter: Segmenter,
}

impl AlignmentVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// All structural violations; empty when the target is aligned
    pub fn verify(&self, source: &[String], target: &[String]) -> Vec<Violation> {
        let mut violations = Vec::new();

        if source.len() != target.len() {
            violations.push(Violation::LineCount {
                source: source.len(),
                target: target.len(),
            });
        }

        let source_outline = Outline::of(&self.segmenter, source);
        let target_outline = Outline::of(&self.segmenter, target);

        Self::check_fences(&source_outline, &target_outline, &mut violations);
        Self::check_tables(&source_outline, &target_outline, &mut violations);
        Self::check_headings(&source_outline, &target_outline, &mut violations);
        Self::check_placeholders(source, target, &mut violations);

        debug!("Alignment check found {} violation(s)", violations.len());
        violations
    }

    fn check_fences(source: &Outline, target: &Outline, violations: &mut Vec<Violation>) {
        if source.fences.len() != target.fences.len() {
            violations.push(Violation::FenceCount {
                source: source.fences.len(),
                target: target.fences.len(),
            });
        }

        for (index, (src, tgt)) in source.fences.iter().zip(&target.fences).enumerate() {
            let src_lang = fence_language(src);
            let tgt_lang = fence_language(tgt);
            if src_lang != tgt_lang {
                violations.push(Violation::FenceLanguage {
                    fence: index,
                    source: src_lang,
                    target: tgt_lang,
                });
            }

            let src_lines = &source.lines[src.range.clone()];
            let tgt_lines = &target.lines[tgt.range.clone()];
            let first_difference = src_lines
                .iter()
                .zip(tgt_lines)
                .position(|(a, b)| a.as_bytes() != b.as_bytes())
                .or_else(|| (src_lines.len() != tgt_lines.len()).then(|| src_lines.len().min(tgt_lines.len())));
            if let Some(offset) = first_difference {
                violations.push(Violation::FenceContent {
                    fence: index,
                    line: tgt.range.start + offset + 1,
                });
            }
        }
    }

    fn check_tables(source: &Outline, target: &Outline, violations: &mut Vec<Violation>) {
        if source.tables.len() != target.tables.len() {
            violations.push(Violation::TableCount {
                source: source.tables.len(),
                target: target.tables.len(),
            });
        }

        for (index, (src, tgt)) in source.tables.iter().zip(&target.tables).enumerate() {
            if src.len() != tgt.len() {
                violations.push(Violation::TableRows {
                    table: index,
                    source: src.len(),
                    target: tgt.len(),
                });
            }
            for (row, (a, b)) in src.lines.iter().zip(&tgt.lines).enumerate() {
                let (source_cells, target_cells) = (count_cells(a), count_cells(b));
                if source_cells != target_cells {
                    violations.push(Violation::TableColumns {
                        table: index,
                        row,
                        source: source_cells,
                        target: target_cells,
                    });
                }
            }
        }
    }

    fn check_headings(source: &Outline, target: &Outline, violations: &mut Vec<Violation>) {
        if source.headings.len() != target.headings.len() {
            violations.push(Violation::HeadingCount {
                source: source.headings.len(),
                target: target.headings.len(),
            });
        }

        for (index, (src, tgt)) in source.headings.iter().zip(&target.headings).enumerate() {
            if src != tgt {
                violations.push(Violation::HeadingLevel {
                    heading: index,
                    source: *src,
                    target: *tgt,
                });
            }
        }
    }

    fn check_placeholders(source: &[String], target: &[String], violations: &mut Vec<Violation>) {
        for (index, line) in target.iter().enumerate() {
            let inherited = source.get(index).is_some_and(|s| contains_token_syntax(s));
            if contains_token_syntax(line) && !inherited {
                violations.push(Violation::LeakedPlaceholder { line: index + 1 });
            }
        }
    }
}

fn fence_language(block: &Block) -> String {
    block
        .lines
        .first()
        .and_then(|line| Fence::parse(line))
        .map(|fence| fence.language().to_string())
        .unwrap_or_default()
}
