/*!
 * Structural segmentation of markdown-like documents.
 *
 * A line-driven state machine (`Normal`, `CodeFence`, `Table`,
 * `Frontmatter`) splits a document into ordered blocks. Every line lands in
 * exactly one block; fences and tables are never split.
 */

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

static FENCE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)(`{3,}|~{3,})(.*)$").expect("Invalid fence regex"));
static HEADING_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s{0,3}(#{1,6})(?:\s|$)").expect("Invalid heading regex"));
static LIST_ITEM_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:[-*+]|\d{1,9}[.)])(?:\s+|$)").expect("Invalid list item regex")
});
static TABLE_SEPARATOR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\|?\s*:?-+:?\s*(?:\|\s*:?-+:?\s*)*\|?\s*$").expect("Invalid table separator regex")
});
static HTML_BLOCK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:<[A-Za-z][A-Za-z0-9-]*(?:\s[^>]*)?/?>|</[A-Za-z][A-Za-z0-9-]*\s*>|<!--)")
        .expect("Invalid HTML block regex")
});
static HTML_TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]*>").expect("Invalid HTML tag regex"));

const FRONTMATTER_DELIMITER: &str = "---";

/// Structural type of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Paragraph,
    Heading,
    ListItem,
    Table,
    CodeFence,
    Html,
    Frontmatter,
    /// A run of blank lines between blocks
    Blank,
}

impl BlockKind {
    /// Whether blocks of this kind may ever be sent for translation
    pub fn is_translatable(self) -> bool {
        !matches!(self, Self::CodeFence | Self::Frontmatter | Self::Blank)
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Paragraph => "paragraph",
            Self::Heading => "heading",
            Self::ListItem => "list_item",
            Self::Table => "table",
            Self::CodeFence => "code_fence",
            Self::Html => "html",
            Self::Frontmatter => "frontmatter",
            Self::Blank => "blank",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for BlockKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "paragraph" => Ok(Self::Paragraph),
            "heading" => Ok(Self::Heading),
            "list_item" => Ok(Self::ListItem),
            "table" => Ok(Self::Table),
            "code_fence" => Ok(Self::CodeFence),
            "html" => Ok(Self::Html),
            "frontmatter" => Ok(Self::Frontmatter),
            "blank" => Ok(Self::Blank),
            _ => Err(anyhow!("Unknown block type: {}", s)),
        }
    }
}

/// A contiguous run of lines with one structural type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    /// Line range in the segmented document
    pub range: Range<usize>,
    pub lines: Vec<String>,
    pub translatable: bool,
}

impl Block {
    fn new(kind: BlockKind, start: usize, lines: Vec<String>) -> Self {
        let translatable = match kind {
            // tag-only HTML has nothing to translate
            BlockKind::Html => lines
                .iter()
                .any(|l| HTML_TAG_REGEX.replace_all(l, "").chars().any(char::is_alphanumeric)),
            other => other.is_translatable(),
        };
        Self {
            kind,
            range: start..start + lines.len(),
            lines,
            translatable,
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Whether absolute line `index` belongs to this block
    pub fn contains_line(&self, index: usize) -> bool {
        self.range.contains(&index)
    }
}

/// Opening fence of a code block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fence {
    pub marker: char,
    pub length: usize,
    /// Info string after the marker, e.g. `rust`
    pub info: String,
}

impl Fence {
    /// Parse a line as an opening fence
    pub fn parse(line: &str) -> Option<Self> {
        let caps = FENCE_REGEX.captures(line)?;
        let run = caps.get(2)?.as_str();
        let marker = run.chars().next()?;
        let info = caps.get(3).map(|m| m.as_str().trim()).unwrap_or_default();
        // backtick fences cannot carry backticks in the info string
        if marker == '`' && info.contains('`') {
            return None;
        }
        Some(Self {
            marker,
            length: run.chars().count(),
            info: info.to_string(),
        })
    }

    /// Language tag: first word of the info string
    pub fn language(&self) -> &str {
        self.info.split_whitespace().next().unwrap_or("")
    }

    /// Whether `line` closes this fence: same marker, at least as long, nothing after
    pub fn is_closed_by(&self, line: &str) -> bool {
        match Self::parse(line) {
            Some(other) => other.marker == self.marker && other.length >= self.length && other.info.is_empty(),
            None => false,
        }
    }
}

/// Whether the line is a markdown heading; returns its level
pub fn heading_level(line: &str) -> Option<usize> {
    HEADING_REGEX
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().len())
}

/// Whether the line is a table alignment row like `|---|:--:|`
pub fn is_table_separator(line: &str) -> bool {
    line.contains('|') && TABLE_SEPARATOR_REGEX.is_match(line)
}

/// Whether the line looks like a pipe-delimited table row
pub fn is_table_row(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || !trimmed.contains('|') {
        return false;
    }
    trimmed.starts_with('|') || trimmed.ends_with('|') || count_cells(trimmed) >= 2
}

/// Number of cells in a table row, ignoring escaped pipes and outer borders
pub fn count_cells(line: &str) -> usize {
    let trimmed = line.trim();
    let mut pipes = 0;
    let mut previous = None;
    for ch in trimmed.chars() {
        if ch == '|' && previous != Some('\\') {
            pipes += 1;
        }
        previous = Some(ch);
    }
    if pipes == 0 {
        return 1;
    }
    let mut cells = pipes + 1;
    if trimmed.starts_with('|') {
        cells -= 1;
    }
    if trimmed.ends_with('|') && !trimmed.ends_with("\\|") {
        cells -= 1;
    }
    cells
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Segmenter states
#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Normal,
    CodeFence(Fence),
    Table,
    Frontmatter,
}

/// Splits documents into blocks
#[derive(Debug, Default, Clone, Copy)]
pub struct Segmenter;

impl Segmenter {
    pub fn new() -> Self {
        Self
    }

    /// Segment a whole document
    pub fn segment(&self, lines: &[String]) -> Vec<Block> {
        let mut builder = BlockBuilder::default();
        let mut state = State::Normal;

        for (index, line) in lines.iter().enumerate() {
            state = match state {
                State::Frontmatter => {
                    builder.push(line);
                    if index > 0 && (line.trim_end() == FRONTMATTER_DELIMITER || line.trim_end() == "...") {
                        builder.close();
                        State::Normal
                    } else {
                        State::Frontmatter
                    }
                }
                State::CodeFence(fence) => {
                    builder.push(line);
                    if fence.is_closed_by(line) {
                        builder.close();
                        State::Normal
                    } else {
                        State::CodeFence(fence)
                    }
                }
                State::Table if is_table_row(line) => {
                    builder.push(line);
                    State::Table
                }
                State::Table | State::Normal => {
                    builder.close_if(BlockKind::Table);
                    Self::normal_line(&mut builder, lines, index)
                }
            };
        }

        builder.finish()
    }

    fn normal_line(builder: &mut BlockBuilder, lines: &[String], index: usize) -> State {
        let line = &lines[index];

        if index == 0 && line.trim_end() == FRONTMATTER_DELIMITER {
            builder.start(BlockKind::Frontmatter, index, line);
            return State::Frontmatter;
        }

        if let Some(fence) = Fence::parse(line) {
            builder.start(BlockKind::CodeFence, index, line);
            return State::CodeFence(fence);
        }

        if is_blank(line) {
            builder.extend_or_start(BlockKind::Blank, index, line);
            return State::Normal;
        }

        if heading_level(line).is_some() {
            builder.start(BlockKind::Heading, index, line);
            builder.close();
            return State::Normal;
        }

        let next_is_separator = lines.get(index + 1).is_some_and(|next| is_table_separator(next));
        if is_table_row(line) && next_is_separator {
            builder.start(BlockKind::Table, index, line);
            return State::Table;
        }

        if LIST_ITEM_REGEX.is_match(line) {
            builder.start(BlockKind::ListItem, index, line);
            return State::Normal;
        }

        if HTML_BLOCK_REGEX.is_match(line) && !builder.is_open(BlockKind::Html) {
            builder.start(BlockKind::Html, index, line);
            return State::Normal;
        }

        // continuation of a paragraph, list item or HTML block
        match builder.open_kind() {
            Some(BlockKind::Paragraph | BlockKind::ListItem | BlockKind::Html) => builder.push(line),
            _ => builder.start(BlockKind::Paragraph, index, line),
        }
        State::Normal
    }
}

#[derive(Default)]
struct BlockBuilder {
    blocks: Vec<Block>,
    open: Option<(BlockKind, usize, Vec<String>)>,
}

impl BlockBuilder {
    fn open_kind(&self) -> Option<BlockKind> {
        self.open.as_ref().map(|(kind, _, _)| *kind)
    }

    fn is_open(&self, kind: BlockKind) -> bool {
        self.open_kind() == Some(kind)
    }

    fn start(&mut self, kind: BlockKind, index: usize, line: &str) {
        self.close();
        self.open = Some((kind, index, vec![line.to_string()]));
    }

    fn extend_or_start(&mut self, kind: BlockKind, index: usize, line: &str) {
        if self.is_open(kind) {
            self.push(line);
        } else {
            self.start(kind, index, line);
        }
    }

    fn push(&mut self, line: &str) {
        if let Some((_, _, lines)) = self.open.as_mut() {
            lines.push(line.to_string());
        }
    }

    fn close_if(&mut self, kind: BlockKind) {
        if self.is_open(kind) {
            self.close();
        }
    }

    fn close(&mut self) {
        if let Some((kind, start, lines)) = self.open.take() {
            self.blocks.push(Block::new(kind, start, lines));
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.close();
        self.blocks
    }
}
