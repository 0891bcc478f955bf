/*!
 * Tests for segmentation, placeholder protection and reflow working together
 */

use anyhow::Result;

use linesync::document::placeholder::find_tokens;
use linesync::document::{BlockKind, FramedText, LineShape, PlaceholderProtector, ReflowEngine, Segmenter};
use linesync::errors::PlaceholderError;

use crate::common;

/// Every block type of a documentation page is recognized at its lines
#[test]
fn test_segment_withSampleDocument_shouldRecognizeEveryBlockType() {
    let lines = common::lines(common::SAMPLE_DOC);
    let blocks = Segmenter::new().segment(&lines);

    let kinds: Vec<BlockKind> = blocks.iter().map(|b| b.kind).collect();
    assert_eq!(
        kinds,
        vec![
            BlockKind::Frontmatter,
            BlockKind::Blank,
            BlockKind::Heading,
            BlockKind::Blank,
            BlockKind::Paragraph,
            BlockKind::Blank,
            BlockKind::CodeFence,
            BlockKind::Blank,
            BlockKind::Table,
            BlockKind::Blank,
            BlockKind::Paragraph,
            BlockKind::Blank,
            BlockKind::ListItem,
            BlockKind::ListItem,
        ]
    );

    // Blocks tile the document
    let mut cursor = 0;
    for block in &blocks {
        assert_eq!(block.range.start, cursor);
        cursor = block.range.end;
    }
    assert_eq!(cursor, lines.len());

    let fence = &blocks[6];
    assert_eq!(fence.range, 10..13);
    assert!(!fence.translatable);
    assert_eq!(blocks[8].range, 14..18);
}

/// A wrapped paragraph survives mask, single-line translation, reflow and restore
#[test]
fn test_protectReflowRestore_withWrappedParagraph_shouldKeepShapeAndMarkup() -> Result<()> {
    let lines = common::lines(common::SAMPLE_DOC);
    let framed = FramedText::from_lines(&lines[6..9]);
    let protector = PlaceholderProtector::new();

    let protected = protector.protect(&framed.body_text())?;
    assert!(!protected.masked.contains("cargo install"));
    assert!(!protected.masked.contains("example.com"));
    assert!(protected.masked.contains("configuration guide"));

    // A translator that ignores line breaks
    let one_line = protected.masked.split_whitespace().collect::<Vec<_>>().join(" ");
    let bodies = ReflowEngine::new().reflow(&one_line, &LineShape::from_widths(framed.body_widths()))?;
    assert_eq!(bodies.len(), 3);
    assert!(bodies.iter().all(|b| !b.trim().is_empty()));

    // No token is split across lines
    let per_line: usize = bodies.iter().map(|b| find_tokens(b).len()).sum();
    assert_eq!(per_line, protected.tokens.len());

    let restored = protector.restore(&bodies.join("\n"), protected.tokens)?;
    assert_eq!(restored.lines().count(), 3);
    assert!(restored.contains("`cargo install linesync`"));
    assert!(restored.contains("(https://example.com/config)"));
    Ok(())
}

/// Text without markup comes back byte for byte
#[test]
fn test_protectRestore_withPlainSentences_shouldBeIdentity() -> Result<()> {
    let protector = PlaceholderProtector::new();
    let samples = [
        "Plain sentence without markup.",
        "Two lines\nof plain text",
        "   leading and trailing   ",
        "日本語の文章です。",
        "",
    ];

    for sample in samples {
        let protected = protector.protect(sample)?;
        assert_eq!(protector.restore(&protected.masked, protected.tokens)?, sample);
    }
    Ok(())
}

/// A translator that drops a token is caught on restore
#[test]
fn test_restore_withDroppedToken_shouldReportMissingToken() -> Result<()> {
    let protector = PlaceholderProtector::new();
    let protected = protector.protect("Run `linesync verify` after every sync.")?;
    let marker = protected.tokens.markers().remove(0);

    let translated = protected.masked.replace(&marker, "");
    let result = protector.restore(&translated, protected.tokens);
    assert_eq!(result, Err(PlaceholderError::MissingToken(marker)));
    Ok(())
}

/// Table rows keep their pipes in the frame, so translations cannot change the cell count
#[test]
fn test_fromTableRows_withTranslatedCells_shouldKeepBorders() {
    let rows = vec!["| `--limit` | Cap the file count |".to_string()];
    let framed = FramedText::from_table_rows(&rows);
    assert!(!framed.body_text().starts_with('|'));

    let wrapped = framed.wrap_all(&["`--limit` | ファイル数の上限".to_string()]);
    assert_eq!(wrapped, vec!["| `--limit` | ファイル数の上限 |"]);
}
