/*!
 * Tests for the line diff engine
 */

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use linesync::diff::{is_complete_partition, similarity_ratio};
use linesync::{LineDiffEngine, OpKind};

const ALPHABET: &[&str] = &["alpha", "beta", "gamma", "delta", ""];

fn random_document(rng: &mut StdRng) -> Vec<String> {
    let len = rng.random_range(0..12);
    (0..len)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())].to_string())
        .collect()
}

/// Random edits must always produce a complete, ordered partition
#[test]
fn test_diff_withRandomDocuments_shouldPartitionBothSequences() {
    let engine = LineDiffEngine::new();
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..300 {
        let previous = random_document(&mut rng);
        let current = random_document(&mut rng);
        let ops = engine.diff(&previous, &current);

        assert!(
            is_complete_partition(&ops, previous.len(), current.len()),
            "not a partition: {:?} vs {:?} -> {:?}",
            previous,
            current,
            ops
        );

        for op in &ops {
            match op.kind {
                OpKind::Equal => {
                    assert_eq!(previous[op.previous.clone()], current[op.current.clone()]);
                    assert!(op.similarity.is_none());
                }
                OpKind::Insert => assert!(op.previous.is_empty() && !op.current.is_empty()),
                OpKind::Delete => assert!(!op.previous.is_empty() && op.current.is_empty()),
                OpKind::Replace => {
                    let similarity = op.similarity.expect("replace carries a similarity");
                    assert!((0.0..=1.0).contains(&similarity));
                }
            }
        }
    }
}

/// Identical inputs must diff to equal runs only
#[test]
fn test_diff_withSameDocument_shouldOnlyContainEqual() {
    let engine = LineDiffEngine::new();
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..50 {
        let document = random_document(&mut rng);
        let ops = engine.diff(&document, &document);
        assert!(ops.iter().all(|op| op.kind == OpKind::Equal));
        assert!(is_complete_partition(&ops, document.len(), document.len()));
    }
}

/// Appending a paragraph after a blank line is a pure insert
#[test]
fn test_diff_withAppendedParagraph_shouldInsertAtEnd() {
    let previous = vec!["A".to_string(), String::new(), "B".to_string()];
    let current = vec![
        "A".to_string(),
        String::new(),
        "B".to_string(),
        String::new(),
        "D".to_string(),
    ];

    let ops = LineDiffEngine::new().diff(&previous, &current);
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[0].kind, OpKind::Equal);
    assert_eq!(ops[1].kind, OpKind::Insert);
    assert_eq!(ops[1].current, 3..5);
    assert_eq!(ops[1].previous, 3..3);
}

/// A one-character edit on a long line is a highly similar replace
#[test]
fn test_diff_withTypoFix_shouldReplaceWithHighSimilarity() {
    let previous = vec![
        "Intro".to_string(),
        "The configuration file is read once at startup and cached for the remainder of the sesion.".to_string(),
    ];
    let current = vec![
        "Intro".to_string(),
        "The configuration file is read once at startup and cached for the remainder of the session.".to_string(),
    ];

    let ops = LineDiffEngine::new().diff(&previous, &current);
    let replace = ops.iter().find(|op| op.kind == OpKind::Replace).expect("replace expected");
    assert_eq!(replace.current, 1..2);
    assert!(replace.similarity.unwrap_or_default() >= 0.98);
}

#[test]
fn test_similarityRatio_shouldBeSymmetricAndBounded() {
    let pairs = [("", ""), ("abc", ""), ("kitten", "sitting"), ("same", "same")];
    for (a, b) in pairs {
        let forward = similarity_ratio(a, b);
        let backward = similarity_ratio(b, a);
        assert!((forward - backward).abs() < 1e-9);
        assert!((0.0..=1.0).contains(&forward));
    }
    assert_eq!(similarity_ratio("same", "same"), 1.0);
    assert_eq!(similarity_ratio("abc", ""), 0.0);
}
