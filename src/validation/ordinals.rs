/*!
 * Response validation for ordinal-tagged batches.
 *
 * A response is accepted only when it carries exactly one translation per
 * requested ordinal and every translation holds the same placeholder tokens
 * as its input. Anything else is a format error that makes the orchestrator
 * split the batch.
 */

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::document::placeholder::find_tokens;
use crate::errors::SyncError;
use crate::translation::batch::TranslatedItem;

/// What the validator expects back for one ordinal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedItem {
    pub ordinal: usize,
    /// Placeholder markers present in the input text
    pub tokens: Vec<String>,
}

/// Checks oracle responses against the request
#[derive(Debug, Default, Clone, Copy)]
pub struct OrdinalValidator;

impl OrdinalValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate and index a response by ordinal
    pub fn validate(
        &self,
        expected: &[ExpectedItem],
        response: Vec<TranslatedItem>,
    ) -> Result<BTreeMap<usize, String>, SyncError> {
        if response.len() != expected.len() {
            return Err(SyncError::OracleFormat(format!(
                "expected {} translation(s), got {}",
                expected.len(),
                response.len()
            )));
        }

        let wanted: HashMap<usize, &ExpectedItem> = expected.iter().map(|e| (e.ordinal, e)).collect();
        let mut seen = HashSet::new();
        let mut translations = BTreeMap::new();

        for item in response {
            let Some(expected_item) = wanted.get(&item.ordinal) else {
                return Err(SyncError::OracleFormat(format!("unexpected ordinal {}", item.ordinal)));
            };
            if !seen.insert(item.ordinal) {
                return Err(SyncError::OracleFormat(format!("duplicated ordinal {}", item.ordinal)));
            }
            if item.translated_text.trim().is_empty() {
                return Err(SyncError::OracleFormat(format!("empty translation for ordinal {}", item.ordinal)));
            }
            Self::check_tokens(expected_item, &item.translated_text)?;
            translations.insert(item.ordinal, item.translated_text);
        }

        if let Some(missing) = expected.iter().find(|e| !translations.contains_key(&e.ordinal)) {
            return Err(SyncError::OracleFormat(format!("missing ordinal {}", missing.ordinal)));
        }

        Ok(translations)
    }

    fn check_tokens(expected: &ExpectedItem, translated: &str) -> Result<(), SyncError> {
        let mut want = expected.tokens.clone();
        let mut got = find_tokens(translated);
        want.sort();
        got.sort();
        if want != got {
            return Err(SyncError::OracleFormat(format!(
                "placeholder mismatch for ordinal {}: expected {:?}, got {:?}",
                expected.ordinal, want, got
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected(ordinal: usize, tokens: &[&str]) -> ExpectedItem {
        ExpectedItem {
            ordinal,
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn item(ordinal: usize, text: &str) -> TranslatedItem {
        TranslatedItem {
            ordinal,
            translated_text: text.to_string(),
        }
    }

    #[test]
    fn test_validate_withShuffledResponse_shouldIndexByOrdinal() {
        let result = OrdinalValidator::new()
            .validate(&[expected(4, &[]), expected(5, &["⟦PH0⟧"])], vec![item(5, "x ⟦PH0⟧"), item(4, "y")])
            .unwrap();
        assert_eq!(result.keys().copied().collect::<Vec<_>>(), vec![4, 5]);
        assert_eq!(result[&5], "x ⟦PH0⟧");
    }

    #[test]
    fn test_validate_withCountMismatch_shouldFail() {
        let result = OrdinalValidator::new().validate(&[expected(0, &[]), expected(1, &[])], vec![item(0, "a")]);
        assert!(matches!(result, Err(SyncError::OracleFormat(_))));
    }

    #[test]
    fn test_validate_withDuplicateOrdinal_shouldFail() {
        let result =
            OrdinalValidator::new().validate(&[expected(0, &[]), expected(1, &[])], vec![item(0, "a"), item(0, "b")]);
        assert!(matches!(result, Err(SyncError::OracleFormat(msg)) if msg.contains("duplicated")));
    }

    #[test]
    fn test_validate_withUnexpectedOrdinal_shouldFail() {
        let result = OrdinalValidator::new().validate(&[expected(0, &[])], vec![item(9, "a")]);
        assert!(matches!(result, Err(SyncError::OracleFormat(msg)) if msg.contains("unexpected")));
    }

    #[test]
    fn test_validate_withDroppedPlaceholder_shouldFail() {
        let result = OrdinalValidator::new().validate(&[expected(0, &["⟦PH0⟧", "⟦PH1⟧"])], vec![item(0, "only ⟦PH1⟧")]);
        assert!(matches!(result, Err(SyncError::OracleFormat(msg)) if msg.contains("placeholder")));
    }

    #[test]
    fn test_validate_withReorderedPlaceholders_shouldPass() {
        let result = OrdinalValidator::new().validate(&[expected(0, &["⟦PH0⟧", "⟦PH1⟧"])], vec![item(0, "⟦PH1⟧ then ⟦PH0⟧")]);
        assert!(result.is_ok());
    }
}
