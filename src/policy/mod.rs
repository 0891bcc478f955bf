/*!
 * Change policy: what to do with the translation of each diff operation.
 *
 * Equal, insert and delete map directly to an action. A replace is kept when
 * it is cosmetic: high similarity with a comparable token count, or the same
 * text once whitespace is collapsed or punctuation is dropped. Otherwise the
 * semantic judge decides between keeping and retranslating.
 */

pub mod semantic;

use anyhow::{anyhow, Result};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::app_config::SyncConfig;
use crate::diff::{LineOperation, OpKind};
use semantic::SemanticJudge;

static WORD_TOKEN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\w+\b|[^\w\s]").expect("Invalid word token regex"));

/// Translation action attached to one line operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    KeepExisting,
    TranslateNew,
    DeleteExisting,
    Retranslate,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::KeepExisting => "keep_existing",
            Self::TranslateNew => "translate_new",
            Self::DeleteExisting => "delete_existing",
            Self::Retranslate => "retranslate",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ChangeAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "keep_existing" => Ok(Self::KeepExisting),
            "translate_new" => Ok(Self::TranslateNew),
            "delete_existing" => Ok(Self::DeleteExisting),
            "retranslate" => Ok(Self::Retranslate),
            _ => Err(anyhow!("Unknown change action: {}", s)),
        }
    }
}

/// Why an action was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    Unchanged,
    Added,
    Removed,
    /// High similarity and token parity
    MinorChange,
    /// Only whitespace or punctuation changed
    FormattingOnly,
    /// The judge saw no meaning change
    JudgedCosmetic,
    /// The judge saw a meaning change
    JudgedMeaningful,
    /// Kept text would not fit the new line count
    LineShapeChanged,
}

/// A line operation with its resolved action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedOperation {
    pub operation: LineOperation,
    pub action: ChangeAction,
    pub reason: DecisionReason,
}

/// Number of word and punctuation tokens
pub fn token_count(text: &str) -> usize {
    WORD_TOKEN_REGEX.find_iter(text).count()
}

/// Whether two texts have token counts within `tolerance` of each other
pub fn token_parity(old_text: &str, new_text: &str, tolerance: f64) -> bool {
    let old_count = token_count(old_text);
    let new_count = token_count(new_text);
    let larger = old_count.max(new_count);
    if larger == 0 {
        return true;
    }
    (old_count.abs_diff(new_count) as f64) / (larger as f64) <= tolerance
}

/// Whether two texts are equal once whitespace runs are collapsed
pub fn same_after_whitespace(old_text: &str, new_text: &str) -> bool {
    old_text.split_whitespace().eq(new_text.split_whitespace())
}

/// Whether two texts are equal once everything but letters and digits is dropped
pub fn same_letters_and_digits(old_text: &str, new_text: &str) -> bool {
    old_text
        .chars()
        .filter(|c| c.is_alphanumeric())
        .eq(new_text.chars().filter(|c| c.is_alphanumeric()))
}

/// Thresholds for the cosmetic-change shortcut
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyThresholds {
    pub minor_change_similarity: f64,
    pub token_parity_tolerance: f64,
}

impl Default for PolicyThresholds {
    fn default() -> Self {
        Self {
            minor_change_similarity: 0.98,
            token_parity_tolerance: 0.2,
        }
    }
}

impl From<&SyncConfig> for PolicyThresholds {
    fn from(config: &SyncConfig) -> Self {
        Self {
            minor_change_similarity: config.minor_change_similarity,
            token_parity_tolerance: config.token_parity_tolerance,
        }
    }
}

/// Maps line operations to change actions
pub struct ChangePolicyResolver {
    thresholds: PolicyThresholds,
    judge: Arc<dyn SemanticJudge>,
}

impl ChangePolicyResolver {
    pub fn new(thresholds: PolicyThresholds, judge: Arc<dyn SemanticJudge>) -> Self {
        Self { thresholds, judge }
    }

    /// Resolve every operation in order
    pub async fn resolve_all(
        &self,
        operations: &[LineOperation],
        previous: &[String],
        current: &[String],
    ) -> Vec<ResolvedOperation> {
        let mut resolved = Vec::with_capacity(operations.len());
        for operation in operations {
            resolved.push(self.resolve(operation, previous, current).await);
        }
        resolved
    }

    pub async fn resolve(&self, operation: &LineOperation, previous: &[String], current: &[String]) -> ResolvedOperation {
        let (action, reason) = match operation.kind {
            OpKind::Equal => (ChangeAction::KeepExisting, DecisionReason::Unchanged),
            OpKind::Insert => (ChangeAction::TranslateNew, DecisionReason::Added),
            OpKind::Delete => (ChangeAction::DeleteExisting, DecisionReason::Removed),
            OpKind::Replace => self.resolve_replace(operation, previous, current).await,
        };
        ResolvedOperation {
            operation: operation.clone(),
            action,
            reason,
        }
    }

    async fn resolve_replace(
        &self,
        operation: &LineOperation,
        previous: &[String],
        current: &[String],
    ) -> (ChangeAction, DecisionReason) {
        let old_text = previous[operation.previous.clone()].join("\n");
        let new_text = current[operation.current.clone()].join("\n");
        let similarity = operation.similarity.unwrap_or(0.0);

        let (action, reason) = if similarity >= self.thresholds.minor_change_similarity
            && token_parity(&old_text, &new_text, self.thresholds.token_parity_tolerance)
        {
            (ChangeAction::KeepExisting, DecisionReason::MinorChange)
        } else if same_after_whitespace(&old_text, &new_text) || same_letters_and_digits(&old_text, &new_text) {
            (ChangeAction::KeepExisting, DecisionReason::FormattingOnly)
        } else if self.judge.judge(&old_text, &new_text).await {
            (ChangeAction::Retranslate, DecisionReason::JudgedMeaningful)
        } else {
            (ChangeAction::KeepExisting, DecisionReason::JudgedCosmetic)
        };

        // existing translation lines are copied one for one
        if action == ChangeAction::KeepExisting && operation.previous.len() != operation.current.len() {
            debug!(
                "Replace {:?} -> {:?} changes line count, retranslating",
                operation.previous, operation.current
            );
            return (ChangeAction::Retranslate, DecisionReason::LineShapeChanged);
        }
        (action, reason)
    }
}
