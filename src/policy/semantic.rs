/*!
 * Semantic change judgments for ambiguous replace operations.
 *
 * Judgment calls go through the run's orchestrator, so they count against
 * the request budget and wait for the same worker slots as translations.
 */

use async_trait::async_trait;
use log::{debug, warn};

use crate::errors::SyncError;
use crate::providers::{CompletionRequest, ModelTier};
use crate::translation::orchestrator::TranslationOrchestrator;
use crate::translation::prompts::PromptBuilder;

/// Answers whether an edit changed the meaning of a passage
#[async_trait]
pub trait SemanticJudge: Send + Sync {
    async fn judge(&self, old_text: &str, new_text: &str) -> bool;
}

/// Parse a strict YES/NO answer
pub fn parse_verdict(answer: &str) -> Option<bool> {
    match answer.trim().to_uppercase().as_str() {
        "YES" => Some(true),
        "NO" => Some(false),
        _ => None,
    }
}

/// Deterministic fallback used when the oracle gives no usable verdict.
///
/// The change is meaningful when exactly one side is empty, the character
/// length moved by at least 50%, or the word count moved by at least 30%.
pub fn heuristic_meaning_changed(old_text: &str, new_text: &str) -> bool {
    let old_trimmed = old_text.trim();
    let new_trimmed = new_text.trim();
    if old_trimmed.is_empty() != new_trimmed.is_empty() {
        return true;
    }
    if old_trimmed.is_empty() {
        return false;
    }

    let old_chars = old_trimmed.chars().count() as f64;
    let new_chars = new_trimmed.chars().count() as f64;
    if (new_chars - old_chars).abs() / old_chars >= 0.5 {
        return true;
    }

    let old_words = old_trimmed.split_whitespace().count() as f64;
    let new_words = new_trimmed.split_whitespace().count() as f64;
    (new_words - old_words).abs() / old_words.max(1.0) >= 0.3
}

/// Judge backed only by the heuristic
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicJudge;

#[async_trait]
impl SemanticJudge for HeuristicJudge {
    async fn judge(&self, old_text: &str, new_text: &str) -> bool {
        heuristic_meaning_changed(old_text, new_text)
    }
}

/// Judge that asks the oracle and falls back to the heuristic
#[derive(Clone)]
pub struct SemanticChangeOracle {
    orchestrator: TranslationOrchestrator,
    /// Answers to ask for before giving up on a usable verdict
    attempts: u32,
}

impl SemanticChangeOracle {
    pub fn new(orchestrator: TranslationOrchestrator, attempts: u32) -> Self {
        Self {
            orchestrator,
            attempts: attempts.max(1),
        }
    }

    async fn ask(&self, old_text: &str, new_text: &str) -> Option<bool> {
        let (system, prompt) = PromptBuilder::judge_prompt(old_text, new_text);
        for attempt in 1..=self.attempts {
            let request = CompletionRequest::new(ModelTier::Fast, system.clone(), prompt.clone());
            match self.orchestrator.complete("semantic judgment", request).await {
                Ok(response) => match parse_verdict(&response.text) {
                    Some(verdict) => return Some(verdict),
                    None => debug!("Unusable semantic verdict on attempt {}: {:?}", attempt, response.text),
                },
                Err(SyncError::Aborted(reason)) => {
                    debug!("Semantic judgment skipped: {}", reason);
                    return None;
                }
                Err(e) => debug!("Semantic judgment attempt {} failed: {}", attempt, e),
            }
        }
        None
    }
}

#[async_trait]
impl SemanticJudge for SemanticChangeOracle {
    async fn judge(&self, old_text: &str, new_text: &str) -> bool {
        match self.ask(old_text, new_text).await {
            Some(verdict) => verdict,
            None => {
                let verdict = heuristic_meaning_changed(old_text, new_text);
                warn!("Semantic oracle gave no usable answer, heuristic says changed={}", verdict);
                verdict
            }
        }
    }
}
