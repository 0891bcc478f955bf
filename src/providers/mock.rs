/*!
 * Mock provider implementations for testing and dry runs.
 *
 * The mock speaks the batch protocol: it reads the request JSON out of the
 * prompt and answers every item with `[<lang>] <text>`, keeping placeholder
 * tokens and line breaks. Judgment prompts get a YES/NO answer. Behaviors:
 * - `MockProvider::working()` - Always succeeds
 * - `MockProvider::rate_limited(n)` - First `n` requests are rate limited
 * - `MockProvider::dropping(max)` - Drops an item from batches larger than `max`
 * - `MockProvider::failing()` - Always fails with a non-retryable error
 * - `MockProvider::garbage()` - Answers with prose instead of JSON
 * - `MockProvider::slow(ms)` - Succeeds after a delay
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::ProviderError;
use crate::policy::semantic::heuristic_meaning_changed;
use crate::providers::{CompletionRequest, CompletionResponse, ModelTier, Provider};
use crate::translation::batch::{BatchRequest, BatchResponse, TranslatedItem};
use crate::translation::prompts::{JUDGE_NEW_HEADER, JUDGE_OLD_HEADER};

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a proper translation
    Working,
    /// The first `times` requests fail with a rate limit error
    RateLimited { times: usize },
    /// Batches with more than `max_items` items lose their last item
    DropItems { max_items: usize },
    /// Every translated item loses its placeholder tokens
    CorruptPlaceholders,
    /// Always fails with a non-retryable error
    Failing,
    /// Fails with a retryable server error on every Nth request
    Intermittent { fail_every: usize },
    /// Returns prose instead of JSON
    Garbage,
    /// Simulates slow response (for timeout testing)
    Slow { delay_ms: u64 },
}

/// How judgment prompts are answered
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockJudgement {
    /// Answer with the deterministic heuristic
    Heuristic,
    Always(bool),
    /// Answer with something that is neither YES nor NO
    Garbage,
}

/// Mock provider for testing translation behavior
#[derive(Debug)]
pub struct MockProvider {
    behavior: MockBehavior,
    judgement: MockJudgement,
    /// Tag prepended to every translated line
    language: String,
    /// Total requests, shared between clones
    request_count: Arc<AtomicUsize>,
    judge_count: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            judgement: MockJudgement::Heuristic,
            language: "ja".to_string(),
            request_count: Arc::new(AtomicUsize::new(0)),
            judge_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn rate_limited(times: usize) -> Self {
        Self::new(MockBehavior::RateLimited { times })
    }

    pub fn dropping(max_items: usize) -> Self {
        Self::new(MockBehavior::DropItems { max_items })
    }

    pub fn corrupting() -> Self {
        Self::new(MockBehavior::CorruptPlaceholders)
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    pub fn garbage() -> Self {
        Self::new(MockBehavior::Garbage)
    }

    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Set the tag used in fake translations
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_judgement(mut self, judgement: MockJudgement) -> Self {
        self.judgement = judgement;
        self
    }

    /// Requests received so far, judgments included
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    pub fn judge_request_count(&self) -> usize {
        self.judge_count.load(Ordering::SeqCst)
    }

    pub fn batch_request_count(&self) -> usize {
        self.request_count() - self.judge_request_count()
    }

    /// Copies of every request received
    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    /// The deterministic fake translation of one text
    pub fn fake_translation(language: &str, text: &str) -> String {
        text.split('\n')
            .map(|line| {
                if line.trim().is_empty() {
                    String::new()
                } else {
                    format!("[{}] {}", language, line)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn answer_judgement(&self, prompt: &str) -> String {
        self.judge_count.fetch_add(1, Ordering::SeqCst);
        match self.judgement {
            MockJudgement::Always(true) => "YES".to_string(),
            MockJudgement::Always(false) => "NO".to_string(),
            MockJudgement::Garbage => "It depends on the reader.".to_string(),
            MockJudgement::Heuristic => {
                let (old_text, new_text) = split_judge_prompt(prompt);
                if heuristic_meaning_changed(old_text, new_text) {
                    "YES".to_string()
                } else {
                    "NO".to_string()
                }
            }
        }
    }

    fn answer_batch(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = BatchRequest::from_prompt(prompt)
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 400,
                message: "mock could not find a batch payload in the prompt".to_string(),
            })?;

        let mut translations: Vec<TranslatedItem> = request
            .items
            .iter()
            .map(|item| TranslatedItem {
                ordinal: item.ordinal,
                translated_text: Self::fake_translation(&self.language, &item.text),
            })
            .collect();

        match self.behavior {
            MockBehavior::DropItems { max_items } if translations.len() > max_items => {
                translations.pop();
            }
            MockBehavior::CorruptPlaceholders => {
                for item in translations.iter_mut() {
                    item.translated_text = crate::document::placeholder::strip_tokens(&item.translated_text);
                }
            }
            _ => {}
        }

        serde_json::to_string(&BatchResponse { translations })
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }
}

fn split_judge_prompt(prompt: &str) -> (&str, &str) {
    let old_start = prompt.find(JUDGE_OLD_HEADER).map(|i| i + JUDGE_OLD_HEADER.len()).unwrap_or(0);
    let new_at = prompt.find(JUDGE_NEW_HEADER).unwrap_or(prompt.len());
    let new_start = (new_at + JUDGE_NEW_HEADER.len()).min(prompt.len());
    let new_end = prompt.rfind("\n\n").filter(|end| *end >= new_start).unwrap_or(prompt.len());
    let old_text = prompt.get(old_start..new_at).unwrap_or("").trim();
    let new_text = prompt.get(new_start..new_end).unwrap_or("").trim();
    (old_text, new_text)
}

impl Clone for MockProvider {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior,
            judgement: self.judgement,
            language: self.language.clone(),
            request_count: Arc::clone(&self.request_count),
            judge_count: Arc::clone(&self.judge_count),
            requests: Arc::clone(&self.requests),
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        let model_used = self.model_for(request.tier);

        if request.prompt.contains(JUDGE_OLD_HEADER) {
            match self.behavior {
                MockBehavior::Failing => {
                    self.judge_count.fetch_add(1, Ordering::SeqCst);
                    return Err(ProviderError::AuthenticationError("mock failure".to_string()));
                }
                MockBehavior::RateLimited { times } if count < times => {
                    self.judge_count.fetch_add(1, Ordering::SeqCst);
                    return Err(ProviderError::RateLimitExceeded("mock rate limit".to_string()));
                }
                _ => {}
            }
            return Ok(CompletionResponse {
                text: self.answer_judgement(&request.prompt),
                model_used,
            });
        }

        let text = match self.behavior {
            MockBehavior::Working | MockBehavior::DropItems { .. } | MockBehavior::CorruptPlaceholders => {
                self.answer_batch(&request.prompt)?
            }
            MockBehavior::RateLimited { times } => {
                if count < times {
                    return Err(ProviderError::RateLimitExceeded("mock rate limit".to_string()));
                }
                self.answer_batch(&request.prompt)?
            }
            MockBehavior::Failing => {
                return Err(ProviderError::AuthenticationError("mock failure".to_string()));
            }
            MockBehavior::Intermittent { fail_every } => {
                if fail_every > 0 && count % fail_every == fail_every - 1 {
                    return Err(ProviderError::ApiError {
                        status_code: 503,
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                    });
                }
                self.answer_batch(&request.prompt)?
            }
            MockBehavior::Garbage => "I translated everything, it reads very nicely now.".to_string(),
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                self.answer_batch(&request.prompt)?
            }
        };

        Ok(CompletionResponse { text, model_used })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ConnectionError("mock failure".to_string())),
            _ => Ok(()),
        }
    }

    fn model_for(&self, tier: ModelTier) -> String {
        format!("mock-{}", tier)
    }
}
