/*!
 * Scripted providers for tests
 *
 * `MockProvider` from the library covers most behaviors. The providers here
 * answer in ways it does not: collapsing every item into one line, or
 * answering the same batch differently on each call.
 */

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use linesync::errors::ProviderError;
use linesync::providers::{CompletionRequest, CompletionResponse, ModelTier, Provider};
use linesync::translation::batch::{BatchRequest, BatchResponse, TranslatedItem};

/// Translates every item as a single unbroken line
#[derive(Debug, Default, Clone)]
pub struct OneLineProvider {
    calls: Arc<AtomicUsize>,
}

impl OneLineProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for OneLineProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let Some(batch) = BatchRequest::from_prompt(&request.prompt) else {
            return Ok(CompletionResponse {
                text: "YES".to_string(),
                model_used: self.model_for(request.tier),
            });
        };

        let translations = batch
            .items
            .iter()
            .map(|item| TranslatedItem {
                ordinal: item.ordinal,
                translated_text: format!("[fr] {}", item.text.split_whitespace().collect::<Vec<_>>().join(" ")),
            })
            .collect();
        let text = serde_json::to_string(&BatchResponse { translations })
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;
        Ok(CompletionResponse {
            text,
            model_used: self.model_for(request.tier),
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    fn model_for(&self, _tier: ModelTier) -> String {
        "one-line".to_string()
    }
}

/// Answers with a fixed translation per item, whatever the input
#[derive(Debug, Clone)]
pub struct FixedProvider {
    answer: String,
}

impl FixedProvider {
    pub fn new(answer: impl Into<String>) -> Self {
        Self { answer: answer.into() }
    }
}

#[async_trait]
impl Provider for FixedProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let batch = BatchRequest::from_prompt(&request.prompt)
            .ok_or_else(|| ProviderError::ParseError("no batch in prompt".to_string()))?;
        let translations = batch
            .items
            .iter()
            .map(|item| TranslatedItem {
                ordinal: item.ordinal,
                translated_text: self.answer.clone(),
            })
            .collect();
        let text = serde_json::to_string(&BatchResponse { translations })
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;
        Ok(CompletionResponse {
            text,
            model_used: "fixed".to_string(),
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    fn model_for(&self, _tier: ModelTier) -> String {
        "fixed".to_string()
    }
}
