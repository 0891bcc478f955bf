/*!
 * Provider implementations for the translation oracle.
 *
 * This module contains client implementations for LLM providers:
 * - Ollama: Local LLM server
 * - Anthropic: Anthropic API integration
 * - Mock: deterministic in-process provider for tests and dry runs
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::app_config::{TranslationConfig, TranslationProvider};
use crate::errors::ProviderError;

/// Model class requested from a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    /// Cheap, low-latency model
    #[default]
    Fast,
    /// Slower model used for large or difficult content
    HighAccuracy,
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::HighAccuracy => write!(f, "high-accuracy"),
        }
    }
}

/// A single completion request sent to a provider
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub tier: ModelTier,
    pub system: String,
    pub prompt: String,
}

impl CompletionRequest {
    pub fn new(tier: ModelTier, system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            tier,
            system: system.into(),
            prompt: prompt.into(),
        }
    }
}

/// Text returned by a provider
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: String,
    /// Concrete model name that produced the text
    pub model_used: String,
}

/// Common trait for all LLM providers
///
/// Implementations are shared across worker tasks behind an `Arc<dyn Provider>`.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Complete a request using this provider
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self) -> Result<(), ProviderError>;

    /// Model name the provider uses for a tier
    fn model_for(&self, tier: ModelTier) -> String;
}

/// Map a non-success HTTP status to a provider error
pub(crate) fn error_for_status(status_code: u16, message: String) -> ProviderError {
    match status_code {
        429 => ProviderError::RateLimitExceeded(message),
        401 | 403 => ProviderError::AuthenticationError(message),
        _ => ProviderError::ApiError {
            status_code,
            message,
        },
    }
}

/// Map a transport error from reqwest to a provider error
pub(crate) fn error_for_transport(error: reqwest::Error, timeout_ms: u64) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout(timeout_ms)
    } else if error.is_connect() {
        ProviderError::ConnectionError(error.to_string())
    } else {
        ProviderError::RequestFailed(error.to_string())
    }
}

/// Build the configured provider client
pub fn create_provider(config: &TranslationConfig) -> Arc<dyn Provider> {
    let temperature = config.common.temperature;
    match config.provider {
        TranslationProvider::Ollama => Arc::new(
            ollama::Ollama::new(
                config.get_endpoint(),
                config.get_model(),
                config.get_high_accuracy_model(),
                config.get_timeout_secs(),
            )
            .with_temperature(temperature),
        ),
        TranslationProvider::Anthropic => Arc::new(
            anthropic::Anthropic::new(
                config.get_api_key(),
                config.get_endpoint(),
                config.get_model(),
                config.get_high_accuracy_model(),
                config.get_timeout_secs(),
            )
            .with_temperature(temperature),
        ),
    }
}

pub mod anthropic;
pub mod mock;
pub mod ollama;
