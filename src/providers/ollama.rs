use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{error_for_status, error_for_transport, CompletionRequest, CompletionResponse, ModelTier, Provider};
use crate::errors::ProviderError;

/// Ollama client for interacting with a local Ollama server
#[derive(Debug)]
pub struct Ollama {
    /// Base URL of the Ollama API
    base_url: String,
    /// HTTP client for making requests
    client: Client,
    model: String,
    high_accuracy_model: String,
    temperature: f32,
    timeout_ms: u64,
}

/// Generate request for the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model name to use for generation
    model: String,
    /// Prompt to generate from
    prompt: String,
    /// System message to guide the model
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    /// Additional model parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    /// Whether to stream the response
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

/// Generation options for the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Generation response from the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Model name
    pub model: String,
    /// Generated text
    pub response: String,
    /// Whether the generation is complete
    #[serde(default)]
    pub done: bool,
}

impl GenerationRequest {
    /// Create a new generation request
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            system: None,
            options: None,
            stream: None,
        }
    }

    /// Set the system message
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        let options = self.options.get_or_insert(GenerationOptions {
            temperature: None,
            num_predict: None,
        });
        options.temperature = Some(temperature);
        self
    }

    /// Disable streaming
    pub fn no_stream(mut self) -> Self {
        self.stream = Some(false);
        self
    }
}

impl Ollama {
    /// Create a new Ollama client from an endpoint such as `http://localhost:11434`
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        high_accuracy_model: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        let model = model.into();
        let high_accuracy_model = high_accuracy_model.into();
        Self {
            base_url: Self::normalize_base_url(&endpoint.into()),
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs.max(1)))
                // Ollama speaks HTTP/1.1
                .http1_only()
                .pool_idle_timeout(Duration::from_secs(90))
                .pool_max_idle_per_host(20)
                .build()
                .unwrap_or_default(),
            high_accuracy_model: if high_accuracy_model.is_empty() {
                model.clone()
            } else {
                high_accuracy_model
            },
            model,
            temperature: 0.2,
            timeout_ms: timeout_secs.saturating_mul(1000),
        }
    }

    /// Set the sampling temperature for all requests
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Add a scheme and the default port when they are missing
    fn normalize_base_url(endpoint: &str) -> String {
        let trimmed = endpoint.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return "http://localhost:11434".to_string();
        }
        match url::Url::parse(trimmed) {
            Ok(parsed) if parsed.has_host() => trimmed.to_string(),
            _ if trimmed.contains(':') => format!("http://{}", trimmed),
            _ => format!("http://{}:11434", trimmed),
        }
    }

    /// Generate text with the Ollama API
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| error_for_transport(e, self.timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Ollama API error ({}): {}", status, error_text);
            return Err(error_for_status(status.as_u16(), error_text));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| ProviderError::RequestFailed(format!("Failed to read Ollama response: {}", e)))?;

        Self::parse_generation(&response_text)
    }

    /// Parse a single JSON object, or a JSONL stream whose pieces are concatenated
    fn parse_generation(body: &str) -> Result<GenerationResponse, ProviderError> {
        if let Ok(parsed) = serde_json::from_str::<GenerationResponse>(body) {
            return Ok(parsed);
        }

        debug!("Ollama response is not a single object, trying line-delimited chunks");
        let mut model = String::new();
        let mut text = String::new();
        let mut done = false;
        for line in body.lines().filter(|l| !l.trim().is_empty()) {
            let chunk: GenerationResponse = serde_json::from_str(line)
                .map_err(|e| ProviderError::ParseError(format!("Invalid Ollama chunk: {}", e)))?;
            model = chunk.model;
            text.push_str(&chunk.response);
            done |= chunk.done;
        }

        if model.is_empty() && text.is_empty() {
            return Err(ProviderError::ParseError("Empty Ollama response".to_string()));
        }

        Ok(GenerationResponse {
            model,
            response: text,
            done,
        })
    }
}

#[async_trait]
impl Provider for Ollama {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let model = self.model_for(request.tier);
        let body = GenerationRequest::new(model.clone(), request.prompt)
            .system(request.system)
            .temperature(self.temperature)
            .no_stream();

        let response = self.generate(&body).await?;
        Ok(CompletionResponse {
            text: response.response,
            model_used: if response.model.is_empty() { model } else { response.model },
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let url = format!("{}/api/version", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| error_for_transport(e, self.timeout_ms))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_for_status(response.status().as_u16(), "version check failed".to_string()))
        }
    }

    fn model_for(&self, tier: ModelTier) -> String {
        match tier {
            ModelTier::Fast => self.model.clone(),
            ModelTier::HighAccuracy => self.high_accuracy_model.clone(),
        }
    }
}
