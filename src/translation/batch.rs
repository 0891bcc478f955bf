/*!
 * Ordinal-tagged batch protocol.
 *
 * A request is a JSON object `{"items":[{ordinal, context_before, text,
 * context_after}]}` embedded in the prompt; the oracle answers with
 * `{"translations":[{ordinal, translated_text}]}` (a bare array is accepted
 * too). Responses are matched back by ordinal, never by position.
 */

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::errors::SyncError;
use crate::translation::prompts::BATCH_INPUT_HEADER;

/// One unit of text in a batch request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub ordinal: usize,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub context_before: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub context_after: String,
}

/// Batch request payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub items: Vec<BatchItem>,
}

impl BatchRequest {
    pub fn new(items: Vec<BatchItem>) -> Self {
        Self { items }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| anyhow!("Failed to serialize batch request: {}", e))
    }

    /// Recover the request embedded in a batch prompt
    pub fn from_prompt(prompt: &str) -> Option<Self> {
        let start = prompt.find(BATCH_INPUT_HEADER)? + BATCH_INPUT_HEADER.len();
        let json = extract_json(&prompt[start..]).ok()?;
        serde_json::from_str(&json).ok()
    }
}

/// One translated item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedItem {
    pub ordinal: usize,
    pub translated_text: String,
}

/// Batch response payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub translations: Vec<TranslatedItem>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ResponsePayload {
    Wrapped(BatchResponse),
    Bare(Vec<TranslatedItem>),
}

/// Parse an oracle answer into translated items
pub fn parse_batch_response(response: &str) -> Result<Vec<TranslatedItem>, SyncError> {
    let json = extract_json(response).map_err(|e| SyncError::OracleFormat(e.to_string()))?;
    match serde_json::from_str::<ResponsePayload>(&json) {
        Ok(ResponsePayload::Wrapped(wrapped)) => Ok(wrapped.translations),
        Ok(ResponsePayload::Bare(items)) => Ok(items),
        Err(e) => Err(SyncError::OracleFormat(format!("Failed to parse batch response: {}", e))),
    }
}

/// Extract JSON from a potentially wrapped response.
pub fn extract_json(response: &str) -> Result<String> {
    let trimmed = response.trim();

    // If it starts with { or [, try to parse as-is
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(trimmed.to_string());
    }

    // Look for JSON block in markdown code fence
    if let Some(start) = trimmed.find("```json") {
        if let Some(end) = trimmed[start + 7..].find("```") {
            let json = trimmed[start + 7..start + 7 + end].trim();
            return Ok(json.to_string());
        }
    }

    // Look for JSON block without language specifier
    if let Some(start) = trimmed.find("```") {
        if let Some(end) = trimmed[start + 3..].find("```") {
            let json = trimmed[start + 3..start + 3 + end].trim();
            if json.starts_with('{') || json.starts_with('[') {
                return Ok(json.to_string());
            }
        }
    }

    // Look for first { and last }
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if end > start {
            return Ok(trimmed[start..=end].to_string());
        }
    }

    Err(anyhow!("Could not extract JSON from response"))
}
