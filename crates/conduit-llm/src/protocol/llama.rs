//! Llama 3.x on Bedrock wire format types
//!
//! Llama takes a single rendered prompt string and answers with raw
//! generation text; streaming payloads reuse the response shape, one
//! fragment per event.

use serde::{Deserialize, Serialize};

use super::anthropic::BedrockInvocationMetrics;

/// Llama `invoke_model` request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlamaRequest {
    /// Fully rendered prompt
    pub prompt: String,
    /// Maximum tokens to generate
    pub max_gen_len: u32,
    /// Sampling temperature
    pub temperature: f64,
    /// Nucleus sampling threshold
    pub top_p: f64,
}

/// Llama response body, also the shape of each stream fragment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlamaResponse {
    /// Generated text (a single fragment when streaming)
    #[serde(default)]
    pub generation: String,
    /// Prompt tokens (first fragment or complete response)
    #[serde(default)]
    pub prompt_token_count: Option<u32>,
    /// Generated tokens so far
    #[serde(default)]
    pub generation_token_count: Option<u32>,
    /// Set on the final fragment
    #[serde(default)]
    pub stop_reason: Option<String>,
    /// Bedrock invocation metrics, on the final fragment
    #[serde(
        rename = "amazon-bedrock-invocationMetrics",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub metrics: Option<BedrockInvocationMetrics>,
}

impl LlamaResponse {
    /// Bare text fragment
    pub fn fragment(generation: impl Into<String>) -> Self {
        Self {
            generation: generation.into(),
            ..Self::default()
        }
    }
}
