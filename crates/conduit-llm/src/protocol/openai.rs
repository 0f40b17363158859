//! `OpenAI` chat completion API wire format types
//!
//! Canonical messages already have the `OpenAI` shape, so requests reuse them
//! directly; only the envelope and the streaming fragments differ.

use serde::{Deserialize, Serialize};

use crate::types::{ChoiceMessage, FunctionDefinition, Message, ToolDefinition, Usage};

// -- Request types --

/// `OpenAI` chat completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Tool definitions (modern protocol)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    /// Function definitions (legacy protocol)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub functions: Option<Vec<FunctionDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Only sent to the canonical `OpenAI` host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<OpenAiStreamOptions>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAiStreamOptions {
    #[serde(default)]
    pub include_usage: bool,
}

// -- Response types --

/// Non-streaming reply; `usage` is optional because some compatible servers omit it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiResponse {
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created: u64,
    pub model: String,
    pub choices: Vec<OpenAiChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_fingerprint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiChoice {
    pub index: u32,
    pub message: ChoiceMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

// -- Streaming types --

/// One SSE `data:` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiStreamChunk {
    pub id: String,
    #[serde(default)]
    pub created: u64,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<OpenAiStreamChoice>,
    /// Usage (present on final chunk when `stream_options.include_usage` is true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiStreamChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: OpenAiStreamDelta,
    /// Finish reason (present on final chunk)
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenAiStreamDelta {
    /// Role (present on first chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAiStreamToolCall>>,
    /// Legacy `functions` protocol
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<OpenAiStreamFunctionCall>,
}

/// Tool-call fragment; fragments sharing an `index` belong to one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiStreamToolCall {
    /// Omitted by some compatible endpoints when a turn has one call
    #[serde(default)]
    pub index: u32,
    /// Tool call ID (first chunk only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<OpenAiStreamFunctionCall>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiStreamFunctionCall {
    /// Function name (first chunk only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Raw JSON text, split at arbitrary byte boundaries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_fragments_deserialize() {
        let chunk: OpenAiStreamChunk = serde_json::from_str(
            r#"{"id":"c1","choices":[{"delta":{"tool_calls":[{"index":1,"function":{"arguments":"{\"a\""}}]}}]}"#,
        )
        .unwrap();

        let choice = &chunk.choices[0];
        assert_eq!(choice.index, 0);
        assert!(choice.finish_reason.is_none());

        let call = &choice.delta.tool_calls.as_ref().unwrap()[0];
        assert_eq!(call.index, 1);
        assert!(call.id.is_none());
        let function = call.function.as_ref().unwrap();
        assert!(function.name.is_none());
        assert_eq!(function.arguments.as_deref(), Some("{\"a\""));
    }

    #[test]
    fn stream_options_are_omitted_unless_set() {
        let request = OpenAiRequest {
            model: "gpt-4o".to_owned(),
            messages: Vec::new(),
            max_tokens: None,
            temperature: None,
            tools: None,
            functions: None,
            stream: Some(true),
            stream_options: None,
        };

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["stream"], true);
        assert!(body.get("stream_options").is_none());
        assert!(body.get("functions").is_none());
    }
}
