use serde::{Deserialize, Serialize};

use super::message::{FunctionCall, ToolCall};

/// Reason the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of generation
    Stop,
    /// Hit the `max_tokens` limit
    Length,
    /// Model decided to call a tool
    ToolCalls,
    /// Legacy single function call
    FunctionCall,
    /// Content was filtered by safety systems
    ContentFilter,
}

impl FinishReason {
    /// Map a vendor stop reason to the canonical one
    ///
    /// Unknown reasons map to `None` so they never masquerade as a clean stop.
    pub fn from_vendor(reason: &str) -> Option<Self> {
        match reason {
            "stop" | "end_turn" | "stop_sequence" => Some(Self::Stop),
            "length" | "max_tokens" => Some(Self::Length),
            "tool_calls" | "tool_use" => Some(Self::ToolCalls),
            "function_call" => Some(Self::FunctionCall),
            "content_filter" | "refusal" => Some(Self::ContentFilter),
            _ => None,
        }
    }
}

/// Cached-prompt breakdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptDetails {
    /// Prompt tokens served from the vendor cache
    pub cached_tokens: u32,
}

/// Completion breakdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionDetails {
    /// Tokens spent on hidden reasoning
    pub reasoning_tokens: u32,
}

/// Token usage statistics
///
/// `total_tokens` is always `prompt_tokens + completion_tokens`; vendor
/// totals are never trusted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawUsage")]
pub struct Usage {
    /// Tokens consumed by the prompt
    pub prompt_tokens: u32,
    /// Tokens generated in the completion
    pub completion_tokens: u32,
    /// Prompt + completion
    pub total_tokens: u32,
    /// Prompt breakdown
    pub prompt_tokens_details: PromptDetails,
    /// Completion breakdown
    pub completion_tokens_details: CompletionDetails,
}

impl Usage {
    /// Build usage with a recomputed total
    pub const fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
            prompt_tokens_details: PromptDetails { cached_tokens: 0 },
            completion_tokens_details: CompletionDetails { reasoning_tokens: 0 },
        }
    }

    /// Attach cached prompt tokens
    #[must_use]
    pub const fn with_cached_tokens(mut self, cached_tokens: u32) -> Self {
        self.prompt_tokens_details.cached_tokens = cached_tokens;
        self
    }

    /// Attach reasoning tokens
    #[must_use]
    pub const fn with_reasoning_tokens(mut self, reasoning_tokens: u32) -> Self {
        self.completion_tokens_details.reasoning_tokens = reasoning_tokens;
        self
    }
}

#[derive(Deserialize)]
struct RawUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    prompt_tokens_details: Option<PromptDetails>,
    #[serde(default)]
    completion_tokens_details: Option<CompletionDetails>,
}

impl From<RawUsage> for Usage {
    fn from(raw: RawUsage) -> Self {
        Self::new(raw.prompt_tokens, raw.completion_tokens)
            .with_cached_tokens(raw.prompt_tokens_details.map_or(0, |d| d.cached_tokens))
            .with_reasoning_tokens(raw.completion_tokens_details.map_or(0, |d| d.reasoning_tokens))
    }
}

/// Canonical response object type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseObject {
    /// Chat-style completion
    #[serde(rename = "chat.completion")]
    ChatCompletion,
    /// Prompt-style completion (Llama)
    #[serde(rename = "text_completion")]
    TextCompletion,
}

/// Message within a response choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceMessage {
    /// Author role ("assistant" or, for tool-result blocks, "tool")
    pub role: String,
    /// Text content, null for tool-call turns
    pub content: Option<String>,
    /// Tool calls requested by the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Legacy single function call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
}

impl ChoiceMessage {
    /// Text message with the given role
    pub fn text(role: &str, content: String) -> Self {
        Self {
            role: role.to_owned(),
            content: Some(content),
            tool_calls: None,
            function_call: None,
        }
    }

    /// Assistant message carrying tool calls
    pub fn with_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: "assistant".to_owned(),
            content: None,
            tool_calls: Some(tool_calls),
            function_call: None,
        }
    }

    /// Assistant message carrying a legacy function call
    pub fn with_function_call(function_call: FunctionCall) -> Self {
        Self {
            role: "assistant".to_owned(),
            content: None,
            tool_calls: None,
            function_call: Some(function_call),
        }
    }
}

/// A single completion choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Index of this choice
    pub index: u32,
    /// Generated message
    pub message: ChoiceMessage,
    /// Always null; kept for shape compatibility
    #[serde(default)]
    pub logprobs: Option<serde_json::Value>,
    /// Why generation stopped
    pub finish_reason: Option<FinishReason>,
}

/// Canonical completion response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Response identifier
    pub id: String,
    /// Object type
    pub object: ResponseObject,
    /// Unix timestamp of creation
    pub created: u64,
    /// Model used for generation
    pub model: String,
    /// Generated choices
    pub choices: Vec<Choice>,
    /// Token usage statistics
    pub usage: Usage,
    /// Vendor fingerprint, when reported
    #[serde(default)]
    pub system_fingerprint: Option<String>,
}

impl CompletionResponse {
    /// Text of the first choice, if any
    pub fn first_text(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.message.content.as_deref())
    }
}
