//! Anthropic Messages API wire format types
//!
//! The same shapes are used for first-party calls and for Anthropic models
//! hosted on Bedrock; Bedrock drops `model`, adds `anthropic_version`, and may
//! attach invocation metrics to stream events.

use serde::{Deserialize, Serialize};

/// `anthropic_version` value Bedrock expects in the request body
pub const BEDROCK_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

// -- Request types --

/// Anthropic messages API request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicRequest {
    /// Model identifier (absent on Bedrock, where it travels as `modelId`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Bedrock API version marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anthropic_version: Option<String>,
    /// Maximum tokens to generate (required by Anthropic)
    pub max_tokens: u32,
    /// System prompt (top-level, not in messages)
    pub system: String,
    /// Strictly alternating conversation messages
    pub messages: Vec<AnthropicMessage>,
    pub temperature: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<AnthropicTool>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicMessage {
    /// Role ("user" or "assistant")
    pub role: AnthropicRole,
    pub content: Vec<AnthropicContentBlock>,
}

/// The only two roles the Messages API accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnthropicRole {
    User,
    Assistant,
}

impl AnthropicRole {
    /// The other role
    pub const fn opposite(self) -> Self {
        match self {
            Self::User => Self::Assistant,
            Self::Assistant => Self::User,
        }
    }
}

/// Content block in an Anthropic request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContentBlock {
    Text {
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicTool {
    /// Tool type, always "custom"
    #[serde(rename = "type")]
    pub tool_type: String,
    pub name: String,
    pub description: String,
    /// JSON Schema for input parameters
    pub input_schema: serde_json::Value,
}

// -- Response types --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicResponse {
    pub id: String,
    #[serde(default)]
    pub model: String,
    pub content: Vec<AnthropicResponseBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: AnthropicUsage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        /// Tool input as JSON
        #[serde(default)]
        input: serde_json::Value,
    },
    /// Tool result echoed back by the vendor
    ToolResult {
        /// Tool use ID this result responds to
        #[serde(default)]
        tool_use_id: String,
        /// Result content (string or blocks)
        #[serde(default)]
        content: serde_json::Value,
    },
    /// Any block type this layer does not know yet
    #[serde(other)]
    Unknown,
}

/// Anthropic token usage
///
/// Every field is optional because `message_delta` events only carry the
/// fields that changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnthropicUsage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u32>,
    /// Input tokens served from the prompt cache
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_input_tokens: Option<u32>,
}

/// Token counts Bedrock attaches out of band
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BedrockInvocationMetrics {
    #[serde(default)]
    pub input_token_count: Option<u32>,
    #[serde(default)]
    pub output_token_count: Option<u32>,
}

// -- Streaming types --

/// One decoded stream payload: the event plus any Bedrock side channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicStreamFrame {
    /// The Messages API event
    #[serde(flatten)]
    pub event: AnthropicStreamEvent,
    /// Bedrock invocation metrics, usually on the final event
    #[serde(
        rename = "amazon-bedrock-invocationMetrics",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub metrics: Option<BedrockInvocationMetrics>,
}

impl From<AnthropicStreamEvent> for AnthropicStreamFrame {
    fn from(event: AnthropicStreamEvent) -> Self {
        Self { event, metrics: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicStreamEvent {
    MessageStart {
        message: AnthropicStreamMessage,
    },
    ContentBlockStart {
        index: u32,
        content_block: AnthropicStreamContentBlock,
    },
    /// Incremental content within a block
    ContentBlockDelta {
        index: u32,
        delta: AnthropicStreamDelta,
    },
    ContentBlockStop {
        index: u32,
    },
    /// Message metadata delta (stop reason, usage)
    MessageDelta {
        #[serde(default)]
        delta: AnthropicMessageDelta,
        #[serde(default)]
        usage: Option<AnthropicUsage>,
    },
    MessageStop {
        /// Final usage, when the vendor reports it here
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<AnthropicUsage>,
    },
    Ping,
    /// Vendor-side error mid-stream
    Error {
        error: AnthropicErrorDetail,
    },
    /// Any event type this layer does not know yet
    #[serde(other)]
    Unknown,
}

/// Partial message in a `message_start` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicStreamMessage {
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub usage: Option<AnthropicUsage>,
}

/// Content block in a `content_block_start` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicStreamContentBlock {
    Text {
        /// Initial text (usually empty)
        #[serde(default)]
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
    },
    /// Block type this layer does not know yet
    #[serde(other)]
    Unknown,
}

/// Delta content in a `content_block_delta` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicStreamDelta {
    TextDelta {
        text: String,
    },
    /// Incremental tool input JSON
    InputJsonDelta {
        partial_json: String,
    },
    /// Delta type this layer does not know yet
    #[serde(other)]
    Unknown,
}

/// Delta in a `message_delta` event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnthropicMessageDelta {
    #[serde(default)]
    pub stop_reason: Option<String>,
}

// -- Error response --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnthropicErrorDetail {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}
