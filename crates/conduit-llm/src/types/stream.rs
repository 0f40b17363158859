use serde::{Deserialize, Serialize};

use super::message::ToolCall;
use super::response::{FinishReason, Usage};
use super::unix_now;

/// Canonical streaming chunk (`chat.completion.chunk`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Response identifier shared by every chunk of a turn
    pub id: String,
    /// Always "chat.completion.chunk"
    pub object: String,
    /// Unix timestamp of creation
    pub created: u64,
    /// Model used for generation
    pub model: String,
    /// Single-element choice list
    pub choices: Vec<StreamChoice>,
    /// Usage, present only on the terminal chunk
    pub usage: Option<Usage>,
}

/// Choice within a streaming chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChoice {
    /// Choice index
    pub index: u32,
    /// Incremental delta
    pub delta: StreamDelta,
    /// Always null; kept for shape compatibility
    #[serde(default)]
    pub logprobs: Option<serde_json::Value>,
    /// Finish reason, null until the terminal chunk
    pub finish_reason: Option<FinishReason>,
}

/// Delta within a streaming choice
///
/// Text arrives incrementally; tool and function calls always arrive complete
/// in a single delta.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamDelta {
    /// Role, when the vendor reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Incremental text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Complete tool calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Complete legacy function call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<StreamFunctionCall>,
}

/// Function call within a delta; the name is null when extraction failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFunctionCall {
    /// Function name
    pub name: Option<String>,
    /// JSON-encoded arguments
    pub arguments: String,
}

impl StreamChunk {
    /// Chunk with a single choice at index 0
    pub fn new(id: &str, model: &str, delta: StreamDelta, finish_reason: Option<FinishReason>) -> Self {
        Self {
            id: id.to_owned(),
            object: "chat.completion.chunk".to_owned(),
            created: unix_now(),
            model: model.to_owned(),
            choices: vec![StreamChoice {
                index: 0,
                delta,
                logprobs: None,
                finish_reason,
            }],
            usage: None,
        }
    }

    /// Incremental text chunk
    pub fn text(id: &str, model: &str, text: impl Into<String>) -> Self {
        Self::new(
            id,
            model,
            StreamDelta {
                content: Some(text.into()),
                ..StreamDelta::default()
            },
            None,
        )
    }

    /// Attach terminal usage
    #[must_use]
    pub const fn with_usage(mut self, usage: Option<Usage>) -> Self {
        self.usage = usage;
        self
    }

    /// Delta of the first choice
    pub fn delta(&self) -> Option<&StreamDelta> {
        self.choices.first().map(|c| &c.delta)
    }

    /// Finish reason of the first choice
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.choices.first().and_then(|c| c.finish_reason)
    }
}
