//! Canonical types for chat-completion requests, responses, and streams
//!
//! These types are provider-agnostic and mirror the `OpenAI` chat-completion
//! shape. Every vendor wire format converts to and from them.

pub mod credentials;
pub mod message;
pub mod request;
pub mod response;
pub mod stream;
pub mod tool;

pub use credentials::{AwsCredentials, CompatibleProviderCredentials, ProviderCredentials};
pub use message::{FunctionCall, Message, Role, ToolCall};
pub use request::CompletionRequest;
pub use response::{
    Choice, ChoiceMessage, CompletionDetails, CompletionResponse, FinishReason, PromptDetails, ResponseObject, Usage,
};
pub use stream::{StreamChoice, StreamChunk, StreamDelta, StreamFunctionCall};
pub use tool::{FunctionDefinition, ToolDefinition};

use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix timestamp in seconds
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
