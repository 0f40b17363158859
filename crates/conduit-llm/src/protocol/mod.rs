//! Wire format types for the vendor protocols
//!
//! Each module contains pure serde structs matching the respective vendor's
//! JSON API format. These types are only used at the boundary between the
//! adapters and the transports.

pub mod anthropic;
pub mod llama;
pub mod openai;

use serde::Serialize;

use self::anthropic::{AnthropicRequest, AnthropicResponse, AnthropicStreamFrame};
use self::llama::{LlamaRequest, LlamaResponse};
use self::openai::{OpenAiRequest, OpenAiResponse, OpenAiStreamChunk};

/// Request payload ready to hand to a transport
#[derive(Debug, Clone, PartialEq)]
pub enum VendorRequest {
    /// `OpenAI` or OpenAI-compatible chat completion
    OpenAi(OpenAiRequest),
    /// First-party Anthropic Messages API
    Anthropic(AnthropicRequest),
    /// Bedrock `invoke_model` call
    Bedrock(BedrockRequest),
}

impl VendorRequest {
    /// Short family name for logs and errors
    pub const fn family(&self) -> &'static str {
        match self {
            Self::OpenAi(_) => "openai",
            Self::Anthropic(_) => "anthropic",
            Self::Bedrock(BedrockRequest {
                body: BedrockBody::Anthropic(_),
                ..
            }) => "bedrock-anthropic",
            Self::Bedrock(BedrockRequest {
                body: BedrockBody::Llama(_),
                ..
            }) => "bedrock-llama",
        }
    }
}

/// Bedrock invocation: model id plus a JSON body
#[derive(Debug, Clone, PartialEq)]
pub struct BedrockRequest {
    /// Bedrock model identifier
    pub model_id: String,
    /// Vendor-specific JSON body
    pub body: BedrockBody,
}

/// Body of a Bedrock invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BedrockBody {
    /// Anthropic Messages body with `anthropic_version`
    Anthropic(AnthropicRequest),
    /// Llama prompt body
    Llama(LlamaRequest),
}

/// Complete response returned by a transport
#[derive(Debug, Clone, PartialEq)]
pub enum VendorResponse {
    /// `OpenAI`-shaped completion
    OpenAi(OpenAiResponse),
    /// Anthropic message, first-party or Bedrock
    Anthropic(AnthropicResponse),
    /// Llama generation
    Llama(LlamaResponse),
}

/// One event of a vendor stream
#[derive(Debug, Clone, PartialEq)]
pub enum VendorEvent {
    /// `OpenAI` SSE chunk
    OpenAi(OpenAiStreamChunk),
    /// Anthropic SSE event or Bedrock payload part
    Anthropic(AnthropicStreamFrame),
    /// Llama generation fragment
    Llama(LlamaResponse),
}

impl VendorEvent {
    /// Short family name for logs and errors
    pub const fn family(&self) -> &'static str {
        match self {
            Self::OpenAi(_) => "openai",
            Self::Anthropic(_) => "anthropic",
            Self::Llama(_) => "llama",
        }
    }
}
