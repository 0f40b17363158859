//! Per-family adaptation strategies
//!
//! A strategy bundles the three things that differ between vendor families:
//! building the vendor request, adapting a complete response, and creating
//! the stream reconstructor. Strategies are stateless statics selected by
//! [`strategy_for`].

use crate::convert::{self, ResponseContext};
use crate::error::LlmError;
use crate::protocol::{BedrockBody, BedrockRequest, VendorRequest, VendorResponse};
use crate::router::Provider;
use crate::stream::{AnthropicReconstructor, LlamaReconstructor, OpenAiReconstructor, StreamReconstructor};
use crate::types::{CompletionRequest, CompletionResponse};

/// Request building and response adaptation for one vendor family
pub trait ProviderStrategy: Send + Sync {
    /// Translate a canonical request into the vendor payload
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Validation` when the conversation cannot be
    /// expressed in the vendor's format.
    fn build_request(&self, request: &CompletionRequest, provider: Provider) -> Result<VendorRequest, LlmError>;

    /// Adapt a complete vendor response into the canonical shape
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Adaptation` when the response belongs to another
    /// vendor family.
    fn adapt_complete(&self, response: VendorResponse, ctx: &ResponseContext) -> Result<CompletionResponse, LlmError>;

    /// Fresh reconstructor for one stream
    fn reconstructor(&self, ctx: &ResponseContext) -> Box<dyn StreamReconstructor>;
}

/// `OpenAI` and OpenAI-compatible endpoints
#[derive(Debug)]
pub struct OpenAiStrategy;

/// Anthropic Messages, first-party or hosted on Bedrock
#[derive(Debug)]
pub struct AnthropicStrategy {
    bedrock: bool,
}

/// Llama 3.x on Bedrock
#[derive(Debug)]
pub struct LlamaStrategy;

static OPENAI: OpenAiStrategy = OpenAiStrategy;
static ANTHROPIC: AnthropicStrategy = AnthropicStrategy { bedrock: false };
static ANTHROPIC_BEDROCK: AnthropicStrategy = AnthropicStrategy { bedrock: true };
static LLAMA: LlamaStrategy = LlamaStrategy;

/// Strategy for a routed provider
pub fn strategy_for(provider: Provider) -> &'static dyn ProviderStrategy {
    match provider {
        Provider::OpenAi | Provider::OpenAiCompatible => &OPENAI,
        Provider::Anthropic => &ANTHROPIC,
        Provider::AnthropicBedrock => &ANTHROPIC_BEDROCK,
        Provider::LlamaBedrock => &LLAMA,
    }
}

fn unexpected(expected: &str, response: &VendorResponse) -> LlmError {
    let got = match response {
        VendorResponse::OpenAi(_) => "openai",
        VendorResponse::Anthropic(_) => "anthropic",
        VendorResponse::Llama(_) => "llama",
    };
    LlmError::adaptation(format!("expected a {expected} response, got {got}"))
}

impl ProviderStrategy for OpenAiStrategy {
    fn build_request(&self, request: &CompletionRequest, provider: Provider) -> Result<VendorRequest, LlmError> {
        Ok(VendorRequest::OpenAi(convert::openai::build_request(request, provider)))
    }

    fn adapt_complete(&self, response: VendorResponse, ctx: &ResponseContext) -> Result<CompletionResponse, LlmError> {
        match response {
            VendorResponse::OpenAi(resp) => {
                let mut adapted = CompletionResponse::from(resp);
                if adapted.model.is_empty() {
                    adapted.model.clone_from(&ctx.model);
                }
                Ok(adapted)
            }
            other => Err(unexpected("openai", &other)),
        }
    }

    fn reconstructor(&self, ctx: &ResponseContext) -> Box<dyn StreamReconstructor> {
        Box::new(OpenAiReconstructor::new(ctx.model.clone()))
    }
}

impl ProviderStrategy for AnthropicStrategy {
    fn build_request(&self, request: &CompletionRequest, _provider: Provider) -> Result<VendorRequest, LlmError> {
        let body = convert::anthropic::build_request(request, self.bedrock)?;

        Ok(if self.bedrock {
            VendorRequest::Bedrock(BedrockRequest {
                model_id: request.model.clone(),
                body: BedrockBody::Anthropic(body),
            })
        } else {
            VendorRequest::Anthropic(body)
        })
    }

    fn adapt_complete(&self, response: VendorResponse, ctx: &ResponseContext) -> Result<CompletionResponse, LlmError> {
        match response {
            VendorResponse::Anthropic(resp) => Ok(convert::anthropic::adapt_response(resp, ctx)),
            other => Err(unexpected("anthropic", &other)),
        }
    }

    fn reconstructor(&self, ctx: &ResponseContext) -> Box<dyn StreamReconstructor> {
        Box::new(AnthropicReconstructor::new(ctx.model.clone()))
    }
}

impl ProviderStrategy for LlamaStrategy {
    fn build_request(&self, request: &CompletionRequest, _provider: Provider) -> Result<VendorRequest, LlmError> {
        Ok(VendorRequest::Bedrock(BedrockRequest {
            model_id: request.model.clone(),
            body: BedrockBody::Llama(convert::llama::build_request(request)),
        }))
    }

    fn adapt_complete(&self, response: VendorResponse, ctx: &ResponseContext) -> Result<CompletionResponse, LlmError> {
        match response {
            VendorResponse::Llama(resp) => Ok(convert::llama::adapt_response(resp, ctx)),
            other => Err(unexpected("llama", &other)),
        }
    }

    fn reconstructor(&self, ctx: &ResponseContext) -> Box<dyn StreamReconstructor> {
        Box::new(LlamaReconstructor::new(ctx.model.clone()))
    }
}
