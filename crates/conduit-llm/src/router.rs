//! Model identifier to provider resolution
//!
//! The lookup table is built once from the static model lists and only read
//! afterwards, so concurrent calls share it freely.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use url::Url;

use crate::error::LlmError;

/// Vendor family a request is adapted for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    /// `OpenAI` chat completions
    OpenAi,
    /// Any endpoint speaking the `OpenAI` protocol at a caller-given base URL
    OpenAiCompatible,
    /// First-party Anthropic Messages API
    Anthropic,
    /// Anthropic models on AWS Bedrock
    AnthropicBedrock,
    /// Llama 3.x models on AWS Bedrock
    LlamaBedrock,
}

impl Provider {
    /// Stable name for logs
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::OpenAiCompatible => "openai-compatible",
            Self::Anthropic => "anthropic",
            Self::AnthropicBedrock => "anthropic-bedrock",
            Self::LlamaBedrock => "llama-bedrock",
        }
    }

    /// Whether one transport can serve both providers
    ///
    /// `OpenAI` and compatible endpoints share a wire protocol, as do the two
    /// Bedrock families.
    pub const fn shares_transport_with(self, other: Self) -> bool {
        matches!(
            (self, other),
            (Self::OpenAi | Self::OpenAiCompatible, Self::OpenAi | Self::OpenAiCompatible)
                | (Self::Anthropic, Self::Anthropic)
                | (
                    Self::AnthropicBedrock | Self::LlamaBedrock,
                    Self::AnthropicBedrock | Self::LlamaBedrock
                )
        )
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const OPENAI_MODELS: &[&str] = &[
    "gpt-3.5-turbo",
    "gpt-3.5-turbo-0125",
    "gpt-3.5-turbo-1106",
    "gpt-4",
    "gpt-4-0613",
    "gpt-4-turbo",
    "gpt-4-turbo-2024-04-09",
    "gpt-4-turbo-preview",
    "gpt-4o",
    "gpt-4o-2024-05-13",
    "gpt-4o-2024-08-06",
    "gpt-4o-2024-11-20",
    "gpt-4o-mini",
    "gpt-4o-mini-2024-07-18",
    "gpt-4.1",
    "gpt-4.1-mini",
    "gpt-4.1-nano",
    "gpt-5",
    "gpt-5-mini",
    "gpt-5-nano",
    "o1",
    "o1-mini",
    "o3",
    "o3-mini",
    "o4-mini",
];

const ANTHROPIC_MODELS: &[&str] = &[
    "claude-3-haiku-20240307",
    "claude-3-opus-20240229",
    "claude-3-5-haiku-20241022",
    "claude-3-5-sonnet-20240620",
    "claude-3-5-sonnet-20241022",
    "claude-3-7-sonnet-20250219",
    "claude-sonnet-4-20250514",
    "claude-opus-4-20250514",
];

const ANTHROPIC_BEDROCK_MODELS: &[&str] = &[
    "anthropic.claude-3-haiku-20240307-v1:0",
    "anthropic.claude-3-sonnet-20240229-v1:0",
    "anthropic.claude-3-opus-20240229-v1:0",
    "anthropic.claude-3-5-haiku-20241022-v1:0",
    "anthropic.claude-3-5-sonnet-20240620-v1:0",
    "anthropic.claude-3-5-sonnet-20241022-v2:0",
    "anthropic.claude-3-7-sonnet-20250219-v1:0",
    "us.anthropic.claude-3-5-sonnet-20241022-v2:0",
    "us.anthropic.claude-3-7-sonnet-20250219-v1:0",
    "us.anthropic.claude-sonnet-4-20250514-v1:0",
];

const LLAMA_BEDROCK_MODELS: &[&str] = &[
    "meta.llama3-8b-instruct-v1:0",
    "meta.llama3-70b-instruct-v1:0",
    "meta.llama3-1-8b-instruct-v1:0",
    "meta.llama3-1-70b-instruct-v1:0",
    "meta.llama3-1-405b-instruct-v1:0",
    "meta.llama3-2-1b-instruct-v1:0",
    "meta.llama3-2-3b-instruct-v1:0",
    "meta.llama3-3-70b-instruct-v1:0",
    "us.meta.llama3-1-8b-instruct-v1:0",
    "us.meta.llama3-1-70b-instruct-v1:0",
    "us.meta.llama3-3-70b-instruct-v1:0",
];

/// Model id to provider, first table wins on overlap
static MODEL_TABLE: LazyLock<HashMap<&'static str, Provider>> = LazyLock::new(|| {
    let tables = [
        (OPENAI_MODELS, Provider::OpenAi),
        (ANTHROPIC_MODELS, Provider::Anthropic),
        (ANTHROPIC_BEDROCK_MODELS, Provider::AnthropicBedrock),
        (LLAMA_BEDROCK_MODELS, Provider::LlamaBedrock),
    ];

    let mut table = HashMap::new();
    for (models, provider) in tables {
        for model in models {
            table.entry(*model).or_insert(provider);
        }
    }
    table
});

/// Resolve a model identifier to its provider
///
/// A known model always routes to its table entry; the compatibility base URL
/// only catches models that no table lists.
///
/// # Errors
///
/// Returns `LlmError::Configuration` for an empty model id and
/// `LlmError::UnsupportedModel` when nothing matches and no compatibility URL
/// was given.
pub fn route(model: &str, compat_base_url: Option<&Url>) -> Result<Provider, LlmError> {
    if model.trim().is_empty() {
        return Err(LlmError::Configuration("model id is required".to_owned()));
    }

    if let Some(provider) = MODEL_TABLE.get(model) {
        return Ok(*provider);
    }

    if compat_base_url.is_some() {
        tracing::debug!(model, "model not in any table, routing to compatible endpoint");
        return Ok(Provider::OpenAiCompatible);
    }

    Err(LlmError::UnsupportedModel {
        model: model.to_owned(),
    })
}

/// Whether the model expects the modern `tools`/`tool_calls` protocol
///
/// Legacy `OpenAI` models (`gpt-3.5-turbo*`, `gpt-4`, `gpt-4-turbo*`) keep the
/// `functions`/`function_call` form. Compatible endpoints are assumed modern.
pub fn requires_tool_calls(provider: Provider, model: &str) -> bool {
    match provider {
        Provider::OpenAiCompatible => true,
        Provider::OpenAi => {
            const MODERN_PREFIXES: &[&str] = &["gpt-4o", "gpt-4.1", "gpt-5", "o1", "o3", "o4"];
            MODERN_PREFIXES.iter().any(|prefix| model.starts_with(prefix))
        }
        Provider::Anthropic | Provider::AnthropicBedrock | Provider::LlamaBedrock => false,
    }
}
