//! Vendor transports
//!
//! A transport moves an already-adapted vendor payload over the wire and
//! hands back the raw vendor response or event stream. It knows nothing about
//! canonical types; all shape conversion happens in `convert` and `stream`.

pub mod anthropic;
pub mod bedrock;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::{RequestBuilder, Response};
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use url::Url;

pub use self::anthropic::AnthropicTransport;
pub use self::bedrock::BedrockTransport;
pub use self::openai::OpenAiTransport;
use crate::error::LlmError;
use crate::protocol::{VendorEvent, VendorRequest, VendorResponse};
use crate::router::Provider;
use crate::stream::VendorEventStream;
use crate::types::ProviderCredentials;

/// Default `OpenAI` API base URL
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default Anthropic API base URL
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Wire access to one vendor endpoint
#[async_trait]
pub trait VendorTransport: Send + Sync {
    /// Provider this transport talks to
    fn provider(&self) -> Provider;

    /// Send a request and wait for the complete response
    async fn invoke(&self, request: &VendorRequest) -> Result<VendorResponse, LlmError>;

    /// Send a request and return the vendor event stream
    async fn invoke_stream(&self, request: &VendorRequest) -> Result<VendorEventStream, LlmError>;
}

/// Build the transport for `provider` from caller credentials
///
/// # Errors
///
/// Returns `LlmError::Configuration` when the credentials the provider needs
/// are missing.
pub async fn transport_for(
    provider: Provider,
    credentials: &ProviderCredentials,
) -> Result<Arc<dyn VendorTransport>, LlmError> {
    match provider {
        Provider::OpenAi => {
            let api_key = require_api_key(provider, credentials)?;
            Ok(Arc::new(OpenAiTransport::new(provider, default_url(OPENAI_BASE_URL)?, api_key)))
        }
        Provider::OpenAiCompatible => {
            let compat = credentials.openai_compatible.as_ref().ok_or_else(|| {
                LlmError::Configuration("OpenAI-compatible provider requires a base URL and API key".to_owned())
            })?;
            Ok(Arc::new(OpenAiTransport::new(
                provider,
                compat.base_url.clone(),
                compat.api_key.clone(),
            )))
        }
        Provider::Anthropic => {
            let api_key = require_api_key(provider, credentials)?;
            Ok(Arc::new(AnthropicTransport::new(default_url(ANTHROPIC_BASE_URL)?, api_key)))
        }
        Provider::AnthropicBedrock | Provider::LlamaBedrock => {
            let aws = credentials
                .aws
                .as_ref()
                .ok_or_else(|| LlmError::Configuration(format!("{provider} requires AWS credentials")))?;
            Ok(Arc::new(BedrockTransport::new(provider, aws).await))
        }
    }
}

fn require_api_key(provider: Provider, credentials: &ProviderCredentials) -> Result<SecretString, LlmError> {
    credentials
        .api_key
        .clone()
        .ok_or_else(|| LlmError::Configuration(format!("{provider} requires an API key")))
}

fn default_url(url: &str) -> Result<Url, LlmError> {
    Url::parse(url).map_err(|e| LlmError::Configuration(format!("invalid base URL {url}: {e}")))
}

/// Error for a request of a family the transport does not speak
pub(crate) fn wrong_request(transport: Provider, request: &VendorRequest) -> LlmError {
    LlmError::adaptation(format!("{transport} transport cannot send a {} request", request.family()))
}

/// Join a path onto a base URL that may or may not end in a slash
pub(crate) fn endpoint(base_url: &Url, path: &str) -> String {
    let base = base_url.as_str().trim_end_matches('/');
    format!("{base}/{path}")
}

/// Send a request, mapping transport failures and non-success statuses
pub(crate) async fn send(provider: Provider, builder: RequestBuilder) -> Result<Response, LlmError> {
    let response = builder.send().await.map_err(|e| {
        tracing::error!(provider = %provider, error = %e, "upstream request failed");
        LlmError::Upstream(e.to_string())
    })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(
            provider = %provider,
            status = %status,
            "upstream returned error"
        );
        return Err(LlmError::Upstream(format!("provider returned {status}: {body}")));
    }

    Ok(response)
}

/// Decode a complete JSON response body
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, LlmError> {
    response
        .json()
        .await
        .map_err(|e| LlmError::Upstream(format!("failed to parse response: {e}")))
}

/// Decode an SSE body into vendor events
///
/// Empty data lines and the `[DONE]` sentinel are dropped; lines that do not
/// parse as `T` are skipped.
pub(crate) fn sse_events<T, F>(response: Response, wrap: F) -> VendorEventStream
where
    T: DeserializeOwned + 'static,
    F: Fn(T) -> VendorEvent + Send + 'static,
{
    let mapped = response
        .bytes_stream()
        .eventsource()
        .map(move |result| match result {
            Ok(event) => {
                let data = event.data.trim();
                if data.is_empty() || data == "[DONE]" {
                    return vec![];
                }

                match serde_json::from_str::<T>(data) {
                    Ok(parsed) => vec![Ok(wrap(parsed))],
                    Err(e) => {
                        tracing::debug!(error = %e, data = %data, "skipping unparseable SSE chunk");
                        vec![]
                    }
                }
            }
            Err(e) => vec![Err(LlmError::Streaming(e.to_string()))],
        })
        .flat_map(futures_util::stream::iter);

    Box::pin(mapped)
}
