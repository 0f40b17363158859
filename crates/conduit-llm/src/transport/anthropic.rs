//! First-party Anthropic Messages API transport

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::{VendorTransport, endpoint, read_json, send, sse_events, wrong_request};
use crate::error::LlmError;
use crate::protocol::anthropic::{AnthropicRequest, AnthropicResponse, AnthropicStreamFrame};
use crate::protocol::{VendorEvent, VendorRequest, VendorResponse};
use crate::router::Provider;
use crate::stream::VendorEventStream;

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Messages API over HTTP
pub struct AnthropicTransport {
    client: Client,
    base_url: Url,
    api_key: SecretString,
}

impl AnthropicTransport {
    /// Transport for `base_url`, e.g. `https://api.anthropic.com/v1`
    pub fn new(base_url: Url, api_key: SecretString) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
        }
    }

    fn body<'a>(request: &'a VendorRequest) -> Result<&'a AnthropicRequest, LlmError> {
        match request {
            VendorRequest::Anthropic(body) => Ok(body),
            other => Err(wrong_request(Provider::Anthropic, other)),
        }
    }

    async fn post(&self, body: &AnthropicRequest) -> Result<reqwest::Response, LlmError> {
        let builder = self
            .client
            .post(endpoint(&self.base_url, "messages"))
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("x-api-key", self.api_key.expose_secret())
            .json(body);

        send(Provider::Anthropic, builder).await
    }
}

#[async_trait]
impl VendorTransport for AnthropicTransport {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn invoke(&self, request: &VendorRequest) -> Result<VendorResponse, LlmError> {
        let body = Self::body(request)?;
        let response = self.post(body).await?;
        let wire: AnthropicResponse = read_json(response).await?;

        Ok(VendorResponse::Anthropic(wire))
    }

    async fn invoke_stream(&self, request: &VendorRequest) -> Result<VendorEventStream, LlmError> {
        let mut body = Self::body(request)?.clone();
        body.stream = Some(true);

        let response = self.post(&body).await?;

        Ok(sse_events::<AnthropicStreamFrame, _>(response, VendorEvent::Anthropic))
    }
}
