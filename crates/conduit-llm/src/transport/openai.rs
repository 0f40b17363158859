//! `OpenAI` and OpenAI-compatible transport

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::{VendorTransport, endpoint, read_json, send, sse_events, wrong_request};
use crate::error::LlmError;
use crate::protocol::openai::{OpenAiRequest, OpenAiResponse, OpenAiStreamChunk, OpenAiStreamOptions};
use crate::protocol::{VendorEvent, VendorRequest, VendorResponse};
use crate::router::Provider;
use crate::stream::VendorEventStream;

/// Whether the endpoint is the canonical `OpenAI` API (vs a compatible third-party)
fn is_canonical_openai(base_url: &Url) -> bool {
    base_url.host_str().is_some_and(|h| h == "api.openai.com")
}

/// Chat completions over HTTP with bearer auth
pub struct OpenAiTransport {
    provider: Provider,
    client: Client,
    base_url: Url,
    api_key: SecretString,
}

impl OpenAiTransport {
    /// Transport for `base_url`, e.g. `https://api.openai.com/v1`
    pub fn new(provider: Provider, base_url: Url, api_key: SecretString) -> Self {
        Self {
            provider,
            client: Client::new(),
            base_url,
            api_key,
        }
    }

    fn body<'a>(&self, request: &'a VendorRequest) -> Result<&'a OpenAiRequest, LlmError> {
        match request {
            VendorRequest::OpenAi(body) => Ok(body),
            other => Err(wrong_request(self.provider, other)),
        }
    }

    async fn post(&self, body: &OpenAiRequest) -> Result<reqwest::Response, LlmError> {
        let builder = self
            .client
            .post(endpoint(&self.base_url, "chat/completions"))
            .bearer_auth(self.api_key.expose_secret())
            .json(body);

        send(self.provider, builder).await
    }
}

#[async_trait]
impl VendorTransport for OpenAiTransport {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn invoke(&self, request: &VendorRequest) -> Result<VendorResponse, LlmError> {
        let body = self.body(request)?;
        let response = self.post(body).await?;
        let wire: OpenAiResponse = read_json(response).await?;

        Ok(VendorResponse::OpenAi(wire))
    }

    async fn invoke_stream(&self, request: &VendorRequest) -> Result<VendorEventStream, LlmError> {
        let mut body = self.body(request)?.clone();
        body.stream = Some(true);

        // Many compatible servers reject stream_options outright
        body.stream_options = is_canonical_openai(&self.base_url).then_some(OpenAiStreamOptions { include_usage: true });

        let response = self.post(&body).await?;

        Ok(sse_events::<OpenAiStreamChunk, _>(response, VendorEvent::OpenAi))
    }
}
