//! AWS Bedrock transport using `InvokeModel` with vendor-native JSON bodies

use async_trait::async_trait;
use aws_sdk_bedrockruntime::Client as BedrockClient;
use aws_sdk_bedrockruntime::error::DisplayErrorContext;
use aws_sdk_bedrockruntime::types::ResponseStream;
use aws_smithy_types::Blob;
use secrecy::ExposeSecret;

use super::{VendorTransport, wrong_request};
use crate::error::LlmError;
use crate::protocol::anthropic::{AnthropicResponse, AnthropicStreamFrame};
use crate::protocol::llama::LlamaResponse;
use crate::protocol::{BedrockBody, BedrockRequest, VendorEvent, VendorRequest, VendorResponse};
use crate::router::Provider;
use crate::stream::VendorEventStream;
use crate::types::AwsCredentials;

/// Bedrock runtime transport for Anthropic and Llama bodies
pub struct BedrockTransport {
    provider: Provider,
    client: BedrockClient,
}

impl BedrockTransport {
    /// Build a runtime client from explicit credentials
    pub async fn new(provider: Provider, credentials: &AwsCredentials) -> Self {
        let aws_credentials = aws_credential_types::Credentials::new(
            credentials.access_key_id.expose_secret(),
            credentials.secret_access_key.expose_secret(),
            None, // session token
            None, // expiry
            "conduit-credentials",
        );

        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(credentials.region.clone()))
            .credentials_provider(aws_credentials)
            .load()
            .await;

        Self::from_client(provider, BedrockClient::new(&aws_config))
    }

    /// Wrap an already configured runtime client
    pub const fn from_client(provider: Provider, client: BedrockClient) -> Self {
        Self { provider, client }
    }

    fn body<'a>(&self, request: &'a VendorRequest) -> Result<&'a BedrockRequest, LlmError> {
        match request {
            VendorRequest::Bedrock(body) => Ok(body),
            other => Err(wrong_request(self.provider, other)),
        }
    }
}

fn encode(request: &BedrockRequest) -> Result<Blob, LlmError> {
    serde_json::to_vec(&request.body)
        .map(Blob::new)
        .map_err(|e| LlmError::adaptation_with("failed to encode bedrock body", e))
}

/// Decode one payload part according to the body family that was sent
fn decode_part(bytes: &[u8], llama: bool) -> Result<VendorEvent, serde_json::Error> {
    if llama {
        serde_json::from_slice::<LlamaResponse>(bytes).map(VendorEvent::Llama)
    } else {
        serde_json::from_slice::<AnthropicStreamFrame>(bytes).map(VendorEvent::Anthropic)
    }
}

#[async_trait]
impl VendorTransport for BedrockTransport {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn invoke(&self, request: &VendorRequest) -> Result<VendorResponse, LlmError> {
        let request = self.body(request)?;

        let output = self
            .client
            .invoke_model()
            .model_id(&request.model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(encode(request)?)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(provider = %self.provider, error = %DisplayErrorContext(&e), "bedrock invoke_model failed");
                LlmError::Upstream(DisplayErrorContext(&e).to_string())
            })?;

        let bytes = output.body().as_ref();
        let parsed = match request.body {
            BedrockBody::Anthropic(_) => serde_json::from_slice::<AnthropicResponse>(bytes).map(VendorResponse::Anthropic),
            BedrockBody::Llama(_) => serde_json::from_slice::<LlamaResponse>(bytes).map(VendorResponse::Llama),
        };

        parsed.map_err(|e| LlmError::Upstream(format!("failed to parse response: {e}")))
    }

    async fn invoke_stream(&self, request: &VendorRequest) -> Result<VendorEventStream, LlmError> {
        let request = self.body(request)?;
        let llama = matches!(request.body, BedrockBody::Llama(_));

        let output = self
            .client
            .invoke_model_with_response_stream()
            .model_id(&request.model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(encode(request)?)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    provider = %self.provider,
                    error = %DisplayErrorContext(&e),
                    "bedrock invoke_model_with_response_stream failed"
                );
                LlmError::Upstream(DisplayErrorContext(&e).to_string())
            })?;

        // The receiver is dropped after the first failure so the stream ends
        let stream = futures_util::stream::unfold(Some(output.body), move |receiver| async move {
            let mut receiver = receiver?;
            loop {
                match receiver.recv().await {
                    Ok(Some(ResponseStream::Chunk(part))) => {
                        let Some(bytes) = part.bytes() else {
                            continue;
                        };
                        match decode_part(bytes.as_ref(), llama) {
                            Ok(event) => return Some((Ok(event), Some(receiver))),
                            Err(e) => {
                                tracing::debug!(error = %e, "skipping unparseable bedrock payload part");
                            }
                        }
                    }
                    Ok(Some(_)) => {
                        tracing::debug!("skipping unknown bedrock stream event");
                    }
                    Ok(None) => return None,
                    Err(e) => {
                        let message = DisplayErrorContext(&e).to_string();
                        return Some((Err(LlmError::Streaming(message)), None));
                    }
                }
            }
        });

        Ok(Box::pin(stream))
    }
}
