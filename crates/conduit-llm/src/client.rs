//! Client facade wiring routing, adaptation, and transport together

use conduit_config::DefaultsConfig;

use crate::convert::ResponseContext;
use crate::error::LlmError;
use crate::router::{Provider, route};
use crate::strategy::strategy_for;
use crate::stream::ChunkStream;
use crate::transport::{VendorTransport, transport_for};
use crate::types::{CompletionRequest, CompletionResponse, ProviderCredentials};

/// Values applied to requests that leave them unset
///
/// Vendor adapters have their own fallbacks; these take precedence over them
/// when configured.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RequestDefaults {
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f64>,
}

impl From<&DefaultsConfig> for RequestDefaults {
    fn from(config: &DefaultsConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

/// Entry point for canonical completions against any supported vendor
///
/// Holds no per-call state; one instance can serve concurrent calls.
#[derive(Debug, Clone, Default)]
pub struct Conduit {
    defaults: RequestDefaults,
}

impl Conduit {
    /// Client applying `defaults` to requests that leave them unset
    pub const fn new(defaults: RequestDefaults) -> Self {
        Self { defaults }
    }

    /// Configured request defaults
    pub const fn defaults(&self) -> RequestDefaults {
        self.defaults
    }

    /// Generate a complete response
    ///
    /// # Errors
    ///
    /// Returns configuration, routing, and validation errors before any vendor
    /// call is made, then `Upstream` or `Adaptation` errors from the call.
    pub async fn generate(
        &self,
        request: CompletionRequest,
        credentials: &ProviderCredentials,
    ) -> Result<CompletionResponse, LlmError> {
        let prepared = self.prepare(request, credentials)?;
        let transport = transport_for(prepared.provider, credentials).await?;
        Self::complete(prepared, transport.as_ref()).await
    }

    /// Generate a complete response through an explicit transport
    ///
    /// `credentials` are only consulted for routing.
    ///
    /// # Errors
    ///
    /// Same as [`Conduit::generate`], plus `UnsupportedProvider` when the
    /// transport cannot serve the routed provider.
    pub async fn generate_with_transport(
        &self,
        request: CompletionRequest,
        credentials: &ProviderCredentials,
        transport: &dyn VendorTransport,
    ) -> Result<CompletionResponse, LlmError> {
        let prepared = self.prepare(request, credentials)?;
        check_transport(prepared.provider, transport)?;
        Self::complete(prepared, transport).await
    }

    /// Generate a canonical chunk stream
    ///
    /// # Errors
    ///
    /// Returns configuration, routing, and validation errors before any vendor
    /// call is made, then `Upstream` errors if the stream cannot be opened.
    /// Failures after that arrive as stream items.
    pub async fn generate_stream(
        &self,
        request: CompletionRequest,
        credentials: &ProviderCredentials,
    ) -> Result<ChunkStream, LlmError> {
        let prepared = self.prepare(request, credentials)?;
        let transport = transport_for(prepared.provider, credentials).await?;
        Self::open_stream(prepared, transport.as_ref()).await
    }

    /// Generate a canonical chunk stream through an explicit transport
    ///
    /// `credentials` are only consulted for routing.
    ///
    /// # Errors
    ///
    /// Same as [`Conduit::generate_stream`], plus `UnsupportedProvider` when
    /// the transport cannot serve the routed provider.
    pub async fn generate_stream_with_transport(
        &self,
        request: CompletionRequest,
        credentials: &ProviderCredentials,
        transport: &dyn VendorTransport,
    ) -> Result<ChunkStream, LlmError> {
        let prepared = self.prepare(request, credentials)?;
        check_transport(prepared.provider, transport)?;
        Self::open_stream(prepared, transport).await
    }

    /// Validate, apply defaults, and route
    fn prepare(&self, mut request: CompletionRequest, credentials: &ProviderCredentials) -> Result<Prepared, LlmError> {
        if request.model.trim().is_empty() {
            return Err(LlmError::Configuration("model id is required".to_owned()));
        }
        if request.messages.is_empty() {
            return Err(LlmError::Validation("messages must not be empty".to_owned()));
        }

        if request.max_tokens.is_none() {
            request.max_tokens = self.defaults.max_tokens;
        }
        if request.temperature.is_none() {
            request.temperature = self.defaults.temperature;
        }

        let provider = route(&request.model, credentials.compat_base_url())?;
        tracing::debug!(provider = %provider, model = %request.model, "routed request");

        Ok(Prepared { request, provider })
    }

    async fn complete(
        prepared: Prepared,
        transport: &dyn VendorTransport,
    ) -> Result<CompletionResponse, LlmError> {
        let Prepared { request, provider } = prepared;
        let strategy = strategy_for(provider);

        let vendor_request = strategy.build_request(&request, provider)?;
        tracing::debug!(
            provider = %provider,
            model = %request.model,
            family = vendor_request.family(),
            "built vendor request"
        );

        let vendor_response = transport.invoke(&vendor_request).await.map_err(|e| {
            tracing::error!(provider = %provider, model = %request.model, error = %e, "vendor call failed");
            e
        })?;

        let ctx = ResponseContext::new(provider, request.model);
        let response = strategy.adapt_complete(vendor_response, &ctx)?;
        tracing::debug!(
            provider = %provider,
            model = %ctx.model,
            choices = response.choices.len(),
            "adapted vendor response"
        );

        Ok(response)
    }

    async fn open_stream(prepared: Prepared, transport: &dyn VendorTransport) -> Result<ChunkStream, LlmError> {
        let Prepared { request, provider } = prepared;
        let strategy = strategy_for(provider);

        let vendor_request = strategy.build_request(&request, provider)?;
        tracing::debug!(
            provider = %provider,
            model = %request.model,
            family = vendor_request.family(),
            "built vendor stream request"
        );

        let events = transport.invoke_stream(&vendor_request).await.map_err(|e| {
            tracing::error!(provider = %provider, model = %request.model, error = %e, "vendor stream failed to open");
            e
        })?;

        let ctx = ResponseContext::new(provider, request.model);
        Ok(ChunkStream::new(events, strategy.reconstructor(&ctx)))
    }
}

fn check_transport(provider: Provider, transport: &dyn VendorTransport) -> Result<(), LlmError> {
    let serves = transport.provider();
    if serves.shares_transport_with(provider) {
        return Ok(());
    }

    tracing::error!(provider = %provider, transport = %serves, "transport does not serve routed provider");
    Err(LlmError::UnsupportedProvider(format!(
        "{serves} transport cannot serve {provider}"
    )))
}

/// Request that passed validation, with its routed provider
struct Prepared {
    request: CompletionRequest,
    provider: Provider,
}
