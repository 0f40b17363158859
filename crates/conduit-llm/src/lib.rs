//! Core normalization crate for Conduit
//!
//! Accepts one canonical (`OpenAI`-shaped) chat-completion request and returns
//! one canonical response or chunk stream, whichever vendor serves the model:
//! `OpenAI` and compatible endpoints, Anthropic, or Anthropic and Llama models
//! on AWS Bedrock.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod client;
pub mod convert;
pub mod error;
pub mod judge;
pub mod protocol;
pub mod router;
pub mod strategy;
pub mod stream;
pub mod transport;
pub mod types;

pub use client::{Conduit, RequestDefaults};
pub use error::LlmError;
pub use judge::{JudgeRequest, JudgeVerdict};
pub use router::{Provider, route};
pub use stream::{ChunkStream, ReconstructorState, StreamReconstructor};
pub use transport::{VendorTransport, transport_for};
pub use types::{CompletionRequest, CompletionResponse, Message, ProviderCredentials, StreamChunk};
