//! Conversion between canonical types and vendor wire formats
//!
//! Each submodule handles the request and response side for one vendor
//! family; `tools` is shared by all of them.

pub mod anthropic;
pub mod llama;
pub mod openai;
pub mod tools;

use crate::router::Provider;

/// Per-call facts an adapter needs beyond the vendor payload itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseContext {
    /// Provider the request was routed to
    pub provider: Provider,
    /// Model id from the canonical request
    pub model: String,
}

impl ResponseContext {
    /// Context for a call to `model` through `provider`
    pub fn new(provider: Provider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}
