#![allow(clippy::must_use_candidate)]

pub mod credentials;
pub mod defaults;
mod env;
mod loader;
pub mod telemetry;

use serde::Deserialize;

pub use credentials::*;
pub use defaults::*;
pub use env::{ExpandError, expand_env};
pub use telemetry::TelemetryConfig;

/// Top-level Conduit configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Vendor credentials
    #[serde(default)]
    pub credentials: CredentialsConfig,
    /// Values applied to requests that leave them unset
    #[serde(default)]
    pub defaults: DefaultsConfig,
    /// Logging configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
