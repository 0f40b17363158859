//! Configuration builder for integration tests
//!
//! Renders TOML and goes through `Config::from_toml_str`, so tests exercise
//! the same parsing and validation path as a config file.

use conduit_config::Config;

/// Builder for constructing test configurations
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    credentials: Vec<String>,
    defaults: Vec<String>,
}

impl ConfigBuilder {
    /// Create a new builder with no credentials or defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the OpenAI-compatible endpoint at a mock backend
    pub fn with_compatible_endpoint(mut self, base_url: &str) -> Self {
        self.credentials.push(format!(
            "[credentials.openai_compatible]\napi_key = \"test-compat-key\"\nbase_url = \"{base_url}\"\n"
        ));
        self
    }

    /// Set the first-party API key
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.credentials.insert(0, format!("[credentials]\napi_key = \"{key}\"\n"));
        self
    }

    /// Default `max_tokens` for requests that leave it unset
    pub fn with_default_max_tokens(mut self, max_tokens: u32) -> Self {
        self.defaults.push(format!("max_tokens = {max_tokens}\n"));
        self
    }

    /// Build the final configuration
    pub fn build(self) -> Config {
        let mut toml = self.credentials.concat();
        if !self.defaults.is_empty() {
            toml.push_str("[defaults]\n");
            toml.push_str(&self.defaults.concat());
        }

        Config::from_toml_str(&toml).expect("test config must be valid")
    }
}
