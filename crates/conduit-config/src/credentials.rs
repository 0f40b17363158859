use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

/// Vendor credentials
///
/// Only the section the routed provider needs has to be present.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsConfig {
    /// API key for `OpenAI` or Anthropic
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// AWS credentials for Bedrock-hosted models
    #[serde(default)]
    pub aws: Option<AwsConfig>,
    /// OpenAI-compatible endpoint
    #[serde(default)]
    pub openai_compatible: Option<OpenAiCompatibleConfig>,
}

/// AWS credentials for Bedrock
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsConfig {
    /// Access key ID
    pub access_key_id: SecretString,
    /// Secret access key
    pub secret_access_key: SecretString,
    /// AWS region, e.g. `us-east-1`
    pub region: String,
}

/// OpenAI-compatible endpoint settings
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiCompatibleConfig {
    /// API key for the endpoint
    pub api_key: SecretString,
    /// Base URL, e.g. `https://api.together.xyz/v1`
    pub base_url: Url,
}

impl CredentialsConfig {
    /// Check the sections that are present for obvious mistakes
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found
    pub fn validate(&self) -> Result<(), String> {
        if let Some(key) = &self.api_key
            && key.expose_secret().trim().is_empty()
        {
            return Err("credentials.api_key must not be empty when set".to_owned());
        }

        if let Some(aws) = &self.aws {
            if aws.region.trim().is_empty() {
                return Err("credentials.aws.region must not be empty".to_owned());
            }
            if aws.access_key_id.expose_secret().is_empty() || aws.secret_access_key.expose_secret().is_empty() {
                return Err("credentials.aws requires both access_key_id and secret_access_key".to_owned());
            }
        }

        if let Some(compat) = &self.openai_compatible
            && !matches!(compat.base_url.scheme(), "http" | "https")
        {
            return Err(format!(
                "credentials.openai_compatible.base_url must be http or https, got `{}`",
                compat.base_url.scheme()
            ));
        }

        Ok(())
    }
}
