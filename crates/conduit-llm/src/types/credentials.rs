use conduit_config::CredentialsConfig;
use secrecy::SecretString;
use url::Url;

/// Credentials for whichever vendor a request routes to
///
/// Only the fields the routed provider needs must be present; anything
/// missing surfaces as a configuration error when the transport is built.
#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    /// API key for `OpenAI` or Anthropic
    pub api_key: Option<SecretString>,
    /// AWS credentials for Bedrock-hosted models
    pub aws: Option<AwsCredentials>,
    /// Key and base URL of an OpenAI-compatible endpoint
    pub openai_compatible: Option<CompatibleProviderCredentials>,
}

impl ProviderCredentials {
    /// Base URL of the OpenAI-compatible endpoint, if configured
    pub fn compat_base_url(&self) -> Option<&Url> {
        self.openai_compatible.as_ref().map(|c| &c.base_url)
    }
}

/// AWS credentials for Bedrock
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    /// Access key ID
    pub access_key_id: SecretString,
    /// Secret access key
    pub secret_access_key: SecretString,
    /// AWS region
    pub region: String,
}

/// OpenAI-compatible endpoint credentials
#[derive(Debug, Clone)]
pub struct CompatibleProviderCredentials {
    /// API key for the endpoint
    pub api_key: SecretString,
    /// Base URL, e.g. `https://api.together.xyz/v1`
    pub base_url: Url,
}

impl From<&CredentialsConfig> for ProviderCredentials {
    fn from(config: &CredentialsConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            aws: config.aws.as_ref().map(|aws| AwsCredentials {
                access_key_id: aws.access_key_id.clone(),
                secret_access_key: aws.secret_access_key.clone(),
                region: aws.region.clone(),
            }),
            openai_compatible: config
                .openai_compatible
                .as_ref()
                .map(|compat| CompatibleProviderCredentials {
                    api_key: compat.api_key.clone(),
                    base_url: compat.base_url.clone(),
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use conduit_config::Config;
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn converts_from_config() {
        let config = Config::from_toml_str(
            "[credentials.openai_compatible]\napi_key = \"tgp\"\nbase_url = \"https://api.together.xyz/v1\"",
        )
        .unwrap();

        let credentials = ProviderCredentials::from(&config.credentials);

        assert!(credentials.api_key.is_none());
        assert!(credentials.aws.is_none());
        assert_eq!(
            credentials.compat_base_url().map(Url::as_str),
            Some("https://api.together.xyz/v1")
        );
        assert_eq!(
            credentials.openai_compatible.unwrap().api_key.expose_secret(),
            "tgp"
        );
    }
}
