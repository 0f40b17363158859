use serde::Deserialize;

/// Request values used when a request leaves them unset
#[derive(Debug, Default, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultsConfig {
    /// Maximum tokens to generate
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f64>,
}

impl DefaultsConfig {
    /// Reject values no vendor accepts
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found
    pub fn validate(&self) -> Result<(), String> {
        if self.max_tokens == Some(0) {
            return Err("defaults.max_tokens must be greater than 0".to_owned());
        }

        if let Some(temperature) = self.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            return Err(format!("defaults.temperature must be within 0.0..=2.0, got {temperature}"));
        }

        Ok(())
    }
}
