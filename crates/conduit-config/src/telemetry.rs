use serde::Deserialize;

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// `EnvFilter` directives, e.g. `info,conduit_llm=debug`
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            json: false,
        }
    }
}

fn default_log_filter() -> String {
    "info".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_human_readable_info() {
        let config: TelemetryConfig = toml::from_str("").unwrap();
        assert_eq!(config.log_filter, "info");
        assert!(!config.json);
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(toml::from_str::<TelemetryConfig>("exporter = \"otlp\"").is_err());
    }
}
