//! Logging for Conduit
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and either
//! human-readable or JSON-lines output, both written to stderr.

use conduit_config::TelemetryConfig;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging from configuration
///
/// `RUST_LOG` takes precedence over `log_filter` when set. An invalid
/// filter falls back to `info`.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed
pub fn init(config: &TelemetryConfig) -> anyhow::Result<()> {
    let filter = build_filter(config);

    let (fmt_layer, json_layer) = if config.json {
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(false)
            .with_writer(std::io::stderr);
        (None, Some(layer))
    } else {
        let layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_writer(std::io::stderr);
        (Some(layer), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(json_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(())
}

fn build_filter(config: &TelemetryConfig) -> EnvFilter {
    if let Ok(directives) = std::env::var(EnvFilter::DEFAULT_ENV)
        && let Ok(filter) = EnvFilter::try_new(&directives)
    {
        return filter;
    }

    EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(log_filter: &str) -> TelemetryConfig {
        TelemetryConfig {
            log_filter: log_filter.to_owned(),
            json: false,
        }
    }

    #[test]
    fn uses_configured_filter() {
        temp_env::with_var_unset("RUST_LOG", || {
            let filter = build_filter(&config("warn,conduit_llm=debug"));
            let rendered = filter.to_string();
            assert!(rendered.contains("conduit_llm=debug"));
            assert!(rendered.contains("warn"));
        });
    }

    #[test]
    fn rust_log_overrides_config() {
        temp_env::with_var("RUST_LOG", Some("trace"), || {
            let filter = build_filter(&config("warn"));
            assert_eq!(filter.to_string(), "trace");
        });
    }

    #[test]
    fn invalid_filter_falls_back_to_info() {
        temp_env::with_var_unset("RUST_LOG", || {
            let filter = build_filter(&config("conduit_llm=notalevel"));
            assert_eq!(filter.to_string(), "info");
        });
    }
}
