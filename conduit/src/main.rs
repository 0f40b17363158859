#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;

use std::io::Read;
use std::path::Path;

use anyhow::Context;
use args::{Args, Command};
use clap::Parser;
use conduit_config::Config;
use conduit_llm::{CompletionRequest, Conduit, JudgeRequest, ProviderCredentials, RequestDefaults};
use futures_util::StreamExt;
use serde::de::DeserializeOwned;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args.config)?;

    // Initialize logging
    conduit_telemetry::init(&config.telemetry)?;

    tracing::debug!(config_path = %args.config.display(), "starting conduit");

    let conduit = Conduit::new(RequestDefaults::from(&config.defaults));
    let credentials = ProviderCredentials::from(&config.credentials);

    match args.command {
        Command::Generate { request, stream: false } => {
            let request: CompletionRequest = read_json(&request)?;
            let response = conduit.generate(request, &credentials).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Generate { request, stream: true } => {
            let request: CompletionRequest = read_json(&request)?;
            print_stream(&conduit, request, &credentials).await?;
        }
        Command::Judge { request } => {
            let request: JudgeRequest = read_json(&request)?;
            let verdict = conduit.judge(request, &credentials).await;
            println!("{}", serde_json::to_string_pretty(&verdict)?);
        }
    }

    Ok(())
}

/// Print chunks as JSON lines until the stream ends or a shutdown signal arrives
async fn print_stream(
    conduit: &Conduit,
    request: CompletionRequest,
    credentials: &ProviderCredentials,
) -> anyhow::Result<()> {
    let mut chunks = conduit.generate_stream(request, credentials).await?;

    let cancel = chunks.cancellation_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        cancel.cancel();
    });

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        println!("{}", serde_json::to_string(&chunk)?);
    }

    if chunks.cancellation_token().is_cancelled() {
        tracing::info!("stream cancelled");
    }

    Ok(())
}

/// Read a JSON document from a file, or stdin when the path is `-`
fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read request from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("failed to read request file {}", path.display()))?
    };

    serde_json::from_str(&raw).with_context(|| format!("invalid request in {}", path.display()))
}

/// Wait for a shutdown signal (`SIGINT` or `SIGTERM`)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use indoc::indoc;

    use super::*;

    #[test]
    fn reads_canonical_request_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            indoc! {r#"
                {
                    "model": "claude-3-5-sonnet-20241022",
                    "messages": [{"role": "user", "content": "hi"}],
                    "max_tokens": 64
                }
            "#}
            .as_bytes(),
        )
        .unwrap();

        let request: CompletionRequest = read_json(file.path()).unwrap();

        assert_eq!(request.model, "claude-3-5-sonnet-20241022");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.max_tokens, Some(64));
    }

    #[test]
    fn invalid_request_names_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{\"messages\": []}").unwrap();

        let err = read_json::<CompletionRequest>(file.path()).unwrap_err();

        assert!(err.to_string().contains(&file.path().display().to_string()));
    }
}
