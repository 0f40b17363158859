use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Conduit LLM normalization CLI
#[derive(Debug, Parser)]
#[command(name = "conduit", about = "Send canonical chat completions to OpenAI, Anthropic, or Bedrock")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "conduit.toml", env = "CONDUIT_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a chat completion from a JSON request file (`-` for stdin)
    Generate {
        /// Canonical completion request
        request: PathBuf,

        /// Print chunks as JSON lines instead of one response
        #[arg(long)]
        stream: bool,
    },
    /// Evaluate a trajectory with a judge model
    Judge {
        /// Judge request with messages, prompt, and model
        request: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_streaming_generate() {
        let args = Args::try_parse_from(["conduit", "--config", "dev.toml", "generate", "req.json", "--stream"]).unwrap();

        assert_eq!(args.config, PathBuf::from("dev.toml"));
        assert!(matches!(args.command, Command::Generate { stream: true, ref request } if request == &PathBuf::from("req.json")));
    }
}
