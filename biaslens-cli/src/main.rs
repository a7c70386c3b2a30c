//! biaslens CLI: run demographic bias audits against a language model backend.

mod commands;

use biaslens_core::BackendKind;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// biaslens: measure how a model's answers shift across demographic groups
#[derive(Parser, Debug)]
#[command(name = "biaslens", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (holds .biaslens/config.toml)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run an audit for one scenario and print the JSON report
    Audit {
        /// Scenario key (see `biaslens scenarios`)
        scenario: String,

        /// Model to query (defaults to the backend's configured model)
        #[arg(short, long)]
        model: Option<String>,

        /// Restrict to a demographic group; repeat for several
        #[arg(short = 'a', long = "attribute")]
        attributes: Vec<String>,

        /// Sampling temperature (0.0 - 2.0)
        #[arg(long)]
        temperature: Option<f32>,

        /// Maximum tokens per completion (50 - 2000)
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Backend: ollama, openai, or mock
        #[arg(short, long)]
        backend: Option<BackendKind>,

        /// Completions in flight at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// TOML catalog of scenarios and groups
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Exit with status 2 when the summary lists any concern
        #[arg(long)]
        fail_on_concern: bool,
    },
    /// List available scenarios
    Scenarios {
        /// TOML catalog of scenarios and groups
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Show the configured backend as JSON
    Backend,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create a default configuration file
    Init,
    /// Show current configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn,biaslens_core=info",
        1 => "debug",
        _ => "trace",
    };

    // Human-readable layer for stderr; stdout carries the report
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "biaslens", "biaslens")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "biaslens.log");
    let (non_blocking, log_guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let status = commands::handle_command(cli.command, &workspace).await?;

    // Flush buffered log lines before the process exits.
    drop(log_guard);
    Ok(ExitCode::from(status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_audit_arguments() {
        let cli = Cli::try_parse_from([
            "biaslens",
            "-vv",
            "audit",
            "credit",
            "--backend",
            "mock",
            "-a",
            "male_black",
            "-a",
            "female_black",
            "--max-tokens",
            "200",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Audit {
                scenario,
                attributes,
                backend,
                max_tokens,
                temperature,
                ..
            } => {
                assert_eq!(scenario, "credit");
                assert_eq!(attributes, vec!["male_black", "female_black"]);
                assert_eq!(backend, Some(BackendKind::Mock));
                assert_eq!(max_tokens, Some(200));
                assert_eq!(temperature, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let err = Cli::try_parse_from(["biaslens", "audit", "hiring", "--backend", "bard"])
            .unwrap_err();
        assert!(err.to_string().contains("bard"));
    }
}
