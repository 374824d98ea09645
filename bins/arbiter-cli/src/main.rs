mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "arbiter-cli")]
#[command(about = "Arbiter CLI - Grade submissions locally and inspect language profiles", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade a source file against a JSON list of test cases
    Run {
        /// Language name or alias (e.g., python, js, go)
        #[arg(short, long)]
        language: Option<String>,

        /// Path to the source file
        #[arg(short, long)]
        source: PathBuf,

        /// Path to a JSON array of {"input", "expected"} objects
        #[arg(short, long)]
        tests: PathBuf,

        /// Environment template (overrides ARBITER_TEMPLATE)
        #[arg(long)]
        template: Option<String>,

        /// Per-test run timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// List supported languages
    Languages {
        /// Language profile file (defaults to the built-in table)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            language,
            source,
            tests,
            template,
            timeout_ms,
        } => {
            let succeeded = commands::run_submission(
                language.as_deref(),
                &source,
                &tests,
                template.as_deref(),
                timeout_ms,
            )
            .await?;
            if !succeeded {
                std::process::exit(1);
            }
        }
        Commands::Languages { config } => {
            commands::list_languages(config.as_deref())?;
        }
    }

    Ok(())
}
