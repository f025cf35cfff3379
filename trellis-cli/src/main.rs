//! Trellis CLI
//!
//! Command-line interface for compiling pipeline definitions into artifacts.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trellis_compiler::Strictness;

#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "Trellis pipeline compiler", long_about = None)]
struct Cli {
    /// Template catalog directory
    #[arg(
        short,
        long,
        global = true,
        env = "TRELLIS_TEMPLATES",
        default_value = "templates"
    )]
    templates: PathBuf,

    /// Reject parameters that no node binds
    #[arg(long, global = true, env = "TRELLIS_STRICT")]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trellis=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config {
        templates: cli.templates,
        strictness: if cli.strict {
            Strictness::Strict
        } else {
            Strictness::Permissive
        },
    };

    handle_command(cli.command, &config).await
}
