//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod artifact;
mod init;
mod pipeline;

pub use init::InitCommands;
pub use pipeline::DefinitionArgs;

use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Compile a pipeline definition into an artifact
    Compile {
        #[command(flatten)]
        definition: DefinitionArgs,

        /// Artifact output path
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Check a pipeline definition without writing anything
    Validate {
        #[command(flatten)]
        definition: DefinitionArgs,
    },
    /// Show the contents of a compiled artifact
    Inspect {
        /// Path to the artifact
        artifact: PathBuf,
    },
    /// Initialize development environment
    Init {
        #[command(subcommand)]
        command: InitCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
///
/// # Returns
/// Result indicating success or failure
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Compile { definition, output } => {
            pipeline::compile_pipeline(&definition, &output, config).await
        }
        Commands::Validate { definition } => {
            pipeline::validate_pipeline(&definition, config).await
        }
        Commands::Inspect { artifact } => artifact::inspect_artifact(&artifact).await,
        Commands::Init { command } => init::handle_init_command(command).await,
    }
}
