//! `trellis init lua`
//!
//! Prepares a directory for writing Lua pipeline definitions: a `.luarc.json`
//! that points the Lua language server at generated stubs, and one stub per
//! module of the definition sandbox.

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use colored::*;
use std::path::{Path, PathBuf};
use trellis_lua::default_registry;

/// Stub directory, relative to the output directory
const STUBS_DIR: &str = ".trellis/stubs";

/// Init subcommands
#[derive(Subcommand)]
pub enum InitCommands {
    /// Write .luarc.json and module stubs for editor support
    Lua {
        /// Target directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Write only one kind of file
        #[arg(long, value_enum)]
        only: Option<LuaFiles>,
    },
}

/// Files written by `init lua`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LuaFiles {
    /// `.luarc.json`
    Luarc,
    /// Module stubs
    Stubs,
}

pub async fn handle_init_command(command: InitCommands) -> Result<()> {
    match command {
        InitCommands::Lua { output, only } => generate_lua_dev_files(&output, only).await,
    }
}

async fn generate_lua_dev_files(output_path: &Path, only: Option<LuaFiles>) -> Result<()> {
    if only != Some(LuaFiles::Stubs) {
        generate_luarc_json(output_path).await?;
    }
    if only != Some(LuaFiles::Luarc) {
        generate_stub_files(output_path).await?;
    }

    println!("{}", "✓ Lua development files generated!".green().bold());
    println!(
        "  Write a definition returning {} and check it with {}",
        "pipeline.define { ... }".cyan(),
        "trellis validate <file> -t <templates>".cyan()
    );

    Ok(())
}

/// Content of .luarc.json, declaring every registered module as a global
fn luarc_json() -> Result<String> {
    let registry = default_registry();
    let luarc = serde_json::json!({
        "$schema": "https://raw.githubusercontent.com/sumneko/vscode-lua/master/setting/schema.json",
        "runtime": { "version": "Lua 5.4" },
        "diagnostics": { "globals": registry.ids() },
        "workspace": { "library": [STUBS_DIR], "checkThirdParty": false },
        "completion": { "callSnippet": "Both" }
    });

    let mut content = serde_json::to_string_pretty(&luarc).context("Failed to render .luarc.json")?;
    content.push('\n');
    Ok(content)
}

async fn generate_luarc_json(output_path: &Path) -> Result<()> {
    let path = output_path.join(".luarc.json");

    tokio::fs::create_dir_all(output_path)
        .await
        .with_context(|| format!("Failed to create directory {}", output_path.display()))?;
    tokio::fs::write(&path, luarc_json()?)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("  {} {}", "Wrote".green(), path.display());

    Ok(())
}

/// Stubs come from the registry the parser uses, so they always match the
/// sandbox
async fn generate_stub_files(output_path: &Path) -> Result<()> {
    let dir = output_path.join(STUBS_DIR);
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    for (file_name, stubs) in default_registry().stub_files() {
        let path = dir.join(&file_name);
        tokio::fs::write(&path, stubs)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("  {} {}", "Wrote".green(), path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luarc_declares_module_globals() {
        let luarc: serde_json::Value = serde_json::from_str(&luarc_json().unwrap()).unwrap();
        assert_eq!(luarc["diagnostics"]["globals"], serde_json::json!(["pipeline", "log"]));
        assert_eq!(luarc["workspace"]["library"][0], STUBS_DIR);
    }

    #[tokio::test]
    async fn test_generate_all_files() {
        let dir = tempfile::tempdir().unwrap();
        generate_lua_dev_files(dir.path(), None).await.unwrap();

        assert!(dir.path().join(".luarc.json").exists());
        let stub = tokio::fs::read_to_string(dir.path().join(STUBS_DIR).join("pipeline.lua"))
            .await
            .unwrap();
        assert!(stub.contains("function pipeline.param(name) end"));
        assert!(dir.path().join(STUBS_DIR).join("log.lua").exists());
    }

    #[tokio::test]
    async fn test_only_one_kind() {
        let dir = tempfile::tempdir().unwrap();
        generate_lua_dev_files(dir.path(), Some(LuaFiles::Luarc)).await.unwrap();
        assert!(dir.path().join(".luarc.json").exists());
        assert!(!dir.path().join(STUBS_DIR).exists());

        let dir = tempfile::tempdir().unwrap();
        generate_lua_dev_files(dir.path(), Some(LuaFiles::Stubs)).await.unwrap();
        assert!(!dir.path().join(".luarc.json").exists());
        assert!(dir.path().join(STUBS_DIR).join("log.lua").exists());
    }
}
