//! Configuration module
//!
//! Settings shared by every command, taken from global flags or their
//! environment fallbacks.

use std::path::PathBuf;
use trellis_compiler::{CompilerConfig, Strictness};

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the local template catalog
    pub templates: PathBuf,
    /// Strictness applied to every compilation
    pub strictness: Strictness,
}

impl Config {
    /// Compiler configuration carrying the global settings
    pub fn compiler_config(&self) -> CompilerConfig {
        CompilerConfig::new().with_strictness(self.strictness)
    }
}
