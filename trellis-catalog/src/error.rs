//! Error types for template resolution

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors that can occur while resolving templates
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No template is known under this reference
    #[error("template not found: {0}")]
    NotFound(String),

    /// Reading a descriptor failed
    #[error("failed to read template '{reference}' from {}: {source}", .path.display())]
    Io {
        reference: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Descriptor is not valid JSON or does not match the template schema
    #[error("failed to parse template '{reference}': {source}")]
    Parse {
        reference: String,
        #[source]
        source: serde_json::Error,
    },

    /// Descriptor parsed but describes an unusable template
    #[error("invalid template '{reference}': {reason}")]
    Invalid { reference: String, reason: String },

    /// A resolution task panicked or was cancelled
    #[error("template resolution task failed: {0}")]
    Join(String),
}

impl CatalogError {
    /// Create an invalid-template error
    pub fn invalid(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
