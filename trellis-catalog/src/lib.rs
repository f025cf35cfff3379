//! Trellis Template Catalog
//!
//! Resolves template references into fully described templates before any
//! graph is built.
//!
//! This crate provides the [`TemplateResolver`] seam, a [`DirectoryResolver`]
//! that reads JSON descriptors from a local catalog directory, and a
//! [`TemplateCache`] that resolves everything a pipeline needs concurrently.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use trellis_catalog::{DirectoryResolver, TemplateCache};
//! use trellis_core::domain::template::TemplateRef;
//!
//! #[tokio::main]
//! async fn main() -> trellis_catalog::Result<()> {
//!     let cache = TemplateCache::new(Arc::new(DirectoryResolver::new("templates")));
//!
//!     let templates = cache
//!         .resolve_all([TemplateRef::new("watson/train"), TemplateRef::new("watson/store")])
//!         .await?;
//!
//!     println!("Resolved {} templates", templates.len());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod directory;
pub mod error;
pub mod resolver;

// Re-export commonly used types
pub use cache::TemplateCache;
pub use directory::DirectoryResolver;
pub use error::{CatalogError, Result};
pub use resolver::{StaticResolver, TemplateResolver};
