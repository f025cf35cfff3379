//! Trellis Compiler
//!
//! Builds, validates and compiles pipeline graphs.
//!
//! A pipeline is assembled from resolved templates in declaration order with
//! a [`GraphBuilder`], decorated with credential references by a
//! [`CredentialInjector`], and turned into a deterministic
//! [`CompiledArtifact`](trellis_core::dto::artifact::CompiledArtifact) by the
//! [`Compiler`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use trellis_compiler::{Compiler, CompilerConfig, CredentialInjector, GraphBuilder};
//! use trellis_core::domain::template::{InputPort, OutputPort, Template};
//! use trellis_core::domain::types::PortType;
//!
//! let train = Arc::new(
//!     Template::new("train", "Train")
//!         .with_input(InputPort::new("code", PortType::String))
//!         .with_output(OutputPort::new("model", PortType::String)),
//! );
//! let store = Arc::new(
//!     Template::new("store", "Store").with_input(InputPort::new("model", PortType::String)),
//! );
//!
//! let mut builder = GraphBuilder::new("train-and-store");
//! let code = builder.define("train-code", PortType::String, Some("model.zip".into()))?;
//! let trained = builder.add_node("train", train, [("code", code.binding())])?;
//! builder.add_node("store", store, [("model", trained.output("model"))])?;
//!
//! let mut graph = builder.finalize()?;
//! CredentialInjector::all_nodes().inject(&mut graph, "kfp-creds")?;
//!
//! let artifact = Compiler::new(CompilerConfig::default()).compile(&graph)?;
//! assert_eq!(artifact.node_ids(), vec!["train", "store"]);
//! # Ok::<(), trellis_compiler::PipelineError>(())
//! ```

pub mod assemble;
pub mod builder;
pub mod compiler;
pub mod config;
pub mod credentials;
pub mod error;
pub mod parameters;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use assemble::{assemble, coerce_overrides};
pub use builder::{BoundInput, GraphBuilder, NodeHandle, OperationNode, PipelineGraph};
pub use compiler::Compiler;
pub use config::{CompilerConfig, Strictness};
pub use credentials::CredentialInjector;
pub use error::{PipelineError, Result};
pub use parameters::{ParameterHandle, ParameterSet};
