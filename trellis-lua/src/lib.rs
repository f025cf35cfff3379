//! Trellis Lua Infrastructure
//!
//! Pipeline definitions can be written in Lua. This crate evaluates them in a
//! restricted sandbox and turns the returned table into a
//! [`PipelineDefinition`](trellis_core::domain::pipeline::PipelineDefinition).
//! It includes:
//! - Module trait and registry for Lua modules
//! - The sandbox (no I/O, no code loading)
//! - The `pipeline` and `log` modules
//! - Definition parsing
//! - Stub generation for editor support

pub mod module;
pub mod modules;
pub mod parser;
pub mod sandbox;

pub use module::{ModuleMetadata, ModuleRegistry, TrellisModule};
pub use modules::{LogLevel, LogModule, LogSink, MemorySink, PipelineModule, TracingSink};
pub use parser::{default_registry, parse_pipeline_definition, parse_pipeline_definition_with};
pub use sandbox::create_sandbox;
