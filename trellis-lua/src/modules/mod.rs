//! Lua modules available to pipeline definitions
//!
//! - `pipeline`: definition helpers (bindings, credential scopes)
//! - `log`: script logging, forwarded to a [`LogSink`]

pub mod log;
pub mod pipeline;

pub use log::{LogLevel, LogModule, LogSink, MemorySink, TracingSink};
pub use pipeline::{BINDING_MARKER, PipelineModule};
