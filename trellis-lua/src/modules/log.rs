//! Logging module for pipeline definitions
//!
//! Lets definition scripts report what they are doing. Messages go to a
//! [`LogSink`]; the CLI uses [`TracingSink`], [`MemorySink`] keeps them for
//! later inspection.

use crate::module::{ModuleMetadata, TrellisModule};
use mlua::prelude::*;
use std::fmt;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError};

/// Severity of a script log message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub const ALL: [LogLevel; 4] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warning,
        LogLevel::Error,
    ];

    /// Name of the Lua function for this level
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination for script log messages
pub trait LogSink: Send + Sync {
    fn write(&mut self, level: LogLevel, message: &str);
}

/// Forwards script messages to `tracing` under the `trellis::script` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&mut self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(target: "trellis::script", "{message}"),
            LogLevel::Info => tracing::info!(target: "trellis::script", "{message}"),
            LogLevel::Warning => tracing::warn!(target: "trellis::script", "{message}"),
            LogLevel::Error => tracing::error!(target: "trellis::script", "{message}"),
        }
    }
}

/// Keeps every message in memory; clones share the same buffer
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<(LogLevel, String)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages written so far, oldest first
    pub fn entries(&self) -> Vec<(LogLevel, String)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LogSink for MemorySink {
    fn write(&mut self, level: LogLevel, message: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, message.to_string()));
    }
}

/// The `log` module: `log.debug`, `log.info`, `log.warning`, `log.error`
///
/// Each function takes any number of values and joins their string forms
/// with spaces, like Lua's `print`.
pub struct LogModule<S: LogSink> {
    sink: Arc<Mutex<S>>,
}

impl<S: LogSink> LogModule<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }
}

fn join_args(args: LuaMultiValue) -> LuaResult<String> {
    let parts = args
        .iter()
        .map(|value| value.to_string())
        .collect::<LuaResult<Vec<_>>>()?;
    Ok(parts.join(" "))
}

impl<S: LogSink + 'static> TrellisModule for LogModule<S> {
    fn id(&self) -> &'static str {
        "log"
    }

    fn register(&self, lua: &Lua) -> LuaResult<()> {
        let table = lua.create_table()?;

        for level in LogLevel::ALL {
            let sink = self.sink.clone();
            let function = lua.create_function(move |_, args: LuaMultiValue| {
                let message = join_args(args)?;
                // a sink left poisoned by a panicking writer keeps accepting messages
                sink.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .write(level, &message);
                Ok(())
            })?;
            table.set(level.as_str(), function)?;
        }

        lua.globals().set(self.id(), table)
    }

    fn stubs(&self) -> String {
        let mut stubs = String::from("---@meta\n\n---Messages from pipeline definitions\n---@class log\nlog = {}\n");
        for level in LogLevel::ALL {
            let _ = write!(
                stubs,
                "\n---Report a {level} message; arguments are joined with spaces\n---@param ... any\nfunction log.{level}(...) end\n"
            );
        }
        stubs
    }

    fn metadata(&self) -> ModuleMetadata {
        ModuleMetadata {
            id: self.id(),
            version: "1.0.0",
            description: "Logging from pipeline definition scripts",
            author: "Trellis",
        }
    }
}
