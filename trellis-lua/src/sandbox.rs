//! Lua sandbox creation
//!
//! Pipeline definitions are plain data built by Lua code. The sandbox gives
//! that code tables, strings and math, and nothing that can touch the
//! filesystem, the network, the process or other Lua chunks.
//!
//! Modules (`pipeline`, `log`) are registered by the caller after creating
//! the sandbox, usually through a [`ModuleRegistry`](crate::module::ModuleRegistry).

use mlua::{Lua, LuaOptions, Result as LuaResult, StdLib};

/// Globals removed after the standard libraries are loaded
const BLOCKED_GLOBALS: [&str; 5] = ["require", "dofile", "loadfile", "load", "collectgarbage"];

/// Create a restricted Lua sandbox
///
/// # Security
/// This sandbox prevents:
/// - File system and network access (no `io`, no `os`)
/// - Loading external code (`require`, `dofile`, `loadfile`, `load`)
/// - Introspection through the `debug` library
///
/// # Example
/// ```
/// use trellis_lua::sandbox::create_sandbox;
///
/// let lua = create_sandbox()?;
/// let name: String = lua
///     .load(r#"return string.upper("kfp on wml")"#)
///     .eval()?;
/// assert_eq!(name, "KFP ON WML");
/// # Ok::<(), mlua::Error>(())
/// ```
pub fn create_sandbox() -> LuaResult<Lua> {
    let lua = Lua::new_with(
        StdLib::TABLE | StdLib::STRING | StdLib::MATH,
        LuaOptions::default(),
    )?;

    let globals = lua.globals();
    for name in BLOCKED_GLOBALS {
        globals.set(name, mlua::Nil)?;
    }

    Ok(lua)
}
