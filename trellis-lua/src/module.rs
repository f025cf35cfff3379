//! Lua module abstraction
//!
//! A module installs one global table (`pipeline`, `log`, ...) into the
//! definition sandbox and describes that table to editors through LuaLS
//! stubs. The [`ModuleRegistry`] decides which modules a parse sees.

use mlua::prelude::*;
use tracing::debug;

/// A global table made available to pipeline definitions
///
/// # Example
///
/// ```rust
/// use trellis_lua::module::TrellisModule;
/// use mlua::prelude::*;
///
/// /// Exposes the catalog name to definitions as `catalog.name`
/// struct CatalogModule;
///
/// impl TrellisModule for CatalogModule {
///     fn id(&self) -> &'static str {
///         "catalog"
///     }
///
///     fn register(&self, lua: &Lua) -> LuaResult<()> {
///         let table = lua.create_table()?;
///         table.set("name", "ibm-components")?;
///         lua.globals().set(self.id(), table)
///     }
///
///     fn stubs(&self) -> String {
///         "---@meta\n\n---@class catalog\n---@field name string\ncatalog = {}\n".to_string()
///     }
/// }
/// ```
pub trait TrellisModule: Send + Sync {
    /// Name of the global table; must be a valid Lua identifier
    fn id(&self) -> &'static str;

    /// Installs the module's global table into `lua`
    ///
    /// # Errors
    /// Any Lua error raised while building the table
    fn register(&self, lua: &Lua) -> LuaResult<()>;

    /// LuaLS definition file for the module, starting with `---@meta`
    fn stubs(&self) -> String;

    fn metadata(&self) -> ModuleMetadata {
        ModuleMetadata {
            id: self.id(),
            version: "0.1.0",
            description: "",
            author: "",
        }
    }
}

/// Descriptive information about a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleMetadata {
    pub id: &'static str,
    /// Semver of the module's Lua surface
    pub version: &'static str,
    pub description: &'static str,
    pub author: &'static str,
}

/// Ordered set of modules, at most one per id
///
/// Registration order is kept: it is the order in which globals are
/// installed and stubs are written.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<Box<dyn TrellisModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a module, replacing any module with the same id in place
    ///
    /// Replacing keeps the original position, so a caller can swap the
    /// `log` sink of a prepared registry without reordering globals.
    ///
    /// # Returns
    /// The module that was replaced, if any
    pub fn register<M: TrellisModule + 'static>(
        &mut self,
        module: M,
    ) -> Option<Box<dyn TrellisModule>> {
        let module: Box<dyn TrellisModule> = Box::new(module);
        match self.modules.iter().position(|m| m.id() == module.id()) {
            Some(index) => Some(std::mem::replace(&mut self.modules[index], module)),
            None => {
                self.modules.push(module);
                None
            }
        }
    }

    /// Builder form of [`register`](Self::register)
    pub fn with<M: TrellisModule + 'static>(mut self, module: M) -> Self {
        self.register(module);
        self
    }

    pub fn get(&self, id: &str) -> Option<&dyn TrellisModule> {
        self.modules
            .iter()
            .find(|m| m.id() == id)
            .map(|m| m.as_ref())
    }

    pub fn modules(&self) -> &[Box<dyn TrellisModule>] {
        &self.modules
    }

    /// Ids of all registered modules, in registration order
    pub fn ids(&self) -> Vec<&'static str> {
        self.modules.iter().map(|m| m.id()).collect()
    }

    /// Installs every module into `lua`, stopping at the first failure
    pub fn register_all(&self, lua: &Lua) -> LuaResult<()> {
        for module in &self.modules {
            module.register(lua)?;
            debug!(module = module.id(), "registered lua module");
        }
        Ok(())
    }

    /// One `(file name, contents)` pair per module, e.g. `("log.lua", "---@meta ...")`
    pub fn stub_files(&self) -> Vec<(String, String)> {
        self.modules
            .iter()
            .map(|m| (format!("{}.lua", m.id()), m.stubs()))
            .collect()
    }
}
