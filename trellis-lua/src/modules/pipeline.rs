//! Pipeline definition module
//!
//! Provides the `pipeline` global used by definition scripts:
//!
//! ```lua
//! return pipeline.define {
//!     name = "train-and-store",
//!     parameters = { { name = "train-code", type = "String", default = "tf-model.zip" } },
//!     steps = {
//!         { id = "train", template = "watson/train",
//!           inputs = { train_code = pipeline.param("train-code"), framework = "tensorflow" } },
//!         { id = "store", template = "watson/store",
//!           inputs = { run_uid = pipeline.output("train", "run_uid") } },
//!     },
//!     credentials = { { name = "kfp-creds", scope = pipeline.scope.all() } },
//! }
//! ```
//!
//! Binding helpers return tables tagged with [`BINDING_MARKER`] so the parser
//! can tell them apart from table-valued literals.

use crate::module::{ModuleMetadata, TrellisModule};
use mlua::prelude::*;

/// Key set on tables produced by `pipeline.param`, `pipeline.output` and
/// `pipeline.literal`
pub const BINDING_MARKER: &str = "__trellis";

/// The `pipeline` module
#[derive(Debug, Default, Clone, Copy)]
pub struct PipelineModule;

impl PipelineModule {
    pub fn new() -> Self {
        Self
    }
}

fn binding(lua: &Lua, kind: &str) -> LuaResult<LuaTable> {
    let table = lua.create_table()?;
    table.set(BINDING_MARKER, "binding")?;
    table.set("kind", kind)?;
    Ok(table)
}

/// Copies a list of names into a table that always serializes as an array
fn name_list(lua: &Lua, names: LuaTable) -> LuaResult<LuaTable> {
    let list = lua.create_table()?;
    for name in names.sequence_values::<String>() {
        list.push(name?)?;
    }
    list.set_metatable(Some(lua.array_metatable()))?;
    Ok(list)
}

impl TrellisModule for PipelineModule {
    fn id(&self) -> &'static str {
        "pipeline"
    }

    fn register(&self, lua: &Lua) -> LuaResult<()> {
        let pipeline = lua.create_table()?;

        // pipeline.define(definition) checks the name and returns the table
        pipeline.set(
            "define",
            lua.create_function(|_, definition: LuaTable| {
                match definition.get::<LuaValue>("name")? {
                    LuaValue::String(_) => Ok(definition),
                    _ => Err(LuaError::RuntimeError(
                        "pipeline.define: 'name' must be a string".to_string(),
                    )),
                }
            })?,
        )?;

        pipeline.set(
            "param",
            lua.create_function(|lua, name: String| {
                let table = binding(lua, "parameter")?;
                table.set("name", name)?;
                Ok(table)
            })?,
        )?;

        pipeline.set(
            "output",
            lua.create_function(|lua, (step, port): (String, String)| {
                let table = binding(lua, "nodeOutput")?;
                table.set("nodeId", step)?;
                table.set("portName", port)?;
                Ok(table)
            })?,
        )?;

        pipeline.set(
            "literal",
            lua.create_function(|lua, value: LuaValue| {
                let table = binding(lua, "literal")?;
                table.set("value", value)?;
                Ok(table)
            })?,
        )?;

        let scope = lua.create_table()?;
        scope.set("all", lua.create_function(|_, ()| Ok("allNodes"))?)?;
        scope.set(
            "capabilities",
            lua.create_function(|lua, names: LuaTable| {
                let table = lua.create_table()?;
                table.set("capabilities", name_list(lua, names)?)?;
                Ok(table)
            })?,
        )?;
        scope.set(
            "nodes",
            lua.create_function(|lua, names: LuaTable| {
                let table = lua.create_table()?;
                table.set("nodes", name_list(lua, names)?)?;
                Ok(table)
            })?,
        )?;
        pipeline.set("scope", scope)?;

        lua.globals().set(self.id(), pipeline)?;
        Ok(())
    }

    fn stubs(&self) -> String {
        r#"---@meta

---@class Binding

---@class CredentialScope

---@class ParameterDefinition
---@field name string Unique parameter name
---@field type? string String, Integer, Float, Boolean, List, Map, Any or a domain type name
---@field default? any Default value; parameters without one are required
---@field required? boolean Overrides the required flag
---@field description? string

---@class StepDefinition
---@field id string Unique step id
---@field template string Template name or URL
---@field inputs? table<string, Binding|any> Input port bindings; plain values are literals
---@field credentials? string[] Credentials attached to this step only

---@class CredentialInjection
---@field name string Credential (secret) name
---@field scope? CredentialScope Nodes that receive the credential; defaults to none

---@class PipelineDefinition
---@field name string
---@field description? string
---@field parameters? ParameterDefinition[]
---@field steps StepDefinition[]
---@field credentials? CredentialInjection[]

---Pipeline definition helpers
---@class pipeline
pipeline = {}

---Declare a pipeline
---@param definition PipelineDefinition
---@return PipelineDefinition
function pipeline.define(definition) end

---Bind an input to a pipeline parameter
---@param name string Parameter name
---@return Binding
function pipeline.param(name) end

---Bind an input to an output port of an earlier step
---@param step string Step id
---@param port string Output port name
---@return Binding
function pipeline.output(step, port) end

---Bind an input to a constant value
---@param value any
---@return Binding
function pipeline.literal(value) end

---Credential scopes
pipeline.scope = {}

---Every step
---@return CredentialScope
function pipeline.scope.all() end

---Steps whose template declares any of these capabilities
---@param capabilities string[]
---@return CredentialScope
function pipeline.scope.capabilities(capabilities) end

---Steps with these ids
---@param ids string[]
---@return CredentialScope
function pipeline.scope.nodes(ids) end
"#
        .to_string()
    }

    fn metadata(&self) -> ModuleMetadata {
        ModuleMetadata {
            id: self.id(),
            version: "1.0.0",
            description: "Pipeline definition helpers",
            author: "Trellis",
        }
    }
}
