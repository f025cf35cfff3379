//! Pipeline definition parser
//!
//! Evaluates a Lua pipeline definition in the sandbox and converts the
//! returned table into a [`PipelineDefinition`]. Nothing is resolved or
//! validated against templates here; that happens in the compiler.

use anyhow::{anyhow, Context, Result};
use mlua::prelude::{Lua, LuaDeserializeOptions, LuaSerdeExt, LuaTable, LuaValue};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use trellis_core::domain::binding::Binding;
use trellis_core::domain::credential::CredentialScope;
use trellis_core::domain::pipeline::{
    CredentialInjection, ParameterDefinition, PipelineDefinition, StepDefinition,
};
use trellis_core::domain::template::TemplateRef;
use trellis_core::domain::types::PortType;

use crate::module::ModuleRegistry;
use crate::modules::pipeline::BINDING_MARKER;
use crate::modules::{LogModule, PipelineModule, TracingSink};
use crate::sandbox::create_sandbox;

/// Registry with the modules every definition script can use
pub fn default_registry() -> ModuleRegistry {
    ModuleRegistry::new()
        .with(PipelineModule::new())
        .with(LogModule::new(TracingSink))
}

/// Parse a pipeline definition from Lua source code
///
/// # Arguments
/// * `source` - The Lua source code; it must return the definition table
///
/// # Errors
/// Returns an error if:
/// - The Lua source is invalid or fails at run time
/// - Required fields are missing (name, steps, step id/template, parameter name)
/// - Field types are incorrect
///
/// # Example
/// ```
/// use trellis_lua::parser::parse_pipeline_definition;
///
/// let source = r#"
///     return pipeline.define {
///         name = "train-and-store",
///         parameters = {
///             { name = "train-code", type = "String", default = "tf-model.zip" },
///         },
///         steps = {
///             { id = "train", template = "watson/train",
///               inputs = { train_code = pipeline.param("train-code") } },
///             { id = "store", template = "watson/store",
///               inputs = { run_uid = pipeline.output("train", "run_uid") } },
///         },
///     }
/// "#;
///
/// let definition = parse_pipeline_definition(source)?;
/// assert_eq!(definition.name, "train-and-store");
/// assert_eq!(definition.steps.len(), 2);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn parse_pipeline_definition(source: &str) -> Result<PipelineDefinition> {
    parse_pipeline_definition_with(&default_registry(), source)
}

/// Parse a pipeline definition with a custom module registry
pub fn parse_pipeline_definition_with(
    registry: &ModuleRegistry,
    source: &str,
) -> Result<PipelineDefinition> {
    let lua = create_sandbox().context("Failed to create Lua sandbox")?;
    registry
        .register_all(&lua)
        .context("Failed to register Lua modules")?;

    let pipeline: LuaTable = lua
        .load(source)
        .set_name("pipeline definition")
        .eval()
        .context("Failed to evaluate pipeline definition")?;

    let name: String = pipeline
        .get("name")
        .context("Pipeline must have a 'name' field")?;
    let description: Option<String> = pipeline
        .get("description")
        .context("Field 'description' must be a string")?;

    let parameters = parse_parameters(&lua, &pipeline)?;
    let steps = parse_steps(&lua, &pipeline)?;
    let credentials = parse_credentials(&lua, &pipeline)?;

    Ok(PipelineDefinition {
        name,
        description,
        parameters,
        steps,
        credentials,
    })
}

/// Parse the 'parameters' field (an array, so declaration order is kept)
fn parse_parameters(lua: &Lua, pipeline: &LuaTable) -> Result<Vec<ParameterDefinition>> {
    let table = match pipeline.get::<LuaValue>("parameters")? {
        LuaValue::Nil => return Ok(Vec::new()),
        LuaValue::Table(table) => table,
        _ => return Err(anyhow!("Field 'parameters' must be an array of tables")),
    };

    let mut parameters = Vec::new();
    for (i, entry) in table.sequence_values::<LuaTable>().enumerate() {
        let entry = entry.with_context(|| format!("Parameter #{} must be a table", i + 1))?;

        let name: String = entry
            .get("name")
            .with_context(|| format!("Parameter #{} must have a 'name' field", i + 1))?;
        let type_name: Option<String> = entry
            .get("type")
            .with_context(|| format!("Parameter '{}' has a non-string 'type'", name))?;
        let required: Option<bool> = entry
            .get("required")
            .with_context(|| format!("Parameter '{}' has a non-boolean 'required'", name))?;
        let description: Option<String> = entry
            .get("description")
            .with_context(|| format!("Parameter '{}' has a non-string 'description'", name))?;
        let default = match entry.get::<LuaValue>("default")? {
            LuaValue::Nil => None,
            value => Some(
                lua_value_to_json(lua, value)
                    .with_context(|| format!("Invalid default for parameter '{}'", name))?,
            ),
        };

        parameters.push(ParameterDefinition {
            name,
            param_type: type_name.as_deref().map(PortType::parse).unwrap_or_default(),
            default,
            required,
            description,
        });
    }

    Ok(parameters)
}

/// Parse the 'steps' field
fn parse_steps(lua: &Lua, pipeline: &LuaTable) -> Result<Vec<StepDefinition>> {
    let table: LuaTable = pipeline
        .get("steps")
        .context("Pipeline must have a 'steps' field")?;

    let mut steps = Vec::new();
    for (i, entry) in table.sequence_values::<LuaTable>().enumerate() {
        let entry = entry.with_context(|| format!("Step #{} must be a table", i + 1))?;

        let id: String = entry
            .get("id")
            .with_context(|| format!("Step #{} must have an 'id' field", i + 1))?;
        let template: String = entry
            .get("template")
            .with_context(|| format!("Step '{}' must have a 'template' field", id))?;

        let mut inputs = BTreeMap::new();
        if let Some(table) = entry
            .get::<Option<LuaTable>>("inputs")
            .with_context(|| format!("Step '{}' has a non-table 'inputs' field", id))?
        {
            for pair in table.pairs::<String, LuaValue>() {
                let (port, value) =
                    pair.with_context(|| format!("Step '{}' has an invalid input entry", id))?;
                let binding = parse_binding(lua, value)
                    .with_context(|| format!("Invalid binding for input '{}' of step '{}'", port, id))?;
                inputs.insert(port, binding);
            }
        }

        let credentials = string_list(&entry, "credentials")
            .with_context(|| format!("Invalid credentials for step '{}'", id))?;

        steps.push(StepDefinition {
            id,
            template: TemplateRef::new(template),
            inputs,
            credentials,
        });
    }

    if steps.is_empty() {
        return Err(anyhow!("Pipeline must have at least one step"));
    }

    Ok(steps)
}

/// Converts an input value: binding helper tables become bindings, anything
/// else is a literal
fn parse_binding(lua: &Lua, value: LuaValue) -> Result<Binding> {
    match lua_value_to_json(lua, value)? {
        JsonValue::Object(mut map) if map.contains_key(BINDING_MARKER) => {
            map.remove(BINDING_MARKER);
            Ok(serde_json::from_value(JsonValue::Object(map))?)
        }
        literal => Ok(Binding::literal(literal)),
    }
}

/// Parse the 'credentials' field
fn parse_credentials(lua: &Lua, pipeline: &LuaTable) -> Result<Vec<CredentialInjection>> {
    let table = match pipeline.get::<LuaValue>("credentials")? {
        LuaValue::Nil => return Ok(Vec::new()),
        LuaValue::Table(table) => table,
        _ => return Err(anyhow!("Field 'credentials' must be an array of tables")),
    };

    let mut credentials = Vec::new();
    for (i, entry) in table.sequence_values::<LuaTable>().enumerate() {
        let entry = entry.with_context(|| format!("Credential #{} must be a table", i + 1))?;
        let name: String = entry
            .get("name")
            .with_context(|| format!("Credential #{} must have a 'name' field", i + 1))?;

        let scope = match entry.get::<LuaValue>("scope")? {
            LuaValue::Nil => CredentialScope::default(),
            value => serde_json::from_value(lua_value_to_json(lua, value)?)
                .with_context(|| format!("Invalid scope for credential '{}'", name))?,
        };

        credentials.push(CredentialInjection { name, scope });
    }

    Ok(credentials)
}

fn string_list(table: &LuaTable, field: &str) -> Result<Vec<String>> {
    match table.get::<LuaValue>(field)? {
        LuaValue::Nil => Ok(Vec::new()),
        LuaValue::Table(list) => list
            .sequence_values::<String>()
            .map(|v| v.with_context(|| format!("Field '{}' must contain only strings", field)))
            .collect(),
        _ => Err(anyhow!("Field '{}' must be an array of strings", field)),
    }
}

/// Convert a Lua value to JSON
///
/// Sequences become arrays, other tables objects; functions and userdata
/// are rejected.
pub fn lua_value_to_json(lua: &Lua, value: LuaValue) -> Result<JsonValue> {
    if matches!(
        value,
        LuaValue::Function(_) | LuaValue::Thread(_) | LuaValue::UserData(_) | LuaValue::LightUserData(_)
    ) {
        return Err(anyhow!(
            "Unsupported Lua value type '{}' for JSON conversion",
            value.type_name()
        ));
    }
    lua.from_value_with(value, LuaDeserializeOptions::new().deny_unsupported_types(true))
        .context("Failed to convert Lua value to JSON")
}
