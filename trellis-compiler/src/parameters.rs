//! Pipeline parameter set
//!
//! Holds the parameters a pipeline exposes at its boundary, in declaration
//! order, together with any caller-supplied overrides.

use serde_json::Value;
use std::collections::HashMap;
use trellis_core::domain::binding::Binding;
use trellis_core::domain::parameter::Parameter;
use trellis_core::domain::types::{value_kind, PortType};

use crate::error::{PipelineError, Result};

/// Handle to a declared parameter
///
/// Handles are only produced by [`ParameterSet::define`], so holding one
/// proves the parameter exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParameterHandle {
    index: usize,
    name: String,
}

impl ParameterHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Binding that reads this parameter
    pub fn binding(&self) -> Binding {
        Binding::parameter(self.name.clone())
    }
}

impl AsRef<str> for ParameterHandle {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

/// Ordered, uniquely named set of pipeline parameters
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    parameters: Vec<Parameter>,
    index: HashMap<String, usize>,
    supplied: HashMap<String, Value>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a parameter
    ///
    /// The parameter is required exactly when it has no default.
    ///
    /// # Errors
    /// - `DuplicateParameter` if `name` is already declared
    /// - `TypeMismatch` if `default` does not fit `param_type`
    pub fn define(
        &mut self,
        name: impl Into<String>,
        param_type: PortType,
        default: Option<Value>,
    ) -> Result<ParameterHandle> {
        self.define_parameter(Parameter::new(name, param_type, default))
    }

    /// Declares a fully described parameter
    pub fn define_parameter(&mut self, parameter: Parameter) -> Result<ParameterHandle> {
        if self.index.contains_key(&parameter.name) {
            return Err(PipelineError::DuplicateParameter {
                name: parameter.name,
            });
        }

        if let Some(default) = &parameter.default {
            check_value(&parameter, default, "default of parameter")?;
        }

        let index = self.parameters.len();
        let handle = ParameterHandle {
            index,
            name: parameter.name.clone(),
        };
        self.index.insert(parameter.name.clone(), index);
        self.parameters.push(parameter);
        Ok(handle)
    }

    pub fn handle(&self, name: &str) -> Option<ParameterHandle> {
        self.index.get(name).map(|&index| ParameterHandle {
            index,
            name: name.to_string(),
        })
    }

    /// Parameter behind a handle; `None` for a handle issued by another set
    pub fn get(&self, handle: &ParameterHandle) -> Option<&Parameter> {
        self.parameters
            .get(handle.index)
            .filter(|p| p.name == handle.name)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Parameter> {
        self.index.get(name).map(|&i| &self.parameters[i])
    }

    /// Records a caller-supplied value for a declared parameter
    ///
    /// # Errors
    /// - `UnknownParameter` if `name` is not declared
    /// - `TypeMismatch` if `value` does not fit the parameter type
    pub fn supply(&mut self, name: &str, value: Value) -> Result<()> {
        let parameter = self
            .get_by_name(name)
            .ok_or_else(|| PipelineError::UnknownParameter {
                name: name.to_string(),
            })?;
        check_value(parameter, &value, "value of parameter")?;
        self.supplied.insert(name.to_string(), value);
        Ok(())
    }

    /// Value supplied for a parameter, if any
    pub fn supplied(&self, handle: &ParameterHandle) -> Option<&Value> {
        self.supplied.get(&handle.name)
    }

    /// Resolves the effective value of a parameter
    ///
    /// Returns `supplied` when given and type-compatible, else the declared
    /// default. An optional parameter with neither resolves to `null`.
    ///
    /// # Errors
    /// - `TypeMismatch` for an incompatible supplied value
    /// - `MissingDefault` for a required parameter with neither value
    /// - `UnknownParameter` for a handle from another set
    pub fn resolve(&self, handle: &ParameterHandle, supplied: Option<&Value>) -> Result<Value> {
        let parameter = self.get(handle).ok_or_else(|| PipelineError::UnknownParameter {
            name: handle.name.clone(),
        })?;

        if let Some(value) = supplied {
            check_value(parameter, value, "value of parameter")?;
            return Ok(value.clone());
        }

        match &parameter.default {
            Some(default) => Ok(default.clone()),
            None if parameter.required => Err(PipelineError::MissingDefault {
                name: parameter.name.clone(),
            }),
            None => Ok(Value::Null),
        }
    }

    /// Resolves a parameter against the recorded overrides
    pub fn value(&self, handle: &ParameterHandle) -> Result<Value> {
        self.resolve(handle, self.supplied(handle))
    }

    /// Handles in declaration order
    pub fn handles(&self) -> impl Iterator<Item = ParameterHandle> + '_ {
        self.parameters
            .iter()
            .enumerate()
            .map(|(index, p)| ParameterHandle {
                index,
                name: p.name.clone(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

fn check_value(parameter: &Parameter, value: &Value, what: &str) -> Result<()> {
    if parameter.param_type.accepts(value) {
        Ok(())
    } else {
        Err(PipelineError::TypeMismatch {
            location: format!("{what} '{}'", parameter.name),
            expected: parameter.param_type.clone(),
            found: value_kind(value).to_string(),
        })
    }
}
