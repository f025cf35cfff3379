//! Pipeline parameter domain types

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::types::PortType;

/// A named, typed input exposed at the pipeline boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: PortType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Parameter {
    /// Creates a parameter; it is required exactly when it has no default
    pub fn new(name: impl Into<String>, param_type: PortType, default: Option<Value>) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: default.is_none(),
            default,
            description: None,
        }
    }

    /// Marks the parameter optional: with no value it resolves to `null`
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
