//! Pipeline definition domain types
//!
//! A `PipelineDefinition` is what a user writes (in Lua or JSON): parameters,
//! steps bound to templates, and credential injections. It carries template
//! references only; templates are resolved separately before the graph is
//! built.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::domain::binding::Binding;
use crate::domain::credential::CredentialScope;
use crate::domain::parameter::Parameter;
use crate::domain::template::TemplateRef;
use crate::domain::types::PortType;

/// Pipeline definition as authored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Parameters in declaration order
    #[serde(default)]
    pub parameters: Vec<ParameterDefinition>,
    /// Steps in declaration order
    pub steps: Vec<StepDefinition>,
    /// Pipeline-wide credential injections
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub credentials: Vec<CredentialInjection>,
}

impl PipelineDefinition {
    /// Template references used by the steps, without duplicates
    pub fn template_refs(&self) -> Vec<TemplateRef> {
        let mut refs: Vec<TemplateRef> = Vec::new();
        for step in &self.steps {
            if !refs.contains(&step.template) {
                refs.push(step.template.clone());
            }
        }
        refs
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterDefinition> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// Parameter entry of a definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub name: String,
    #[serde(rename = "type", default)]
    pub param_type: PortType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Defaults to `true` when no default value is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParameterDefinition {
    pub fn to_parameter(&self) -> Parameter {
        Parameter {
            name: self.name.clone(),
            param_type: self.param_type.clone(),
            default: self.default.clone(),
            required: self.required.unwrap_or(self.default.is_none()),
            description: self.description.clone(),
        }
    }
}

/// Step entry of a definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub id: String,
    pub template: TemplateRef,
    /// Input port name to binding
    #[serde(default)]
    pub inputs: BTreeMap<String, Binding>,
    /// Credentials attached to this step only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub credentials: Vec<String>,
}

/// Credential attached to every node in a scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialInjection {
    pub name: String,
    #[serde(default)]
    pub scope: CredentialScope,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_json_definition() {
        let definition: PipelineDefinition = serde_json::from_value(json!({
            "name": "training",
            "parameters": [
                { "name": "train-code", "type": "String", "default": "tf-model.zip" },
                { "name": "model-name", "type": "String" }
            ],
            "steps": [
                {
                    "id": "train",
                    "template": "watson/train",
                    "inputs": {
                        "train_code": { "kind": "parameter", "name": "train-code" }
                    }
                },
                {
                    "id": "store",
                    "template": "watson/store",
                    "inputs": {
                        "run_uid": { "kind": "nodeOutput", "nodeId": "train", "portName": "run_uid" }
                    },
                    "credentials": ["kfp-creds"]
                }
            ],
            "credentials": [
                { "name": "kfp-creds", "scope": { "capabilities": ["training"] } }
            ]
        }))
        .unwrap();

        assert_eq!(definition.steps.len(), 2);
        assert_eq!(definition.credentials[0].scope, CredentialScope::capabilities(["training"]));
        assert!(!definition.parameters[0].to_parameter().required);
        assert!(definition.parameters[1].to_parameter().required);
        assert_eq!(
            definition.steps[1].inputs["run_uid"],
            Binding::node_output("train", "run_uid")
        );
    }

    #[test]
    fn test_template_refs_deduplicated_in_order() {
        let step = |id: &str, template: &str| StepDefinition {
            id: id.to_string(),
            template: TemplateRef::new(template),
            inputs: BTreeMap::new(),
            credentials: Vec::new(),
        };
        let definition = PipelineDefinition {
            name: "p".to_string(),
            description: None,
            parameters: Vec::new(),
            steps: vec![step("a", "x"), step("b", "y"), step("c", "x")],
            credentials: Vec::new(),
        };

        assert_eq!(
            definition.template_refs(),
            vec![TemplateRef::new("x"), TemplateRef::new("y")]
        );
    }

    #[test]
    fn test_explicit_required_flag_wins() {
        let def = ParameterDefinition {
            name: "token".to_string(),
            param_type: PortType::String,
            default: None,
            required: Some(false),
            description: None,
        };
        assert!(!def.to_parameter().required);
    }
}
