//! Input bindings
//!
//! A binding says where an input port gets its value from. The three cases
//! are explicit variants so the whole graph can be checked before anything
//! runs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Source of an input port's value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Binding {
    /// Value of a pipeline parameter
    Parameter { name: String },

    /// Constant value
    Literal { value: Value },

    /// Output port of a previously declared node
    #[serde(rename_all = "camelCase")]
    NodeOutput { node_id: String, port_name: String },
}

impl Binding {
    pub fn parameter(name: impl Into<String>) -> Self {
        Binding::Parameter { name: name.into() }
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Binding::Literal {
            value: value.into(),
        }
    }

    pub fn node_output(node_id: impl Into<String>, port_name: impl Into<String>) -> Self {
        Binding::NodeOutput {
            node_id: node_id.into(),
            port_name: port_name.into(),
        }
    }

    /// Id of the node this binding depends on, if any
    pub fn upstream(&self) -> Option<&str> {
        match self {
            Binding::NodeOutput { node_id, .. } => Some(node_id),
            _ => None,
        }
    }

    /// Name of the parameter this binding reads, if any
    pub fn parameter_name(&self) -> Option<&str> {
        match self {
            Binding::Parameter { name } => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_binding_wire_format() {
        assert_eq!(
            serde_json::to_value(Binding::parameter("train-code")).unwrap(),
            json!({ "kind": "parameter", "name": "train-code" })
        );
        assert_eq!(
            serde_json::to_value(Binding::literal("kfp-creds")).unwrap(),
            json!({ "kind": "literal", "value": "kfp-creds" })
        );
        assert_eq!(
            serde_json::to_value(Binding::node_output("train", "model")).unwrap(),
            json!({ "kind": "nodeOutput", "nodeId": "train", "portName": "model" })
        );
    }

    #[test]
    fn test_binding_accessors() {
        assert_eq!(Binding::node_output("store", "modelRef").upstream(), Some("store"));
        assert_eq!(Binding::literal(1).upstream(), None);
        assert_eq!(Binding::parameter("name").parameter_name(), Some("name"));
    }
}
