//! Operation template domain types
//!
//! A template describes one reusable pipeline operation: its typed input and
//! output ports plus an opaque implementation document that only the
//! execution engine interprets. Templates are produced by a resolver and are
//! read-only from then on.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::domain::types::PortType;

/// Identity of a template: a catalog name or a URL
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateRef(String);

impl TemplateRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this reference points at a remote location
    pub fn is_url(&self) -> bool {
        self.0.starts_with("http://") || self.0.starts_with("https://")
    }
}

impl fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TemplateRef {
    fn from(s: &str) -> Self {
        TemplateRef::new(s)
    }
}

impl From<String> for TemplateRef {
    fn from(s: String) -> Self {
        TemplateRef(s)
    }
}

/// Declared input port of a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputPort {
    pub name: String,
    #[serde(rename = "type", default)]
    pub port_type: PortType,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl InputPort {
    pub fn new(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            name: name.into(),
            port_type,
            optional: false,
            default: None,
            description: None,
        }
    }

    /// Marks the port optional
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Gives the port a default, which also makes it optional
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self.optional = true;
        self
    }

    /// A port must be bound when it is neither optional nor defaulted
    pub fn is_required(&self) -> bool {
        !self.optional && self.default.is_none()
    }
}

/// Declared output port of a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputPort {
    pub name: String,
    #[serde(rename = "type", default)]
    pub port_type: PortType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl OutputPort {
    pub fn new(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            name: name.into(),
            port_type,
            description: None,
        }
    }
}

/// Resolved operation template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Reference the template was resolved from
    #[serde(rename = "ref", default)]
    pub reference: TemplateRef,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub inputs: Vec<InputPort>,
    #[serde(default)]
    pub outputs: Vec<OutputPort>,
    /// Capability labels (e.g. `training`, `storage`) used for credential scoping
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub capabilities: BTreeSet<String>,
    /// Engine-specific body (container image, command, ...), passed through untouched
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub implementation: Value,
}

impl Template {
    pub fn new(reference: impl Into<TemplateRef>, name: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            name: name.into(),
            description: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            capabilities: BTreeSet::new(),
            implementation: Value::Null,
        }
    }

    pub fn with_input(mut self, port: InputPort) -> Self {
        self.inputs.push(port);
        self
    }

    pub fn with_output(mut self, port: OutputPort) -> Self {
        self.outputs.push(port);
        self
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    pub fn input(&self, name: &str) -> Option<&InputPort> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&OutputPort> {
        self.outputs.iter().find(|p| p.name == name)
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    /// Returns the first port name declared twice on the same side, if any
    pub fn duplicate_port(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        if let Some(port) = self.inputs.iter().find(|p| !seen.insert(p.name.as_str())) {
            return Some(&port.name);
        }

        seen.clear();
        self.outputs
            .iter()
            .find(|p| !seen.insert(p.name.as_str()))
            .map(|p| p.name.as_str())
    }
}

/// Set of fully resolved templates, keyed by reference
///
/// The graph builder only ever receives templates from a complete set, never
/// a pending lookup.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    templates: BTreeMap<TemplateRef, Arc<Template>>,
}

impl TemplateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a template under its own reference, returning the shared handle
    pub fn insert(&mut self, template: impl Into<Arc<Template>>) -> Arc<Template> {
        let template = template.into();
        self.templates
            .insert(template.reference.clone(), template.clone());
        template
    }

    pub fn get(&self, reference: &TemplateRef) -> Option<&Arc<Template>> {
        self.templates.get(reference)
    }

    pub fn contains(&self, reference: &TemplateRef) -> bool {
        self.templates.contains_key(reference)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Template>> {
        self.templates.values()
    }
}

impl FromIterator<Template> for TemplateSet {
    fn from_iter<I: IntoIterator<Item = Template>>(iter: I) -> Self {
        let mut set = TemplateSet::new();
        for template in iter {
            set.insert(template);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_template_descriptor() {
        let descriptor = json!({
            "name": "Train Model",
            "inputs": [
                { "name": "config", "type": "String" },
                { "name": "framework", "type": "String", "default": "tensorflow" }
            ],
            "outputs": [{ "name": "run_uid", "type": "String" }],
            "capabilities": ["training"],
            "implementation": { "container": { "image": "train:latest" } }
        });

        let template: Template = serde_json::from_value(descriptor).unwrap();
        assert_eq!(template.reference.as_str(), "");
        assert!(template.input("config").unwrap().is_required());
        assert!(!template.input("framework").unwrap().is_required());
        assert_eq!(template.output("run_uid").unwrap().port_type, PortType::String);
        assert!(template.has_capability("training"));
        assert!(template.duplicate_port().is_none());
    }

    #[test]
    fn test_duplicate_port_detection() {
        let template = Template::new("dup", "Dup")
            .with_input(InputPort::new("a", PortType::String))
            .with_input(InputPort::new("a", PortType::Integer));
        assert_eq!(template.duplicate_port(), Some("a"));

        let template = Template::new("dup", "Dup")
            .with_input(InputPort::new("a", PortType::String))
            .with_output(OutputPort::new("a", PortType::String));
        assert_eq!(template.duplicate_port(), None);
    }

    #[test]
    fn test_template_ref_url() {
        assert!(TemplateRef::new("https://example.com/train/component.yaml").is_url());
        assert!(!TemplateRef::new("watson/train").is_url());
    }

    #[test]
    fn test_template_set_keyed_by_reference() {
        let set: TemplateSet = vec![
            Template::new("b", "B"),
            Template::new("a", "A"),
        ]
        .into_iter()
        .collect();

        assert_eq!(set.len(), 2);
        assert!(set.contains(&TemplateRef::new("a")));
        let names: Vec<_> = set.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }
}
