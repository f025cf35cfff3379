//! Compiled artifact handed to the execution engine
//!
//! The artifact is a plain serde document. Field order is fixed by these
//! structs and JSON object keys inside literal values are emitted sorted, so
//! serializing the same artifact always yields the same bytes, and parsing
//! then re-serializing an artifact reproduces it exactly.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::binding::Binding;
use crate::domain::credential::CredentialRef;
use crate::domain::template::{Template, TemplateRef};
use crate::domain::types::PortType;

/// Format version tag written into every artifact
pub const ARTIFACT_VERSION: &str = "trellis.dev/pipeline/v1";

/// Errors reading or writing an artifact document
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("invalid artifact JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported artifact version '{0}' (expected '{expected}')", expected = ARTIFACT_VERSION)]
    UnsupportedVersion(String),
}

/// Serialized, topologically ordered pipeline graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledArtifact {
    pub version: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Parameters in declaration order
    pub parameters: Vec<ArtifactParameter>,
    /// Every referenced template, sorted by reference
    pub templates: Vec<Template>,
    /// Nodes in topological order
    pub nodes: Vec<ArtifactNode>,
}

/// Parameter entry with its effective default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: PortType,
    /// Caller-supplied value if any, else the declared default (`null` if neither)
    pub default: Value,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One operation node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactNode {
    pub id: String,
    pub template: TemplateRef,
    /// Bindings in template input-port order
    pub bindings: Vec<ArtifactBinding>,
    pub credentials: Vec<CredentialRef>,
    /// Ids of the nodes whose outputs this node consumes
    pub dependencies: Vec<String>,
}

/// Resolved binding of one input port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactBinding {
    pub input: String,
    #[serde(flatten)]
    pub source: Binding,
}

impl CompiledArtifact {
    /// Serializes to pretty JSON with a trailing newline
    pub fn to_json(&self) -> Result<String, ArtifactError> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Parses an artifact, rejecting unknown format versions
    pub fn from_json(json: &str) -> Result<Self, ArtifactError> {
        let artifact: CompiledArtifact = serde_json::from_str(json)?;
        if artifact.version != ARTIFACT_VERSION {
            return Err(ArtifactError::UnsupportedVersion(artifact.version));
        }
        Ok(artifact)
    }

    pub fn node(&self, id: &str) -> Option<&ArtifactNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Node ids in artifact (topological) order
    pub fn node_ids(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }
}
