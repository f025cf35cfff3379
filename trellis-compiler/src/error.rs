//! Error types for graph construction and compilation

use thiserror::Error;
use trellis_core::domain::types::PortType;
use trellis_core::dto::artifact::ArtifactError;

/// Result type alias for compiler operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised while building, decorating or compiling a pipeline graph
///
/// Every variant names the offending parameter, node or port. Validation
/// errors surface from the call that detects them (`define`, `add_node`,
/// `finalize`, `attach`); anything raised inside `compile` is wrapped in
/// [`PipelineError::Compilation`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("parameter '{name}' is already defined")]
    DuplicateParameter { name: String },

    #[error("parameter '{name}' has no supplied value and no default")]
    MissingDefault { name: String },

    #[error("type mismatch at {location}: expected {expected}, found {found}")]
    TypeMismatch {
        location: String,
        expected: PortType,
        found: String,
    },

    #[error("unresolved port '{input}' on node '{node}': {reason}")]
    UnresolvedPort {
        node: String,
        input: String,
        reason: String,
    },

    #[error("parameter '{name}' is declared but never bound to any node")]
    DanglingParameter { name: String },

    /// Internal invariant violation: the builder rejects forward references,
    /// so a well-formed graph can never contain a cycle
    #[error("cycle detected among nodes: {}", .nodes.join(", "))]
    CycleDetected { nodes: Vec<String> },

    #[error("parameter '{name}' is not declared")]
    UnknownParameter { name: String },

    #[error("node '{node}' binds input '{input}', which template '{template}' does not declare")]
    UnknownInput {
        node: String,
        input: String,
        template: String,
    },

    #[error("input '{input}' of node '{node}' is bound more than once")]
    DuplicateBinding { node: String, input: String },

    #[error("template '{template}' used by step '{node}' was not resolved")]
    UnknownTemplate { node: String, template: String },

    #[error("two different templates share the reference '{template}'")]
    ConflictingTemplate { template: String },

    #[error("node '{node}' does not exist")]
    UnknownNode { node: String },

    #[error("node '{node}' is already defined")]
    DuplicateNode { node: String },

    #[error("invalid node id '{node}': {reason}")]
    InvalidNodeId { node: String, reason: String },

    #[error("invalid credential name '{name}': {reason}")]
    InvalidCredentialName { name: String, reason: String },

    #[error("credential '{credential}' may not be attached to node '{node}': node is outside the injector scope")]
    CredentialOutOfScope { node: String, credential: String },

    #[error("credential '{credential}' is configured but its scope names no node or capability")]
    EmptyCredentialScope { credential: String },

    #[error("artifact serialization failed: {0}")]
    Serialization(String),

    #[error("unsupported artifact version '{found}' (expected '{expected}')")]
    UnsupportedVersion { found: String, expected: String },

    #[error("compilation failed: {0}")]
    Compilation(#[source] Box<PipelineError>),
}

impl PipelineError {
    /// Wraps an error raised at the compile boundary
    ///
    /// Already wrapped errors are returned unchanged.
    pub fn compilation(self) -> Self {
        match self {
            PipelineError::Compilation(_) => self,
            other => PipelineError::Compilation(Box::new(other)),
        }
    }

    /// The underlying error, looking through `Compilation`
    pub fn root_cause(&self) -> &PipelineError {
        match self {
            PipelineError::Compilation(inner) => inner.root_cause(),
            other => other,
        }
    }

    /// Stable name of the error kind, for user-facing reports
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::DuplicateParameter { .. } => "DuplicateParameter",
            PipelineError::MissingDefault { .. } => "MissingDefault",
            PipelineError::TypeMismatch { .. } => "TypeMismatch",
            PipelineError::UnresolvedPort { .. } => "UnresolvedPort",
            PipelineError::DanglingParameter { .. } => "DanglingParameter",
            PipelineError::CycleDetected { .. } => "CycleDetected",
            PipelineError::UnknownParameter { .. } => "UnknownParameter",
            PipelineError::UnknownInput { .. } => "UnknownInput",
            PipelineError::DuplicateBinding { .. } => "DuplicateBinding",
            PipelineError::UnknownTemplate { .. } => "UnknownTemplate",
            PipelineError::ConflictingTemplate { .. } => "ConflictingTemplate",
            PipelineError::UnknownNode { .. } => "UnknownNode",
            PipelineError::DuplicateNode { .. } => "DuplicateNode",
            PipelineError::InvalidNodeId { .. } => "InvalidNodeId",
            PipelineError::InvalidCredentialName { .. } => "InvalidCredentialName",
            PipelineError::CredentialOutOfScope { .. } => "CredentialOutOfScope",
            PipelineError::EmptyCredentialScope { .. } => "EmptyCredentialScope",
            PipelineError::Serialization(_) => "Serialization",
            PipelineError::UnsupportedVersion { .. } => "UnsupportedVersion",
            PipelineError::Compilation(_) => "Compilation",
        }
    }

    /// Whether this error signals a broken internal invariant rather than bad input
    pub fn is_internal(&self) -> bool {
        matches!(self.root_cause(), PipelineError::CycleDetected { .. })
    }
}

impl From<ArtifactError> for PipelineError {
    fn from(err: ArtifactError) -> Self {
        match err {
            ArtifactError::Json(e) => PipelineError::Serialization(e.to_string()),
            ArtifactError::UnsupportedVersion(found) => PipelineError::UnsupportedVersion {
                found,
                expected: trellis_core::dto::artifact::ARTIFACT_VERSION.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compilation_wraps_once() {
        let err = PipelineError::DanglingParameter {
            name: "learningRate".to_string(),
        }
        .compilation()
        .compilation();

        assert_eq!(err.kind(), "Compilation");
        assert_eq!(err.root_cause().kind(), "DanglingParameter");
        assert!(matches!(
            err,
            PipelineError::Compilation(ref inner) if inner.kind() == "DanglingParameter"
        ));
    }

    #[test]
    fn test_messages_name_the_offender() {
        let err = PipelineError::UnresolvedPort {
            node: "train".to_string(),
            input: "creds".to_string(),
            reason: "node 'deploy' is not declared before 'train'".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("train"));
        assert!(message.contains("creds"));
        assert!(message.contains("deploy"));
    }

    #[test]
    fn test_cycle_is_internal() {
        let err = PipelineError::CycleDetected {
            nodes: vec!["a".to_string(), "b".to_string()],
        }
        .compilation();
        assert!(err.is_internal());
        assert!(err.to_string().contains("a, b"));
        assert!(!PipelineError::UnknownNode { node: "x".into() }.is_internal());
    }

    #[test]
    fn test_artifact_error_conversion() {
        let err: PipelineError = ArtifactError::UnsupportedVersion("v0".to_string()).into();
        assert_eq!(err.kind(), "UnsupportedVersion");
    }
}
