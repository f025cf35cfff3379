//! Graph builder
//!
//! Nodes are added one at a time in declaration order. Every `add_node` call
//! validates the new node completely against the parameters and the nodes
//! that already exist, so a binding can only ever point backwards and the
//! builder never holds a partially valid node.

use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};
use trellis_core::domain::binding::Binding;
use trellis_core::domain::credential::CredentialRef;
use trellis_core::domain::parameter::Parameter;
use trellis_core::domain::template::{InputPort, Template};
use trellis_core::domain::types::{value_kind, PortType};

use crate::config::CompilerConfig;
use crate::credentials::CredentialInjector;
use crate::error::{PipelineError, Result};
use crate::parameters::{ParameterHandle, ParameterSet};

// =============================================================================
// Nodes and graph
// =============================================================================

/// Handle to a node added to a builder
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    index: usize,
    id: String,
}

impl NodeHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Declaration index of the node
    pub fn index(&self) -> usize {
        self.index
    }

    /// Binding that consumes one of this node's output ports
    pub fn output(&self, port: impl Into<String>) -> Binding {
        Binding::node_output(self.id.clone(), port)
    }
}

impl AsRef<str> for NodeHandle {
    fn as_ref(&self) -> &str {
        &self.id
    }
}

/// Binding of one input port
#[derive(Debug, Clone, PartialEq)]
pub struct BoundInput {
    pub input: String,
    pub binding: Binding,
}

/// One step of the pipeline
#[derive(Debug, Clone)]
pub struct OperationNode {
    id: String,
    template: Arc<Template>,
    bindings: Vec<BoundInput>,
    credentials: BTreeSet<CredentialRef>,
}

impl OperationNode {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }

    /// Bindings in template input-port order
    pub fn bindings(&self) -> &[BoundInput] {
        &self.bindings
    }

    pub fn binding(&self, input: &str) -> Option<&Binding> {
        self.bindings
            .iter()
            .find(|b| b.input == input)
            .map(|b| &b.binding)
    }

    /// Credentials attached to this node, sorted by name
    pub fn credentials(&self) -> impl Iterator<Item = &CredentialRef> {
        self.credentials.iter()
    }

    pub fn has_credential(&self, credential: &CredentialRef) -> bool {
        self.credentials.contains(credential)
    }

    /// Ids of the nodes this node consumes outputs from, without duplicates
    pub fn upstream(&self) -> Vec<&str> {
        let mut upstream: Vec<&str> = Vec::new();
        for id in self.bindings.iter().filter_map(|b| b.binding.upstream()) {
            if !upstream.contains(&id) {
                upstream.push(id);
            }
        }
        upstream
    }

    /// Adds a credential, returning false if it was already attached
    pub(crate) fn attach(&mut self, credential: CredentialRef) -> bool {
        self.credentials.insert(credential)
    }
}

/// Validated pipeline graph: parameters plus nodes in declaration order
#[derive(Debug, Clone)]
pub struct PipelineGraph {
    name: String,
    description: Option<String>,
    parameters: ParameterSet,
    nodes: Vec<OperationNode>,
    index: HashMap<String, usize>,
}

impl PipelineGraph {
    fn new(name: String) -> Self {
        Self {
            name,
            description: None,
            parameters: ParameterSet::new(),
            nodes: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    /// Nodes in declaration order
    pub fn nodes(&self) -> &[OperationNode] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&OperationNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Declaration index of a node
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub(crate) fn node_mut(&mut self, id: &str) -> Option<&mut OperationNode> {
        self.index.get(id).map(|&i| &mut self.nodes[i])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Declared parameters that no node binds, in declaration order
    pub fn dangling_parameters(&self) -> Vec<&Parameter> {
        let bound: HashSet<&str> = self
            .nodes
            .iter()
            .flat_map(|n| n.bindings.iter())
            .filter_map(|b| b.binding.parameter_name())
            .collect();

        self.parameters
            .iter()
            .filter(|p| !bound.contains(p.name.as_str()))
            .collect()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Incrementally constructs a [`PipelineGraph`]
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use trellis_compiler::GraphBuilder;
/// use trellis_core::domain::template::{InputPort, OutputPort, Template};
/// use trellis_core::domain::types::PortType;
///
/// let train = Arc::new(
///     Template::new("train", "Train")
///         .with_input(InputPort::new("code", PortType::String))
///         .with_output(OutputPort::new("model", PortType::String)),
/// );
///
/// let mut builder = GraphBuilder::new("example");
/// let code = builder.define("train-code", PortType::String, Some("model.zip".into()))?;
/// builder.add_node("train", train, [("code", code.binding())])?;
/// let graph = builder.finalize()?;
/// assert_eq!(graph.len(), 1);
/// # Ok::<(), trellis_compiler::PipelineError>(())
/// ```
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    graph: PipelineGraph,
    config: CompilerConfig,
}

impl GraphBuilder {
    /// Creates an empty builder with the default (permissive) configuration
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            graph: PipelineGraph::new(name.into()),
            config: CompilerConfig::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.graph.description = Some(description.into());
        self
    }

    pub fn with_config(mut self, config: CompilerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Current graph, as built so far
    pub fn graph(&self) -> &PipelineGraph {
        &self.graph
    }

    /// Declares a pipeline parameter (see [`ParameterSet::define`])
    pub fn define(
        &mut self,
        name: impl Into<String>,
        param_type: PortType,
        default: Option<Value>,
    ) -> Result<ParameterHandle> {
        self.graph.parameters.define(name, param_type, default)
    }

    pub fn define_parameter(&mut self, parameter: Parameter) -> Result<ParameterHandle> {
        self.graph.parameters.define_parameter(parameter)
    }

    /// Records a caller-supplied parameter value (see [`ParameterSet::supply`])
    pub fn supply(&mut self, name: &str, value: Value) -> Result<()> {
        self.graph.parameters.supply(name, value)
    }

    /// Adds an operation node
    ///
    /// # Arguments
    /// * `id` - Unique node id made of letters, digits, `_`, `-` and `.`
    /// * `template` - Resolved template the node instantiates
    /// * `bindings` - Input port name to binding pairs
    ///
    /// # Returns
    /// Handle used to bind later nodes to this node's outputs
    ///
    /// # Errors
    /// `InvalidNodeId`, `DuplicateNode`, `ConflictingTemplate`,
    /// `DuplicateBinding`, `UnknownInput`, `UnknownParameter`, `TypeMismatch`
    /// or `UnresolvedPort`. A port default that does not fit its port type is
    /// a `TypeMismatch` too. On error the builder is left exactly as it was.
    pub fn add_node<I, S>(
        &mut self,
        id: impl Into<String>,
        template: Arc<Template>,
        bindings: I,
    ) -> Result<NodeHandle>
    where
        I: IntoIterator<Item = (S, Binding)>,
        S: Into<String>,
    {
        let id = id.into();
        validate_node_id(&id)?;
        if self.graph.index.contains_key(&id) {
            return Err(PipelineError::DuplicateNode { node: id });
        }
        if let Some(existing) = self
            .graph
            .nodes
            .iter()
            .map(|n| &n.template)
            .find(|t| t.reference == template.reference)
        {
            if **existing != *template {
                return Err(PipelineError::ConflictingTemplate {
                    template: template.reference.to_string(),
                });
            }
        }

        let mut bound: HashMap<String, Binding> = HashMap::new();
        for (input, binding) in bindings {
            let input = input.into();
            let port = template
                .input(&input)
                .ok_or_else(|| PipelineError::UnknownInput {
                    node: id.clone(),
                    input: input.clone(),
                    template: template.reference.to_string(),
                })?;
            self.check_binding(&id, port, &binding)?;

            if bound.insert(input.clone(), binding).is_some() {
                return Err(PipelineError::DuplicateBinding { node: id, input });
            }
        }

        let mut resolved = Vec::with_capacity(template.inputs.len());
        for port in &template.inputs {
            let binding = match (bound.remove(&port.name), &port.default) {
                (Some(binding), _) => binding,
                (None, Some(default)) => {
                    let binding = Binding::literal(default.clone());
                    self.check_binding(&id, port, &binding)?;
                    binding
                }
                (None, None) if port.optional => continue,
                (None, None) => {
                    return Err(PipelineError::UnresolvedPort {
                        node: id,
                        input: port.name.clone(),
                        reason: "required input is not bound".to_string(),
                    });
                }
            };
            resolved.push(BoundInput {
                input: port.name.clone(),
                binding,
            });
        }

        debug!(
            node = %id,
            template = %template.reference,
            inputs = resolved.len(),
            "added node"
        );

        let index = self.graph.nodes.len();
        self.graph.index.insert(id.clone(), index);
        self.graph.nodes.push(OperationNode {
            id: id.clone(),
            template,
            bindings: resolved,
            credentials: BTreeSet::new(),
        });

        Ok(NodeHandle { index, id })
    }

    /// Checks one binding against the destination port
    fn check_binding(&self, node: &str, port: &InputPort, binding: &Binding) -> Result<()> {
        let mismatch = |found: String| PipelineError::TypeMismatch {
            location: format!("input '{}' of node '{node}'", port.name),
            expected: port.port_type.clone(),
            found,
        };
        let unresolved = |reason: String| PipelineError::UnresolvedPort {
            node: node.to_string(),
            input: port.name.clone(),
            reason,
        };

        match binding {
            Binding::Parameter { name } => {
                let parameter = self.graph.parameters.get_by_name(name).ok_or_else(|| {
                    PipelineError::UnknownParameter { name: name.clone() }
                })?;
                if !parameter.param_type.is_assignable_to(&port.port_type) {
                    return Err(mismatch(format!(
                        "parameter '{name}' of type {}",
                        parameter.param_type
                    )));
                }
            }
            Binding::Literal { value } => {
                if !port.port_type.accepts(value) {
                    return Err(mismatch(format!("{} literal", value_kind(value))));
                }
            }
            Binding::NodeOutput { node_id, port_name } => {
                if node_id == node {
                    return Err(unresolved(format!(
                        "node '{node}' cannot consume its own output '{port_name}'"
                    )));
                }
                let upstream = self.graph.node(node_id).ok_or_else(|| {
                    unresolved(format!("node '{node_id}' is not declared before '{node}'"))
                })?;
                let output = upstream.template.output(port_name).ok_or_else(|| {
                    unresolved(format!("node '{node_id}' has no output port '{port_name}'"))
                })?;
                if !output.port_type.is_assignable_to(&port.port_type) {
                    return Err(mismatch(format!(
                        "output '{node_id}.{port_name}' of type {}",
                        output.port_type
                    )));
                }
            }
        }
        Ok(())
    }

    /// Validates the whole graph and returns a snapshot of it
    ///
    /// Parameters that no node binds fail with `DanglingParameter` in strict
    /// mode and are logged as warnings otherwise. Every required parameter
    /// must resolve. Credentials from the configuration are injected into the
    /// returned graph. The builder itself is not consumed, so it stays usable
    /// after a failure.
    pub fn finalize(&self) -> Result<PipelineGraph> {
        for parameter in self.graph.dangling_parameters() {
            if self.config.is_strict() {
                return Err(PipelineError::DanglingParameter {
                    name: parameter.name.clone(),
                });
            }
            warn!(
                pipeline = %self.graph.name,
                parameter = %parameter.name,
                "parameter is declared but never bound to any node"
            );
        }

        for handle in self.graph.parameters.handles() {
            self.graph.parameters.value(&handle)?;
        }

        let mut graph = self.graph.clone();
        if !self.config.credentials.is_empty() {
            self.config.validate()?;
            let injector = CredentialInjector::new(self.config.credential_scope.clone());
            for credential in &self.config.credentials {
                injector.inject(&mut graph, credential.as_str())?;
            }
        }

        info!(
            pipeline = %graph.name,
            nodes = graph.nodes.len(),
            parameters = graph.parameters.len(),
            "pipeline graph finalized"
        );
        Ok(graph)
    }
}

fn validate_node_id(id: &str) -> Result<()> {
    let reason = if id.is_empty() {
        "id is empty"
    } else if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        "only letters, digits, '_', '-' and '.' are allowed"
    } else {
        return Ok(());
    };

    Err(PipelineError::InvalidNodeId {
        node: id.to_string(),
        reason: reason.to_string(),
    })
}
