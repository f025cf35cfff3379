//! Pipeline compiler
//!
//! Turns a finalized [`PipelineGraph`] into a [`CompiledArtifact`]. Nodes are
//! ordered with Kahn's algorithm, breaking ties by declaration order, so the
//! same graph always compiles to the same bytes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};
use trellis_core::domain::binding::Binding;
use trellis_core::domain::template::{Template, TemplateRef};
use trellis_core::dto::artifact::{
    ArtifactBinding, ArtifactNode, ArtifactParameter, CompiledArtifact, ARTIFACT_VERSION,
};

use crate::builder::{OperationNode, PipelineGraph};
use crate::config::CompilerConfig;
use crate::error::{PipelineError, Result};

/// Compiles pipeline graphs into artifacts
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compiles a graph
    ///
    /// The artifact is built completely in memory; on failure nothing is
    /// returned and every error is wrapped in `PipelineError::Compilation`.
    pub fn compile(&self, graph: &PipelineGraph) -> Result<CompiledArtifact> {
        self.build(graph).map_err(PipelineError::compilation)
    }

    /// Compiles a graph and serializes the artifact to JSON
    pub fn compile_to_json(&self, graph: &PipelineGraph) -> Result<String> {
        let artifact = self.compile(graph)?;
        artifact
            .to_json()
            .map_err(|e| PipelineError::from(e).compilation())
    }

    /// Parses a previously written artifact
    pub fn load_artifact(&self, json: &str) -> Result<CompiledArtifact> {
        Ok(CompiledArtifact::from_json(json)?)
    }

    fn build(&self, graph: &PipelineGraph) -> Result<CompiledArtifact> {
        if self.config.is_strict() {
            if let Some(parameter) = graph.dangling_parameters().first() {
                return Err(PipelineError::DanglingParameter {
                    name: parameter.name.clone(),
                });
            }
        }

        let nodes = graph.nodes();
        let upstream = nodes
            .iter()
            .map(|node| resolve_upstream(graph, node))
            .collect::<Result<Vec<_>>>()?;

        let order = topological_order(&upstream).map_err(|remaining| {
            PipelineError::CycleDetected {
                nodes: remaining.iter().map(|&i| nodes[i].id().to_string()).collect(),
            }
        })?;

        let parameters = graph
            .parameters()
            .handles()
            .map(|handle| {
                let set = graph.parameters();
                let parameter = set.get(&handle).ok_or_else(|| PipelineError::UnknownParameter {
                    name: handle.name().to_string(),
                })?;
                Ok(ArtifactParameter {
                    name: parameter.name.clone(),
                    param_type: parameter.param_type.clone(),
                    default: set.resolve(&handle, set.supplied(&handle))?,
                    required: parameter.required,
                    description: parameter.description.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let templates = collect_templates(nodes)?;

        let artifact_nodes = order
            .iter()
            .map(|&i| {
                let node = &nodes[i];
                ArtifactNode {
                    id: node.id().to_string(),
                    template: node.template().reference.clone(),
                    bindings: node
                        .bindings()
                        .iter()
                        .map(|b| ArtifactBinding {
                            input: b.input.clone(),
                            source: b.binding.clone(),
                        })
                        .collect(),
                    credentials: node.credentials().cloned().collect(),
                    dependencies: upstream[i]
                        .iter()
                        .map(|&u| nodes[u].id().to_string())
                        .collect(),
                }
            })
            .collect();

        info!(
            pipeline = %graph.name(),
            nodes = nodes.len(),
            templates = templates.len(),
            "compiled pipeline"
        );

        Ok(CompiledArtifact {
            version: ARTIFACT_VERSION.to_string(),
            name: graph.name().to_string(),
            description: graph.description().map(str::to_string),
            parameters,
            templates,
            nodes: artifact_nodes,
        })
    }
}

/// Declaration indices of the nodes `node` consumes outputs from
///
/// Re-checks that every `nodeOutput` binding names exactly one node and one
/// of its declared output ports.
fn resolve_upstream(graph: &PipelineGraph, node: &OperationNode) -> Result<Vec<usize>> {
    let mut upstream = Vec::new();
    for bound in node.bindings() {
        let Binding::NodeOutput { node_id, port_name } = &bound.binding else {
            continue;
        };
        let unresolved = |reason: String| PipelineError::UnresolvedPort {
            node: node.id().to_string(),
            input: bound.input.clone(),
            reason,
        };

        let index = graph
            .position(node_id)
            .ok_or_else(|| unresolved(format!("node '{node_id}' does not exist")))?;
        if graph.nodes()[index].template().output(port_name).is_none() {
            return Err(unresolved(format!(
                "node '{node_id}' has no output port '{port_name}'"
            )));
        }
        if !upstream.contains(&index) {
            upstream.push(index);
        }
    }
    Ok(upstream)
}

/// Kahn's algorithm over declaration indices
///
/// `upstream[i]` lists the nodes node `i` depends on. Among nodes that are
/// ready at the same time the lowest declaration index goes first. On a cycle
/// the indices that could not be ordered are returned as the error.
fn topological_order(upstream: &[Vec<usize>]) -> std::result::Result<Vec<usize>, Vec<usize>> {
    let mut in_degree: Vec<usize> = upstream.iter().map(Vec::len).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); upstream.len()];
    for (node, deps) in upstream.iter().enumerate() {
        for &dep in deps {
            dependents[dep].push(node);
        }
    }

    let mut ready: BTreeSet<usize> = (0..upstream.len())
        .filter(|&i| in_degree[i] == 0)
        .collect();
    let mut order = Vec::with_capacity(upstream.len());

    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &dependent in &dependents[next] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() == upstream.len() {
        Ok(order)
    } else {
        debug!(ordered = order.len(), total = upstream.len(), "topological sort stalled");
        Err((0..upstream.len()).filter(|&i| in_degree[i] > 0).collect())
    }
}

/// Every referenced template, sorted by reference
fn collect_templates(nodes: &[OperationNode]) -> Result<Vec<Template>> {
    let mut templates: BTreeMap<&TemplateRef, &Arc<Template>> = BTreeMap::new();
    for node in nodes {
        let template = node.template();
        match templates.get(&template.reference) {
            Some(&existing) if *existing != *template => {
                return Err(PipelineError::ConflictingTemplate {
                    template: template.reference.to_string(),
                });
            }
            Some(_) => {}
            None => {
                templates.insert(&template.reference, template);
            }
        }
    }
    Ok(templates.into_values().map(|t| t.as_ref().clone()).collect())
}
