//! Credential injection
//!
//! Credentials are attached to finished nodes as a separate decoration step.
//! Attaching only ever touches a node's credential set; ports, bindings and
//! edges are never modified.

use tracing::debug;
use trellis_core::domain::credential::{CredentialRef, CredentialScope};

use crate::builder::PipelineGraph;
use crate::error::{PipelineError, Result};

/// Attaches credential references to nodes within a scope
///
/// The default injector has an empty scope and refuses every node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CredentialInjector {
    scope: CredentialScope,
}

impl CredentialInjector {
    pub fn new(scope: CredentialScope) -> Self {
        Self { scope }
    }

    /// Injector allowed to decorate every node
    pub fn all_nodes() -> Self {
        Self::new(CredentialScope::AllNodes)
    }

    pub fn scope(&self) -> &CredentialScope {
        &self.scope
    }

    /// Attaches `credential` to one node
    ///
    /// Attaching the same credential twice is a no-op.
    ///
    /// # Returns
    /// `true` if the credential was newly attached
    ///
    /// # Errors
    /// - `InvalidCredentialName` for a malformed name
    /// - `UnknownNode` if the graph has no such node
    /// - `CredentialOutOfScope` if the node is outside this injector's scope
    pub fn attach(
        &self,
        graph: &mut PipelineGraph,
        node: impl AsRef<str>,
        credential: impl AsRef<str>,
    ) -> Result<bool> {
        let credential = parse_credential(credential.as_ref())?;
        let node = node.as_ref();

        let target = graph
            .node_mut(node)
            .ok_or_else(|| PipelineError::UnknownNode {
                node: node.to_string(),
            })?;

        if !self.scope.matches(node, target.template()) {
            return Err(PipelineError::CredentialOutOfScope {
                node: node.to_string(),
                credential: credential.to_string(),
            });
        }

        let added = target.attach(credential);
        if added {
            debug!(node = %node, "attached credential");
        }
        Ok(added)
    }

    /// Attaches `credential` to every node in scope
    ///
    /// # Returns
    /// Number of nodes in scope, whether or not they already held it
    pub fn inject(&self, graph: &mut PipelineGraph, credential: impl AsRef<str>) -> Result<usize> {
        let credential = parse_credential(credential.as_ref())?;

        let targets: Vec<String> = graph
            .nodes()
            .iter()
            .filter(|n| self.scope.matches(n.id(), n.template()))
            .map(|n| n.id().to_string())
            .collect();

        for id in &targets {
            if let Some(node) = graph.node_mut(id) {
                node.attach(credential.clone());
            }
        }

        debug!(
            credential = %credential,
            nodes = targets.len(),
            "injected credential"
        );
        Ok(targets.len())
    }
}

fn parse_credential(name: &str) -> Result<CredentialRef> {
    CredentialRef::new(name).map_err(|e| PipelineError::InvalidCredentialName {
        name: e.name,
        reason: e.reason.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::test_support;

    fn graph() -> PipelineGraph {
        test_support::pipeline(CompilerConfig::default())
            .finalize()
            .unwrap()
    }

    fn names(graph: &PipelineGraph, id: &str) -> Vec<String> {
        graph
            .node(id)
            .unwrap()
            .credentials()
            .map(|c| c.to_string())
            .collect()
    }

    #[test]
    fn test_attach_is_idempotent() {
        let mut graph = graph();
        let injector = CredentialInjector::all_nodes();

        assert!(injector.attach(&mut graph, "train", "kfp-creds").unwrap());
        let once = names(&graph, "train");
        assert!(!injector.attach(&mut graph, "train", "kfp-creds").unwrap());

        assert_eq!(names(&graph, "train"), once);
        assert_eq!(once, vec!["kfp-creds"]);
    }

    #[test]
    fn test_attach_leaves_bindings_alone() {
        let mut graph = graph();
        let before = graph.node("store").unwrap().bindings().to_vec();

        CredentialInjector::all_nodes()
            .attach(&mut graph, "store", "kfp-creds")
            .unwrap();

        assert_eq!(graph.node("store").unwrap().bindings(), before.as_slice());
        assert_eq!(graph.node("store").unwrap().upstream(), vec!["train"]);
    }

    #[test]
    fn test_shared_credential_on_every_node() {
        let mut graph = graph();
        let count = CredentialInjector::all_nodes()
            .inject(&mut graph, "kfp-creds")
            .unwrap();

        assert_eq!(count, 4);
        for id in ["configure", "train", "store", "deploy"] {
            assert_eq!(names(&graph, id), vec!["kfp-creds"]);
        }
    }

    #[test]
    fn test_capability_scope() {
        let mut graph = graph();
        let injector =
            CredentialInjector::new(CredentialScope::capabilities(["training", "storage"]));

        assert_eq!(injector.inject(&mut graph, "wml-creds").unwrap(), 2);
        assert_eq!(names(&graph, "train"), vec!["wml-creds"]);
        assert_eq!(names(&graph, "store"), vec!["wml-creds"]);
        assert!(names(&graph, "deploy").is_empty());

        let err = injector
            .attach(&mut graph, "deploy", "wml-creds")
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::CredentialOutOfScope {
                node: "deploy".to_string(),
                credential: "wml-creds".to_string(),
            }
        );
    }

    #[test]
    fn test_default_scope_matches_nothing() {
        let mut graph = graph();
        let injector = CredentialInjector::default();

        assert_eq!(injector.inject(&mut graph, "kfp-creds").unwrap(), 0);
        assert_eq!(
            injector.attach(&mut graph, "train", "kfp-creds").unwrap_err().kind(),
            "CredentialOutOfScope"
        );
    }

    #[test]
    fn test_attach_errors() {
        let mut graph = graph();
        let injector = CredentialInjector::all_nodes();

        assert_eq!(
            injector.attach(&mut graph, "ghost", "kfp-creds").unwrap_err().kind(),
            "UnknownNode"
        );
        assert_eq!(
            injector.attach(&mut graph, "train", "KFP_CREDS").unwrap_err().kind(),
            "InvalidCredentialName"
        );
        assert!(names(&graph, "train").is_empty());
    }

    #[test]
    fn test_credentials_sorted() {
        let mut graph = graph();
        let injector = CredentialInjector::new(CredentialScope::nodes(["deploy"]));
        injector.attach(&mut graph, "deploy", "zeta").unwrap();
        injector.attach(&mut graph, "deploy", "alpha").unwrap();
        assert_eq!(names(&graph, "deploy"), vec!["alpha", "zeta"]);
    }
}
