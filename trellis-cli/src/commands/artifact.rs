//! Artifact command handlers

use anyhow::{Context, Result};
use colored::*;
use std::path::Path;
use trellis_core::domain::binding::Binding;
use trellis_core::dto::artifact::{ArtifactNode, CompiledArtifact};

/// Load an artifact from disk, rejecting unknown format versions
async fn load_artifact(path: &Path) -> Result<CompiledArtifact> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read artifact: {}", path.display()))?;
    CompiledArtifact::from_json(&json)
        .with_context(|| format!("Invalid artifact: {}", path.display()))
}

/// Print the contents of a compiled artifact
pub async fn inspect_artifact(path: &Path) -> Result<()> {
    let artifact = load_artifact(path).await?;
    print_artifact_details(&artifact);
    Ok(())
}

/// Print detailed artifact information
fn print_artifact_details(artifact: &CompiledArtifact) {
    println!("{}", "Pipeline Details:".bold());
    println!("  Name:        {}", artifact.name.bold());
    if let Some(desc) = &artifact.description {
        println!("  Description: {}", desc);
    }
    println!("  Version:     {}", artifact.version.dimmed());

    if !artifact.parameters.is_empty() {
        println!("\n{}", "Parameters:".bold());
        for parameter in &artifact.parameters {
            let required = if parameter.required { "*" } else { "" };
            println!(
                "    - {}{}: {} = {}",
                parameter.name.cyan(),
                required.red(),
                parameter.param_type.to_string().dimmed(),
                parameter.default
            );
        }
    }

    println!("\n{}", "Templates:".bold());
    for template in &artifact.templates {
        println!("    - {} {}", template.name, template.reference.to_string().dimmed());
    }

    println!("\n{}", "Nodes (execution order):".bold());
    for node in &artifact.nodes {
        print_node(node);
    }
}

/// Print one node with its bindings
fn print_node(node: &ArtifactNode) {
    println!("  {} {}", "▸".cyan(), node.id.bold());
    println!("    Template:     {}", node.template.to_string().dimmed());
    if !node.dependencies.is_empty() {
        println!("    Depends on:   {}", node.dependencies.join(", "));
    }
    if !node.credentials.is_empty() {
        let credentials: Vec<&str> = node.credentials.iter().map(|c| c.as_str()).collect();
        println!("    Credentials:  {}", credentials.join(", ").yellow());
    }
    for binding in &node.bindings {
        println!("    {} ← {}", binding.input.cyan(), describe_source(&binding.source));
    }
}

fn describe_source(binding: &Binding) -> String {
    match binding {
        Binding::Parameter { name } => format!("param {}", name),
        Binding::Literal { value } => value.to_string(),
        Binding::NodeOutput { node_id, port_name } => format!("{}.{}", node_id, port_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_describe_source() {
        assert_eq!(describe_source(&Binding::parameter("model-name")), "param model-name");
        assert_eq!(describe_source(&Binding::literal(json!("kfp-creds"))), "\"kfp-creds\"");
        assert_eq!(
            describe_source(&Binding::node_output("train", "run_uid")),
            "train.run_uid"
        );
    }

    #[tokio::test]
    async fn test_load_artifact_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();
        assert!(load_artifact(&path).await.is_err());

        tokio::fs::write(
            &path,
            r#"{"version":"other/v9","name":"x","parameters":[],"templates":[],"nodes":[]}"#,
        )
        .await
        .unwrap();
        let err = load_artifact(&path).await.unwrap_err();
        assert!(format!("{err:#}").contains("unsupported artifact version"));
    }

    #[tokio::test]
    async fn test_inspect_compiled_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.json");
        let artifact = CompiledArtifact {
            version: trellis_core::dto::artifact::ARTIFACT_VERSION.to_string(),
            name: "empty".to_string(),
            description: None,
            parameters: Vec::new(),
            templates: Vec::new(),
            nodes: Vec::new(),
        };
        tokio::fs::write(&path, artifact.to_json().unwrap()).await.unwrap();

        assert_eq!(load_artifact(&path).await.unwrap(), artifact);
        inspect_artifact(&path).await.unwrap();
    }
}
