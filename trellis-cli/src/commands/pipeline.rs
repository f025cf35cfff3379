//! Pipeline command handlers
//!
//! `compile` and `validate` share one path: load the definition, resolve its
//! templates from the catalog, assemble the graph and compile it. Only
//! `compile` writes the artifact.

use anyhow::{Context, Result, anyhow, bail};
use clap::Args;
use colored::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use trellis_catalog::{DirectoryResolver, TemplateCache};
use trellis_compiler::{Compiler, CompilerConfig, PipelineError, assemble, coerce_overrides};
use trellis_core::domain::credential::CredentialScope;
use trellis_core::domain::pipeline::PipelineDefinition;
use trellis_core::dto::artifact::CompiledArtifact;

use crate::config::Config;

/// Arguments shared by `compile` and `validate`
#[derive(Args, Debug, Clone)]
pub struct DefinitionArgs {
    /// Pipeline definition (.lua or .json)
    pub definition: PathBuf,

    /// Parameter values as key=value pairs (e.g. -p model-name=mnist)
    #[arg(short, long = "param", value_parser = parse_key_val)]
    pub params: Vec<(String, String)>,

    /// Credential attached to every node in --credential-scope
    #[arg(short, long = "credential")]
    pub credentials: Vec<String>,

    /// Nodes receiving --credential: "all", "capabilities:a,b" or "nodes:a,b"
    #[arg(long)]
    pub credential_scope: Option<CredentialScope>,
}

/// Parse a single key=value pair
fn parse_key_val(s: &str) -> Result<(String, String)> {
    let pos = s
        .find('=')
        .ok_or_else(|| anyhow!("invalid KEY=value: no `=` found in `{}`", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

/// Formats a pipeline error with its kind, e.g. `UnresolvedPort: ...`
fn report(err: PipelineError) -> anyhow::Error {
    anyhow!("{}: {}", err.root_cause().kind(), err)
}

/// Load a definition from a `.lua` script or a `.json` document
async fn load_definition(path: &Path) -> Result<PipelineDefinition> {
    let source = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read definition file: {}", path.display()))?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("lua") => trellis_lua::parse_pipeline_definition(&source)
            .with_context(|| format!("Failed to parse Lua definition: {}", path.display())),
        Some("json") => serde_json::from_str(&source)
            .with_context(|| format!("Failed to parse JSON definition: {}", path.display())),
        _ => bail!(
            "Unsupported definition file {}: expected a .lua or .json extension",
            path.display()
        ),
    }
}

/// Compiler configuration for one invocation
fn compiler_config(args: &DefinitionArgs, config: &Config) -> Result<CompilerConfig> {
    let mut compiler_config = config.compiler_config();
    for credential in &args.credentials {
        compiler_config = compiler_config.with_credential(credential).map_err(report)?;
    }
    if let Some(scope) = &args.credential_scope {
        compiler_config = compiler_config.with_credential_scope(scope.clone());
    }
    compiler_config.validate().map_err(report)?;
    Ok(compiler_config)
}

/// Load, resolve, assemble and compile a definition
async fn build_artifact(args: &DefinitionArgs, config: &Config) -> Result<CompiledArtifact> {
    let definition = load_definition(&args.definition).await?;
    let compiler_config = compiler_config(args, config)?;
    let overrides = coerce_overrides(&definition, &args.params).map_err(report)?;

    let references = definition.template_refs();
    debug!(
        templates = references.len(),
        catalog = %config.templates.display(),
        "resolving templates"
    );
    let cache = TemplateCache::new(Arc::new(DirectoryResolver::new(&config.templates)));
    let templates = cache
        .resolve_all(references)
        .await
        .context("Failed to resolve templates")?;

    let graph = assemble(&definition, &templates, &overrides, &compiler_config).map_err(report)?;
    Compiler::new(compiler_config)
        .compile(&graph)
        .map_err(report)
}

/// Write `contents` to a uniquely named sibling file, then rename it into place
///
/// Concurrent writers to the same path never share a temporary file; the
/// last rename wins and readers only ever see a complete artifact.
async fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    tokio::fs::create_dir_all(&parent)
        .await
        .with_context(|| format!("Failed to create directory {}", parent.display()))?;

    let path = path.to_path_buf();
    let contents = contents.to_owned();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut tmp = tempfile::Builder::new()
            .prefix(".trellis-")
            .suffix(".tmp")
            .tempfile_in(&parent)
            .with_context(|| format!("Failed to create a temporary file in {}", parent.display()))?;
        tmp.write_all(contents.as_bytes())
            .with_context(|| format!("Failed to write {}", tmp.path().display()))?;
        tmp.persist(&path)
            .map_err(|err| err.error)
            .with_context(|| format!("Failed to move artifact to {}", path.display()))?;
        Ok(())
    })
    .await
    .context("Artifact writer task failed")?
}

/// Compile a definition and write the artifact
///
/// Nothing is written unless compilation succeeds.
pub async fn compile_pipeline(args: &DefinitionArgs, output: &Path, config: &Config) -> Result<()> {
    let artifact = build_artifact(args, config).await?;
    let json = artifact
        .to_json()
        .map_err(|e| report(PipelineError::from(e).compilation()))?;
    write_atomic(output, &json).await?;

    info!(pipeline = %artifact.name, output = %output.display(), "artifact written");

    println!("{}", "✓ Pipeline compiled successfully!".green().bold());
    println!("  Name:      {}", artifact.name.bold());
    println!("  Nodes:     {}", artifact.node_ids().join(" → ").cyan());
    println!("  Templates: {}", artifact.templates.len().to_string().dimmed());
    println!("  Output:    {}", output.display().to_string().dimmed());

    Ok(())
}

/// Validate a definition without writing anything
pub async fn validate_pipeline(args: &DefinitionArgs, config: &Config) -> Result<()> {
    let artifact = build_artifact(args, config).await?;

    println!("{}", "✓ Pipeline is valid".green().bold());
    println!("  Name:  {}", artifact.name.bold());
    println!("  Order: {}", artifact.node_ids().join(" → ").cyan());

    let unset: Vec<&str> = artifact
        .parameters
        .iter()
        .filter(|p| p.default.is_null())
        .map(|p| p.name.as_str())
        .collect();
    if !unset.is_empty() {
        println!("  {} {}", "Unset parameters:".yellow(), unset.join(", "));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_compiler::Strictness;

    fn demo_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../demos/watson")
    }

    fn demo_config() -> Config {
        Config {
            templates: demo_dir().join("templates"),
            strictness: Strictness::Permissive,
        }
    }

    fn args(definition: PathBuf) -> DefinitionArgs {
        DefinitionArgs {
            definition,
            params: Vec::new(),
            credentials: Vec::new(),
            credential_scope: None,
        }
    }

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("model-name=mnist").unwrap(),
            ("model-name".to_string(), "mnist".to_string())
        );
        assert_eq!(
            parse_key_val("execution-command=python3 run.py --rate=0.1").unwrap(),
            (
                "execution-command".to_string(),
                "python3 run.py --rate=0.1".to_string()
            )
        );
        assert_eq!(parse_key_val("token=").unwrap().1, "");
        assert!(parse_key_val("no-separator").is_err());
    }

    #[derive(clap::Parser)]
    struct DefinitionCli {
        #[command(flatten)]
        args: DefinitionArgs,
    }

    fn parse_args(extra: &[&str]) -> Result<DefinitionArgs, clap::Error> {
        use clap::Parser;
        let argv = ["trellis", "pipeline.lua"].iter().chain(extra).copied();
        DefinitionCli::try_parse_from(argv).map(|cli| cli.args)
    }

    #[test]
    fn test_credential_scope_argument() {
        let scope = |value: &str| parse_args(&["--credential-scope", value]).map(|a| a.credential_scope);

        assert_eq!(scope("all").unwrap(), Some(CredentialScope::AllNodes));
        assert_eq!(
            scope("capabilities:training, storage").unwrap(),
            Some(CredentialScope::capabilities(["training", "storage"]))
        );
        assert_eq!(
            scope("node:train").unwrap(),
            Some(CredentialScope::nodes(["train"]))
        );
        assert!(scope("nodes:").is_err());
        assert!(scope("everything").is_err());
        assert_eq!(parse_args(&[]).unwrap().credential_scope, None);
    }

    #[tokio::test]
    async fn test_load_definition_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let json = dir.path().join("p.json");
        tokio::fs::write(
            &json,
            r#"{ "name": "p", "steps": [ { "id": "a", "template": "t" } ] }"#,
        )
        .await
        .unwrap();
        assert_eq!(load_definition(&json).await.unwrap().name, "p");

        let lua = dir.path().join("p.lua");
        tokio::fs::write(
            &lua,
            r#"return pipeline.define { name = "q", steps = { { id = "a", template = "t" } } }"#,
        )
        .await
        .unwrap();
        assert_eq!(load_definition(&lua).await.unwrap().name, "q");

        let yaml = dir.path().join("p.yaml");
        tokio::fs::write(&yaml, "name: p").await.unwrap();
        assert!(load_definition(&yaml).await.is_err());

        assert!(load_definition(&dir.path().join("missing.lua")).await.is_err());
    }

    #[tokio::test]
    async fn test_compile_demo_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out").join("watson.json");

        let mut args = args(demo_dir().join("pipeline.lua"));
        args.params = vec![("model-name".to_string(), "mnist-v2".to_string())];

        compile_pipeline(&args, &output, &demo_config()).await.unwrap();

        let json = tokio::fs::read_to_string(&output).await.unwrap();
        let artifact = CompiledArtifact::from_json(&json).unwrap();
        assert_eq!(artifact.node_ids(), vec!["configure", "train", "store", "deploy"]);
        let model_name = artifact
            .parameters
            .iter()
            .find(|p| p.name == "model-name")
            .unwrap();
        assert_eq!(model_name.default, serde_json::json!("mnist-v2"));
        for id in ["train", "store", "deploy"] {
            let node = artifact.node(id).unwrap();
            assert_eq!(node.credentials.len(), 1);
            assert_eq!(node.credentials[0].as_str(), "kfp-creds");
        }
        assert!(artifact.node("configure").unwrap().credentials.is_empty());

        assert_eq!(std::fs::read_dir(output.parent().unwrap()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_writes_to_one_path() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out").join("artifact.json");
        let first = "{\"writer\": 1}\n".repeat(2000);
        let second = "{\"writer\": 2}\n".repeat(2000);

        let (a, b) = tokio::join!(write_atomic(&output, &first), write_atomic(&output, &second));
        a.unwrap();
        b.unwrap();

        let written = tokio::fs::read_to_string(&output).await.unwrap();
        assert!(written == first || written == second);
        let leftovers: Vec<_> = std::fs::read_dir(output.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("artifact.json")]);
    }

    #[tokio::test]
    async fn test_compile_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.json");
        let second = dir.path().join("second.json");
        let args = args(demo_dir().join("pipeline.lua"));

        compile_pipeline(&args, &first, &demo_config()).await.unwrap();
        compile_pipeline(&args, &second, &demo_config()).await.unwrap();

        assert_eq!(
            tokio::fs::read(&first).await.unwrap(),
            tokio::fs::read(&second).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_failed_compile_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let definition = dir.path().join("broken.lua");
        tokio::fs::write(
            &definition,
            r#"
            return pipeline.define {
                name = "broken",
                steps = {
                    { id = "train", template = "ibm/watson/train", inputs = {
                        config = pipeline.output("configure", "output"),
                        train_code = "tf-model.zip",
                        execution_command = "python3 run.py",
                    }},
                },
            }
            "#,
        )
        .await
        .unwrap();
        let output = dir.path().join("broken.json");

        let err = compile_pipeline(&args(definition), &output, &demo_config())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("UnresolvedPort:"));
        assert!(err.to_string().contains("'configure'"));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_validate_reports_unknown_override() {
        let mut args = args(demo_dir().join("pipeline.lua"));
        args.params = vec![("learning-rate".to_string(), "0.1".to_string())];

        let err = validate_pipeline(&args, &demo_config()).await.unwrap_err();
        assert!(err.to_string().starts_with("UnknownParameter:"));
    }

    #[tokio::test]
    async fn test_strict_rejects_unbound_demo_parameters() {
        let config = Config {
            strictness: Strictness::Strict,
            ..demo_config()
        };
        let err = validate_pipeline(&args(demo_dir().join("pipeline.lua")), &config)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("DanglingParameter:"));
        assert!(err.to_string().contains("'framework'"));
    }

    #[tokio::test]
    async fn test_validate_missing_template() {
        let empty = tempfile::tempdir().unwrap();
        let config = Config {
            templates: empty.path().to_path_buf(),
            strictness: Strictness::Permissive,
        };
        let err = validate_pipeline(&args(demo_dir().join("pipeline.lua")), &config)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to resolve templates"));
    }

    #[tokio::test]
    async fn test_credential_requires_scope() {
        let mut args = args(demo_dir().join("pipeline.lua"));
        args.credentials = vec!["audit-creds".to_string()];

        let err = validate_pipeline(&args, &demo_config()).await.unwrap_err();
        assert!(err.to_string().starts_with("EmptyCredentialScope:"));

        args.credential_scope = Some(CredentialScope::AllNodes);
        validate_pipeline(&args, &demo_config()).await.unwrap();
    }
}
