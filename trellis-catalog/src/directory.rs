//! Local directory catalog
//!
//! Templates are JSON descriptor files under a root directory. A reference
//! `watson/train` is looked up as `<root>/watson/train.json`, then as
//! `<root>/watson/train/component.json`. URL references use the path after
//! the host, with any `.yaml`, `.yml` or `.json` extension dropped, so a
//! mirrored registry can be resolved offline.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;
use trellis_core::domain::template::{Template, TemplateRef};

use crate::error::{CatalogError, Result};
use crate::resolver::{finish, TemplateResolver};

const DESCRIPTOR_FILE: &str = "component.json";

/// Resolves templates from descriptor files under a root directory
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    root: PathBuf,
}

impl DirectoryResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Candidate descriptor paths for a reference, in lookup order
    pub fn candidates(&self, reference: &TemplateRef) -> Result<Vec<PathBuf>> {
        let relative = relative_path(reference)?;
        let base = self.root.join(&relative);
        let mut flat = base.clone().into_os_string();
        flat.push(".json");
        Ok(vec![PathBuf::from(flat), base.join(DESCRIPTOR_FILE)])
    }
}

/// Relative catalog path of a reference, without extension
fn relative_path(reference: &TemplateRef) -> Result<PathBuf> {
    let raw = reference.as_str();
    let path = if reference.is_url() {
        let without_scheme = raw.split_once("://").map(|(_, rest)| rest).unwrap_or(raw);
        without_scheme
            .split_once('/')
            .map(|(_, path)| path)
            .unwrap_or_default()
    } else {
        raw
    };
    let path = path.split(['?', '#']).next().unwrap_or_default();

    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Err(CatalogError::invalid(raw, "reference has no path"));
    }
    if segments.iter().any(|s| *s == ".." || *s == "." || s.contains('\\')) {
        return Err(CatalogError::invalid(raw, "reference must stay inside the catalog"));
    }

    if let Some(last) = segments.last_mut() {
        let file: &str = *last;
        for ext in [".yaml", ".yml", ".json"] {
            if let Some(stem) = file.strip_suffix(ext) {
                *last = stem;
                break;
            }
        }
        if last.is_empty() {
            return Err(CatalogError::invalid(raw, "reference has an empty file name"));
        }
    }

    Ok(segments.iter().collect())
}

#[async_trait]
impl TemplateResolver for DirectoryResolver {
    async fn resolve(&self, reference: &TemplateRef) -> Result<Template> {
        for path in self.candidates(reference)? {
            let contents = match tokio::fs::read_to_string(&path).await {
                Ok(contents) => contents,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(source) => {
                    return Err(CatalogError::Io {
                        reference: reference.to_string(),
                        path,
                        source,
                    });
                }
            };

            debug!(template = %reference, path = %path.display(), "loaded template descriptor");
            let template: Template =
                serde_json::from_str(&contents).map_err(|source| CatalogError::Parse {
                    reference: reference.to_string(),
                    source,
                })?;
            return finish(reference, template);
        }

        Err(CatalogError::NotFound(reference.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, path: &str, contents: &str) {
        let full = dir.path().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, contents).unwrap();
    }

    fn descriptor(name: &str) -> String {
        json!({
            "name": name,
            "inputs": [{ "name": "run_uid", "type": "String" }],
            "outputs": [{ "name": "model_uid", "type": "String" }],
            "capabilities": ["storage"]
        })
        .to_string()
    }

    #[test]
    fn test_relative_paths() {
        let path = |s: &str| relative_path(&TemplateRef::new(s)).map(|p| p.to_string_lossy().into_owned());

        assert_eq!(path("watson/train").unwrap(), "watson/train");
        assert_eq!(
            path("https://raw.githubusercontent.com/kubeflow/pipelines/master/components/ibm-components/watson/train/component.yaml")
                .unwrap(),
            "kubeflow/pipelines/master/components/ibm-components/watson/train/component"
        );
        assert_eq!(path("store.json?raw=1").unwrap(), "store");
        assert!(path("../secrets").is_err());
        assert!(path("https://example.com").is_err());
        assert!(path("").is_err());
    }

    #[tokio::test]
    async fn test_resolve_flat_file() {
        let dir = TempDir::new().unwrap();
        write(&dir, "watson/store.json", &descriptor("Store Model"));

        let resolver = DirectoryResolver::new(dir.path());
        let template = resolver.resolve(&TemplateRef::new("watson/store")).await.unwrap();

        assert_eq!(template.name, "Store Model");
        assert_eq!(template.reference.as_str(), "watson/store");
        assert!(template.has_capability("storage"));
    }

    #[tokio::test]
    async fn test_resolve_component_directory_from_url() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "kubeflow/components/watson/deploy/component.json",
            &descriptor("Deploy Model"),
        );

        let reference = TemplateRef::new("https://example.com/kubeflow/components/watson/deploy");
        let template = DirectoryResolver::new(dir.path())
            .resolve(&reference)
            .await
            .unwrap();

        assert_eq!(template.name, "Deploy Model");
        assert_eq!(template.reference, reference);
    }

    #[tokio::test]
    async fn test_resolve_errors() {
        let dir = TempDir::new().unwrap();
        write(&dir, "broken.json", "{ not json");
        write(
            &dir,
            "dup.json",
            &json!({
                "name": "Dup",
                "inputs": [{ "name": "a" }, { "name": "a" }]
            })
            .to_string(),
        );
        let resolver = DirectoryResolver::new(dir.path());

        let err = resolver.resolve(&TemplateRef::new("missing")).await.unwrap_err();
        assert!(err.is_not_found());

        let err = resolver.resolve(&TemplateRef::new("broken")).await.unwrap_err();
        assert!(matches!(err, CatalogError::Parse { .. }));

        let err = resolver.resolve(&TemplateRef::new("dup")).await.unwrap_err();
        assert!(matches!(err, CatalogError::Invalid { .. }));
    }
}
