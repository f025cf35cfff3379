//! Template resolver seam

use async_trait::async_trait;
use std::collections::HashMap;
use trellis_core::domain::template::{Template, TemplateRef};

use crate::error::{CatalogError, Result};

/// Resolves a template reference into a template
///
/// Implementations must set the returned template's `reference` to the
/// reference that was asked for.
#[async_trait]
pub trait TemplateResolver: Send + Sync {
    /// Resolves one template
    ///
    /// # Arguments
    /// * `reference` - Catalog name or URL of the template
    async fn resolve(&self, reference: &TemplateRef) -> Result<Template>;
}

/// In-memory resolver over a fixed set of templates
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    templates: HashMap<TemplateRef, Template>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a template under its own reference
    pub fn with_template(mut self, template: Template) -> Self {
        self.templates.insert(template.reference.clone(), template);
        self
    }
}

#[async_trait]
impl TemplateResolver for StaticResolver {
    async fn resolve(&self, reference: &TemplateRef) -> Result<Template> {
        self.templates
            .get(reference)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(reference.to_string()))
    }
}

/// Checks a freshly loaded template and stamps it with its reference
pub(crate) fn finish(reference: &TemplateRef, mut template: Template) -> Result<Template> {
    if let Some(port) = template.duplicate_port() {
        return Err(CatalogError::invalid(
            reference.as_str(),
            format!("port '{port}' is declared twice"),
        ));
    }
    if let Some(port) = template
        .inputs
        .iter()
        .find(|p| p.default.as_ref().is_some_and(|d| !p.port_type.accepts(d)))
    {
        return Err(CatalogError::invalid(
            reference.as_str(),
            format!("default of port '{}' is not a valid {}", port.name, port.port_type),
        ));
    }
    if template.name.trim().is_empty() {
        return Err(CatalogError::invalid(reference.as_str(), "template has no name"));
    }
    template.reference = reference.clone();
    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::domain::template::InputPort;
    use trellis_core::domain::types::PortType;

    #[tokio::test]
    async fn test_static_resolver() {
        let resolver = StaticResolver::new().with_template(Template::new("train", "Train"));

        let template = resolver.resolve(&TemplateRef::new("train")).await.unwrap();
        assert_eq!(template.name, "Train");

        let err = resolver.resolve(&TemplateRef::new("deploy")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_finish_rejects_duplicate_ports() {
        let template = Template::new("", "Store")
            .with_input(InputPort::new("model", PortType::String))
            .with_input(InputPort::new("model", PortType::String));

        let err = finish(&TemplateRef::new("store"), template).unwrap_err();
        assert!(matches!(err, CatalogError::Invalid { ref reason, .. } if reason.contains("model")));
    }

    #[test]
    fn test_finish_rejects_ill_typed_default() {
        let template = Template::new("", "Train")
            .with_input(InputPort::new("epochs", PortType::Integer).with_default("many"));

        let err = finish(&TemplateRef::new("train"), template).unwrap_err();
        assert!(
            matches!(err, CatalogError::Invalid { ref reason, .. } if reason.contains("epochs")),
            "{err}"
        );

        let template = Template::new("", "Train")
            .with_input(InputPort::new("epochs", PortType::Integer).with_default(10));
        assert!(finish(&TemplateRef::new("train"), template).is_ok());
    }

    #[test]
    fn test_finish_sets_reference() {
        let template = finish(&TemplateRef::new("watson/store"), Template::new("", "Store")).unwrap();
        assert_eq!(template.reference.as_str(), "watson/store");
    }
}
