//! Definition assembly
//!
//! Drives the parameter set, graph builder and credential injector from an
//! authored [`PipelineDefinition`] and a complete [`TemplateSet`].

use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;
use trellis_core::domain::credential::CredentialScope;
use trellis_core::domain::pipeline::PipelineDefinition;
use trellis_core::domain::template::TemplateSet;

use crate::builder::{GraphBuilder, PipelineGraph};
use crate::config::CompilerConfig;
use crate::credentials::CredentialInjector;
use crate::error::{PipelineError, Result};

/// Builds and finalizes the graph described by `definition`
///
/// Parameters are defined in order, `overrides` are supplied, steps are added
/// in order, then credentials are attached: per-step credentials to their own
/// step, pipeline-level injections to every node in their scope.
///
/// # Errors
/// Any builder or injector error, plus `UnknownTemplate` when a step's
/// template is missing from `templates`.
pub fn assemble(
    definition: &PipelineDefinition,
    templates: &TemplateSet,
    overrides: &BTreeMap<String, Value>,
    config: &CompilerConfig,
) -> Result<PipelineGraph> {
    let mut builder = GraphBuilder::new(definition.name.clone()).with_config(config.clone());
    if let Some(description) = &definition.description {
        builder = builder.with_description(description.clone());
    }

    for parameter in &definition.parameters {
        builder.define_parameter(parameter.to_parameter())?;
    }
    for (name, value) in overrides {
        builder.supply(name, value.clone())?;
    }

    for step in &definition.steps {
        let template = templates
            .get(&step.template)
            .ok_or_else(|| PipelineError::UnknownTemplate {
                node: step.id.clone(),
                template: step.template.to_string(),
            })?;
        builder.add_node(
            step.id.clone(),
            template.clone(),
            step.inputs.iter().map(|(input, b)| (input.clone(), b.clone())),
        )?;
    }

    let mut graph = builder.finalize()?;

    for step in definition.steps.iter().filter(|s| !s.credentials.is_empty()) {
        let injector = CredentialInjector::new(CredentialScope::nodes([step.id.as_str()]));
        for credential in &step.credentials {
            injector.attach(&mut graph, &step.id, credential)?;
        }
    }

    for injection in &definition.credentials {
        let count = CredentialInjector::new(injection.scope.clone())
            .inject(&mut graph, &injection.name)?;
        debug!(credential = %injection.name, nodes = count, "applied pipeline credential");
    }

    Ok(graph)
}

/// Coerces `key=value` text overrides into typed parameter values
///
/// # Errors
/// `UnknownParameter` for undeclared names, `TypeMismatch` when the text
/// cannot be read as the parameter's type.
pub fn coerce_overrides(
    definition: &PipelineDefinition,
    pairs: &[(String, String)],
) -> Result<BTreeMap<String, Value>> {
    let mut overrides = BTreeMap::new();
    for (name, raw) in pairs {
        let parameter =
            definition
                .parameter(name)
                .ok_or_else(|| PipelineError::UnknownParameter {
                    name: name.clone(),
                })?;
        let value = parameter
            .param_type
            .parse_value(raw)
            .map_err(|e| PipelineError::TypeMismatch {
                location: format!("value of parameter '{name}'"),
                expected: e.expected,
                found: format!("'{}'", e.raw),
            })?;
        overrides.insert(name.clone(), value);
    }
    Ok(overrides)
}
