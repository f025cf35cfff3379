//! Shared fixtures: the configure / train / store / deploy training pipeline

use serde_json::json;
use std::sync::Arc;
use trellis_core::domain::binding::Binding;
use trellis_core::domain::template::{InputPort, OutputPort, Template, TemplateSet};
use trellis_core::domain::types::PortType;

use crate::builder::GraphBuilder;
use crate::config::CompilerConfig;

pub fn configure_template() -> Template {
    Template::new("ibm/commons/config", "Create Secret - Kubernetes Cluster")
        .with_input(InputPort::new("token", PortType::String))
        .with_input(InputPort::new("url", PortType::named("URL")))
        .with_input(InputPort::new("name", PortType::String).with_default("kfp-creds"))
        .with_output(OutputPort::new("output", PortType::String))
        .with_capability("configuration")
}

pub fn train_template() -> Template {
    Template::new("ibm/watson/train", "Train Model - Watson Machine Learning")
        .with_input(InputPort::new("config", PortType::String))
        .with_input(InputPort::new("train_code", PortType::String))
        .with_input(InputPort::new("execution_command", PortType::String))
        .with_input(InputPort::new("framework", PortType::String).with_default("tensorflow"))
        .with_input(InputPort::new("framework_version", PortType::String).optional())
        .with_output(OutputPort::new("run_uid", PortType::String))
        .with_capability("training")
}

pub fn store_template() -> Template {
    Template::new("ibm/watson/store", "Store Model - Watson Machine Learning")
        .with_input(InputPort::new("run_uid", PortType::String))
        .with_input(InputPort::new("model_name", PortType::String))
        .with_output(OutputPort::new("model_uid", PortType::String))
        .with_capability("storage")
}

pub fn deploy_template() -> Template {
    Template::new("ibm/watson/deploy", "Deploy Model - Watson Machine Learning")
        .with_input(InputPort::new("model_uid", PortType::String))
        .with_input(InputPort::new("model_name", PortType::String))
        .with_input(InputPort::new("scoring_payload", PortType::String))
        .with_output(OutputPort::new("scoring_endpoint", PortType::String))
        .with_capability("deployment")
}

pub fn templates() -> TemplateSet {
    vec![
        configure_template(),
        train_template(),
        store_template(),
        deploy_template(),
    ]
    .into_iter()
    .collect()
}

/// Builder with the pipeline parameters declared and no nodes
pub fn parameters_only(config: CompilerConfig) -> GraphBuilder {
    let mut builder = GraphBuilder::new("KFP on WML training")
        .with_description("Kubeflow pipelines running on WML performing tensorflow image recognition.")
        .with_config(config);

    builder.define("github-token", PortType::String, Some(json!(""))).unwrap();
    builder
        .define(
            "config-file-url",
            PortType::named("URL"),
            Some(json!("https://raw.githubusercontent.com/user/repository/branch/creds.ini")),
        )
        .unwrap();
    builder.define("train-code", PortType::String, Some(json!("tf-model.zip"))).unwrap();
    builder
        .define(
            "execution-command",
            PortType::String,
            Some(json!("python3 convolutional_network.py --learningRate 0.001")),
        )
        .unwrap();
    builder.define("model-name", PortType::String, Some(json!("wml-tensorflow-mnist"))).unwrap();
    builder
        .define("scoring-payload", PortType::String, Some(json!("tf-mnist-test-payload.json")))
        .unwrap();
    builder
}

/// Builder holding the full four-node pipeline
pub fn pipeline(config: CompilerConfig) -> GraphBuilder {
    let mut builder = parameters_only(config);

    let configure = builder
        .add_node(
            "configure",
            Arc::new(configure_template()),
            [
                ("token", Binding::parameter("github-token")),
                ("url", Binding::parameter("config-file-url")),
            ],
        )
        .unwrap();
    let train = builder
        .add_node(
            "train",
            Arc::new(train_template()),
            [
                ("config", configure.output("output")),
                ("train_code", Binding::parameter("train-code")),
                ("execution_command", Binding::parameter("execution-command")),
            ],
        )
        .unwrap();
    let store = builder
        .add_node(
            "store",
            Arc::new(store_template()),
            [
                ("run_uid", train.output("run_uid")),
                ("model_name", Binding::parameter("model-name")),
            ],
        )
        .unwrap();
    builder
        .add_node(
            "deploy",
            Arc::new(deploy_template()),
            [
                ("model_uid", store.output("model_uid")),
                ("model_name", Binding::parameter("model-name")),
                ("scoring_payload", Binding::parameter("scoring-payload")),
            ],
        )
        .unwrap();
    builder
}
