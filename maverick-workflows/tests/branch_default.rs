//! S3: a `branch` step whose options are ordered by specificity,
//! falling through to a catch-all `when: true` default.

use std::sync::Arc;

use futures::FutureExt;
use maverick_checkpoint::FileCheckpointStore;
use maverick_core::TracingLogger;
use maverick_events::NullProgressSink;
use maverick_workflows::{Engine, Registry};
use serde_json::Value;

fn workflow_yaml() -> &'static str {
    r#"
version: "1.0"
name: deploy
inputs:
  env:
    type: string
    default: "staging"
steps:
  - name: select_target
    type: branch
    options:
      - when: "inputs.env == 'prod'"
        step:
          name: deploy_prod
          type: python
          action: deploy
          args: ["prod"]
      - when: "inputs.env == 'staging'"
        step:
          name: deploy_staging
          type: python
          action: deploy
          args: ["staging"]
      - when: "true"
        step:
          name: deploy_default
          type: python
          action: deploy
          args: ["sandbox"]
outputs:
  target: "${{ steps.select_target.output.selected_step_name }}"
"#
}

async fn engine() -> Engine {
    let registry = Arc::new(
        Registry::builder()
            .action("deploy", |args, _kwargs| {
                async move {
                    let target = args.first().and_then(Value::as_str).unwrap_or_default();
                    Ok(Value::String(target.to_string()))
                }
                .boxed()
            })
            .build(),
    );
    let dir = tempfile::tempdir().unwrap();
    let store = FileCheckpointStore::new(dir.path()).await.unwrap();
    Engine::new(
        registry,
        Arc::new(store),
        Arc::new(NullProgressSink),
        Arc::new(TracingLogger),
        None,
        None,
    )
}

#[tokio::test]
async fn branch_selects_matching_env() {
    let workflow = maverick_workflows::loader::parse(workflow_yaml(), "deploy.yaml").unwrap();
    let engine = engine().await;

    let mut inputs = serde_json::Map::new();
    inputs.insert("env".to_string(), Value::String("prod".to_string()));
    let result = engine.run(&workflow, inputs).await.unwrap();

    assert!(result.success);
    assert_eq!(
        result.final_output,
        serde_json::json!({ "target": "deploy_prod" })
    );
}

#[tokio::test]
async fn branch_falls_through_to_default_option() {
    let workflow = maverick_workflows::loader::parse(workflow_yaml(), "deploy.yaml").unwrap();
    let engine = engine().await;

    let mut inputs = serde_json::Map::new();
    inputs.insert("env".to_string(), Value::String("canary".to_string()));
    let result = engine.run(&workflow, inputs).await.unwrap();

    assert!(result.success);
    assert_eq!(
        result.final_output,
        serde_json::json!({ "target": "deploy_default" })
    );
}
