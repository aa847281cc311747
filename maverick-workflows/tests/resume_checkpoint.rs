//! S4: `step_a -> checkpoint cp1 -> step_b`. The first run fails at
//! `step_b`; `resume` against the same checkpoint store replays `step_a`
//! without re-invoking its action and only runs `step_b`.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use futures::FutureExt;
use maverick_checkpoint::FileCheckpointStore;
use maverick_core::{MaverickError, TracingLogger};
use maverick_events::NullProgressSink;
use maverick_workflows::{Engine, Registry};
use serde_json::Value;

const WORKFLOW_YAML: &str = r#"
version: "1.0"
name: staged
inputs: {}
steps:
  - name: step_a
    type: checkpoint
    checkpoint_id: cp1
    inner:
      name: step_a
      type: python
      action: record_a
  - name: step_b
    type: python
    action: record_b
outputs:
  b: "${{ steps.step_b.output }}"
"#;

#[tokio::test]
async fn resume_replays_step_a_without_rerunning_its_action() {
    let a_calls = Arc::new(AtomicUsize::new(0));
    let b_calls = Arc::new(AtomicUsize::new(0));
    let b_should_fail = Arc::new(std::sync::atomic::AtomicBool::new(true));

    let registry = {
        let a_calls = a_calls.clone();
        let b_calls = b_calls.clone();
        let b_should_fail = b_should_fail.clone();
        Arc::new(
            Registry::builder()
                .action("record_a", move |_args, _kwargs| {
                    let a_calls = a_calls.clone();
                    async move {
                        a_calls.fetch_add(1, Ordering::SeqCst);
                        Ok(Value::String("a-done".to_string()))
                    }
                    .boxed()
                })
                .action("record_b", move |_args, _kwargs| {
                    let b_calls = b_calls.clone();
                    let b_should_fail = b_should_fail.clone();
                    async move {
                        b_calls.fetch_add(1, Ordering::SeqCst);
                        if b_should_fail.load(Ordering::SeqCst) {
                            Err(MaverickError::Internal {
                                message: "step_b not ready yet".to_string(),
                            })
                        } else {
                            Ok(Value::String("b-done".to_string()))
                        }
                    }
                    .boxed()
                })
                .build(),
        )
    };

    let workflow = maverick_workflows::loader::parse(WORKFLOW_YAML, "staged.yaml").unwrap();

    let checkpoints_dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileCheckpointStore::new(checkpoints_dir.path()).await.unwrap());

    let engine = Engine::new(
        registry,
        store.clone(),
        Arc::new(NullProgressSink),
        Arc::new(TracingLogger),
        None,
        None,
    );

    let first = engine.run(&workflow, serde_json::Map::new()).await.unwrap();
    assert!(!first.success);
    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    assert_eq!(b_calls.load(Ordering::SeqCst), 1);

    b_should_fail.store(false, Ordering::SeqCst);
    let second = engine.resume(&workflow, serde_json::Map::new()).await.unwrap();

    assert!(second.success);
    // step_a's action must not run again; only step_b was re-dispatched.
    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    assert_eq!(b_calls.load(Ordering::SeqCst), 2);
    assert_eq!(second.final_output, serde_json::json!({ "b": "b-done" }));
}
