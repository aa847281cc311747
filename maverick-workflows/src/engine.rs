//! ABOUTME: Workflow Engine (C5): orchestrates the step sequence, rollbacks, checkpoints, events
//! ABOUTME: One Engine per run

use std::collections::HashSet;
use std::sync::Arc;

use maverick_checkpoint::{CheckpointData, CheckpointStore};
use maverick_checkpoint::SerializedStepResult;
use maverick_config::ValidationConfig;
use maverick_core::Logger;
use maverick_events::{ProgressSink, WorkflowEvent};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::context::{RollbackError, StepResult, WorkflowContext, WorkflowResult};
use crate::error::{Result, WorkflowError};
use crate::executor::{self, ExecutorDeps};
use crate::hashing::compute_inputs_hash;
use crate::loader::Loader;
use crate::registry::Registry;
use crate::steps::{InputType, StepKind, WorkflowFile};

/// Orchestrates one workflow run. Holds every collaborator the
/// executor needs but does not itself retain any per-run state — that lives
/// in the `WorkflowContext` built inside `run`/`resume`.
pub struct Engine {
    registry: Arc<Registry>,
    checkpoint_store: Arc<dyn CheckpointStore>,
    sink: Arc<dyn ProgressSink>,
    logger: Arc<dyn Logger>,
    validation_config: Option<Arc<ValidationConfig>>,
    loader: Option<Arc<Loader>>,
    cancellation: CancellationToken,
}

impl Engine {
    #[must_use]
    pub fn new(
        registry: Arc<Registry>,
        checkpoint_store: Arc<dyn CheckpointStore>,
        sink: Arc<dyn ProgressSink>,
        logger: Arc<dyn Logger>,
        validation_config: Option<Arc<ValidationConfig>>,
        loader: Option<Arc<Loader>>,
    ) -> Self {
        Self {
            registry,
            checkpoint_store,
            sink,
            logger,
            validation_config,
            loader,
            cancellation: CancellationToken::new(),
        }
    }

    /// Wires an external `CancellationToken` into this engine. Checked
    /// between steps; a cancelled token stops the sequence the same way a
    /// step failure does, then still drains rollbacks.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    fn deps(&self) -> ExecutorDeps {
        ExecutorDeps {
            registry: self.registry.clone(),
            validation_config: self.validation_config.clone(),
            loader: self.loader.clone(),
            logger: self.logger.clone(),
        }
    }

    /// Coerces inputs, initializes context, emits `WorkflowStarted`, then
    /// iterates `steps` in declared order.
    pub async fn run(
        &self,
        workflow: &WorkflowFile,
        raw_inputs: serde_json::Map<String, Value>,
    ) -> Result<WorkflowResult> {
        let inputs = coerce_inputs(workflow, raw_inputs)?;
        let mut ctx = WorkflowContext::new(&workflow.name, inputs);
        self.execute_from(workflow, &mut ctx, &HashSet::new()).await
    }

    /// Loads the latest checkpoint; fatal `InputMismatch` on drift;
    /// otherwise replays completed steps and continues past the checkpoint
    /// boundary.
    pub async fn resume(
        &self,
        workflow: &WorkflowFile,
        raw_inputs: serde_json::Map<String, Value>,
    ) -> Result<WorkflowResult> {
        let inputs = coerce_inputs(workflow, raw_inputs)?;
        let current_hash = compute_inputs_hash(&Value::Object(inputs.clone()));

        let checkpoint = self
            .checkpoint_store
            .load_latest(&workflow.name)
            .await?
            .ok_or_else(|| WorkflowError::NoCheckpoint {
                workflow: workflow.name.clone(),
            })?;

        if checkpoint.inputs_hash != current_hash {
            return Err(WorkflowError::InputMismatch {
                workflow: workflow.name.clone(),
                checkpoint_hash: checkpoint.inputs_hash,
                current_hash,
            });
        }

        let mut ctx = WorkflowContext::new(&workflow.name, inputs);
        let mut completed = HashSet::new();
        for record in &checkpoint.step_results {
            ctx.record(StepResult::from_checkpoint_record(record));
            completed.insert(record.name.clone());
        }

        self.execute_from(workflow, &mut ctx, &completed).await
    }

    async fn execute_from(
        &self,
        workflow: &WorkflowFile,
        ctx: &mut WorkflowContext,
        already_done: &HashSet<String>,
    ) -> Result<WorkflowResult> {
        let names: Vec<String> = workflow.steps.iter().map(|s| s.name.clone()).collect();
        WorkflowContext::check_no_duplicates(&names)?;

        self.sink.emit(WorkflowEvent::WorkflowStarted {
            workflow_name: workflow.name.clone(),
            run_id: ctx.run_id.to_string(),
        });

        let deps = self.deps();
        let mut aborted = false;

        for step in &workflow.steps {
            if already_done.contains(&step.name) {
                continue;
            }

            if self.cancellation.is_cancelled() {
                self.logger
                    .warn(&format!("workflow '{}' cancelled before '{}'", workflow.name, step.name));
                aborted = true;
                break;
            }

            self.sink.emit(WorkflowEvent::StepStarted {
                step_name: step.name.clone(),
            });

            let mut result = executor::execute_step(step, ctx, &deps).await;
            // Record before persisting: the checkpoint must include this
            // step's own result, or a later resume would re-run it.
            ctx.record(result.clone());

            if result.success {
                if let StepKind::Checkpoint { checkpoint_id, .. } = &step.kind {
                    let checkpoint_id = checkpoint_id.clone().unwrap_or_else(|| step.name.clone());
                    match self
                        .persist_checkpoint(workflow, ctx, &checkpoint_id)
                        .await
                    {
                        Ok(()) => {
                            self.sink
                                .emit(WorkflowEvent::CheckpointSaved { checkpoint_id });
                        }
                        Err(err) => {
                            result = StepResult::failure(
                                &step.name,
                                "checkpoint",
                                err.to_string(),
                                result.duration_ms,
                            );
                            ctx.record(result.clone());
                        }
                    }
                }
            }

            self.sink.emit(WorkflowEvent::StepCompleted {
                step_name: step.name.clone(),
                success: result.success,
                duration_ms: result.duration_ms,
            });

            if !result.success {
                aborted = true;
                break;
            }
        }

        let rollback_errors = self.drain_rollbacks(ctx).await;

        let step_results = ctx.results_in_order();
        let success = !aborted && step_results.iter().all(|r| r.success);
        let total_duration_ms = step_results.iter().map(|r| r.duration_ms).sum();

        let final_output = if success {
            self.evaluate_outputs(workflow, ctx)?
        } else {
            Value::Null
        };

        let workflow_result = WorkflowResult {
            workflow_name: workflow.name.clone(),
            success,
            step_results,
            total_duration_ms,
            final_output,
            rollback_errors,
        };

        self.sink.emit(WorkflowEvent::WorkflowCompleted {
            workflow_name: workflow.name.clone(),
            success: workflow_result.success,
            total_duration_ms: workflow_result.total_duration_ms,
        });

        Ok(workflow_result)
    }

    async fn persist_checkpoint(
        &self,
        workflow: &WorkflowFile,
        ctx: &WorkflowContext,
        checkpoint_id: &str,
    ) -> Result<(), maverick_checkpoint::CheckpointError> {
        let step_results: Vec<SerializedStepResult> = ctx
            .results_in_order()
            .iter()
            .map(StepResult::to_checkpoint_record)
            .collect();
        let data = CheckpointData {
            checkpoint_id: checkpoint_id.to_string(),
            workflow_name: workflow.name.clone(),
            inputs_hash: compute_inputs_hash(&Value::Object(ctx.inputs.clone())),
            step_results,
            saved_at: chrono::Utc::now(),
        };
        self.checkpoint_store.save(&workflow.name, data).await
    }

    /// Drains `pending_rollbacks` in LIFO order, continuing past individual
    /// failures.
    async fn drain_rollbacks(&self, ctx: &mut WorkflowContext) -> Vec<RollbackError> {
        let mut errors = Vec::new();
        while let Some(rollback) = ctx.pending_rollbacks.pop() {
            self.sink.emit(WorkflowEvent::RollbackStarted {
                step_name: rollback.step_name.clone(),
            });

            let outcome = match self.registry.action(&rollback.action) {
                Ok(action) => action(vec![rollback.captured_output.clone()], std::collections::HashMap::new())
                    .await
                    .map_err(|err| err.to_string()),
                Err(err) => Err(err.to_string()),
            };

            let ok = outcome.is_ok();
            if let Err(message) = outcome {
                self.logger.warn(&format!(
                    "rollback for step '{}' failed: {message}",
                    rollback.step_name
                ));
                errors.push(RollbackError {
                    step_name: rollback.step_name.clone(),
                    error: message,
                });
            }

            self.sink.emit(WorkflowEvent::RollbackCompleted {
                step_name: rollback.step_name,
                ok,
            });
        }
        errors
    }

    fn evaluate_outputs(&self, workflow: &WorkflowFile, ctx: &WorkflowContext) -> Result<Value> {
        if workflow.outputs.is_empty() {
            return Ok(ctx
                .results_in_order()
                .last()
                .map(|r| r.output.clone())
                .unwrap_or(Value::Null));
        }
        let mut map = serde_json::Map::new();
        for (name, expr) in &workflow.outputs {
            let value = maverick_expr::evaluate_template(expr, ctx).map_err(|err| {
                WorkflowError::InvalidInput {
                    name: name.clone(),
                    reason: err.to_string(),
                }
            })?;
            map.insert(name.clone(), value);
        }
        Ok(Value::Object(map))
    }
}

/// Eager, one-way coercion (`"42"` -> integer, `"true"` -> boolean). Missing
/// optional inputs fall back to their declared default, or `null`; missing
/// required inputs are `InvalidInput`.
fn coerce_inputs(
    workflow: &WorkflowFile,
    mut raw: serde_json::Map<String, Value>,
) -> Result<serde_json::Map<String, Value>> {
    let mut coerced = serde_json::Map::new();
    for (name, decl) in &workflow.inputs {
        let value = match raw.remove(name) {
            Some(value) => coerce_value(&value, decl.type_).map_err(|reason| {
                WorkflowError::InvalidInput {
                    name: name.clone(),
                    reason,
                }
            })?,
            None => match &decl.default {
                Some(default) => default.clone(),
                None if decl.required => {
                    return Err(WorkflowError::InvalidInput {
                        name: name.clone(),
                        reason: "required input not provided".to_string(),
                    })
                }
                None => Value::Null,
            },
        };
        coerced.insert(name.clone(), value);
    }
    // Undeclared inputs pass through untouched rather than being silently
    // dropped; the expression engine only resolves declared names anyway.
    for (name, value) in raw {
        coerced.insert(name, value);
    }
    Ok(coerced)
}

fn coerce_value(value: &Value, want: InputType) -> std::result::Result<Value, String> {
    match (want, value) {
        (InputType::String, Value::String(_)) => Ok(value.clone()),
        (InputType::String, other) => Ok(Value::String(maverick_expr::display_string(other))),
        (InputType::Integer, Value::Number(n)) if n.is_i64() => Ok(value.clone()),
        (InputType::Integer, Value::String(s)) => s
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| format!("'{s}' is not a valid integer")),
        (InputType::Float, Value::Number(_)) => Ok(value.clone()),
        (InputType::Float, Value::String(s)) => s
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("'{s}' is not a valid float")),
        (InputType::Boolean, Value::Bool(_)) => Ok(value.clone()),
        (InputType::Boolean, Value::String(s)) => match s.as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(format!("'{s}' is not a valid boolean")),
        },
        (InputType::Object, Value::Object(_)) => Ok(value.clone()),
        (InputType::Array, Value::Array(_)) => Ok(value.clone()),
        (_, other) => Err(format!(
            "expected {want:?}, got {}",
            maverick_expr::type_name(other)
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use futures::FutureExt;
    use maverick_checkpoint::FileCheckpointStore;
    use maverick_core::{RecordingLogger, TracingLogger};
    use maverick_events::NullProgressSink;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn registry() -> Arc<Registry> {
        Arc::new(
            Registry::builder()
                .action("format_greeting", |args, _kwargs| {
                    async move {
                        let a = args.first().and_then(Value::as_str).unwrap_or_default();
                        let b = args.get(1).and_then(Value::as_str).unwrap_or_default();
                        Ok(Value::String(format!("{a}, {b}!")))
                    }
                    .boxed()
                })
                .action("to_upper", |args, _kwargs| {
                    async move {
                        let s = args.first().and_then(Value::as_str).unwrap_or_default();
                        Ok(Value::String(s.to_uppercase()))
                    }
                    .boxed()
                })
                .build(),
        )
    }

    async fn engine(registry: Arc<Registry>) -> Engine {
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
    async fn sequential_happy_path() {
        init_tracing();
        let yaml = r#"
version: "1.0"
name: greet
inputs:
  name:
    type: string
    required: true
steps:
  - name: greet
    type: python
    action: format_greeting
    args: ["Hello", "${{ inputs.name }}"]
  - name: upper
    type: python
    action: to_upper
    args: ["${{ steps.greet.output }}"]
outputs:
  message: "${{ steps.upper.output }}"
"#;
        let workflow = crate::loader::parse(yaml, "greet.yaml").unwrap();
        let engine = engine(registry()).await;

        let mut inputs = serde_json::Map::new();
        inputs.insert("name".to_string(), Value::String("Alice".to_string()));

        let result = engine.run(&workflow, inputs).await.unwrap();
        assert!(result.success);
        assert_eq!(
            result.final_output,
            serde_json::json!({ "message": "HELLO, ALICE!" })
        );
    }

    #[tokio::test]
    async fn rollback_runs_in_lifo_order_on_late_failure() {
        let calls: Arc<std::sync::Mutex<Vec<String>>> = Arc::new(std::sync::Mutex::new(Vec::new()));

        let registry = {
            let calls_a = calls.clone();
            let calls_b = calls.clone();
            Arc::new(
                Registry::builder()
                    .action("create_branch", |_args, _kwargs| {
                        async move { Ok(Value::String("branch-1".to_string())) }.boxed()
                    })
                    .action("delete_branch", move |_args, _kwargs| {
                        let calls = calls_a.clone();
                        async move {
                            calls.lock().unwrap().push("delete_branch".to_string());
                            Ok(Value::Null)
                        }
                        .boxed()
                    })
                    .action("create_pr", |_args, _kwargs| {
                        async move { Ok(Value::String("pr-1".to_string())) }.boxed()
                    })
                    .action("close_pr", move |_args, _kwargs| {
                        let calls = calls_b.clone();
                        async move {
                            calls.lock().unwrap().push("close_pr".to_string());
                            Ok(Value::Null)
                        }
                        .boxed()
                    })
                    .action("finalize", |_args, _kwargs| {
                        async move { Err(maverick_core::MaverickError::Internal { message: "boom".to_string() }) }
                            .boxed()
                    })
                    .build(),
            )
        };

        let yaml = r#"
version: "1.0"
name: ship
inputs: {}
steps:
  - name: create_branch
    type: python
    action: create_branch
    rollback: delete_branch
  - name: create_pr
    type: python
    action: create_pr
    rollback: close_pr
  - name: finalize
    type: python
    action: finalize
outputs: {}
"#;
        let workflow = crate::loader::parse(yaml, "ship.yaml").unwrap();
        let engine = engine(registry).await;
        let result = engine.run(&workflow, serde_json::Map::new()).await.unwrap();

        assert!(!result.success);
        assert!(result.rollback_errors.is_empty());
        assert_eq!(
            calls.lock().unwrap().as_slice(),
            &["close_pr".to_string(), "delete_branch".to_string()]
        );
    }

    #[tokio::test]
    async fn resume_with_input_drift_is_fatal_and_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileCheckpointStore::new(dir.path()).await.unwrap());

        let yaml = r#"
version: "1.0"
name: drift
inputs:
  name:
    type: string
    required: true
steps:
  - name: a
    type: python
    action: noop
outputs: {}
"#;
        let workflow = crate::loader::parse(yaml, "drift.yaml").unwrap();

        let data = CheckpointData {
            checkpoint_id: "cp1".to_string(),
            workflow_name: "drift".to_string(),
            inputs_hash: compute_inputs_hash(&serde_json::json!({"name": "Alice"})),
            step_results: vec![],
            saved_at: chrono::Utc::now(),
        };
        store.save("drift", data).await.unwrap();

        let engine = Engine::new(
            Arc::new(Registry::builder().build()),
            store,
            Arc::new(NullProgressSink),
            Arc::new(RecordingLogger::new()),
            None,
            None,
        );

        let mut inputs = serde_json::Map::new();
        inputs.insert("name".to_string(), Value::String("Bob".to_string()));
        let err = engine.resume(&workflow, inputs).await.unwrap_err();
        assert!(matches!(err, WorkflowError::InputMismatch { .. }));
    }
}
