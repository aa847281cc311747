//! ABOUTME: Step Executor (C4): dispatches a single StepRecord, times it, converts failures to StepResult
//! ABOUTME: Wraps each dispatch with timing and a tracing span for step-level observability

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use maverick_core::Logger;
use maverick_config::ValidationConfig;
use maverick_expr::ExprContext;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::context::{SkipReason, StepResult, WorkflowContext};
use crate::error::StepError;
use crate::loader::Loader;
use crate::registry::Registry;
use crate::steps::{ContextSpec, StagesSpec, Step, StepKind};

/// Collaborators the executor needs but does not own. Shared
/// read-only across a run; `loader` is only consulted by `SubWorkflowStep`.
#[derive(Clone)]
pub struct ExecutorDeps {
    pub registry: Arc<Registry>,
    pub validation_config: Option<Arc<ValidationConfig>>,
    pub loader: Option<Arc<Loader>>,
    pub logger: Arc<dyn Logger>,
}

/// Runs `step` to completion, producing an immutable `StepResult`.
/// Gates on `when` first; on a truthy/absent predicate, dispatches by kind.
/// Boxed because loop/branch/checkpoint recurse into this function for their
/// nested `StepRecord`s.
pub fn execute_step<'a>(
    step: &'a Step,
    ctx: &'a mut WorkflowContext,
    deps: &'a ExecutorDeps,
) -> BoxFuture<'a, StepResult> {
    Box::pin(async move {
        let step_type = step_type_name(step);
        let span = tracing::info_span!("step", name = %step.name, step_type);

        async move {
            if let Some(when) = &step.when {
                match maverick_expr::evaluate_predicate(when, ctx) {
                    Ok(true) => {}
                    Ok(false) => {
                        return StepResult::skipped(&step.name, step_type, SkipReason::PredicateFalse);
                    }
                    Err(maverick_expr::ExprError::PredicateMustBeBoolean { actual_type }) => {
                        return StepResult::failure(
                            &step.name,
                            step_type,
                            format!("'when' predicate did not evaluate to a boolean (got {actual_type})"),
                            0,
                        );
                    }
                    Err(err) => {
                        deps.logger
                            .warn(&format!("step '{}': 'when' predicate raised: {err}", step.name));
                        return StepResult::skipped(
                            &step.name,
                            step_type,
                            SkipReason::PredicateException,
                        );
                    }
                }
            }

            let started = Instant::now();
            let outcome = dispatch(step, ctx, deps).await;
            let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            match outcome {
                Ok(output) => StepResult::success(&step.name, step_type, output, duration_ms),
                Err(err) => {
                    let message = err.to_string();
                    match err {
                        StepError::ValidationFailed { output, .. } => StepResult::failure_with_output(
                            &step.name,
                            step_type,
                            output,
                            message,
                            duration_ms,
                        ),
                        _ => StepResult::failure(&step.name, step_type, message, duration_ms),
                    }
                }
            }
        }
        .instrument(span)
        .await
    })
}

fn step_type_name(step: &Step) -> &'static str {
    match step.kind {
        StepKind::Python { .. } => "python",
        StepKind::Agent { .. } => "agent",
        StepKind::Generate { .. } => "generate",
        StepKind::Validate { .. } => "validate",
        StepKind::Loop { .. } => "loop",
        StepKind::Branch { .. } => "branch",
        StepKind::Checkpoint { .. } => "checkpoint",
        StepKind::SubWorkflow { .. } => "subworkflow",
    }
}

async fn dispatch(
    step: &Step,
    ctx: &mut WorkflowContext,
    deps: &ExecutorDeps,
) -> Result<Value, StepError> {
    match &step.kind {
        StepKind::Python {
            action,
            args,
            kwargs,
            rollback,
        } => run_python(step, action, args, kwargs, rollback.as_deref(), ctx, deps).await,
        StepKind::Agent {
            agent,
            context,
            rollback,
        } => run_agent(step, agent, context.as_ref(), rollback.as_deref(), ctx, deps).await,
        StepKind::Generate {
            generator,
            context,
            rollback,
        } => run_generate(generator, context.as_ref(), ctx, deps).await,
        StepKind::Validate {
            stages,
            retry,
            on_failure,
        } => run_validate(stages.as_ref(), *retry, on_failure.as_deref(), ctx, deps).await,
        StepKind::Loop {
            steps,
            for_each,
            max_concurrency,
        } => run_loop(&step.name, steps, for_each, *max_concurrency, ctx, deps).await,
        StepKind::Branch { options } => run_branch(options, ctx, deps).await,
        StepKind::Checkpoint { inner, .. } => {
            let result = execute_step(inner, ctx, deps).await;
            if result.success {
                Ok(result.output)
            } else {
                Err(StepError::Other(
                    result.error.unwrap_or_else(|| "checkpoint inner step failed".to_string()),
                ))
            }
        }
        StepKind::SubWorkflow { workflow, inputs } => {
            run_subworkflow(workflow, inputs, ctx, deps).await
        }
    }
}

/// Recursively resolves every templated string inside a JSON value against
/// `ctx`, leaving other value kinds untouched.
fn resolve_value(value: &Value, ctx: &dyn ExprContext) -> Result<Value, StepError> {
    match value {
        Value::String(s) => Ok(maverick_expr::evaluate_template(s, ctx)?),
        Value::Array(items) => {
            let resolved = items
                .iter()
                .map(|v| resolve_value(v, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(resolved))
        }
        Value::Object(map) => {
            let mut resolved = serde_json::Map::new();
            for (k, v) in map {
                resolved.insert(k.clone(), resolve_value(v, ctx)?);
            }
            Ok(Value::Object(resolved))
        }
        other => Ok(other.clone()),
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_python(
    step: &Step,
    action: &str,
    args: &[Value],
    kwargs: &serde_json::Map<String, Value>,
    rollback: Option<&str>,
    ctx: &mut WorkflowContext,
    deps: &ExecutorDeps,
) -> Result<Value, StepError> {
    let resolved_args = args
        .iter()
        .map(|v| resolve_value(v, ctx))
        .collect::<Result<Vec<_>, _>>()?;
    let resolved_kwargs: HashMap<String, Value> = kwargs
        .iter()
        .map(|(k, v)| resolve_value(v, ctx).map(|v| (k.clone(), v)))
        .collect::<Result<_, _>>()?;

    let action_fn = deps.registry.action(action)?;
    // Sync-looking registered actions are still plain async closures from the
    // Registry's point of view; genuinely blocking work is the action
    // author's responsibility to offload via `tokio::task::spawn_blocking`
    //.
    let output = action_fn(resolved_args, resolved_kwargs)
        .await
        .map_err(|err| StepError::Action(err.to_string()))?;

    if let Some(rollback_action) = rollback {
        ctx.pending_rollbacks.push(crate::context::PendingRollback {
            step_name: step.name.clone(),
            action: rollback_action.to_string(),
            captured_output: output.clone(),
        });
    }
    Ok(output)
}

async fn resolve_context(
    spec: Option<&ContextSpec>,
    ctx: &mut WorkflowContext,
    deps: &ExecutorDeps,
) -> Result<serde_json::Map<String, Value>, StepError> {
    match spec {
        None => Ok(serde_json::Map::new()),
        Some(ContextSpec::Literal(map)) => {
            let resolved = resolve_value(&Value::Object(map.clone()), ctx)?;
            match resolved {
                Value::Object(map) => Ok(map),
                _ => Err(StepError::ContextNotObject),
            }
        }
        Some(ContextSpec::Builder(name)) => {
            let builder = deps.registry.context_builder(name)?;
            let snapshot = context_snapshot(ctx);
            builder
                .build(&snapshot)
                .await
                .map_err(|err| StepError::ContextBuilder(err.to_string()))
        }
    }
}

/// A read-only `serde_json::Value` view of the current context, passed to
/// `ContextBuilder::build`.
fn context_snapshot(ctx: &WorkflowContext) -> Value {
    serde_json::json!({
        "run_id": ctx.run_id.to_string(),
        "workflow_name": ctx.workflow_name,
        "inputs": ctx.inputs,
    })
}

async fn run_agent(
    step: &Step,
    agent: &str,
    context: Option<&ContextSpec>,
    rollback: Option<&str>,
    ctx: &mut WorkflowContext,
    deps: &ExecutorDeps,
) -> Result<Value, StepError> {
    let resolved_context = resolve_context(context, ctx, deps).await?;
    let agent_impl = deps.registry.agent(agent)?;
    let output = agent_impl.execute(resolved_context).await.map_err(|err| StepError::Action(err.to_string()))?;

    if let Some(rollback_action) = rollback {
        ctx.pending_rollbacks.push(crate::context::PendingRollback {
            step_name: step.name.clone(),
            action: rollback_action.to_string(),
            captured_output: output.clone(),
        });
    }
    Ok(output)
}

async fn run_generate(
    generator: &str,
    context: Option<&ContextSpec>,
    ctx: &mut WorkflowContext,
    deps: &ExecutorDeps,
) -> Result<Value, StepError> {
    let resolved_context = resolve_context(context, ctx, deps).await?;
    let generator_impl = deps.registry.generator(generator)?;
    let text = generator_impl
        .execute(resolved_context)
        .await
        .map_err(|err| StepError::Action(err.to_string()))?;
    Ok(Value::String(text))
}

async fn run_validate(
    stages: Option<&StagesSpec>,
    retry: u32,
    on_failure: Option<&Step>,
    ctx: &mut WorkflowContext,
    deps: &ExecutorDeps,
) -> Result<Value, StepError> {
    let names: Vec<String> = match stages {
        Some(StagesSpec::List(list)) => list.clone(),
        Some(StagesSpec::ConfigKey(key)) => {
            let config = deps
                .validation_config
                .as_ref()
                .ok_or_else(|| StepError::StageProfileMissing { key: key.clone() })?;
            if !config.stages.contains_key(key) {
                return Err(StepError::StageProfileMissing { key: key.clone() });
            }
            vec![key.clone()]
        }
        // Omitted `stages` means "use the default profile".
        None => deps
            .validation_config
            .as_ref()
            .map(|config| config.default_stages.clone())
            .unwrap_or_default(),
    };

    let mut attempts = 0u32;
    loop {
        let result = run_stages(&names, deps).await;
        if result.passed {
            return Ok(result.into_output());
        }
        if attempts >= retry {
            return Err(StepError::ValidationFailed {
                attempts: attempts + 1,
                output: result.into_output(),
            });
        }
        if let Some(fallback) = on_failure {
            // on_failure's own failure does not stop the retry loop.
            let _ = execute_step(fallback, ctx, deps).await;
        }
        attempts += 1;
    }
}

struct StageRunResult {
    passed: bool,
    stages: Vec<String>,
}

impl StageRunResult {
    fn into_output(self) -> Value {
        serde_json::json!({ "passed": self.passed, "stages": self.stages })
    }
}

/// Runs each named stage's configured command via `tokio::process::Command`,
/// honoring its `timeout_seconds`. Unconfigured stage names (no `ValidationConfig` resolution
/// requested, e.g. an explicit `stages: [...]` list naming ad hoc tags) are
/// treated as always-passing markers — the core has no command to run for
/// them.
async fn run_stages(names: &[String], deps: &ExecutorDeps) -> StageRunResult {
    let Some(config) = deps.validation_config.as_ref() else {
        return StageRunResult {
            passed: true,
            stages: names.to_vec(),
        };
    };

    for name in names {
        let Some(stage) = config.stages.get(name) else {
            continue;
        };
        let Some((program, rest)) = stage.command.split_first() else {
            continue;
        };
        let run = tokio::process::Command::new(program)
            .args(rest)
            .output();
        let timed = tokio::time::timeout(
            std::time::Duration::from_secs(stage.timeout_seconds),
            run,
        )
        .await;
        let passed = matches!(timed, Ok(Ok(output)) if output.status.success());
        if !passed {
            return StageRunResult {
                passed: false,
                stages: names.to_vec(),
            };
        }
    }

    StageRunResult {
        passed: true,
        stages: names.to_vec(),
    }
}

async fn run_branch(
    options: &[crate::steps::BranchOption],
    ctx: &mut WorkflowContext,
    deps: &ExecutorDeps,
) -> Result<Value, StepError> {
    for (index, option) in options.iter().enumerate() {
        let matched = maverick_expr::evaluate_predicate(&option.when, ctx)?;
        if matched {
            let result = execute_step(&option.step, ctx, deps).await;
            if !result.success {
                return Err(StepError::Other(
                    result.error.unwrap_or_else(|| "branch step failed".to_string()),
                ));
            }
            return Ok(serde_json::json!({
                "selected_index": index,
                "selected_step_name": option.step.name,
                "inner_output": result.output,
            }));
        }
    }
    Err(StepError::NoBranchMatched)
}

/// Bounded (or unbounded, `max_concurrency == 0`) fan-out of loop
/// iterations. Body steps within one iteration still run strictly in
/// declared order; only inter-iteration scheduling is concurrent.
async fn run_loop(
    loop_name: &str,
    body: &[Step],
    for_each: &str,
    max_concurrency: u32,
    ctx: &mut WorkflowContext,
    deps: &ExecutorDeps,
) -> Result<Value, StepError> {
    let mut seen = std::collections::HashSet::new();
    for child in body {
        if !seen.insert(child.name.as_str()) {
            return Err(StepError::Other(format!(
                "duplicate step name '{}' inside loop '{loop_name}'",
                child.name
            )));
        }
    }

    let items = match maverick_expr::evaluate_expr(for_each, ctx)? {
        Value::Array(items) => items,
        other => vec![other],
    };

    let permits = if max_concurrency == 0 {
        items.len().max(1)
    } else {
        max_concurrency as usize
    };
    let semaphore = Arc::new(Semaphore::new(permits));

    let parent_results = ctx.results_in_order();

    let mut join_set: JoinSet<(usize, Vec<StepResult>, Vec<crate::context::PendingRollback>)> =
        JoinSet::new();
    for (index, item) in items.iter().cloned().enumerate() {
        let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
        let body = body.to_vec();
        let base_inputs = ctx.inputs.clone();
        let workflow_name = ctx.workflow_name.clone();
        let parent_results = parent_results.clone();
        let deps = deps.clone();

        join_set.spawn(async move {
            let _permit = permit;
            let mut frame_ctx = WorkflowContext::new(&workflow_name, base_inputs);
            frame_ctx.seed_results(parent_results);
            frame_ctx.iteration = Some(crate::context::IterationFrame {
                item,
                index: index as i64,
            });
            let mut results = Vec::with_capacity(body.len());
            for child in &body {
                let result = execute_step(child, &mut frame_ctx, &deps).await;
                let failed = !result.success;
                frame_ctx.record(result.clone());
                results.push(result);
                if failed {
                    break;
                }
            }
            (index, results, frame_ctx.pending_rollbacks)
        });
    }

    let mut by_index: Vec<Option<(Vec<StepResult>, Vec<crate::context::PendingRollback>)>> =
        vec![None; items.len()];
    let mut any_failed = false;
    while let Some(joined) = join_set.join_next().await {
        let (index, results, rollbacks) = joined.map_err(|e| StepError::Other(e.to_string()))?;
        any_failed |= results.iter().any(|r| !r.success);
        by_index[index] = Some((results, rollbacks));
    }

    // Last-iteration-wins: iterations are folded into `ctx` in
    // `for_each` index order, so the last iteration to touch a given child
    // name is the one later siblings see via `steps.<child>.output`. Each
    // iteration's pending rollbacks are appended in the same order, so a
    // later failure still unwinds them LIFO across the whole loop.
    let mut per_iteration_outputs = Vec::with_capacity(by_index.len());
    for (results, rollbacks) in by_index.into_iter().flatten() {
        for result in &results {
            ctx.record(result.clone());
        }
        ctx.pending_rollbacks.extend(rollbacks);
        per_iteration_outputs.push(
            results
                .into_iter()
                .map(|r| serde_json::json!({ "name": r.name, "output": r.output, "success": r.success }))
                .collect::<Vec<_>>(),
        );
    }

    if any_failed {
        return Err(StepError::Other(format!(
            "loop '{loop_name}' had at least one failing iteration"
        )));
    }
    Ok(Value::Array(
        per_iteration_outputs.into_iter().map(Value::Array).collect(),
    ))
}

async fn run_subworkflow(
    workflow_name: &str,
    inputs: &serde_json::Map<String, Value>,
    ctx: &mut WorkflowContext,
    deps: &ExecutorDeps,
) -> Result<Value, StepError> {
    let loader = deps
        .loader
        .as_ref()
        .ok_or_else(|| StepError::SubWorkflow {
            name: workflow_name.to_string(),
            reason: "no loader configured for sub-workflow resolution".to_string(),
        })?;

    let (workflow, _source) = loader
        .load(workflow_name)
        .map_err(|err| StepError::SubWorkflow {
            name: workflow_name.to_string(),
            reason: err.to_string(),
        })?;

    let resolved_inputs = resolve_value(&Value::Object(inputs.clone()), ctx)?;
    let Value::Object(resolved_inputs) = resolved_inputs else {
        return Err(StepError::SubWorkflow {
            name: workflow_name.to_string(),
            reason: "resolved inputs were not an object".to_string(),
        });
    };

    let sub_engine = crate::engine::Engine::new(
        deps.registry.clone(),
        Arc::new(maverick_checkpoint::FileCheckpointStore::new(
            format!(".maverick/checkpoints/{workflow_name}"),
        ).await.map_err(|err| StepError::SubWorkflow { name: workflow_name.to_string(), reason: err.to_string() })?),
        Arc::new(maverick_events::NullProgressSink),
        deps.logger.clone(),
        deps.validation_config.clone(),
        deps.loader.clone(),
    );

    let result = sub_engine
        .run(&workflow, resolved_inputs)
        .await
        .map_err(|err| StepError::SubWorkflow {
            name: workflow_name.to_string(),
            reason: err.to_string(),
        })?;

    if !result.success {
        return Err(StepError::SubWorkflow {
            name: workflow_name.to_string(),
            reason: result
                .step_results
                .iter()
                .find(|r| !r.success)
                .and_then(|r| r.error.clone())
                .unwrap_or_else(|| "sub-workflow failed".to_string()),
        });
    }
    Ok(result.final_output)
}
