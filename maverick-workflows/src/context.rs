//! ABOUTME: Runtime state for a single workflow run
//! ABOUTME: Owned exclusively by the Engine; mutated only on step-completion boundaries

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkflowError};

/// Caller-supplied inputs coerced to their declared types. Frozen
/// after `Engine::run`/`resume` starts.
pub type InputValues = serde_json::Map<String, serde_json::Value>;

/// `{item, index}` overlay active only inside a loop body.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationFrame {
    pub item: serde_json::Value,
    pub index: i64,
}

/// Reason a step was skipped rather than executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    PredicateFalse,
    PredicateException,
    ErrorSkipped,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SkipReason::PredicateFalse => "predicate_false",
            SkipReason::PredicateException => "predicate_exception",
            SkipReason::ErrorSkipped => "error_skipped",
        };
        f.write_str(s)
    }
}

/// The result of executing one step. `success = false` always carries
/// an `error`; once constructed, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub name: String,
    pub step_type: String,
    pub success: bool,
    pub output: serde_json::Value,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl StepResult {
    #[must_use]
    pub fn success(name: &str, step_type: &str, output: serde_json::Value, duration_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            step_type: step_type.to_string(),
            success: true,
            output,
            duration_ms,
            error: None,
        }
    }

    #[must_use]
    pub fn failure(name: &str, step_type: &str, error: String, duration_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            step_type: step_type.to_string(),
            success: false,
            output: serde_json::Value::Null,
            duration_ms,
            error: Some(error),
        }
    }

    /// Like `failure`, but for the rare step kinds (e.g. an exhausted
    /// `validate` retry loop) whose error carries a meaningful result of its
    /// own rather than `null`.
    #[must_use]
    pub fn failure_with_output(
        name: &str,
        step_type: &str,
        output: serde_json::Value,
        error: String,
        duration_ms: u64,
    ) -> Self {
        Self {
            name: name.to_string(),
            step_type: step_type.to_string(),
            success: false,
            output,
            duration_ms,
            error: Some(error),
        }
    }

    #[must_use]
    pub fn skipped(name: &str, step_type: &str, reason: SkipReason) -> Self {
        Self {
            name: name.to_string(),
            step_type: step_type.to_string(),
            success: true,
            output: serde_json::json!({ "skip_marker": { "reason": reason.to_string() } }),
            duration_ms: 0,
            error: None,
        }
    }

    pub fn to_checkpoint_record(&self) -> maverick_checkpoint::SerializedStepResult {
        maverick_checkpoint::SerializedStepResult {
            name: self.name.clone(),
            step_type: self.step_type.clone(),
            success: self.success,
            output: self.output.clone(),
            duration_ms: self.duration_ms,
            error: self.error.clone(),
        }
    }

    #[must_use]
    pub fn from_checkpoint_record(r: &maverick_checkpoint::SerializedStepResult) -> Self {
        Self {
            name: r.name.clone(),
            step_type: r.step_type.clone(),
            success: r.success,
            output: r.output.clone(),
            duration_ms: r.duration_ms,
            error: r.error.clone(),
        }
    }
}

/// A compensating action registered after a successful step, run in
/// LIFO order if and only if the workflow later fails.
#[derive(Debug, Clone)]
pub struct PendingRollback {
    pub step_name: String,
    pub action: String,
    pub captured_output: serde_json::Value,
}

/// Runtime state of a single workflow run.
pub struct WorkflowContext {
    pub run_id: uuid::Uuid,
    pub workflow_name: String,
    pub inputs: InputValues,
    /// Append-only in declared order. Loop bodies record each child under
    /// its own bare name every iteration, so later writes overwrite earlier
    /// ones and `steps.<child>.output` resolves to the last iteration,
    /// i.e. "last iteration wins".
    results: HashMap<String, StepResult>,
    order: Vec<String>,
    pub iteration: Option<IterationFrame>,
    pub pending_rollbacks: Vec<PendingRollback>,
}

impl WorkflowContext {
    #[must_use]
    pub fn new(workflow_name: &str, inputs: InputValues) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4(),
            workflow_name: workflow_name.to_string(),
            inputs,
            results: HashMap::new(),
            order: Vec::new(),
            iteration: None,
            pending_rollbacks: Vec::new(),
        }
    }

    pub fn record(&mut self, result: StepResult) {
        if !self.results.contains_key(&result.name) {
            self.order.push(result.name.clone());
        }
        self.results.insert(result.name.clone(), result);
    }

    /// Seeds this context with another context's already-recorded results,
    /// in order. Used to give a loop iteration's frame context visibility
    /// into steps that ran before the loop, since it's otherwise a fresh
    /// context holding only the coerced inputs.
    pub fn seed_results(&mut self, results: impl IntoIterator<Item = StepResult>) {
        for result in results {
            self.record(result);
        }
    }

    #[must_use]
    pub fn step_output(&self, name: &str) -> Option<&serde_json::Value> {
        self.results.get(name).map(|r| &r.output)
    }

    #[must_use]
    pub fn results_in_order(&self) -> Vec<StepResult> {
        self.order
            .iter()
            .filter_map(|n| self.results.get(n).cloned())
            .collect()
    }

    #[must_use]
    pub fn has_step(&self, name: &str) -> bool {
        self.results.contains_key(name)
    }

    /// Checks for duplicate step names, covering dynamically-named loop
    /// children, against every name about to be dispatched. Fatal if found.
    pub fn check_no_duplicates(names: &[String]) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for name in names {
            if !seen.insert(name) {
                return Err(WorkflowError::DuplicateName { name: name.clone() });
            }
        }
        Ok(())
    }
}

impl maverick_expr::ExprContext for WorkflowContext {
    fn input(&self, name: &str) -> Option<serde_json::Value> {
        self.inputs.get(name).cloned()
    }

    fn step_output(&self, name: &str) -> Option<serde_json::Value> {
        WorkflowContext::step_output(self, name).cloned()
    }

    fn iteration(&self) -> Option<(serde_json::Value, serde_json::Value)> {
        self.iteration
            .as_ref()
            .map(|f| (f.item.clone(), serde_json::Value::from(f.index)))
    }
}

/// Terminal result of a workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub workflow_name: String,
    pub success: bool,
    pub step_results: Vec<StepResult>,
    pub total_duration_ms: u64,
    pub final_output: serde_json::Value,
    pub rollback_errors: Vec<RollbackError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackError {
    pub step_name: String,
    pub error: String,
}
