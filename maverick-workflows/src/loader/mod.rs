//! ABOUTME: Workflow Loader & Schema (C1): YAML parsing, structural + semantic validation, discovery
//! ABOUTME: Two-pass shape: parse the YAML into a typed tree, then validate cross-field semantics

mod discover;

pub use discover::Discovery;

use std::collections::HashSet;
use std::sync::Arc;

use maverick_config::ValidationConfig;

use crate::error::LoaderError;
use crate::steps::{Source, StagesSpec, Step, StepKind, WorkflowFile};

/// Parses and validates workflows, and resolves names against the three
/// discovery roots.
pub struct Loader {
    discovery: Discovery,
    validation_config: Option<Arc<ValidationConfig>>,
}

impl Loader {
    #[must_use]
    pub fn new(discovery: Discovery, validation_config: Option<Arc<ValidationConfig>>) -> Self {
        Self {
            discovery,
            validation_config,
        }
    }

    /// Find, read and validate a workflow by name, searching
    /// `project > user > builtin`.
    pub fn load(&self, name: &str) -> Result<(WorkflowFile, Source), LoaderError> {
        let Some((source, path)) = self.discovery.find(name) else {
            return Err(LoaderError::Discovery {
                name: name.to_string(),
                searched_paths: self
                    .discovery
                    .roots()
                    .iter()
                    .map(|(_, p)| p.display().to_string())
                    .collect(),
            });
        };
        let content = std::fs::read_to_string(&path).map_err(|err| LoaderError::Schema {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        let workflow = parse(&content, &path.display().to_string())?;
        self.validate(&workflow)?;
        Ok((workflow, source))
    }

    /// Every discovered workflow across all three roots, annotated by
    /// source, without validating them (diagnostic listing).
    #[must_use]
    pub fn list_workflows(&self) -> Vec<(String, Source, std::path::PathBuf)> {
        self.discovery.list()
    }

    fn validate(&self, workflow: &WorkflowFile) -> Result<(), LoaderError> {
        validate_inputs(workflow)?;
        check_unique_names(&workflow.steps, "top-level")?;
        for step in &workflow.steps {
            validate_step(step, self.validation_config.as_deref())?;
        }
        Ok(())
    }
}

/// First pass: structural parse via `serde_yaml`. Unknown fields anywhere in
/// the document are rejected: `WorkflowFile`, `InputDecl`, `BranchOption` and
/// `StepKind` all carry `#[serde(deny_unknown_fields)]` (see `steps/record.rs`
/// for why `Step` itself can't carry the attribute directly).
pub fn parse(content: &str, path: &str) -> Result<WorkflowFile, LoaderError> {
    let workflow: WorkflowFile = serde_yaml::from_str(content).map_err(|err| LoaderError::Schema {
        path: path.to_string(),
        reason: err.to_string(),
    })?;
    if workflow.version != "1.0" {
        return Err(LoaderError::Schema {
            path: path.to_string(),
            reason: format!("unsupported version '{}'", workflow.version),
        });
    }
    Ok(workflow)
}

fn validate_inputs(workflow: &WorkflowFile) -> Result<(), LoaderError> {
    for (name, decl) in &workflow.inputs {
        if decl.required && decl.default.is_some() {
            return Err(LoaderError::Schema {
                path: workflow.name.clone(),
                reason: format!("input '{name}' cannot be required and carry a default"),
            });
        }
    }
    Ok(())
}

fn check_unique_names(steps: &[Step], scope: &str) -> Result<(), LoaderError> {
    let mut seen = HashSet::new();
    for step in steps {
        if !seen.insert(step.name.as_str()) {
            return Err(LoaderError::DuplicateName {
                name: format!("{} (in {scope} scope)", step.name),
            });
        }
    }
    Ok(())
}

/// Recurses into the nested `StepRecord`s (loop body, branch options,
/// validate's `on_failure`, checkpoint's inner step).
fn validate_step(step: &Step, config: Option<&ValidationConfig>) -> Result<(), LoaderError> {
    match &step.kind {
        StepKind::Loop { steps, .. } => {
            check_unique_names(steps, &format!("loop '{}'", step.name))?;
            for child in steps {
                validate_step(child, config)?;
            }
        }
        StepKind::Branch { options } => {
            for option in options {
                validate_step(&option.step, config)?;
            }
        }
        StepKind::Validate {
            stages, on_failure, ..
        } => {
            if let Some(StagesSpec::ConfigKey(key)) = stages {
                let Some(config) = config else {
                    return Err(LoaderError::StageProfileMissing { key: key.clone() });
                };
                if !config.stages.contains_key(key) {
                    return Err(LoaderError::StageProfileMissing { key: key.clone() });
                }
            }
            if let Some(fallback) = on_failure {
                validate_step(fallback, config)?;
            }
        }
        StepKind::Checkpoint { inner, .. } => validate_step(inner, config)?,
        StepKind::Python { .. }
        | StepKind::Agent { .. }
        | StepKind::Generate { .. }
        | StepKind::SubWorkflow { .. } => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
version: "1.0"
name: greet
inputs:
  name:
    type: string
    required: true
steps:
  - name: say_hi
    type: python
    action: say_hi
    args: ["${{ inputs.name }}"]
outputs:
  message: "${{ steps.say_hi.output }}"
"#;

    #[test]
    fn parses_minimal_workflow() {
        let workflow = parse(MINIMAL, "test.yaml").unwrap();
        assert_eq!(workflow.name, "greet");
        assert_eq!(workflow.steps.len(), 1);
    }

    #[test]
    fn rejects_required_input_with_default() {
        let yaml = r#"
version: "1.0"
name: bad
inputs:
  name:
    type: string
    required: true
    default: "x"
steps: []
outputs: {}
"#;
        let workflow = parse(yaml, "bad.yaml").unwrap();
        assert!(validate_inputs(&workflow).is_err());
    }

    #[test]
    fn rejects_duplicate_top_level_step_names() {
        let yaml = r#"
version: "1.0"
name: dup
inputs: {}
steps:
  - name: a
    type: python
    action: noop
  - name: a
    type: python
    action: noop
outputs: {}
"#;
        let workflow = parse(yaml, "dup.yaml").unwrap();
        assert!(check_unique_names(&workflow.steps, "top-level").is_err());
    }

    #[test]
    fn rejects_unknown_top_level_field() {
        let yaml = r#"
version: "1.0"
name: greet
inputs: {}
steps: []
outputs: {}
bogus_field: true
"#;
        assert!(parse(yaml, "bad.yaml").is_err());
    }

    #[test]
    fn rejects_typo_in_step_field() {
        let yaml = r#"
version: "1.0"
name: greet
inputs: {}
steps:
  - name: say_hi
    type: python
    acton: say_hi
outputs: {}
"#;
        assert!(parse(yaml, "bad.yaml").is_err());
    }

    #[test]
    fn rejects_extra_field_on_known_step_kind() {
        let yaml = r#"
version: "1.0"
name: greet
inputs: {}
steps:
  - name: say_hi
    type: python
    action: say_hi
    unexpected: 1
outputs: {}
"#;
        assert!(parse(yaml, "bad.yaml").is_err());
    }

    #[test]
    fn loop_with_config_key_stage_requires_config() {
        let yaml = r#"
version: "1.0"
name: loopy
inputs: {}
steps:
  - name: items
    type: loop
    for_each: "${{ inputs.missing }}"
    steps:
      - name: check
        type: validate
        stages: "ci"
outputs: {}
"#;
        let workflow = parse(yaml, "loopy.yaml").unwrap();
        let err = validate_step(&workflow.steps[0], None).unwrap_err();
        assert!(matches!(err, LoaderError::StageProfileMissing { .. }));
    }
}
