use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A fully validated, immutable workflow definition. Constructed only
/// by `crate::loader`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowFile {
    pub version: String,
    pub name: String,
    pub description: Option<String>,
    /// Ordered: declaration order matters for coercion error reporting.
    #[serde(default)]
    pub inputs: IndexMap<String, InputDecl>,
    pub steps: Vec<Step>,
    /// Ordered mapping name -> expression string.
    #[serde(default)]
    pub outputs: IndexMap<String, String>,
}

impl WorkflowFile {
    #[must_use]
    pub fn input_decl(&self, name: &str) -> Option<&InputDecl> {
        self.inputs.get(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    String,
    Integer,
    Boolean,
    Float,
    Object,
    Array,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputDecl {
    #[serde(rename = "type")]
    pub type_: InputType,
    #[serde(default)]
    pub required: bool,
    pub default: Option<serde_json::Value>,
    pub description: Option<String>,
}

/// Where a workflow was discovered. Ordering reflects lookup priority:
/// `Project > User > Builtin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Source {
    Builtin,
    User,
    Project,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Source::Project => "project",
            Source::User => "user",
            Source::Builtin => "builtin",
        };
        f.write_str(s)
    }
}

/// A single validated step. `name`, `when`, `metadata` are
/// common to every variant; the rest lives in `kind`.
///
/// No `#[serde(deny_unknown_fields)]` here: serde rejects that combination on
/// a struct that also has a `#[serde(flatten)]` field. Unknown-key rejection
/// for the flattened variant fields is instead enforced on `StepKind` itself,
/// which receives exactly the keys this struct's own fields didn't consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub when: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(flatten)]
    pub kind: StepKind,
}

/// Either a literal map of (possibly templated) values, or the name of a
/// `context_builder` registered in the Component Registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextSpec {
    Literal(serde_json::Map<String, serde_json::Value>),
    Builder(String),
}

/// `validate.stages`: an explicit stage list, or a config-key string
/// resolving against `ValidationConfig`. Absence (`None` at the `Step` level)
/// means "use the default profile".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StagesSpec {
    List(Vec<String>),
    ConfigKey(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BranchOption {
    pub when: String,
    pub step: Box<Step>,
}

/// The discriminated step variants of the `StepRecord` table. Flattened
/// into `Step` (internally tagged on `type`), so on the wire a step is one
/// flat YAML mapping: `{name, when?, metadata?, type, <variant fields>}`.
/// `deny_unknown_fields` here is what actually rejects a typo'd or extra
/// key anywhere in a step: `Step::kind`'s `#[serde(flatten)]` buffers every
/// key this enum doesn't recognize for the given `type` tag, so unknown
/// fields surface as a deserialize error instead of being silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", deny_unknown_fields)]
pub enum StepKind {
    #[serde(rename = "python")]
    Python {
        action: String,
        #[serde(default)]
        args: Vec<serde_json::Value>,
        #[serde(default)]
        kwargs: serde_json::Map<String, serde_json::Value>,
        rollback: Option<String>,
    },
    #[serde(rename = "agent")]
    Agent {
        agent: String,
        #[serde(default)]
        context: Option<ContextSpec>,
        rollback: Option<String>,
    },
    #[serde(rename = "generate")]
    Generate {
        generator: String,
        #[serde(default)]
        context: Option<ContextSpec>,
        rollback: Option<String>,
    },
    #[serde(rename = "validate")]
    Validate {
        #[serde(default)]
        stages: Option<StagesSpec>,
        #[serde(default = "default_retry")]
        retry: u32,
        on_failure: Option<Box<Step>>,
    },
    #[serde(rename = "loop")]
    Loop {
        steps: Vec<Step>,
        for_each: String,
        #[serde(default = "default_max_concurrency")]
        max_concurrency: u32,
    },
    #[serde(rename = "branch")]
    Branch {
        options: Vec<BranchOption>,
    },
    #[serde(rename = "checkpoint")]
    Checkpoint {
        checkpoint_id: Option<String>,
        inner: Box<Step>,
    },
    #[serde(rename = "subworkflow")]
    SubWorkflow {
        workflow: String,
        #[serde(default)]
        inputs: serde_json::Map<String, serde_json::Value>,
    },
}

const fn default_retry() -> u32 {
    3
}

const fn default_max_concurrency() -> u32 {
    1
}
