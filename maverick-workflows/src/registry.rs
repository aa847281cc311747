//! ABOUTME: Component Registry (C3): explicit, non-reflective lookup of actions/agents/generators
//! ABOUTME: Explicit registration only, no dynamic dispatch by name guessing

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::{Map, Value};

use maverick_core::MaverickError;

use crate::error::RegistryError;

/// A plain synchronous or asynchronous callable. Always invoked
/// through the async seam; synchronous actions are expected to do their
/// blocking work via `tokio::task::spawn_blocking` themselves or rely on the
/// Executor's wrapper (see `crate::executor`).
pub type Action = Arc<
    dyn Fn(Vec<Value>, HashMap<String, Value>) -> BoxFuture<'static, Result<Value, MaverickError>>
        + Send
        + Sync,
>;

/// An object with `execute(context) -> AgentResult`. `AgentResult` is
/// represented as a `serde_json::Value` — the core imposes no shape on it.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn execute(&self, context: Map<String, Value>) -> Result<Value, MaverickError>;
}

/// An object with `execute(context) -> string`.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn execute(&self, context: Map<String, Value>) -> Result<String, MaverickError>;
}

/// An async function `ctx -> map`, used to resolve an `AgentStep`/`GenerateStep`'s
/// context when the author names a builder instead of a literal map.
#[async_trait]
pub trait ContextBuilder: Send + Sync {
    async fn build(&self, ctx: &Value) -> Result<Map<String, Value>, MaverickError>;
}

/// Explicit, read-only-after-construction lookup table.
#[derive(Clone, Default)]
pub struct Registry {
    actions: HashMap<String, Action>,
    agents: HashMap<String, Arc<dyn Agent>>,
    generators: HashMap<String, Arc<dyn Generator>>,
    context_builders: HashMap<String, Arc<dyn ContextBuilder>>,
}

impl Registry {
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn action(&self, name: &str) -> Result<&Action, RegistryError> {
        self.actions.get(name).ok_or_else(|| unknown("action", name))
    }

    pub fn agent(&self, name: &str) -> Result<&Arc<dyn Agent>, RegistryError> {
        self.agents.get(name).ok_or_else(|| unknown("agent", name))
    }

    pub fn generator(&self, name: &str) -> Result<&Arc<dyn Generator>, RegistryError> {
        self.generators
            .get(name)
            .ok_or_else(|| unknown("generator", name))
    }

    pub fn context_builder(&self, name: &str) -> Result<&Arc<dyn ContextBuilder>, RegistryError> {
        self.context_builders
            .get(name)
            .ok_or_else(|| unknown("context_builder", name))
    }
}

fn unknown(kind: &'static str, name: &str) -> RegistryError {
    RegistryError {
        kind,
        name: name.to_string(),
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    #[must_use]
    pub fn action<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>, HashMap<String, Value>) -> BoxFuture<'static, Result<Value, MaverickError>>
            + Send
            + Sync
            + 'static,
    {
        self.registry.actions.insert(name.into(), Arc::new(f));
        self
    }

    #[must_use]
    pub fn agent(mut self, name: impl Into<String>, agent: Arc<dyn Agent>) -> Self {
        self.registry.agents.insert(name.into(), agent);
        self
    }

    #[must_use]
    pub fn generator(mut self, name: impl Into<String>, generator: Arc<dyn Generator>) -> Self {
        self.registry.generators.insert(name.into(), generator);
        self
    }

    #[must_use]
    pub fn context_builder(mut self, name: impl Into<String>, builder: Arc<dyn ContextBuilder>) -> Self {
        self.registry.context_builders.insert(name.into(), builder);
        self
    }

    #[must_use]
    pub fn build(self) -> Registry {
        self.registry
    }
}
