//! Tool definitions and the erased callable signature.
//!
//! The source framework dispatches by reflecting over arbitrary callable
//! signatures. This crate instead requires every tool to conform to one
//! erased signature, `invoke(args, cv) -> ToolOutcome`; typed adapters can be
//! generated from that single seam if a caller wants ergonomic typed tools.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::agent::Agent;
use crate::error::AgentError;

/// In-scope context variables, threaded through a tool-call batch and
/// injected into callables that declare a `ContextVars` parameter.
pub type ContextVars = HashMap<String, Value>;

/// A partial update to the in-scope context variables, merged into the
/// dispatcher's scope on return.
pub type ContextVarsDelta = HashMap<String, Value>;

/// The classified result of invoking a tool callable.
pub enum ToolOutcome {
    /// A plain value result, already rendered to its wire representation.
    Value(String),
    /// A handoff: the reactor should switch to this agent.
    Handoff(Agent),
    /// A context-variable delta to merge into scope.
    Ctx(ContextVarsDelta),
    /// The callable failed.
    Err(AgentError),
}

impl fmt::Debug for ToolOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Handoff(agent) => f.debug_tuple("Handoff").field(&agent.name()).finish(),
            Self::Ctx(delta) => f.debug_tuple("Ctx").field(delta).finish(),
            Self::Err(e) => f.debug_tuple("Err").field(e).finish(),
        }
    }
}

/// The erased callable every tool must implement.
///
/// A callable may ignore `cv` entirely (most value tools do); it is only
/// injected for callables that declared a `ContextVars` parameter at
/// registration.
#[async_trait]
pub trait ToolCallable: Send + Sync {
    async fn invoke(&self, args: Value, cv: ContextVars) -> ToolOutcome;
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Adapts a plain async closure into a [`ToolCallable`].
struct FnTool<F>(F);

#[async_trait]
impl<F> ToolCallable for FnTool<F>
where
    F: for<'a> Fn(Value, ContextVars) -> BoxFuture<'a, ToolOutcome> + Send + Sync,
{
    async fn invoke(&self, args: Value, cv: ContextVars) -> ToolOutcome {
        (self.0)(args, cv).await
    }
}

/// Declares which JSON field in the arguments object a positional parameter
/// slot is bound to, recovering positional order from the wire's named-field
/// object.
pub type ParamBindings = Vec<String>;

/// Whether a tool's declared return type causes the dispatcher to treat it
/// as a handoff or a regular value call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// Returns a new Agent handle.
    Handoff,
    /// Returns a value (string, number, context-vars delta, etc).
    Value,
}

/// A tool's name, description, parameter schema, positional bindings, and
/// erased callable.
#[derive(Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments object.
    pub parameters: Value,
    /// `param0..paramN` → named JSON field, recovering positional order.
    pub param_bindings: ParamBindings,
    pub kind: ToolKind,
    callable: Arc<dyn ToolCallable>,
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("param_bindings", &self.param_bindings)
            .finish_non_exhaustive()
    }
}

impl ToolDefinition {
    /// Build a value tool from an erased callable.
    #[must_use]
    pub fn value(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        param_bindings: ParamBindings,
        callable: Arc<dyn ToolCallable>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            param_bindings,
            kind: ToolKind::Value,
            callable,
        }
    }

    /// Build a handoff tool from an erased callable. The callable's
    /// `ToolOutcome` is expected to be `Handoff` on success.
    #[must_use]
    pub fn handoff(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        param_bindings: ParamBindings,
        callable: Arc<dyn ToolCallable>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            param_bindings,
            kind: ToolKind::Handoff,
            callable,
        }
    }

    #[must_use]
    pub const fn is_handoff(&self) -> bool {
        matches!(self.kind, ToolKind::Handoff)
    }

    pub async fn invoke(&self, args: Value, cv: ContextVars) -> ToolOutcome {
        self.callable.invoke(args, cv).await
    }
}

/// Builds a [`ToolCallable`] from a boxed async function, for callers who
/// don't want to hand-implement the trait.
#[must_use]
pub fn fn_tool<F>(f: F) -> Arc<dyn ToolCallable>
where
    F: for<'a> Fn(Value, ContextVars) -> BoxFuture<'a, ToolOutcome> + Send + Sync + 'static,
{
    Arc::new(FnTool(f))
}
