//! The agent descriptor: name, model handle, instruction template, tools,
//! and the advisory `parallel_tool_calls` flag. Immutable after construction.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::provider::ModelProvider;
use crate::tool::{ContextVars, ToolDefinition};

/// An opaque handle to a model, carrying a reference to its provider.
#[derive(Clone)]
pub struct ModelHandle {
    name: String,
    provider: Arc<dyn ModelProvider>,
}

impl ModelHandle {
    #[must_use]
    pub fn new(name: impl Into<String>, provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            name: name.into(),
            provider,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<dyn ModelProvider> {
        &self.provider
    }
}

struct AgentInner {
    name: String,
    model: ModelHandle,
    instructions: String,
    tools: Vec<ToolDefinition>,
    parallel_tool_calls: bool,
}

/// A named agent: model handle, instruction template, and the tools it may
/// call. Cheaply cloneable (an `Arc` handle to immutable shared state).
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

impl Agent {
    #[must_use]
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn model(&self) -> &ModelHandle {
        &self.inner.model
    }

    #[must_use]
    pub fn instructions(&self) -> &str {
        &self.inner.instructions
    }

    #[must_use]
    pub fn tools(&self) -> &[ToolDefinition] {
        &self.inner.tools
    }

    #[must_use]
    pub fn tool_by_name(&self, name: &str) -> Option<&ToolDefinition> {
        self.inner.tools.iter().find(|t| t.name == name)
    }

    #[must_use]
    pub const fn parallel_tool_calls(&self) -> bool {
        self.inner.parallel_tool_calls
    }

    /// Renders the instruction template against the in-scope context
    /// variables. If the template contains no `{{`, it is returned verbatim;
    /// otherwise rendering uses a strict missing-key policy.
    pub fn render_instructions(&self, cv: &ContextVars) -> Result<String> {
        render_template(&self.inner.instructions, cv)
    }
}

/// Renders `{{.key}}` interpolations against a context-variables map.
/// Missing keys are a fatal rendering error.
pub fn render_template(template: &str, cv: &ContextVars) -> Result<String> {
    if !template.contains("{{") {
        return Ok(template.to_string());
    }

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| AgentError::rendering("unterminated '{{' in instruction template"))?;
        let key_raw = after[..end].trim();
        let key = key_raw.strip_prefix('.').unwrap_or(key_raw);
        let value = cv
            .get(key)
            .ok_or_else(|| AgentError::rendering(format!("missing context variable '{key}'")))?;
        out.push_str(&value_to_interpolated_string(value));
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn value_to_interpolated_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Fluent constructor for [`Agent`].
#[derive(Default)]
pub struct AgentBuilder {
    name: Option<String>,
    model: Option<ModelHandle>,
    instructions: String,
    tools: Vec<ToolDefinition>,
    parallel_tool_calls: bool,
}

impl AgentBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn model(mut self, model: ModelHandle) -> Self {
        self.model = Some(model);
        self
    }

    #[must_use]
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    #[must_use]
    pub fn tool(mut self, tool: ToolDefinition) -> Self {
        self.tools.push(tool);
        self
    }

    #[must_use]
    pub fn tools(mut self, tools: impl IntoIterator<Item = ToolDefinition>) -> Self {
        self.tools.extend(tools);
        self
    }

    #[must_use]
    pub const fn parallel_tool_calls(mut self, flag: bool) -> Self {
        self.parallel_tool_calls = flag;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let name = self
            .name
            .ok_or_else(|| AgentError::validation("agent name is required"))?;
        let model = self
            .model
            .ok_or_else(|| AgentError::validation("agent model is required"))?;
        Ok(Agent {
            inner: Arc::new(AgentInner {
                name,
                model,
                instructions: self.instructions,
                tools: self.tools,
                parallel_tool_calls: self.parallel_tool_calls,
            }),
        })
    }
}
