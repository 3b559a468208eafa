//! The provider seam: the only place this crate talks to an external LM
//! collaborator. The concrete HTTP/SSE wire implementation is out of scope;
//! callers supply their own [`ModelProvider`], and [`providers::mock`] stands
//! in for tests.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;
use uuid::Uuid;

use crate::agent::ModelHandle;
use crate::context::CancellationToken;
use crate::error::Result;
use crate::memory::MemoryAggregator;
use crate::stream_event::StreamEvent;
use crate::tool::ToolDefinition;

/// A `{name, description, schema}` descriptor instructing the provider to
/// validate/shape its terminal output against a JSON Schema.
#[derive(Debug, Clone)]
pub struct StructuredOutputDescriptor {
    pub name: String,
    pub description: String,
    pub schema: Value,
}

impl StructuredOutputDescriptor {
    /// Generates a descriptor from a type's reflective JSON schema.
    #[must_use]
    pub fn from_schema<T: schemars::JsonSchema>(name: impl Into<String>, description: impl Into<String>) -> Self {
        let root = schemars::schema_for!(T);
        Self {
            name: name.into(),
            description: description.into(),
            schema: serde_json::to_value(root).unwrap_or(Value::Null),
        }
    }
}

/// The parameters a provider call is built from.
pub struct CompletionParams {
    pub run_id: Uuid,
    pub instructions: String,
    pub memory: MemoryAggregator,
    pub stream: bool,
    pub model: ModelHandle,
    pub structured_output: Option<StructuredOutputDescriptor>,
    pub tools: Vec<ToolDefinition>,
}

/// A provider-closed sequence of stream events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// The external collaborator interface the reactor consumes.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn complete(&self, cancellation: &CancellationToken, params: CompletionParams) -> Result<EventStream>;
}
