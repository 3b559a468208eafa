//! The hook interface: a normalized lifecycle event sink exposed to callers.
//!
//! Every method has a no-op default so implementers override only the
//! events they care about.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Mutex;
use uuid::Uuid;

use async_trait::async_trait;

use crate::error::AgentError;
use crate::message::Message;

/// Carries the run/turn identity an event belongs to.
#[derive(Debug, Clone, Copy)]
pub struct HookContext {
    pub run_id: Uuid,
    pub turn_id: Uuid,
}

/// A typed error surfaced to `hook.on_error`, tagged per the error handling
/// design's propagation policy.
#[derive(Debug)]
pub struct TypedError {
    pub run_id: Uuid,
    pub turn_id: Uuid,
    pub sender: Option<String>,
    pub inner: AgentError,
    pub timestamp: DateTime<Utc>,
}

impl TypedError {
    #[must_use]
    pub fn new(ctx: HookContext, sender: Option<String>, inner: AgentError) -> Self {
        Self {
            run_id: ctx.run_id,
            turn_id: ctx.turn_id,
            sender,
            inner,
            timestamp: Utc::now(),
        }
    }
}

/// The normalized lifecycle event sink. Object-safe: used as
/// `Arc<dyn Hook>`.
#[async_trait]
pub trait Hook: Send + Sync {
    async fn on_user_prompt(&self, _ctx: HookContext, _message: &Message) {}
    async fn on_assistant_chunk(&self, _ctx: HookContext, _chunk: &str) {}
    async fn on_tool_call_chunk(&self, _ctx: HookContext, _chunk: &Value) {}
    async fn on_assistant_message(&self, _ctx: HookContext, _message: &Message) {}
    async fn on_tool_call_message(&self, _ctx: HookContext, _message: &Message) {}
    async fn on_tool_call_response(&self, _ctx: HookContext, _message: &Message) {}
    async fn on_error(&self, _ctx: HookContext, _error: &TypedError) {}
    async fn on_result(&self, _ctx: HookContext, _result: &Value) {}
    async fn on_close(&self, _ctx: HookContext) {}
}

/// A hook that observes nothing. Used as the sink for steps whose outcome
/// the caller doesn't observe directly (e.g. intermediate orchestrator
/// steps).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHook;

#[async_trait]
impl Hook for NoopHook {}

/// One recorded hook invocation, in call order.
#[derive(Debug, Clone)]
pub enum HookEvent {
    UserPrompt(Message),
    AssistantChunk(String),
    ToolCallChunk(Value),
    AssistantMessage(Message),
    ToolCallMessage(Message),
    ToolCallResponse(Message),
    Error(String),
    Result(Value),
    Close,
}

/// A test hook that records every invocation, in order, for assertions.
#[derive(Debug, Default)]
pub struct RecordingHook {
    events: Mutex<Vec<HookEvent>>,
}

impl RecordingHook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<HookEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn push(&self, event: HookEvent) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event);
    }
}

#[async_trait]
impl Hook for RecordingHook {
    async fn on_user_prompt(&self, _ctx: HookContext, message: &Message) {
        self.push(HookEvent::UserPrompt(message.clone()));
    }

    async fn on_assistant_chunk(&self, _ctx: HookContext, chunk: &str) {
        self.push(HookEvent::AssistantChunk(chunk.to_string()));
    }

    async fn on_tool_call_chunk(&self, _ctx: HookContext, chunk: &Value) {
        self.push(HookEvent::ToolCallChunk(chunk.clone()));
    }

    async fn on_assistant_message(&self, _ctx: HookContext, message: &Message) {
        self.push(HookEvent::AssistantMessage(message.clone()));
    }

    async fn on_tool_call_message(&self, _ctx: HookContext, message: &Message) {
        self.push(HookEvent::ToolCallMessage(message.clone()));
    }

    async fn on_tool_call_response(&self, _ctx: HookContext, message: &Message) {
        self.push(HookEvent::ToolCallResponse(message.clone()));
    }

    async fn on_error(&self, _ctx: HookContext, error: &TypedError) {
        self.push(HookEvent::Error(error.inner.to_string()));
    }

    async fn on_result(&self, _ctx: HookContext, result: &Value) {
        self.push(HookEvent::Result(result.clone()));
    }

    async fn on_close(&self, _ctx: HookContext) {
        self.push(HookEvent::Close);
    }
}
