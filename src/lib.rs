#![cfg_attr(docsrs, feature(doc_cfg))]
//! Agentry is the conversation execution core for multi-agent LM
//! orchestration: a per-step reactor loop, a handoff-aware tool dispatcher,
//! fork/join memory aggregation, and a streaming event protocol surfaced to
//! callers through a lifecycle hook.
//!
//! The [`orchestrator`] module is the typical entry point: build an
//! [`agent::Agent`] per role, register them with an
//! [`orchestrator::Orchestrator`], and call [`orchestrator::Orchestrator::run`]
//! with a sequence of steps.

pub mod agent;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod hook;
pub mod memory;
pub mod message;
pub mod orchestrator;
pub mod promise;
pub mod provider;
pub mod providers;
pub mod reactor;
pub mod stream_event;
pub mod tool;
pub mod usage;

pub mod prelude {
    //! Commonly used types, re-exported for a single `use agentry::prelude::*`.

    pub use crate::agent::{Agent, AgentBuilder, ModelHandle};
    pub use crate::context::CancellationToken;
    pub use crate::error::{AgentError, Result};
    pub use crate::hook::{Hook, HookContext, NoopHook, RecordingHook, TypedError};
    pub use crate::memory::{Checkpoint, MemoryAggregator};
    pub use crate::message::{AssistantPayload, Message, Payload, PayloadKind};
    pub use crate::orchestrator::{Orchestrator, OrchestratorBuilder, RunOptions, Step, Task};
    pub use crate::promise::{DeferredPromise, ExecutionContext, ResultMode};
    pub use crate::provider::{CompletionParams, ModelProvider, StructuredOutputDescriptor};
    pub use crate::stream_event::StreamEvent;
    pub use crate::tool::{ContextVars, ToolDefinition, ToolKind, ToolOutcome};
}
