//! The streaming event protocol between a provider and the reactor.

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::error::AgentError;
use crate::memory::Checkpoint;
use crate::message::{AssistantPayload, ToolCallBatch};

/// A single event in a provider's producer-closed event stream.
///
/// All `Response` variants carry a [`Checkpoint`] reflecting the messages
/// the provider committed to the shared memory; the reactor merges this
/// checkpoint before emitting its own follow-up messages.
#[derive(Debug)]
pub enum StreamEvent {
    /// Informational framing, discarded by the reactor.
    Delimiter {
        run_id: Uuid,
        turn_id: Uuid,
        label: String,
    },
    /// Incremental assistant content.
    AssistantChunk {
        run_id: Uuid,
        turn_id: Uuid,
        chunk: String,
        timestamp: DateTime<Utc>,
        meta: Value,
    },
    /// Incremental tool-call manifest.
    ToolCallChunk {
        run_id: Uuid,
        turn_id: Uuid,
        chunk: Value,
        timestamp: DateTime<Utc>,
        meta: Value,
    },
    /// Terminal assistant message for this provider call.
    AssistantResponse {
        run_id: Uuid,
        turn_id: Uuid,
        checkpoint: Checkpoint,
        response: AssistantPayload,
        timestamp: DateTime<Utc>,
        meta: Value,
    },
    /// Complete tool-call batch ready for dispatch.
    ToolCallResponse {
        run_id: Uuid,
        turn_id: Uuid,
        checkpoint: Checkpoint,
        response: ToolCallBatch,
        timestamp: DateTime<Utc>,
        meta: Value,
    },
    /// Fatal for the call; the promise completes with `err`.
    Error {
        run_id: Uuid,
        turn_id: Uuid,
        err: AgentError,
        timestamp: DateTime<Utc>,
        meta: Value,
    },
}

impl StreamEvent {
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        match self {
            Self::Delimiter { run_id, .. }
            | Self::AssistantChunk { run_id, .. }
            | Self::ToolCallChunk { run_id, .. }
            | Self::AssistantResponse { run_id, .. }
            | Self::ToolCallResponse { run_id, .. }
            | Self::Error { run_id, .. } => *run_id,
        }
    }
}
