//! Error types for the reactor, dispatcher, and orchestrator.
//!
//! Mirrors the taxonomy in the design doc's error handling section: validation,
//! rendering, provider, tool, and contract-violation errors all funnel through
//! a single [`AgentError`] so callers get one type to match on.

use thiserror::Error;
use uuid::Uuid;

/// A type alias for `Result<T, AgentError>`.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Contextual tagging carried by tool and contract-violation errors.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ErrorContext {
    pub run_id: Option<Uuid>,
    pub turn_id: Option<Uuid>,
    pub sender: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub fn new(run_id: Uuid, turn_id: Uuid, sender: impl Into<String>) -> Self {
        Self {
            run_id: Some(run_id),
            turn_id: Some(turn_id),
            sender: Some(sender.into()),
        }
    }
}

/// The unified error type produced by the reactor, dispatcher, and orchestrator.
///
/// `Clone` so the same failure can be both returned to the reactor's caller
/// and handed to the deferred promise / hook without re-deriving it twice.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    /// A required field on a run command was null/missing (agent, memory, hook,
    /// model, or provider).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Instruction-template rendering failed (missing key or bad syntax).
    #[error("rendering error: {message}")]
    Rendering { message: String },

    /// The provider's event stream carried an error event.
    #[error("provider error: {message}")]
    Provider { message: String },

    /// Unknown tool name referenced by a tool call.
    #[error("unknown tool '{tool_name}'")]
    UnknownTool {
        tool_name: String,
        context: ErrorContext,
    },

    /// Argument marshalling failed for a tool call.
    #[error("argument marshalling failed for '{tool_name}': {message}")]
    Marshalling {
        tool_name: String,
        message: String,
        context: ErrorContext,
    },

    /// A tool callable returned an error.
    #[error("tool '{tool_name}' failed: {message}")]
    ToolExecution {
        tool_name: String,
        message: String,
        context: ErrorContext,
    },

    /// The memory thread was empty when the provider's stream closed.
    #[error("no messages in thread")]
    EmptyThread { context: ErrorContext },

    /// The last message in memory was not sent by the active agent.
    #[error("last message is not from current agent")]
    WrongSender { context: ErrorContext },

    /// The last message in memory was neither an assistant message nor a tool
    /// response.
    #[error("last message was neither assistant message nor tool response")]
    WrongPayload { context: ErrorContext },

    /// `memory.turn_length()` reached `max_turns` without terminating.
    #[error("max turns exceeded ({turns}/{max_turns})")]
    MaxTurnsExceeded {
        turns: usize,
        max_turns: usize,
        context: ErrorContext,
    },

    /// The ambient context/cancellation signal fired.
    #[error("cancelled")]
    Cancelled { context: ErrorContext },

    /// Terminal content failed to decode into the caller's requested type.
    #[error("result decoding error: {message}")]
    Decode { message: String },

    /// Wraps a `serde_json::Error` encountered outside argument marshalling.
    #[error("json error: {message}")]
    Json { message: String },
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}

impl AgentError {
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn rendering(message: impl Into<String>) -> Self {
        Self::Rendering {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    /// The run_id/turn_id/sender this error is tagged with, if any.
    #[must_use]
    pub const fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::UnknownTool { context, .. }
            | Self::Marshalling { context, .. }
            | Self::ToolExecution { context, .. }
            | Self::EmptyThread { context }
            | Self::WrongSender { context }
            | Self::WrongPayload { context }
            | Self::MaxTurnsExceeded { context, .. }
            | Self::Cancelled { context } => Some(context),
            _ => None,
        }
    }
}
