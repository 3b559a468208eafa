//! The heterogeneous message store: a tagged `Payload` variant plus the
//! envelope fields every message carries (run/turn identity, sender, time).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A single part of a structured assistant response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantPart {
    /// Plain text content.
    Text { text: String },
    /// Model reasoning/thinking content, surfaced but not part of the final
    /// textual answer.
    Reasoning { text: String },
}

/// The content of an assistant message: text, a refusal, or an ordered
/// sequence of typed parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantPayload {
    /// Plain text content.
    Text(String),
    /// The model declined to answer; `reason` is the refusal text.
    Refusal(String),
    /// An ordered sequence of typed parts.
    Parts(Vec<AssistantPart>),
}

impl AssistantPayload {
    /// The terminal text content a promise would be completed with, per the
    /// current (flagged) behavior of treating refusals as plain content too.
    #[must_use]
    pub fn terminal_text(&self) -> String {
        match self {
            Self::Text(text) | Self::Refusal(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    AssistantPart::Text { text } => Some(text.as_str()),
                    AssistantPart::Reasoning { .. } => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    #[must_use]
    pub const fn is_refusal(&self) -> bool {
        matches!(self, Self::Refusal(_))
    }
}

/// A single tool call within a batch, as received from the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// The raw arguments object, keyed by declared parameter name.
    pub arguments: Value,
}

/// An ordered batch of tool calls emitted by a single provider response.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolCallBatch {
    pub calls: Vec<ToolCall>,
}

/// The response to a single tool call, appended to the forked memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponsePayload {
    pub tool_call_id: String,
    pub tool_name: String,
    pub content: String,
}

/// The kind discriminant of a [`Payload`], used where only the variant
/// matters (e.g. the reactor's stream-completion inspection).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Instructions,
    UserPrompt,
    AssistantMessage,
    ToolCallBatch,
    ToolResponse,
    Retry,
}

/// The discriminated payload carried by every [`Message`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    Instructions(String),
    UserPrompt(String),
    AssistantMessage(AssistantPayload),
    ToolCallBatch(ToolCallBatch),
    ToolResponse(ToolResponsePayload),
    Retry(String),
}

impl Payload {
    #[must_use]
    pub const fn kind(&self) -> PayloadKind {
        match self {
            Self::Instructions(_) => PayloadKind::Instructions,
            Self::UserPrompt(_) => PayloadKind::UserPrompt,
            Self::AssistantMessage(_) => PayloadKind::AssistantMessage,
            Self::ToolCallBatch(_) => PayloadKind::ToolCallBatch,
            Self::ToolResponse(_) => PayloadKind::ToolResponse,
            Self::Retry(_) => PayloadKind::Retry,
        }
    }
}

/// A message in a memory aggregator's ordered log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique id for this message, used to check fork/join round-trip
    /// equality without relying on pointer identity.
    pub id: Uuid,
    /// Identifies the Run call this message belongs to.
    pub run_id: Uuid,
    /// Identifies the memory thread (forked or root) this message was
    /// appended to.
    pub turn_id: Uuid,
    pub sender: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_metadata")]
    pub metadata: Value,
    pub payload: Payload,
}

fn default_metadata() -> Value {
    Value::Object(serde_json::Map::new())
}

impl Message {
    fn new(run_id: Uuid, turn_id: Uuid, sender: impl Into<String>, payload: Payload) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id,
            turn_id,
            sender: sender.into(),
            timestamp: Utc::now(),
            metadata: default_metadata(),
            payload,
        }
    }

    #[must_use]
    pub fn instructions(run_id: Uuid, turn_id: Uuid, sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(run_id, turn_id, sender, Payload::Instructions(text.into()))
    }

    #[must_use]
    pub fn user_prompt(run_id: Uuid, turn_id: Uuid, sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(run_id, turn_id, sender, Payload::UserPrompt(text.into()))
    }

    #[must_use]
    pub fn assistant(run_id: Uuid, turn_id: Uuid, sender: impl Into<String>, payload: AssistantPayload) -> Self {
        Self::new(run_id, turn_id, sender, Payload::AssistantMessage(payload))
    }

    #[must_use]
    pub fn assistant_text(run_id: Uuid, turn_id: Uuid, sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(
            run_id,
            turn_id,
            sender,
            Payload::AssistantMessage(AssistantPayload::Text(text.into())),
        )
    }

    #[must_use]
    pub fn assistant_refusal(run_id: Uuid, turn_id: Uuid, sender: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(
            run_id,
            turn_id,
            sender,
            Payload::AssistantMessage(AssistantPayload::Refusal(reason.into())),
        )
    }

    #[must_use]
    pub fn tool_call_batch(run_id: Uuid, turn_id: Uuid, sender: impl Into<String>, batch: ToolCallBatch) -> Self {
        Self::new(run_id, turn_id, sender, Payload::ToolCallBatch(batch))
    }

    #[must_use]
    pub fn tool_response(
        run_id: Uuid,
        turn_id: Uuid,
        sender: impl Into<String>,
        response: ToolResponsePayload,
    ) -> Self {
        Self::new(run_id, turn_id, sender, Payload::ToolResponse(response))
    }

    #[must_use]
    pub fn retry(run_id: Uuid, turn_id: Uuid, sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(run_id, turn_id, sender, Payload::Retry(text.into()))
    }

    #[must_use]
    pub const fn kind(&self) -> PayloadKind {
        self.payload.kind()
    }

    /// The text content if this is an assistant message, regardless of
    /// whether it is content or a refusal.
    #[must_use]
    pub fn as_assistant_text(&self) -> Option<String> {
        match &self.payload {
            Payload::AssistantMessage(assistant) => Some(assistant.terminal_text()),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_tool_call_batch(&self) -> Option<&ToolCallBatch> {
        match &self.payload {
            Payload::ToolCallBatch(batch) => Some(batch),
            _ => None,
        }
    }
}
