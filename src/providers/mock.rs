//! A deterministic [`ModelProvider`] that replays scripted event sequences,
//! substituting for network I/O in tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;

use crate::context::CancellationToken;
use crate::error::Result;
use crate::provider::{CompletionParams, EventStream, ModelProvider};
use crate::stream_event::StreamEvent;

enum Script {
    /// One script consumed per call, in order.
    Queue(VecDeque<Vec<StreamEvent>>),
    /// The same script replayed for every call.
    Repeating(Vec<StreamEvent>),
}

/// Drives tests by replaying pre-built [`StreamEvent`] sequences instead of
/// talking to a real LM endpoint.
pub struct ScriptedProvider {
    script: Mutex<Script>,
}

impl ScriptedProvider {
    /// One script per call; calls beyond the scripted count get an empty
    /// stream (the "provider stream closes with zero events" boundary case).
    #[must_use]
    pub fn new(scripts: Vec<Vec<StreamEvent>>) -> Self {
        Self {
            script: Mutex::new(Script::Queue(scripts.into())),
        }
    }

    /// The same script is replayed on every call, useful for scenarios that
    /// loop (e.g. max-turns exhaustion).
    #[must_use]
    pub fn repeating(script: Vec<StreamEvent>) -> Self {
        Self {
            script: Mutex::new(Script::Repeating(script)),
        }
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn complete(&self, _cancellation: &CancellationToken, _params: CompletionParams) -> Result<EventStream> {
        let mut guard = self.script.lock().unwrap_or_else(|e| e.into_inner());
        let events = match &mut *guard {
            Script::Queue(queue) => queue.pop_front().unwrap_or_default(),
            Script::Repeating(script) => script
                .iter()
                .map(clone_event)
                .collect::<std::result::Result<Vec<_>, _>>()
                .unwrap_or_default(),
        };
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }
}

/// `StreamEvent` is not `Clone` (it carries an `AgentError`), so repeating a
/// script re-encodes each event from its non-error fields; an `Error` event
/// cannot meaningfully be replayed more than once and is surfaced only on
/// the first call.
fn clone_event(event: &StreamEvent) -> std::result::Result<StreamEvent, ()> {
    match event {
        StreamEvent::Delimiter { run_id, turn_id, label } => Ok(StreamEvent::Delimiter {
            run_id: *run_id,
            turn_id: *turn_id,
            label: label.clone(),
        }),
        StreamEvent::AssistantChunk { run_id, turn_id, chunk, timestamp, meta } => {
            Ok(StreamEvent::AssistantChunk {
                run_id: *run_id,
                turn_id: *turn_id,
                chunk: chunk.clone(),
                timestamp: *timestamp,
                meta: meta.clone(),
            })
        }
        StreamEvent::ToolCallChunk { run_id, turn_id, chunk, timestamp, meta } => {
            Ok(StreamEvent::ToolCallChunk {
                run_id: *run_id,
                turn_id: *turn_id,
                chunk: chunk.clone(),
                timestamp: *timestamp,
                meta: meta.clone(),
            })
        }
        StreamEvent::AssistantResponse { run_id, turn_id, checkpoint, response, timestamp, meta } => {
            Ok(StreamEvent::AssistantResponse {
                run_id: *run_id,
                turn_id: *turn_id,
                checkpoint: checkpoint.clone(),
                response: response.clone(),
                timestamp: *timestamp,
                meta: meta.clone(),
            })
        }
        StreamEvent::ToolCallResponse { run_id, turn_id, checkpoint, response, timestamp, meta } => {
            Ok(StreamEvent::ToolCallResponse {
                run_id: *run_id,
                turn_id: *turn_id,
                checkpoint: checkpoint.clone(),
                response: response.clone(),
                timestamp: *timestamp,
                meta: meta.clone(),
            })
        }
        StreamEvent::Error { .. } => Err(()),
    }
}
