//! The tool-call dispatcher: resolves tools by name, marshals arguments,
//! invokes them, classifies the result, and appends tool-response messages.

use serde_json::Value;
use uuid::Uuid;

use crate::agent::Agent;
use crate::error::{AgentError, ErrorContext, Result};
use crate::hook::{Hook, HookContext};
use crate::memory::MemoryAggregator;
use crate::message::{Message, ToolCall, ToolCallBatch, ToolResponsePayload};
use crate::tool::{ContextVars, ToolOutcome};

/// The result of dispatching a tool-call batch.
pub struct DispatchOutcome {
    /// Set when a handoff call succeeded; the reactor should switch to this
    /// agent and re-enter `RENDER`.
    pub handoff: Option<Agent>,
    /// The context variables after merging any deltas produced during
    /// dispatch, to be propagated to the next turn.
    pub context_vars: ContextVars,
}

/// The raw arguments JSON is expected to already be a parsed object (the
/// wire layer parses it before constructing a [`ToolCall`]). A non-object
/// value degrades to an empty object so missing fields resolve to zero
/// values at the callable, matching the source's "unparseable args aren't
/// fatal" behavior.
fn coerce_args(raw: &Value) -> Value {
    match raw {
        Value::Object(_) => raw.clone(),
        _ => Value::Object(serde_json::Map::new()),
    }
}

/// Dispatches a tool-call batch: handoff calls first, then value calls,
/// each partition preserving original batch order. The first successful
/// handoff short-circuits the remainder of the batch.
pub async fn dispatch(
    run_id: Uuid,
    active_agent: &Agent,
    forked_memory: &mut MemoryAggregator,
    hook: &dyn Hook,
    batch: &ToolCallBatch,
    context_vars: ContextVars,
) -> Result<DispatchOutcome> {
    let turn_id = forked_memory.id().unwrap_or_else(Uuid::new_v4);
    let sender = active_agent.name().to_string();
    let hook_ctx = HookContext { run_id, turn_id };

    let mut handoff_calls = Vec::new();
    let mut value_calls = Vec::new();
    for call in &batch.calls {
        match active_agent.tool_by_name(&call.name) {
            Some(tool) if tool.is_handoff() => handoff_calls.push(call),
            // Unknown tools cannot be classified as handoffs; they land in
            // the value partition and are resolved (and may error) there,
            // unless a preceding handoff short-circuits first.
            _ => value_calls.push(call),
        }
    }

    let mut scope = context_vars;

    for call in handoff_calls.into_iter().chain(value_calls) {
        let Some(tool) = active_agent.tool_by_name(&call.name) else {
            return Err(AgentError::UnknownTool {
                tool_name: call.name.clone(),
                context: ErrorContext::new(run_id, turn_id, sender.clone()),
            });
        };

        let args = coerce_args(&call.arguments);
        let outcome = tool.invoke(args, scope.clone()).await;

        match outcome {
            ToolOutcome::Value(content) => {
                append_response(forked_memory, hook, hook_ctx, run_id, turn_id, &sender, call, content).await;
            }
            ToolOutcome::Ctx(delta) => {
                scope.extend(delta);
                append_response(forked_memory, hook, hook_ctx, run_id, turn_id, &sender, call, String::new())
                    .await;
            }
            ToolOutcome::Handoff(agent) => {
                append_response(forked_memory, hook, hook_ctx, run_id, turn_id, &sender, call, String::new())
                    .await;
                return Ok(DispatchOutcome {
                    handoff: Some(agent),
                    context_vars: scope,
                });
            }
            ToolOutcome::Err(err) => return Err(err),
        }
    }

    Ok(DispatchOutcome {
        handoff: None,
        context_vars: scope,
    })
}

async fn append_response(
    forked_memory: &mut MemoryAggregator,
    hook: &dyn Hook,
    hook_ctx: HookContext,
    run_id: Uuid,
    turn_id: Uuid,
    sender: &str,
    call: &ToolCall,
    content: String,
) {
    let message = Message::tool_response(
        run_id,
        turn_id,
        sender,
        ToolResponsePayload {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            content,
        },
    );
    forked_memory.append(message.clone());
    hook.on_tool_call_response(hook_ctx, &message).await;
}
