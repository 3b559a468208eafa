//! Integration tests for the agentry conversation execution core.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;

use agentry::prelude::*;
use agentry::providers::mock::ScriptedProvider;
use agentry::stream_event::StreamEvent;
use agentry::tool::{fn_tool, ToolOutcome};
use chrono::Utc;

fn scripted_agent(name: &str, script: Vec<Vec<StreamEvent>>, tools: Vec<agentry::tool::ToolDefinition>) -> Agent {
    Agent::builder()
        .name(name)
        .model(ModelHandle::new(name, Arc::new(ScriptedProvider::new(script))))
        .tools(tools)
        .build()
        .unwrap()
}

fn text_response(run_id: uuid::Uuid, turn_id: uuid::Uuid, text: &str) -> StreamEvent {
    StreamEvent::AssistantResponse {
        run_id,
        turn_id,
        checkpoint: MemoryAggregator::new().snapshot(),
        response: AssistantPayload::Text(text.to_string()),
        timestamp: Utc::now(),
        meta: serde_json::json!({}),
    }
}

#[tokio::test]
async fn single_step_orchestrator_run_reaches_the_hook() {
    let run_id = uuid::Uuid::new_v4();
    let turn_id = uuid::Uuid::new_v4();
    let agent = scripted_agent("assistant", vec![vec![text_response(run_id, turn_id, "hello there")]], vec![]);

    let orchestrator = Orchestrator::builder().agent(agent).step("assistant", "hi").build();

    let hook = Arc::new(RecordingHook::new());
    let options = RunOptions {
        hook: hook.clone(),
        ..RunOptions::default()
    };
    orchestrator.run(options).await.unwrap();

    let events = hook.events();
    assert!(events
        .iter()
        .any(|e| matches!(e, agentry::hook::HookEvent::Result(v) if v == &serde_json::json!("hello there"))));
    assert!(matches!(events.last(), Some(agentry::hook::HookEvent::Close)));
}

#[tokio::test]
async fn handoff_chains_two_agents_across_the_orchestrator() {
    let run_id = uuid::Uuid::new_v4();
    let turn_id = uuid::Uuid::new_v4();

    let specialist = scripted_agent(
        "specialist",
        vec![vec![text_response(run_id, turn_id, "specialist answer")]],
        vec![],
    );

    let transfer_target = specialist.clone();
    let transfer_tool = agentry::tool::ToolDefinition::handoff(
        "transfer_to_specialist",
        "Hand off to the specialist agent.",
        serde_json::json!({"type": "object", "properties": {}}),
        vec![],
        fn_tool(move |_args, _cv| {
            let target = transfer_target.clone();
            Box::pin(async move { ToolOutcome::Handoff(target) })
        }),
    );

    let triage = scripted_agent(
        "triage",
        vec![vec![StreamEvent::ToolCallResponse {
            run_id,
            turn_id,
            checkpoint: MemoryAggregator::new().snapshot(),
            response: agentry::message::ToolCallBatch {
                calls: vec![agentry::message::ToolCall {
                    id: "call-1".into(),
                    name: "transfer_to_specialist".into(),
                    arguments: serde_json::json!({}),
                }],
            },
            timestamp: Utc::now(),
            meta: serde_json::json!({}),
        }]],
        vec![transfer_tool],
    );

    let orchestrator = Orchestrator::builder()
        .agent(triage)
        .agent(specialist)
        .step("triage", "I need help")
        .build();

    let hook = Arc::new(RecordingHook::new());
    let options = RunOptions {
        hook: hook.clone(),
        ..RunOptions::default()
    };
    let memory = orchestrator.run(options).await.unwrap();

    assert_eq!(
        memory.last().unwrap().as_assistant_text().as_deref(),
        Some("specialist answer")
    );

    let events = hook.events();
    assert!(events
        .iter()
        .any(|e| matches!(e, agentry::hook::HookEvent::Result(v) if v == &serde_json::json!("specialist answer"))));
}

#[tokio::test]
async fn max_turns_exceeded_surfaces_through_on_error_then_on_close() {
    let run_id = uuid::Uuid::new_v4();
    let turn_id = uuid::Uuid::new_v4();

    let looping_batch = StreamEvent::ToolCallResponse {
        run_id,
        turn_id,
        checkpoint: MemoryAggregator::new().snapshot(),
        response: agentry::message::ToolCallBatch {
            calls: vec![agentry::message::ToolCall {
                id: "call-1".into(),
                name: "noop".into(),
                arguments: serde_json::json!({}),
            }],
        },
        timestamp: Utc::now(),
        meta: serde_json::json!({}),
    };

    let noop_tool = agentry::tool::ToolDefinition::value(
        "noop",
        "does nothing of consequence",
        serde_json::json!({"type": "object", "properties": {}}),
        vec![],
        fn_tool(|_args, _cv| Box::pin(async move { ToolOutcome::Value(String::new()) })),
    );

    let provider = ScriptedProvider::repeating(vec![looping_batch]);
    let agent = Agent::builder()
        .name("looper")
        .model(ModelHandle::new("looper", Arc::new(provider)))
        .tool(noop_tool)
        .build()
        .unwrap();

    let orchestrator = Orchestrator::builder().agent(agent).step("looper", "go").build();

    let hook = Arc::new(RecordingHook::new());
    let options = RunOptions {
        hook: hook.clone(),
        max_turns: 2,
        ..RunOptions::default()
    };
    let err = orchestrator.run(options).await.unwrap_err();
    assert!(matches!(err, AgentError::MaxTurnsExceeded { .. }));

    let events = hook.events();
    let error_pos = events
        .iter()
        .position(|e| matches!(e, agentry::hook::HookEvent::Error(_)))
        .expect("on_error fired");
    let close_pos = events
        .iter()
        .position(|e| matches!(e, agentry::hook::HookEvent::Close))
        .expect("on_close fired");
    assert!(error_pos < close_pos);
    assert!(!events.iter().any(|e| matches!(e, agentry::hook::HookEvent::Result(_))));
}
