//! The orchestrator: runs a sequence of (agent, task) steps over a registry
//! of agents, routing only the final step's output to the caller hook via
//! its promise.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info_span, Instrument};
use uuid::Uuid;

use crate::agent::Agent;
use crate::context::CancellationToken;
use crate::error::{AgentError, Result};
use crate::hook::{Hook, HookContext, NoopHook};
use crate::memory::MemoryAggregator;
use crate::message::Message;
use crate::promise::{DeferredPromise, ExecutionContext, ResultMode};
use crate::provider::StructuredOutputDescriptor;
use crate::reactor::{self, RunCommand};
use crate::tool::ContextVars;

/// A step's task: either a literal string, wrapped into a synthesized
/// `UserPrompt` message, or a pre-formed message.
#[derive(Debug, Clone)]
pub enum Task {
    Text(String),
    Message(Message),
}

impl From<String> for Task {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Task {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Message> for Task {
    fn from(message: Message) -> Self {
        Self::Message(message)
    }
}

/// One (agent, task) pair in an orchestrator's step list.
#[derive(Debug, Clone)]
pub struct Step {
    pub agent_name: String,
    pub task: Task,
}

/// Caller-visible parameters for an orchestrator run: the hook, requested
/// result mode, streaming flag, max-turns bound, initial context variables,
/// and an optional structured-output descriptor applied only to the final
/// step.
pub struct RunOptions {
    pub hook: Arc<dyn Hook>,
    pub result_mode: ResultMode,
    pub streaming: bool,
    pub max_turns: usize,
    pub context_vars: ContextVars,
    pub structured_output: Option<StructuredOutputDescriptor>,
    pub cancellation: CancellationToken,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            hook: Arc::new(NoopHook),
            result_mode: ResultMode::String,
            streaming: false,
            max_turns: 25,
            context_vars: ContextVars::new(),
            structured_output: None,
            cancellation: CancellationToken::new(),
        }
    }
}

/// Holds a caller name (sender for synthesized user prompts), an ordered
/// list of steps, and a read-only agent registry built at construction.
pub struct Orchestrator {
    caller: String,
    steps: Vec<Step>,
    agents: HashMap<String, Agent>,
}

impl Orchestrator {
    #[must_use]
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Runs every step in order against a freshly created memory aggregator
    /// per step, joined back into a caller-visible memory as it accumulates.
    /// Intermediate steps route their promise through a no-op sink; only the
    /// final step's promise is observed by `options.hook`. On any step
    /// error, remaining steps are aborted and the error is returned.
    pub async fn run(&self, options: RunOptions) -> Result<MemoryAggregator> {
        let run_id = Uuid::new_v4();
        let mut caller_memory = MemoryAggregator::new();

        if self.steps.is_empty() {
            options.hook.on_close(HookContext {
                run_id,
                turn_id: Uuid::new_v4(),
            }).await;
            return Ok(caller_memory);
        }

        let last_index = self.steps.len() - 1;

        for (index, step) in self.steps.iter().enumerate() {
            let span = info_span!("reactor", step = index, agent = %step.agent_name);
            let outcome = self
                .run_step(run_id, index, last_index, step, &options, &mut caller_memory)
                .instrument(span)
                .await;

            if let Err(err) = outcome {
                error!(step = index, error = %err, "step failed, aborting remaining steps");
                return Err(err);
            }
        }

        Ok(caller_memory)
    }

    /// Runs a single step, then decides whether this execution context's
    /// `on_close` fires: always for the final planned step, and also for
    /// any earlier step that errors — since an error there ends the whole
    /// orchestrator run, it is the last thing the hook ever observes, and
    /// "on_close fires exactly once, preceded by exactly one of
    /// on_result/on_error" must still hold for that run.
    async fn run_step(
        &self,
        run_id: Uuid,
        index: usize,
        last_index: usize,
        step: &Step,
        options: &RunOptions,
        caller_memory: &mut MemoryAggregator,
    ) -> Result<()> {
        let turn_id = Uuid::new_v4();
        let hook_ctx = HookContext { run_id, turn_id };
        let is_final = index == last_index;
        let exec = ExecutionContext {
            hook: options.hook.clone(),
            promise: DeferredPromise::new(),
            structured_output: if is_final {
                options.structured_output.clone()
            } else {
                None
            },
            context_vars: options.context_vars.clone(),
            streaming: options.streaming,
            max_turns: options.max_turns,
            cancellation: options.cancellation.clone(),
        };

        let outcome = self
            .run_step_body(run_id, turn_id, step, options, &exec, caller_memory)
            .await;

        if is_final || outcome.is_err() {
            exec.close(hook_ctx, &options.result_mode).await;
        }

        outcome
    }

    async fn run_step_body(
        &self,
        run_id: Uuid,
        turn_id: Uuid,
        step: &Step,
        options: &RunOptions,
        exec: &ExecutionContext,
        caller_memory: &mut MemoryAggregator,
    ) -> Result<()> {
        let agent = self
            .agents
            .get(&step.agent_name)
            .ok_or_else(|| AgentError::validation(format!("unknown agent '{}'", step.agent_name)))?
            .clone();

        let mut memory = MemoryAggregator::new();
        let prompt_message = match &step.task {
            Task::Text(text) => Message::user_prompt(run_id, turn_id, &self.caller, text.clone()),
            Task::Message(message) => message.clone(),
        };
        memory.append(prompt_message.clone());

        let hook_ctx = HookContext { run_id, turn_id };
        options.hook.on_user_prompt(hook_ctx, &prompt_message).await;

        debug!(agent = %agent.name(), "starting step");

        let command = RunCommand {
            run_id,
            turn_id,
            agent,
            memory,
        };

        let final_memory = reactor::run(command, exec).await?;
        caller_memory.join(&final_memory);
        Ok(())
    }
}

/// Fluent constructor for [`Orchestrator`].
#[derive(Default)]
pub struct OrchestratorBuilder {
    caller: String,
    steps: Vec<Step>,
    agents: HashMap<String, Agent>,
}

impl OrchestratorBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            caller: "user".to_string(),
            steps: Vec::new(),
            agents: HashMap::new(),
        }
    }

    #[must_use]
    pub fn caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = caller.into();
        self
    }

    #[must_use]
    pub fn agent(mut self, agent: Agent) -> Self {
        self.agents.insert(agent.name().to_string(), agent);
        self
    }

    #[must_use]
    pub fn agents(mut self, agents: impl IntoIterator<Item = Agent>) -> Self {
        for agent in agents {
            self = self.agent(agent);
        }
        self
    }

    #[must_use]
    pub fn step(mut self, agent_name: impl Into<String>, task: impl Into<Task>) -> Self {
        self.steps.push(Step {
            agent_name: agent_name.into(),
            task: task.into(),
        });
        self
    }

    #[must_use]
    pub fn build(self) -> Orchestrator {
        Orchestrator {
            caller: self.caller,
            steps: self.steps,
            agents: self.agents,
        }
    }
}
