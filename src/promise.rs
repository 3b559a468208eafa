//! The execution context and its deferred promise.
//!
//! A [`DeferredPromise`] buffers either a terminal string result or an error
//! behind an idempotent "set once" guard, then hands that buffered outcome to
//! [`ExecutionContext::close`], which decodes it into the caller's requested
//! shape and forwards it to the hook's `on_result`/`on_error`, followed by
//! `on_close`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::context::CancellationToken;
use crate::error::{AgentError, Result};
use crate::hook::{Hook, HookContext};
use crate::provider::StructuredOutputDescriptor;
use crate::tool::ContextVars;

/// The buffered terminal outcome of a run, set at most once.
enum Outcome {
    Value(String),
    Error(AgentError),
}

struct PromiseState {
    completed: AtomicBool,
    outcome: Mutex<Option<Outcome>>,
}

/// A one-shot, idempotent completion slot. Cheaply cloneable — every clone
/// observes the same underlying state.
#[derive(Clone)]
pub struct DeferredPromise {
    state: Arc<PromiseState>,
}

impl DeferredPromise {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(PromiseState {
                completed: AtomicBool::new(false),
                outcome: Mutex::new(None),
            }),
        }
    }

    /// Completes the promise with a successful terminal value. Ignored if
    /// the promise was already completed — the reactor never completes a
    /// promise more than once.
    pub fn complete_value(&self, text: impl Into<String>) {
        self.complete(Outcome::Value(text.into()));
    }

    /// Completes the promise with an error. Ignored if already completed.
    pub fn complete_error(&self, err: AgentError) {
        self.complete(Outcome::Error(err));
    }

    fn complete(&self, outcome: Outcome) {
        if self
            .state
            .completed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *self.state.outcome.lock().unwrap_or_else(|e| e.into_inner()) = Some(outcome);
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state.completed.load(Ordering::SeqCst)
    }

    /// Takes the buffered outcome, leaving `None` behind. Returns `None` if
    /// the promise was never completed (e.g. zero steps ran).
    fn take(&self) -> Option<Outcome> {
        self.state.outcome.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

impl Default for DeferredPromise {
    fn default() -> Self {
        Self::new()
    }
}

/// A decoder bound to a caller's requested type `T`, erased to a plain
/// `&str -> Result<Value>` function so [`ResultMode`] can carry it without
/// itself being generic. Built by [`ResultMode::typed`].
pub type TypedDecoder = Arc<dyn Fn(&str) -> Result<Value> + Send + Sync>;

/// The three terminal-content decoding modes.
pub enum ResultMode {
    /// Parse into a navigable dynamic tree; always succeeds (falls back to a
    /// JSON string leaf if the content isn't valid JSON).
    RawJson,
    /// Return the terminal content as-is.
    String,
    /// JSON-decode into a caller-supplied type; decode failures surface as
    /// the promise error instead of `on_result`.
    Typed(TypedDecoder),
}

impl ResultMode {
    /// Builds a [`ResultMode::Typed`] bound to `T`: the terminal text is
    /// decoded with [`decode_typed`] to validate it against `T`'s shape, and
    /// on success the original parsed JSON tree is what reaches
    /// `hook.on_result` (decoding through `T` only to validate, not to
    /// re-encode, so fields `T` doesn't know about aren't silently dropped).
    #[must_use]
    pub fn typed<T: DeserializeOwned>() -> Self {
        Self::Typed(Arc::new(|text: &str| {
            decode_typed::<T>(text)?;
            serde_json::from_str(text).map_err(AgentError::from)
        }))
    }
}

/// Decodes terminal text per [`ResultMode::RawJson`] — always succeeds.
#[must_use]
pub fn decode_raw_json(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Decodes terminal text into a typed value, surfacing decode failure as an
/// [`AgentError::Decode`]. Used by [`ResultMode::typed`] to validate the
/// terminal content against the caller's requested type.
pub fn decode_typed<T: DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| AgentError::Decode {
        message: e.to_string(),
    })
}

/// Per-step execution parameters: hook, promise, structured-output
/// descriptor, context variables, streaming flag, max-turns bound, and the
/// ambient cancellation signal.
pub struct ExecutionContext {
    pub hook: Arc<dyn Hook>,
    pub promise: DeferredPromise,
    pub structured_output: Option<StructuredOutputDescriptor>,
    pub context_vars: ContextVars,
    pub streaming: bool,
    pub max_turns: usize,
    pub cancellation: CancellationToken,
}

impl ExecutionContext {
    /// Forwards the buffered promise outcome to `hook.on_result` or
    /// `hook.on_error` (mutually exclusive), decoded per `mode`, then
    /// calls `hook.on_close`. Invoked exactly once per step, regardless of
    /// whether the step succeeded, failed, or was never reached.
    pub async fn close(&self, hook_ctx: HookContext, mode: &ResultMode) {
        match self.promise.take() {
            Some(Outcome::Value(text)) => match mode {
                ResultMode::RawJson => {
                    self.hook.on_result(hook_ctx, &decode_raw_json(&text)).await;
                }
                ResultMode::String => {
                    self.hook.on_result(hook_ctx, &Value::String(text)).await;
                }
                ResultMode::Typed(decode) => match decode(&text) {
                    Ok(value) => self.hook.on_result(hook_ctx, &value).await,
                    Err(err) => {
                        let typed = crate::hook::TypedError::new(hook_ctx, None, err);
                        self.hook.on_error(hook_ctx, &typed).await;
                    }
                },
            },
            Some(Outcome::Error(err)) => {
                let typed = crate::hook::TypedError::new(hook_ctx, None, err);
                self.hook.on_error(hook_ctx, &typed).await;
            }
            None => {}
        }
        self.hook.on_close(hook_ctx).await;
    }
}
