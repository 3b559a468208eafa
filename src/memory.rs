//! The short-term memory aggregator: an ordered, append-only message log
//! with fork/join semantics and checkpoint snapshots.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::Message;
use crate::usage::Usage;

/// An immutable snapshot of a memory aggregator, produced by
/// [`MemoryAggregator::snapshot`] and reported by the provider alongside a
/// `Response` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: Uuid,
    pub messages: Vec<Message>,
    pub usage: Usage,
    pub init_len: usize,
}

/// Ordered message log plus cumulative usage, supporting fork/join so that
/// partial tool-batch work can be discarded if a downstream handoff
/// invalidates it.
#[derive(Debug, Clone)]
pub struct MemoryAggregator {
    id: Option<Uuid>,
    messages: Vec<Message>,
    usage: Usage,
    init_len: usize,
}

impl MemoryAggregator {
    /// A fresh aggregator: unidentified, empty, `init_len = 0`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: None,
            messages: Vec::new(),
            usage: Usage::zero(),
            init_len: 0,
        }
    }

    #[must_use]
    pub const fn id(&self) -> Option<Uuid> {
        self.id
    }

    #[must_use]
    pub const fn init_len(&self) -> usize {
        self.init_len
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages added since this aggregator was created or forked.
    #[must_use]
    pub fn turn_length(&self) -> usize {
        self.len() - self.init_len
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    #[must_use]
    pub const fn usage(&self) -> Usage {
        self.usage
    }

    pub fn add_usage(&mut self, delta: Usage) {
        self.usage += delta;
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Returns a sibling with a new id, a cloned message list, and
    /// `init_len = self.len()`. Subsequent appends accumulate in the fork
    /// only — the parent is untouched until [`MemoryAggregator::join`].
    #[must_use]
    pub fn fork(&self) -> Self {
        Self {
            id: Some(Uuid::new_v4()),
            messages: self.messages.clone(),
            usage: Usage::zero(),
            init_len: self.messages.len(),
        }
    }

    /// Appends `other`'s messages added since its own fork/creation, and
    /// adds its usage. Does not modify `other`.
    pub fn join(&mut self, other: &Self) {
        self.messages.extend_from_slice(&other.messages[other.init_len..]);
        self.usage += other.usage;
    }

    /// Produces an immutable checkpoint capturing this aggregator's current
    /// state.
    #[must_use]
    pub fn snapshot(&self) -> Checkpoint {
        Checkpoint {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            messages: self.messages.clone(),
            usage: self.usage,
            init_len: self.init_len,
        }
    }

    /// Appends `checkpoint.messages[checkpoint.init_len:]`, adds usage, and
    /// adopts `checkpoint.id` iff this aggregator is still unidentified.
    pub fn merge_checkpoint(&mut self, checkpoint: &Checkpoint) {
        self.messages
            .extend_from_slice(&checkpoint.messages[checkpoint.init_len..]);
        self.usage += checkpoint.usage;
        if self.id.is_none() {
            self.id = Some(checkpoint.id);
        }
    }
}

impl Default for MemoryAggregator {
    fn default() -> Self {
        Self::new()
    }
}
