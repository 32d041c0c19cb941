//! Batch Scheduler
//!
//! The scheduler holds the effects invalidated by writes until it is safe to
//! run them. It has no knowledge of values; it only counts batch nesting and
//! remembers which effect nodes are waiting.
//!
//! # Rules
//!
//! 1. Each effect is pending at most once, no matter how many writes reach it.
//! 2. Pending effects run in the order they were first enqueued.
//! 3. Nothing runs while a batch is open or a flush is already draining the
//!    queue. Only the outermost exit starts a flush.

use indexmap::IndexSet;

use super::node::NodeId;

/// Nesting counter plus the deduplicated queue of pending effects.
#[derive(Debug, Default)]
pub struct BatchScheduler {
    depth: usize,
    pending: IndexSet<NodeId>,
    flushing: bool,
}

impl BatchScheduler {
    /// Create a new empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a batch. Returns the new depth.
    pub fn enter(&mut self) -> usize {
        self.depth += 1;
        self.depth
    }

    /// Close a batch. Returns the remaining depth.
    pub fn exit(&mut self) -> usize {
        debug_assert!(self.depth > 0, "batch exit without matching enter");
        self.depth = self.depth.saturating_sub(1);
        self.depth
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_batching(&self) -> bool {
        self.depth > 0
    }

    /// Queue an effect. Returns `false` if it was already pending.
    pub fn enqueue(&mut self, node_id: NodeId) -> bool {
        self.pending.insert(node_id)
    }

    /// Drop an effect from the queue. Returns `true` if it was pending.
    pub fn dequeue(&mut self, node_id: NodeId) -> bool {
        self.pending.shift_remove(&node_id)
    }

    /// Take the oldest pending effect.
    pub fn pop_front(&mut self) -> Option<NodeId> {
        self.pending.shift_remove_index(0)
    }

    pub fn is_pending(&self, node_id: NodeId) -> bool {
        self.pending.contains(&node_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing
    }

    /// Claim the right to drain the queue.
    ///
    /// Fails while a batch is open or another flush is in progress.
    pub fn begin_flush(&mut self) -> bool {
        if self.flushing || self.depth > 0 {
            return false;
        }
        self.flushing = true;
        true
    }

    pub fn end_flush(&mut self) {
        self.flushing = false;
    }
}
