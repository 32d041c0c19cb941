//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal or memo is
//! read, the read is logged against the computation on top of the stack.
//!
//! # Implementation
//!
//! We use a thread-local stack of frames. Entering a memo or effect
//! evaluation pushes a frame; the returned guard pops it again, including
//! when the computation fails or panics. Each frame logs the producers read
//! during the evaluation together with the version observed, in first-read
//! order and without duplicates.
//!
//! Untracked scopes push a frame with no subscriber. Reads inside them are
//! not logged anywhere.

use std::cell::RefCell;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;

use super::subscriber::Source;
use crate::graph::NodeId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// A producer read during an evaluation, and the version it had then.
#[derive(Clone)]
pub(crate) struct Dependency {
    pub(crate) source: Arc<dyn Source>,
    pub(crate) version: u64,
}

impl Dependency {
    pub(crate) fn new(source: Arc<dyn Source>, version: u64) -> Self {
        Self { source, version }
    }

    pub(crate) fn node_id(&self) -> NodeId {
        self.source.node_id()
    }
}

/// The dependency list a consumer keeps between evaluations.
pub(crate) type Sources = SmallVec<[Dependency; 4]>;

/// Bring every recorded producer up to date, in read order, and check that
/// none of their versions moved.
///
/// Stops at the first producer that changed. A producer that fails to
/// refresh counts as changed.
pub(crate) fn sources_unchanged(slot: &Mutex<Sources>) -> bool {
    // Refreshing can run user code, so the slot lock is not held meanwhile
    let sources = slot.lock().clone();
    sources
        .iter()
        .all(|dep| matches!(dep.source.refresh(), Ok(version) if version == dep.version))
}

/// An entry in the reactive context stack.
struct ContextEntry {
    /// `None` for untracked scopes.
    subscriber_id: Option<NodeId>,
    reads: IndexMap<NodeId, Dependency>,
}

/// Guard that pops the context when dropped.
pub struct ReactiveContext {
    subscriber_id: Option<NodeId>,
    active: bool,
}

impl ReactiveContext {
    /// Enter a new evaluation frame for the given node.
    pub(crate) fn enter(subscriber_id: NodeId) -> Self {
        Self::push(Some(subscriber_id))
    }

    /// Enter a scope in which reads are not tracked.
    pub(crate) fn untracked_scope() -> Self {
        Self::push(None)
    }

    fn push(subscriber_id: Option<NodeId>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber_id,
                reads: IndexMap::new(),
            });
        });

        Self {
            subscriber_id,
            active: true,
        }
    }

    /// Pop the frame and hand back everything read inside it.
    pub(crate) fn finish(mut self) -> Vec<Dependency> {
        self.active = false;
        let entry = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());

        match entry {
            Some(entry) => {
                debug_assert_eq!(
                    entry.subscriber_id, self.subscriber_id,
                    "ReactiveContext mismatch on finish"
                );
                entry.reads.into_values().collect()
            }
            None => Vec::new(),
        }
    }

    /// Check if reads are currently being tracked.
    pub fn is_active() -> bool {
        Self::current_subscriber().is_some()
    }

    /// Get the node whose evaluation is on top of the stack, if any.
    pub fn current_subscriber() -> Option<NodeId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|entry| entry.subscriber_id))
    }

    /// Check whether `node` is being evaluated anywhere up the stack.
    pub fn is_evaluating(node: NodeId) -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .iter()
                .any(|entry| entry.subscriber_id == Some(node))
        })
    }

    /// Number of frames on this thread's stack.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }

    /// Record a read against the frame on top of the stack.
    ///
    /// Repeated reads of the same producer keep the first entry.
    pub(crate) fn track(dependency: Dependency) {
        let id = dependency.node_id();
        CONTEXT_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                if entry.subscriber_id.is_some() {
                    entry.reads.entry(id).or_insert(dependency);
                }
            }
        });
    }

    /// IDs of the producers read so far in the current frame.
    pub fn tracked_reads() -> Vec<NodeId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.reads.keys().copied().collect())
                .unwrap_or_default()
        })
    }

    /// Run `f` without tracking any of its reads.
    pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
        let _scope = Self::untracked_scope();
        f()
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        if !self.active {
            return;
        }

        // The popped reads may hold the last reference to a producer, so
        // they are released after the stack borrow ends.
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());

        if let Some(entry) = &popped {
            debug_assert_eq!(
                entry.subscriber_id, self.subscriber_id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.subscriber_id, entry.subscriber_id
            );
        }
        drop(popped);
    }
}
