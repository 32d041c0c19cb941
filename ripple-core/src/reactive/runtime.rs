//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, memos, and
//! effects. It owns the dependency graph and the batch scheduler, and it
//! drives effect flushes.
//!
//! # How It Works
//!
//! 1. Creating a signal, memo, or effect registers a node with the runtime.
//!
//! 2. When a memo or effect finishes an evaluation, the runtime rewires its
//!    node to exactly the producers it read.
//!
//! 3. When a signal's value changes, the runtime:
//!    a. Bumps the signal's version
//!    b. Marks every reachable memo and effect as "maybe dirty"
//!    c. Enqueues the reached effects
//!    d. Flushes the queue unless a batch is open
//!
//!    Memos are lazy; they revalidate on next access.
//!
//! # Thread Safety
//!
//! There is one graph per process, created on first use. It sits behind a
//! single re-entrant mutex: every public operation holds the lock for its
//! whole duration, so operations from different threads never interleave,
//! while compute and effect bodies can call back into the runtime from the
//! thread already holding it. The graph table itself is only borrowed for
//! short, non-reentrant bookkeeping steps and never while user code runs.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::OnceLock;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use super::context::{Dependency, ReactiveContext, Sources};
use crate::config::RuntimeConfig;
use crate::error::{ConfigError, ReactiveError};
use crate::graph::{BatchScheduler, DependencyGraph, DirtyState, Node, NodeId};

#[derive(Default)]
struct RuntimeState {
    graph: DependencyGraph,
    scheduler: BatchScheduler,
    config: RuntimeConfig,
}

static RUNTIME: OnceLock<ReentrantMutex<RefCell<RuntimeState>>> = OnceLock::new();

fn runtime() -> &'static ReentrantMutex<RefCell<RuntimeState>> {
    RUNTIME.get_or_init(|| ReentrantMutex::new(RefCell::new(RuntimeState::default())))
}

/// Proof that the current thread holds the runtime's mutual-exclusion domain.
pub(crate) struct DomainGuard {
    _guard: ReentrantMutexGuard<'static, RefCell<RuntimeState>>,
}

/// Closes a batch on every exit path.
struct BatchGuard;

impl Drop for BatchGuard {
    fn drop(&mut self) {
        Runtime::with_state(|state| state.scheduler.exit());
    }
}

/// Releases the flush claim on every exit path.
struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        Runtime::with_state(|state| state.scheduler.end_flush());
    }
}

/// The global reactive runtime.
///
/// This is a singleton that manages all reactive values in the process.
pub struct Runtime;

impl Runtime {
    /// Acquire the runtime's domain for the current operation.
    pub(crate) fn lock() -> DomainGuard {
        DomainGuard {
            _guard: runtime().lock(),
        }
    }

    /// Run a short bookkeeping step against the runtime state.
    ///
    /// `f` must not call back into the runtime or drop producer handles.
    fn with_state<R>(f: impl FnOnce(&mut RuntimeState) -> R) -> R {
        let guard = runtime().lock();
        let mut state = guard.borrow_mut();
        f(&mut state)
    }

    // ------------------------------------------------------------------------
    // Node lifecycle
    // ------------------------------------------------------------------------

    /// Register a node with the runtime.
    pub(crate) fn register(node: Node) -> NodeId {
        let kind = node.kind();
        let id = Self::with_state(|state| state.graph.add_node(node));
        tracing::debug!(node = %id, ?kind, "registered reactive node");
        id
    }

    /// Remove a node, all its edges, and any pending run.
    pub(crate) fn unregister(id: NodeId) {
        let removed = Self::with_state(|state| {
            state.scheduler.dequeue(id);
            state.graph.remove_node(id).is_some()
        });
        if removed {
            tracing::debug!(node = %id, "unregistered reactive node");
        }
    }

    // ------------------------------------------------------------------------
    // Versioning and staleness
    // ------------------------------------------------------------------------

    pub(crate) fn version(id: NodeId) -> u64 {
        Self::with_state(|state| state.graph.version(id))
    }

    pub(crate) fn dirty_state(id: NodeId) -> DirtyState {
        Self::with_state(|state| state.graph.dirty_state(id))
    }

    pub(crate) fn mark_dirty(id: NodeId) {
        Self::with_state(|state| {
            if let Some(node) = state.graph.get_node_mut(id) {
                node.mark_dirty();
            }
        });
    }

    /// Mark a node clean after a successful evaluation, bumping its version
    /// if the evaluation changed its value.
    pub(crate) fn settle(id: NodeId, changed: bool) {
        Self::with_state(|state| {
            if let Some(node) = state.graph.get_node_mut(id) {
                node.mark_clean();
                if changed {
                    node.bump_version();
                }
            }
        });
    }

    pub(crate) fn dependent_count(id: NodeId) -> usize {
        Self::with_state(|state| state.graph.dependent_count(id))
    }

    pub(crate) fn dependency_count(id: NodeId) -> usize {
        Self::with_state(|state| state.graph.dependency_count(id))
    }

    /// Point `consumer` at exactly the producers in `reads` and store them as
    /// its new source list.
    ///
    /// The previous source list is released only after the graph borrow and
    /// the slot lock are gone, since it may hold the last reference to a
    /// producer whose drop unregisters it.
    pub(crate) fn install_sources(
        consumer: NodeId,
        slot: &parking_lot::Mutex<Sources>,
        reads: Vec<Dependency>,
    ) {
        let ids: Vec<NodeId> = reads.iter().map(Dependency::node_id).collect();
        let (added, removed) = Self::with_state(|state| state.graph.rewire(consumer, &ids));
        if added + removed > 0 {
            tracing::trace!(node = %consumer, added, removed, "rewired dependencies");
        }

        let previous = std::mem::replace(&mut *slot.lock(), reads.into_iter().collect());
        drop(previous);
    }

    // ------------------------------------------------------------------------
    // Propagation and scheduling
    // ------------------------------------------------------------------------

    /// Record a write to `source` and propagate it.
    ///
    /// Outside a batch the write is its own implicit batch, so pending
    /// effects are flushed before this returns.
    pub(crate) fn notify_change(source: NodeId) {
        let _domain = Self::lock();

        let flush_now = Self::with_state(|state| {
            if let Some(node) = state.graph.get_node_mut(source) {
                node.bump_version();
            }
            let effects = state.graph.mark_changed(source);
            tracing::trace!(node = %source, effects = effects.len(), "propagated change");
            for effect in effects {
                state.scheduler.enqueue(effect);
            }
            !state.scheduler.is_batching()
        });

        if flush_now {
            Self::flush();
        }
    }

    /// Run every pending effect once, in first-enqueued order.
    ///
    /// Effects enqueued while the flush runs join the end of the queue. A
    /// failing effect is reported and the rest still run. Returns the number
    /// of effect runs attempted.
    pub(crate) fn flush() -> usize {
        let _domain = Self::lock();

        let (claimed, limit) = Self::with_state(|state| {
            (
                state.scheduler.begin_flush(),
                state.config.max_reruns_per_flush,
            )
        });
        if !claimed {
            return 0;
        }
        let _flushing = FlushGuard;

        let mut runs: HashMap<NodeId, usize> = HashMap::new();
        let mut ran = 0;
        let mut failed = 0;

        loop {
            let next = Self::with_state(|state| {
                let id = state.scheduler.pop_front()?;
                Some((id, state.graph.subscriber(id)))
            });
            let Some((id, subscriber)) = next else {
                break;
            };
            let Some(subscriber) = subscriber.and_then(|weak| weak.upgrade()) else {
                continue;
            };

            let count = runs.entry(id).or_insert(0);
            *count += 1;
            if *count > limit {
                let error = ReactiveError::FlushLimitExceeded { node: id, limit };
                tracing::error!(node = %id, limit, "effect keeps re-triggering itself, dropping it from this flush");
                subscriber.abort(error);
                failed += 1;
                continue;
            }

            ran += 1;
            if let Err(error) = subscriber.run() {
                failed += 1;
                tracing::warn!(node = %id, %error, "effect failed during flush");
            }
        }

        if ran > 0 || failed > 0 {
            tracing::debug!(ran, failed, "flushed pending effects");
        }
        ran
    }

    // ------------------------------------------------------------------------
    // Public surface
    // ------------------------------------------------------------------------

    /// Run `f` as one transaction.
    ///
    /// Writes inside `f` mark and enqueue as usual, but effects only run once
    /// the outermost batch returns, each at most once. Batches nest.
    ///
    /// If `f` panics the batch is still closed; effects it already queued
    /// stay pending until the next flush.
    pub fn batch<R>(f: impl FnOnce() -> R) -> R {
        let _domain = Self::lock();

        Self::with_state(|state| state.scheduler.enter());
        let guard = BatchGuard;
        let result = f();
        drop(guard);

        Self::flush();
        result
    }

    /// Like [`Runtime::batch`], for fallible bodies.
    ///
    /// On `Err` the batch is closed without flushing: effects that were
    /// queued before the failure wait for the next flush opportunity, and
    /// the error is returned to the caller.
    pub fn try_batch<R, E>(f: impl FnOnce() -> Result<R, E>) -> Result<R, E> {
        let _domain = Self::lock();

        Self::with_state(|state| state.scheduler.enter());
        let guard = BatchGuard;
        let result = f();
        drop(guard);

        let value = result?;
        Self::flush();
        Ok(value)
    }

    /// Run `f` without tracking any reads it performs.
    pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
        ReactiveContext::untracked(f)
    }

    /// Check if a batch is currently open.
    pub fn is_batching() -> bool {
        Self::with_state(|state| state.scheduler.is_batching())
    }

    /// Check if we're inside a tracked evaluation.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }

    /// Get the node currently being evaluated on this thread, if any.
    pub fn current_subscriber() -> Option<NodeId> {
        ReactiveContext::current_subscriber()
    }

    /// Number of effects waiting for the next flush.
    pub fn pending_effects() -> usize {
        Self::with_state(|state| state.scheduler.pending_count())
    }

    /// Number of live nodes in the graph.
    pub fn node_count() -> usize {
        Self::with_state(|state| state.graph.node_count())
    }

    /// Install a new configuration.
    pub fn configure(config: RuntimeConfig) -> Result<(), ConfigError> {
        config.validate()?;
        tracing::debug!(?config, "runtime reconfigured");
        Self::with_state(|state| state.config = config);
        Ok(())
    }

    /// The configuration currently in effect.
    pub fn config() -> RuntimeConfig {
        Self::with_state(|state| state.config.clone())
    }
}

/// Run `f` as one batch. See [`Runtime::batch`].
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    Runtime::batch(f)
}

/// Run `f` without tracking reads. See [`Runtime::untracked`].
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    Runtime::untracked(f)
}
