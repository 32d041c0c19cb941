//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency is written, the effect is queued. It runs once
//!    the write, or the enclosing batch, completes; several writes in one
//!    batch still cost a single run.
//!
//! 3. Every run re-tracks from scratch: producers the body stopped reading
//!    no longer trigger it.
//!
//! # Differences from Memo
//!
//! - Memos return a value; effects do not.
//! - Memos are lazy (compute on access); effects are eager (run when deps change).
//! - Nothing can depend on an effect.
//!
//! # Disposal
//!
//! [`Effect::dispose`] detaches the effect from the graph for good. Dropping
//! the last handle does the same.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::context::{sources_unchanged, ReactiveContext, Sources};
use super::runtime::Runtime;
use super::subscriber::Subscriber;
use crate::error::ReactiveError;
use crate::graph::{DirtyState, Node, NodeId};

type RunFn = Box<dyn Fn() -> Result<(), ReactiveError> + Send + Sync>;

struct EffectInner {
    id: NodeId,
    run: RunFn,
    sources: Mutex<Sources>,
    disposed: AtomicBool,
    run_count: AtomicUsize,
    last_error: Mutex<Option<ReactiveError>>,
}

impl EffectInner {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Run the body in a fresh tracking frame and rewire to what it read.
    fn execute(&self) -> Result<(), ReactiveError> {
        if self.is_disposed() {
            return Err(ReactiveError::Disposed { node: self.id });
        }
        if ReactiveContext::is_evaluating(self.id) {
            return Err(ReactiveError::CyclicDependency { node: self.id });
        }

        let _domain = Runtime::lock();
        let _span = tracing::trace_span!("effect", node = %self.id).entered();

        Runtime::mark_dirty(self.id);

        let context = ReactiveContext::enter(self.id);
        let result = (self.run)();
        let reads = context.finish();

        // The body may have disposed its own effect
        if self.is_disposed() {
            drop(reads);
        } else {
            Runtime::install_sources(self.id, &self.sources, reads);
            if result.is_ok() {
                Runtime::settle(self.id, false);
            }
        }

        self.run_count.fetch_add(1, Ordering::SeqCst);
        *self.last_error.lock() = result.clone().err();

        if let Err(error) = &result {
            tracing::warn!(node = %self.id, %error, "effect run failed");
        }
        result
    }

    fn detach(&self) {
        Runtime::unregister(self.id);
        let previous = std::mem::take(&mut *self.sources.lock());
        drop(previous);
    }
}

impl Subscriber for EffectInner {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn run(&self) -> Result<(), ReactiveError> {
        if self.is_disposed() {
            return Ok(());
        }

        let _domain = Runtime::lock();
        if Runtime::dirty_state(self.id) != DirtyState::Dirty && sources_unchanged(&self.sources) {
            Runtime::settle(self.id, false);
            return Ok(());
        }

        self.execute()
    }

    fn abort(&self, error: ReactiveError) {
        *self.last_error.lock() = Some(error);
    }
}

impl Drop for EffectInner {
    fn drop(&mut self) {
        if !self.is_disposed() {
            Runtime::unregister(self.id);
        }
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// Clones share the same effect. The effect stays subscribed until
/// [`dispose`](Effect::dispose) is called or the last clone is dropped.
///
/// # Example
///
/// ```rust
/// use ripple_core::{Effect, Signal};
/// use std::sync::atomic::{AtomicI32, Ordering};
/// use std::sync::Arc;
///
/// let count = Signal::new(0);
/// let seen = Arc::new(AtomicI32::new(-1));
///
/// let effect = Effect::new({
///     let count = count.clone();
///     let seen = seen.clone();
///     move || seen.store(count.get(), Ordering::SeqCst)
/// });
/// assert_eq!(seen.load(Ordering::SeqCst), 0);
///
/// count.set(5);
/// assert_eq!(seen.load(Ordering::SeqCst), 5);
///
/// effect.dispose();
/// count.set(6);
/// assert_eq!(seen.load(Ordering::SeqCst), 5);
/// ```
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::new_fallible(move || {
            run();
            Ok(())
        })
    }

    /// Create an effect whose body can fail.
    ///
    /// Failures are logged and kept in [`Effect::last_error`]; the effect
    /// stays subscribed to whatever it read before failing.
    pub fn new_fallible<F>(run: F) -> Self
    where
        F: Fn() -> Result<(), ReactiveError> + Send + Sync + 'static,
    {
        let _domain = Runtime::lock();

        let id = NodeId::new();
        let inner = Arc::new(EffectInner {
            id,
            run: Box::new(run),
            sources: Mutex::new(Sources::new()),
            disposed: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
            last_error: Mutex::new(None),
        });

        let subscriber: Weak<dyn Subscriber> = Arc::downgrade(&inner) as Weak<dyn Subscriber>;
        Runtime::register(Node::effect(id, subscriber));

        // The outcome is already logged and stored in last_error
        let _ = inner.execute();

        Self { inner }
    }

    /// Get the effect's node ID.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Run the effect now, regardless of whether anything changed.
    ///
    /// Returns [`ReactiveError::Disposed`] once the effect was disposed.
    pub fn execute(&self) -> Result<(), ReactiveError> {
        self.inner.execute()
    }

    /// Dispose of the effect.
    ///
    /// Removes it from every producer it depends on and from the pending
    /// queue. After disposal the effect never runs again. Calling this more
    /// than once is a no-op.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.detach();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Get the number of producers read during the last run.
    pub fn dependency_count(&self) -> usize {
        Runtime::dependency_count(self.inner.id)
    }

    /// The error from the most recent run, if it failed.
    pub fn last_error(&self) -> Option<ReactiveError> {
        self.inner.last_error.lock().clone()
    }
}

impl Clone for Effect {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
