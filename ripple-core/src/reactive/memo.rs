//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. Creating a memo does not run it. The first read runs the computation
//!    and caches the result.
//!
//! 2. When read again with no intervening writes, returns the cached value.
//!
//! 3. A write upstream marks the memo "maybe dirty" without running it.
//!
//! 4. On next read, the memo walks the producers it read last time, in the
//!    order it read them, bringing each up to date and comparing versions.
//!
//! 5. If a version moved, recompute. Otherwise mark clean and return cache.
//!
//! Recomputing bumps the memo's own version only when the value actually
//! changed, so memos further down can stop at step 5.
//!
//! # Why This Matters
//!
//! - A signal changes
//! - 10 memos depend on it
//! - Only the memos actually read will recompute, each exactly once, even
//!   when they are reachable through several paths
//! - Memos that are never read stay dirty (no wasted work)

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::context::{sources_unchanged, Dependency, ReactiveContext, Sources};
use super::runtime::Runtime;
use super::subscriber::{Readable, Source};
use crate::error::ReactiveError;
use crate::graph::{DirtyState, Node, NodeId};

type ComputeFn<T> = Box<dyn Fn() -> Result<T, ReactiveError> + Send + Sync>;

struct MemoInner<T> {
    id: NodeId,
    compute: ComputeFn<T>,

    /// The cached value (None if never computed successfully).
    value: RwLock<Option<T>>,

    /// Producers read during the last evaluation, with the versions seen.
    sources: Mutex<Sources>,

    compute_count: AtomicUsize,

    /// Set while the latest evaluation ended in an error.
    failed: AtomicBool,
}

impl<T> MemoInner<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Return an up-to-date value, recomputing only if needed.
    fn update(&self) -> Result<T, ReactiveError> {
        if ReactiveContext::is_evaluating(self.id) {
            return Err(ReactiveError::CyclicDependency { node: self.id });
        }

        match Runtime::dirty_state(self.id) {
            DirtyState::Clean => {
                if let Some(value) = self.cached() {
                    return Ok(value);
                }
            }
            DirtyState::MaybeDirty => {
                if sources_unchanged(&self.sources) {
                    if let Some(value) = self.cached() {
                        Runtime::settle(self.id, false);
                        return Ok(value);
                    }
                }
            }
            DirtyState::Dirty => {}
        }

        self.recompute()
    }

    fn cached(&self) -> Option<T> {
        self.value.read().clone()
    }

    fn recompute(&self) -> Result<T, ReactiveError> {
        let _span = tracing::trace_span!("memo", node = %self.id).entered();

        // Stays dirty if the computation fails or unwinds
        Runtime::mark_dirty(self.id);

        let context = ReactiveContext::enter(self.id);
        let result = (self.compute)();
        let reads = context.finish();

        Runtime::install_sources(self.id, &self.sources, reads);
        self.compute_count.fetch_add(1, Ordering::Relaxed);

        match result {
            Ok(value) => {
                // A success right after a failure always counts as a change
                let recovered = self.failed.swap(false, Ordering::SeqCst);
                let changed = {
                    let mut cached = self.value.write();
                    let changed = recovered || cached.as_ref() != Some(&value);
                    if changed {
                        *cached = Some(value.clone());
                    }
                    changed
                };
                Runtime::settle(self.id, changed);
                Ok(value)
            }
            Err(error) => {
                self.failed.store(true, Ordering::SeqCst);
                tracing::debug!(node = %self.id, %error, "memo evaluation failed");
                Err(error)
            }
        }
    }
}

impl<T> Source for MemoInner<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn refresh(&self) -> Result<u64, ReactiveError> {
        self.update()?;
        Ok(Runtime::version(self.id))
    }
}

impl<T> Drop for MemoInner<T> {
    fn drop(&mut self) {
        Runtime::unregister(self.id);
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// # Type Parameters
///
/// - `T`: The type of the computed value. Must be Clone + Send + Sync + PartialEq.
///
/// The PartialEq bound is needed to detect when the computed value actually
/// changed (some memos might return the same value even if inputs changed).
///
/// # Example
///
/// ```rust
/// use ripple_core::{Memo, Signal};
///
/// let count = Signal::new(2);
/// let doubled = Memo::new({
///     let count = count.clone();
///     move || count.get() * 2
/// });
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Memo<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    inner: Arc<MemoInner<T>>,
}

/// Alternative name for [`Memo`].
pub type Computed<T> = Memo<T>;

impl<T> Memo<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Create a new memo with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::new_fallible(move || Ok(compute()))
    }

    /// Create a memo whose computation can fail.
    ///
    /// A failed computation leaves the previous cached value untouched and
    /// the memo dirty, so the next read tries again.
    pub fn new_fallible<F>(compute: F) -> Self
    where
        F: Fn() -> Result<T, ReactiveError> + Send + Sync + 'static,
    {
        let id = Runtime::register(Node::derived(NodeId::new()));
        Self {
            inner: Arc::new(MemoInner {
                id,
                compute: Box::new(compute),
                value: RwLock::new(None),
                sources: Mutex::new(Sources::new()),
                compute_count: AtomicUsize::new(0),
                failed: AtomicBool::new(false),
            }),
        }
    }

    /// Get the memo's node ID.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// Inside a reactive context this also registers the memo as a
    /// dependency of the running computation, even when the read fails, so
    /// the reader is notified once the memo's inputs change again.
    pub fn try_get(&self) -> Result<T, ReactiveError> {
        let _domain = Runtime::lock();

        // Refuse before tracking so a self-read never becomes a self-edge
        if ReactiveContext::is_evaluating(self.inner.id) {
            return Err(ReactiveError::CyclicDependency {
                node: self.inner.id,
            });
        }

        let result = self.inner.update();

        if ReactiveContext::is_active() {
            let version = Runtime::version(self.inner.id);
            ReactiveContext::track(Dependency::new(self.inner.clone(), version));
        }

        result
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// # Panics
    ///
    /// Panics if the evaluation fails, for example when the memo reads
    /// itself directly or through other memos.
    pub fn get(&self) -> T {
        match self.try_get() {
            Ok(value) => value,
            Err(error) => panic!("memo {} could not be evaluated: {error}", self.inner.id),
        }
    }

    /// Get the current value without registering a dependency.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`Memo::get`].
    pub fn get_untracked(&self) -> T {
        ReactiveContext::untracked(|| self.get())
    }

    /// Get the current staleness.
    pub fn state(&self) -> DirtyState {
        Runtime::dirty_state(self.inner.id)
    }

    /// Current version. Bumped every time a recomputation changes the value.
    pub fn version(&self) -> u64 {
        Runtime::version(self.inner.id)
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.read().is_some()
    }

    /// Number of times the computation has run.
    pub fn compute_count(&self) -> usize {
        self.inner.compute_count.load(Ordering::Relaxed)
    }

    /// Number of producers read during the last evaluation.
    pub fn dependency_count(&self) -> usize {
        Runtime::dependency_count(self.inner.id)
    }

    /// Get the number of dependents.
    pub fn dependent_count(&self) -> usize {
        Runtime::dependent_count(self.inner.id)
    }
}

impl<T> Readable<T> for Memo<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn try_get(&self) -> Result<T, ReactiveError> {
        Memo::try_get(self)
    }

    fn get_untracked(&self) -> T {
        Memo::get_untracked(self)
    }

    fn get(&self) -> T {
        Memo::get(self)
    }
}

impl<T> Clone for Memo<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Memo<T>
where
    T: Clone + Send + Sync + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
