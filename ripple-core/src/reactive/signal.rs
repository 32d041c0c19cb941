//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and a
//! version stamp, and it is the only thing in the graph that can be written.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (memo/effect), the
//!    read is logged with the signal's current version.
//!
//! 2. When a signal is written, its version is bumped and every memo and
//!    effect downstream of it is marked as maybe dirty.
//!
//! 3. Effects reached by the write run once the write (or the enclosing
//!    batch) completes. Memos recompute on their next read.
//!
//! # Thread Safety
//!
//! The value is protected by a `parking_lot::RwLock`; the graph bookkeeping
//! is serialized through the runtime.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;

use super::context::{Dependency, ReactiveContext};
use super::runtime::Runtime;
use super::subscriber::{Readable, Source};
use crate::error::ReactiveError;
use crate::graph::{Node, NodeId};

struct SignalInner<T> {
    id: NodeId,
    value: RwLock<T>,
}

impl<T> Source for SignalInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn refresh(&self) -> Result<u64, ReactiveError> {
        Ok(Runtime::version(self.id))
    }
}

impl<T> Drop for SignalInner<T> {
    fn drop(&mut self) {
        Runtime::unregister(self.id);
    }
}

/// A reactive signal holding a value of type T.
///
/// Cloning a signal creates another handle to the same cell. The cell lives
/// as long as any handle, or any memo or effect that read it, is alive.
///
/// # Example
///
/// ```rust
/// use ripple_core::Signal;
///
/// let count = Signal::new(0);
/// assert_eq!(count.get(), 0);
///
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// assert_eq!(count.version(), 1);
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<SignalInner<T>>,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value, at version 0.
    pub fn new(value: T) -> Self {
        let id = Runtime::register(Node::source(NodeId::new()));
        Self {
            inner: Arc::new(SignalInner {
                id,
                value: RwLock::new(value),
            }),
        }
    }

    /// Get the signal's node ID.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// signal as a dependency of the running computation.
    pub fn get(&self) -> T {
        let _domain = Runtime::lock();
        let value = self.inner.value.read().clone();

        if ReactiveContext::is_active() {
            let version = Runtime::version(self.inner.id);
            ReactiveContext::track(Dependency::new(self.inner.clone(), version));
        }

        value
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Set a new value and notify dependents.
    ///
    /// Every write bumps the version and propagates, even when the new value
    /// equals the old one. Use [`Signal::set_if_changed`] to skip equal writes.
    pub fn set(&self, value: T) {
        let _domain = Runtime::lock();
        *self.inner.value.write() = value;
        Runtime::notify_change(self.inner.id);
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let _domain = Runtime::lock();
        let new_value = {
            let guard = self.inner.value.read();
            f(&guard)
        };
        self.set(new_value);
    }

    /// Write only if `value` differs from the current value.
    ///
    /// Returns whether a write happened.
    pub fn set_if_changed(&self, value: T) -> bool
    where
        T: PartialEq,
    {
        let _domain = Runtime::lock();
        if *self.inner.value.read() == value {
            return false;
        }
        self.set(value);
        true
    }

    /// Current version stamp. Starts at 0 and grows by one per write.
    pub fn version(&self) -> u64 {
        Runtime::version(self.inner.id)
    }

    /// Get the number of memos and effects currently depending on this signal.
    pub fn subscriber_count(&self) -> usize {
        Runtime::dependent_count(self.inner.id)
    }
}

impl<T> Readable<T> for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn try_get(&self) -> Result<T, ReactiveError> {
        Ok(Signal::get(self))
    }

    fn get_untracked(&self) -> T {
        Signal::get_untracked(self)
    }

    fn get(&self) -> T {
        Signal::get(self)
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &self.get_untracked())
            .field("version", &self.version())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
