//! Capability traits for the reactive system.
//!
//! Producers (signals and memos) and scheduled consumers (effects) meet the
//! runtime through these traits, so the graph can hold them uniformly
//! without knowing their value types.

use crate::error::ReactiveError;
use crate::graph::NodeId;

/// Something that can be read and tracked as a dependency.
///
/// Consumers hold their producers as `Arc<dyn Source>`, which is what keeps
/// a producer alive while anything still depends on it.
pub trait Source: Send + Sync {
    /// The graph node backing this producer.
    fn node_id(&self) -> NodeId;

    /// Bring the producer up to date and return its current version.
    ///
    /// Signals are always current. Memos validate or recompute first.
    fn refresh(&self) -> Result<u64, ReactiveError>;
}

/// Something the scheduler can re-run after its dependencies changed.
pub trait Subscriber: Send + Sync {
    /// The graph node backing this subscriber.
    fn node_id(&self) -> NodeId;

    /// Re-run if any recorded dependency actually changed.
    fn run(&self) -> Result<(), ReactiveError>;

    /// Record a failure the scheduler raised on the subscriber's behalf.
    fn abort(&self, error: ReactiveError);
}

/// Uniform read access over signals and memos.
///
/// Reading inside a memo or effect registers a dependency; reading anywhere
/// else just returns the value.
pub trait Readable<T> {
    /// Read the current value, evaluating it first if needed.
    fn try_get(&self) -> Result<T, ReactiveError>;

    /// Read the value without registering a dependency.
    fn get_untracked(&self) -> T;

    /// Read the current value.
    ///
    /// # Panics
    ///
    /// Panics if evaluation fails, for example on a cyclic dependency.
    fn get(&self) -> T {
        match self.try_get() {
            Ok(value) => value,
            Err(error) => panic!("reactive read failed: {error}"),
        }
    }
}
