//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, memos, and effects.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state with a version stamp. When a
//! signal's value is read within a tracking context (such as a memo or
//! effect), the read is recorded as a dependency. When the signal is
//! written, everything downstream is marked stale.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result. It re-evaluates only when
//! read after one of its dependencies actually changed. Memos are useful for
//! expensive computations that should not be repeated unnecessarily.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its dependencies
//! change. Effects are used to synchronize reactive state with external systems.
//!
//! ## Batches
//!
//! [`batch`] groups writes so that every affected effect runs once, after the
//! outermost batch returns.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to automatically
//! detect dependencies. When a signal or memo is read, we check if there is an
//! active tracking context and, if so, log the read there. The evaluation that
//! pushed the context rewires the graph to exactly those reads when it ends.

mod context;
mod effect;
mod memo;
mod runtime;
mod signal;
mod subscriber;

pub use context::ReactiveContext;
pub use effect::Effect;
pub use memo::{Computed, Memo};
pub use runtime::{batch, untracked, Runtime};
pub use signal::Signal;
pub use subscriber::{Readable, Source, Subscriber};
