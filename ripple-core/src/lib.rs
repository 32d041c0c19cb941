//! Ripple Core
//!
//! This crate provides a fine-grained reactive dataflow runtime. It
//! implements:
//!
//! - Reactive primitives (signals, memos, effects)
//! - Automatic dependency tracking with dynamic rewiring
//! - Glitch-free, at-most-once re-evaluation on diamond-shaped graphs
//! - Transactional batching of writes
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `graph`: Dependency graph bookkeeping and the batch scheduler
//! - `config`: Runtime tunables
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust
//! use ripple_core::{batch, Effect, Memo, Signal};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! // Create a signal
//! let count = Signal::new(0);
//!
//! // Create a derived value
//! let doubled = Memo::new({
//!     let count = count.clone();
//!     move || count.get() * 2
//! });
//!
//! // Create an effect
//! let runs = Arc::new(AtomicUsize::new(0));
//! let _effect = Effect::new({
//!     let doubled = doubled.clone();
//!     let runs = runs.clone();
//!     move || {
//!         doubled.get();
//!         runs.fetch_add(1, Ordering::SeqCst);
//!     }
//! });
//!
//! // Update the signal; the effect runs once per write
//! count.set(5);
//! assert_eq!(doubled.get(), 10);
//! assert_eq!(runs.load(Ordering::SeqCst), 2);
//!
//! // Batched writes cost one run
//! batch(|| {
//!     count.set(6);
//!     count.set(7);
//! });
//! assert_eq!(runs.load(Ordering::SeqCst), 3);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;

pub use config::RuntimeConfig;
pub use error::{ConfigError, ReactiveError};
pub use graph::{DirtyState, NodeId};
pub use reactive::{batch, untracked, Computed, Effect, Memo, Readable, Runtime, Signal};
