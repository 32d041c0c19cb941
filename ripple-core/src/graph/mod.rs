//! Dependency Graph
//!
//! This module implements the bookkeeping side of the runtime: which
//! consumer read which producer, how stale every node is, and which effects
//! are waiting to run.
//!
//! # Overview
//!
//! The dependency graph is a directed acyclic graph where:
//!
//! - Nodes represent reactive values (signals, memos) or effects
//! - Edges represent dependencies: if A read B, there is an edge from B to A
//!
//! When a signal changes, we traverse the graph to find all affected nodes
//! and mark them as maybe dirty. Memos work out lazily, on their next read,
//! whether they really need to recompute; effects are handed to the
//! scheduler.
//!
//! # Design Decisions
//!
//! 1. The graph is centralized and indexed by node ID for O(1) lookups.
//!    Handles refer to their node by ID only, so the table never owns a
//!    value or a closure.
//!
//! 2. Both forward (dependencies) and reverse (dependents) edges are kept.
//!    Reverse edges are plain IDs; the only pointer the table holds is a
//!    `Weak` back-link to effects, so dropping a handle always frees it.
//!
//! 3. Edge sets are insertion-ordered so walks and validation passes are
//!    deterministic.

mod node;
mod scheduler;
mod store;

pub use node::{DirtyState, Node, NodeId, NodeKind};
pub use scheduler::BatchScheduler;
pub use store::DependencyGraph;
