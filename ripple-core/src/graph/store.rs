//! Dependency Graph Store
//!
//! The node table behind the runtime. It owns no values and runs no user
//! code; it only tracks which consumer read which producer, the version of
//! every node, and walks dependents when a signal is written.
//!
//! # Propagation
//!
//! When a source changes we walk its dependents breadth-first:
//!
//! 1. Every reached node is marked "maybe dirty".
//! 2. A derived node forwards the walk to its own dependents; it is not
//!    re-evaluated here. Evaluation stays lazy.
//! 3. An effect ends the walk on its branch and is reported back so the
//!    caller can enqueue it.
//! 4. A visited set guarantees each node is reached at most once per walk,
//!    which keeps diamond-shaped graphs to a single notification.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Weak;

use indexmap::IndexSet;

use super::node::{DirtyState, Node, NodeId, NodeKind};
use crate::reactive::Subscriber;

/// All nodes of one graph instance, indexed by ID.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: HashMap<NodeId, Node>,
}

impl DependencyGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }

    /// Add a node to the graph.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id();
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node from the graph.
    ///
    /// Also removes all edges involving this node, in both directions.
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&node_id)?;

        for dep_id in node.dependencies() {
            if let Some(dep) = self.nodes.get_mut(dep_id) {
                dep.remove_dependent(node_id);
            }
        }

        for dependent_id in node.dependents() {
            if let Some(dependent) = self.nodes.get_mut(dependent_id) {
                dependent.remove_dependency(node_id);
            }
        }

        Some(node)
    }

    pub fn get_node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    pub fn get_node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// Add a dependency edge: `dependent` depends on `dependency`.
    pub fn add_edge(&mut self, dependency: NodeId, dependent: NodeId) {
        if let Some(dep_node) = self.nodes.get_mut(&dependency) {
            dep_node.add_dependent(dependent);
        }
        if let Some(dependent_node) = self.nodes.get_mut(&dependent) {
            dependent_node.add_dependency(dependency);
        }
    }

    /// Remove a dependency edge.
    pub fn remove_edge(&mut self, dependency: NodeId, dependent: NodeId) {
        if let Some(dep_node) = self.nodes.get_mut(&dependency) {
            dep_node.remove_dependent(dependent);
        }
        if let Some(dependent_node) = self.nodes.get_mut(&dependent) {
            dependent_node.remove_dependency(dependency);
        }
    }

    /// Replace `consumer`'s dependency set with exactly `reads`.
    ///
    /// Edges to producers that were not read this time are removed, edges to
    /// newly read producers are added, and the consumer's dependency order
    /// becomes the read order. Producers that are no longer in the graph are
    /// skipped. Returns `(added, removed)` edge counts.
    pub fn rewire(&mut self, consumer: NodeId, reads: &[NodeId]) -> (usize, usize) {
        let Some(node) = self.nodes.get(&consumer) else {
            return (0, 0);
        };

        let next: IndexSet<NodeId> = reads
            .iter()
            .copied()
            .filter(|id| *id != consumer && self.nodes.contains_key(id))
            .collect();
        let previous = node.dependencies().clone();

        let mut removed = 0;
        for stale in previous.difference(&next) {
            if let Some(producer) = self.nodes.get_mut(stale) {
                producer.remove_dependent(consumer);
            }
            removed += 1;
        }

        let mut added = 0;
        for fresh in next.difference(&previous) {
            if let Some(producer) = self.nodes.get_mut(fresh) {
                producer.add_dependent(consumer);
            }
            added += 1;
        }

        if let Some(node) = self.nodes.get_mut(&consumer) {
            node.set_dependencies(next);
        }

        (added, removed)
    }

    /// Mark everything reachable from `source_id` as maybe dirty.
    ///
    /// Returns the effects reached, in the order the walk visited them.
    pub fn mark_changed(&mut self, source_id: NodeId) -> Vec<NodeId> {
        let mut effects = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        if let Some(source) = self.nodes.get(&source_id) {
            queue.extend(source.dependents().iter().copied());
        }

        while let Some(node_id) = queue.pop_front() {
            if !visited.insert(node_id) {
                continue;
            }

            let Some(node) = self.nodes.get_mut(&node_id) else {
                continue;
            };
            node.mark_maybe_dirty();

            match node.kind() {
                NodeKind::Derived => queue.extend(node.dependents().iter().copied()),
                NodeKind::Effect => effects.push(node_id),
                NodeKind::Source => {}
            }
        }

        effects
    }

    /// Version of a node, or 0 if it is unknown.
    pub fn version(&self, node_id: NodeId) -> u64 {
        self.nodes.get(&node_id).map(Node::version).unwrap_or(0)
    }

    /// Staleness of a node. Unknown nodes report `Dirty`.
    pub fn dirty_state(&self, node_id: NodeId) -> DirtyState {
        self.nodes
            .get(&node_id)
            .map(Node::dirty_state)
            .unwrap_or(DirtyState::Dirty)
    }

    pub fn dependent_count(&self, node_id: NodeId) -> usize {
        self.nodes
            .get(&node_id)
            .map(|node| node.dependents().len())
            .unwrap_or(0)
    }

    pub fn dependency_count(&self, node_id: NodeId) -> usize {
        self.nodes
            .get(&node_id)
            .map(|node| node.dependencies().len())
            .unwrap_or(0)
    }

    /// Weak link to the effect behind `node_id`.
    pub fn subscriber(&self, node_id: NodeId) -> Option<Weak<dyn Subscriber>> {
        self.nodes.get(&node_id)?.subscriber().cloned()
    }

    /// Get the total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
