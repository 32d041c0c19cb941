//! Graph Nodes
//!
//! Every signal, memo, and effect owns exactly one node in the dependency
//! graph. The node holds everything the propagation walk and the validation
//! pass need: the version stamp, the staleness state, and both edge
//! directions.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;

use indexmap::IndexSet;

use crate::reactive::Subscriber;

/// Unique identifier for a node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A source node (signal). These are the roots of the graph.
    /// They have no dependencies, only dependents.
    Source,

    /// A derived node (memo). Both a consumer of its dependencies and a
    /// producer for its dependents.
    Derived,

    /// An effect node. These are leaves of the graph: they have dependencies
    /// but no dependents.
    Effect,
}

/// Staleness of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyState {
    /// The node's cached result is up-to-date.
    Clean,

    /// Something upstream was written. The node must compare the versions it
    /// recorded against the current ones before deciding to re-run.
    MaybeDirty,

    /// The node must re-run: it never ran, or its last run failed.
    Dirty,
}

/// A node in the dependency graph.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    version: u64,
    dirty: DirtyState,

    /// Producers read during this node's last evaluation, in read order.
    dependencies: IndexSet<NodeId>,

    /// Consumers that read this node during their last evaluation.
    dependents: IndexSet<NodeId>,

    /// Back-link used by the scheduler to re-run effects. Never owning.
    subscriber: Option<Weak<dyn Subscriber>>,
}

impl Node {
    /// Create a new node of the given kind.
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            version: 0,
            dirty: match kind {
                NodeKind::Source => DirtyState::Clean,
                // Start dirty to ensure first computation
                NodeKind::Derived | NodeKind::Effect => DirtyState::Dirty,
            },
            dependencies: IndexSet::new(),
            dependents: IndexSet::new(),
            subscriber: None,
        }
    }

    /// Create a new source (signal) node.
    pub fn source(id: NodeId) -> Self {
        Self::new(id, NodeKind::Source)
    }

    /// Create a new derived (memo) node.
    pub fn derived(id: NodeId) -> Self {
        Self::new(id, NodeKind::Derived)
    }

    /// Create a new effect node that the scheduler reaches through `subscriber`.
    pub fn effect(id: NodeId, subscriber: Weak<dyn Subscriber>) -> Self {
        let mut node = Self::new(id, NodeKind::Effect);
        node.subscriber = Some(subscriber);
        node
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Current version stamp.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Advance the version stamp and return the new value.
    pub fn bump_version(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    pub fn dirty_state(&self) -> DirtyState {
        self.dirty
    }

    pub fn is_clean(&self) -> bool {
        self.dirty == DirtyState::Clean
    }

    pub fn mark_clean(&mut self) {
        self.dirty = DirtyState::Clean;
    }

    /// Mark the node as maybe dirty. A `Dirty` node stays `Dirty`.
    pub fn mark_maybe_dirty(&mut self) {
        if self.dirty == DirtyState::Clean {
            self.dirty = DirtyState::MaybeDirty;
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = DirtyState::Dirty;
    }

    pub fn add_dependency(&mut self, node_id: NodeId) {
        self.dependencies.insert(node_id);
    }

    pub fn remove_dependency(&mut self, node_id: NodeId) {
        self.dependencies.shift_remove(&node_id);
    }

    pub fn dependencies(&self) -> &IndexSet<NodeId> {
        &self.dependencies
    }

    /// Replace the dependency set wholesale, keeping the given order.
    pub fn set_dependencies(&mut self, dependencies: IndexSet<NodeId>) {
        self.dependencies = dependencies;
    }

    pub fn add_dependent(&mut self, node_id: NodeId) {
        self.dependents.insert(node_id);
    }

    pub fn remove_dependent(&mut self, node_id: NodeId) {
        self.dependents.shift_remove(&node_id);
    }

    pub fn dependents(&self) -> &IndexSet<NodeId> {
        &self.dependents
    }

    /// Weak link to the effect behind this node, if it is one.
    pub fn subscriber(&self) -> Option<&Weak<dyn Subscriber>> {
        self.subscriber.as_ref()
    }
}
