//! Error types.
//!
//! [`ReactiveError`] is what evaluations and effect runs report. It is
//! `Clone` so that a failed effect can keep its last error around for
//! inspection while the same value is also returned to the caller.

use thiserror::Error;

use crate::graph::NodeId;

/// Errors raised while evaluating memos or running effects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// A node's evaluation read itself, directly or through other nodes.
    #[error("cyclic dependency: node {node} was read while it was being evaluated")]
    CyclicDependency { node: NodeId },

    /// A user-supplied compute or effect body failed.
    #[error("compute failure: {message}")]
    ComputeFailure { message: String },

    /// The effect was disposed and can no longer run.
    #[error("effect {node} has been disposed")]
    Disposed { node: NodeId },

    /// An effect kept re-triggering itself inside a single flush.
    #[error("effect {node} was re-triggered more than {limit} times in one flush")]
    FlushLimitExceeded { node: NodeId, limit: usize },
}

impl ReactiveError {
    /// Build a [`ReactiveError::ComputeFailure`] from any message.
    pub fn compute(message: impl Into<String>) -> Self {
        Self::ComputeFailure {
            message: message.into(),
        }
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::CyclicDependency { .. })
    }
}

/// Errors raised while loading or installing a [`RuntimeConfig`](crate::RuntimeConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid runtime config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("max_reruns_per_flush must be at least 1")]
    ZeroReruns,
}
