//! Workflow error types.

use crate::state::{Signal, StateName};
use thiserror::Error;

/// Boxed error returned by operations, hooks and checkpoints.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A handled business failure.
///
/// Only [`Context::fail`](crate::Context::fail) and
/// [`Context::fail_with`](crate::Context::fail_with) produce one, so a `Halt`
/// always travels with a context that is already marked failed. Return it
/// (usually boxed through `?` or `.into()`) to stop the current logic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct Halt {
    message: String,
}

impl Halt {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the failure message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A checkpoint hook refused or failed to persist a transition.
#[derive(Error, Debug)]
#[error("checkpoint rejected state `{state}`")]
pub struct CheckpointError {
    /// The state that was not persisted.
    pub state: StateName,
    /// The error raised by the hook, if it raised instead of returning `false`.
    #[source]
    pub source: Option<BoxError>,
}

/// Errors raised while defining a graph or rolling it back.
///
/// Failures during a forward run never appear here; they are reported through
/// the [`Context`](crate::Context).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum WorkflowError {
    /// Two nodes share a state name.
    #[error("state `{0}` is already defined")]
    DuplicateState(StateName),

    /// The graph has no `initial` node.
    #[error("{graph}: missing `initial` start node")]
    MissingInitialNode {
        /// Name of the graph.
        graph: String,
    },

    /// The graph has more than one `initial` node.
    #[error("{graph}: more than one start node detected")]
    MultipleInitialNodes {
        /// Name of the graph.
        graph: String,
    },

    /// The start node was registered without any signal.
    #[error("{graph}: start node has no signals")]
    MissingSignals {
        /// Name of the graph.
        graph: String,
    },

    /// A transition points at a state that no node defines.
    #[error("state `{from}` maps signal `{signal}` to undefined state `{target}`")]
    UnknownState {
        /// The node declaring the transition.
        from: StateName,
        /// The signal of the transition.
        signal: Signal,
        /// The missing target.
        target: StateName,
    },

    /// A node refers to a named hook that was never registered.
    #[error("state `{state}` refers to unregistered hook `{hook}`")]
    UnknownHook {
        /// The node referring to the hook.
        state: StateName,
        /// The hook name.
        hook: String,
    },

    /// A node uses a name the engine reserves.
    #[error("state name `{0}` is reserved")]
    ReservedState(StateName),

    /// A rollback action failed.
    #[error("rollback failed in state `{state}`: {source}")]
    Rollback {
        /// The state whose rollback failed.
        state: StateName,
        /// The error raised by the rollback action.
        #[source]
        source: BoxError,
    },
}
