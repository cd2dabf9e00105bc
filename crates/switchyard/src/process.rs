//! The persistent run cursor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use switchyard_core::{BoxError, CheckpointError, StateName};

/// Persists a process transition.
///
/// Called with the process as it was *before* the transition and the state
/// being entered. `Ok(false)` and `Err(_)` both refuse the transition.
///
/// Closures of the matching shape implement this trait, so a repository can
/// be either a type implementing `Checkpoint` or a plain function.
pub trait Checkpoint: Send + Sync {
    /// Persists the transition of `process` into `state`.
    fn save(&self, process: &Process, state: &StateName) -> Result<bool, BoxError>;
}

impl<F> Checkpoint for F
where
    F: Fn(&Process, &StateName) -> Result<bool, BoxError> + Send + Sync,
{
    fn save(&self, process: &Process, state: &StateName) -> Result<bool, BoxError> {
        self(process, state)
    }
}

/// Current state and visit history of one workflow run.
///
/// Serializes as `{ "state", "visited", "reference" }` so a caller can store
/// it between invocations; the checkpoint hook is never serialized.
///
/// ```
/// use switchyard::Process;
///
/// let process = Process::new().with_reference("order-42");
/// assert!(process.state().is_initial());
/// assert!(process.visited().is_empty());
/// assert_eq!(process.reference(), Some("order-42"));
/// ```
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Process {
    state: StateName,
    #[serde(default)]
    visited: Vec<StateName>,
    #[serde(default)]
    reference: Option<String>,
    #[serde(skip)]
    checkpoint: Option<Arc<dyn Checkpoint>>,
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("state", &self.state)
            .field("visited", &self.visited)
            .field("reference", &self.reference)
            .field("checkpoint", &self.checkpoint.is_some())
            .finish()
    }
}

impl Process {
    /// Creates a process at the `initial` state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a process positioned at `state` with no history.
    ///
    /// Use it to resume a run whose history is not kept. Rollback only sees
    /// states visited from here on, so `state` itself is never compensated.
    pub fn at(state: impl Into<StateName>) -> Self {
        Self {
            state: state.into(),
            ..Self::default()
        }
    }

    /// Restores a process from its stored history.
    ///
    /// The current state is the last visited one, or `initial` when the
    /// history is empty.
    pub fn restore(visited: Vec<StateName>) -> Self {
        Self {
            state: visited.last().cloned().unwrap_or_default(),
            visited,
            ..Self::default()
        }
    }

    /// Attaches an opaque caller correlation id.
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Attaches a checkpoint function.
    pub fn with_checkpoint<F>(self, f: F) -> Self
    where
        F: Fn(&Process, &StateName) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        self.with_checkpointer(Arc::new(f))
    }

    /// Attaches a shared checkpoint implementation.
    pub fn with_checkpointer(mut self, checkpoint: Arc<dyn Checkpoint>) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    pub fn state(&self) -> &StateName {
        &self.state
    }

    pub fn visited(&self) -> &[StateName] {
        &self.visited
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn has_checkpoint(&self) -> bool {
        self.checkpoint.is_some()
    }

    /// Moves the process into `state`, persisting the transition first.
    ///
    /// If the checkpoint refuses or fails, neither `state` nor `visited`
    /// changes.
    pub fn visit(&mut self, state: StateName) -> Result<(), CheckpointError> {
        if let Some(checkpoint) = &self.checkpoint {
            match checkpoint.save(self, &state) {
                Ok(true) => {}
                Ok(false) => return Err(CheckpointError { state, source: None }),
                Err(source) => {
                    return Err(CheckpointError {
                        state,
                        source: Some(source),
                    })
                }
            }
        }

        self.visited.push(state.clone());
        self.state = state;
        Ok(())
    }
}
