//! Core traits and types for the switchyard workflow engine.
//!
//! This crate has no knowledge of graphs. Library authors depend on it to
//! write operations that can run standalone or inside a graph node.
//!
//! # Core Types
//!
//! - [`Context`] - Run data plus the success/failure record of a run
//! - [`Halt`] - The handled failure returned after [`Context::fail`]
//! - [`Operation`] - A command with `call`/`rollback` and required args
//! - [`StateName`], [`Signal`] - Names used by graph transitions
//! - [`WorkflowError`] - Configuration and rollback errors

mod context;
mod error;
mod operation;
mod state;

pub use context::{Context, ContextKey};
pub use error::{BoxError, CheckpointError, Halt, WorkflowError};
pub use operation::{execute, revert, validate_required_args, Operation};
pub use state::{Signal, StateName};
