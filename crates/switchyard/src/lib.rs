//! An embeddable, signal-driven workflow engine.
//!
//! A [`Graph`] is a set of named states ([`Node`]s), each with an optional
//! operation and a table mapping signals to the next state. A [`Manager`]
//! moves a [`Process`] through the graph, running operations against a
//! [`Context`], checkpointing every transition, and stopping when no signal
//! follows, a `wait` target is reached, or a node fails. Visited states can
//! later be compensated in reverse with [`Graph::rollback`].
//!
//! # Example
//!
//! ```rust
//! use switchyard::prelude::*;
//!
//! let graph = Graph::builder("Tally")
//!     .start_node([("continue", "started")])
//!     .add_node(
//!         Node::new("started")
//!             .operation(|ctx: &mut Context| {
//!                 let total = ctx.get::<i64>("total").copied().unwrap_or(0);
//!                 ctx.insert("total", total + 1);
//!                 Ok(())
//!             })
//!             .rollback(|ctx: &mut Context| {
//!                 if let Some(total) = ctx.get_mut::<i64>("total") {
//!                     *total -= 1;
//!                 }
//!                 Ok(())
//!             })
//!             .emit("wait"),
//!     )
//!     .build()
//!     .expect("valid graph");
//!
//! let Execution { mut context, process } = graph.start(Context::new().with("total", 0i64));
//! assert!(context.is_success());
//! assert_eq!(context.get::<i64>("total"), Some(&1));
//!
//! graph.rollback(&process, &mut context).expect("rollback succeeds");
//! assert_eq!(context.get::<i64>("total"), Some(&0));
//! ```

mod graph;
mod manager;
mod node;
mod options;
mod process;

// Re-export core types
pub use switchyard_core::*;

pub use graph::{Graph, GraphBuilder};
pub use manager::{Execution, Manager};
pub use node::{Callable, Hook, Node, NodeOperation, PrepareFn, SignalFn};
pub use options::{FailureHandling, GraphOptions};
pub use process::{Checkpoint, Process};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        BoxError, Checkpoint, Context, Execution, FailureHandling, Graph, GraphBuilder,
        GraphOptions, Halt, Manager, Node, Operation, Process, Signal, StateName, WorkflowError,
    };
}
