//! Runtime interpreter driving a process through a graph.

use crate::graph::Graph;
use crate::node::{Node, NodeOperation};
use crate::process::Process;
use std::fmt;
use switchyard_core::{BoxError, Context, Halt, Signal, StateName, WorkflowError};
use tracing::{debug, error, info, info_span, warn};

/// The context and process left after a run.
#[derive(Debug)]
pub struct Execution {
    /// Run data and outcome.
    pub context: Context,
    /// Cursor to store and pass back on the next call.
    pub process: Process,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    Failed,
}

/// Why the node loop stopped early.
enum Interrupt {
    /// Business failure; the context already records it.
    Halted(Halt),
    /// Anything else, wrapped into the context at the top level.
    Unhandled(BoxError),
}

impl From<Halt> for Interrupt {
    fn from(halt: Halt) -> Self {
        Interrupt::Halted(halt)
    }
}

impl From<BoxError> for Interrupt {
    fn from(err: BoxError) -> Self {
        match err.downcast::<Halt>() {
            Ok(halt) => Interrupt::Halted(*halt),
            Err(err) => Interrupt::Unhandled(err),
        }
    }
}

/// Drives one process and context through a graph.
///
/// Runs are synchronous. `call` returns when no next signal exists, a `wait`
/// target is reached, or a failure stops the run; `rollback` walks the
/// visited states backwards.
pub struct Manager<'g> {
    graph: &'g Graph,
    process: Process,
    context: Context,
}

impl fmt::Debug for Manager<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("graph", &self.graph.name())
            .field("process", &self.process)
            .field("context", &self.context)
            .finish()
    }
}

impl<'g> Manager<'g> {
    /// Creates a manager. Without a process, a new one starts at `initial`.
    /// A process with no checkpoint of its own uses the graph's default.
    pub fn new(graph: &'g Graph, process: Option<Process>, context: Context) -> Self {
        let mut process = process.unwrap_or_default();
        if !process.has_checkpoint() {
            if let Some(checkpoint) = graph.default_checkpoint() {
                process = process.with_checkpointer(checkpoint.clone());
            }
        }

        Self {
            graph,
            process,
            context,
        }
    }

    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    pub fn process(&self) -> &Process {
        &self.process
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Splits the manager into its context and process.
    pub fn into_parts(self) -> (Context, Process) {
        (self.context, self.process)
    }

    pub fn into_execution(self) -> Execution {
        Execution {
            context: self.context,
            process: self.process,
        }
    }

    /// Advances the process from its current state.
    pub fn call(&mut self, signal: Option<Signal>) -> &Context {
        self.call_with(signal, |_| {})
    }

    /// Advances the process, reporting each state once it is checkpointed.
    pub fn call_with<F>(&mut self, signal: Option<Signal>, mut on_visit: F) -> &Context
    where
        F: FnMut(&StateName),
    {
        let signal = signal.unwrap_or_default();
        let span = info_span!("workflow", graph = %self.graph.name(), %signal);
        let _enter = span.enter();

        match self.advance(&signal, &mut on_visit) {
            Ok(()) => {}
            Err(Interrupt::Halted(halt)) => {
                warn!(state = %self.process.state(), "workflow halted: {}", halt);
            }
            Err(Interrupt::Unhandled(err)) => {
                error!(state = %self.process.state(), "unhandled error: {}", err);
                let message = format!("Unhandled exception {}: {}", self.graph.name(), err);
                self.context.fail_with(message, err);
            }
        }

        &self.context
    }

    fn advance(
        &mut self,
        signal: &Signal,
        on_visit: &mut dyn FnMut(&StateName),
    ) -> Result<(), Interrupt> {
        let graph = self.graph;
        let entry = graph
            .node(self.process.state().as_str())
            .and_then(|node| node.target(signal));

        let mut node = match entry {
            Some(target) if target.is_wait() => {
                info!("signal '{}' leads straight to wait", signal);
                return Ok(());
            }
            Some(target) => graph.node(target.as_str()),
            None => None,
        }
        .ok_or_else(|| self.context.fail(format!("invalid signal: {signal}")))?;

        loop {
            let (status, next) = self.execute_node(node)?;

            if status == Status::Failed && !graph.is_chain_of_command() {
                warn!(
                    "state '{}' failed: {}",
                    node.state(),
                    self.context.message().unwrap_or_default()
                );
                return Ok(());
            }

            let state = node.state().clone();
            if let Err(err) = self.process.visit(state.clone()) {
                let message = format!(
                    "{} failed to persist process state: `{}`",
                    graph.name(),
                    state
                );
                let halt = match err.source {
                    Some(source) => self.context.fail_with(message, source),
                    None => self.context.fail(message),
                };
                return Err(halt.into());
            }
            debug!(state = %state, "checkpointed");
            on_visit(&state);

            let Some(target) = next else {
                info!("workflow finished at '{}'", state);
                return Ok(());
            };
            if target.is_wait() {
                info!("workflow waiting at '{}'", state);
                return Ok(());
            }

            node = graph
                .node(target.as_str())
                .ok_or_else(|| -> BoxError { format!("undefined state `{target}`").into() })?;
        }
    }

    fn execute_node(&mut self, node: &Node) -> Result<(Status, Option<StateName>), Interrupt> {
        debug!(state = %node.state(), "executing node");

        let prepared = match node.prepare_hook() {
            Some(hook) => self.graph.run_prepare_hook(hook, &mut self.context),
            None => Ok(()),
        };

        // The operation is skipped when preparation failed.
        let outcome = prepared.and_then(|()| match node.node_operation() {
            Some(operation) => operation.run(&mut self.context),
            None => Ok(()),
        });

        if let Err(err) = outcome {
            match Interrupt::from(err) {
                Interrupt::Halted(halt) if self.graph.is_chain_of_command() => {
                    warn!("state '{}' failed, continuing: {}", node.state(), halt);
                }
                interrupt => return Err(interrupt),
            }
        }

        let status = if self.context.is_success() {
            Status::Ok
        } else {
            Status::Failed
        };

        let signal = match node.signal_hook() {
            Some(hook) => self.graph.run_signal_hook(hook, &self.context)?,
            None => Signal::proceed(),
        };
        debug!(state = %node.state(), %signal, ?status, "node executed");

        Ok((status, node.target(&signal).cloned()))
    }

    /// Runs compensating actions for the visited states, newest first.
    pub fn rollback(&mut self) -> Result<(), WorkflowError> {
        self.rollback_with(|_| {})
    }

    /// Rolls back, reporting each visited state as it is handled.
    ///
    /// A command operation's own rollback takes precedence over the node's
    /// standalone rollback; nodes with neither are skipped. Nothing is
    /// checkpointed.
    pub fn rollback_with<F>(&mut self, mut on_rollback: F) -> Result<(), WorkflowError>
    where
        F: FnMut(&StateName),
    {
        let graph = self.graph;
        let span = info_span!("rollback", graph = %graph.name());
        let _enter = span.enter();

        for state in self.process.visited().iter().rev() {
            let Some(node) = graph.node(state.as_str()) else {
                warn!("visited state '{}' is not in the graph, skipping", state);
                continue;
            };

            let result = match (node.node_operation(), node.standalone_rollback()) {
                (Some(NodeOperation::Command(op)), _) => op.rollback(&mut self.context),
                (_, Some(rollback)) => rollback(&mut self.context),
                _ => Ok(()),
            };

            if let Err(source) = result {
                error!(state = %state, "rollback failed: {}", source);
                return Err(WorkflowError::Rollback {
                    state: state.clone(),
                    source,
                });
            }

            debug!(state = %state, "rolled back");
            on_rollback(state);
        }

        Ok(())
    }
}
