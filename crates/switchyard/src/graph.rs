//! Graph definition and builder.

use crate::manager::{Execution, Manager};
use crate::node::{Hook, Node, PrepareFn, SignalFn};
use crate::options::{FailureHandling, GraphOptions};
use crate::process::{Checkpoint, Process};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use switchyard_core::{BoxError, Context, Signal, StateName, WorkflowError};

/// An immutable, validated set of nodes and their transitions.
///
/// Build it once with [`Graph::builder`] and share it by reference (or `Arc`)
/// for every run.
///
/// ```
/// use switchyard::{Context, Graph, Node};
///
/// let graph = Graph::builder("Greeting")
///     .start_node([("continue", "greeted")])
///     .add_node(Node::new("greeted").operation(|ctx: &mut Context| {
///         ctx.insert("greeting", "hello".to_string());
///         Ok(())
///     }))
///     .build()
///     .expect("valid graph");
///
/// let execution = graph.start(Context::new());
/// assert!(execution.context.is_success());
/// assert_eq!(execution.process.state().as_str(), "greeted");
/// ```
pub struct Graph {
    name: String,
    nodes: Vec<Node>,
    index: HashMap<StateName, usize>,
    options: GraphOptions,
    checkpoint: Option<Arc<dyn Checkpoint>>,
    prepare_hooks: HashMap<String, PrepareFn>,
    signal_hooks: HashMap<String, SignalFn>,
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field(
                "states",
                &self.nodes.iter().map(Node::state).collect::<Vec<_>>(),
            )
            .field("options", &self.options)
            .field("checkpoint", &self.checkpoint.is_some())
            .finish()
    }
}

impl Graph {
    /// Creates a new graph builder. `name` appears in failure messages.
    pub fn builder(name: impl Into<String>) -> GraphBuilder {
        GraphBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn failure_handling(&self) -> FailureHandling {
        self.options.failure_handling
    }

    /// Returns `true` when failures do not stop traversal.
    pub fn is_chain_of_command(&self) -> bool {
        self.options.failure_handling == FailureHandling::ChainOfCommand
    }

    /// Returns the node for a state.
    pub fn node(&self, state: &str) -> Option<&Node> {
        self.index.get(state).and_then(|&i| self.nodes.get(i))
    }

    /// Returns all nodes in registration order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Returns `true` if a node with the given state exists.
    pub fn has_node(&self, state: &str) -> bool {
        self.index.contains_key(state)
    }

    /// Returns the number of registered nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn default_checkpoint(&self) -> Option<&Arc<dyn Checkpoint>> {
        self.checkpoint.as_ref()
    }

    /// Creates a manager for one run over this graph.
    pub fn manager(&self, process: Option<Process>, context: Context) -> Manager<'_> {
        Manager::new(self, process, context)
    }

    /// Advances a run by one segment.
    ///
    /// A missing `signal` means `continue`; a missing `process` starts a new
    /// run at `initial`. Failures never escape: they are recorded on the
    /// returned context.
    pub fn call(
        &self,
        signal: Option<Signal>,
        process: Option<Process>,
        context: Context,
    ) -> Execution {
        let mut manager = self.manager(process, context);
        manager.call(signal);
        manager.into_execution()
    }

    /// Starts a new run with the default signal.
    pub fn start(&self, context: Context) -> Execution {
        self.call(None, None, context)
    }

    /// Runs compensating actions for every visited state, newest first.
    ///
    /// The process is not checkpointed. The first failing rollback action
    /// stops the walk and is returned.
    pub fn rollback(&self, process: &Process, context: &mut Context) -> Result<(), WorkflowError> {
        let mut manager = self.manager(Some(process.clone()), std::mem::take(context));
        let result = manager.rollback();
        *context = manager.into_execution().context;
        result
    }

    pub(crate) fn run_prepare_hook(
        &self,
        hook: &Hook<PrepareFn>,
        ctx: &mut Context,
    ) -> Result<(), BoxError> {
        match hook {
            Hook::Callable(f) => f(ctx),
            Hook::Named(name) => match self.prepare_hooks.get(name) {
                Some(f) => f(ctx),
                None => Err(format!("unregistered prepare hook `{name}`").into()),
            },
        }
    }

    pub(crate) fn run_signal_hook(
        &self,
        hook: &Hook<SignalFn>,
        ctx: &Context,
    ) -> Result<Signal, BoxError> {
        match hook {
            Hook::Callable(f) => Ok(f(ctx)),
            Hook::Named(name) => match self.signal_hooks.get(name) {
                Some(f) => Ok(f(ctx)),
                None => Err(format!("unregistered signal hook `{name}`").into()),
            },
        }
    }
}

/// Builder for constructing [`Graph`] instances.
///
/// Registration errors are held until [`build`](GraphBuilder::build), which
/// reports the first one.
pub struct GraphBuilder {
    name: String,
    nodes: Vec<Node>,
    index: HashMap<StateName, usize>,
    options: GraphOptions,
    checkpoint: Option<Arc<dyn Checkpoint>>,
    prepare_hooks: HashMap<String, PrepareFn>,
    signal_hooks: HashMap<String, SignalFn>,
    error: Option<WorkflowError>,
}

impl GraphBuilder {
    /// Creates a new empty graph builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            index: HashMap::new(),
            options: GraphOptions::default(),
            checkpoint: None,
            prepare_hooks: HashMap::new(),
            signal_hooks: HashMap::new(),
            error: None,
        }
    }

    /// Registers the `initial` node with its signal table.
    pub fn start_node<I, S, T>(self, signals: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<Signal>,
        T: Into<StateName>,
    {
        let node = Node::new(StateName::initial()).signals(signals);
        if node.signal_table().is_empty() {
            let graph = self.name.clone();
            return self.fail(WorkflowError::MissingSignals { graph });
        }
        self.add_node(node)
    }

    /// Registers a node.
    pub fn add_node(mut self, node: Node) -> Self {
        let state = node.state().clone();
        if state.is_wait() {
            return self.fail(WorkflowError::ReservedState(state));
        }
        if self.index.contains_key(&state) {
            let error = if state.is_initial() {
                WorkflowError::MultipleInitialNodes {
                    graph: self.name.clone(),
                }
            } else {
                WorkflowError::DuplicateState(state)
            };
            return self.fail(error);
        }

        self.index.insert(state, self.nodes.len());
        self.nodes.push(node);
        self
    }

    /// Sets the failure handling mode.
    pub fn failure_handling(mut self, mode: FailureHandling) -> Self {
        self.options.failure_handling = mode;
        self
    }

    /// Keeps traversing the signal table after failures.
    pub fn chain_of_command(self) -> Self {
        self.failure_handling(FailureHandling::ChainOfCommand)
    }

    /// Applies options loaded from configuration.
    pub fn options(mut self, options: GraphOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the checkpoint used by processes that do not carry their own.
    pub fn checkpoint<F>(self, f: F) -> Self
    where
        F: Fn(&Process, &StateName) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        self.checkpointer(Arc::new(f))
    }

    /// Sets a shared checkpoint used by processes that do not carry their own.
    pub fn checkpointer(mut self, checkpoint: Arc<dyn Checkpoint>) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    /// Registers a named context-preparation hook.
    pub fn prepare_hook<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Context) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let hook: PrepareFn = Arc::new(f);
        self.prepare_hooks.insert(name.into(), hook);
        self
    }

    /// Registers a named signal hook.
    pub fn signal_hook<F, S>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Context) -> S + Send + Sync + 'static,
        S: Into<Signal>,
    {
        let hook: SignalFn = Arc::new(move |ctx: &Context| -> Signal { f(ctx).into() });
        self.signal_hooks.insert(name.into(), hook);
        self
    }

    fn fail(mut self, error: WorkflowError) -> Self {
        if self.error.is_none() {
            self.error = Some(error);
        }
        self
    }

    /// Validates and builds the graph.
    pub fn build(self) -> Result<Graph, WorkflowError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        match self.nodes.iter().filter(|n| n.state().is_initial()).count() {
            0 => {
                return Err(WorkflowError::MissingInitialNode { graph: self.name });
            }
            1 => {}
            _ => {
                return Err(WorkflowError::MultipleInitialNodes { graph: self.name });
            }
        }

        for node in &self.nodes {
            for (signal, target) in node.signal_table() {
                if !target.is_wait() && !self.index.contains_key(target) {
                    return Err(WorkflowError::UnknownState {
                        from: node.state().clone(),
                        signal: signal.clone(),
                        target: target.clone(),
                    });
                }
            }

            if let Some(Hook::Named(hook)) = node.prepare_hook() {
                if !self.prepare_hooks.contains_key(hook) {
                    return Err(WorkflowError::UnknownHook {
                        state: node.state().clone(),
                        hook: hook.clone(),
                    });
                }
            }
            if let Some(Hook::Named(hook)) = node.signal_hook() {
                if !self.signal_hooks.contains_key(hook) {
                    return Err(WorkflowError::UnknownHook {
                        state: node.state().clone(),
                        hook: hook.clone(),
                    });
                }
            }
        }

        Ok(Graph {
            name: self.name,
            nodes: self.nodes,
            index: self.index,
            options: self.options,
            checkpoint: self.checkpoint,
            prepare_hooks: self.prepare_hooks,
            signal_hooks: self.signal_hooks,
        })
    }
}
