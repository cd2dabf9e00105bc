//! Node definitions.

use crate::graph::Graph;
use crate::process::Process;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use switchyard_core::{validate_required_args, BoxError, Context, Operation, Signal, StateName};

/// A plain function run as a node's operation or rollback.
pub type Callable = Arc<dyn Fn(&mut Context) -> Result<(), BoxError> + Send + Sync>;

/// Runs before a node's operation. May mutate or replace the context.
pub type PrepareFn = Arc<dyn Fn(&mut Context) -> Result<(), BoxError> + Send + Sync>;

/// Picks the outbound signal after a node's operation ran.
pub type SignalFn = Arc<dyn Fn(&Context) -> Signal + Send + Sync>;

/// The work a node performs.
#[derive(Clone)]
pub enum NodeOperation {
    /// A function. Rollback comes from the node's standalone rollback, if any.
    Callable(Callable),
    /// A command object. Its required args are validated before `call` and
    /// its own `rollback` is used when rolling back.
    Command(Arc<dyn Operation>),
}

impl NodeOperation {
    pub(crate) fn run(&self, ctx: &mut Context) -> Result<(), BoxError> {
        match self {
            NodeOperation::Callable(f) => f(ctx),
            NodeOperation::Command(op) => {
                validate_required_args(op.as_ref(), ctx)?;
                op.call(ctx)
            }
        }
    }
}

impl fmt::Debug for NodeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeOperation::Callable(_) => f.write_str("Callable"),
            NodeOperation::Command(op) => write!(f, "Command({})", op.name()),
        }
    }
}

/// A hook given inline or by the name it was registered under on the graph.
#[derive(Clone)]
pub enum Hook<F> {
    /// Inline function.
    Callable(F),
    /// Name of a hook registered with
    /// [`GraphBuilder::prepare_hook`](crate::GraphBuilder::prepare_hook) or
    /// [`GraphBuilder::signal_hook`](crate::GraphBuilder::signal_hook).
    Named(String),
}

impl<F> fmt::Debug for Hook<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::Callable(_) => f.write_str("Callable"),
            Hook::Named(name) => write!(f, "Named({name})"),
        }
    }
}

/// One state of a graph.
///
/// Built with chained setters and handed to
/// [`GraphBuilder::add_node`](crate::GraphBuilder::add_node). Once the graph
/// is built the node cannot change.
///
/// ```
/// use switchyard::{Context, Node};
///
/// let node = Node::new("started")
///     .operation(|ctx: &mut Context| {
///         let total = ctx.get::<i64>("total").copied().unwrap_or(0);
///         ctx.insert("total", total + 1);
///         Ok(())
///     })
///     .determine_signal(|ctx: &Context| {
///         if ctx.get::<i64>("total").copied().unwrap_or(0) > 10 { "pause" } else { "stop" }
///     })
///     .on("pause", "paused")
///     .on("stop", "stopped");
///
/// assert_eq!(node.target(&"stop".into()).map(|s| s.as_str()), Some("stopped"));
/// ```
#[derive(Clone)]
pub struct Node {
    state: StateName,
    operation: Option<NodeOperation>,
    rollback: Option<Callable>,
    signals: BTreeMap<Signal, StateName>,
    prepare_context: Option<Hook<PrepareFn>>,
    determine_signal: Option<Hook<SignalFn>>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("state", &self.state)
            .field("operation", &self.operation)
            .field("rollback", &self.rollback.is_some())
            .field("signals", &self.signals)
            .field("prepare_context", &self.prepare_context)
            .field("determine_signal", &self.determine_signal)
            .finish()
    }
}

impl Node {
    /// Creates a routing-only node for the given state.
    pub fn new(state: impl Into<StateName>) -> Self {
        Self {
            state: state.into(),
            operation: None,
            rollback: None,
            signals: BTreeMap::new(),
            prepare_context: None,
            determine_signal: None,
        }
    }

    /// Sets a function as the node's operation.
    pub fn operation<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Context) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.operation = Some(NodeOperation::Callable(Arc::new(f)));
        self
    }

    /// Sets a command object as the node's operation.
    pub fn command<O: Operation + 'static>(mut self, op: O) -> Self {
        self.operation = Some(NodeOperation::Command(Arc::new(op)));
        self
    }

    /// Runs another graph from its initial node with this node's context.
    ///
    /// The child's resulting context replaces the current one, so a failed
    /// child fails this node. The child process is kept in the context under
    /// [`subgraph_key`](Self::subgraph_key), and rolling this node back rolls
    /// the child back through its own visited states. A later
    /// [`rollback`](Self::rollback) call replaces that behaviour.
    pub fn subgraph(self, graph: Arc<Graph>) -> Self {
        let key = Self::subgraph_key(&self.state);
        let child = Arc::clone(&graph);
        let forward_key = key.clone();

        self.operation(move |ctx: &mut Context| {
            let execution = child.start(std::mem::take(ctx));
            *ctx = execution.context;
            ctx.insert(forward_key.clone(), execution.process);
            Ok(())
        })
        .rollback(move |ctx: &mut Context| match ctx.remove::<Process>(&key) {
            Some(process) => graph.rollback(&process, ctx).map_err(BoxError::from),
            None => Ok(()),
        })
    }

    /// Context key holding the child process of a [`subgraph`](Self::subgraph)
    /// node.
    pub fn subgraph_key(state: &StateName) -> String {
        format!("{state}.subgraph")
    }

    /// Sets the standalone rollback, used when the operation is not a command.
    pub fn rollback<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Context) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let rollback: Callable = Arc::new(f);
        self.rollback = Some(rollback);
        self
    }

    /// Maps `signal` to the `target` state.
    pub fn on(mut self, signal: impl Into<Signal>, target: impl Into<StateName>) -> Self {
        self.signals.insert(signal.into(), target.into());
        self
    }

    /// Adds several signal mappings at once.
    pub fn signals<I, S, T>(mut self, signals: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<Signal>,
        T: Into<StateName>,
    {
        self.signals
            .extend(signals.into_iter().map(|(s, t)| (s.into(), t.into())));
        self
    }

    /// Sets an inline context-preparation hook.
    pub fn prepare_context<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Context) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let hook: PrepareFn = Arc::new(f);
        self.prepare_context = Some(Hook::Callable(hook));
        self
    }

    /// Uses a context-preparation hook registered on the graph.
    pub fn prepare_context_named(mut self, name: impl Into<String>) -> Self {
        self.prepare_context = Some(Hook::Named(name.into()));
        self
    }

    /// Sets an inline hook choosing the outbound signal.
    pub fn determine_signal<F, S>(mut self, f: F) -> Self
    where
        F: Fn(&Context) -> S + Send + Sync + 'static,
        S: Into<Signal>,
    {
        let hook: SignalFn = Arc::new(move |ctx: &Context| -> Signal { f(ctx).into() });
        self.determine_signal = Some(Hook::Callable(hook));
        self
    }

    /// Uses a signal hook registered on the graph.
    pub fn determine_signal_named(mut self, name: impl Into<String>) -> Self {
        self.determine_signal = Some(Hook::Named(name.into()));
        self
    }

    /// Always emits `signal` after the operation.
    pub fn emit(self, signal: impl Into<Signal>) -> Self {
        let signal = signal.into();
        self.determine_signal(move |_: &Context| signal.clone())
    }

    pub fn state(&self) -> &StateName {
        &self.state
    }

    pub fn node_operation(&self) -> Option<&NodeOperation> {
        self.operation.as_ref()
    }

    pub fn standalone_rollback(&self) -> Option<&Callable> {
        self.rollback.as_ref()
    }

    pub fn signal_table(&self) -> &BTreeMap<Signal, StateName> {
        &self.signals
    }

    pub fn prepare_hook(&self) -> Option<&Hook<PrepareFn>> {
        self.prepare_context.as_ref()
    }

    pub fn signal_hook(&self) -> Option<&Hook<SignalFn>> {
        self.determine_signal.as_ref()
    }

    /// Returns the state `signal` leads to from this node.
    pub fn target(&self, signal: &Signal) -> Option<&StateName> {
        self.signals.get(signal)
    }
}
