use std::sync::{Arc, Mutex};
use switchyard::prelude::*;

#[derive(Debug, thiserror::Error)]
#[error("not found")]
struct NotFound;

fn total(ctx: &Context) -> i64 {
    ctx.get::<i64>("total").copied().unwrap_or(0)
}

fn add(ctx: &mut Context, amount: i64) {
    let next = total(ctx) + amount;
    ctx.insert("total", next);
}

fn states(names: &[&str]) -> Vec<StateName> {
    names.iter().copied().map(StateName::from).collect()
}

fn simple_graph() -> Graph {
    Graph::builder("SimpleWorkflow")
        .start_node([("continue", "started")])
        .add_node(
            Node::new("started")
                .operation(|ctx: &mut Context| {
                    add(ctx, 1);
                    Ok(())
                })
                .determine_signal(|ctx: &Context| if total(ctx) > 10 { "pause" } else { "stop" })
                .on("pause", "paused")
                .on("stop", "stopped"),
        )
        .add_node(Node::new("paused").on("continue", "stopped"))
        .add_node(
            Node::new("stopped")
                .operation(|ctx: &mut Context| {
                    add(ctx, 2);
                    Ok(())
                })
                .emit("wait"),
        )
        .build()
        .expect("valid graph")
}

fn failing_graph() -> Graph {
    Graph::builder("FailingWorkflow")
        .start_node([
            ("continue", "failed"),
            ("raise_exception", "unhandled_exception"),
        ])
        .add_node(
            Node::new("failed")
                .operation(|ctx: &mut Context| Err(ctx.fail("workflow error!").into()))
                .on("continue", "completed"),
        )
        .add_node(
            Node::new("unhandled_exception")
                .operation(|_: &mut Context| Err(NotFound.into()))
                .emit("wait"),
        )
        .add_node(Node::new("completed").emit("wait"))
        .build()
        .expect("valid graph")
}

fn rollback_graph() -> Graph {
    let step = |state: &str, next: &str| {
        Node::new(state)
            .operation(|ctx: &mut Context| {
                add(ctx, 1);
                Ok(())
            })
            .rollback(|ctx: &mut Context| {
                add(ctx, -1);
                Ok(())
            })
            .on("continue", next)
    };

    Graph::builder("RollbackWorkflow")
        .start_node([("continue", "started")])
        .add_node(step("started", "running"))
        .add_node(step("running", "sprinting"))
        .add_node(step("sprinting", "stopped"))
        .add_node(Node::new("stopped").emit("wait"))
        .build()
        .expect("valid graph")
}

#[derive(Debug)]
struct Tally;

impl Operation for Tally {
    fn required_args(&self) -> &[&'static str] {
        &["total"]
    }

    fn call(&self, ctx: &mut Context) -> Result<(), BoxError> {
        if total(ctx) >= 20 {
            return Err(ctx.fail("total has reached max").into());
        }
        add(ctx, 1);
        Ok(())
    }

    fn rollback(&self, ctx: &mut Context) -> Result<(), BoxError> {
        add(ctx, -1);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingRepository {
    saved: Mutex<Vec<(Option<String>, String)>>,
}

impl RecordingRepository {
    fn saved(&self) -> Vec<(Option<String>, String)> {
        self.saved.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Checkpoint for RecordingRepository {
    fn save(&self, process: &Process, state: &StateName) -> Result<bool, BoxError> {
        let mut saved = self.saved.lock().map_err(|e| e.to_string())?;
        saved.push((process.reference().map(str::to_string), state.to_string()));
        Ok(true)
    }
}

#[test]
fn test_default_signal_runs_to_completion() {
    let graph = simple_graph();
    let execution = graph.call(None, Some(Process::new()), Context::new().with("total", 0i64));

    assert!(execution.context.is_success());
    assert_eq!(total(&execution.context), 3);
    assert_eq!(execution.process.state().as_str(), "stopped");
    assert_eq!(execution.process.visited(), states(&["started", "stopped"]));
}

#[test]
fn test_custom_signal_condition_routes_through_paused() {
    let graph = simple_graph();
    let execution = graph.start(Context::new().with("total", 11i64));

    assert!(execution.context.is_success());
    assert_eq!(total(&execution.context), 14);
    assert_eq!(execution.process.state().as_str(), "stopped");
    assert_eq!(
        execution.process.visited(),
        states(&["started", "paused", "stopped"])
    );
}

#[test]
fn test_resume_from_mid_graph_bypasses_initial() {
    let graph = simple_graph();
    let execution = graph.call(
        Some("stop".into()),
        Some(Process::at("started")),
        Context::new().with("total", 0i64),
    );

    assert!(execution.context.is_success());
    assert_eq!(total(&execution.context), 2);
    assert_eq!(execution.process.state().as_str(), "stopped");
}

#[test]
fn test_runs_are_deterministic() {
    let graph = simple_graph();
    let first = graph.start(Context::new().with("total", 11i64));
    let second = graph.start(Context::new().with("total", 11i64));

    assert_eq!(first.process.visited(), second.process.visited());
    assert_eq!(total(&first.context), total(&second.context));
}

#[test]
fn test_invalid_signal() {
    let graph = simple_graph();
    let execution = graph.call(
        Some("invalid".into()),
        None,
        Context::new().with("total", 0i64),
    );

    assert!(execution.context.is_failure());
    assert_eq!(execution.context.message(), Some("invalid signal: invalid"));
    assert!(execution.process.state().is_initial());
    assert_eq!(total(&execution.context), 0);
}

#[test]
fn test_calling_a_finished_process_continues_instead_of_repeating() {
    let graph = simple_graph();
    let first = graph.start(Context::new().with("total", 0i64));
    let second = graph.call(None, Some(first.process), first.context);

    // `stopped` has no outbound signals, so nothing re-runs.
    assert!(second.context.is_failure());
    assert_eq!(second.context.message(), Some("invalid signal: continue"));
    assert_eq!(total(&second.context), 3);
    assert_eq!(second.process.state().as_str(), "stopped");
}

#[test]
fn test_business_failure_halts() {
    let graph = failing_graph();
    let execution = graph.start(Context::new());

    assert!(execution.context.is_failure());
    assert_eq!(execution.context.message(), Some("workflow error!"));
    assert!(execution.process.state().is_initial());
    assert!(execution.process.visited().is_empty());
}

#[test]
fn test_unhandled_exception_is_wrapped() {
    let graph = failing_graph();
    let execution = graph.call(Some("raise_exception".into()), None, Context::new());

    assert!(execution.context.is_failure());
    assert_eq!(
        execution.context.message(),
        Some("Unhandled exception FailingWorkflow: not found")
    );
    let exception = execution.context.exception().expect("exception attached");
    assert!(exception.is::<NotFound>());
    assert_eq!(exception.to_string(), "not found");
    assert!(execution.process.state().is_initial());
}

#[test]
fn test_refused_checkpoint_stops_at_last_persisted_state() {
    let graph = simple_graph();
    let process = Process::new().with_checkpoint(|_, state| Ok(state.as_str() != "stopped"));
    let execution = graph.call(None, Some(process), Context::new().with("total", 0i64));

    assert!(execution.context.is_failure());
    let message = execution.context.message().unwrap_or_default();
    assert!(message.contains("failed to persist process state: `stopped`"));
    assert!(message.starts_with("SimpleWorkflow"));
    assert!(execution.context.exception().is_none());
    assert_eq!(execution.process.state().as_str(), "started");
    assert_eq!(execution.process.visited(), states(&["started"]));
}

#[test]
fn test_failing_checkpoint_attaches_error() {
    let graph = simple_graph();
    let process = Process::new().with_checkpoint(|_, _| Err("failing_persist_process failed".into()));
    let execution = graph.call(None, Some(process), Context::new().with("total", 0i64));

    assert!(execution.context.is_failure());
    assert_eq!(
        execution.context.message(),
        Some("SimpleWorkflow failed to persist process state: `started`")
    );
    assert_eq!(
        execution.context.exception().map(|e| e.to_string()),
        Some("failing_persist_process failed".to_string())
    );
    assert!(execution.process.state().is_initial());
}

#[test]
fn test_graph_default_checkpoint() {
    let repository = Arc::new(RecordingRepository::default());
    let graph = Graph::builder("Persisted")
        .start_node([("continue", "started")])
        .add_node(Node::new("started").on("continue", "stopped"))
        .add_node(Node::new("stopped"))
        .checkpointer(repository.clone())
        .build()
        .expect("valid graph");

    let execution = graph.call(None, Some(Process::new().with_reference("order-7")), Context::new());

    assert!(execution.context.is_success());
    assert_eq!(
        repository.saved(),
        vec![
            (Some("order-7".to_string()), "started".to_string()),
            (Some("order-7".to_string()), "stopped".to_string()),
        ]
    );

    // A process carrying its own checkpoint bypasses the graph default.
    let own = Process::new().with_checkpoint(|_, _| Ok(true));
    let execution = graph.call(None, Some(own), Context::new());
    assert!(execution.context.is_success());
    assert_eq!(repository.saved().len(), 2);
}

#[test]
fn test_chain_of_command_visits_every_node() {
    let failing = |state: &'static str, next: Option<&'static str>| {
        let node = Node::new(state)
            .operation(move |ctx: &mut Context| Err(ctx.fail(format!("{state} failed")).into()));
        match next {
            Some(next) => node.on("continue", next),
            None => node,
        }
    };

    let graph = Graph::builder("ChainOfCommandWorkflow")
        .chain_of_command()
        .start_node([("continue", "one")])
        .add_node(failing("one", Some("two")))
        .add_node(failing("two", Some("three")))
        .add_node(failing("three", Some("four")))
        .add_node(failing("four", None))
        .build()
        .expect("valid graph");

    let execution = graph.start(Context::new());

    assert!(execution.context.is_failure());
    assert_eq!(execution.context.message(), Some("four failed"));
    assert_eq!(execution.process.state().as_str(), "four");
    assert_eq!(
        execution.process.visited(),
        states(&["one", "two", "three", "four"])
    );
}

#[test]
fn test_chain_of_command_uses_signal_hook_after_failure() {
    let graph = Graph::builder("Recovering")
        .failure_handling(FailureHandling::ChainOfCommand)
        .start_node([("continue", "charge")])
        .add_node(
            Node::new("charge")
                .operation(|ctx: &mut Context| Err(ctx.fail("card declined").into()))
                .determine_signal(|ctx: &Context| if ctx.is_failure() { "refund" } else { "ship" })
                .on("refund", "refunded")
                .on("ship", "shipped"),
        )
        .add_node(Node::new("refunded").emit("wait"))
        .add_node(Node::new("shipped").emit("wait"))
        .build()
        .expect("valid graph");

    let execution = graph.start(Context::new());

    assert!(execution.context.is_failure());
    assert_eq!(execution.context.message(), Some("card declined"));
    assert_eq!(execution.process.visited(), states(&["charge", "refunded"]));
}

#[test]
fn test_chain_of_command_continues_after_prepare_failure() {
    let graph = Graph::builder("GuardedChain")
        .chain_of_command()
        .start_node([("continue", "one")])
        .add_node(
            Node::new("one")
                .prepare_context(|ctx: &mut Context| Err(ctx.fail("prep failed").into()))
                .operation(|ctx: &mut Context| {
                    ctx.insert("one_ran", true);
                    Ok(())
                })
                .on("continue", "two"),
        )
        .add_node(Node::new("two").operation(|ctx: &mut Context| {
            ctx.insert("two_ran", true);
            Ok(())
        }))
        .build()
        .expect("valid graph");

    let execution = graph.start(Context::new());

    assert!(execution.context.is_failure());
    assert_eq!(execution.context.message(), Some("prep failed"));
    assert!(!execution.context.contains_key("one_ran"));
    assert_eq!(execution.context.get::<bool>("two_ran"), Some(&true));
    assert_eq!(execution.process.state().as_str(), "two");
    assert_eq!(execution.process.visited(), states(&["one", "two"]));
}

#[test]
fn test_unhandled_errors_are_not_swallowed_by_chain_of_command() {
    let graph = Graph::builder("Chain")
        .chain_of_command()
        .start_node([("continue", "broken")])
        .add_node(
            Node::new("broken")
                .operation(|_: &mut Context| Err(NotFound.into()))
                .on("continue", "after"),
        )
        .add_node(Node::new("after"))
        .build()
        .expect("valid graph");

    let execution = graph.start(Context::new());

    assert_eq!(
        execution.context.message(),
        Some("Unhandled exception Chain: not found")
    );
    assert!(execution.process.state().is_initial());
}

#[test]
fn test_rollback_restores_counter_in_reverse_order() {
    let graph = rollback_graph();
    let Execution {
        mut context,
        process,
    } = graph.start(Context::new().with("total", 0i64));

    assert!(context.is_success());
    assert_eq!(total(&context), 3);
    assert_eq!(process.state().as_str(), "stopped");
    assert_eq!(
        process.visited(),
        states(&["started", "running", "sprinting", "stopped"])
    );

    let mut manager = graph.manager(Some(process), context);
    let mut order = Vec::new();
    manager
        .rollback_with(|state| order.push(state.to_string()))
        .expect("rollback succeeds");
    assert_eq!(order, vec!["stopped", "sprinting", "running", "started"]);

    context = manager.into_execution().context;
    assert_eq!(total(&context), 0);
}

#[test]
fn test_rollback_does_not_checkpoint() {
    let saves = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&saves);
    let graph = rollback_graph();
    let process = Process::new().with_checkpoint(move |_, _| {
        if let Ok(mut count) = counter.lock() {
            *count += 1;
        }
        Ok(true)
    });

    let Execution {
        mut context,
        process,
    } = graph.call(None, Some(process), Context::new().with("total", 0i64));
    let after_run = saves.lock().map(|c| *c).unwrap_or_default();
    assert_eq!(after_run, 4);

    graph
        .rollback(&process, &mut context)
        .expect("rollback succeeds");
    assert_eq!(total(&context), 0);
    assert_eq!(saves.lock().map(|c| *c).unwrap_or_default(), after_run);
    assert_eq!(process.state().as_str(), "stopped");
}

#[test]
fn test_command_rollback_takes_precedence() {
    let graph = Graph::builder("Commands")
        .start_node([("continue", "tally")])
        .add_node(
            Node::new("tally")
                .command(Tally)
                .rollback(|ctx: &mut Context| {
                    ctx.insert("standalone", true);
                    Ok(())
                }),
        )
        .build()
        .expect("valid graph");

    let Execution {
        mut context,
        process,
    } = graph.start(Context::new().with("total", 5i64));
    assert_eq!(total(&context), 6);

    graph
        .rollback(&process, &mut context)
        .expect("rollback succeeds");
    assert_eq!(total(&context), 5);
    assert!(!context.contains_key("standalone"));
}

#[test]
fn test_command_missing_required_args() {
    let graph = Graph::builder("Commands")
        .start_node([("continue", "tally")])
        .add_node(Node::new("tally").command(Tally))
        .build()
        .expect("valid graph");

    let execution = graph.start(Context::new());

    assert!(execution.context.is_failure());
    assert_eq!(
        execution.context.message(),
        Some("Missing required arguments: total")
    );
    assert!(execution.process.state().is_initial());
}

#[test]
fn test_rollback_error_is_returned() {
    let graph = Graph::builder("Brittle")
        .start_node([("continue", "first")])
        .add_node(
            Node::new("first")
                .rollback(|_: &mut Context| Err("cannot undo".into()))
                .on("continue", "second"),
        )
        .add_node(Node::new("second").rollback(|ctx: &mut Context| {
            ctx.insert("second_undone", true);
            Ok(())
        }))
        .build()
        .expect("valid graph");

    let Execution {
        mut context,
        process,
    } = graph.start(Context::new());

    let err = graph
        .rollback(&process, &mut context)
        .expect_err("first rollback fails");
    assert!(matches!(
        err,
        WorkflowError::Rollback { ref state, .. } if state.as_str() == "first"
    ));
    assert_eq!(context.get::<bool>("second_undone"), Some(&true));
}

#[test]
fn test_named_hooks_and_context_replacement() {
    let graph = Graph::builder("Hooks")
        .prepare_hook("fresh_context", |ctx: &mut Context| {
            let carried = total(ctx);
            *ctx = Context::new().with("total", carried).with("prepared", true);
            Ok(())
        })
        .signal_hook("route", |ctx: &Context| {
            if ctx.contains_key("prepared") {
                "done"
            } else {
                "retry"
            }
        })
        .start_node([("continue", "prepare")])
        .add_node(
            Node::new("prepare")
                .prepare_context_named("fresh_context")
                .determine_signal_named("route")
                .on("done", "finished")
                .on("retry", "prepare"),
        )
        .add_node(Node::new("finished"))
        .build()
        .expect("valid graph");

    let execution = graph.start(Context::new().with("total", 4i64).with("stale", 1u8));

    assert!(execution.context.is_success());
    assert_eq!(total(&execution.context), 4);
    assert!(!execution.context.contains_key("stale"));
    assert_eq!(execution.process.state().as_str(), "finished");
}

#[test]
fn test_prepare_hook_failure_halts() {
    let graph = Graph::builder("Guarded")
        .start_node([("continue", "guarded")])
        .add_node(
            Node::new("guarded")
                .prepare_context(|ctx: &mut Context| {
                    if ctx.contains_key("user") {
                        Ok(())
                    } else {
                        Err(ctx.fail("not authorized").into())
                    }
                })
                .operation(|ctx: &mut Context| {
                    ctx.insert("ran", true);
                    Ok(())
                }),
        )
        .build()
        .expect("valid graph");

    let execution = graph.start(Context::new());

    assert_eq!(execution.context.message(), Some("not authorized"));
    assert!(!execution.context.contains_key("ran"));
    assert!(execution.process.state().is_initial());
}

#[test]
fn test_wait_pauses_and_resumes_across_invocations() {
    let graph = Graph::builder("Approval")
        .start_node([("continue", "submitted")])
        .add_node(
            Node::new("submitted")
                .operation(|ctx: &mut Context| {
                    ctx.insert("submitted", true);
                    Ok(())
                })
                .on("continue", "wait")
                .on("approve", "approved"),
        )
        .add_node(Node::new("approved").operation(|ctx: &mut Context| {
            ctx.insert("approved", true);
            Ok(())
        }))
        .build()
        .expect("valid graph");

    let first = graph.call(None, Some(Process::new().with_reference("req-1")), Context::new());
    assert!(first.context.is_success());
    assert_eq!(first.process.state().as_str(), "submitted");
    assert!(!first.context.contains_key("approved"));

    // Store and reload the process between invocations.
    let stored = serde_json::to_string(&first.process).expect("serializable");
    let restored: Process = serde_json::from_str(&stored).expect("deserializable");

    let second = graph.call(Some("approve".into()), Some(restored), first.context);
    assert!(second.context.is_success());
    assert_eq!(second.context.get::<bool>("approved"), Some(&true));
    assert_eq!(second.process.visited(), states(&["submitted", "approved"]));
    assert_eq!(second.process.reference(), Some("req-1"));
}

#[test]
fn test_nested_graphs() {
    let child = Arc::new(simple_graph());
    let graph = Graph::builder("WorkflowCallingWorkflow")
        .start_node([("continue", "first")])
        .add_node(Node::new("first").subgraph(Arc::clone(&child)).on("continue", "second"))
        .add_node(Node::new("second").subgraph(child).on("continue", "finished"))
        .add_node(Node::new("finished"))
        .build()
        .expect("valid graph");

    let execution = graph.start(Context::new().with("total", 0i64));

    assert!(execution.context.is_success());
    assert_eq!(total(&execution.context), 6);
    assert_eq!(execution.process.state().as_str(), "finished");
}

#[test]
fn test_failed_subgraph_fails_parent_node() {
    let child = Arc::new(failing_graph());
    let graph = Graph::builder("Parent")
        .start_node([("continue", "delegate")])
        .add_node(Node::new("delegate").subgraph(child))
        .build()
        .expect("valid graph");

    let execution = graph.start(Context::new());

    assert!(execution.context.is_failure());
    assert_eq!(execution.context.message(), Some("workflow error!"));
    assert!(execution.process.state().is_initial());
}

#[test]
fn test_rollback_replays_subgraph_history() {
    let child = Arc::new(rollback_graph());
    let graph = Graph::builder("Parent")
        .start_node([("continue", "first")])
        .add_node(Node::new("first").subgraph(Arc::clone(&child)).on("continue", "second"))
        .add_node(Node::new("second").subgraph(child))
        .build()
        .expect("valid graph");

    let Execution {
        mut context,
        process,
    } = graph.start(Context::new().with("total", 0i64));
    assert!(context.is_success());
    assert_eq!(total(&context), 6);
    assert!(context.contains_key(&Node::subgraph_key(&StateName::new("first"))));

    graph
        .rollback(&process, &mut context)
        .expect("rollback succeeds");
    assert_eq!(total(&context), 0);
    assert!(!context.contains_key(&Node::subgraph_key(&StateName::new("second"))));
}
