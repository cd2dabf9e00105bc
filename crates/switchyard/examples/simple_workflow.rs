//! Simple single-state workflow example.

use switchyard::prelude::*;

#[derive(Debug)]
struct LoadData;

impl Operation for LoadData {
    fn call(&self, ctx: &mut Context) -> Result<(), BoxError> {
        println!("Loading data...");
        ctx.insert("data", "sample data".to_string());
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let graph = Graph::builder("SimpleWorkflow")
        .start_node([("continue", "loaded")])
        .add_node(Node::new("loaded").command(LoadData))
        .build()?;

    let execution = graph.start(Context::new());

    match execution.context.message() {
        None => {
            println!("Workflow completed at '{}'", execution.process.state());
            if let Some(data) = execution.context.get::<String>("data") {
                println!("Data: {}", data);
            }
        }
        Some(message) => eprintln!("Workflow failed: {}", message),
    }

    Ok(())
}
