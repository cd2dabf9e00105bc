//! Order fulfillment with branching, a pause and compensating rollback.
//!
//! Demonstrates:
//! - Command operations with required args
//! - Routing on a signal hook (card payments continue, transfers wait)
//! - Resuming a stored process with an external signal
//! - Rolling back reserved stock and charges when shipping fails

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use switchyard::prelude::*;

#[derive(Debug, Clone)]
struct Order {
    id: String,
    items: Vec<OrderItem>,
    payment_method: PaymentMethod,
    country: String,
}

#[derive(Debug, Clone)]
struct OrderItem {
    product_id: String,
    quantity: u32,
    price: f64,
}

#[derive(Debug, Clone, PartialEq)]
enum PaymentMethod {
    CreditCard,
    BankTransfer,
}

type Inventory = HashMap<String, u32>;

fn order(ctx: &mut Context) -> Result<Order, BoxError> {
    match ctx.get::<Order>("order") {
        Some(order) => Ok(order.clone()),
        None => Err(ctx.fail("Order data not found").into()),
    }
}

#[derive(Debug)]
struct ValidateOrder;

impl Operation for ValidateOrder {
    fn required_args(&self) -> &[&'static str] {
        &["order", "inventory"]
    }

    fn call(&self, ctx: &mut Context) -> Result<(), BoxError> {
        println!("Validating order...");
        let order = order(ctx)?;

        if order.items.is_empty() {
            return Err(ctx.fail("Order must contain at least one item").into());
        }

        let amount: f64 = order
            .items
            .iter()
            .map(|item| item.price * f64::from(item.quantity))
            .sum();
        ctx.insert("amount", amount);
        Ok(())
    }
}

#[derive(Debug)]
struct ReserveStock;

impl Operation for ReserveStock {
    fn call(&self, ctx: &mut Context) -> Result<(), BoxError> {
        println!("Reserving stock...");
        let order = order(ctx)?;

        let shortage = match ctx.get::<Inventory>("inventory") {
            Some(inventory) => order.items.iter().find(|item| {
                inventory.get(&item.product_id).copied().unwrap_or(0) < item.quantity
            }),
            None => return Err(ctx.fail("Inventory not found").into()),
        };
        if let Some(item) = shortage {
            let message = format!("Insufficient stock for {}", item.product_id);
            return Err(ctx.fail(message).into());
        }

        if let Some(inventory) = ctx.get_mut::<Inventory>("inventory") {
            for item in &order.items {
                if let Some(stock) = inventory.get_mut(&item.product_id) {
                    *stock -= item.quantity;
                }
            }
        }
        Ok(())
    }

    fn rollback(&self, ctx: &mut Context) -> Result<(), BoxError> {
        println!("Releasing reserved stock...");
        let order = order(ctx)?;
        if let Some(inventory) = ctx.get_mut::<Inventory>("inventory") {
            for item in &order.items {
                *inventory.entry(item.product_id.clone()).or_default() += item.quantity;
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
struct ChargePayment;

impl Operation for ChargePayment {
    fn required_args(&self) -> &[&'static str] {
        &["amount"]
    }

    fn call(&self, ctx: &mut Context) -> Result<(), BoxError> {
        let amount = ctx.get::<f64>("amount").copied().unwrap_or_default();
        println!("Charging {amount:.2}...");
        let txn_id = format!("TXN-{}", order(ctx)?.id);
        ctx.insert("transaction_id", txn_id);
        Ok(())
    }

    fn rollback(&self, ctx: &mut Context) -> Result<(), BoxError> {
        if let Some(txn) = ctx.remove::<String>("transaction_id") {
            println!("Refunding {txn}...");
        }
        Ok(())
    }
}

#[derive(Debug)]
struct ArrangeShipping;

impl Operation for ArrangeShipping {
    fn call(&self, ctx: &mut Context) -> Result<(), BoxError> {
        println!("Arranging shipping...");
        let order = order(ctx)?;
        if order.country != "USA" {
            let message = format!("No carrier ships to {}", order.country);
            return Err(ctx.fail(message).into());
        }
        ctx.insert("tracking_number", format!("TRK-{}", order.id));
        Ok(())
    }
}

fn fulfillment_graph() -> Result<Graph, WorkflowError> {
    Graph::builder("OrderFulfillment")
        .signal_hook("payment_route", |ctx: &Context| {
            match ctx.get::<Order>("order").map(|o| &o.payment_method) {
                Some(PaymentMethod::BankTransfer) => "await_transfer",
                _ => "charge",
            }
        })
        .start_node([("continue", "validated")])
        .add_node(
            Node::new("validated")
                .command(ValidateOrder)
                .on("continue", "reserved"),
        )
        .add_node(
            Node::new("reserved")
                .command(ReserveStock)
                .determine_signal_named("payment_route")
                .on("charge", "charged")
                .on("await_transfer", "wait")
                .on("transfer_received", "charged"),
        )
        .add_node(
            Node::new("charged")
                .command(ChargePayment)
                .on("continue", "shipped"),
        )
        .add_node(
            Node::new("shipped")
                .command(ArrangeShipping)
                .emit("wait"),
        )
        .build()
}

fn new_order(id: &str, payment_method: PaymentMethod, country: &str) -> Context {
    let inventory: Inventory = HashMap::from([
        ("PROD-001".to_string(), 10),
        ("PROD-002".to_string(), 5),
    ]);
    let order = Order {
        id: id.to_string(),
        items: vec![
            OrderItem {
                product_id: "PROD-001".to_string(),
                quantity: 2,
                price: 29.99,
            },
            OrderItem {
                product_id: "PROD-002".to_string(),
                quantity: 1,
                price: 49.99,
            },
        ],
        payment_method,
        country: country.to_string(),
    };

    Context::new().with("order", order).with("inventory", inventory)
}

fn report(label: &str, execution: &Execution) {
    match execution.context.message() {
        None => println!(
            "[{label}] ok at '{}' visited {:?}\n",
            execution.process.state(),
            execution.process.visited()
        ),
        Some(message) => println!(
            "[{label}] failed at '{}': {message}\n",
            execution.process.state()
        ),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let graph = Arc::new(fulfillment_graph()?);

    // Card payment runs straight through.
    let execution = graph.start(new_order("ORD-1", PaymentMethod::CreditCard, "USA"));
    report("card", &execution);

    // Bank transfer pauses after reserving stock, then resumes on a signal.
    let paused = graph.call(
        None,
        Some(Process::new().with_reference("ORD-2")),
        new_order("ORD-2", PaymentMethod::BankTransfer, "USA"),
    );
    report("transfer", &paused);
    let stored = serde_json::to_string(&paused.process)?;
    let process: Process = serde_json::from_str(&stored)?;
    let resumed = graph.call(
        Some("transfer_received".into()),
        Some(process),
        paused.context,
    );
    report("transfer resumed", &resumed);

    // Shipping fails, so compensate everything done so far.
    let Execution {
        mut context,
        process,
    } = graph.start(new_order("ORD-3", PaymentMethod::CreditCard, "Atlantis"));
    println!(
        "[abroad] failed at '{}': {}",
        process.state(),
        context.message().unwrap_or_default()
    );
    graph.rollback(&process, &mut context)?;
    let stock = context
        .get::<Inventory>("inventory")
        .map(|inv| inv.values().sum::<u32>())
        .unwrap_or_default();
    println!("[abroad] rolled back, stock units back to {stock}");

    Ok(())
}
