//! Operation trait and standalone execution.

use crate::context::Context;
use crate::error::{BoxError, Halt};

/// A reusable command with forward and compensating logic.
///
/// `call` signals a handled failure by returning the [`Halt`] produced by
/// [`Context::fail`]. Any other error is treated as unhandled by whoever runs
/// the operation.
///
/// # Examples
///
/// ```
/// use switchyard_core::{execute, BoxError, Context, Operation};
///
/// #[derive(Debug)]
/// struct Tally;
///
/// impl Operation for Tally {
///     fn required_args(&self) -> &[&'static str] {
///         &["total"]
///     }
///
///     fn call(&self, ctx: &mut Context) -> Result<(), BoxError> {
///         let total = ctx.get::<i64>("total").copied().unwrap_or(0);
///         if total >= 20 {
///             return Err(ctx.fail("total has reached max").into());
///         }
///         ctx.insert("total", total + 1);
///         Ok(())
///     }
/// }
///
/// let ctx = execute(&Tally, Context::new().with("total", 10i64));
/// assert!(ctx.is_success());
/// assert_eq!(ctx.get::<i64>("total"), Some(&11));
///
/// let ctx = execute(&Tally, Context::new());
/// assert_eq!(ctx.message(), Some("Missing required arguments: total"));
/// ```
pub trait Operation: Send + Sync {
    /// Performs the business logic.
    fn call(&self, ctx: &mut Context) -> Result<(), BoxError>;

    /// Reverses the effect of `call`.
    fn rollback(&self, _ctx: &mut Context) -> Result<(), BoxError> {
        Ok(())
    }

    /// Context keys that must be present before `call` runs.
    fn required_args(&self) -> &[&'static str] {
        &[]
    }

    /// Name used in failure messages. Defaults to the type name without its
    /// module path or generic arguments.
    fn name(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        let path = full.split('<').next().unwrap_or(full);
        path.rsplit("::").next().unwrap_or(path)
    }
}

/// Fails the context if any of the operation's required args is missing.
pub fn validate_required_args<O>(op: &O, ctx: &mut Context) -> Result<(), Halt>
where
    O: Operation + ?Sized,
{
    let missing = ctx.missing_keys(op.required_args());
    if missing.is_empty() {
        return Ok(());
    }

    Err(ctx.fail(format!(
        "Missing required arguments: {}",
        missing.join(", ")
    )))
}

/// Runs an operation on its own, outside any graph.
///
/// Required args are validated first. The returned context carries the
/// outcome: a [`Halt`] leaves it failed as-is, any other error fails it with
/// `Unhandled exception <name>: <message>` and attaches the error.
pub fn execute<O>(op: &O, mut ctx: Context) -> Context
where
    O: Operation + ?Sized,
{
    if validate_required_args(op, &mut ctx).is_err() {
        return ctx;
    }

    if let Err(err) = op.call(&mut ctx) {
        if !err.is::<Halt>() {
            let message = format!("Unhandled exception {}: {}", op.name(), err);
            ctx.fail_with(message, err);
        }
    }

    ctx
}

/// Runs an operation's rollback on its own. Errors are not swallowed.
pub fn revert<O>(op: &O, mut ctx: Context) -> Result<Context, BoxError>
where
    O: Operation + ?Sized,
{
    op.rollback(&mut ctx)?;
    Ok(ctx)
}
