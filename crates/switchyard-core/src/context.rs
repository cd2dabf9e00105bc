//! Run data and outcome carried through every operation.

use crate::error::{BoxError, Halt};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// Type-safe context key wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextKey(String);

impl ContextKey {
    /// Creates a new ContextKey.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContextKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ContextKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for ContextKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Mutable run data plus the outcome of the run.
///
/// Values of any `Send + Sync` type are stored by key and retrieved by
/// downcasting. Next to the data the context records whether the run failed,
/// with a message and the underlying error. Once failed, a context never
/// becomes successful again.
///
/// # Examples
///
/// ```
/// use switchyard_core::Context;
///
/// let mut ctx = Context::new().with("total", 10i64);
/// assert_eq!(ctx.get::<i64>("total"), Some(&10));
/// assert!(ctx.is_success());
///
/// let halt = ctx.fail("total has reached max");
/// assert_eq!(halt.message(), "total has reached max");
/// assert!(ctx.is_failure());
/// assert_eq!(ctx.message(), Some("total has reached max"));
/// ```
#[derive(Default)]
pub struct Context {
    data: HashMap<ContextKey, Box<dyn Any + Send + Sync>>,
    failure: bool,
    message: Option<String>,
    exception: Option<BoxError>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("keys", &self.data.keys().collect::<Vec<_>>())
            .field("failure", &self.failure)
            .field("message", &self.message)
            .field("exception", &self.exception)
            .finish()
    }
}

impl Context {
    /// Creates a new empty, successful context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value and returns the context, for building initial run data.
    pub fn with<T: Any + Send + Sync>(mut self, key: impl Into<ContextKey>, value: T) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts a value with the given key.
    ///
    /// If the key already exists, the previous value is replaced.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<ContextKey>, value: T) {
        self.data.insert(key.into(), Box::new(value));
    }

    /// Returns a reference to the value for the given key.
    ///
    /// Returns `None` if the key doesn't exist or the type doesn't match.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.data.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    /// Returns a mutable reference to the value for the given key.
    ///
    /// Returns `None` if the key doesn't exist or the type doesn't match.
    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.data.get_mut(key).and_then(|v| v.downcast_mut::<T>())
    }

    /// Removes a value by key and returns it.
    ///
    /// Returns `None` if the key doesn't exist or the type doesn't match.
    /// A value of the wrong type is still removed.
    pub fn remove<T: Any>(&mut self, key: &str) -> Option<T> {
        self.data
            .remove(key)
            .and_then(|v| v.downcast::<T>().ok())
            .map(|b| *b)
    }

    /// Returns `true` if the context contains a value for the given key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Returns an iterator over all keys in the context.
    pub fn keys(&self) -> impl Iterator<Item = &ContextKey> {
        self.data.keys()
    }

    /// Returns the number of entries in the context.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the context contains no entries.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the keys from `required` that have no value, in the given order.
    pub fn missing_keys<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|key| !self.contains_key(key))
            .collect()
    }

    /// Returns `true` until the context is failed.
    pub fn is_success(&self) -> bool {
        !self.failure
    }

    /// Returns `true` once the context is failed.
    pub fn is_failure(&self) -> bool {
        self.failure
    }

    /// The message of the most recent failure.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// The error attached to the most recent failure.
    pub fn exception(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.exception.as_deref()
    }

    /// Takes the attached error out of the context, leaving the failure flag set.
    pub fn take_exception(&mut self) -> Option<BoxError> {
        self.exception.take()
    }

    /// Marks the context failed and returns the [`Halt`] to unwind with.
    ///
    /// Any exception from an earlier failure is cleared.
    pub fn fail(&mut self, message: impl Into<String>) -> Halt {
        self.record_failure(message.into(), None)
    }

    /// Marks the context failed, attaching the error that caused it.
    pub fn fail_with(&mut self, message: impl Into<String>, exception: impl Into<BoxError>) -> Halt {
        self.record_failure(message.into(), Some(exception.into()))
    }

    fn record_failure(&mut self, message: String, exception: Option<BoxError>) -> Halt {
        self.failure = true;
        self.exception = exception;
        let halt = Halt::new(message.clone());
        self.message = Some(message);
        halt
    }
}
