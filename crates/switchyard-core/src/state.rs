//! State and signal names.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a node within a graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateName(String);

impl StateName {
    /// The mandatory entry state of every graph.
    pub const INITIAL: &'static str = "initial";

    /// Creates a new StateName.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the `initial` state.
    pub fn initial() -> Self {
        Self::new(Self::INITIAL)
    }

    /// Returns the state name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the `initial` state.
    pub fn is_initial(&self) -> bool {
        self.0 == Self::INITIAL
    }

    /// Returns `true` if this target pauses the run instead of naming a node.
    pub fn is_wait(&self) -> bool {
        self.0 == Signal::WAIT
    }
}

impl Default for StateName {
    fn default() -> Self {
        Self::initial()
    }
}

impl fmt::Display for StateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StateName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StateName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for StateName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for StateName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A named trigger looked up in a node's transition table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signal(String);

impl Signal {
    /// Default signal when the caller or a node gives none.
    pub const CONTINUE: &'static str = "continue";
    /// Terminal pause. Not a failure.
    pub const WAIT: &'static str = "wait";

    /// Creates a new Signal.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the `continue` signal.
    pub fn proceed() -> Self {
        Self::new(Self::CONTINUE)
    }

    /// Returns the `wait` signal.
    pub fn wait() -> Self {
        Self::new(Self::WAIT)
    }

    /// Returns the signal as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::proceed()
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Signal {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Signal {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Signal {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for Signal {
    fn borrow(&self) -> &str {
        &self.0
    }
}
