//! Graph configuration.

use serde::{Deserialize, Serialize};

/// What the manager does when a node fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureHandling {
    /// Stop at the first failed node.
    #[default]
    Halt,
    /// Keep following the signal table after a failure. The context stays
    /// failed and records the last failure.
    #[serde(alias = "continue")]
    ChainOfCommand,
}

/// Options a host can load from its own configuration.
///
/// ```
/// use switchyard::{FailureHandling, GraphOptions};
///
/// let options: GraphOptions = serde_json::from_str(r#"{"failure_handling": "continue"}"#).unwrap();
/// assert_eq!(options.failure_handling, FailureHandling::ChainOfCommand);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphOptions {
    /// Failure handling mode.
    pub failure_handling: FailureHandling,
}
