//! Protocol records crossing an entangled pair.
//!
//! Two directions, one discriminator field each:
//!
//! | direction         | `kind`   | payload              |
//! |-------------------|----------|----------------------|
//! | consumer → source | `next`   | input value or absent|
//! | consumer → source | `return` | input value or absent|
//! | consumer → source | `throw`  | error value          |
//! | source → consumer | `result` | `{value, done}`      |
//! | source → consumer | `error`  | error value          |
//!
//! Per-direction delivery order is preserved by the channel, and both
//! adapters answer strictly in arrival order, so responses pair with
//! requests purely by FIFO position.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One step of an iteration: the produced value plus the completion flag.
///
/// `value` is `Null` when the protocol has nothing to report (the
/// "undefined" of the wire format).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterStep {
    /// The value produced by this step.
    #[serde(default)]
    pub value: Value,
    /// Whether the sequence is exhausted after this step.
    pub done: bool,
}

impl IterStep {
    /// A non-terminal step carrying `value`.
    pub fn yielded(value: Value) -> Self {
        Self { value, done: false }
    }

    /// A terminal step carrying `value`.
    pub fn finished(value: Value) -> Self {
        Self { value, done: true }
    }
}

/// Outcome of any iterator operation: a step, or a thrown/rejected error
/// value.
pub type StepResult = Result<IterStep, Value>;

/// Record sent consumer → source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Request {
    /// Advance the iterator, optionally feeding it a value.
    Next {
        /// Input value handed to the advance operation, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// Terminate the iterator early. Always ends the exchange.
    Return {
        /// Input value handed to the early-terminate operation, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// Inject an error into the iterator.
    Throw {
        /// The injected error value.
        payload: Value,
    },
}

/// Record sent source → consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Response {
    /// A successful step.
    Result {
        /// The step produced by the operation.
        payload: IterStep,
    },
    /// The operation raised or rejected.
    Error {
        /// The error value.
        payload: Value,
    },
}
