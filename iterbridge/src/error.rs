//! Error types for the bridge.
//!
//! Resolution-time failures ([`ResolveError`]) happen synchronously before
//! any channel pair exists, so there is nothing to clean up. Operation
//! failures raised by the iterator itself are not errors of the bridge:
//! they cross the pair as `error` records with a cloneable payload and are
//! surfaced to the caller that issued the corresponding request.

use serde_json::{Value, json};

/// Resolution-time failure: the nominated value could not be turned into
/// an iterator handle.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// None of the recognized iterator capabilities matched.
    #[error("value does not expose any iterator capability")]
    NotIterable,

    /// An iterable factory produced something that is not iterator-shaped.
    #[error("iterable factory violated the iterator protocol: {message}")]
    ProtocolViolation {
        /// What the factory product was missing.
        message: String,
    },
}

/// Synthesize the error payload reported for a transport failure.
///
/// This value is produced locally on the detecting side; it is never sent,
/// since the channel itself is presumed gone.
pub fn clone_failure(detail: &str) -> Value {
    json!({
        "name": "DataCloneError",
        "message": detail,
    })
}
