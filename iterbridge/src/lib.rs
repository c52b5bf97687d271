//! # iterbridge
//!
//! Cross-boundary iterator transfer: hand a stateful, single-consumer
//! sequence across an asynchronous boundary so that a newly constructed
//! remote handle becomes its sole consumer.
//!
//! This crate provides:
//! - **Entangled channel pairs**: ordered, structurally-cloning message
//!   transport between two endpoints, severable exactly once
//! - **Capability resolution**: classify a nominated value as a sync or
//!   async iterator once, at transfer time
//! - **Source adapters**: serialize operation dispatch onto the real
//!   iterator and translate outcomes into response records
//! - **Consumer adapter**: the canonical asynchronous iteration surface,
//!   matching responses to requests strictly FIFO
//!
//! # Example
//!
//! ```rust,ignore
//! use iterbridge::{transfer_in, transfer_out, Candidate};
//! use serde_json::json;
//!
//! let ticket = transfer_out(Candidate::from_iterator(
//!     vec![json!(1), json!(2)].into_iter(),
//! ))?;
//!
//! // `ticket` crosses the boundary; the receiving side binds it:
//! let remote = transfer_in(ticket);
//! let step = remote.next(None).await?;
//! assert_eq!(step.value, json!(1));
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

// =============================================================================
// Modules
// =============================================================================

/// Bridge setup: transfer entry points on both sides.
pub mod bridge;

/// Entangled channel endpoint pairs.
pub mod channel;

/// Pluggable structural-clone codecs.
pub mod codec;

/// Consumer adapter bound to the remote endpoint.
pub mod consumer;

/// Error types for resolution and transport.
pub mod error;

/// Pending request slots.
pub mod promise;

/// Notified FIFO queues.
pub mod queue;

/// Iterator capability resolution.
pub mod resolve;

/// Source adapters bound to the local endpoint.
pub mod source;

/// Protocol records.
pub mod wire;

mod task;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use bridge::{TransferTicket, transfer_in, transfer_out, transfer_out_with};
pub use channel::{
    ChannelError, MAX_CLONE_SIZE, PortEndpoint, PortEvent, entangled_pair, entangled_pair_with,
};
pub use codec::{CodecError, JsonCodec, MessageCodec};
pub use consumer::RemoteIterator;
pub use error::{ResolveError, clone_failure};
pub use promise::{SlotFuture, SlotPromise, pending_slot};
pub use queue::{NotifiedQueue, RecvFuture};
pub use resolve::{
    AsyncFactory, AsyncIterHandle, Candidate, Origin, Resolved, ResolvedHandle, SyncFactory,
    SyncIterHandle, ValueIter, resolve,
};
pub use wire::{IterStep, Request, Response, StepResult};
