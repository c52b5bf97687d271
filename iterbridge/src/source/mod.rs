//! Source adapters: the side of the bridge that owns the real iterator.
//!
//! An adapter binds an exclusively-owned iterator handle to its channel
//! endpoint and runs a message-receive loop: decode the next request
//! record, dispatch the matching handle operation, translate the outcome
//! into a response record. The loop itself serializes dispatch — the
//! [`queued`] variant awaits each operation before reading the next
//! request, so the endpoint's inbound queue is the request queue and
//! responses always leave in arrival order.
//!
//! Once a terminal response has been sent (`done: true` or `error`), the
//! adapter disentangles the pair and exits. Requests still queued at that
//! point are never answered; the consumer adapter resolves them locally
//! when it observes the termination.

pub mod queued;
pub mod sync;

use crate::channel::PortEndpoint;
use crate::codec::MessageCodec;
use crate::resolve::{AsyncIterHandle, SyncIterHandle};
use crate::wire::Response;

/// Whether the receive loop keeps consuming requests.
pub(crate) enum Disposition {
    /// Keep the exchange open.
    Continue,
    /// The exchange is over; the loop exits.
    Finished,
}

/// Send a response record, reporting whether it was delivered.
///
/// A failed send is handled by the caller as a transport failure; the
/// channel has already notified the peer if it is still reachable.
pub(crate) fn deliver<C: MessageCodec>(endpoint: &PortEndpoint<C>, response: &Response) -> bool {
    match endpoint.send(response) {
        Ok(()) => true,
        Err(error) => {
            tracing::debug!(%error, "response record not delivered");
            false
        }
    }
}

/// Best-effort early termination of a synchronous handle.
///
/// Pure cleanup: the outcome is captured and discarded so a failure here
/// can never mask a result or error that was already reported.
pub(crate) fn release_sync(handle: &mut dyn SyncIterHandle) {
    if !handle.has_return() {
        return;
    }
    if let Err(error) = handle.ret(None) {
        tracing::debug!(%error, "discarding cleanup failure");
    }
}

/// Best-effort early termination of an asynchronous handle.
///
/// Same discard contract as [`release_sync`].
pub(crate) async fn release_async(handle: &mut dyn AsyncIterHandle) {
    if !handle.has_return() {
        return;
    }
    if let Err(error) = handle.ret(None).await {
        tracing::debug!(%error, "discarding cleanup failure");
    }
}
