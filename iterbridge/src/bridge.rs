//! Bridge setup: wiring a resolved iterator to a fresh channel pair.
//!
//! [`transfer_out`] runs on the sending side: resolve the candidate, bind
//! the handle to one endpoint of a fresh entangled pair through the
//! matching source adapter, and hand back the other endpoint wrapped in a
//! [`TransferTicket`]. Moving the ticket across the boundary *is* the
//! transfer; [`transfer_in`] reconstructs the consumer handle on the
//! receiving side.
//!
//! The receiving side always gets an asynchronous iteration capability,
//! regardless of the source's classification — a deliberate type
//! promotion, since the channel itself is inherently asynchronous.

use std::fmt;

use crate::channel::{PortEndpoint, entangled_pair_with};
use crate::codec::{JsonCodec, MessageCodec};
use crate::consumer::RemoteIterator;
use crate::error::ResolveError;
use crate::resolve::{Candidate, ResolvedHandle, resolve};
use crate::source;

/// The serialized handle produced by [`transfer_out`].
///
/// Owns the remote endpoint of the pair. The source iterator is already
/// bound to its source adapter when a ticket exists; the ticket is the
/// only way left to consume the sequence.
pub struct TransferTicket<C: MessageCodec = JsonCodec> {
    endpoint: PortEndpoint<C>,
}

impl<C: MessageCodec> fmt::Debug for TransferTicket<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferTicket").finish_non_exhaustive()
    }
}

/// Transfer a candidate out of the current realm, using the default
/// [`JsonCodec`] for structural clones.
///
/// # Errors
///
/// Fails with the resolver's error if the candidate exposes no usable
/// iterator capability; no channel pair is created in that case.
pub fn transfer_out(candidate: Candidate) -> Result<TransferTicket, ResolveError> {
    transfer_out_with(candidate, JsonCodec)
}

/// Transfer a candidate out of the current realm with a custom codec.
///
/// Must be called inside a `tokio::task::LocalSet`: the source adapter is
/// spawned as a local task.
///
/// # Errors
///
/// Fails with the resolver's error if the candidate exposes no usable
/// iterator capability.
pub fn transfer_out_with<C: MessageCodec>(
    candidate: Candidate,
    codec: C,
) -> Result<TransferTicket<C>, ResolveError> {
    let resolved = resolve(candidate)?;
    let (local, remote) = entangled_pair_with(codec);

    tracing::debug!(origin = ?resolved.origin, "binding iterator to fresh channel pair");
    match resolved.handle {
        ResolvedHandle::Sync(handle) => {
            source::sync::spawn(handle, local);
        }
        ResolvedHandle::Async(handle) => {
            source::queued::spawn(handle, local);
        }
    }

    Ok(TransferTicket { endpoint: remote })
}

/// Reconstruct the consumer handle on the receiving side.
///
/// Must be called inside a `tokio::task::LocalSet`: the consumer's reader
/// is spawned as a local task.
pub fn transfer_in<C: MessageCodec>(ticket: TransferTicket<C>) -> RemoteIterator<C> {
    RemoteIterator::attach(ticket.endpoint)
}
