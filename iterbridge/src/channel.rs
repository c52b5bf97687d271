//! Entangled channel endpoint pairs.
//!
//! A pair is created in one call; each endpoint can send a structurally
//! cloneable payload to its peer and receive an ordered stream of
//! [`PortEvent`]s. Either side can disentangle the pair, which is terminal:
//! a disentangled endpoint never sends or delivers again. Delivery order
//! equals send order per direction.
//!
//! The structural clone is performed by a [`MessageCodec`] at send time. A
//! payload that cannot be cloned — it fails to encode, or its encoding
//! exceeds [`MAX_CLONE_SIZE`] — is never delivered; the peer observes a
//! [`PortEvent::TransportFailure`] instead, and the sender gets
//! [`ChannelError::CloneFailed`] back.

use std::cell::Cell;
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::codec::{CodecError, JsonCodec, MessageCodec};
use crate::queue::{NotifiedQueue, RecvFuture};

/// Maximum encoded size of a cloneable payload (1 MiB).
///
/// Larger encodings are rejected as not structurally cloneable.
pub const MAX_CLONE_SIZE: usize = 1024 * 1024;

/// Event delivered on an endpoint's inbound stream.
#[derive(Debug, Clone, PartialEq)]
pub enum PortEvent {
    /// A structurally cloned payload from the peer.
    Message(Vec<u8>),
    /// The transport failed to deliver; the reason is human-readable.
    TransportFailure(String),
}

/// Errors surfaced by [`PortEndpoint::send`].
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The pair has been disentangled; nothing crosses it anymore.
    #[error("channel pair is disentangled")]
    Disentangled,

    /// The payload is not structurally cloneable.
    #[error("structural clone failed: {message}")]
    CloneFailed {
        /// Why the clone was rejected.
        message: String,
    },
}

/// One half of an entangled pair.
pub struct PortEndpoint<C: MessageCodec = JsonCodec> {
    inbound: Rc<NotifiedQueue<PortEvent>>,
    outbound: Rc<NotifiedQueue<PortEvent>>,
    entangled: Rc<Cell<bool>>,
    messages_sent: Cell<u64>,
    codec: C,
}

/// Create an entangled pair using the default [`JsonCodec`].
pub fn entangled_pair() -> (PortEndpoint, PortEndpoint) {
    entangled_pair_with(JsonCodec)
}

/// Create an entangled pair using the given codec for structural clones.
pub fn entangled_pair_with<C: MessageCodec>(codec: C) -> (PortEndpoint<C>, PortEndpoint<C>) {
    let a_inbound = Rc::new(NotifiedQueue::new());
    let b_inbound = Rc::new(NotifiedQueue::new());
    let entangled = Rc::new(Cell::new(true));

    let a = PortEndpoint {
        inbound: Rc::clone(&a_inbound),
        outbound: Rc::clone(&b_inbound),
        entangled: Rc::clone(&entangled),
        messages_sent: Cell::new(0),
        codec: codec.clone(),
    };
    let b = PortEndpoint {
        inbound: b_inbound,
        outbound: a_inbound,
        entangled,
        messages_sent: Cell::new(0),
        codec,
    };
    (a, b)
}

impl<C: MessageCodec> PortEndpoint<C> {
    /// Structurally clone `msg` and deliver it to the peer.
    ///
    /// # Errors
    ///
    /// [`ChannelError::Disentangled`] if the pair is severed;
    /// [`ChannelError::CloneFailed`] if the payload is not cloneable, in
    /// which case the peer sees a [`PortEvent::TransportFailure`] instead
    /// of a message.
    pub fn send<T: Serialize>(&self, msg: &T) -> Result<(), ChannelError> {
        if !self.entangled.get() {
            return Err(ChannelError::Disentangled);
        }

        let bytes = match self.codec.encode(msg) {
            Ok(bytes) if bytes.len() <= MAX_CLONE_SIZE => bytes,
            Ok(bytes) => {
                let message = format!(
                    "payload of {} bytes exceeds clone limit of {} bytes",
                    bytes.len(),
                    MAX_CLONE_SIZE
                );
                tracing::warn!(size = bytes.len(), "rejecting unclonable payload");
                self.outbound.push(PortEvent::TransportFailure(message.clone()));
                return Err(ChannelError::CloneFailed { message });
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(error = %e, "rejecting unclonable payload");
                self.outbound.push(PortEvent::TransportFailure(message.clone()));
                return Err(ChannelError::CloneFailed { message });
            }
        };

        self.outbound.push(PortEvent::Message(bytes));
        self.messages_sent.set(self.messages_sent.get() + 1);
        Ok(())
    }

    /// Wait for the next inbound event.
    ///
    /// Resolves to `None` once the pair is disentangled and every event
    /// queued before disentanglement has been delivered.
    pub fn recv(&self) -> RecvFuture<'_, PortEvent> {
        self.inbound.recv()
    }

    /// Decode a delivered message payload.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the bytes do not describe a `T`.
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        self.codec.decode(bytes)
    }

    /// Whether the pair can still exchange messages.
    pub fn is_entangled(&self) -> bool {
        self.entangled.get()
    }

    /// Number of payloads this endpoint has successfully sent.
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.get()
    }

    /// Sever the pair. Idempotent and terminal.
    ///
    /// Events already queued in either direction are still delivered;
    /// nothing new crosses the pair afterwards.
    pub fn disentangle(&self) {
        if self.entangled.replace(false) {
            tracing::debug!("channel pair disentangled");
            self.inbound.close();
            self.outbound.close();
        }
    }

    /// Simulate this endpoint's realm being destroyed.
    ///
    /// The peer observes a [`PortEvent::TransportFailure`]; the pair is
    /// then disentangled.
    pub fn sever(self, reason: &str) {
        if self.entangled.get() {
            self.outbound
                .push(PortEvent::TransportFailure(reason.to_string()));
        }
        self.disentangle();
    }
}
