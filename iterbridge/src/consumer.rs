//! Consumer adapter: the remote handle that becomes the sequence's sole
//! consumer.
//!
//! Presents the canonical asynchronous iteration operations backed by the
//! channel. Every issued request pushes one pending slot; a reader task
//! matches inbound responses to slots strictly by FIFO position, which is
//! correct because both source adapters answer in arrival order — that
//! pairing is a protocol invariant, not a negotiated one.
//!
//! Once a terminal response (or a transport failure) has been observed,
//! the adapter is finished: every later operation resolves locally
//! without touching the channel, and slots still pending are drained with
//! a synthetic terminal step rather than left unresolved forever.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use serde_json::Value;

use crate::channel::{ChannelError, PortEndpoint, PortEvent};
use crate::codec::{JsonCodec, MessageCodec};
use crate::error::clone_failure;
use crate::promise::{SlotPromise, pending_slot};
use crate::task::spawn_task;
use crate::wire::{IterStep, Request, Response, StepResult};

struct ConsumerState {
    pending: VecDeque<SlotPromise>,
    finished: bool,
}

/// Remote handle for a bridged iterator.
///
/// Always asynchronous, whatever the source's classification: the channel
/// in between is.
pub struct RemoteIterator<C: MessageCodec = JsonCodec> {
    endpoint: Rc<PortEndpoint<C>>,
    state: Rc<RefCell<ConsumerState>>,
}

impl<C: MessageCodec> RemoteIterator<C> {
    /// Bind a consumer adapter to its endpoint and start the reader task.
    ///
    /// Must be called inside a `tokio::task::LocalSet`: the reader is
    /// spawned as a local task.
    pub fn attach(endpoint: PortEndpoint<C>) -> Self {
        let endpoint = Rc::new(endpoint);
        let state = Rc::new(RefCell::new(ConsumerState {
            pending: VecDeque::new(),
            finished: false,
        }));
        spawn_task(
            "iter-consumer",
            read_loop(Rc::clone(&endpoint), Rc::clone(&state)),
        );
        Self { endpoint, state }
    }

    /// Advance the remote iterator, optionally feeding it a value.
    ///
    /// After termination this resolves locally to `{value: Null,
    /// done: true}` and sends nothing.
    pub async fn next(&self, input: Option<Value>) -> StepResult {
        let future = {
            let mut state = self.state.borrow_mut();
            if state.finished {
                return Ok(IterStep::finished(Value::Null));
            }
            let (promise, future) = pending_slot();
            state.pending.push_back(promise);
            future
        };
        self.issue(&Request::Next { payload: input });
        future.await
    }

    /// Terminate the remote iterator early.
    ///
    /// Idempotent: once finished this resolves locally to `{value: input,
    /// done: true}` — the no-throw contract of scoped cleanup. Otherwise
    /// the adapter is marked finished immediately; no later request
    /// touches the channel while the return request is in flight.
    pub async fn finish(&self, input: Option<Value>) -> StepResult {
        let future = {
            let mut state = self.state.borrow_mut();
            if state.finished {
                return Ok(IterStep::finished(input.unwrap_or(Value::Null)));
            }
            state.finished = true;
            let (promise, future) = pending_slot();
            state.pending.push_back(promise);
            future
        };
        self.issue(&Request::Return { payload: input });
        future.await
    }

    /// Inject an error into the remote iterator.
    ///
    /// After termination this rejects locally with the given reason.
    pub async fn throw(&self, error: Value) -> StepResult {
        let future = {
            let mut state = self.state.borrow_mut();
            if state.finished {
                return Err(error);
            }
            let (promise, future) = pending_slot();
            state.pending.push_back(promise);
            future
        };
        self.issue(&Request::Throw { payload: error });
        future.await
    }

    /// Number of request records this adapter has sent.
    pub fn requests_sent(&self) -> u64 {
        self.endpoint.messages_sent()
    }

    /// Whether a terminal response has been observed.
    pub fn is_finished(&self) -> bool {
        self.state.borrow().finished
    }

    fn issue(&self, request: &Request) {
        match self.endpoint.send(request) {
            Ok(()) => {}
            Err(ChannelError::CloneFailed { message }) => {
                // The record never left this side, so the slot just
                // pushed has nothing to pair with; it is rejected here
                // and the pair torn down. Older slots keep their
                // in-flight responses: the reader still drains whatever
                // was queued before the close.
                tracing::warn!(message = %message, "request record not cloneable");
                let promise = {
                    let mut state = self.state.borrow_mut();
                    state.finished = true;
                    state.pending.pop_back()
                };
                if let Some(promise) = promise {
                    promise.reject(clone_failure(&message));
                }
                self.endpoint.disentangle();
            }
            // A severed pair is observed by the reader independently; the
            // slot drains there.
            Err(error @ ChannelError::Disentangled) => {
                tracing::debug!(%error, "request record not delivered");
            }
        }
    }
}

async fn read_loop<C: MessageCodec>(
    endpoint: Rc<PortEndpoint<C>>,
    state: Rc<RefCell<ConsumerState>>,
) {
    loop {
        match endpoint.recv().await {
            Some(PortEvent::Message(bytes)) => {
                let response = match endpoint.decode::<Response>(&bytes) {
                    Ok(response) => response,
                    Err(error) => {
                        tracing::warn!(%error, "undecodable response record");
                        fail_pending(&state, clone_failure(&error.to_string()));
                        endpoint.disentangle();
                        break;
                    }
                };
                match response {
                    Response::Result { payload } => {
                        let promise = take_oldest(&state);
                        let done = payload.done;
                        promise.resolve(payload);
                        if done {
                            drain(&state);
                        }
                    }
                    Response::Error { payload } => {
                        let promise = take_oldest(&state);
                        promise.reject(payload);
                        drain(&state);
                    }
                }
            }
            Some(PortEvent::TransportFailure(reason)) => {
                tracing::warn!(reason = %reason, "transport failure on consumer side");
                fail_pending(&state, clone_failure(&reason));
                endpoint.disentangle();
                break;
            }
            None => {
                drain(&state);
                break;
            }
        }
    }
}

/// Pop the slot the oldest outstanding request is waiting on.
///
/// A response with no pending slot is a conformance bug in the peer, not
/// a runtime condition; it fails loudly.
fn take_oldest(state: &Rc<RefCell<ConsumerState>>) -> SlotPromise {
    match state.borrow_mut().pending.pop_front() {
        Some(promise) => promise,
        None => panic!("protocol invariant breached: response record with no pending request"),
    }
}

/// Mark the adapter finished and resolve every remaining slot with a
/// synthetic terminal step.
fn drain(state: &Rc<RefCell<ConsumerState>>) {
    let mut state = state.borrow_mut();
    state.finished = true;
    while let Some(promise) = state.pending.pop_front() {
        promise.resolve(IterStep::finished(Value::Null));
    }
}

/// Reject the oldest slot with `error`, then drain the rest.
fn fail_pending(state: &Rc<RefCell<ConsumerState>>, error: Value) {
    {
        let mut state = state.borrow_mut();
        state.finished = true;
        if let Some(promise) = state.pending.pop_front() {
            promise.reject(error);
        }
    }
    drain(state);
}
