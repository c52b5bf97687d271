//! Queued (asynchronous) source adapter.
//!
//! Same protocol contract as the synchronous adapter, but the handle's
//! operations are awaitable, and consumers may issue several requests
//! without awaiting intermediate results. The endpoint's inbound queue
//! absorbs that burst; the loop awaits each operation before popping the
//! next record, so wall-clock completion order matches arrival order even
//! with many requests outstanding on the consumer side. Most iterator
//! implementations assume one in-flight call at a time, and this
//! preserves that.
//!
//! When a terminal response sets the exchange finished, records still
//! queued are dropped unanswered — the consumer's drain-on-termination
//! resolves them locally, so no cross-side coordination is needed.

use serde_json::Value;

use crate::channel::{PortEndpoint, PortEvent};
use crate::codec::MessageCodec;
use crate::error::clone_failure;
use crate::resolve::AsyncIterHandle;
use crate::task::spawn_task;
use crate::wire::{IterStep, Request, Response};

use super::{Disposition, deliver, release_async};

/// Bind an asynchronous handle to its endpoint and start the adapter task.
pub fn spawn<C: MessageCodec>(
    handle: Box<dyn AsyncIterHandle>,
    endpoint: PortEndpoint<C>,
) -> tokio::task::JoinHandle<()> {
    spawn_task("iter-source-queued", run(handle, endpoint))
}

async fn run<C: MessageCodec>(mut handle: Box<dyn AsyncIterHandle>, endpoint: PortEndpoint<C>) {
    loop {
        match endpoint.recv().await {
            Some(PortEvent::Message(bytes)) => {
                let request = match endpoint.decode::<Request>(&bytes) {
                    Ok(request) => request,
                    Err(error) => {
                        tracing::warn!(%error, "undecodable request record");
                        release_async(handle.as_mut()).await;
                        endpoint.disentangle();
                        break;
                    }
                };
                if let Disposition::Finished = process(handle.as_mut(), &endpoint, request).await {
                    break;
                }
            }
            Some(PortEvent::TransportFailure(reason)) => {
                let error = clone_failure(&reason);
                tracing::warn!(%error, "transport failure on source side");
                release_async(handle.as_mut()).await;
                endpoint.disentangle();
                break;
            }
            None => break,
        }
    }
}

async fn process<C: MessageCodec>(
    handle: &mut dyn AsyncIterHandle,
    endpoint: &PortEndpoint<C>,
    request: Request,
) -> Disposition {
    match request {
        Request::Next { payload } => match handle.next(payload).await {
            Err(error) => {
                deliver(endpoint, &Response::Error { payload: error });
                endpoint.disentangle();
                Disposition::Finished
            }
            Ok(step) if step.done => {
                deliver(endpoint, &Response::Result { payload: step });
                release_async(handle).await;
                endpoint.disentangle();
                Disposition::Finished
            }
            Ok(step) => {
                if deliver(endpoint, &Response::Result { payload: step }) {
                    Disposition::Continue
                } else {
                    release_async(handle).await;
                    endpoint.disentangle();
                    Disposition::Finished
                }
            }
        },

        Request::Return { payload } => {
            let response = if handle.has_return() {
                match handle.ret(payload).await {
                    Ok(step) => Response::Result { payload: step },
                    Err(error) => Response::Error { payload: error },
                }
            } else {
                Response::Result {
                    payload: IterStep::finished(payload.unwrap_or(Value::Null)),
                }
            };
            deliver(endpoint, &response);
            endpoint.disentangle();
            Disposition::Finished
        }

        Request::Throw { payload } => {
            if !handle.has_throw() {
                deliver(endpoint, &Response::Error { payload });
                endpoint.disentangle();
                return Disposition::Finished;
            }
            match handle.throw(payload).await {
                Err(error) => {
                    deliver(endpoint, &Response::Error { payload: error });
                    endpoint.disentangle();
                    Disposition::Finished
                }
                Ok(step) if step.done => {
                    deliver(endpoint, &Response::Result { payload: step });
                    release_async(handle).await;
                    endpoint.disentangle();
                    Disposition::Finished
                }
                Ok(step) => {
                    if deliver(endpoint, &Response::Result { payload: step }) {
                        Disposition::Continue
                    } else {
                        release_async(handle).await;
                        endpoint.disentangle();
                        Disposition::Finished
                    }
                }
            }
        }
    }
}
