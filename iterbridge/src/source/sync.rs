//! Synchronous source adapter.
//!
//! Bridges a handle whose operations complete without suspending. No
//! request queue is needed beyond the endpoint's inbound stream: the
//! handler itself fully serializes dispatch, nothing can overlap.

use serde_json::Value;

use crate::channel::{PortEndpoint, PortEvent};
use crate::codec::MessageCodec;
use crate::error::clone_failure;
use crate::resolve::SyncIterHandle;
use crate::task::spawn_task;
use crate::wire::{IterStep, Request, Response};

use super::{Disposition, deliver, release_sync};

/// Bind a synchronous handle to its endpoint and start the adapter task.
pub fn spawn<C: MessageCodec>(
    handle: Box<dyn SyncIterHandle>,
    endpoint: PortEndpoint<C>,
) -> tokio::task::JoinHandle<()> {
    spawn_task("iter-source-sync", run(handle, endpoint))
}

async fn run<C: MessageCodec>(mut handle: Box<dyn SyncIterHandle>, endpoint: PortEndpoint<C>) {
    loop {
        match endpoint.recv().await {
            Some(PortEvent::Message(bytes)) => {
                let request = match endpoint.decode::<Request>(&bytes) {
                    Ok(request) => request,
                    Err(error) => {
                        tracing::warn!(%error, "undecodable request record");
                        release_sync(handle.as_mut());
                        endpoint.disentangle();
                        break;
                    }
                };
                if let Disposition::Finished = process(handle.as_mut(), &endpoint, request) {
                    break;
                }
            }
            Some(PortEvent::TransportFailure(reason)) => {
                // Synthesized locally; the channel is presumed gone, so
                // nothing is sent.
                let error = clone_failure(&reason);
                tracing::warn!(%error, "transport failure on source side");
                release_sync(handle.as_mut());
                endpoint.disentangle();
                break;
            }
            None => break,
        }
    }
}

fn process<C: MessageCodec>(
    handle: &mut dyn SyncIterHandle,
    endpoint: &PortEndpoint<C>,
    request: Request,
) -> Disposition {
    match request {
        Request::Next { payload } => match handle.next(payload) {
            Err(error) => {
                deliver(endpoint, &Response::Error { payload: error });
                endpoint.disentangle();
                Disposition::Finished
            }
            Ok(step) if step.done => {
                deliver(endpoint, &Response::Result { payload: step });
                release_sync(handle);
                endpoint.disentangle();
                Disposition::Finished
            }
            Ok(step) => {
                if deliver(endpoint, &Response::Result { payload: step }) {
                    Disposition::Continue
                } else {
                    release_sync(handle);
                    endpoint.disentangle();
                    Disposition::Finished
                }
            }
        },

        // A return request always ends the exchange, whatever the
        // handle's early-terminate reports.
        Request::Return { payload } => {
            let response = if handle.has_return() {
                match handle.ret(payload) {
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
            match handle.throw(payload) {
                Err(error) => {
                    deliver(endpoint, &Response::Error { payload: error });
                    endpoint.disentangle();
                    Disposition::Finished
                }
                Ok(step) if step.done => {
                    deliver(endpoint, &Response::Result { payload: step });
                    release_sync(handle);
                    endpoint.disentangle();
                    Disposition::Finished
                }
                // The handle caught the injected error and kept
                // producing.
                Ok(step) => {
                    if deliver(endpoint, &Response::Result { payload: step }) {
                        Disposition::Continue
                    } else {
                        release_sync(handle);
                        endpoint.disentangle();
                        Disposition::Finished
                    }
                }
            }
        }
    }
}
