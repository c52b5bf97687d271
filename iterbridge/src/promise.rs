//! Pending slots: one outstanding consumer-side request awaiting its
//! response.
//!
//! [`pending_slot`] returns a promise/future pair. The consumer adapter
//! keeps promises in a FIFO queue and fulfills the oldest one for every
//! inbound response; the caller that issued the request awaits the future.
//! Fulfillment consumes the promise, so a slot resolves exactly once.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use serde_json::Value;

use crate::wire::{IterStep, StepResult};

struct SlotState {
    outcome: Option<StepResult>,
    waker: Option<Waker>,
}

/// Fulfillment side of a pending slot.
///
/// Held by the consumer adapter until the matching response arrives or the
/// exchange terminates.
pub struct SlotPromise {
    state: Rc<RefCell<SlotState>>,
}

/// Awaited side of a pending slot.
///
/// Resolves to the step produced by the remote operation, or to the error
/// value it raised.
pub struct SlotFuture {
    state: Rc<RefCell<SlotState>>,
}

/// Create an unfulfilled slot.
pub fn pending_slot() -> (SlotPromise, SlotFuture) {
    let state = Rc::new(RefCell::new(SlotState {
        outcome: None,
        waker: None,
    }));
    (
        SlotPromise {
            state: Rc::clone(&state),
        },
        SlotFuture { state },
    )
}

impl SlotPromise {
    /// Fulfill the slot with a successful step.
    pub fn resolve(self, step: IterStep) {
        self.fulfill(Ok(step));
    }

    /// Fulfill the slot with an error value.
    pub fn reject(self, error: Value) {
        self.fulfill(Err(error));
    }

    fn fulfill(self, outcome: StepResult) {
        let mut state = self.state.borrow_mut();
        if state.outcome.is_none() {
            state.outcome = Some(outcome);
            if let Some(waker) = state.waker.take() {
                waker.wake();
            }
        }
    }
}

impl Future for SlotFuture {
    type Output = StepResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.state.borrow_mut();
        if let Some(outcome) = state.outcome.take() {
            return Poll::Ready(outcome);
        }
        state.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_resolve_before_await() {
        let (promise, future) = pending_slot();
        promise.resolve(IterStep::yielded(json!(1)));

        assert_eq!(future.await, Ok(IterStep::yielded(json!(1))));
    }

    #[tokio::test]
    async fn test_reject_carries_error_value() {
        let (promise, future) = pending_slot();
        promise.reject(json!("boom"));

        assert_eq!(future.await, Err(json!("boom")));
    }

    #[tokio::test]
    async fn test_resolve_after_await_started() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let (promise, future) = pending_slot();
                let waiter = tokio::task::spawn_local(future);

                tokio::task::yield_now().await;
                promise.resolve(IterStep::finished(Value::Null));

                assert_eq!(
                    waiter.await.expect("waiter task"),
                    Ok(IterStep::finished(Value::Null))
                );
            })
            .await;
    }
}
