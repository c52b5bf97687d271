//! End-to-end tests for the iterator transfer bridge.
//!
//! These exercise the full flow: capability resolution, source adapter
//! bound to one endpoint of a fresh pair, consumer adapter on the other,
//! and every terminal path (completion, early termination, error
//! injection, transport failure).

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use iterbridge::{
    AsyncIterHandle, Candidate, IterStep, MAX_CLONE_SIZE, RemoteIterator, ResolveError,
    StepResult, SyncIterHandle, entangled_pair, transfer_in, transfer_out,
};
use serde_json::{Value, json};

fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// Synchronous handle driven by a pre-recorded script of step outcomes.
struct Scripted {
    steps: VecDeque<StepResult>,
    ret_outcome: Option<StepResult>,
    ret_calls: Rc<RefCell<Vec<Option<Value>>>>,
    throw_outcomes: Option<VecDeque<StepResult>>,
}

impl Scripted {
    fn new(steps: Vec<StepResult>) -> Self {
        Self {
            steps: steps.into(),
            ret_outcome: None,
            ret_calls: Rc::new(RefCell::new(Vec::new())),
            throw_outcomes: None,
        }
    }

    fn with_return(mut self, outcome: StepResult) -> Self {
        self.ret_outcome = Some(outcome);
        self
    }

    fn with_throw(mut self, outcomes: Vec<StepResult>) -> Self {
        self.throw_outcomes = Some(outcomes.into());
        self
    }

    fn ret_recorder(&self) -> Rc<RefCell<Vec<Option<Value>>>> {
        Rc::clone(&self.ret_calls)
    }
}

impl SyncIterHandle for Scripted {
    fn next(&mut self, _input: Option<Value>) -> StepResult {
        self.steps
            .pop_front()
            .unwrap_or(Ok(IterStep::finished(Value::Null)))
    }

    fn has_return(&self) -> bool {
        self.ret_outcome.is_some()
    }

    fn ret(&mut self, input: Option<Value>) -> StepResult {
        self.ret_calls.borrow_mut().push(input);
        self.ret_outcome
            .clone()
            .unwrap_or(Ok(IterStep::finished(Value::Null)))
    }

    fn has_throw(&self) -> bool {
        self.throw_outcomes.is_some()
    }

    fn throw(&mut self, error: Value) -> StepResult {
        match &mut self.throw_outcomes {
            Some(outcomes) => outcomes.pop_front().unwrap_or(Err(error)),
            None => Err(error),
        }
    }
}

/// Asynchronous handle whose steps take a scripted amount of wall time.
struct SlowScripted {
    steps: VecDeque<(u64, StepResult)>,
}

impl SlowScripted {
    fn new(steps: Vec<(u64, StepResult)>) -> Self {
        Self {
            steps: steps.into(),
        }
    }
}

#[async_trait(?Send)]
impl AsyncIterHandle for SlowScripted {
    async fn next(&mut self, _input: Option<Value>) -> StepResult {
        match self.steps.pop_front() {
            Some((delay_ms, outcome)) => {
                if delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                outcome
            }
            None => Ok(IterStep::finished(Value::Null)),
        }
    }
}

/// Duck-typed counter: only an advance operation, no declared capability.
struct DuckCounter {
    at: u64,
    limit: u64,
}

#[async_trait(?Send)]
impl AsyncIterHandle for DuckCounter {
    async fn next(&mut self, _input: Option<Value>) -> StepResult {
        if self.at < self.limit {
            self.at += 1;
            Ok(IterStep::yielded(json!(self.at)))
        } else {
            Ok(IterStep::finished(Value::Null))
        }
    }
}

fn bridge(candidate: Candidate) -> RemoteIterator {
    init_tracing();
    transfer_in(transfer_out(candidate).expect("candidate must resolve"))
}

#[tokio::test]
async fn scenario_a_sequential_completion() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let remote = bridge(Candidate::native_sync(Box::new(Scripted::new(vec![
                Ok(IterStep::yielded(json!(1))),
                Ok(IterStep::yielded(json!(2))),
                Ok(IterStep::finished(json!(3))),
            ]))));

            assert_eq!(remote.next(None).await, Ok(IterStep::yielded(json!(1))));
            assert_eq!(remote.next(None).await, Ok(IterStep::yielded(json!(2))));
            assert_eq!(remote.next(None).await, Ok(IterStep::finished(json!(3))));

            let sent_after_terminal = remote.requests_sent();
            assert_eq!(
                remote.next(None).await,
                Ok(IterStep::finished(Value::Null))
            );
            assert_eq!(remote.requests_sent(), sent_after_terminal);
        })
        .await;
}

#[tokio::test]
async fn scenario_b_fifo_under_burst_with_variable_delays() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let remote = bridge(Candidate::native_async(Box::new(SlowScripted::new(vec![
                (30, Ok(IterStep::yielded(json!(1)))),
                (10, Ok(IterStep::yielded(json!(2)))),
                (1, Ok(IterStep::yielded(json!(3)))),
            ]))));

            // Three requests issued without awaiting intermediate results.
            let (first, second, third) =
                tokio::join!(remote.next(None), remote.next(None), remote.next(None));

            assert_eq!(first, Ok(IterStep::yielded(json!(1))));
            assert_eq!(second, Ok(IterStep::yielded(json!(2))));
            assert_eq!(third, Ok(IterStep::yielded(json!(3))));
        })
        .await;
}

#[tokio::test]
async fn fifo_burst_against_sync_source() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let remote = bridge(Candidate::native_sync(Box::new(Scripted::new(vec![
                Ok(IterStep::yielded(json!("a"))),
                Ok(IterStep::yielded(json!("b"))),
                Ok(IterStep::finished(Value::Null)),
            ]))));

            let (first, second, third) =
                tokio::join!(remote.next(None), remote.next(None), remote.next(None));

            assert_eq!(first, Ok(IterStep::yielded(json!("a"))));
            assert_eq!(second, Ok(IterStep::yielded(json!("b"))));
            assert_eq!(third, Ok(IterStep::finished(Value::Null)));
        })
        .await;
}

#[tokio::test]
async fn scenario_c_early_terminate_mid_sequence() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let handle = Scripted::new(vec![
                Ok(IterStep::yielded(json!(1))),
                Ok(IterStep::yielded(json!(2))),
            ])
            .with_return(Ok(IterStep::finished(json!("x-done"))));
            let ret_calls = handle.ret_recorder();

            let remote = bridge(Candidate::native_sync(Box::new(handle)));

            assert_eq!(remote.next(None).await, Ok(IterStep::yielded(json!(1))));
            assert_eq!(
                remote.finish(Some(json!("x"))).await,
                Ok(IterStep::finished(json!("x-done")))
            );
            assert_eq!(*ret_calls.borrow(), vec![Some(json!("x"))]);

            let sent_after_terminal = remote.requests_sent();
            assert_eq!(
                remote.next(None).await,
                Ok(IterStep::finished(Value::Null))
            );
            assert_eq!(remote.requests_sent(), sent_after_terminal);
        })
        .await;
}

#[tokio::test]
async fn scenario_d_duck_typed_value_bridges_like_native() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let remote = bridge(Candidate::duck_typed(Box::new(DuckCounter {
                at: 0,
                limit: 2,
            })));

            assert_eq!(remote.next(None).await, Ok(IterStep::yielded(json!(1))));
            assert_eq!(remote.next(None).await, Ok(IterStep::yielded(json!(2))));
            assert_eq!(
                remote.next(None).await,
                Ok(IterStep::finished(Value::Null))
            );
        })
        .await;
}

#[tokio::test]
async fn scenario_e_rejection_terminates_and_never_rejects_again() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let remote = bridge(Candidate::native_async(Box::new(SlowScripted::new(vec![
                (0, Ok(IterStep::yielded(json!(1)))),
                (0, Err(json!("boom"))),
            ]))));

            assert_eq!(remote.next(None).await, Ok(IterStep::yielded(json!(1))));
            assert_eq!(remote.next(None).await, Err(json!("boom")));

            let sent_after_terminal = remote.requests_sent();
            assert_eq!(
                remote.next(None).await,
                Ok(IterStep::finished(Value::Null))
            );
            assert_eq!(remote.requests_sent(), sent_after_terminal);
            assert!(remote.is_finished());
        })
        .await;
}

#[tokio::test]
async fn terminal_idempotence_of_all_three_operations() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let remote = bridge(Candidate::native_sync(Box::new(Scripted::new(vec![Ok(
                IterStep::finished(Value::Null),
            )]))));

            assert_eq!(
                remote.next(None).await,
                Ok(IterStep::finished(Value::Null))
            );
            let sent = remote.requests_sent();

            assert_eq!(
                remote.next(None).await,
                Ok(IterStep::finished(Value::Null))
            );
            assert_eq!(
                remote.finish(Some(json!("v"))).await,
                Ok(IterStep::finished(json!("v")))
            );
            assert_eq!(remote.throw(json!("reason")).await, Err(json!("reason")));
            assert_eq!(remote.requests_sent(), sent);
        })
        .await;
}

#[tokio::test]
async fn cleanup_failure_never_replaces_reported_result() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let handle = Scripted::new(vec![Ok(IterStep::finished(json!(3)))])
                .with_return(Err(json!("cleanup boom")));
            let ret_calls = handle.ret_recorder();

            let remote = bridge(Candidate::native_sync(Box::new(handle)));

            // The terminal result crosses untouched even though the
            // fire-and-forget early-terminate fails afterwards.
            assert_eq!(remote.next(None).await, Ok(IterStep::finished(json!(3))));
            assert_eq!(ret_calls.borrow().len(), 1);
        })
        .await;
}

#[tokio::test]
async fn return_synthesized_when_capability_missing() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let remote = bridge(Candidate::native_sync(Box::new(Scripted::new(vec![Ok(
                IterStep::yielded(json!(1)),
            )]))));

            assert_eq!(
                remote.finish(Some(json!("v"))).await,
                Ok(IterStep::finished(json!("v")))
            );
            assert!(remote.is_finished());
        })
        .await;
}

#[tokio::test]
async fn throw_without_capability_reflects_error_and_terminates() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let remote = bridge(Candidate::native_sync(Box::new(Scripted::new(vec![
                Ok(IterStep::yielded(json!(1))),
                Ok(IterStep::yielded(json!(2))),
            ]))));

            assert_eq!(remote.next(None).await, Ok(IterStep::yielded(json!(1))));
            assert_eq!(remote.throw(json!("oops")).await, Err(json!("oops")));
            assert!(remote.is_finished());
        })
        .await;
}

#[tokio::test]
async fn caught_throw_keeps_pair_entangled() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let handle = Scripted::new(vec![
                Ok(IterStep::yielded(json!(1))),
                Ok(IterStep::yielded(json!(2))),
            ])
            .with_throw(vec![Ok(IterStep::yielded(json!("recovered")))]);

            let remote = bridge(Candidate::native_sync(Box::new(handle)));

            assert_eq!(remote.next(None).await, Ok(IterStep::yielded(json!(1))));
            assert_eq!(
                remote.throw(json!("injected")).await,
                Ok(IterStep::yielded(json!("recovered")))
            );
            // The handle caught the injected error; the exchange goes on.
            assert_eq!(remote.next(None).await, Ok(IterStep::yielded(json!(2))));
            assert!(!remote.is_finished());
        })
        .await;
}

#[tokio::test]
async fn unclonable_result_surfaces_transport_failure() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let huge = "x".repeat(MAX_CLONE_SIZE + 1);
            let remote = bridge(Candidate::native_async(Box::new(SlowScripted::new(vec![
                (0, Ok(IterStep::yielded(json!(huge)))),
            ]))));

            let err = remote.next(None).await.expect_err("clone must fail");
            assert_eq!(err["name"], "DataCloneError");

            assert_eq!(
                remote.next(None).await,
                Ok(IterStep::finished(Value::Null))
            );
        })
        .await;
}

#[tokio::test]
async fn unclonable_request_rejects_its_own_slot() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let remote = bridge(Candidate::native_sync(Box::new(Scripted::new(vec![
                Ok(IterStep::yielded(json!(1))),
            ]))));

            let huge = "x".repeat(MAX_CLONE_SIZE + 1);
            let err = remote
                .next(Some(json!(huge)))
                .await
                .expect_err("unclonable request must reject");
            assert_eq!(err["name"], "DataCloneError");
            assert!(remote.is_finished());

            assert_eq!(
                remote.next(None).await,
                Ok(IterStep::finished(Value::Null))
            );
        })
        .await;
}

#[tokio::test]
async fn severed_peer_rejects_outstanding_request() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            init_tracing();
            let (source_end, consumer_end) = entangled_pair();
            let remote = RemoteIterator::attach(consumer_end);

            let pending = remote.next(None);
            source_end.sever("realm destroyed");

            let err = pending.await.expect_err("must reject");
            assert_eq!(err["name"], "DataCloneError");
            assert_eq!(err["message"], "realm destroyed");

            assert_eq!(
                remote.next(None).await,
                Ok(IterStep::finished(Value::Null))
            );
        })
        .await;
}

#[test]
fn transfer_of_non_iterable_fails_before_any_channel_exists() {
    assert!(matches!(
        transfer_out(Candidate::new()),
        Err(ResolveError::NotIterable)
    ));
}
