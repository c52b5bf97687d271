//! Local task spawning for adapter loops.
//!
//! Adapters run on the current thread; `spawn_local` keeps the
//! single-threaded execution guarantees the `Rc`/`RefCell` state relies
//! on. Callers must therefore be inside a `tokio::task::LocalSet`.

use std::future::Future;

pub(crate) fn spawn_task<F>(name: &'static str, future: F) -> tokio::task::JoinHandle<()>
where
    F: Future<Output = ()> + 'static,
{
    tokio::task::spawn_local(async move {
        tracing::debug!(task = name, "adapter task started");
        future.await;
        tracing::debug!(task = name, "adapter task finished");
    })
}
