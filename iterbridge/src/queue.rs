//! Notified FIFO queue backing each endpoint's inbound event stream.
//!
//! Single-threaded, waker-based: `push` wakes every waiting consumer,
//! `recv()` suspends until an item or the close flag arrives. Items queued
//! before `close()` are still delivered; `recv()` only reports the end of
//! the stream once the queue is both closed and drained. That property is
//! what lets a terminal response cross the pair even though the sender
//! disentangles immediately after sending it.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

/// FIFO queue with async notification.
///
/// Uses `RefCell` for single-threaded runtimes; there is no `Mutex`
/// anywhere in the bridge.
pub struct NotifiedQueue<T> {
    inner: RefCell<Inner<T>>,
}

struct Inner<T> {
    queue: VecDeque<T>,
    wakers: Vec<Waker>,
    closed: bool,
}

impl<T> Default for NotifiedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> NotifiedQueue<T> {
    /// Create an empty, open queue.
    pub fn new() -> Self {
        Self {
            inner: RefCell::new(Inner {
                queue: VecDeque::new(),
                wakers: Vec::new(),
                closed: false,
            }),
        }
    }

    /// Append an item and wake all waiting consumers.
    ///
    /// Items pushed after `close()` are dropped: a closed queue never
    /// delivers again.
    pub fn push(&self, item: T) {
        let mut inner = self.inner.borrow_mut();
        if inner.closed {
            return;
        }
        inner.queue.push_back(item);
        for waker in inner.wakers.drain(..) {
            waker.wake();
        }
    }

    /// Take the front item without waiting.
    pub fn try_recv(&self) -> Option<T> {
        self.inner.borrow_mut().queue.pop_front()
    }

    /// Mark the queue closed and wake all waiters.
    ///
    /// Items already queued remain deliverable.
    pub fn close(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.closed = true;
        for waker in inner.wakers.drain(..) {
            waker.wake();
        }
    }

    /// Whether `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.borrow().closed
    }

    /// Number of items currently queued.
    pub fn len(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    /// Whether the queue holds no items.
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().queue.is_empty()
    }

    /// Wait for the next item.
    ///
    /// Resolves to `None` once the queue is closed and drained.
    pub fn recv(&self) -> RecvFuture<'_, T> {
        RecvFuture { queue: self }
    }
}

/// Future returned by [`NotifiedQueue::recv`].
pub struct RecvFuture<'a, T> {
    queue: &'a NotifiedQueue<T>,
}

impl<T> Future for RecvFuture<'_, T> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.queue.inner.borrow_mut();

        if let Some(item) = inner.queue.pop_front() {
            return Poll::Ready(Some(item));
        }
        if inner.closed {
            return Poll::Ready(None);
        }

        inner.wakers.push(cx.waker().clone());
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_ordering() {
        let queue = NotifiedQueue::new();
        queue.push(1);
        queue.push(2);
        queue.push(3);

        assert_eq!(queue.try_recv(), Some(1));
        assert_eq!(queue.try_recv(), Some(2));
        assert_eq!(queue.try_recv(), Some(3));
        assert_eq!(queue.try_recv(), None);
    }

    #[test]
    fn test_close_delivers_queued_items_first() {
        let queue = NotifiedQueue::new();
        queue.push("before close");
        queue.close();

        assert!(queue.is_closed());
        assert_eq!(queue.try_recv(), Some("before close"));
        assert_eq!(queue.try_recv(), None);
    }

    #[test]
    fn test_push_after_close_is_dropped() {
        let queue = NotifiedQueue::new();
        queue.close();
        queue.push(42);

        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_recv_immediate() {
        let queue = NotifiedQueue::new();
        queue.push("hello".to_string());

        assert_eq!(queue.recv().await, Some("hello".to_string()));
    }

    #[tokio::test]
    async fn test_recv_closed_and_drained_returns_none() {
        let queue = NotifiedQueue::new();
        queue.push(1);
        queue.close();

        assert_eq!(queue.recv().await, Some(1));
        assert_eq!(queue.recv().await, None);
    }

    #[tokio::test]
    async fn test_recv_wakes_on_push() {
        use std::rc::Rc;

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let queue = Rc::new(NotifiedQueue::new());
                let reader = {
                    let queue = Rc::clone(&queue);
                    tokio::task::spawn_local(async move { queue.recv().await })
                };

                tokio::task::yield_now().await;
                queue.push(99);

                assert_eq!(reader.await.expect("reader task"), Some(99));
            })
            .await;
    }
}
