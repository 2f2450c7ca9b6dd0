//! Completions for requests whose outcome the caller may ignore.
//!
//! A [`Completion`] is returned by every mutating client call. The
//! request is already in flight when the call returns: awaiting the
//! completion observes the outcome, dropping it fires and forgets.
//!
//! [`CountingCompletion`] aggregates several of those outcomes for
//! group fan-out. It fires once every expected outcome has been
//! recorded, carrying the first failure seen, if any.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::ClusterError;

type Outcome<T> = Result<T, ClusterError>;

/// The eventual outcome of a request that is already running.
#[derive(Debug)]
pub struct Completion<T> {
    rx: oneshot::Receiver<Outcome<T>>,
}

impl<T: Send + 'static> Completion<T> {
    /// Runs `fut` on its own task. Must be called inside a tokio runtime.
    pub fn spawn<F>(fut: F) -> Self
    where
        F: Future<Output = Outcome<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            // the caller may have dropped the completion
            let _ = tx.send(fut.await);
        });
        Self { rx }
    }
}

impl<T> Completion<T> {
    /// A completion that is already resolved.
    pub fn ready(outcome: Outcome<T>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(outcome);
        Self { rx }
    }
}

impl<T> Future for Completion<T> {
    type Output = Outcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(ClusterError::Abandoned)))
    }
}

/// Counting barrier over a fixed number of outcomes.
#[derive(Debug, Clone)]
pub struct CountingCompletion {
    inner: Arc<Barrier>,
}

#[derive(Debug)]
struct Barrier {
    remaining: AtomicUsize,
    failure: Mutex<Option<ClusterError>>,
    done: Mutex<Option<oneshot::Sender<Outcome<()>>>>,
}

impl CountingCompletion {
    /// Expects `expected` outcomes. With zero expected the returned
    /// completion is already successful.
    pub fn new(expected: usize) -> (Self, Completion<()>) {
        let (tx, rx) = oneshot::channel();
        let done = if expected == 0 {
            let _ = tx.send(Ok(()));
            None
        } else {
            Some(tx)
        };
        let counter = Self {
            inner: Arc::new(Barrier {
                remaining: AtomicUsize::new(expected),
                failure: Mutex::new(None),
                done: Mutex::new(done),
            }),
        };
        (counter, Completion { rx })
    }

    /// Outcomes still outstanding.
    #[cfg(test)]
    pub fn remaining(&self) -> usize {
        self.inner.remaining.load(Ordering::Acquire)
    }

    /// Records one outcome. Outcomes past the expected count are ignored.
    pub fn record(&self, outcome: Outcome<()>) {
        if let Err(e) = outcome {
            let mut failure = self
                .inner
                .failure
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if failure.is_none() {
                *failure = Some(e);
            }
        }

        let previous =
            self.inner
                .remaining
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if previous == Ok(1) {
            self.fire();
        }
    }

    fn fire(&self) {
        let failure = self
            .inner
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let done = self
            .inner
            .done
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = done {
            let _ = tx.send(failure.map_or(Ok(()), Err));
        }
    }
}
