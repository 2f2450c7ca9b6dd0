use std::marker::PhantomData;

use herd_protocol::DataKind;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{encode, Collection};
use crate::client::Endpoint;
use crate::completion::Completion;
use crate::error::ClusterError;

/// A cluster-wide FIFO queue.
#[derive(Debug)]
pub struct SharedQueue<T> {
    inner: Collection,
    _types: PhantomData<fn() -> T>,
}

impl<T> Clone for SharedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _types: PhantomData,
        }
    }
}

impl<T> SharedQueue<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    pub(crate) fn new(endpoint: Endpoint, name: impl Into<String>) -> Self {
        Self {
            inner: Collection::new(endpoint, DataKind::Queue, name),
            _types: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Appends `value` at the tail.
    pub fn add(&self, value: &T) -> Completion<bool> {
        let env = encode(value).map(|v| self.inner.envelope("add").value(v));
        self.inner.mutate(env)
    }

    /// Same as [`add`](Self::add); the queue is unbounded.
    pub fn offer(&self, value: &T) -> Completion<bool> {
        let env = encode(value).map(|v| self.inner.envelope("offer").value(v));
        self.inner.mutate(env)
    }

    /// Removes the first element equal to `value`.
    pub fn remove(&self, value: &T) -> Completion<bool> {
        let env = encode(value).map(|v| self.inner.envelope("remove").value(v));
        self.inner.mutate(env)
    }

    /// Removes and returns the head. Fails with `No such element.` when
    /// the queue is empty.
    pub fn remove_head(&self) -> Completion<T> {
        self.inner.mutate(Ok(self.inner.envelope("remove")))
    }

    /// Removes and returns the head, `None` when empty.
    pub fn poll(&self) -> Completion<Option<T>> {
        self.inner.mutate(Ok(self.inner.envelope("poll")))
    }

    /// The head without removing it. Fails when the queue is empty.
    pub async fn element(&self) -> Result<T, ClusterError> {
        self.inner.query(self.inner.envelope("element")).await
    }

    /// The head without removing it, `None` when empty.
    pub async fn peek(&self) -> Result<Option<T>, ClusterError> {
        self.inner.query(self.inner.envelope("peek")).await
    }

    pub async fn contains(&self, value: &T) -> Result<bool, ClusterError> {
        let env = self.inner.envelope("contains").value(encode(value)?);
        self.inner.query(env).await
    }

    pub async fn is_empty(&self) -> Result<bool, ClusterError> {
        self.inner.is_empty().await
    }

    pub async fn size(&self) -> Result<usize, ClusterError> {
        self.inner.size().await
    }

    pub fn clear(&self) -> Completion<()> {
        self.inner.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::testing::coordinator;

    #[tokio::test]
    async fn fifo_order() {
        let (_c, ep) = coordinator().await;
        let q: SharedQueue<String> = SharedQueue::new(ep, "q");
        q.add(&"a".into()).await.unwrap();
        q.offer(&"b".into()).await.unwrap();

        assert_eq!(q.peek().await.unwrap().as_deref(), Some("a"));
        assert_eq!(q.poll().await.unwrap().as_deref(), Some("a"));
        assert_eq!(q.poll().await.unwrap().as_deref(), Some("b"));
        assert_eq!(q.poll().await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_queue_failures() {
        let (_c, ep) = coordinator().await;
        let q: SharedQueue<u32> = SharedQueue::new(ep, "q");
        assert_eq!(q.peek().await.unwrap(), None);
        let err = q.element().await.unwrap_err();
        assert_eq!(err.remote_message(), Some("No such element."));
        let err = q.remove_head().await.unwrap_err();
        assert_eq!(err.remote_message(), Some("No such element."));
    }

    #[tokio::test]
    async fn remove_specific_value() {
        let (_c, ep) = coordinator().await;
        let q: SharedQueue<u32> = SharedQueue::new(ep, "q");
        for v in [1, 2, 3] {
            q.add(&v).await.unwrap();
        }
        assert!(q.remove(&2).await.unwrap());
        assert!(!q.contains(&2).await.unwrap());
        assert_eq!(q.remove_head().await.unwrap(), 1);
        assert_eq!(q.element().await.unwrap(), 3);
        assert_eq!(q.size().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn removing_none_leaves_head_alone() {
        let (_c, ep) = coordinator().await;
        let q: SharedQueue<Option<u32>> = SharedQueue::new(ep, "q");
        q.add(&Some(1)).await.unwrap();
        q.add(&Some(2)).await.unwrap();

        assert!(!q.remove(&None).await.unwrap());
        assert_eq!(q.size().await.unwrap(), 2);
        assert_eq!(q.remove_head().await.unwrap(), Some(1));
    }
}
