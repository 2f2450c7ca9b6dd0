use std::marker::PhantomData;

use herd_protocol::DataKind;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{encode, Collection};
use crate::client::Endpoint;
use crate::completion::Completion;
use crate::error::ClusterError;

/// A cluster-wide list.
#[derive(Debug)]
pub struct SharedList<T> {
    inner: Collection,
    _types: PhantomData<fn() -> T>,
}

impl<T> Clone for SharedList<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _types: PhantomData,
        }
    }
}

impl<T> SharedList<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    pub(crate) fn new(endpoint: Endpoint, name: impl Into<String>) -> Self {
        Self {
            inner: Collection::new(endpoint, DataKind::List, name),
            _types: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Appends `value`.
    pub fn add(&self, value: &T) -> Completion<bool> {
        let env = encode(value).map(|v| self.inner.envelope("add").value(v));
        self.inner.mutate(env)
    }

    /// The element at `index`. Fails with `Index out of bounds` past the end.
    pub async fn get(&self, index: i64) -> Result<T, ClusterError> {
        self.inner
            .query(self.inner.envelope("get").index(index))
            .await
    }

    /// Removes the element at `index`, resolving to it.
    pub fn remove_at(&self, index: i64) -> Completion<T> {
        self.inner
            .mutate(Ok(self.inner.envelope("remove").index(index)))
    }

    /// Removes the first element equal to `value`.
    pub fn remove(&self, value: &T) -> Completion<bool> {
        let env = encode(value).map(|v| self.inner.envelope("remove").value(v));
        self.inner.mutate(env)
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
