use std::marker::PhantomData;

use herd_protocol::DataKind;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{encode, Collection};
use crate::client::Endpoint;
use crate::completion::Completion;
use crate::error::ClusterError;

/// A cluster-wide set.
#[derive(Debug)]
pub struct SharedSet<T> {
    inner: Collection,
    _types: PhantomData<fn() -> T>,
}

impl<T> Clone for SharedSet<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _types: PhantomData,
        }
    }
}

impl<T> SharedSet<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    pub(crate) fn new(endpoint: Endpoint, name: impl Into<String>) -> Self {
        Self {
            inner: Collection::new(endpoint, DataKind::Set, name),
            _types: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Resolves to false when `value` was already present.
    pub fn add(&self, value: &T) -> Completion<bool> {
        let env = encode(value).map(|v| self.inner.envelope("add").value(v));
        self.inner.mutate(env)
    }

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
