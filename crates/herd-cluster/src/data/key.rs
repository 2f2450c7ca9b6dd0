use std::marker::PhantomData;

use herd_protocol::DataKind;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{encode, Collection};
use crate::client::Endpoint;
use crate::completion::Completion;
use crate::error::ClusterError;

/// A single named value shared across the cluster.
#[derive(Debug)]
pub struct SharedKey<T> {
    inner: Collection,
    _types: PhantomData<fn() -> T>,
}

impl<T> Clone for SharedKey<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _types: PhantomData,
        }
    }
}

impl<T> SharedKey<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    pub(crate) fn new(endpoint: Endpoint, name: impl Into<String>) -> Self {
        Self {
            inner: Collection::new(endpoint, DataKind::Key, name),
            _types: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn get(&self) -> Result<Option<T>, ClusterError> {
        self.inner.query(self.inner.envelope("get")).await
    }

    pub fn set(&self, value: &T) -> Completion<()> {
        let env = encode(value).map(|v| self.inner.envelope("set").value(v));
        self.inner.mutate_unit(env)
    }

    pub fn delete(&self) -> Completion<()> {
        self.inner.mutate_unit(Ok(self.inner.envelope("delete")))
    }
}
