use std::marker::PhantomData;

use herd_protocol::DataKind;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::{decode_all, encode, Collection};
use crate::client::Endpoint;
use crate::completion::Completion;
use crate::error::ClusterError;

/// A cluster-wide map.
#[derive(Debug)]
pub struct SharedMap<K, V> {
    inner: Collection,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V> Clone for SharedMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _types: PhantomData,
        }
    }
}

impl<K, V> SharedMap<K, V>
where
    K: Serialize + DeserializeOwned + Send + 'static,
    V: Serialize + DeserializeOwned + Send + 'static,
{
    pub(crate) fn new(endpoint: Endpoint, name: impl Into<String>) -> Self {
        Self {
            inner: Collection::new(endpoint, DataKind::Map, name),
            _types: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Stores `value` under `key`, resolving to the value it replaced.
    pub fn put(&self, key: &K, value: &V) -> Completion<Option<V>> {
        let env = encode(key).and_then(|k| {
            Ok(self.inner.envelope("put").key(k).value(encode(value)?))
        });
        self.inner.mutate(env)
    }

    pub async fn get(&self, key: &K) -> Result<Option<V>, ClusterError> {
        let env = self.inner.envelope("get").key(encode(key)?);
        self.inner.query(env).await
    }

    /// Removes `key`, resolving to the value it held.
    pub fn remove(&self, key: &K) -> Completion<Option<V>> {
        let env = encode(key).map(|k| self.inner.envelope("remove").key(k));
        self.inner.mutate(env)
    }

    pub async fn contains_key(&self, key: &K) -> Result<bool, ClusterError> {
        let env = self.inner.envelope("contains").key(encode(key)?);
        self.inner.query(env).await
    }

    pub async fn keys(&self) -> Result<Vec<K>, ClusterError> {
        let keys: Option<Vec<Value>> = self.inner.query(self.inner.envelope("keys")).await?;
        decode_all(keys)
    }

    pub async fn values(&self) -> Result<Vec<V>, ClusterError> {
        let values: Option<Vec<Value>> = self.inner.query(self.inner.envelope("values")).await?;
        decode_all(values)
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
