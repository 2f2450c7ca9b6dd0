use std::marker::PhantomData;

use herd_protocol::{DataKind, Envelope};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::{decode_all, encode, Collection};
use crate::client::Endpoint;
use crate::completion::Completion;
use crate::error::ClusterError;

/// A cluster-wide multimap. Each key holds a set of values; `size`
/// counts key/value associations.
#[derive(Debug)]
pub struct SharedMultiMap<K, V> {
    inner: Collection,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V> Clone for SharedMultiMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _types: PhantomData,
        }
    }
}

impl<K, V> SharedMultiMap<K, V>
where
    K: Serialize + DeserializeOwned + Send + 'static,
    V: Serialize + DeserializeOwned + Send + 'static,
{
    pub(crate) fn new(endpoint: Endpoint, name: impl Into<String>) -> Self {
        Self {
            inner: Collection::new(endpoint, DataKind::MultiMap, name),
            _types: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Adds an association, resolving to false if it already existed.
    pub fn put(&self, key: &K, value: &V) -> Completion<bool> {
        self.inner.mutate(self.entry("put", key, value))
    }

    pub async fn get(&self, key: &K) -> Result<Vec<V>, ClusterError> {
        let env = self.inner.envelope("get").key(encode(key)?);
        let values: Option<Vec<Value>> = self.inner.query(env).await?;
        decode_all(values)
    }

    /// Removes one association, resolving to whether it existed.
    pub fn remove(&self, key: &K, value: &V) -> Completion<bool> {
        self.inner.mutate(self.entry("remove", key, value))
    }

    /// Removes every value under `key`, resolving to the removed values.
    pub fn remove_all(&self, key: &K) -> Completion<Vec<V>> {
        let env = encode(key).map(|k| self.inner.envelope("remove").key(k));
        let inner = self.inner.clone();
        match env {
            Ok(env) => Completion::spawn(async move {
                let values: Option<Vec<Value>> = inner.query(env).await?;
                decode_all(values)
            }),
            Err(e) => Completion::ready(Err(e)),
        }
    }

    pub async fn contains_key(&self, key: &K) -> Result<bool, ClusterError> {
        let env = self.inner.envelope("contains").key(encode(key)?);
        self.inner.query(env).await
    }

    pub async fn contains_value(&self, value: &V) -> Result<bool, ClusterError> {
        let env = self.inner.envelope("contains").value(encode(value)?);
        self.inner.query(env).await
    }

    pub async fn contains_entry(&self, key: &K, value: &V) -> Result<bool, ClusterError> {
        self.inner.query(self.entry("contains", key, value)?).await
    }

    pub async fn keys(&self) -> Result<Vec<K>, ClusterError> {
        let keys: Option<Vec<Value>> = self.inner.query(self.inner.envelope("keys")).await?;
        decode_all(keys)
    }

    /// Every value under every key.
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

    fn entry(&self, action: &str, key: &K, value: &V) -> Result<Envelope, ClusterError> {
        Ok(self
            .inner
            .envelope(action)
            .key(encode(key)?)
            .value(encode(value)?))
    }
}
