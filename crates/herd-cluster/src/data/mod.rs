//! Proxies over the coordinator's named collections.
//!
//! A proxy holds nothing but the coordinator endpoint and a collection
//! name. Every call builds one envelope (`type` = collection kind,
//! `name` = collection name), sends it and decodes the reply; nothing
//! is cached between calls. Calls that change the collection return a
//! [`Completion`](crate::Completion) that may be dropped, queries are
//! plain async methods.
//!
//! Keys and values are any serde types. They travel as JSON, so two
//! values are the same element exactly when they serialize the same.

mod counter;
mod key;
mod list;
mod lock;
mod map;
mod multimap;
mod queue;
mod set;

pub use counter::{IdGenerator, SharedCounter};
pub use key::SharedKey;
pub use list::SharedList;
pub use lock::SharedLock;
pub use map::SharedMap;
pub use multimap::SharedMultiMap;
pub use queue::SharedQueue;
pub use set::SharedSet;

use herd_protocol::{DataKind, Envelope};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::client::Endpoint;
use crate::completion::Completion;
use crate::error::ClusterError;

/// The part every proxy shares.
#[derive(Debug, Clone)]
pub(crate) struct Collection {
    endpoint: Endpoint,
    kind: DataKind,
    name: String,
}

impl Collection {
    pub(crate) fn new(endpoint: Endpoint, kind: DataKind, name: impl Into<String>) -> Self {
        Self {
            endpoint,
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn envelope(&self, action: &str) -> Envelope {
        Envelope::data(self.kind, action, self.name.clone())
    }

    pub(crate) async fn query<T: DeserializeOwned>(&self, env: Envelope) -> Result<T, ClusterError> {
        self.endpoint.call_as(env).await
    }

    /// Sends a state-changing request. An envelope that failed to build
    /// resolves the completion with that error without sending anything.
    pub(crate) fn mutate<T>(&self, env: Result<Envelope, ClusterError>) -> Completion<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let env = match env {
            Ok(env) => env,
            Err(e) => return Completion::ready(Err(e)),
        };
        let endpoint = self.endpoint.clone();
        Completion::spawn(async move { endpoint.call_as(env).await })
    }

    /// Like [`mutate`](Self::mutate) for requests with no result.
    pub(crate) fn mutate_unit(&self, env: Result<Envelope, ClusterError>) -> Completion<()> {
        let env = match env {
            Ok(env) => env,
            Err(e) => return Completion::ready(Err(e)),
        };
        let endpoint = self.endpoint.clone();
        Completion::spawn(async move { endpoint.call_unit(env).await })
    }

    pub(crate) fn clear(&self) -> Completion<()> {
        self.mutate_unit(Ok(self.envelope("clear")))
    }

    pub(crate) async fn size(&self) -> Result<usize, ClusterError> {
        self.query(self.envelope("size")).await
    }

    pub(crate) async fn is_empty(&self) -> Result<bool, ClusterError> {
        self.query(self.envelope("empty")).await
    }
}

pub(crate) fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Value, ClusterError> {
    Ok(serde_json::to_value(value)?)
}

/// Decodes an array result, treating an absent result as empty.
pub(crate) fn decode_all<T: DeserializeOwned>(values: Option<Vec<Value>>) -> Result<Vec<T>, ClusterError> {
    values
        .unwrap_or_default()
        .into_iter()
        .map(|v| serde_json::from_value(v).map_err(ClusterError::from))
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use std::time::Duration;

    use herd_core::{
        ClusterListener, Coordinator, CoordinatorConfig, CoordinatorHandle, LocalBus,
        LocalRuntime,
    };

    use crate::client::Endpoint;

    /// A coordinator for cluster `t` and an endpoint pointing at it.
    pub(crate) async fn coordinator() -> (CoordinatorHandle, Endpoint) {
        let bus = Arc::new(LocalBus::new());
        let handle = Coordinator::start(
            CoordinatorConfig::new("t"),
            bus.clone(),
            &ClusterListener::new(),
            Arc::new(LocalRuntime::new()),
        )
        .await
        .unwrap();
        (handle, Endpoint::new(bus, "t", Duration::from_secs(2)))
    }
}
