//! Request/reply against one address.

use std::sync::Arc;
use std::time::Duration;

use herd_core::Transport;
use herd_protocol::{Envelope, Reply, Status};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::ClusterError;

/// A transport bound to one address and reply timeout.
///
/// Every client facade holds one of these: the collection proxies and
/// groups point it at the cluster address, nodes at their member
/// address.
#[derive(Clone)]
pub struct Endpoint {
    bus: Arc<dyn Transport>,
    address: String,
    timeout: Duration,
}

impl Endpoint {
    pub fn new(bus: Arc<dyn Transport>, address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bus,
            address: address.into(),
            timeout,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn bus(&self) -> &Arc<dyn Transport> {
        &self.bus
    }

    /// Same transport and timeout, different address.
    pub fn for_address(&self, address: impl Into<String>) -> Self {
        Self {
            bus: Arc::clone(&self.bus),
            address: address.into(),
            timeout: self.timeout,
        }
    }

    /// Sends `env` and decodes the reply. A `status=error` reply becomes
    /// [`ClusterError::Remote`]; `ok` and `pong` replies are returned.
    pub async fn request(&self, env: Envelope) -> Result<Reply, ClusterError> {
        let action = env.action.clone().unwrap_or_default();
        let body = self
            .bus
            .send(&self.address, env.to_value(), self.timeout)
            .await?;
        let reply =
            Reply::from_value(body).map_err(|e| ClusterError::UnexpectedReply(e.to_string()))?;
        match reply.status {
            Status::Error => {
                let message = reply.message.unwrap_or_default();
                debug!(address = %self.address, action = %action, "request failed: {message}");
                Err(ClusterError::Remote(message))
            }
            Status::Ok | Status::Pong => Ok(reply),
        }
    }

    /// The reply's `result`, JSON null when absent.
    pub async fn call(&self, env: Envelope) -> Result<Value, ClusterError> {
        Ok(self.request(env).await?.result.unwrap_or(Value::Null))
    }

    /// The reply's `result` decoded as `T`. Use `Option<T>` for results
    /// that may be absent.
    pub async fn call_as<T: DeserializeOwned>(&self, env: Envelope) -> Result<T, ClusterError> {
        let result = self.call(env).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Sends `env` and discards whatever `ok` reply comes back.
    pub async fn call_unit(&self, env: Envelope) -> Result<(), ClusterError> {
        self.request(env).await.map(drop)
    }

    /// The reply's deployment `id`.
    pub async fn call_id(&self, env: Envelope) -> Result<String, ClusterError> {
        self.request(env)
            .await?
            .id
            .ok_or_else(|| ClusterError::UnexpectedReply("reply carries no id".into()))
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("address", &self.address)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herd_core::{LocalBus, TransportError};
    use serde_json::json;

    async fn serve(bus: &Arc<LocalBus>, address: &str, reply: Reply) -> Endpoint {
        let mut reg = bus.register(address).await.unwrap();
        tokio::spawn(async move {
            while let Some(d) = reg.recv().await {
                let (_, responder) = d.split();
                responder.send(reply.to_value());
            }
        });
        Endpoint::new(bus.clone(), address, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn error_reply_becomes_remote() {
        let bus = Arc::new(LocalBus::new());
        let ep = serve(&bus, "a", Reply::error("Invalid group.")).await;
        let err = ep.call(Envelope::new("ping")).await.unwrap_err();
        assert_eq!(err.remote_message(), Some("Invalid group."));
    }

    #[tokio::test]
    async fn typed_results() {
        let bus = Arc::new(LocalBus::new());
        let ep = serve(&bus, "a", Reply::ok_with(json!([1, 2, 3]))).await;
        let v: Vec<i64> = ep.call_as(Envelope::new("keys")).await.unwrap();
        assert_eq!(v, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn absent_result_decodes_as_none() {
        let bus = Arc::new(LocalBus::new());
        let ep = serve(&bus, "a", Reply::ok()).await;
        let v: Option<String> = ep.call_as(Envelope::new("get")).await.unwrap();
        assert_eq!(v, None);
        let err = ep.call_id(Envelope::new("deploy")).await.unwrap_err();
        assert!(matches!(err, ClusterError::UnexpectedReply(_)));
    }

    #[tokio::test]
    async fn transport_failure_is_wrapped() {
        let bus = Arc::new(LocalBus::new());
        let ep = Endpoint::new(bus, "nowhere", Duration::from_millis(50));
        let err = ep.call(Envelope::new("ping")).await.unwrap_err();
        assert!(matches!(
            err,
            ClusterError::Transport(TransportError::NoHandlers(_))
        ));
    }
}
