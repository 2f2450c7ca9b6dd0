//! Addressable request/reply and broadcast transport.
//!
//! [`Transport`] is the seam every herd component talks through. The
//! coordinator registers at its cluster address, node agents at their
//! member addresses, and group clients subscribe to `.join`/`.leave`
//! broadcast addresses.
//!
//! [`LocalBus`] is the in-process implementation: a `DashMap` from
//! address to registered handlers, each handler being the sending half
//! of a bounded mpsc channel. Point-to-point sends rotate round-robin
//! across handlers and wait on a oneshot for the reply; publishes are
//! delivered to every live handler without a reply channel, waiting for
//! buffer room when a handler is behind.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::TransportError;

/// Per-handler delivery buffer.
const HANDLER_CAPACITY: usize = 256;

/// Identifies one handler registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(u64);

/// One message delivered to a handler.
#[derive(Debug)]
pub struct Delivery {
    pub address: String,
    pub body: Value,
    reply: Option<oneshot::Sender<Value>>,
}

impl Delivery {
    /// Separates the body from the reply path.
    pub fn split(self) -> (Value, Responder) {
        (
            self.body,
            Responder {
                address: self.address,
                tx: self.reply,
            },
        )
    }
}

/// The reply path of a [`Delivery`]. Replying to a broadcast or to a
/// caller that already gave up is a no-op.
#[derive(Debug)]
pub struct Responder {
    address: String,
    tx: Option<oneshot::Sender<Value>>,
}

impl Responder {
    /// Sends the reply. Returns false when nobody was listening.
    pub fn send(self, body: Value) -> bool {
        match self.tx {
            Some(tx) => {
                let delivered = tx.send(body).is_ok();
                if !delivered {
                    debug!(address = %self.address, "reply dropped, caller stopped waiting");
                }
                delivered
            }
            None => false,
        }
    }
}

/// A live handler registration. Dropping it (or unregistering its id)
/// ends the stream of deliveries.
#[derive(Debug)]
pub struct Registration {
    pub id: RegistrationId,
    pub address: String,
    rx: mpsc::Receiver<Delivery>,
}

impl Registration {
    /// Waits for the next delivery. `None` once the registration has
    /// been removed or the transport closed.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }
}

/// The transport contract.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends `body` to one handler at `address` and waits up to
    /// `timeout` for its reply.
    async fn send(
        &self,
        address: &str,
        body: Value,
        timeout: Duration,
    ) -> Result<Value, TransportError>;

    /// Delivers `body` to every handler at `address`. Returns how many
    /// handlers received it.
    async fn publish(&self, address: &str, body: Value) -> Result<usize, TransportError>;

    /// Adds a handler at `address`.
    async fn register(&self, address: &str) -> Result<Registration, TransportError>;

    /// Adds a handler at `address`, failing with
    /// [`TransportError::AddressInUse`] if any handler is already there.
    async fn register_unique(&self, address: &str) -> Result<Registration, TransportError>;

    /// Removes a registration. Returns whether it existed.
    async fn unregister(&self, id: RegistrationId) -> Result<bool, TransportError>;

    fn has_handlers(&self, address: &str) -> bool;
}

struct Handlers {
    entries: Vec<(RegistrationId, mpsc::Sender<Delivery>)>,
    cursor: usize,
}

impl Handlers {
    /// Next live handler in rotation, pruning any whose receiver is gone.
    fn pick(&mut self) -> Option<mpsc::Sender<Delivery>> {
        self.entries.retain(|(_, tx)| !tx.is_closed());
        if self.entries.is_empty() {
            return None;
        }
        let idx = self.cursor % self.entries.len();
        self.cursor = self.cursor.wrapping_add(1);
        Some(self.entries[idx].1.clone())
    }
}

/// In-process transport.
pub struct LocalBus {
    handlers: DashMap<String, Handlers>,
    /// registration id -> address, for unregister
    owners: DashMap<RegistrationId, String>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl LocalBus {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
            owners: DashMap::new(),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Drops every registration and rejects further ones.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.handlers.clear();
        self.owners.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn check_address(address: &str) -> Result<(), TransportError> {
        if address.trim().is_empty() {
            return Err(TransportError::InvalidAddress(address.to_owned()));
        }
        Ok(())
    }

    fn add_handler(&self, address: &str, unique: bool) -> Result<Registration, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        Self::check_address(address)?;

        let id = RegistrationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(HANDLER_CAPACITY);

        let mut slot = self
            .handlers
            .entry(address.to_owned())
            .or_insert_with(|| Handlers {
                entries: Vec::new(),
                cursor: 0,
            });
        slot.entries.retain(|(_, tx)| !tx.is_closed());
        if unique && !slot.entries.is_empty() {
            return Err(TransportError::AddressInUse(address.to_owned()));
        }
        slot.entries.push((id, tx));
        drop(slot);

        self.owners.insert(id, address.to_owned());
        debug!(address, ?id, "handler registered");
        Ok(Registration {
            id,
            address: address.to_owned(),
            rx,
        })
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for LocalBus {
    async fn send(
        &self,
        address: &str,
        body: Value,
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        Self::check_address(address)?;

        // take the sender out before awaiting so no map guard is held
        let tx = self
            .handlers
            .get_mut(address)
            .and_then(|mut h| h.pick())
            .ok_or_else(|| TransportError::NoHandlers(address.to_owned()))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        let delivery = Delivery {
            address: address.to_owned(),
            body,
            reply: Some(reply_tx),
        };

        let exchange = async {
            tx.send(delivery)
                .await
                .map_err(|_| TransportError::Disconnected(address.to_owned()))?;
            reply_rx
                .await
                .map_err(|_| TransportError::Disconnected(address.to_owned()))
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(address.to_owned())),
        }
    }

    async fn publish(&self, address: &str, body: Value) -> Result<usize, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        Self::check_address(address)?;

        let targets: Vec<mpsc::Sender<Delivery>> = match self.handlers.get(address) {
            Some(h) => h.entries.iter().map(|(_, tx)| tx.clone()).collect(),
            None => return Ok(0),
        };

        let mut delivered = 0;
        for tx in targets {
            let delivery = Delivery {
                address: address.to_owned(),
                body: body.clone(),
                reply: None,
            };
            // a full subscriber holds the publisher back; nothing is dropped
            if tx.send(delivery).await.is_ok() {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    async fn register(&self, address: &str) -> Result<Registration, TransportError> {
        self.add_handler(address, false)
    }

    async fn register_unique(&self, address: &str) -> Result<Registration, TransportError> {
        self.add_handler(address, true)
    }

    async fn unregister(&self, id: RegistrationId) -> Result<bool, TransportError> {
        let Some((_, address)) = self.owners.remove(&id) else {
            return Ok(false);
        };
        let now_empty = match self.handlers.get_mut(&address) {
            Some(mut h) => {
                h.entries.retain(|(rid, _)| *rid != id);
                h.entries.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.handlers.remove_if(&address, |_, h| h.entries.is_empty());
        }
        debug!(address, ?id, "handler unregistered");
        Ok(true)
    }

    fn has_handlers(&self, address: &str) -> bool {
        self.handlers
            .get(address)
            .is_some_and(|h| h.entries.iter().any(|(_, tx)| !tx.is_closed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    const WAIT: Duration = Duration::from_secs(1);

    fn echo(mut reg: Registration, tag: &'static str) {
        tokio::spawn(async move {
            while let Some(d) = reg.recv().await {
                let (body, responder) = d.split();
                responder.send(json!({"tag": tag, "body": body}));
            }
        });
    }

    #[tokio::test]
    async fn send_without_handlers() {
        let bus = LocalBus::new();
        let err = bus.send("nowhere", json!({}), WAIT).await.unwrap_err();
        assert_eq!(err, TransportError::NoHandlers("nowhere".into()));
    }

    #[tokio::test]
    async fn send_gets_reply() {
        let bus = LocalBus::new();
        echo(bus.register("svc").await.unwrap(), "a");
        let reply = bus.send("svc", json!(1), WAIT).await.unwrap();
        assert_eq!(reply, json!({"tag": "a", "body": 1}));
    }

    #[tokio::test]
    async fn send_rotates_between_handlers() {
        let bus = LocalBus::new();
        echo(bus.register("svc").await.unwrap(), "a");
        echo(bus.register("svc").await.unwrap(), "b");

        let first = bus.send("svc", json!(0), WAIT).await.unwrap();
        let second = bus.send("svc", json!(0), WAIT).await.unwrap();
        assert_ne!(first["tag"], second["tag"]);
    }

    #[tokio::test]
    async fn send_times_out() {
        let bus = LocalBus::new();
        // registered but never read
        let _reg = bus.register("slow").await.unwrap();
        let err = bus
            .send("slow", json!({}), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::Timeout("slow".into()));
    }

    #[tokio::test]
    async fn dropped_reply_is_disconnect() {
        let bus = LocalBus::new();
        let mut reg = bus.register("drop").await.unwrap();
        tokio::spawn(async move {
            // take the delivery and drop the responder
            let _ = reg.recv().await;
        });
        let err = bus.send("drop", json!({}), WAIT).await.unwrap_err();
        assert_eq!(err, TransportError::Disconnected("drop".into()));
    }

    #[tokio::test]
    async fn publish_reaches_every_handler() {
        let bus = LocalBus::new();
        let mut a = bus.register("news").await.unwrap();
        let mut b = bus.register("news").await.unwrap();

        assert_eq!(bus.publish("news", json!("hello")).await.unwrap(), 2);
        let da = a.recv().await.unwrap();
        let db = b.recv().await.unwrap();
        assert_eq!(da.body, json!("hello"));
        assert_eq!(db.body, json!("hello"));
        assert!(da.reply.is_none());
    }

    #[tokio::test]
    async fn publish_waits_for_a_full_subscriber() {
        let bus = Arc::new(LocalBus::new());
        let mut sub = bus.register("feed").await.unwrap();
        let total = HANDLER_CAPACITY + 44;

        let publisher = {
            let bus = Arc::clone(&bus);
            tokio::spawn(async move {
                let mut delivered = 0;
                for i in 0..total {
                    delivered += bus.publish("feed", json!(i)).await.unwrap();
                }
                delivered
            })
        };

        for i in 0..total {
            assert_eq!(sub.recv().await.unwrap().body, json!(i));
        }
        assert_eq!(publisher.await.unwrap(), total);
    }

    #[tokio::test]
    async fn publish_without_handlers_is_zero() {
        let bus = LocalBus::new();
        assert_eq!(bus.publish("empty", json!(1)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unregister_removes_handler() {
        let bus = LocalBus::new();
        let reg = bus.register("svc").await.unwrap();
        assert!(bus.has_handlers("svc"));
        assert!(bus.unregister(reg.id).await.unwrap());
        assert!(!bus.has_handlers("svc"));
        assert!(!bus.unregister(reg.id).await.unwrap());
    }

    #[tokio::test]
    async fn unique_registration() {
        let bus = LocalBus::new();
        let first = bus.register_unique("coord").await.unwrap();
        let err = bus.register_unique("coord").await.unwrap_err();
        assert_eq!(err, TransportError::AddressInUse("coord".into()));

        // a dropped registration frees the address
        drop(first);
        assert!(bus.register_unique("coord").await.is_ok());
    }

    #[tokio::test]
    async fn rejects_empty_address() {
        let bus = LocalBus::new();
        let err = bus.register("  ").await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn closed_bus_rejects_everything() {
        let bus = Arc::new(LocalBus::new());
        let mut reg = bus.register("svc").await.unwrap();
        bus.close();
        assert!(reg.recv().await.is_none());
        assert_eq!(bus.register("svc").await.unwrap_err(), TransportError::Closed);
        assert_eq!(
            bus.send("svc", json!({}), WAIT).await.unwrap_err(),
            TransportError::Closed
        );
    }
}
