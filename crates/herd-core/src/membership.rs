//! Platform membership notifications.
//!
//! The platform reports nodes joining and leaving the cluster through a
//! [`ClusterListener`]. The coordinator subscribes on start and applies
//! leave events inside its serialized loop.
//!
//! Each subscriber owns an unbounded queue. Events are never dropped and
//! arrive in emit order.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

/// A platform-level membership change for one node id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipEvent {
    Joined(String),
    Left(String),
}

impl MembershipEvent {
    pub fn node(&self) -> &str {
        match self {
            MembershipEvent::Joined(node) | MembershipEvent::Left(node) => node,
        }
    }
}

/// Fan-out point for membership events. Clones share subscribers.
#[derive(Debug, Clone, Default)]
pub struct ClusterListener {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<MembershipEvent>>>>,
}

impl ClusterListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receives every event emitted from now on. The receiver ends once
    /// every clone of the listener is dropped.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<MembershipEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    /// Announces a node joining. Returns how many subscribers saw it.
    pub fn node_joined(&self, node: impl Into<String>) -> usize {
        self.emit(MembershipEvent::Joined(node.into()))
    }

    /// Announces a node leaving. Returns how many subscribers saw it.
    pub fn node_left(&self, node: impl Into<String>) -> usize {
        self.emit(MembershipEvent::Left(node.into()))
    }

    fn emit(&self, event: MembershipEvent) -> usize {
        debug!(?event, "membership event");
        let mut subscribers = self.lock();
        // dropped receivers are pruned here
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        subscribers.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<MembershipEvent>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
