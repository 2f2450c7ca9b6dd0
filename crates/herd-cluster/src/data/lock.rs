use std::time::Duration;

use herd_protocol::DataKind;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use super::Collection;
use crate::client::Endpoint;
use crate::error::ClusterError;

/// Delay between acquisition attempts.
const RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// A cluster-wide mutual exclusion lock.
///
/// Each `SharedLock` value is its own owner: clones share the owner id
/// and therefore the hold. Acquisition is re-entrant for the same owner
/// and the coordinator only lets the holder release.
#[derive(Debug, Clone)]
pub struct SharedLock {
    inner: Collection,
    owner: String,
}

impl SharedLock {
    pub(crate) fn new(endpoint: Endpoint, name: impl Into<String>) -> Self {
        Self {
            inner: Collection::new(endpoint, DataKind::Lock, name),
            owner: Uuid::new_v4().to_string(),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// One acquisition attempt. Returns whether this owner now holds it.
    pub async fn try_acquire(&self) -> Result<bool, ClusterError> {
        let env = self.inner.envelope("acquire").id(self.owner.clone());
        self.inner.query(env).await
    }

    /// Retries until the lock is held or `timeout` passes.
    pub async fn acquire(&self, timeout: Duration) -> Result<(), ClusterError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.try_acquire().await? {
                debug!(lock = self.name(), owner = %self.owner, "lock acquired");
                return Ok(());
            }
            if Instant::now() + RETRY_INTERVAL > deadline {
                return Err(ClusterError::LockTimeout(self.name().to_owned()));
            }
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
    }

    /// Releases the lock. Returns false if this owner did not hold it.
    pub async fn release(&self) -> Result<bool, ClusterError> {
        let env = self.inner.envelope("release").id(self.owner.clone());
        self.inner.query(env).await
    }
}
