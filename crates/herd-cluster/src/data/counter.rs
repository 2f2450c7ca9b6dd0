use herd_protocol::DataKind;

use super::Collection;
use crate::client::Endpoint;
use crate::completion::Completion;
use crate::error::ClusterError;

/// A cluster-wide integer counter, starting at 0.
#[derive(Debug, Clone)]
pub struct SharedCounter {
    inner: Collection,
}

impl SharedCounter {
    pub(crate) fn new(endpoint: Endpoint, name: impl Into<String>) -> Self {
        Self {
            inner: Collection::new(endpoint, DataKind::Counter, name),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn get(&self) -> Result<i64, ClusterError> {
        self.inner.query(self.inner.envelope("get")).await
    }

    /// Resolves to the incremented value.
    pub fn increment(&self) -> Completion<i64> {
        self.inner.mutate(Ok(self.inner.envelope("increment")))
    }

    /// Resolves to the decremented value.
    pub fn decrement(&self) -> Completion<i64> {
        self.inner.mutate(Ok(self.inner.envelope("decrement")))
    }
}

/// Hands out cluster-unique ids from a shared counter.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    counter: SharedCounter,
}

impl IdGenerator {
    pub(crate) fn new(endpoint: Endpoint, name: impl Into<String>) -> Self {
        Self {
            counter: SharedCounter::new(endpoint, name),
        }
    }

    pub fn name(&self) -> &str {
        self.counter.name()
    }

    /// The next id. The first id handed out is 1.
    pub async fn next_id(&self) -> Result<i64, ClusterError> {
        self.counter.increment().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::testing::coordinator;

    #[tokio::test]
    async fn counts_from_zero() {
        let (_c, ep) = coordinator().await;
        let counter = SharedCounter::new(ep, "hits");
        assert_eq!(counter.get().await.unwrap(), 0);
        assert_eq!(counter.increment().await.unwrap(), 1);
        assert_eq!(counter.increment().await.unwrap(), 2);
        assert_eq!(counter.decrement().await.unwrap(), 1);
        assert_eq!(counter.get().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn ids_are_unique_across_generators() {
        let (_c, ep) = coordinator().await;
        let a = IdGenerator::new(ep.clone(), "ids");
        let b = IdGenerator::new(ep, "ids");
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(a.next_id().await.unwrap());
            seen.push(b.next_id().await.unwrap());
        }
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen, (1..=10).collect::<Vec<_>>());
    }
}
