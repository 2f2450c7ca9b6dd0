use std::time::Duration;

use herd_core::DEFAULT_CLUSTER;

/// Settings shared by every client bound to one cluster.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The cluster address; requests go to the coordinator serving it.
    pub cluster: String,
    /// How long a request waits for the coordinator's reply.
    pub reply_timeout: Duration,
    /// How long the startup probe waits before concluding that no
    /// coordinator is reachable.
    pub probe_timeout: Duration,
    /// Runtime call bound for a coordinator this client starts.
    pub runtime_timeout: Duration,
}

impl ClientConfig {
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            ..Self::default()
        }
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cluster: DEFAULT_CLUSTER.to_owned(),
            reply_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_millis(1),
            runtime_timeout: Duration::from_secs(30),
        }
    }
}
