use std::time::Duration;

/// Default cluster address when none is configured.
pub const DEFAULT_CLUSTER: &str = "herd";

/// Settings for a coordinator instance.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// The cluster address. The coordinator serves requests here and
    /// prefixes every collection and group name with it.
    pub cluster: String,
    /// Capacity of the internal completion queue.
    pub channel_capacity: usize,
    /// Upper bound on a single deployment runtime call.
    pub runtime_timeout: Duration,
}

impl CoordinatorConfig {
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            ..Self::default()
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            cluster: DEFAULT_CLUSTER.to_owned(),
            channel_capacity: 256,
            runtime_timeout: Duration::from_secs(30),
        }
    }
}
