//! herd-cluster: clients for a herd cluster.
//!
//! [`Cluster`] is the entry point. It finds (or starts) the cluster's
//! coordinator and hands out the other facades: [`Group`]s and their
//! [`Node`]s, and proxies for the coordinator's shared collections.
//!
//! Calls that change cluster state return a [`Completion`]. The request
//! is sent whether or not the completion is awaited.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use herd_cluster::{ClientConfig, Cluster, ClusterError};
//! # use herd_core::{ClusterListener, LocalBus, LocalRuntime};
//! # async fn demo() -> Result<(), ClusterError> {
//! let bus = Arc::new(LocalBus::new());
//! let cluster = Cluster::start(
//!     ClientConfig::new("c1"),
//!     bus,
//!     &ClusterListener::new(),
//!     Arc::new(LocalRuntime::new()),
//! )
//! .await?;
//!
//! cluster.join("g1", "n1").await?;
//! let sessions = cluster.get_map::<String, u64>("sessions");
//! sessions.put(&"user42".into(), &7).await?;
//! let group = cluster.select_group("user42").await?;
//! println!("user42 -> {group}");
//! # Ok(())
//! # }
//! ```

mod client;
mod cluster;
mod completion;
mod config;
pub mod data;
mod error;
mod group;
mod node;

pub use client::Endpoint;
pub use cluster::Cluster;
pub use completion::{Completion, CountingCompletion};
pub use config::ClientConfig;
pub use data::{
    IdGenerator, SharedCounter, SharedKey, SharedList, SharedLock, SharedMap, SharedMultiMap,
    SharedQueue, SharedSet,
};
pub use error::ClusterError;
pub use group::Group;
pub use node::Node;
