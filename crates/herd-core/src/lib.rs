//! herd-core: the cluster coordinator and its collaborators.
//!
//! Owns the coordinator actor and the seams it runs against: the
//! addressable transport, platform membership notifications, the
//! deployment runtime, and the in-memory collection store. In-process
//! implementations of each seam ([`LocalBus`], [`ClusterListener`],
//! [`LocalRuntime`]) let a whole cluster run inside one process.

pub mod agent;
pub mod bus;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod membership;
pub mod runtime;
pub mod store;

pub use agent::{NodeAgent, NODE_PONG};
pub use bus::{Delivery, LocalBus, Registration, RegistrationId, Responder, Transport};
pub use config::{CoordinatorConfig, DEFAULT_CLUSTER};
pub use coordinator::{
    Coordinator, CoordinatorHandle, CoordinatorState, DeploymentRecord, CLUSTER_PONG,
};
pub use error::{CoordinatorError, DeployError, StoreError, TransportError};
pub use membership::{ClusterListener, MembershipEvent};
pub use runtime::{DeploymentRuntime, LocalRuntime};
pub use store::Store;
