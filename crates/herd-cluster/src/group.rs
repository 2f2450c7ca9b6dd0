//! Client facade for one named group.

use std::fmt;
use std::hash::{Hash, Hasher};

use herd_core::{RegistrationId, CLUSTER_PONG};
use herd_protocol::{DeployRequest, Envelope, Status, Unit};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::Endpoint;
use crate::completion::{Completion, CountingCompletion};
use crate::data::encode;
use crate::error::ClusterError;
use crate::node::Node;

/// A named set of member addresses, managed by the cluster coordinator.
///
/// Requests go to the coordinator with this group as their scope. Two
/// `Group`s are equal when they have the same address.
#[derive(Debug, Clone)]
pub struct Group {
    coordinator: Endpoint,
    name: String,
    address: String,
}

impl Group {
    pub(crate) fn new(coordinator: Endpoint, name: impl Into<String>) -> Self {
        let name = name.into();
        let address = format!("{}.{}", coordinator.address(), name);
        Self {
            coordinator,
            name,
            address,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `<cluster>.<group>`.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Calls `handler` with each member that joins this group from now on.
    pub async fn register_join_handler<F>(&self, handler: F) -> Result<RegistrationId, ClusterError>
    where
        F: Fn(Node) + Send + 'static,
    {
        self.subscribe("join", handler).await
    }

    /// Calls `handler` with each member that leaves this group from now on.
    pub async fn register_leave_handler<F>(&self, handler: F) -> Result<RegistrationId, ClusterError>
    where
        F: Fn(Node) + Send + 'static,
    {
        self.subscribe("leave", handler).await
    }

    /// Removes a join or leave handler. Unknown registrations are a no-op.
    pub async fn unregister_handler(&self, id: RegistrationId) -> Result<(), ClusterError> {
        if !self.coordinator.bus().unregister(id).await? {
            debug!(group = %self.address, "no such handler registration");
        }
        Ok(())
    }

    async fn subscribe<F>(&self, event: &str, handler: F) -> Result<RegistrationId, ClusterError>
    where
        F: Fn(Node) + Send + 'static,
    {
        let topic = format!("{}.{}", self.address, event);
        let mut registration = self.coordinator.bus().register(&topic).await?;
        let id = registration.id;
        let members = self.coordinator.clone();
        tokio::spawn(async move {
            while let Some(delivery) = registration.recv().await {
                match delivery.body.as_str() {
                    Some(address) => handler(Node::new(members.for_address(address))),
                    None => warn!(topic = %registration.address, "membership broadcast without an address"),
                }
            }
        });
        Ok(id)
    }

    /// Succeeds when the coordinator answers for this group.
    pub async fn ping(&self) -> Result<(), ClusterError> {
        let reply = self
            .coordinator
            .request(Envelope::new("ping").group(self.name.clone()))
            .await?;
        match (reply.status, reply.result) {
            (Status::Pong, Some(Value::String(s))) if s == CLUSTER_PONG => Ok(()),
            _ => Err(ClusterError::Remote("Not a valid group address.".into())),
        }
    }

    /// The member of this group with node id `node`.
    pub async fn get_node(&self, node: &str) -> Result<Node, ClusterError> {
        let env = Envelope::new("find")
            .kind("node")
            .node(node)
            .group(self.name.clone());
        let address: String = self.coordinator.call_as(env).await?;
        Ok(self.node(address))
    }

    pub async fn get_nodes(&self) -> Result<Vec<Node>, ClusterError> {
        let env = Envelope::new("list").kind("node").group(self.name.clone());
        let addresses: Vec<String> = self.coordinator.call_as(env).await?;
        Ok(addresses.into_iter().map(|a| self.node(a)).collect())
    }

    /// The member `key` is routed to. The same key keeps getting the
    /// same member.
    pub async fn select_node<K: Serialize + ?Sized>(&self, key: &K) -> Result<Node, ClusterError> {
        let env = Envelope::new("select")
            .kind("node")
            .key(encode(key)?)
            .group(self.name.clone());
        let address: String = self.coordinator.call_as(env).await?;
        Ok(self.node(address))
    }

    /// Installs `module` on every current member. Resolves once all of
    /// them answered, with the first failure if any failed.
    pub fn install_module(&self, module: impl Into<String>) -> Completion<()> {
        self.fan_out(module.into(), |node, module| node.install_module(module))
    }

    pub fn uninstall_module(&self, module: impl Into<String>) -> Completion<()> {
        self.fan_out(module.into(), |node, module| node.uninstall_module(module))
    }

    fn fan_out(&self, module: String, request: fn(&Node, String) -> Completion<()>) -> Completion<()> {
        let group = self.clone();
        Completion::spawn(async move {
            let nodes = group.get_nodes().await?;
            debug!(group = %group.address, module = %module, members = nodes.len(), "fanning out");
            let (counter, done) = CountingCompletion::new(nodes.len());
            for node in &nodes {
                let pending = request(node, module.clone());
                let counter = counter.clone();
                tokio::spawn(async move { counter.record(pending.await) });
            }
            done.await
        })
    }

    /// Deploys a module scoped to this group, resolving to its id.
    pub fn deploy_module(
        &self,
        module: impl Into<String>,
        config: Value,
        instances: u64,
    ) -> Completion<String> {
        let unit = Unit::Module {
            module: module.into(),
        };
        self.deploy(unit, config, instances)
    }

    pub fn deploy_verticle(
        &self,
        main: impl Into<String>,
        config: Value,
        instances: u64,
    ) -> Completion<String> {
        let unit = Unit::Verticle {
            main: main.into(),
            worker: false,
            multi_threaded: false,
        };
        self.deploy(unit, config, instances)
    }

    pub fn deploy_worker_verticle(
        &self,
        main: impl Into<String>,
        config: Value,
        instances: u64,
        multi_threaded: bool,
    ) -> Completion<String> {
        let unit = Unit::Verticle {
            main: main.into(),
            worker: true,
            multi_threaded,
        };
        self.deploy(unit, config, instances)
    }

    pub fn undeploy_module(&self, id: impl Into<String>) -> Completion<()> {
        undeploy(&self.coordinator, "module", id.into())
    }

    pub fn undeploy_verticle(&self, id: impl Into<String>) -> Completion<()> {
        undeploy(&self.coordinator, "verticle", id.into())
    }

    fn deploy(&self, unit: Unit, config: Value, instances: u64) -> Completion<String> {
        deploy(&self.coordinator, unit, config, instances, Some(self.name.clone()))
    }

    fn node(&self, address: String) -> Node {
        Node::new(self.coordinator.for_address(address))
    }
}

/// Sends a deploy request, resolving to the runtime-assigned id.
pub(crate) fn deploy(
    coordinator: &Endpoint,
    unit: Unit,
    config: Value,
    instances: u64,
    group: Option<String>,
) -> Completion<String> {
    let request = DeployRequest {
        unit,
        config,
        instances,
        group,
    };
    let env = request.to_envelope();
    let endpoint = coordinator.clone();
    Completion::spawn(async move { endpoint.call_id(env).await })
}

pub(crate) fn undeploy(coordinator: &Endpoint, kind: &str, id: String) -> Completion<()> {
    let env = Envelope::new("undeploy").kind(kind).id(id);
    let endpoint = coordinator.clone();
    Completion::spawn(async move { endpoint.call_unit(env).await })
}

impl PartialEq for Group {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Group {}

impl Hash for Group {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group:{}", self.address)
    }
}
