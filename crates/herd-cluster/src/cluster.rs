//! The cluster entry point.

use std::sync::Arc;

use herd_core::{
    ClusterListener, Coordinator, CoordinatorConfig, CoordinatorError, CoordinatorHandle,
    DeploymentRuntime, Transport, CLUSTER_PONG,
};
use herd_protocol::{Envelope, Reply, Status, Unit};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::client::Endpoint;
use crate::completion::Completion;
use crate::config::ClientConfig;
use crate::data::{
    encode, IdGenerator, SharedCounter, SharedKey, SharedList, SharedLock, SharedMap,
    SharedMultiMap, SharedQueue, SharedSet,
};
use crate::error::ClusterError;
use crate::group::{self, Group};
use crate::node::Node;

/// A client bound to one cluster.
///
/// [`Cluster::start`] makes sure a coordinator serves the cluster
/// address, starting one in this process if none answers. The cluster
/// that started it owns it and stops it in [`Cluster::stop`].
#[derive(Debug)]
pub struct Cluster {
    endpoint: Endpoint,
    coordinator: Option<CoordinatorHandle>,
}

impl Cluster {
    /// Probes the cluster address and starts a coordinator if nothing
    /// answers within `probe_timeout`.
    pub async fn start(
        config: ClientConfig,
        bus: Arc<dyn Transport>,
        listener: &ClusterListener,
        runtime: Arc<dyn DeploymentRuntime>,
    ) -> Result<Self, ClusterError> {
        let endpoint = Endpoint::new(Arc::clone(&bus), config.cluster.clone(), config.reply_timeout);

        if probe(&endpoint, &config).await {
            debug!(cluster = %config.cluster, "coordinator already running");
            return Ok(Self {
                endpoint,
                coordinator: None,
            });
        }

        let coordinator_config = CoordinatorConfig {
            cluster: config.cluster.clone(),
            runtime_timeout: config.runtime_timeout,
            ..CoordinatorConfig::default()
        };
        let coordinator = match Coordinator::start(coordinator_config, bus, listener, runtime).await
        {
            Ok(handle) => Some(handle),
            // another client won the race
            Err(CoordinatorError::AlreadyRunning(_)) => None,
            Err(e) => return Err(e.into()),
        };
        info!(
            cluster = %config.cluster,
            owner = coordinator.is_some(),
            "cluster client started"
        );
        Ok(Self {
            endpoint,
            coordinator,
        })
    }

    /// A client for a cluster whose coordinator runs elsewhere.
    pub fn connect(config: ClientConfig, bus: Arc<dyn Transport>) -> Self {
        Self {
            endpoint: Endpoint::new(bus, config.cluster, config.reply_timeout),
            coordinator: None,
        }
    }

    /// The cluster address.
    pub fn address(&self) -> &str {
        self.endpoint.address()
    }

    /// True when this client started the coordinator it talks to.
    pub fn owns_coordinator(&self) -> bool {
        self.coordinator.is_some()
    }

    /// Stops the coordinator if this client started it.
    pub async fn stop(self) {
        if let Some(coordinator) = self.coordinator {
            coordinator.stop().await;
        }
        info!(cluster = %self.endpoint.address(), "cluster client stopped");
    }

    /// Adds member `<cluster>.<group>.<node>` to `group`, creating the
    /// group if needed.
    pub async fn join(&self, group: &str, node: &str) -> Result<Node, ClusterError> {
        let env = Envelope::new("join").kind("node").group(group).node(node);
        let address: String = self.endpoint.call_as(env).await?;
        Ok(Node::new(self.endpoint.for_address(address)))
    }

    /// The group named `name`; fails with `Invalid group.` if it does
    /// not exist.
    pub async fn group(&self, name: &str) -> Result<Group, ClusterError> {
        let env = Envelope::new("find").kind("group").group(name);
        self.endpoint.call_unit(env).await?;
        Ok(Group::new(self.endpoint.clone(), name))
    }

    pub async fn groups(&self) -> Result<Vec<Group>, ClusterError> {
        let addresses: Vec<String> = self
            .endpoint
            .call_as(Envelope::new("list").kind("group"))
            .await?;
        addresses
            .into_iter()
            .map(|address| self.group_at(&address))
            .collect()
    }

    /// The group `key` is routed to. The same key keeps getting the
    /// same group.
    pub async fn select_group<K: Serialize + ?Sized>(&self, key: &K) -> Result<Group, ClusterError> {
        let env = Envelope::new("select").kind("group").key(encode(key)?);
        let address: String = self.endpoint.call_as(env).await?;
        self.group_at(&address)
    }

    /// The node `key` is routed to among all members of all groups.
    pub async fn select_node<K: Serialize + ?Sized>(&self, key: &K) -> Result<Node, ClusterError> {
        let env = Envelope::new("select").kind("node").key(encode(key)?);
        let address: String = self.endpoint.call_as(env).await?;
        Ok(Node::new(self.endpoint.for_address(address)))
    }

    /// Finds node `node` in any group.
    pub async fn get_node(&self, node: &str) -> Result<Node, ClusterError> {
        let env = Envelope::new("find").kind("node").node(node);
        let address: String = self.endpoint.call_as(env).await?;
        Ok(Node::new(self.endpoint.for_address(address)))
    }

    /// Whether a deployment with this id is registered.
    pub async fn is_deployed(&self, id: &str) -> Result<bool, ClusterError> {
        self.endpoint.call_as(Envelope::new("check").id(id)).await
    }

    pub fn deploy_module(
        &self,
        module: impl Into<String>,
        config: Value,
        instances: u64,
    ) -> Completion<String> {
        self.deploy(module_unit(module), config, instances, None)
    }

    /// Deploys a module recorded against `group`, which must exist.
    pub fn deploy_module_to(
        &self,
        group: impl Into<String>,
        module: impl Into<String>,
        config: Value,
        instances: u64,
    ) -> Completion<String> {
        self.deploy(module_unit(module), config, instances, Some(group.into()))
    }

    pub fn deploy_verticle(
        &self,
        main: impl Into<String>,
        config: Value,
        instances: u64,
    ) -> Completion<String> {
        self.deploy(verticle_unit(main, false, false), config, instances, None)
    }

    pub fn deploy_verticle_to(
        &self,
        group: impl Into<String>,
        main: impl Into<String>,
        config: Value,
        instances: u64,
    ) -> Completion<String> {
        let unit = verticle_unit(main, false, false);
        self.deploy(unit, config, instances, Some(group.into()))
    }

    pub fn deploy_worker_verticle(
        &self,
        main: impl Into<String>,
        config: Value,
        instances: u64,
        multi_threaded: bool,
    ) -> Completion<String> {
        let unit = verticle_unit(main, true, multi_threaded);
        self.deploy(unit, config, instances, None)
    }

    pub fn deploy_worker_verticle_to(
        &self,
        group: impl Into<String>,
        main: impl Into<String>,
        config: Value,
        instances: u64,
        multi_threaded: bool,
    ) -> Completion<String> {
        let unit = verticle_unit(main, true, multi_threaded);
        self.deploy(unit, config, instances, Some(group.into()))
    }

    pub fn undeploy_module(&self, id: impl Into<String>) -> Completion<()> {
        group::undeploy(&self.endpoint, "module", id.into())
    }

    pub fn undeploy_verticle(&self, id: impl Into<String>) -> Completion<()> {
        group::undeploy(&self.endpoint, "verticle", id.into())
    }

    pub fn get_map<K, V>(&self, name: &str) -> SharedMap<K, V>
    where
        K: Serialize + DeserializeOwned + Send + 'static,
        V: Serialize + DeserializeOwned + Send + 'static,
    {
        SharedMap::new(self.endpoint.clone(), name)
    }

    pub fn get_multimap<K, V>(&self, name: &str) -> SharedMultiMap<K, V>
    where
        K: Serialize + DeserializeOwned + Send + 'static,
        V: Serialize + DeserializeOwned + Send + 'static,
    {
        SharedMultiMap::new(self.endpoint.clone(), name)
    }

    pub fn get_list<T>(&self, name: &str) -> SharedList<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        SharedList::new(self.endpoint.clone(), name)
    }

    pub fn get_set<T>(&self, name: &str) -> SharedSet<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        SharedSet::new(self.endpoint.clone(), name)
    }

    pub fn get_queue<T>(&self, name: &str) -> SharedQueue<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        SharedQueue::new(self.endpoint.clone(), name)
    }

    pub fn get_key<T>(&self, name: &str) -> SharedKey<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        SharedKey::new(self.endpoint.clone(), name)
    }

    pub fn get_counter(&self, name: &str) -> SharedCounter {
        SharedCounter::new(self.endpoint.clone(), name)
    }

    pub fn get_id_generator(&self, name: &str) -> IdGenerator {
        IdGenerator::new(self.endpoint.clone(), name)
    }

    pub fn get_lock(&self, name: &str) -> SharedLock {
        SharedLock::new(self.endpoint.clone(), name)
    }

    fn deploy(
        &self,
        unit: Unit,
        config: Value,
        instances: u64,
        group: Option<String>,
    ) -> Completion<String> {
        group::deploy(&self.endpoint, unit, config, instances, group)
    }

    /// A group facade from a `<cluster>.<group>` address.
    fn group_at(&self, address: &str) -> Result<Group, ClusterError> {
        let name = address
            .strip_prefix(self.address())
            .and_then(|rest| rest.strip_prefix('.'))
            .ok_or_else(|| {
                ClusterError::UnexpectedReply(format!("{address} is not in this cluster"))
            })?;
        Ok(Group::new(self.endpoint.clone(), name))
    }
}

/// True when a coordinator answered the liveness probe.
async fn probe(endpoint: &Endpoint, config: &ClientConfig) -> bool {
    let body = Envelope::new("ping").to_value();
    match endpoint
        .bus()
        .send(endpoint.address(), body, config.probe_timeout)
        .await
    {
        Ok(body) => Reply::from_value(body).is_ok_and(|reply| {
            reply.status == Status::Pong && reply.result == Some(Value::from(CLUSTER_PONG))
        }),
        Err(e) => {
            debug!(cluster = %config.cluster, "probe got no answer: {e}");
            false
        }
    }
}

fn module_unit(module: impl Into<String>) -> Unit {
    Unit::Module {
        module: module.into(),
    }
}

fn verticle_unit(main: impl Into<String>, worker: bool, multi_threaded: bool) -> Unit {
    Unit::Verticle {
        main: main.into(),
        worker,
        multi_threaded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herd_core::{LocalBus, LocalRuntime};
    use serde_json::json;
    use std::time::Duration;

    async fn cluster(bus: &Arc<LocalBus>, listener: &ClusterListener) -> Cluster {
        Cluster::start(
            ClientConfig::new("c1"),
            bus.clone(),
            listener,
            Arc::new(LocalRuntime::new()),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn first_client_starts_the_coordinator() {
        let bus = Arc::new(LocalBus::new());
        let listener = ClusterListener::new();
        let first = cluster(&bus, &listener).await;
        assert!(first.owns_coordinator());
        let second = cluster(&bus, &listener).await;
        assert!(!second.owns_coordinator());

        // both talk to the same coordinator
        first.join("g1", "n1").await.unwrap();
        assert_eq!(second.groups().await.unwrap().len(), 1);

        first.stop().await;
        assert!(!bus.has_handlers("c1"));
    }

    #[tokio::test]
    async fn groups_and_selection() {
        let bus = Arc::new(LocalBus::new());
        let listener = ClusterListener::new();
        let c = cluster(&bus, &listener).await;
        for n in ["n1", "n2", "n3"] {
            c.join("g1", n).await.unwrap();
        }
        let g1 = c.group("g1").await.unwrap();
        assert_eq!(g1.address(), "c1.g1");
        let err = c.group("g9").await.unwrap_err();
        assert_eq!(err.remote_message(), Some("Invalid group."));

        let picked = c.select_group("user42").await.unwrap();
        assert_eq!(picked, g1);
        c.join("g2", "n4").await.unwrap();
        for _ in 0..5 {
            assert_eq!(c.select_group("user42").await.unwrap(), picked);
        }
        assert_eq!(c.get_node("n4").await.unwrap().address(), "c1.g2.n4");
    }

    #[tokio::test]
    async fn deployment_lifecycle() {
        let bus = Arc::new(LocalBus::new());
        let listener = ClusterListener::new();
        let c = cluster(&bus, &listener).await;

        let id = c.deploy_module("mod", json!({}), 1).await.unwrap();
        assert!(c.is_deployed(&id).await.unwrap());
        c.undeploy_module(id.clone()).await.unwrap();
        assert!(!c.is_deployed(&id).await.unwrap());

        let err = c
            .deploy_verticle_to("nowhere", "app.js", json!({}), 1)
            .await
            .unwrap_err();
        assert_eq!(err.remote_message(), Some("Invalid group."));
    }

    #[tokio::test]
    async fn connect_without_coordinator_fails_requests() {
        let bus: Arc<dyn Transport> = Arc::new(LocalBus::new());
        let config = ClientConfig::new("c1").with_reply_timeout(Duration::from_millis(20));
        let c = Cluster::connect(config, bus);
        assert!(matches!(
            c.is_deployed("x").await.unwrap_err(),
            ClusterError::Transport(_)
        ));
    }
}
