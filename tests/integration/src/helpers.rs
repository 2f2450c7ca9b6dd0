//! Test helpers for running a whole cluster inside the test process.

use std::sync::Arc;
use std::time::Duration;

use herd_cluster::{ClientConfig, Cluster, Node};
use herd_core::{ClusterListener, LocalBus, LocalRuntime, NodeAgent, Transport};
use herd_protocol::{Envelope, Reply};

/// A cluster client that owns its coordinator, plus the collaborators
/// it runs against.
pub struct TestCluster {
    pub bus: Arc<LocalBus>,
    pub listener: ClusterListener,
    pub runtime: Arc<LocalRuntime>,
    pub cluster: Cluster,
    agents: Vec<NodeAgent>,
}

impl TestCluster {
    pub async fn start(name: &str) -> Self {
        let bus = Arc::new(LocalBus::new());
        let listener = ClusterListener::new();
        let runtime = Arc::new(LocalRuntime::new());
        let config = ClientConfig::new(name).with_reply_timeout(Duration::from_secs(2));
        let cluster = Cluster::start(config, bus.clone(), &listener, runtime.clone())
            .await
            .expect("cluster should start");
        Self {
            bus,
            listener,
            runtime,
            cluster,
            agents: Vec::new(),
        }
    }

    /// Joins every node to `group` without serving their addresses.
    pub async fn join_all(&self, group: &str, nodes: &[&str]) -> Vec<Node> {
        let mut members = Vec::new();
        for node in nodes {
            members.push(self.cluster.join(group, node).await.expect("join"));
        }
        members
    }

    /// Joins every node to `group` and starts a node agent for each.
    pub async fn serve_all(&mut self, group: &str, nodes: &[&str]) -> Vec<Node> {
        let members = self.join_all(group, nodes).await;
        for member in &members {
            let agent = NodeAgent::start(self.bus.clone(), member.address(), self.runtime.clone())
                .await
                .expect("agent should start");
            self.agents.push(agent);
        }
        members
    }

    /// Sends a raw envelope to the coordinator.
    pub async fn raw(&self, env: Envelope) -> Reply {
        let body = self
            .bus
            .send(self.cluster.address(), env.to_value(), Duration::from_secs(2))
            .await
            .expect("coordinator should reply");
        Reply::from_value(body).expect("reply should decode")
    }

    pub async fn shutdown(self) {
        for agent in self.agents {
            agent.stop().await;
        }
        self.cluster.stop().await;
    }
}
