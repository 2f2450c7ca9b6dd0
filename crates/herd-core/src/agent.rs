//! Node agent: the process-side endpoint behind a member address.
//!
//! Group clients reach individual nodes through their member address
//! (`<cluster>.<group>.<node>`). The agent answers liveness probes and
//! runs module install/uninstall requests against the local runtime.

use std::sync::Arc;

use herd_protocol::{Envelope, Reply};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bus::{Registration, RegistrationId, Transport};
use crate::error::TransportError;
use crate::runtime::DeploymentRuntime;

/// Result carried by a node agent's pong.
pub const NODE_PONG: &str = "node";

/// A running node agent.
pub struct NodeAgent {
    address: String,
    registration: RegistrationId,
    bus: Arc<dyn Transport>,
    task: JoinHandle<()>,
}

impl NodeAgent {
    /// Registers at `address` and starts serving.
    pub async fn start(
        bus: Arc<dyn Transport>,
        address: impl Into<String>,
        runtime: Arc<dyn DeploymentRuntime>,
    ) -> Result<Self, TransportError> {
        let address = address.into();
        let registration = bus.register(&address).await?;
        let id = registration.id;
        info!(address = %address, "node agent started");
        let task = tokio::spawn(serve(registration, runtime));
        Ok(Self {
            address,
            registration: id,
            bus,
            task,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Unregisters and waits for the serving task to finish.
    pub async fn stop(self) {
        if let Err(e) = self.bus.unregister(self.registration).await {
            warn!(address = %self.address, "failed to unregister node agent: {e}");
        }
        let _ = self.task.await;
        info!(address = %self.address, "node agent stopped");
    }
}

async fn serve(mut registration: Registration, runtime: Arc<dyn DeploymentRuntime>) {
    while let Some(delivery) = registration.recv().await {
        let (body, responder) = delivery.split();
        let reply = match Envelope::from_value(body) {
            Ok(env) => handle(env, runtime.as_ref()).await,
            Err(e) => Reply::from(e),
        };
        responder.send(reply.to_value());
    }
    debug!(address = %registration.address, "node agent registration closed");
}

async fn handle(env: Envelope, runtime: &dyn DeploymentRuntime) -> Reply {
    let Some(action) = env.action.as_deref() else {
        return Reply::error("Must specify an action");
    };
    match action {
        "ping" => Reply::pong(NODE_PONG),
        "install" | "uninstall" => {
            let Some(module) = env.module.as_deref().filter(|m| !m.is_empty()) else {
                return Reply::error("No module name specified.");
            };
            let result = if action == "install" {
                runtime.install_module(module).await
            } else {
                runtime.uninstall_module(module).await
            };
            match result {
                Ok(()) => Reply::ok(),
                Err(e) => {
                    warn!(module, action, "module request failed: {e}");
                    Reply::error(e.to_string())
                }
            }
        }
        other => Reply::error(format!("Invalid action {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::LocalBus;
    use crate::runtime::LocalRuntime;
    use herd_protocol::Status;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(1);

    async fn request(bus: &LocalBus, address: &str, env: Envelope) -> Reply {
        let body = bus.send(address, env.to_value(), WAIT).await.unwrap();
        Reply::from_value(body).unwrap()
    }

    #[tokio::test]
    async fn answers_ping_and_installs() {
        let bus = Arc::new(LocalBus::new());
        let runtime = Arc::new(LocalRuntime::new());
        let agent = NodeAgent::start(bus.clone(), "c.g.n1", runtime.clone())
            .await
            .unwrap();

        let pong = request(&bus, "c.g.n1", Envelope::new("ping")).await;
        assert_eq!(pong.status, Status::Pong);
        assert_eq!(pong.result, Some(serde_json::json!("node")));

        let ok = request(&bus, "c.g.n1", Envelope::new("install").module("lib~1")).await;
        assert!(ok.is_ok());
        assert!(runtime.is_installed("lib~1"));

        let err = request(&bus, "c.g.n1", Envelope::new("uninstall").module("other")).await;
        assert_eq!(err.status, Status::Error);

        agent.stop().await;
        assert!(!bus.has_handlers("c.g.n1"));
    }

    #[tokio::test]
    async fn rejects_unknown_action() {
        let bus = Arc::new(LocalBus::new());
        let _agent = NodeAgent::start(bus.clone(), "c.g.n2", Arc::new(LocalRuntime::new()))
            .await
            .unwrap();
        let reply = request(&bus, "c.g.n2", Envelope::new("reboot")).await;
        assert_eq!(reply.message.as_deref(), Some("Invalid action reboot"));
    }
}
