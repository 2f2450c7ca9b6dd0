//! The cluster coordinator.
//!
//! One coordinator serves each cluster. It registers at the cluster
//! address and owns every piece of cluster-wide state: the node roster,
//! group membership, the selector caches, the deployment registry and
//! the collection store.
//!
//! ## single writer
//!
//! All of that state lives inside one tokio task. Requests from the
//! transport, membership events from the platform and completions of
//! deployment runtime calls all arrive over channels and are applied
//! one at a time, so no handler ever observes a partial update.
//!
//! ## runtime calls off the loop
//!
//! Deploy and undeploy go to the runtime on spawned tasks bounded by
//! `runtime_timeout`. Their outcome comes back into the loop as a
//! [`Completion`], and only then is the registry updated and the caller
//! answered. A slow runtime never stalls other requests.

mod membership;
mod selector;

use std::sync::Arc;
use std::time::Duration;

use herd_protocol::{
    Command, DeployRequest, Envelope, Listing, Lookup, ProtocolError, Reply, Selection, Target,
    UnitKind,
};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bus::{Delivery, Registration, Responder, Transport};
use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, DeployError, TransportError};
use crate::membership::{ClusterListener, MembershipEvent};
use crate::runtime::{self, DeploymentRuntime};
use crate::store::Store;

pub use membership::{Departure, Membership};
pub use selector::Selectors;

/// Result carried by the coordinator's pong.
pub const CLUSTER_PONG: &str = "cluster";

/// Lifecycle of a coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// A deployment the runtime confirmed and that has not been undeployed.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentRecord {
    pub id: String,
    pub cluster: String,
    pub request: DeployRequest,
}

impl DeploymentRecord {
    /// The request body with the runtime-assigned id.
    pub fn to_value(&self) -> Value {
        self.request.to_envelope().id(self.id.clone()).to_value()
    }
}

/// Outcome of a runtime call, posted back into the loop.
enum Completion {
    Deployed {
        request: DeployRequest,
        responder: Responder,
        result: Result<String, DeployError>,
    },
    Undeployed {
        id: String,
        responder: Responder,
        result: Result<(), DeployError>,
    },
}

pub struct Coordinator;

impl Coordinator {
    /// Subscribes to membership events, registers the command handler at
    /// the cluster address and spawns the coordinator task.
    ///
    /// Fails with [`CoordinatorError::AlreadyRunning`] if the cluster
    /// address is already served on this transport.
    pub async fn start(
        config: CoordinatorConfig,
        bus: Arc<dyn Transport>,
        listener: &ClusterListener,
        runtime: Arc<dyn DeploymentRuntime>,
    ) -> Result<CoordinatorHandle, CoordinatorError> {
        let cluster = config.cluster.clone();
        let (state_tx, state_rx) = watch::channel(CoordinatorState::Starting);
        info!(cluster = %cluster, "coordinator starting");

        let events = listener.subscribe();
        let registration = match bus.register_unique(&cluster).await {
            Ok(reg) => reg,
            Err(TransportError::AddressInUse(_)) => {
                return Err(CoordinatorError::AlreadyRunning(cluster))
            }
            Err(e) => return Err(CoordinatorError::Register(e)),
        };

        let (done_tx, done_rx) = mpsc::channel(config.channel_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let ctx = CoordinatorCtx {
            cluster: cluster.clone(),
            membership: Membership::default(),
            selectors: Selectors::default(),
            deployments: Vec::new(),
            store: Store::new(cluster.clone()),
            bus,
            runtime,
            runtime_timeout: config.runtime_timeout,
            done_tx,
        };

        state_tx.send_replace(CoordinatorState::Running);
        let task = tokio::spawn(run(ctx, registration, events, done_rx, shutdown_rx, state_tx));
        info!(cluster = %cluster, "coordinator running");

        Ok(CoordinatorHandle {
            cluster,
            state: state_rx,
            shutdown: Some(shutdown_tx),
            task,
        })
    }
}

/// Owner of a running coordinator. Dropping it stops the coordinator.
pub struct CoordinatorHandle {
    cluster: String,
    state: watch::Receiver<CoordinatorState>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl CoordinatorHandle {
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state.borrow()
    }

    /// Unregisters the command handler and waits for the task to end.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!(cluster = %self.cluster, "coordinator task failed: {e}");
        }
    }
}

impl std::fmt::Debug for CoordinatorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorHandle")
            .field("cluster", &self.cluster)
            .field("state", &self.state())
            .finish()
    }
}

async fn run(
    mut ctx: CoordinatorCtx,
    mut registration: Registration,
    mut events: mpsc::UnboundedReceiver<MembershipEvent>,
    mut done_rx: mpsc::Receiver<Completion>,
    mut shutdown_rx: oneshot::Receiver<()>,
    state_tx: watch::Sender<CoordinatorState>,
) {
    let mut listening = true;

    loop {
        // membership first: a leave reported before a request is applied
        // before that request is answered
        tokio::select! {
            biased;

            _ = &mut shutdown_rx => break,
            Some(done) = done_rx.recv() => ctx.complete(done),
            event = events.recv(), if listening => match event {
                Some(event) => ctx.on_membership(event).await,
                None => {
                    debug!(cluster = %ctx.cluster, "membership listener closed");
                    listening = false;
                }
            },
            delivery = registration.recv() => match delivery {
                Some(delivery) => ctx.handle(delivery).await,
                None => {
                    warn!(cluster = %ctx.cluster, "command handler registration closed");
                    break;
                }
            },
        }
    }

    state_tx.send_replace(CoordinatorState::Stopping);
    // leaves emitted before the stop request are still applied and announced
    let mut drained = 0usize;
    while let Ok(event) = events.try_recv() {
        ctx.on_membership(event).await;
        drained += 1;
    }
    if drained > 0 {
        debug!(cluster = %ctx.cluster, drained, "applied pending membership events");
    }
    if let Err(e) = ctx.bus.unregister(registration.id).await {
        warn!(cluster = %ctx.cluster, "failed to unregister coordinator: {e}");
    }
    state_tx.send_replace(CoordinatorState::Stopped);
    info!(cluster = %ctx.cluster, "coordinator stopped");
}

/// Everything the coordinator task owns.
struct CoordinatorCtx {
    cluster: String,
    membership: Membership,
    selectors: Selectors,
    deployments: Vec<DeploymentRecord>,
    store: Store,
    bus: Arc<dyn Transport>,
    runtime: Arc<dyn DeploymentRuntime>,
    runtime_timeout: Duration,
    done_tx: mpsc::Sender<Completion>,
}

impl CoordinatorCtx {
    fn group_address(&self, group: &str) -> String {
        format!("{}.{}", self.cluster, group)
    }

    async fn handle(&mut self, delivery: Delivery) {
        let (body, responder) = delivery.split();
        match Envelope::from_value(body).and_then(Command::from_envelope) {
            Ok(command) => self.execute(command, responder).await,
            Err(e) => reject(e, responder),
        }
    }

    async fn execute(&mut self, command: Command, responder: Responder) {
        let reply = match command {
            Command::Deploy(request) => return self.deploy(request, responder),
            Command::Undeploy { unit, id } => return self.undeploy(unit, id, responder),
            Command::Ping { group } => self.ping(group.as_deref()),
            Command::Find(lookup) => self.find(lookup),
            Command::List(listing) => self.list(listing),
            Command::Select(selection) => self.select(selection),
            Command::Join { group, node } => self.join(&group, &node).await,
            Command::Check { id } => Reply::ok_with(self.deployments.iter().any(|d| d.id == id)),
            Command::Data { name, op } => {
                debug!(
                    cluster = %self.cluster,
                    name = %name,
                    kind = op.kind().as_str(),
                    "data request"
                );
                match self.store.apply(&name, op) {
                    Ok(result) => Reply::ok_with(result),
                    Err(e) => Reply::error(e.to_string()),
                }
            }
        };
        responder.send(reply.to_value());
    }

    fn ping(&self, group: Option<&str>) -> Reply {
        match group {
            Some(group) if !self.membership.has_group(&self.group_address(group)) => {
                Reply::error("Invalid group.")
            }
            _ => Reply::pong(CLUSTER_PONG),
        }
    }

    fn find(&self, lookup: Lookup) -> Reply {
        match lookup {
            Lookup::Group { group } => {
                let address = self.group_address(&group);
                if self.membership.has_group(&address) {
                    Reply::ok_with(address)
                } else {
                    Reply::error("Invalid group.")
                }
            }
            Lookup::Node { node, group } => {
                let found = match group {
                    Some(group) => {
                        let address = self.group_address(&group);
                        self.membership.find_node(&node, std::iter::once(&address))
                    }
                    None => self.membership.find_node(&node, self.membership.groups()),
                };
                match found {
                    Some(address) => Reply::ok_with(address),
                    None => Reply::error("Invalid node."),
                }
            }
        }
    }

    fn list(&self, listing: Listing) -> Reply {
        match listing {
            Listing::Groups => Reply::ok_with(self.membership.group_addresses()),
            Listing::Nodes { group: None } => {
                let members: Vec<String> = self.membership.all_members().into_iter().collect();
                Reply::ok_with(members)
            }
            Listing::Nodes { group: Some(group) } => {
                match self.membership.members(&self.group_address(&group)) {
                    Some(members) => {
                        Reply::ok_with(members.iter().cloned().collect::<Vec<_>>())
                    }
                    None => Reply::error("Invalid group."),
                }
            }
        }
    }

    fn select(&mut self, selection: Selection) -> Reply {
        let Selection { target, key, group } = selection;
        match target {
            Target::Group => {
                let candidates = self.membership.group_addresses();
                match self.selectors.select_group(&key, &candidates) {
                    Some(group) => Reply::ok_with(group),
                    None => Reply::error("No groups to select."),
                }
            }
            Target::Node => {
                let candidates: Vec<String> = match &group {
                    Some(group) => self
                        .membership
                        .members(&self.group_address(group))
                        .map(|m| m.iter().cloned().collect())
                        .unwrap_or_default(),
                    None => self.membership.all_members().into_iter().collect(),
                };
                match self
                    .selectors
                    .select_node(&key, group.as_deref(), &candidates)
                {
                    Some(node) => Reply::ok_with(node),
                    None => Reply::error("No nodes to select."),
                }
            }
        }
    }

    async fn join(&mut self, group: &str, node: &str) -> Reply {
        let group_address = self.group_address(group);
        let address = format!("{group_address}.{node}");
        if self.membership.join(node, &group_address, &address) {
            debug!(cluster = %self.cluster, node, address = %address, "member joined");
            self.announce(format!("{group_address}.join"), &address).await;
        }
        Reply::ok_with(address)
    }

    async fn on_membership(&mut self, event: MembershipEvent) {
        match event {
            MembershipEvent::Joined(node) => {
                debug!(cluster = %self.cluster, node = %node, "node joined cluster");
            }
            MembershipEvent::Left(node) => {
                let departures = self.membership.leave(&node);
                debug!(
                    cluster = %self.cluster,
                    node = %node,
                    removed = departures.len(),
                    "node left cluster"
                );
                for Departure { group, address } in departures {
                    self.announce(format!("{group}.leave"), &address).await;
                }
            }
        }
    }

    /// Broadcasts a member address on a group's `.join`/`.leave` address.
    async fn announce(&self, topic: String, address: &str) {
        if let Err(e) = self
            .bus
            .publish(&topic, Value::String(address.to_owned()))
            .await
        {
            warn!(topic = %topic, address, "failed to publish membership change: {e}");
        }
    }

    fn deploy(&mut self, request: DeployRequest, responder: Responder) {
        if let Some(group) = &request.group {
            if !self.membership.has_group(&self.group_address(group)) {
                responder.send(Reply::error("Invalid group.").to_value());
                return;
            }
        }

        let runtime = Arc::clone(&self.runtime);
        let done = self.done_tx.clone();
        let limit = self.runtime_timeout;
        tokio::spawn(async move {
            let call = runtime::deploy_unit(
                runtime.as_ref(),
                &request.unit,
                request.config.clone(),
                request.instances,
            );
            let result = tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(DeployError::Timeout(limit)));
            let completion = Completion::Deployed {
                request,
                responder,
                result,
            };
            if done.send(completion).await.is_err() {
                warn!("coordinator stopped before a deployment completed");
            }
        });
    }

    fn undeploy(&mut self, unit: UnitKind, id: String, responder: Responder) {
        // the record goes before the runtime is asked
        let before = self.deployments.len();
        self.deployments.retain(|d| d.id != id);
        if self.deployments.len() == before {
            debug!(cluster = %self.cluster, id = %id, "undeploying an unregistered deployment");
        }

        let runtime = Arc::clone(&self.runtime);
        let done = self.done_tx.clone();
        let limit = self.runtime_timeout;
        tokio::spawn(async move {
            let result = tokio::time::timeout(limit, runtime::undeploy_unit(runtime.as_ref(), unit, &id))
                .await
                .unwrap_or(Err(DeployError::Timeout(limit)));
            if done
                .send(Completion::Undeployed {
                    id,
                    responder,
                    result,
                })
                .await
                .is_err()
            {
                warn!("coordinator stopped before an undeployment completed");
            }
        });
    }

    fn complete(&mut self, completion: Completion) {
        match completion {
            Completion::Deployed {
                request,
                responder,
                result: Ok(id),
            } => {
                info!(
                    cluster = %self.cluster,
                    id = %id,
                    kind = request.unit.kind().as_str(),
                    descriptor = request.unit.descriptor(),
                    "deployment registered"
                );
                self.deployments.push(DeploymentRecord {
                    id: id.clone(),
                    cluster: self.cluster.clone(),
                    request,
                });
                responder.send(Reply::ok_id(id).to_value());
            }
            Completion::Deployed {
                request,
                responder,
                result: Err(e),
            } => {
                warn!(
                    cluster = %self.cluster,
                    descriptor = request.unit.descriptor(),
                    "deployment failed: {e}"
                );
                responder.send(Reply::error(e.to_string()).to_value());
            }
            Completion::Undeployed {
                id,
                responder,
                result,
            } => {
                let reply = match result {
                    Ok(()) => {
                        info!(cluster = %self.cluster, id = %id, "undeployed");
                        Reply::ok()
                    }
                    Err(e) => {
                        warn!(cluster = %self.cluster, id = %id, "undeploy failed: {e}");
                        Reply::error(e.to_string())
                    }
                };
                responder.send(reply.to_value());
            }
        }
    }
}

fn reject(err: ProtocolError, responder: Responder) {
    debug!("rejected request: {err}");
    responder.send(Reply::from(err).to_value());
}
