//! herd-server: a single herd node.
//!
//! Hosts the cluster coordinator (unless one already answers), joins
//! the configured groups and serves each resulting member address with
//! a node agent. On ctrl-c the node announces its own departure, so the
//! coordinator drops it from every group before shutting down.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use herd_cluster::Cluster;
use herd_core::{ClusterListener, LocalBus, LocalRuntime, NodeAgent};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::HerdConfig;

#[derive(Parser)]
#[command(name = "herd-server", about = "herd cluster node")]
struct Args {
    /// path to TOML configuration file
    #[arg(short = 'c', long, env = "HERD_CONFIG")]
    config: Option<PathBuf>,

    /// print default configuration as TOML and exit
    #[arg(long)]
    config_template: bool,

    /// cluster address
    #[arg(long, env = "HERD_CLUSTER")]
    cluster: Option<String>,

    /// this node's id (default: random)
    #[arg(long, env = "HERD_NODE")]
    node: Option<String>,

    /// group to join; repeat for several
    #[arg(short, long = "group", env = "HERD_GROUPS", value_delimiter = ',')]
    groups: Vec<String>,

    /// coordinator reply timeout in milliseconds
    #[arg(long, env = "HERD_REPLY_TIMEOUT_MS")]
    reply_timeout_ms: Option<u64>,

    /// deployment runtime call timeout in milliseconds
    #[arg(long, env = "HERD_RUNTIME_TIMEOUT_MS")]
    runtime_timeout_ms: Option<u64>,
}

fn apply_args(cfg: &mut HerdConfig, args: &Args) {
    if let Some(ref cluster) = args.cluster {
        cfg.cluster = cluster.clone();
    }
    if let Some(ref node) = args.node {
        cfg.node = node.clone();
    }
    if !args.groups.is_empty() {
        cfg.groups = args.groups.clone();
    }
    if let Some(ms) = args.reply_timeout_ms {
        cfg.reply_timeout_ms = ms;
    }
    if let Some(ms) = args.runtime_timeout_ms {
        cfg.runtime_timeout_ms = ms;
    }
}

fn exit_err(msg: impl std::fmt::Display) -> ! {
    eprintln!("{msg}");
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "herd=info".into()),
        )
        .init();

    let args = Args::parse();

    if args.config_template {
        match HerdConfig::default().to_toml() {
            Ok(toml) => {
                println!("{toml}");
                std::process::exit(0);
            }
            Err(e) => exit_err(format!("failed to generate config template: {e}")),
        }
    }

    // defaults → TOML file → CLI/env overrides
    let mut cfg = match &args.config {
        Some(path) => HerdConfig::from_file(path).unwrap_or_else(|e| exit_err(e)),
        None => HerdConfig::default(),
    };
    apply_args(&mut cfg, &args);
    if cfg.node.is_empty() {
        cfg.node = Uuid::new_v4().simple().to_string();
    }
    if let Err(e) = cfg.validate() {
        exit_err(e);
    }

    let bus = Arc::new(LocalBus::new());
    let listener = ClusterListener::new();
    let runtime = Arc::new(LocalRuntime::new());

    let cluster = Cluster::start(cfg.client_config(), bus.clone(), &listener, runtime.clone())
        .await
        .unwrap_or_else(|e| exit_err(format!("failed to start cluster client: {e}")));
    listener.node_joined(cfg.node.clone());

    let mut agents = Vec::with_capacity(cfg.groups.len());
    for group in &cfg.groups {
        let member = cluster
            .join(group, &cfg.node)
            .await
            .unwrap_or_else(|e| exit_err(format!("failed to join group {group}: {e}")));
        let agent = NodeAgent::start(bus.clone(), member.address(), runtime.clone())
            .await
            .unwrap_or_else(|e| exit_err(format!("failed to serve {}: {e}", member.address())));
        agents.push(agent);
    }

    match cluster.groups().await {
        Ok(groups) => info!(
            cluster = %cfg.cluster,
            node = %cfg.node,
            groups = groups.len(),
            members = agents.len(),
            coordinator = cluster.owns_coordinator(),
            "herd node ready"
        ),
        Err(e) => warn!(cluster = %cfg.cluster, "failed to list groups: {e}"),
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {e}");
    }
    info!(node = %cfg.node, "shutting down");

    listener.node_left(cfg.node.clone());
    for agent in agents {
        agent.stop().await;
    }
    cluster.stop().await;
}
