//! Deployment runtime seam.
//!
//! The runtime is what actually starts and stops work units. The
//! coordinator only records what the runtime reports; it never assumes a
//! deployment succeeded until the runtime returns an id.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use herd_protocol::{Unit, UnitKind};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::error::DeployError;

#[async_trait]
pub trait DeploymentRuntime: Send + Sync + 'static {
    async fn deploy_module(
        &self,
        module: &str,
        config: Value,
        instances: u64,
    ) -> Result<String, DeployError>;

    async fn deploy_verticle(
        &self,
        main: &str,
        config: Value,
        instances: u64,
    ) -> Result<String, DeployError>;

    async fn deploy_worker_verticle(
        &self,
        main: &str,
        config: Value,
        instances: u64,
        multi_threaded: bool,
    ) -> Result<String, DeployError>;

    async fn undeploy_module(&self, id: &str) -> Result<(), DeployError>;

    async fn undeploy_verticle(&self, id: &str) -> Result<(), DeployError>;

    async fn install_module(&self, module: &str) -> Result<(), DeployError>;

    async fn uninstall_module(&self, module: &str) -> Result<(), DeployError>;
}

/// Routes a unit descriptor to the matching runtime call.
pub async fn deploy_unit(
    runtime: &dyn DeploymentRuntime,
    unit: &Unit,
    config: Value,
    instances: u64,
) -> Result<String, DeployError> {
    match unit {
        Unit::Module { module } => runtime.deploy_module(module, config, instances).await,
        Unit::Verticle {
            main,
            worker: false,
            ..
        } => runtime.deploy_verticle(main, config, instances).await,
        Unit::Verticle {
            main,
            worker: true,
            multi_threaded,
        } => {
            runtime
                .deploy_worker_verticle(main, config, instances, *multi_threaded)
                .await
        }
    }
}

pub async fn undeploy_unit(
    runtime: &dyn DeploymentRuntime,
    kind: UnitKind,
    id: &str,
) -> Result<(), DeployError> {
    match kind {
        UnitKind::Module => runtime.undeploy_module(id).await,
        UnitKind::Verticle => runtime.undeploy_verticle(id).await,
    }
}

/// A deployment tracked by [`LocalRuntime`].
#[derive(Debug, Clone, PartialEq)]
pub struct LocalDeployment {
    pub kind: UnitKind,
    pub descriptor: String,
    pub config: Value,
    pub instances: u64,
    pub worker: bool,
    pub multi_threaded: bool,
}

/// In-process runtime that records deployments without running anything.
#[derive(Debug, Default)]
pub struct LocalRuntime {
    deployments: DashMap<String, LocalDeployment>,
    installed: Mutex<HashSet<String>>,
}

impl LocalRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deployment(&self, id: &str) -> Option<LocalDeployment> {
        self.deployments.get(id).map(|d| d.clone())
    }

    pub fn deployment_count(&self) -> usize {
        self.deployments.len()
    }

    pub fn is_installed(&self, module: &str) -> bool {
        self.installed
            .lock()
            .map(|set| set.contains(module))
            .unwrap_or(false)
    }

    fn record(&self, deployment: LocalDeployment) -> Result<String, DeployError> {
        if deployment.descriptor.trim().is_empty() {
            return Err(DeployError::EmptyDescriptor(deployment.kind.as_str()));
        }
        let id = Uuid::new_v4().to_string();
        info!(
            id = %id,
            kind = deployment.kind.as_str(),
            descriptor = %deployment.descriptor,
            instances = deployment.instances,
            "deployed"
        );
        self.deployments.insert(id.clone(), deployment);
        Ok(id)
    }

    fn remove(&self, id: &str, expected: UnitKind) -> Result<(), DeployError> {
        match self.deployments.get(id).map(|d| d.kind) {
            None => return Err(DeployError::UnknownDeployment(id.to_owned())),
            Some(kind) if kind != expected => {
                return Err(DeployError::KindMismatch {
                    id: id.to_owned(),
                    expected: expected.as_str(),
                })
            }
            Some(_) => {}
        }
        self.deployments.remove(id);
        info!(id, "undeployed");
        Ok(())
    }
}

#[async_trait]
impl DeploymentRuntime for LocalRuntime {
    async fn deploy_module(
        &self,
        module: &str,
        config: Value,
        instances: u64,
    ) -> Result<String, DeployError> {
        self.record(LocalDeployment {
            kind: UnitKind::Module,
            descriptor: module.to_owned(),
            config,
            instances,
            worker: false,
            multi_threaded: false,
        })
    }

    async fn deploy_verticle(
        &self,
        main: &str,
        config: Value,
        instances: u64,
    ) -> Result<String, DeployError> {
        self.record(LocalDeployment {
            kind: UnitKind::Verticle,
            descriptor: main.to_owned(),
            config,
            instances,
            worker: false,
            multi_threaded: false,
        })
    }

    async fn deploy_worker_verticle(
        &self,
        main: &str,
        config: Value,
        instances: u64,
        multi_threaded: bool,
    ) -> Result<String, DeployError> {
        self.record(LocalDeployment {
            kind: UnitKind::Verticle,
            descriptor: main.to_owned(),
            config,
            instances,
            worker: true,
            multi_threaded,
        })
    }

    async fn undeploy_module(&self, id: &str) -> Result<(), DeployError> {
        self.remove(id, UnitKind::Module)
    }

    async fn undeploy_verticle(&self, id: &str) -> Result<(), DeployError> {
        self.remove(id, UnitKind::Verticle)
    }

    async fn install_module(&self, module: &str) -> Result<(), DeployError> {
        if module.trim().is_empty() {
            return Err(DeployError::EmptyDescriptor("module"));
        }
        let mut installed = self
            .installed
            .lock()
            .map_err(|_| DeployError::Failed("module registry poisoned".into()))?;
        installed.insert(module.to_owned());
        Ok(())
    }

    async fn uninstall_module(&self, module: &str) -> Result<(), DeployError> {
        let mut installed = self
            .installed
            .lock()
            .map_err(|_| DeployError::Failed("module registry poisoned".into()))?;
        if installed.remove(module) {
            Ok(())
        } else {
            Err(DeployError::NotInstalled(module.to_owned()))
        }
    }
}
