//! Client facade for one group member.

use std::fmt;
use std::hash::{Hash, Hasher};

use herd_core::NODE_PONG;
use herd_protocol::{Envelope, Status};
use serde_json::Value;

use crate::client::Endpoint;
use crate::completion::Completion;
use crate::error::ClusterError;

/// A member address (`<cluster>.<group>.<node>`) and the requests a
/// node agent answers there.
#[derive(Debug, Clone)]
pub struct Node {
    endpoint: Endpoint,
}

impl Node {
    pub(crate) fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    pub fn address(&self) -> &str {
        self.endpoint.address()
    }

    /// Succeeds when a node agent answers at this address.
    pub async fn ping(&self) -> Result<(), ClusterError> {
        let reply = self.endpoint.request(Envelope::new("ping")).await?;
        match (reply.status, reply.result) {
            (Status::Pong, Some(Value::String(s))) if s == NODE_PONG => Ok(()),
            _ => Err(ClusterError::UnexpectedReply(format!(
                "{} did not answer as a node",
                self.address()
            ))),
        }
    }

    pub fn install_module(&self, module: impl Into<String>) -> Completion<()> {
        self.module_request("install", module.into())
    }

    pub fn uninstall_module(&self, module: impl Into<String>) -> Completion<()> {
        self.module_request("uninstall", module.into())
    }

    fn module_request(&self, action: &str, module: String) -> Completion<()> {
        let endpoint = self.endpoint.clone();
        let env = Envelope::new(action).module(module);
        Completion::spawn(async move { endpoint.call_unit(env).await })
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.address())
    }
}
