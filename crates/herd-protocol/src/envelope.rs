//! Request and reply envelopes.
//!
//! Field names are the wire contract and must not change: `action`,
//! `type`, `name`, `key`, `value`, `instances`, `config`, `worker`,
//! `multi-threaded`, `id`, `group`, `module`, `main`, `index`, `node`
//! on requests and `status`, `message`, `result`, `id` on replies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::DataKind;
use crate::error::ProtocolError;

/// A request envelope. Every field is optional on the wire; which ones
/// are required depends on the action and is enforced by
/// [`Command::from_envelope`](crate::Command::from_envelope).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// An explicit JSON null decodes as `Some(Value::Null)`.
    #[serde(
        default,
        deserialize_with = "explicit",
        skip_serializing_if = "Option::is_none"
    )]
    pub key: Option<Value>,
    #[serde(
        default,
        deserialize_with = "explicit",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instances: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<bool>,
    #[serde(
        rename = "multi-threaded",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub multi_threaded: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
}

/// Keeps a present field present even when it is null, so callers can
/// tell `"value": null` from a missing `value`.
fn explicit<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Envelope {
    /// Starts an envelope for the given action.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            ..Self::default()
        }
    }

    /// Starts a data-type envelope: `action`, `type` and `name` set.
    pub fn data(kind: DataKind, action: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(action).kind(kind.as_str()).name(name)
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn key(mut self, key: Value) -> Self {
        self.key = Some(key);
        self
    }

    pub fn value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn instances(mut self, instances: u64) -> Self {
        self.instances = Some(instances);
        self
    }

    pub fn config(mut self, config: Value) -> Self {
        self.config = Some(config);
        self
    }

    pub fn worker(mut self, worker: bool) -> Self {
        self.worker = Some(worker);
        self
    }

    pub fn multi_threaded(mut self, multi_threaded: bool) -> Self {
        self.multi_threaded = Some(multi_threaded);
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Sets `group` only when a scope is given.
    pub fn maybe_group(mut self, group: Option<&str>) -> Self {
        self.group = group.map(str::to_owned);
        self
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn main(mut self, main: impl Into<String>) -> Self {
        self.main = Some(main.into());
        self
    }

    pub fn index(mut self, index: i64) -> Self {
        self.index = Some(index);
        self
    }

    pub fn node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    /// Encodes the envelope as a JSON body for the transport.
    pub fn to_value(&self) -> Value {
        // serializing a struct of options and JSON values cannot fail
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Decodes a transport body into an envelope.
    pub fn from_value(body: Value) -> Result<Self, ProtocolError> {
        serde_json::from_value(body).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

/// Reply status. Exactly one per reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
    Pong,
}

/// A reply envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Reply {
    /// `ok` with no result.
    pub fn ok() -> Self {
        Self {
            status: Status::Ok,
            message: None,
            result: None,
            id: None,
        }
    }

    /// `ok` carrying a result. A JSON null result is left off the wire.
    pub fn ok_with(result: impl Into<Value>) -> Self {
        let result = result.into();
        Self {
            result: (!result.is_null()).then_some(result),
            ..Self::ok()
        }
    }

    /// `ok` carrying a deployment id.
    pub fn ok_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::ok()
        }
    }

    pub fn pong(result: impl Into<Value>) -> Self {
        Self {
            status: Status::Pong,
            result: Some(result.into()),
            ..Self::ok()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: Some(message.into()),
            result: None,
            id: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn from_value(body: Value) -> Result<Self, ProtocolError> {
        serde_json::from_value(body).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

impl From<ProtocolError> for Reply {
    fn from(err: ProtocolError) -> Self {
        Reply::error(err.to_string())
    }
}
