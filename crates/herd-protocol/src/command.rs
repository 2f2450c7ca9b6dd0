//! Command parsing from request envelopes.
//!
//! Converts a raw [`Envelope`] into a typed [`Command`] enum. This
//! validates the action, the entity type and every required field up
//! front, so the coordinator can dispatch on an exhaustive match and
//! never observes a half-formed request.
//!
//! Validation order is fixed: action, then type, then name, then the
//! action-specific fields. The first failure wins.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::envelope::Envelope;
use crate::error::{Field, ProtocolError};

/// The kinds of cluster-namespaced data the coordinator serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Key,
    Counter,
    MultiMap,
    Map,
    List,
    Set,
    Queue,
    Lock,
}

impl DataKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DataKind::Key => "key",
            DataKind::Counter => "counter",
            DataKind::MultiMap => "multimap",
            DataKind::Map => "map",
            DataKind::List => "list",
            DataKind::Set => "set",
            DataKind::Queue => "queue",
            DataKind::Lock => "lock",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "key" => DataKind::Key,
            "counter" => DataKind::Counter,
            "multimap" => DataKind::MultiMap,
            "map" => DataKind::Map,
            "list" => DataKind::List,
            "set" => DataKind::Set,
            "queue" => DataKind::Queue,
            "lock" => DataKind::Lock,
            _ => return None,
        })
    }
}

/// What a `find`, `list` or `select` is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Group,
    Node,
}

impl Target {
    fn parse(kind: Option<&str>) -> Result<Self, ProtocolError> {
        match kind {
            None => Err(ProtocolError::MissingType),
            Some("group") => Ok(Target::Group),
            Some("node") => Ok(Target::Node),
            Some(other) => Err(ProtocolError::InvalidType(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Does `<cluster>.<group>` exist?
    Group { group: String },
    /// Which group hosts `<groupAddress>.<node>`? Optionally scoped.
    Node { node: String, group: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    Groups,
    Nodes { group: Option<String> },
}

/// A sticky selection request.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub target: Target,
    pub key: Value,
    /// Restricts node selection to one group's members.
    pub group: Option<String>,
}

/// Which kind of work unit a deploy or undeploy names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Module,
    Verticle,
}

impl UnitKind {
    pub fn as_str(self) -> &'static str {
        match self {
            UnitKind::Module => "module",
            UnitKind::Verticle => "verticle",
        }
    }

    fn parse(kind: Option<&str>) -> Result<Self, ProtocolError> {
        match kind {
            None => Err(ProtocolError::MissingDeploymentType),
            Some("module") => Ok(UnitKind::Module),
            Some("verticle") => Ok(UnitKind::Verticle),
            Some(other) => Err(ProtocolError::InvalidDeploymentType(other.to_owned())),
        }
    }
}

/// The descriptor of a work unit to deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit {
    Module {
        module: String,
    },
    Verticle {
        main: String,
        worker: bool,
        multi_threaded: bool,
    },
}

impl Unit {
    pub fn kind(&self) -> UnitKind {
        match self {
            Unit::Module { .. } => UnitKind::Module,
            Unit::Verticle { .. } => UnitKind::Verticle,
        }
    }

    /// The module name or verticle main.
    pub fn descriptor(&self) -> &str {
        match self {
            Unit::Module { module } => module,
            Unit::Verticle { main, .. } => main,
        }
    }
}

/// A fully-defaulted deploy request.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployRequest {
    pub unit: Unit,
    /// Always a JSON object; `{}` when the request carried none.
    pub config: Value,
    /// At least 1.
    pub instances: u64,
    pub group: Option<String>,
}

impl DeployRequest {
    /// Re-encodes the request as a wire envelope, used as the body of
    /// the deployment record.
    pub fn to_envelope(&self) -> Envelope {
        let env = Envelope::new("deploy")
            .kind(self.unit.kind().as_str())
            .config(self.config.clone())
            .instances(self.instances)
            .maybe_group(self.group.as_deref());
        match &self.unit {
            Unit::Module { module } => env.module(module.clone()),
            Unit::Verticle {
                main,
                worker,
                multi_threaded,
            } => env
                .main(main.clone())
                .worker(*worker)
                .multi_threaded(*multi_threaded),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeyOp {
    Get,
    Set { value: Value },
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterOp {
    Get,
    Increment,
    Decrement,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MultiMapOp {
    Put { key: Value, value: Value },
    Get { key: Value },
    /// Removes every value under `key` and returns them.
    RemoveAll { key: Value },
    /// Removes one association, returning whether it existed.
    Remove { key: Value, value: Value },
    ContainsKey { key: Value },
    ContainsValue { value: Value },
    ContainsEntry { key: Value, value: Value },
    Keys,
    Values,
    IsEmpty,
    Clear,
    Size,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapOp {
    Put { key: Value, value: Value },
    Get { key: Value },
    Remove { key: Value },
    ContainsKey { key: Value },
    Keys,
    Values,
    IsEmpty,
    Clear,
    Size,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListOp {
    Add { value: Value },
    Get { index: i64 },
    RemoveAt { index: i64 },
    Remove { value: Value },
    Contains { value: Value },
    Size,
    IsEmpty,
    Clear,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetOp {
    Add { value: Value },
    Remove { value: Value },
    Contains { value: Value },
    Size,
    IsEmpty,
    Clear,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueueOp {
    Add { value: Value },
    Offer { value: Value },
    /// Removes one occurrence of `value`.
    Remove { value: Value },
    /// Removes and returns the head; fails when empty.
    RemoveHead,
    Contains { value: Value },
    IsEmpty,
    Size,
    Clear,
    /// Returns the head; fails when empty.
    Element,
    /// Removes and returns the head, or nothing.
    Poll,
    /// Returns the head, or nothing.
    Peek,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOp {
    Acquire { owner: String },
    Release { owner: String },
}

/// An operation on one named piece of cluster data.
#[derive(Debug, Clone, PartialEq)]
pub enum DataOp {
    Key(KeyOp),
    Counter(CounterOp),
    MultiMap(MultiMapOp),
    Map(MapOp),
    List(ListOp),
    Set(SetOp),
    Queue(QueueOp),
    Lock(LockOp),
}

impl DataOp {
    pub fn kind(&self) -> DataKind {
        match self {
            DataOp::Key(_) => DataKind::Key,
            DataOp::Counter(_) => DataKind::Counter,
            DataOp::MultiMap(_) => DataKind::MultiMap,
            DataOp::Map(_) => DataKind::Map,
            DataOp::List(_) => DataKind::List,
            DataOp::Set(_) => DataKind::Set,
            DataOp::Queue(_) => DataKind::Queue,
            DataOp::Lock(_) => DataKind::Lock,
        }
    }
}

/// A parsed, validated coordinator request.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Liveness probe, optionally asserting that a group exists.
    Ping { group: Option<String> },
    Find(Lookup),
    List(Listing),
    Select(Selection),
    /// Adds `<cluster>.<group>.<node>` to a group.
    Join { group: String, node: String },
    Deploy(DeployRequest),
    Undeploy { unit: UnitKind, id: String },
    /// Is a deployment with this id registered?
    Check { id: String },
    Data { name: String, op: DataOp },
}

impl Command {
    /// Parses a request envelope into a command.
    pub fn from_envelope(env: Envelope) -> Result<Command, ProtocolError> {
        let Envelope {
            action,
            kind,
            name,
            key,
            value,
            instances,
            config,
            worker,
            multi_threaded,
            id,
            group,
            module,
            main,
            index,
            node,
        } = env;

        let action = action.ok_or(ProtocolError::MissingAction)?;
        let mut fields = Fields {
            key,
            value,
            index,
            id,
        };

        match action.as_str() {
            "ping" => Ok(Command::Ping { group }),
            "find" => match Target::parse(kind.as_deref())? {
                Target::Group => Ok(Command::Find(Lookup::Group {
                    group: required(group, Field::Group)?,
                })),
                Target::Node => Ok(Command::Find(Lookup::Node {
                    node: required(node, Field::Node)?,
                    group,
                })),
            },
            "list" => match Target::parse(kind.as_deref())? {
                Target::Group => Ok(Command::List(Listing::Groups)),
                Target::Node => Ok(Command::List(Listing::Nodes { group })),
            },
            "select" => {
                let target = Target::parse(kind.as_deref())?;
                let key = fields.key()?;
                let group = match target {
                    Target::Group => None,
                    Target::Node => group,
                };
                Ok(Command::Select(Selection { target, key, group }))
            }
            "join" => {
                if let Some(kind) = kind.filter(|k| k != "node") {
                    return Err(ProtocolError::InvalidType(kind));
                }
                Ok(Command::Join {
                    group: required(group, Field::Group)?,
                    node: required(node, Field::Node)?,
                })
            }
            "deploy" => {
                let unit = match UnitKind::parse(kind.as_deref())? {
                    UnitKind::Module => Unit::Module {
                        module: required(module, Field::Module)?,
                    },
                    UnitKind::Verticle => Unit::Verticle {
                        main: required(main, Field::Main)?,
                        worker: worker.unwrap_or(false),
                        multi_threaded: multi_threaded.unwrap_or(false),
                    },
                };
                let instances = match instances {
                    None => 1,
                    Some(0) => return Err(ProtocolError::InvalidInstances(0)),
                    Some(n) => n,
                };
                let config = match config {
                    None => Value::Object(Map::new()),
                    Some(c @ Value::Object(_)) => c,
                    Some(other) => {
                        return Err(ProtocolError::Malformed(format!(
                            "config must be an object, got {other}"
                        )))
                    }
                };
                Ok(Command::Deploy(DeployRequest {
                    unit,
                    config,
                    instances,
                    group,
                }))
            }
            "undeploy" => {
                let unit = UnitKind::parse(kind.as_deref())?;
                Ok(Command::Undeploy {
                    unit,
                    id: fields.id(Field::Id)?,
                })
            }
            "check" => Ok(Command::Check {
                id: fields.id(Field::Id)?,
            }),
            _ => {
                let kind = kind.ok_or(ProtocolError::MissingDataType)?;
                let kind =
                    DataKind::parse(&kind).ok_or_else(|| ProtocolError::InvalidDataType(kind))?;
                let name = required(name, Field::Name)?;
                let op = parse_data_op(kind, &action, &mut fields)?;
                Ok(Command::Data { name, op })
            }
        }
    }
}

/// The payload fields a data operation may draw on.
struct Fields {
    key: Option<Value>,
    value: Option<Value>,
    index: Option<i64>,
    id: Option<String>,
}

impl Fields {
    fn key(&mut self) -> Result<Value, ProtocolError> {
        present(self.key.take()).ok_or(ProtocolError::MissingField(Field::Key))
    }

    fn value(&mut self) -> Result<Value, ProtocolError> {
        present(self.value.take()).ok_or(ProtocolError::MissingField(Field::Value))
    }

    fn index(&mut self) -> Result<i64, ProtocolError> {
        self.index
            .take()
            .ok_or(ProtocolError::MissingField(Field::Index))
    }

    fn id(&mut self, field: Field) -> Result<String, ProtocolError> {
        required(self.id.take(), field)
    }
}

fn present(v: Option<Value>) -> Option<Value> {
    v.filter(|v| !v.is_null())
}

fn required(v: Option<String>, field: Field) -> Result<String, ProtocolError> {
    v.filter(|s| !s.is_empty())
        .ok_or(ProtocolError::MissingField(field))
}

fn parse_data_op(kind: DataKind, action: &str, f: &mut Fields) -> Result<DataOp, ProtocolError> {
    let invalid = || ProtocolError::InvalidAction(action.to_owned());
    let op = match kind {
        DataKind::Key => DataOp::Key(match action {
            "get" => KeyOp::Get,
            "set" => KeyOp::Set { value: f.value()? },
            "delete" => KeyOp::Delete,
            _ => return Err(invalid()),
        }),
        DataKind::Counter => DataOp::Counter(match action {
            "get" => CounterOp::Get,
            "increment" => CounterOp::Increment,
            "decrement" => CounterOp::Decrement,
            _ => return Err(invalid()),
        }),
        DataKind::MultiMap => DataOp::MultiMap(match action {
            "put" => MultiMapOp::Put {
                key: f.key()?,
                value: f.value()?,
            },
            "get" => MultiMapOp::Get { key: f.key()? },
            "remove" => {
                let key = f.key()?;
                // an explicit null is a value to remove, not a missing one
                match f.value.take() {
                    Some(value) => MultiMapOp::Remove { key, value },
                    None => MultiMapOp::RemoveAll { key },
                }
            }
            "contains" => match (present(f.key.take()), present(f.value.take())) {
                (Some(key), Some(value)) => MultiMapOp::ContainsEntry { key, value },
                (Some(key), None) => MultiMapOp::ContainsKey { key },
                (None, Some(value)) => MultiMapOp::ContainsValue { value },
                (None, None) => return Err(ProtocolError::MissingKeyOrValue),
            },
            "keys" => MultiMapOp::Keys,
            "values" => MultiMapOp::Values,
            "empty" => MultiMapOp::IsEmpty,
            "clear" => MultiMapOp::Clear,
            "size" => MultiMapOp::Size,
            _ => return Err(invalid()),
        }),
        DataKind::Map => DataOp::Map(match action {
            "put" => MapOp::Put {
                key: f.key()?,
                value: f.value()?,
            },
            "get" => MapOp::Get { key: f.key()? },
            "remove" => MapOp::Remove { key: f.key()? },
            "contains" => MapOp::ContainsKey { key: f.key()? },
            "keys" => MapOp::Keys,
            "values" => MapOp::Values,
            "empty" => MapOp::IsEmpty,
            "clear" => MapOp::Clear,
            "size" => MapOp::Size,
            _ => return Err(invalid()),
        }),
        DataKind::List => DataOp::List(match action {
            "add" => ListOp::Add { value: f.value()? },
            "get" => ListOp::Get { index: f.index()? },
            "remove" => match f.index.take() {
                Some(index) => ListOp::RemoveAt { index },
                None => ListOp::Remove { value: f.value()? },
            },
            "contains" => ListOp::Contains { value: f.value()? },
            "size" => ListOp::Size,
            "empty" => ListOp::IsEmpty,
            "clear" => ListOp::Clear,
            _ => return Err(invalid()),
        }),
        DataKind::Set => DataOp::Set(match action {
            "add" => SetOp::Add { value: f.value()? },
            "remove" => SetOp::Remove { value: f.value()? },
            "contains" => SetOp::Contains { value: f.value()? },
            "size" => SetOp::Size,
            "empty" => SetOp::IsEmpty,
            "clear" => SetOp::Clear,
            _ => return Err(invalid()),
        }),
        DataKind::Queue => DataOp::Queue(match action {
            "add" => QueueOp::Add { value: f.value()? },
            "offer" => QueueOp::Offer { value: f.value()? },
            "remove" => match f.value.take() {
                Some(value) => QueueOp::Remove { value },
                None => QueueOp::RemoveHead,
            },
            "contains" => QueueOp::Contains { value: f.value()? },
            "empty" => QueueOp::IsEmpty,
            "size" => QueueOp::Size,
            "clear" => QueueOp::Clear,
            "element" => QueueOp::Element,
            "poll" => QueueOp::Poll,
            "peek" => QueueOp::Peek,
            _ => return Err(invalid()),
        }),
        DataKind::Lock => DataOp::Lock(match action {
            "acquire" => LockOp::Acquire {
                owner: f.id(Field::Owner)?,
            },
            "release" => LockOp::Release {
                owner: f.id(Field::Owner)?,
            },
            _ => return Err(invalid()),
        }),
    };
    Ok(op)
}
