//! Cluster-namespaced collection store.
//!
//! Every collection lives under `<cluster>.<name>`, so two clusters
//! sharing a process never observe each other's data. Single-value keys
//! share the map `<cluster>.keys` and counters the map
//! `<cluster>.counters`.
//!
//! The store is owned by the coordinator task and is never shared, so
//! nothing here is synchronized. Reads of a collection that was never
//! written see it as empty and do not create it.

mod collections;

use std::collections::{HashMap, VecDeque};

use herd_protocol::{
    CounterOp, DataOp, KeyOp, ListOp, LockOp, MapOp, MultiMapOp, QueueOp, SetOp,
};
use serde_json::Value;

use crate::error::StoreError;

pub use collections::{fingerprint, JsonMap, JsonMultiMap, JsonSet};

const KEYS_MAP: &str = "keys";
const COUNTERS_MAP: &str = "counters";

#[derive(Debug)]
pub struct Store {
    cluster: String,
    maps: HashMap<String, JsonMap>,
    multimaps: HashMap<String, JsonMultiMap>,
    lists: HashMap<String, Vec<Value>>,
    sets: HashMap<String, JsonSet>,
    queues: HashMap<String, VecDeque<Value>>,
    /// lock name -> owner
    locks: HashMap<String, String>,
}

impl Store {
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            maps: HashMap::new(),
            multimaps: HashMap::new(),
            lists: HashMap::new(),
            sets: HashMap::new(),
            queues: HashMap::new(),
            locks: HashMap::new(),
        }
    }

    /// The namespaced name of a logical collection.
    pub fn qualify(&self, name: &str) -> String {
        format!("{}.{}", self.cluster, name)
    }

    /// Number of collections that currently exist.
    #[cfg(test)]
    pub fn collection_count(&self) -> usize {
        self.maps.len()
            + self.multimaps.len()
            + self.lists.len()
            + self.sets.len()
            + self.queues.len()
            + self.locks.len()
    }

    /// Applies one operation to the named collection and returns its
    /// result. `Value::Null` means "no result".
    pub fn apply(&mut self, name: &str, op: DataOp) -> Result<Value, StoreError> {
        match op {
            DataOp::Key(op) => Ok(self.key(name, op)),
            DataOp::Counter(op) => self.counter(name, op),
            DataOp::MultiMap(op) => Ok(self.multimap(name, op)),
            DataOp::Map(op) => Ok(self.map(name, op)),
            DataOp::List(op) => self.list(name, op),
            DataOp::Set(op) => Ok(self.set(name, op)),
            DataOp::Queue(op) => self.queue(name, op),
            DataOp::Lock(op) => Ok(self.lock(name, op)),
        }
    }

    fn key(&mut self, name: &str, op: KeyOp) -> Value {
        let map = self.qualify(KEYS_MAP);
        let key = Value::String(name.to_owned());
        match op {
            KeyOp::Get => self
                .maps
                .get(&map)
                .and_then(|m| m.get(&key))
                .cloned()
                .unwrap_or(Value::Null),
            KeyOp::Set { value } => {
                self.maps.entry(map).or_default().insert(key, value);
                Value::Null
            }
            KeyOp::Delete => {
                if let Some(m) = self.maps.get_mut(&map) {
                    m.remove(&key);
                }
                Value::Null
            }
        }
    }

    fn counter(&mut self, name: &str, op: CounterOp) -> Result<Value, StoreError> {
        let map = self.qualify(COUNTERS_MAP);
        let key = Value::String(name.to_owned());
        let current = match self.maps.get(&map).and_then(|m| m.get(&key)) {
            None => 0,
            Some(v) => v
                .as_i64()
                .ok_or_else(|| StoreError::NotACounter(name.to_owned()))?,
        };
        let next = match op {
            CounterOp::Get => return Ok(Value::from(current)),
            CounterOp::Increment => current.wrapping_add(1),
            CounterOp::Decrement => current.wrapping_sub(1),
        };
        self.maps
            .entry(map)
            .or_default()
            .insert(key, Value::from(next));
        Ok(Value::from(next))
    }

    fn multimap(&mut self, name: &str, op: MultiMapOp) -> Value {
        let ns = self.qualify(name);
        let empty = JsonMultiMap::default();
        let read = self.multimaps.get(&ns).unwrap_or(&empty);
        match op {
            MultiMapOp::Get { key } => Value::Array(read.get(&key)),
            MultiMapOp::ContainsKey { key } => Value::Bool(read.contains_key(&key)),
            MultiMapOp::ContainsValue { value } => Value::Bool(read.contains_value(&value)),
            MultiMapOp::ContainsEntry { key, value } => {
                Value::Bool(read.contains_entry(&key, &value))
            }
            MultiMapOp::Keys => Value::Array(read.keys()),
            MultiMapOp::Values => Value::Array(read.values()),
            MultiMapOp::IsEmpty => Value::Bool(read.is_empty()),
            MultiMapOp::Size => Value::from(read.len()),
            MultiMapOp::Put { key, value } => {
                Value::Bool(self.multimaps.entry(ns).or_default().put(key, value))
            }
            MultiMapOp::RemoveAll { key } => {
                let removed = self
                    .multimaps
                    .get_mut(&ns)
                    .map(|mm| mm.remove_all(&key))
                    .unwrap_or_default();
                self.drop_if_empty_multimap(&ns);
                Value::Array(removed)
            }
            MultiMapOp::Remove { key, value } => {
                let removed = self
                    .multimaps
                    .get_mut(&ns)
                    .is_some_and(|mm| mm.remove(&key, &value));
                self.drop_if_empty_multimap(&ns);
                Value::Bool(removed)
            }
            MultiMapOp::Clear => {
                self.multimaps.remove(&ns);
                Value::Null
            }
        }
    }

    fn drop_if_empty_multimap(&mut self, ns: &str) {
        if self.multimaps.get(ns).is_some_and(|mm| mm.is_empty()) {
            self.multimaps.remove(ns);
        }
    }

    fn map(&mut self, name: &str, op: MapOp) -> Value {
        let ns = self.qualify(name);
        let empty = JsonMap::default();
        let read = self.maps.get(&ns).unwrap_or(&empty);
        match op {
            MapOp::Get { key } => read.get(&key).cloned().unwrap_or(Value::Null),
            MapOp::ContainsKey { key } => Value::Bool(read.contains_key(&key)),
            MapOp::Keys => Value::Array(read.keys()),
            MapOp::Values => Value::Array(read.values()),
            MapOp::IsEmpty => Value::Bool(read.is_empty()),
            MapOp::Size => Value::from(read.len()),
            MapOp::Put { key, value } => self
                .maps
                .entry(ns)
                .or_default()
                .insert(key, value)
                .unwrap_or(Value::Null),
            MapOp::Remove { key } => self
                .maps
                .get_mut(&ns)
                .and_then(|m| m.remove(&key))
                .unwrap_or(Value::Null),
            MapOp::Clear => {
                self.maps.remove(&ns);
                Value::Null
            }
        }
    }

    fn list(&mut self, name: &str, op: ListOp) -> Result<Value, StoreError> {
        let ns = self.qualify(name);
        let read: &[Value] = self.lists.get(&ns).map(Vec::as_slice).unwrap_or(&[]);
        let result = match op {
            ListOp::Get { index } => read
                .get(checked_index(index, read.len())?)
                .cloned()
                .unwrap_or(Value::Null),
            ListOp::Contains { value } => Value::Bool(read.contains(&value)),
            ListOp::Size => Value::from(read.len()),
            ListOp::IsEmpty => Value::Bool(read.is_empty()),
            ListOp::Add { value } => {
                self.lists.entry(ns).or_default().push(value);
                Value::Bool(true)
            }
            ListOp::RemoveAt { index } => {
                let len = read.len();
                let idx = checked_index(index, len)?;
                match self.lists.get_mut(&ns) {
                    Some(list) => list.remove(idx),
                    None => return Err(StoreError::IndexOutOfBounds(index)),
                }
            }
            ListOp::Remove { value } => {
                let removed = match self.lists.get_mut(&ns) {
                    Some(list) => match list.iter().position(|v| *v == value) {
                        Some(pos) => {
                            list.remove(pos);
                            true
                        }
                        None => false,
                    },
                    None => false,
                };
                Value::Bool(removed)
            }
            ListOp::Clear => {
                self.lists.remove(&ns);
                Value::Null
            }
        };
        Ok(result)
    }

    fn set(&mut self, name: &str, op: SetOp) -> Value {
        let ns = self.qualify(name);
        let empty = JsonSet::default();
        let read = self.sets.get(&ns).unwrap_or(&empty);
        match op {
            SetOp::Contains { value } => Value::Bool(read.contains(&value)),
            SetOp::Size => Value::from(read.len()),
            SetOp::IsEmpty => Value::Bool(read.is_empty()),
            SetOp::Add { value } => Value::Bool(self.sets.entry(ns).or_default().insert(value)),
            SetOp::Remove { value } => {
                Value::Bool(self.sets.get_mut(&ns).is_some_and(|s| s.remove(&value)))
            }
            SetOp::Clear => {
                self.sets.remove(&ns);
                Value::Null
            }
        }
    }

    fn queue(&mut self, name: &str, op: QueueOp) -> Result<Value, StoreError> {
        let ns = self.qualify(name);
        let result = match op {
            QueueOp::Add { value } | QueueOp::Offer { value } => {
                self.queues.entry(ns).or_default().push_back(value);
                Value::Bool(true)
            }
            QueueOp::Remove { value } => {
                let removed = self.queues.get_mut(&ns).is_some_and(|q| {
                    match q.iter().position(|v| *v == value) {
                        Some(pos) => q.remove(pos).is_some(),
                        None => false,
                    }
                });
                Value::Bool(removed)
            }
            QueueOp::RemoveHead => self
                .queues
                .get_mut(&ns)
                .and_then(VecDeque::pop_front)
                .ok_or(StoreError::NoSuchElement)?,
            QueueOp::Poll => self
                .queues
                .get_mut(&ns)
                .and_then(VecDeque::pop_front)
                .unwrap_or(Value::Null),
            QueueOp::Element => self
                .queues
                .get(&ns)
                .and_then(VecDeque::front)
                .cloned()
                .ok_or(StoreError::NoSuchElement)?,
            QueueOp::Peek => self
                .queues
                .get(&ns)
                .and_then(VecDeque::front)
                .cloned()
                .unwrap_or(Value::Null),
            QueueOp::Contains { value } => {
                Value::Bool(self.queues.get(&ns).is_some_and(|q| q.contains(&value)))
            }
            QueueOp::IsEmpty => Value::Bool(self.queues.get(&ns).map_or(true, VecDeque::is_empty)),
            QueueOp::Size => Value::from(self.queues.get(&ns).map_or(0, VecDeque::len)),
            QueueOp::Clear => {
                self.queues.remove(&ns);
                Value::Null
            }
        };
        Ok(result)
    }

    fn lock(&mut self, name: &str, op: LockOp) -> Value {
        let ns = self.qualify(name);
        match op {
            LockOp::Acquire { owner } => match self.locks.get(&ns) {
                Some(holder) => Value::Bool(*holder == owner),
                None => {
                    self.locks.insert(ns, owner);
                    Value::Bool(true)
                }
            },
            LockOp::Release { owner } => {
                let held = self.locks.get(&ns).is_some_and(|holder| *holder == owner);
                if held {
                    self.locks.remove(&ns);
                }
                Value::Bool(held)
            }
        }
    }
}

fn checked_index(index: i64, len: usize) -> Result<usize, StoreError> {
    usize::try_from(index)
        .ok()
        .filter(|&i| i < len)
        .ok_or(StoreError::IndexOutOfBounds(index))
}
