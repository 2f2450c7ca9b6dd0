//! JSON-keyed collection types.
//!
//! `serde_json::Value` is neither `Hash` nor `Ord`, so entries are keyed
//! by a fingerprint: the compact JSON encoding of the value. Without the
//! `preserve_order` feature object keys serialize sorted, which makes the
//! encoding canonical for equal values.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

/// Canonical identity of a JSON value.
pub fn fingerprint(value: &Value) -> String {
    value.to_string()
}

/// A map from JSON keys to JSON values. Iteration follows key order.
#[derive(Debug, Default, Clone)]
pub struct JsonMap {
    entries: BTreeMap<String, (Value, Value)>,
}

impl JsonMap {
    /// Inserts, returning the previous value.
    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        self.entries
            .insert(fingerprint(&key), (key, value))
            .map(|(_, old)| old)
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.get(&fingerprint(key)).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        self.entries.remove(&fingerprint(key)).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.entries.contains_key(&fingerprint(key))
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries.values().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.values().map(|(_, v)| v.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// A set of JSON values, iterated in insertion order.
#[derive(Debug, Default, Clone)]
pub struct JsonSet {
    order: Vec<String>,
    members: HashMap<String, Value>,
}

impl JsonSet {
    /// Adds a value. Returns false if it was already present.
    pub fn insert(&mut self, value: Value) -> bool {
        let fp = fingerprint(&value);
        if self.members.contains_key(&fp) {
            return false;
        }
        self.order.push(fp.clone());
        self.members.insert(fp, value);
        true
    }

    pub fn remove(&mut self, value: &Value) -> bool {
        let fp = fingerprint(value);
        if self.members.remove(&fp).is_none() {
            return false;
        }
        self.order.retain(|f| *f != fp);
        true
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.members.contains_key(&fingerprint(value))
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.order
            .iter()
            .filter_map(|fp| self.members.get(fp).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }
}

/// A multimap with set semantics per key: the same association is
/// never stored twice. `len` counts associations, not keys.
#[derive(Debug, Default, Clone)]
pub struct JsonMultiMap {
    entries: BTreeMap<String, (Value, JsonSet)>,
    len: usize,
}

impl JsonMultiMap {
    /// Adds an association. Returns false if it already existed.
    pub fn put(&mut self, key: Value, value: Value) -> bool {
        let (_, values) = self
            .entries
            .entry(fingerprint(&key))
            .or_insert_with(|| (key, JsonSet::default()));
        let added = values.insert(value);
        if added {
            self.len += 1;
        }
        added
    }

    /// All values under `key`, empty when absent.
    pub fn get(&self, key: &Value) -> Vec<Value> {
        self.entries
            .get(&fingerprint(key))
            .map(|(_, values)| values.to_vec())
            .unwrap_or_default()
    }

    /// Removes and returns every value under `key`.
    pub fn remove_all(&mut self, key: &Value) -> Vec<Value> {
        match self.entries.remove(&fingerprint(key)) {
            Some((_, values)) => {
                self.len -= values.len();
                values.to_vec()
            }
            None => Vec::new(),
        }
    }

    /// Removes one association. Returns whether it existed.
    pub fn remove(&mut self, key: &Value, value: &Value) -> bool {
        let fp = fingerprint(key);
        let Some((_, values)) = self.entries.get_mut(&fp) else {
            return false;
        };
        if !values.remove(value) {
            return false;
        }
        self.len -= 1;
        if values.is_empty() {
            self.entries.remove(&fp);
        }
        true
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.entries.contains_key(&fingerprint(key))
    }

    pub fn contains_value(&self, value: &Value) -> bool {
        self.entries.values().any(|(_, values)| values.contains(value))
    }

    pub fn contains_entry(&self, key: &Value, value: &Value) -> bool {
        self.entries
            .get(&fingerprint(key))
            .is_some_and(|(_, values)| values.contains(value))
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries.values().map(|(k, _)| k.clone()).collect()
    }

    /// Every value of every association, key by key.
    pub fn values(&self) -> Vec<Value> {
        self.entries
            .values()
            .flat_map(|(_, values)| values.to_vec())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fingerprint_ignores_object_key_order() {
        let a: Value = serde_json::from_str(r#"{"b":1,"a":2}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a":2,"b":1}"#).unwrap();
        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert_ne!(fingerprint(&json!("1")), fingerprint(&json!(1)));
    }

    #[test]
    fn map_returns_previous() {
        let mut m = JsonMap::default();
        assert_eq!(m.insert(json!("a"), json!(1)), None);
        assert_eq!(m.insert(json!("a"), json!(2)), Some(json!(1)));
        assert_eq!(m.get(&json!("a")), Some(&json!(2)));
        assert_eq!(m.len(), 1);
        assert_eq!(m.remove(&json!("a")), Some(json!(2)));
        assert!(m.is_empty());
    }

    #[test]
    fn set_keeps_insertion_order() {
        let mut s = JsonSet::default();
        assert!(s.insert(json!("z")));
        assert!(s.insert(json!("a")));
        assert!(!s.insert(json!("z")));
        assert_eq!(s.to_vec(), vec![json!("z"), json!("a")]);
        assert!(s.remove(&json!("z")));
        assert!(!s.remove(&json!("z")));
        assert_eq!(s.to_vec(), vec![json!("a")]);
    }

    #[test]
    fn multimap_counts_associations() {
        let mut mm = JsonMultiMap::default();
        assert!(mm.put(json!("k"), json!(1)));
        assert!(mm.put(json!("k"), json!(2)));
        assert!(!mm.put(json!("k"), json!(2)));
        assert!(mm.put(json!("j"), json!(1)));
        assert_eq!(mm.len(), 3);
        assert_eq!(mm.keys().len(), 2);

        assert!(mm.contains_entry(&json!("k"), &json!(2)));
        assert!(mm.contains_value(&json!(1)));
        assert!(!mm.contains_key(&json!("x")));
    }

    #[test]
    fn multimap_remove_forms() {
        let mut mm = JsonMultiMap::default();
        mm.put(json!("k"), json!(1));
        mm.put(json!("k"), json!(2));

        assert!(mm.remove(&json!("k"), &json!(1)));
        assert!(!mm.remove(&json!("k"), &json!(1)));
        assert_eq!(mm.get(&json!("k")), vec![json!(2)]);

        assert_eq!(mm.remove_all(&json!("k")), vec![json!(2)]);
        assert!(mm.is_empty());
        assert!(!mm.contains_key(&json!("k")));
    }

    #[test]
    fn multimap_drops_empty_keys() {
        let mut mm = JsonMultiMap::default();
        mm.put(json!("k"), json!(1));
        mm.remove(&json!("k"), &json!(1));
        assert!(mm.keys().is_empty());
    }
}
