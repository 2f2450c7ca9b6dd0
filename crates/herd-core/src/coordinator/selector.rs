//! Sticky key-based selection.
//!
//! The first selection for a key is a uniform random pick among the
//! current candidates; every later selection for that key returns the
//! cached target, even if the target has since left. Entries are never
//! evicted.

use std::collections::HashMap;

use rand::seq::IndexedRandom;
use serde_json::Value;

use crate::store::fingerprint;

#[derive(Debug, Default)]
pub struct Selectors {
    groups: HashMap<String, String>,
    /// keyed by (scope group, key fingerprint)
    nodes: HashMap<(Option<String>, String), String>,
}

impl Selectors {
    pub fn select_group(&mut self, key: &Value, candidates: &[String]) -> Option<String> {
        pick(&mut self.groups, fingerprint(key), candidates)
    }

    pub fn select_node(
        &mut self,
        key: &Value,
        scope: Option<&str>,
        candidates: &[String],
    ) -> Option<String> {
        let cache_key = (scope.map(str::to_owned), fingerprint(key));
        pick(&mut self.nodes, cache_key, candidates)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.groups.len() + self.nodes.len()
    }
}

fn pick<K: std::hash::Hash + Eq>(
    cache: &mut HashMap<K, String>,
    key: K,
    candidates: &[String],
) -> Option<String> {
    if let Some(target) = cache.get(&key) {
        return Some(target.clone());
    }
    let target = candidates.choose(&mut rand::rng())?.clone();
    cache.insert(key, target.clone());
    Some(target)
}
