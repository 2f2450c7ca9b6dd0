//! Node roster and group membership.

use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Who is in which group.
///
/// Groups map a group address (`<cluster>.<group>`) to the member
/// addresses it contains. The roster maps a platform node id to every
/// member address that node hosts, so a leave can be undone precisely.
#[derive(Debug, Default)]
pub struct Membership {
    nodes: HashMap<String, BTreeSet<String>>,
    groups: BTreeMap<String, BTreeSet<String>>,
}

/// A member address removed from a group by a node leaving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub group: String,
    pub address: String,
}

impl Membership {
    /// Adds `address` to `group` on behalf of platform node `node`. The
    /// group is created if needed. Returns false if already a member.
    pub fn join(&mut self, node: &str, group: &str, address: &str) -> bool {
        self.nodes
            .entry(node.to_owned())
            .or_default()
            .insert(address.to_owned());
        self.groups
            .entry(group.to_owned())
            .or_default()
            .insert(address.to_owned())
    }

    /// Removes a node from the roster and each of its addresses from
    /// every group. Groups are kept even when they become empty.
    pub fn leave(&mut self, node: &str) -> Vec<Departure> {
        let Some(addresses) = self.nodes.remove(node) else {
            return Vec::new();
        };
        let mut departures = Vec::new();
        for address in &addresses {
            for (group, members) in self.groups.iter_mut() {
                if members.remove(address) {
                    departures.push(Departure {
                        group: group.clone(),
                        address: address.clone(),
                    });
                }
            }
        }
        departures
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    pub fn contains(&self, group: &str, address: &str) -> bool {
        self.groups
            .get(group)
            .is_some_and(|members| members.contains(address))
    }

    pub fn group_addresses(&self) -> Vec<String> {
        self.groups.keys().cloned().collect()
    }

    pub fn members(&self, group: &str) -> Option<&BTreeSet<String>> {
        self.groups.get(group)
    }

    /// Every member of every group, deduplicated and ordered.
    pub fn all_members(&self) -> BTreeSet<String> {
        self.groups.values().flatten().cloned().collect()
    }

    /// Finds `<groupAddress>.<node>` in the given groups, first match
    /// in address order.
    pub fn find_node<'a>(
        &self,
        node: &str,
        mut groups: impl Iterator<Item = &'a String>,
    ) -> Option<String> {
        groups.find_map(|group| {
            let address = format!("{group}.{node}");
            self.contains(group, &address).then_some(address)
        })
    }

    pub fn groups(&self) -> impl Iterator<Item = &String> {
        self.groups.keys()
    }
}
