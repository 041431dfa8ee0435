//! Keyed view over merge-keyed sequences.
//!
//! On the wire `conditions`, `clusters` and `ports` are arrays; every mutation
//! goes through these helpers so that an entry is only ever created, replaced or
//! removed by its key and the other entries keep their value and position.

use std::fmt;
use std::hash::Hash;

use k8s_openapi::api::core::v1::ServicePort;
use rustc_hash::FxHashSet;

use crate::types::{ClusterStatus, ServiceExportCondition};

/// Protocol assumed for a port that does not name one.
pub const DEFAULT_PROTOCOL: &str = "TCP";

/// Logical identity of an entry within a merge-keyed collection.
pub trait MergeKey {
    type Key: Eq + Hash + Clone + fmt::Debug;

    fn merge_key(&self) -> Self::Key;
}

impl MergeKey for ServiceExportCondition {
    type Key = String;

    fn merge_key(&self) -> String {
        self.type_.clone()
    }
}

impl MergeKey for ClusterStatus {
    type Key = String;

    fn merge_key(&self) -> String {
        self.cluster.clone()
    }
}

impl MergeKey for ServicePort {
    type Key = (i32, String);

    fn merge_key(&self) -> (i32, String) {
        let proto = self
            .protocol
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PROTOCOL);
        (self.port, proto.to_string())
    }
}

pub fn position<T: MergeKey>(items: &[T], key: &T::Key) -> Option<usize> {
    items.iter().position(|it| &it.merge_key() == key)
}

pub fn find<'a, T: MergeKey>(items: &'a [T], key: &T::Key) -> Option<&'a T> {
    position(items, key).map(|i| &items[i])
}

/// Replace the entry sharing `entry`'s key in place, or append it. Returns the replaced entry.
pub fn upsert<T: MergeKey>(items: &mut Vec<T>, entry: T) -> Option<T> {
    match position(items, &entry.merge_key()) {
        Some(i) => Some(std::mem::replace(&mut items[i], entry)),
        None => {
            items.push(entry);
            None
        }
    }
}

/// Remove the entry for `key`, preserving the order of the rest.
pub fn remove<T: MergeKey>(items: &mut Vec<T>, key: &T::Key) -> Option<T> {
    position(items, key).map(|i| items.remove(i))
}

/// Indices of entries whose key already appeared earlier in the sequence.
pub fn duplicate_keys<T: MergeKey>(items: &[T]) -> Vec<usize> {
    let mut seen: FxHashSet<T::Key> = FxHashSet::default();
    let mut out = Vec::new();
    for (i, it) in items.iter().enumerate() {
        if !seen.insert(it.merge_key()) {
            out.push(i);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConditionStatus;

    fn cond(t: &str, s: ConditionStatus) -> ServiceExportCondition {
        ServiceExportCondition::new(t, s)
    }

    #[test]
    fn upsert_replaces_in_place_and_appends() {
        let mut v = vec![cond("Initialized", ConditionStatus::True), cond("Exported", ConditionStatus::False)];
        let old = upsert(&mut v, cond("Initialized", ConditionStatus::False));
        assert_eq!(old.map(|c| c.status), Some(ConditionStatus::True));
        assert_eq!(v[0].status, ConditionStatus::False);
        assert_eq!(v[1].type_, "Exported");

        assert!(upsert(&mut v, cond("Headless", ConditionStatus::Unknown)).is_none());
        assert_eq!(v.len(), 3);
        assert_eq!(v[2].type_, "Headless");
    }

    #[test]
    fn remove_keeps_order_of_others() {
        let mut v = vec![ClusterStatus::new("a"), ClusterStatus::new("b"), ClusterStatus::new("c")];
        assert!(remove(&mut v, &"b".to_string()).is_some());
        assert!(remove(&mut v, &"zz".to_string()).is_none());
        let names: Vec<_> = v.iter().map(|c| c.cluster.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn port_key_treats_missing_protocol_as_tcp() {
        let a = ServicePort { port: 80, ..Default::default() };
        let b = ServicePort { port: 80, protocol: Some("TCP".into()), ..Default::default() };
        let c = ServicePort { port: 80, protocol: Some("UDP".into()), ..Default::default() };
        assert_eq!(a.merge_key(), b.merge_key());
        assert_eq!(duplicate_keys(&[a, b, c]), vec![1]);
    }
}
