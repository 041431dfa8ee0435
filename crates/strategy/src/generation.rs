//! Generation tracking.
//!
//! `metadata.generation` moves by exactly one whenever anything outside
//! `metadata` changes: spec and status alike, so a status-only write from a
//! reconciler bumps it too. Metadata-only edits (labels, annotations) leave it alone.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::debug;

/// Structural equality of two objects with their metadata cleared. Unset and
/// empty values (`null`, `""`, `[]`, `{}`) compare equal.
pub fn semantic_eq_ignoring_meta<K>(a: &K, b: &K) -> bool
where
    K: Resource + Clone + PartialEq + Serialize,
{
    let mut a = a.clone();
    let mut b = b.clone();
    *a.meta_mut() = ObjectMeta::default();
    *b.meta_mut() = ObjectMeta::default();
    if a == b {
        return true;
    }
    match (serde_json::to_value(&a), serde_json::to_value(&b)) {
        (Ok(a), Ok(b)) => prune_empty(a) == prune_empty(b),
        _ => false,
    }
}

/// Drop empty members from objects, bottom up. Array elements are kept so
/// positions still line up.
pub fn prune_empty(v: Json) -> Json {
    fn is_empty(v: &Json) -> bool {
        match v {
            Json::Null => true,
            Json::String(s) => s.is_empty(),
            Json::Array(a) => a.is_empty(),
            Json::Object(o) => o.is_empty(),
            _ => false,
        }
    }
    match v {
        Json::Object(map) => {
            Json::Object(map.into_iter().map(|(k, v)| (k, prune_empty(v))).filter(|(_, v)| !is_empty(v)).collect())
        }
        Json::Array(items) => Json::Array(items.into_iter().map(prune_empty).collect()),
        other => other,
    }
}

/// Set `new`'s generation from `old`: `old + 1` when they differ outside
/// metadata, `old` unchanged otherwise. Returns whether it was bumped.
pub fn update_generation<K>(new: &mut K, old: &K) -> bool
where
    K: Resource<DynamicType = ()> + Clone + PartialEq + Serialize,
{
    let old_gen = old.meta().generation;
    let changed = !semantic_eq_ignoring_meta(new, old);
    new.meta_mut().generation = if changed { Some(old_gen.unwrap_or(0) + 1) } else { old_gen };
    if changed {
        counter!("generation_bump_total", 1u64, "kind" => K::kind(&()).into_owned());
        if tracing::enabled!(tracing::Level::DEBUG) {
            let summary = match (serde_json::to_value(&*new), serde_json::to_value(old)) {
                (Ok(n), Ok(o)) => diff_summary(&prune_empty(strip_metadata(n)), &prune_empty(strip_metadata(o))),
                _ => DiffSummary::default(),
            };
            debug!(
                kind = %K::kind(&()),
                name = new.meta().name.as_deref().unwrap_or(""),
                generation = new.meta().generation.unwrap_or(0),
                adds = summary.adds,
                updates = summary.updates,
                removes = summary.removes,
                "generation bumped"
            );
        }
    }
    changed
}

/// Copy the fields only the server may set from the stored object.
pub fn preserve_system_fields<K: Resource>(new: &mut K, old: &K) {
    let old_meta = old.meta();
    let meta = new.meta_mut();
    meta.uid = old_meta.uid.clone();
    meta.creation_timestamp = old_meta.creation_timestamp.clone();
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub adds: usize,
    pub updates: usize,
    pub removes: usize,
}

impl DiffSummary {
    pub fn is_empty(&self) -> bool {
        self.adds == 0 && self.updates == 0 && self.removes == 0
    }
}

/// Drop `metadata` from the JSON form of an object.
pub fn strip_metadata(mut v: Json) -> Json {
    if let Some(obj) = v.as_object_mut() {
        obj.remove("metadata");
    }
    v
}

/// Count leaf-level additions, updates and removals going from `base` to `target`.
pub fn diff_summary(target: &Json, base: &Json) -> DiffSummary {
    fn walk(a: &Json, b: &Json, out: &mut DiffSummary) {
        match (a, b) {
            (Json::Object(ao), Json::Object(bo)) => {
                for (k, av) in ao.iter() {
                    match bo.get(k) {
                        Some(bv) if av == bv => {}
                        Some(bv) => walk(av, bv, out),
                        None => out.adds += 1,
                    }
                }
                out.removes += bo.keys().filter(|k| !ao.contains_key(*k)).count();
            }
            (Json::Array(aa), Json::Array(bb)) => {
                let common = aa.len().min(bb.len());
                for i in 0..common {
                    if aa[i] != bb[i] {
                        walk(&aa[i], &bb[i], out);
                    }
                }
                out.adds += aa.len().saturating_sub(bb.len());
                out.removes += bb.len().saturating_sub(aa.len());
            }
            (av, bv) => {
                if av != bv {
                    out.updates += 1;
                }
            }
        }
    }
    let mut out = DiffSummary::default();
    walk(target, base, &mut out);
    out
}
