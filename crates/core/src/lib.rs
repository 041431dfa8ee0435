//! Multicluster core types: the `ServiceExport` / `ServiceImport` object model,
//! merge-keyed collection helpers and the field-scoped error model shared by
//! defaulting, validation and the lifecycle strategies.

#![forbid(unsafe_code)]

use std::fmt;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

pub mod field;
pub mod keyed;
pub mod types;

pub use field::{ErrorList, FieldError, FieldErrorKind, Path};
pub use keyed::MergeKey;
pub use types::*;

pub mod prelude {
    pub use super::field::{ErrorList, FieldError, FieldErrorKind, Path};
    pub use super::keyed::MergeKey;
    pub use super::types::{
        condition_type, ClusterStatus, ConditionStatus, IpFamily, ServiceExport, ServiceExportCondition,
        ServiceExportStatus, ServiceImport, ServiceImportSpec, ServiceImportStatus, ServiceImportType,
        SessionAffinity,
    };
    pub use super::ObjectKey;
}

/// Namespace + name of an object. Exports and imports are paired by sharing a key;
/// there is no structural reference between the two kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { namespace: Some(namespace.into()), name: name.into() }
    }

    pub fn cluster_scoped(name: impl Into<String>) -> Self {
        Self { namespace: None, name: name.into() }
    }

    /// Key of any object carrying standard metadata. Empty strings are treated as unset.
    pub fn of<K>(obj: &K) -> Self
    where
        K: k8s_openapi::Metadata<Ty = ObjectMeta>,
    {
        let meta = obj.metadata();
        Self {
            namespace: meta.namespace.clone().filter(|ns| !ns.is_empty()),
            name: meta.name.clone().unwrap_or_default(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Name used by data-plane consumers for the merged service. It is deliberately not a
/// valid Service name so it can never collide with a same-named local Service.
pub fn service_import_name(service_name: &str) -> String {
    format!("import:{}", service_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_display_and_pairing() {
        let exp = ServiceExport::new("prod", "web");
        let key = ObjectKey::of(&exp);
        assert_eq!(key.to_string(), "prod/web");
        assert_eq!(exp.import_key(), key);

        let imp = ServiceImport::new("prod", "web");
        assert_eq!(imp.export_key(), key);
        assert_eq!(ObjectKey::cluster_scoped("x").to_string(), "x");
    }

    #[test]
    fn empty_namespace_is_unset() {
        let mut exp = ServiceExport::new("", "web");
        exp.metadata.namespace = Some(String::new());
        assert_eq!(ObjectKey::of(&exp).namespace, None);
    }

    #[test]
    fn import_name_is_prefixed() {
        assert_eq!(service_import_name("web"), "import:web");
    }
}
