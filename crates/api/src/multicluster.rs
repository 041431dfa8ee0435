//! The two multicluster registries wired together, plus the read-modify-write
//! helpers reconcilers use to write status back through admission.

use std::sync::Arc;

use chrono::Utc;
use mcs_core::{ClusterStatus, ServiceExport, ServiceExportCondition, ServiceImport};
use mcs_status::{set_condition, ClusterStatusWriter};
use mcs_store::{MemoryStore, ObjectStore, VersionClock};
use mcs_strategy::{ServiceExportStrategy, ServiceImportStrategy};
use serde::Serialize;

use crate::config::AdmissionConfig;
use crate::error::{ApiError, ApiResult};
use crate::registry::Registry;
use crate::retry::{retry_on_conflict, Backoff};
use crate::scheme::{AnyObject, Scheme};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ApplyOutcome {
    Created,
    Updated,
}

pub struct Multicluster {
    pub scheme: Scheme,
    pub exports: Registry<ServiceExportStrategy>,
    pub imports: Registry<ServiceImportStrategy>,
}

impl Multicluster {
    /// Both kinds backed by in-memory stores sharing one resourceVersion clock.
    pub fn in_memory(cfg: &AdmissionConfig) -> Self {
        let clock = VersionClock::new();
        Self::with_stores(
            cfg,
            Arc::new(MemoryStore::<ServiceExport>::with_clock(clock.clone())),
            Arc::new(MemoryStore::<ServiceImport>::with_clock(clock)),
        )
    }

    pub fn with_stores(
        cfg: &AdmissionConfig,
        exports: Arc<dyn ObjectStore<ServiceExport>>,
        imports: Arc<dyn ObjectStore<ServiceImport>>,
    ) -> Self {
        let defaults = cfg.defaulting();
        Self {
            scheme: Scheme::multicluster(),
            exports: Registry::new(ServiceExportStrategy::new(), exports, defaults),
            imports: Registry::new(ServiceImportStrategy::new(), imports, defaults),
        }
    }

    /// Create the object when no object with its key exists, otherwise update it
    /// (unconditionally unless the manifest carries a resourceVersion).
    pub fn apply(&self, obj: AnyObject) -> ApiResult<(AnyObject, ApplyOutcome)> {
        let key = obj.key();
        let namespace = key.namespace.clone();
        let ns = namespace.as_deref();
        let exists = !key.name.is_empty()
            && match &obj {
                AnyObject::ServiceExport(_) => self.exports.get(ns.unwrap_or(""), &key.name).is_ok(),
                AnyObject::ServiceImport(_) => self.imports.get(ns.unwrap_or(""), &key.name).is_ok(),
            };
        match (obj, exists) {
            (AnyObject::ServiceExport(o), false) => Ok((self.exports.create(ns, o)?.into(), ApplyOutcome::Created)),
            (AnyObject::ServiceExport(o), true) => Ok((self.exports.update(ns, o)?.into(), ApplyOutcome::Updated)),
            (AnyObject::ServiceImport(o), false) => Ok((self.imports.create(ns, o)?.into(), ApplyOutcome::Created)),
            (AnyObject::ServiceImport(o), true) => Ok((self.imports.update(ns, o)?.into(), ApplyOutcome::Updated)),
        }
    }

    /// Set one condition on an export, retrying on conflict.
    pub fn set_export_condition(
        &self,
        backoff: Backoff,
        namespace: &str,
        name: &str,
        condition: ServiceExportCondition,
    ) -> ApiResult<ServiceExport> {
        retry_on_conflict(backoff, || {
            let mut exp = self.exports.get(namespace, name)?;
            if !set_condition(exp.conditions_mut(), condition.clone(), Utc::now()) {
                return Ok(exp);
            }
            self.exports.update(Some(namespace), exp)
        })
    }

    /// Publish `writer`'s entry on the import, retrying on conflict.
    pub fn publish_cluster_status(
        &self,
        backoff: Backoff,
        writer: &ClusterStatusWriter,
        namespace: &str,
        name: &str,
        entry: ClusterStatus,
    ) -> ApiResult<ServiceImport> {
        retry_on_conflict(backoff, || {
            let mut imp = self.imports.get(namespace, name)?;
            let changed = writer
                .publish(&mut imp, entry.clone())
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            if !changed {
                return Ok(imp);
            }
            self.imports.update(Some(namespace), imp)
        })
    }

    /// Remove `writer`'s entry from the import, retrying on conflict.
    pub fn retract_cluster_status(
        &self,
        backoff: Backoff,
        writer: &ClusterStatusWriter,
        namespace: &str,
        name: &str,
    ) -> ApiResult<ServiceImport> {
        retry_on_conflict(backoff, || {
            let mut imp = self.imports.get(namespace, name)?;
            if !writer.retract(&mut imp) {
                return Ok(imp);
            }
            self.imports.update(Some(namespace), imp)
        })
    }
}
