//! Generic registry: every write runs defaulting, then the strategy's prepare
//! hooks, validation and canonicalization, before reaching the store. Reads and
//! watches return stored objects verbatim.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::Resource;
use mcs_core::{ErrorList, FieldError, ObjectKey, Path};
use mcs_schema::{DefaultingConfig, SetDefaults};
use mcs_store::{ObjectStore, StoreError, WatchEvent};
use mcs_strategy::RestStrategy;
use metrics::{counter, histogram};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// Re-admissions of one unconditional update before its conflict is surfaced.
const MAX_UNCONDITIONAL_ATTEMPTS: usize = 8;

pub struct Registry<S: RestStrategy> {
    strategy: S,
    store: Arc<dyn ObjectStore<S::Object>>,
    defaults: DefaultingConfig,
}

fn key_of(meta: &ObjectMeta) -> ObjectKey {
    ObjectKey {
        namespace: meta.namespace.clone().filter(|ns| !ns.is_empty()),
        name: meta.name.clone().unwrap_or_default(),
    }
}

impl<S: RestStrategy> Registry<S> {
    pub fn new(strategy: S, store: Arc<dyn ObjectStore<S::Object>>, defaults: DefaultingConfig) -> Self {
        Self { strategy, store, defaults }
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    fn kind(&self) -> String {
        self.strategy.kind()
    }

    /// Reconcile the request namespace with the object's own.
    fn resolve_namespace(&self, request_ns: Option<&str>, meta: &mut ObjectMeta) -> ApiResult<()> {
        let request_ns = request_ns.filter(|ns| !ns.is_empty());
        let object_ns = meta.namespace.as_deref().filter(|ns| !ns.is_empty());
        if !self.strategy.namespace_scoped() {
            if request_ns.is_some() || object_ns.is_some() {
                return Err(ApiError::BadRequest(format!("{} is cluster scoped; namespace must be empty", self.kind())));
            }
            return Ok(());
        }
        let ns = match (request_ns, object_ns) {
            (Some(r), Some(o)) if r != o => {
                return Err(ApiError::BadRequest(format!(
                    "the namespace of the object ({}) does not match the namespace of the request ({})",
                    o, r
                )))
            }
            (Some(r), _) => r.to_string(),
            (None, Some(o)) => o.to_string(),
            (None, None) => {
                return Err(ApiError::BadRequest(format!("{} is namespace scoped; a namespace is required", self.kind())))
            }
        };
        meta.namespace = Some(ns);
        Ok(())
    }

    fn invalid(&self, obj: &S::Object, errors: ErrorList) -> ApiError {
        counter!("admission_invalid_total", 1u64, "kind" => self.kind());
        let name = obj.meta().name.clone().or_else(|| obj.meta().generate_name.clone()).unwrap_or_default();
        debug!(kind = %self.kind(), name = %name, errors = %errors, "rejected by validation");
        ApiError::Invalid { kind: self.kind(), name, errors }
    }

    fn store_err(&self, err: StoreError) -> ApiError {
        let err = ApiError::from_store(&self.kind(), err);
        if err.is_conflict() {
            counter!("admission_conflict_total", 1u64, "kind" => self.kind());
        }
        err
    }

    pub fn create(&self, namespace: Option<&str>, mut obj: S::Object) -> ApiResult<S::Object> {
        let started = Instant::now();
        obj.set_defaults(&self.defaults);
        self.create_defaulted(namespace, obj, started)
    }

    fn create_defaulted(&self, namespace: Option<&str>, mut obj: S::Object, started: Instant) -> ApiResult<S::Object> {
        self.resolve_namespace(namespace, obj.meta_mut())?;
        {
            let meta = obj.meta_mut();
            let needs_name = meta.name.as_deref().map_or(true, str::is_empty);
            if let Some(base) = meta.generate_name.clone().filter(|b| !b.is_empty() && needs_name) {
                meta.name = Some(self.strategy.generate_name(&base));
            }
        }
        self.strategy.prepare_for_create(&mut obj);
        {
            let meta = obj.meta_mut();
            meta.uid = Some(Uuid::new_v4().to_string());
            meta.creation_timestamp = Some(Time(Utc::now()));
            meta.resource_version = None;
        }
        let errs = self.strategy.validate(&obj);
        if !errs.is_empty() {
            return Err(self.invalid(&obj, errs));
        }
        self.strategy.canonicalize(&mut obj);

        let key = key_of(obj.meta());
        let created = self.store.create(&key, obj).map_err(|e| self.store_err(e))?;
        counter!("admission_create_total", 1u64, "kind" => self.kind());
        histogram!("admission_latency_ms", started.elapsed().as_secs_f64() * 1000.0, "op" => "create");
        info!(
            kind = %self.kind(),
            namespace = key.namespace.as_deref().unwrap_or(""),
            name = %key.name,
            generation = created.meta().generation.unwrap_or(0),
            resource_version = created.meta().resource_version.as_deref().unwrap_or(""),
            "created"
        );
        Ok(created)
    }

    /// Replace the stored object. A non-empty `metadata.resourceVersion` is a
    /// precondition; an empty one writes unconditionally when the strategy allows it.
    ///
    /// Either way the commit is conditioned on the version the generation was
    /// computed from. An unconditional update that loses that race is re-read and
    /// re-admitted; a conditional one surfaces the conflict.
    pub fn update(&self, namespace: Option<&str>, mut obj: S::Object) -> ApiResult<S::Object> {
        let started = Instant::now();
        obj.set_defaults(&self.defaults);
        self.resolve_namespace(namespace, obj.meta_mut())?;
        let key = key_of(obj.meta());
        let requested = obj.meta().resource_version.clone().filter(|rv| !rv.is_empty());

        let mut attempt = 0;
        loop {
            let Some(old) = self.store.get(&key) else {
                if self.strategy.allow_create_on_update() {
                    debug!(kind = %self.kind(), key = %key, "update of missing object creates it");
                    return self.create_defaulted(namespace, obj, started);
                }
                return Err(ApiError::NotFound { kind: self.kind(), key });
            };

            if requested.is_none() && !self.strategy.allow_unconditional_update() {
                let errs = ErrorList::from(vec![FieldError::invalid(
                    Path::new("metadata").child("resourceVersion"),
                    "",
                    "must be specified for an update",
                )]);
                return Err(self.invalid(&obj, errs));
            }

            let current = old.meta().resource_version.clone().unwrap_or_default();
            if let Some(rv) = requested.as_deref().filter(|rv| *rv != current) {
                warn!(kind = %self.kind(), key = %key, precondition = rv, current = %current, "update conflict");
                return Err(self.store_err(StoreError::Conflict {
                    key,
                    expected: rv.to_string(),
                    actual: current,
                }));
            }

            let mut next = obj.clone();
            self.strategy.prepare_for_update(&mut next, &old);
            let errs = self.strategy.validate_update(&next, &old);
            if !errs.is_empty() {
                return Err(self.invalid(&next, errs));
            }
            self.strategy.canonicalize(&mut next);

            match self.store.update(&key, next, Some(current.as_str())) {
                Ok(updated) => {
                    counter!("admission_update_total", 1u64, "kind" => self.kind());
                    histogram!("admission_latency_ms", started.elapsed().as_secs_f64() * 1000.0, "op" => "update");
                    info!(
                        kind = %self.kind(),
                        namespace = key.namespace.as_deref().unwrap_or(""),
                        name = %key.name,
                        generation = updated.meta().generation.unwrap_or(0),
                        resource_version = updated.meta().resource_version.as_deref().unwrap_or(""),
                        "updated"
                    );
                    return Ok(updated);
                }
                Err(StoreError::Conflict { .. }) if requested.is_none() && attempt + 1 < MAX_UNCONDITIONAL_ATTEMPTS => {
                    attempt += 1;
                    debug!(kind = %self.kind(), key = %key, attempt, read = %current, "stored object moved during update; re-reading");
                }
                Err(e) => {
                    let err = self.store_err(e);
                    if err.is_conflict() {
                        warn!(kind = %self.kind(), key = %key, precondition = %current, "update conflict");
                    }
                    return Err(err);
                }
            }
        }
    }

    pub fn get(&self, namespace: &str, name: &str) -> ApiResult<S::Object> {
        let key = ObjectKey::namespaced(namespace, name);
        self.store.get(&key).ok_or_else(|| ApiError::NotFound { kind: self.kind(), key })
    }

    pub fn list(&self, namespace: Option<&str>) -> Vec<S::Object> {
        self.store.list(namespace)
    }

    pub fn delete(&self, namespace: &str, name: &str, precondition: Option<&str>) -> ApiResult<S::Object> {
        let key = ObjectKey::namespaced(namespace, name);
        let removed = self.store.delete(&key, precondition).map_err(|e| self.store_err(e))?;
        info!(kind = %self.kind(), namespace = %namespace, name = %name, "deleted");
        Ok(removed)
    }

    pub fn watch(&self) -> broadcast::Receiver<WatchEvent<S::Object>> {
        self.store.watch()
    }
}
