//! Explicit type registry: which kinds this process serves and how to decode them.

use kube::core::ApiResource;
use kube::Resource;
use mcs_core::{ObjectKey, ServiceExport, ServiceImport};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as Json;

use crate::error::{ApiError, ApiResult};

/// A decoded object of any registered kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnyObject {
    ServiceExport(ServiceExport),
    ServiceImport(ServiceImport),
}

impl AnyObject {
    pub fn kind(&self) -> &'static str {
        match self {
            AnyObject::ServiceExport(_) => ServiceExport::KIND,
            AnyObject::ServiceImport(_) => ServiceImport::KIND,
        }
    }

    pub fn key(&self) -> ObjectKey {
        match self {
            AnyObject::ServiceExport(o) => ObjectKey::of(o),
            AnyObject::ServiceImport(o) => ObjectKey::of(o),
        }
    }

    pub fn generation(&self) -> Option<i64> {
        match self {
            AnyObject::ServiceExport(o) => o.metadata.generation,
            AnyObject::ServiceImport(o) => o.metadata.generation,
        }
    }

    pub fn resource_version(&self) -> Option<&str> {
        match self {
            AnyObject::ServiceExport(o) => o.metadata.resource_version.as_deref(),
            AnyObject::ServiceImport(o) => o.metadata.resource_version.as_deref(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Json> {
        serde_json::to_value(self)
    }
}

impl From<ServiceExport> for AnyObject {
    fn from(o: ServiceExport) -> Self {
        AnyObject::ServiceExport(o)
    }
}

impl From<ServiceImport> for AnyObject {
    fn from(o: ServiceImport) -> Self {
        AnyObject::ServiceImport(o)
    }
}

type DecodeFn = fn(Json) -> serde_json::Result<AnyObject>;

fn decode_as<K>(v: Json) -> serde_json::Result<AnyObject>
where
    K: DeserializeOwned + Into<AnyObject>,
{
    serde_json::from_value::<K>(v).map(Into::into)
}

#[derive(Debug, Clone)]
pub struct RegisteredKind {
    pub resource: ApiResource,
    pub namespaced: bool,
    decode: DecodeFn,
}

#[derive(Debug, Clone, Default)]
pub struct Scheme {
    kinds: Vec<RegisteredKind>,
}

impl Scheme {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheme serving `ServiceExport` and `ServiceImport`.
    pub fn multicluster() -> Self {
        let mut scheme = Self::new();
        scheme.register::<ServiceExport>(true);
        scheme.register::<ServiceImport>(true);
        scheme
    }

    pub fn register<K>(&mut self, namespaced: bool)
    where
        K: Resource<DynamicType = ()> + DeserializeOwned + Into<AnyObject>,
    {
        let resource = ApiResource::erase::<K>(&());
        self.kinds.retain(|k| !(k.resource.api_version == resource.api_version && k.resource.kind == resource.kind));
        self.kinds.push(RegisteredKind { resource, namespaced, decode: decode_as::<K> });
    }

    pub fn kinds(&self) -> impl Iterator<Item = &RegisteredKind> {
        self.kinds.iter()
    }

    pub fn lookup(&self, api_version: &str, kind: &str) -> Option<&RegisteredKind> {
        self.kinds.iter().find(|k| k.resource.api_version == api_version && k.resource.kind == kind)
    }

    /// Decode a manifest value by its `apiVersion` and `kind`.
    pub fn decode(&self, value: Json) -> ApiResult<AnyObject> {
        let field = |name: &str| value.get(name).and_then(Json::as_str).map(str::to_string);
        let api_version = field("apiVersion").ok_or_else(|| ApiError::BadRequest("apiVersion is required".into()))?;
        let kind = field("kind").ok_or_else(|| ApiError::BadRequest("kind is required".into()))?;
        let registered = self
            .lookup(&api_version, &kind)
            .ok_or_else(|| ApiError::BadRequest(format!("no kind {:?} is registered for version {:?}", kind, api_version)))?;
        (registered.decode)(value).map_err(|e| ApiError::BadRequest(format!("decoding {}: {}", kind, e)))
    }
}
