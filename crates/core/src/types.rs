//! `multicluster.k8s.io/v1alpha1` resources.
//!
//! Merge-keyed collections (`status.conditions`, `status.clusters`, `spec.ports`)
//! stay ordered sequences on the wire; see [`crate::keyed`] for the keyed view.

use std::fmt;
use std::str::FromStr;

use k8s_openapi::api::core::v1::{ServicePort, SessionAffinityConfig};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ListMeta, ObjectMeta, Time};
use serde::{Deserialize, Serialize};

use crate::ObjectKey;

pub const GROUP: &str = "multicluster.k8s.io";
pub const VERSION: &str = "v1alpha1";
pub const API_VERSION: &str = "multicluster.k8s.io/v1alpha1";

fn default_api_version() -> String {
    API_VERSION.to_string()
}

/// Well-known `ServiceExport` condition types.
pub mod condition_type {
    /// The export has been noticed by a controller and passed its checks.
    pub const INITIALIZED: &str = "Initialized";
    /// The exported service has been synced to all clusters in the supercluster.
    pub const EXPORTED: &str = "Exported";
    /// The exported service has an unexportable type (ExternalName).
    pub const INVALID_SERVICE_TYPE: &str = "InvalidServiceType";
    /// Headlessness of the merged service. Disagreement between clusters is
    /// recorded in the message with `Unknown` status.
    pub const HEADLESS: &str = "Headless";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        }
    }
}

impl From<bool> for ConditionStatus {
    fn from(v: bool) -> Self {
        if v { ConditionStatus::True } else { ConditionStatus::False }
    }
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---- ServiceExport ----

/// Declares that the same-named Service in this namespace should be visible to
/// the other clusters of the supercluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceExport {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "ServiceExport::default_kind")]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ServiceExportStatus>,
}

impl ServiceExport {
    pub const KIND: &'static str = "ServiceExport";

    fn default_kind() -> String {
        Self::KIND.to_string()
    }

    pub fn new(namespace: &str, name: &str) -> Self {
        let mut exp = Self::default();
        exp.metadata.namespace = Some(namespace.to_string());
        exp.metadata.name = Some(name.to_string());
        exp
    }

    /// Key of the `ServiceImport` this export contributes to.
    pub fn import_key(&self) -> ObjectKey {
        ObjectKey::of(self)
    }

    pub fn conditions(&self) -> &[ServiceExportCondition] {
        self.status.as_ref().map(|s| s.conditions.as_slice()).unwrap_or(&[])
    }

    pub fn conditions_mut(&mut self) -> &mut Vec<ServiceExportCondition> {
        &mut self.status.get_or_insert_with(Default::default).conditions
    }
}

impl Default for ServiceExport {
    fn default() -> Self {
        Self { api_version: default_api_version(), kind: Self::default_kind(), metadata: ObjectMeta::default(), status: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceExportStatus {
    /// Keyed by `type`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ServiceExportCondition>,
}

impl ServiceExportStatus {
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceExportCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<Time>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ServiceExportCondition {
    pub fn new(type_: impl Into<String>, status: ConditionStatus) -> Self {
        Self { type_: type_.into(), status, last_transition_time: None, reason: None, message: None }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceExportList {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: ListMeta,
    pub items: Vec<ServiceExport>,
}

// ---- ServiceImport ----

/// The merged, cross-cluster view of an exported service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceImport {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "ServiceImport::default_kind")]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ServiceImportSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ServiceImportStatus>,
}

impl ServiceImport {
    pub const KIND: &'static str = "ServiceImport";

    fn default_kind() -> String {
        Self::KIND.to_string()
    }

    pub fn new(namespace: &str, name: &str) -> Self {
        let mut imp = Self::default();
        imp.metadata.namespace = Some(namespace.to_string());
        imp.metadata.name = Some(name.to_string());
        imp
    }

    /// Key shared by every `ServiceExport` merged into this import.
    pub fn export_key(&self) -> ObjectKey {
        ObjectKey::of(self)
    }

    pub fn clusters(&self) -> &[ClusterStatus] {
        self.status.as_ref().map(|s| s.clusters.as_slice()).unwrap_or(&[])
    }

    pub fn clusters_mut(&mut self) -> &mut Vec<ClusterStatus> {
        &mut self.status.get_or_insert_with(Default::default).clusters
    }
}

impl Default for ServiceImport {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            kind: Self::default_kind(),
            metadata: ObjectMeta::default(),
            spec: ServiceImportSpec::default(),
            status: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceImportSpec {
    /// Keyed by `(port, protocol)`.
    #[serde(default)]
    pub ports: Vec<ServicePort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<ServiceImportType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_family: Option<IpFamily>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceImportType {
    /// Reachable only through the supercluster IP.
    SuperclusterIP,
    /// Backend pods are addressed directly.
    Headless,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IpFamily {
    #[serde(rename = "IPv4")]
    IPv4,
    #[serde(rename = "IPv6")]
    IPv6,
}

impl IpFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            IpFamily::IPv4 => "IPv4",
            IpFamily::IPv6 => "IPv6",
        }
    }
}

impl FromStr for IpFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IPv4" | "ipv4" => Ok(IpFamily::IPv4),
            "IPv6" | "ipv6" => Ok(IpFamily::IPv6),
            other => Err(format!("unknown IP family {:?} (expected IPv4 or IPv6)", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceImportStatus {
    /// Keyed by `cluster`; each source cluster owns exactly its own entry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<ClusterStatus>,
}

impl ServiceImportStatus {
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

/// Service configuration contributed by one source cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    pub cluster: String,
    #[serde(default)]
    pub session_affinity: SessionAffinity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_affinity_config: Option<SessionAffinityConfig>,
}

impl ClusterStatus {
    pub fn new(cluster: impl Into<String>) -> Self {
        Self { cluster: cluster.into(), ..Default::default() }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionAffinity {
    #[default]
    None,
    #[serde(rename = "ClientIP")]
    ClientIP,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceImportList {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: ListMeta,
    pub items: Vec<ServiceImport>,
}

// ---- k8s-openapi resource wiring (gives us kube::Resource for free) ----

impl k8s_openapi::Resource for ServiceExport {
    const API_VERSION: &'static str = API_VERSION;
    const GROUP: &'static str = GROUP;
    const KIND: &'static str = ServiceExport::KIND;
    const VERSION: &'static str = VERSION;
    const URL_PATH_SEGMENT: &'static str = "serviceexports";
    type Scope = k8s_openapi::NamespaceResourceScope;
}

impl k8s_openapi::Metadata for ServiceExport {
    type Ty = ObjectMeta;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

impl k8s_openapi::Resource for ServiceImport {
    const API_VERSION: &'static str = API_VERSION;
    const GROUP: &'static str = GROUP;
    const KIND: &'static str = ServiceImport::KIND;
    const VERSION: &'static str = VERSION;
    const URL_PATH_SEGMENT: &'static str = "serviceimports";
    type Scope = k8s_openapi::NamespaceResourceScope;
}

impl k8s_openapi::Metadata for ServiceImport {
    type Ty = ObjectMeta;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

    #[test]
    fn import_wire_shape() {
        let v = serde_json::json!({
            "apiVersion": "multicluster.k8s.io/v1alpha1",
            "kind": "ServiceImport",
            "metadata": { "name": "web", "namespace": "prod" },
            "spec": {
                "ports": [ { "port": 80, "protocol": "TCP", "targetPort": 8080, "name": "http" } ],
                "ip": "10.42.0.10",
                "type": "SuperclusterIP"
            },
            "status": {
                "clusters": [
                    { "cluster": "east", "sessionAffinity": "ClientIP",
                      "sessionAffinityConfig": { "clientIP": { "timeoutSeconds": 300 } } },
                    { "cluster": "west" }
                ]
            }
        });
        let imp: ServiceImport = serde_json::from_value(v).unwrap();
        assert_eq!(imp.spec.ports[0].target_port, Some(IntOrString::Int(8080)));
        assert_eq!(imp.spec.type_, Some(ServiceImportType::SuperclusterIP));
        assert_eq!(imp.clusters().len(), 2);
        assert_eq!(imp.clusters()[0].session_affinity, SessionAffinity::ClientIP);
        assert_eq!(imp.clusters()[1].session_affinity, SessionAffinity::None);

        let back = serde_json::to_value(&imp).unwrap();
        assert_eq!(back["status"]["clusters"][1]["cluster"], "west");
        assert_eq!(back["spec"]["type"], "SuperclusterIP");
    }

    #[test]
    fn export_condition_wire_shape() {
        let v = serde_json::json!({
            "metadata": { "name": "web", "namespace": "prod" },
            "status": { "conditions": [
                { "type": "Exported", "status": "True", "lastTransitionTime": "2024-01-01T00:00:00Z" },
                { "type": "Headless", "status": "Unknown", "message": "east=true, west=false" }
            ] }
        });
        let exp: ServiceExport = serde_json::from_value(v).unwrap();
        assert_eq!(exp.kind, "ServiceExport");
        assert_eq!(exp.api_version, API_VERSION);
        assert_eq!(exp.conditions()[0].status, ConditionStatus::True);
        assert!(exp.conditions()[0].last_transition_time.is_some());
        assert_eq!(exp.conditions()[1].status, ConditionStatus::Unknown);
    }

    #[test]
    fn bad_condition_status_is_rejected_at_decode() {
        let v = serde_json::json!({ "type": "Exported", "status": "Maybe" });
        assert!(serde_json::from_value::<ServiceExportCondition>(v).is_err());
    }

    #[test]
    fn empty_statuses_serialize_alike() {
        let mut imp = ServiceImport::new("prod", "web");
        imp.clusters_mut().push(ClusterStatus::new("east"));
        imp.clusters_mut().clear();
        let mut exp = ServiceExport::new("prod", "web");
        exp.conditions_mut().clear();
        assert_eq!(serde_json::to_value(&imp).unwrap()["status"], serde_json::json!({}));
        assert_eq!(serde_json::to_value(&exp).unwrap()["status"], serde_json::json!({}));
        assert!(imp.status.as_ref().is_some_and(ServiceImportStatus::is_empty));
    }

    #[test]
    fn ip_family_parses() {
        assert_eq!("IPv6".parse::<IpFamily>().unwrap(), IpFamily::IPv6);
        assert!("v4".parse::<IpFamily>().is_err());
    }
}
