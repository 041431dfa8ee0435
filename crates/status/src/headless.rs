//! Conditions derived from the source Services of every contributing cluster.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Service;
use mcs_core::condition_type::{HEADLESS, INVALID_SERVICE_TYPE};
use mcs_core::{ConditionStatus, ServiceExportCondition, ServiceImportType};

pub const REASON_ALL_HEADLESS: &str = "AllHeadless";
pub const REASON_NONE_HEADLESS: &str = "NoneHeadless";
pub const REASON_CONFLICT: &str = "ConflictingHeadlessness";
pub const REASON_UNSUPPORTED_TYPE: &str = "UnsupportedServiceType";
pub const REASON_SUPPORTED_TYPE: &str = "SupportedServiceType";

/// Whether one cluster's exported Service is headless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessObservation {
    pub cluster: String,
    pub headless: bool,
}

impl HeadlessObservation {
    pub fn new(cluster: impl Into<String>, headless: bool) -> Self {
        Self { cluster: cluster.into(), headless }
    }

    /// A Service is headless when its cluster IP is the literal `None`.
    pub fn from_service(cluster: impl Into<String>, svc: &Service) -> Self {
        let headless = svc
            .spec
            .as_ref()
            .and_then(|s| s.cluster_ip.as_deref())
            .map_or(false, |ip| ip == "None");
        Self::new(cluster, headless)
    }
}

/// One value per cluster, ordered by cluster name; a later observation for the
/// same cluster replaces an earlier one.
fn by_cluster(obs: &[HeadlessObservation]) -> BTreeMap<&str, bool> {
    obs.iter().map(|o| (o.cluster.as_str(), o.headless)).collect()
}

/// `Headless` condition for the merged service, or `None` without observations.
///
/// Clusters that disagree are not resolved here: the condition goes `Unknown` and
/// the message lists every cluster with its value.
pub fn headless_condition(obs: &[HeadlessObservation]) -> Option<ServiceExportCondition> {
    let views = by_cluster(obs);
    if views.is_empty() {
        return None;
    }
    let headless = views.values().filter(|h| **h).count();
    let cond = if headless == views.len() {
        ServiceExportCondition::new(HEADLESS, ConditionStatus::True).with_reason(REASON_ALL_HEADLESS)
    } else if headless == 0 {
        ServiceExportCondition::new(HEADLESS, ConditionStatus::False).with_reason(REASON_NONE_HEADLESS)
    } else {
        let listing: Vec<String> = views.iter().map(|(c, h)| format!("{}={}", c, h)).collect();
        ServiceExportCondition::new(HEADLESS, ConditionStatus::Unknown)
            .with_reason(REASON_CONFLICT)
            .with_message(format!("clusters disagree on headlessness: {}", listing.join(", ")))
    };
    Some(cond)
}

/// Import type agreed by all clusters, `None` while they disagree (or none observed).
pub fn import_type(obs: &[HeadlessObservation]) -> Option<ServiceImportType> {
    let views = by_cluster(obs);
    let mut values = views.values();
    let first = *values.next()?;
    if values.any(|v| *v != first) {
        return None;
    }
    Some(if first { ServiceImportType::Headless } else { ServiceImportType::SuperclusterIP })
}

/// `InvalidServiceType` condition for a Service marked for export.
pub fn invalid_service_type_condition(svc: &Service) -> ServiceExportCondition {
    let svc_type = svc.spec.as_ref().and_then(|s| s.type_.as_deref()).unwrap_or("ClusterIP");
    if svc_type == "ExternalName" {
        ServiceExportCondition::new(INVALID_SERVICE_TYPE, ConditionStatus::True)
            .with_reason(REASON_UNSUPPORTED_TYPE)
            .with_message("ExternalName services cannot be exported")
    } else {
        ServiceExportCondition::new(INVALID_SERVICE_TYPE, ConditionStatus::False).with_reason(REASON_SUPPORTED_TYPE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ServiceSpec;

    fn svc(cluster_ip: Option<&str>, type_: Option<&str>) -> Service {
        Service {
            spec: Some(ServiceSpec {
                cluster_ip: cluster_ip.map(String::from),
                type_: type_.map(String::from),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn agreement() {
        let all = [HeadlessObservation::new("a", true), HeadlessObservation::new("b", true)];
        let c = headless_condition(&all).unwrap();
        assert_eq!(c.status, ConditionStatus::True);
        assert_eq!(import_type(&all), Some(ServiceImportType::Headless));

        let none = [HeadlessObservation::new("a", false)];
        assert_eq!(headless_condition(&none).unwrap().status, ConditionStatus::False);
        assert_eq!(import_type(&none), Some(ServiceImportType::SuperclusterIP));

        assert!(headless_condition(&[]).is_none());
        assert_eq!(import_type(&[]), None);
    }

    #[test]
    fn disagreement_lists_every_cluster_sorted() {
        let obs = [
            HeadlessObservation::new("west", false),
            HeadlessObservation::new("east", true),
            HeadlessObservation::new("north", true),
        ];
        let c = headless_condition(&obs).unwrap();
        assert_eq!(c.status, ConditionStatus::Unknown);
        assert_eq!(c.reason.as_deref(), Some(REASON_CONFLICT));
        assert_eq!(
            c.message.as_deref(),
            Some("clusters disagree on headlessness: east=true, north=true, west=false")
        );
        assert_eq!(import_type(&obs), None);
    }

    #[test]
    fn later_observation_for_same_cluster_wins() {
        let obs = [HeadlessObservation::new("east", false), HeadlessObservation::new("east", true)];
        assert_eq!(headless_condition(&obs).unwrap().status, ConditionStatus::True);
    }

    #[test]
    fn from_service() {
        assert!(HeadlessObservation::from_service("a", &svc(Some("None"), None)).headless);
        assert!(!HeadlessObservation::from_service("a", &svc(Some("10.0.0.1"), None)).headless);
        assert!(!HeadlessObservation::from_service("a", &Service::default()).headless);
    }

    #[test]
    fn external_name_is_invalid() {
        let c = invalid_service_type_condition(&svc(None, Some("ExternalName")));
        assert_eq!(c.type_, INVALID_SERVICE_TYPE);
        assert_eq!(c.status, ConditionStatus::True);
        let ok = invalid_service_type_condition(&svc(Some("10.0.0.1"), Some("ClusterIP")));
        assert_eq!(ok.status, ConditionStatus::False);
    }
}
