//! `ServiceImport.status.clusters`, keyed by `cluster`, and `spec.ports`, keyed by
//! `(port, protocol)`.

use k8s_openapi::api::core::v1::ServicePort;
use mcs_core::keyed;
use mcs_core::{ClusterStatus, ServiceImport};
use tracing::debug;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WriterError {
    #[error("writer for cluster {writer:?} may not write the entry of cluster {entry:?}")]
    ForeignKey { writer: String, entry: String },
}

/// The only handle a source cluster's reconciler uses to touch `status.clusters`.
/// It can create, replace or remove exactly one key: its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterStatusWriter {
    cluster: String,
}

impl ClusterStatusWriter {
    pub fn new(cluster: impl Into<String>) -> Self {
        Self { cluster: cluster.into() }
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// Replace this cluster's entry wholesale, or add it. Returns whether the import changed.
    pub fn publish(&self, import: &mut ServiceImport, entry: ClusterStatus) -> Result<bool, WriterError> {
        if entry.cluster != self.cluster {
            return Err(WriterError::ForeignKey { writer: self.cluster.clone(), entry: entry.cluster });
        }
        if keyed::find(import.clusters(), &self.cluster) == Some(&entry) {
            return Ok(false);
        }
        keyed::upsert(import.clusters_mut(), entry);
        debug!(cluster = %self.cluster, import = %import.export_key(), "cluster status published");
        Ok(true)
    }

    /// Remove this cluster's entry when it stops exporting. Returns whether an entry was removed.
    pub fn retract(&self, import: &mut ServiceImport) -> bool {
        let Some(status) = import.status.as_mut() else { return false };
        let removed = keyed::remove(&mut status.clusters, &self.cluster).is_some();
        if removed {
            debug!(cluster = %self.cluster, import = %import.export_key(), "cluster status retracted");
        }
        removed
    }

    pub fn current<'a>(&self, import: &'a ServiceImport) -> Option<&'a ClusterStatus> {
        keyed::find(import.clusters(), &self.cluster)
    }
}

/// An import with no contributing cluster left is due for deletion by its owner.
pub fn is_orphaned(import: &ServiceImport) -> bool {
    import.clusters().is_empty()
}

/// Keyed upsert of a port by `(port, protocol)`; two clusters exposing the same
/// pair end up as a single entry.
pub fn merge_port(ports: &mut Vec<ServicePort>, port: ServicePort) -> bool {
    use mcs_core::MergeKey;
    if keyed::find(ports, &port.merge_key()) == Some(&port) {
        return false;
    }
    keyed::upsert(ports, port);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcs_core::SessionAffinity;

    #[test]
    fn foreign_entry_is_rejected() {
        let mut imp = ServiceImport::new("prod", "web");
        let err = ClusterStatusWriter::new("east").publish(&mut imp, ClusterStatus::new("west")).unwrap_err();
        assert_eq!(err, WriterError::ForeignKey { writer: "east".into(), entry: "west".into() });
        assert!(imp.clusters().is_empty());
    }

    #[test]
    fn publish_is_idempotent() {
        let mut imp = ServiceImport::new("prod", "web");
        let east = ClusterStatusWriter::new("east");
        let entry = ClusterStatus { session_affinity: SessionAffinity::ClientIP, ..ClusterStatus::new("east") };
        assert!(east.publish(&mut imp, entry.clone()).unwrap());
        assert!(!east.publish(&mut imp, entry.clone()).unwrap());
        assert_eq!(east.current(&imp), Some(&entry));
    }

    #[test]
    fn retract_without_status_is_noop() {
        let mut imp = ServiceImport::new("prod", "web");
        assert!(!ClusterStatusWriter::new("east").retract(&mut imp));
        assert!(is_orphaned(&imp));
    }

    #[test]
    fn ports_merge_by_port_and_protocol() {
        let mut ports = Vec::new();
        assert!(merge_port(&mut ports, ServicePort { port: 80, protocol: Some("TCP".into()), ..Default::default() }));
        assert!(merge_port(&mut ports, ServicePort { port: 80, protocol: Some("UDP".into()), ..Default::default() }));
        assert!(merge_port(
            &mut ports,
            ServicePort { port: 80, protocol: Some("TCP".into()), name: Some("http".into()), ..Default::default() }
        ));
        assert!(!merge_port(
            &mut ports,
            ServicePort { port: 80, protocol: Some("TCP".into()), name: Some("http".into()), ..Default::default() }
        ));
        assert_eq!(ports.len(), 2);
        assert_eq!(ports[0].name.as_deref(), Some("http"));
    }
}
