//! Status aggregation for multicluster resources.
//!
//! Writers (one reconciler per source cluster, plus operators) never coordinate with
//! each other; they converge because every change is a read-modify-write that only
//! touches the entry it owns:
//!
//! - `ServiceExport.status.conditions` is keyed by `type` ([`conditions`]).
//! - `ServiceImport.status.clusters` is keyed by `cluster` ([`clusters`]).
//! - Disagreements no single writer may resolve are recorded as data, not errors ([`headless`]).

#![forbid(unsafe_code)]

pub mod clusters;
pub mod conditions;
pub mod headless;

pub use clusters::{is_orphaned, merge_port, ClusterStatusWriter, WriterError};
pub use conditions::{find_condition, is_condition_true, remove_condition, set_condition};
pub use headless::{headless_condition, import_type, invalid_service_type_condition, HeadlessObservation};
