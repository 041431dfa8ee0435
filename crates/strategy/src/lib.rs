//! Lifecycle strategies: the per-kind policy the registry applies around every
//! create and update (scope, name generation, generation bumps, server-managed
//! fields, update admission rules).

#![forbid(unsafe_code)]

use kube::Resource;
use mcs_core::ErrorList;
use mcs_schema::SetDefaults;
use serde::Serialize;

pub mod export;
pub mod generation;
pub mod import;
pub mod names;

pub use export::ServiceExportStrategy;
pub use generation::{diff_summary, strip_metadata, DiffSummary};
pub use import::ServiceImportStrategy;
pub use names::{NameGenerator, SimpleNameGenerator};

/// Policy for one resource kind. Implementations are stateless apart from their
/// name generator and are shared by every request.
pub trait RestStrategy: Send + Sync {
    type Object: Resource<DynamicType = ()>
        + SetDefaults
        + Clone
        + PartialEq
        + Serialize
        + std::fmt::Debug
        + Send
        + Sync
        + 'static;

    fn kind(&self) -> String {
        Self::Object::kind(&()).into_owned()
    }

    /// Namespaced kinds reject writes that carry no namespace.
    fn namespace_scoped(&self) -> bool;

    /// Runs before validation on create; server-managed fields are reset here.
    fn prepare_for_create(&self, obj: &mut Self::Object);

    /// Runs before validation on update; `new` is what will be persisted.
    fn prepare_for_update(&self, new: &mut Self::Object, old: &Self::Object);

    fn validate(&self, obj: &Self::Object) -> ErrorList;

    fn validate_update(&self, new: &Self::Object, old: &Self::Object) -> ErrorList;

    /// Normalizes the representation after validation.
    fn canonicalize(&self, _obj: &mut Self::Object) {}

    /// Whether an update addressed to a missing object may create it.
    fn allow_create_on_update(&self) -> bool;

    /// Whether an update may omit `metadata.resourceVersion`.
    fn allow_unconditional_update(&self) -> bool;

    /// Name for an object created with only `metadata.generateName`.
    fn generate_name(&self, base: &str) -> String;
}
