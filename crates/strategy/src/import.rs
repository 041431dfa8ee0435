use mcs_core::{ErrorList, ServiceImport};
use mcs_schema::validation::{validate_service_import_create, validate_service_import_update};

use crate::generation::{preserve_system_fields, update_generation};
use crate::names::{NameGenerator, SimpleNameGenerator};
use crate::RestStrategy;

/// Create/update policy for `ServiceImport`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceImportStrategy {
    names: SimpleNameGenerator,
}

impl ServiceImportStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RestStrategy for ServiceImportStrategy {
    type Object = ServiceImport;

    fn namespace_scoped(&self) -> bool {
        true
    }

    fn prepare_for_create(&self, obj: &mut ServiceImport) {
        obj.metadata.generation = Some(1);
        obj.status = None;
    }

    fn prepare_for_update(&self, new: &mut ServiceImport, old: &ServiceImport) {
        if new.status.as_ref().is_some_and(|s| s.is_empty()) {
            new.status = None;
        }
        preserve_system_fields(new, old);
        update_generation(new, old);
    }

    fn validate(&self, obj: &ServiceImport) -> ErrorList {
        validate_service_import_create(obj)
    }

    fn validate_update(&self, new: &ServiceImport, old: &ServiceImport) -> ErrorList {
        validate_service_import_update(new, old)
    }

    fn allow_create_on_update(&self) -> bool {
        false
    }

    fn allow_unconditional_update(&self) -> bool {
        true
    }

    fn generate_name(&self, base: &str) -> String {
        self.names.generate_name(base)
    }
}
