use mcs_core::{ErrorList, ServiceExport};
use mcs_schema::validation::{validate_service_export_create, validate_service_export_update};

use crate::generation::{preserve_system_fields, update_generation};
use crate::names::{NameGenerator, SimpleNameGenerator};
use crate::RestStrategy;

/// Create/update policy for `ServiceExport`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceExportStrategy {
    names: SimpleNameGenerator,
}

impl ServiceExportStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RestStrategy for ServiceExportStrategy {
    type Object = ServiceExport;

    fn namespace_scoped(&self) -> bool {
        true
    }

    fn prepare_for_create(&self, obj: &mut ServiceExport) {
        obj.metadata.generation = Some(1);
        obj.status = None;
    }

    fn prepare_for_update(&self, new: &mut ServiceExport, old: &ServiceExport) {
        if new.status.as_ref().is_some_and(|s| s.is_empty()) {
            new.status = None;
        }
        preserve_system_fields(new, old);
        update_generation(new, old);
    }

    fn validate(&self, obj: &ServiceExport) -> ErrorList {
        validate_service_export_create(obj)
    }

    fn validate_update(&self, new: &ServiceExport, old: &ServiceExport) -> ErrorList {
        validate_service_export_update(new, old)
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
