use k8s_openapi::api::core::v1::ServicePort;
use mcs_core::{ClusterStatus, ServiceExport, ServiceImport};
use mcs_schema::{DefaultingConfig, SetDefaults};
use mcs_strategy::{RestStrategy, ServiceExportStrategy, ServiceImportStrategy};

/// Run a create followed by an update the way a registry would, returning the
/// object that would be persisted by the update.
fn create_then_update<S: RestStrategy>(s: &S, mut obj: S::Object, edit: impl FnOnce(&mut S::Object)) -> (S::Object, S::Object) {
    let cfg = DefaultingConfig::default();
    obj.set_defaults(&cfg);
    s.prepare_for_create(&mut obj);
    assert!(s.validate(&obj).is_empty(), "create rejected: {}", s.validate(&obj));
    let old = obj.clone();
    let mut new = obj;
    edit(&mut new);
    new.set_defaults(&cfg);
    s.prepare_for_update(&mut new, &old);
    assert!(s.validate_update(&new, &old).is_empty());
    (old, new)
}

#[test]
fn both_kinds_share_the_lifecycle_policy() {
    fn policy<S: RestStrategy>(s: &S) -> (bool, bool, bool) {
        (s.namespace_scoped(), s.allow_create_on_update(), s.allow_unconditional_update())
    }
    assert_eq!(policy(&ServiceExportStrategy::new()), (true, false, true));
    assert_eq!(policy(&ServiceImportStrategy::new()), (true, false, true));
}

#[test]
fn defaulted_resubmission_is_not_a_change() {
    let mut imp = ServiceImport::new("prod", "web");
    imp.spec.ports.push(ServicePort { port: 80, ..Default::default() });
    let (old, new) = create_then_update(&ServiceImportStrategy::new(), imp, |_| {});
    assert_eq!(old.metadata.generation, Some(1));
    assert_eq!(new.metadata.generation, Some(1));
}

#[test]
fn reconciler_status_write_bumps_generation() {
    let (_, new) = create_then_update(&ServiceImportStrategy::new(), ServiceImport::new("prod", "web"), |imp| {
        imp.clusters_mut().push(ClusterStatus::new("east"));
    });
    assert_eq!(new.metadata.generation, Some(2));
}

#[test]
fn annotation_edit_on_export_keeps_generation() {
    let (_, new) = create_then_update(&ServiceExportStrategy::new(), ServiceExport::new("prod", "web"), |exp| {
        exp.metadata.annotations = Some([("note".to_string(), "x".to_string())].into());
    });
    assert_eq!(new.metadata.generation, Some(1));
}

#[test]
fn generated_names_validate() {
    let s = ServiceExportStrategy::new();
    let mut exp = ServiceExport::default();
    exp.metadata.namespace = Some("prod".into());
    exp.metadata.name = Some(s.generate_name("web-"));
    s.prepare_for_create(&mut exp);
    assert!(s.validate(&exp).is_empty());
}
