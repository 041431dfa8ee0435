//! Validation of `ServiceExport` / `ServiceImport` objects.
//!
//! Update validation currently checks the new object only; the previous
//! version is accepted so immutability rules can be added without changing
//! callers.

use std::net::IpAddr;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use mcs_core::keyed::{self, MergeKey};
use mcs_core::{ErrorList, FieldError, IpFamily, Path, ServiceExport, ServiceImport};

use crate::naming;

/// Upper bound on the summed size of annotation keys and values.
pub const TOTAL_ANNOTATION_SIZE_LIMIT_BYTES: usize = 256 * 1024;

pub const SUPPORTED_PROTOCOLS: &[&str] = &["TCP", "UDP", "SCTP"];

/// Checks a name or prefix; `prefix = true` when validating `generateName`.
pub type ValidateNameFn = fn(&str, bool) -> Vec<String>;

/// Object names for both kinds must be DNS subdomains.
pub const VALIDATE_SERVICE_NAME: ValidateNameFn = naming::name_is_dns_subdomain;

/// Generic metadata rules shared by every kind.
pub fn validate_object_meta(
    meta: &ObjectMeta,
    requires_namespace: bool,
    name_fn: ValidateNameFn,
    path: &Path,
) -> ErrorList {
    let mut errs = ErrorList::new();

    if let Some(gen) = meta.generate_name.as_deref().filter(|g| !g.is_empty()) {
        for msg in name_fn(gen, true) {
            errs.push(FieldError::invalid(path.child("generateName"), gen, msg));
        }
    }
    match meta.name.as_deref().filter(|n| !n.is_empty()) {
        None => errs.push(FieldError::required(path.child("name"), "name or generateName is required")),
        Some(name) => {
            for msg in name_fn(name, false) {
                errs.push(FieldError::invalid(path.child("name"), name, msg));
            }
        }
    }

    let namespace = meta.namespace.as_deref().filter(|ns| !ns.is_empty());
    if requires_namespace {
        match namespace {
            None => errs.push(FieldError::required(path.child("namespace"), "")),
            Some(ns) => {
                for msg in naming::name_is_dns_label(ns, false) {
                    errs.push(FieldError::invalid(path.child("namespace"), ns, msg));
                }
            }
        }
    } else if namespace.is_some() {
        errs.push(FieldError::forbidden(path.child("namespace"), "not allowed on this type"));
    }

    if let Some(gen) = meta.generation {
        if gen < 0 {
            errs.push(FieldError::invalid(path.child("generation"), gen, "must be greater than or equal to 0"));
        }
    }

    errs.append(validate_labels(meta, &path.child("labels")));
    errs.append(validate_annotations(meta, &path.child("annotations")));
    errs.append(validate_owner_references(meta, &path.child("ownerReferences")));
    errs.append(validate_finalizers(meta, &path.child("finalizers")));
    errs
}

fn validate_labels(meta: &ObjectMeta, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    let Some(labels) = meta.labels.as_ref() else { return errs };
    for (k, v) in labels {
        for msg in naming::is_qualified_name(k) {
            errs.push(FieldError::invalid(path.clone(), k.as_str(), msg));
        }
        for msg in naming::is_valid_label_value(v) {
            errs.push(FieldError::invalid(path.key(k), v.as_str(), msg));
        }
    }
    errs
}

fn validate_annotations(meta: &ObjectMeta, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    let Some(annotations) = meta.annotations.as_ref() else { return errs };
    let mut total = 0usize;
    for (k, v) in annotations {
        for msg in naming::is_qualified_name(&k.to_lowercase()) {
            errs.push(FieldError::invalid(path.clone(), k.as_str(), msg));
        }
        total += k.len() + v.len();
    }
    if total > TOTAL_ANNOTATION_SIZE_LIMIT_BYTES {
        errs.push(FieldError::too_long(path.clone(), TOTAL_ANNOTATION_SIZE_LIMIT_BYTES));
    }
    errs
}

fn validate_owner_references(meta: &ObjectMeta, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    let Some(refs) = meta.owner_references.as_ref() else { return errs };
    let mut controllers: Vec<String> = Vec::new();
    for (i, r) in refs.iter().enumerate() {
        let p = path.index(i);
        if r.api_version.is_empty() {
            errs.push(FieldError::invalid(p.child("apiVersion"), r.api_version.as_str(), "version must not be empty"));
        }
        if r.kind.is_empty() {
            errs.push(FieldError::invalid(p.child("kind"), r.kind.as_str(), "kind must not be empty"));
        }
        if r.name.is_empty() {
            errs.push(FieldError::invalid(p.child("name"), r.name.as_str(), "name must not be empty"));
        }
        if r.uid.is_empty() {
            errs.push(FieldError::invalid(p.child("uid"), r.uid.as_str(), "uid must not be empty"));
        }
        if r.controller == Some(true) {
            controllers.push(format!("{}/{}", r.kind, r.name));
        }
    }
    if controllers.len() > 1 {
        errs.push(FieldError::invalid(
            path.clone(),
            controllers.join(", "),
            "Only one reference can have Controller set to true",
        ));
    }
    errs
}

fn validate_finalizers(meta: &ObjectMeta, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    let Some(finalizers) = meta.finalizers.as_ref() else { return errs };
    for (i, f) in finalizers.iter().enumerate() {
        for msg in naming::is_qualified_name(f) {
            errs.push(FieldError::invalid(path.index(i), f.as_str(), msg));
        }
    }
    errs
}

fn validate_unique_keys<T: MergeKey>(items: &[T], path: &Path, key_field: &str) -> ErrorList
where
    T::Key: Into<serde_json::Value>,
{
    keyed::duplicate_keys(items)
        .into_iter()
        .map(|i| FieldError::duplicate(path.index(i).child(key_field), items[i].merge_key()))
        .collect()
}

// ---- ServiceExport ----

pub fn validate_service_export(exp: &ServiceExport) -> ErrorList {
    let mut errs = validate_object_meta(&exp.metadata, true, VALIDATE_SERVICE_NAME, &Path::new("metadata"));
    let conditions = Path::new("status").child("conditions");
    for (i, c) in exp.conditions().iter().enumerate() {
        if c.type_.is_empty() {
            errs.push(FieldError::required(conditions.index(i).child("type"), ""));
        }
    }
    errs.append(validate_unique_keys(exp.conditions(), &conditions, "type"));
    errs
}

pub fn validate_service_export_create(exp: &ServiceExport) -> ErrorList {
    validate_service_export(exp)
}

pub fn validate_service_export_update(new: &ServiceExport, _old: &ServiceExport) -> ErrorList {
    validate_service_export(new)
}

// ---- ServiceImport ----

pub fn validate_service_import(imp: &ServiceImport) -> ErrorList {
    let mut errs = validate_object_meta(&imp.metadata, true, VALIDATE_SERVICE_NAME, &Path::new("metadata"));
    let spec = Path::new("spec");

    let ports = spec.child("ports");
    for (i, p) in imp.spec.ports.iter().enumerate() {
        let pp = ports.index(i);
        if !(1..=65535).contains(&p.port) {
            errs.push(FieldError::invalid(pp.child("port"), p.port, "must be between 1 and 65535, inclusive"));
        }
        match p.protocol.as_deref() {
            None | Some("") => errs.push(FieldError::required(pp.child("protocol"), "")),
            Some(proto) if !SUPPORTED_PROTOCOLS.contains(&proto) => {
                errs.push(FieldError::not_supported(pp.child("protocol"), proto, SUPPORTED_PROTOCOLS));
            }
            Some(_) => {}
        }
        match &p.target_port {
            Some(IntOrString::Int(n)) if !(1..=65535).contains(n) => {
                errs.push(FieldError::invalid(pp.child("targetPort"), *n, "must be between 1 and 65535, inclusive"));
            }
            Some(IntOrString::String(s)) => {
                for msg in naming::is_valid_port_name(s) {
                    errs.push(FieldError::invalid(pp.child("targetPort"), s.as_str(), msg));
                }
            }
            _ => {}
        }
        if let Some(name) = p.name.as_deref().filter(|n| !n.is_empty()) {
            for msg in naming::is_dns1123_label(name) {
                errs.push(FieldError::invalid(pp.child("name"), name, msg));
            }
        }
    }
    for i in keyed::duplicate_keys(&imp.spec.ports) {
        let (port, proto) = imp.spec.ports[i].merge_key();
        errs.push(FieldError::duplicate(ports.index(i), format!("{}/{}", port, proto)));
    }

    if let Some(ip) = imp.spec.ip.as_deref().filter(|ip| !ip.is_empty()) {
        match ip.parse::<IpAddr>() {
            Err(_) => errs.push(FieldError::invalid(spec.child("ip"), ip, "must be a valid IP address")),
            Ok(addr) => {
                let family = if addr.is_ipv4() { IpFamily::IPv4 } else { IpFamily::IPv6 };
                if let Some(want) = imp.spec.ip_family {
                    if want != family {
                        errs.push(FieldError::invalid(
                            spec.child("ip"),
                            ip,
                            format!("does not match spec.ipFamily {}", want.as_str()),
                        ));
                    }
                }
            }
        }
    }

    let clusters = Path::new("status").child("clusters");
    for (i, c) in imp.clusters().iter().enumerate() {
        if c.cluster.is_empty() {
            errs.push(FieldError::required(clusters.index(i).child("cluster"), ""));
        }
    }
    errs.append(validate_unique_keys(imp.clusters(), &clusters, "cluster"));
    errs
}

pub fn validate_service_import_create(imp: &ServiceImport) -> ErrorList {
    validate_service_import(imp)
}

pub fn validate_service_import_update(new: &ServiceImport, _old: &ServiceImport) -> ErrorList {
    validate_service_import(new)
}
