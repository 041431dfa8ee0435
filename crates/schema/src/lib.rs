//! Defaulting and validation for multicluster resources.
//!
//! Both pipelines are pure: defaulting fills unset fields and never fails,
//! validation returns the complete [`ErrorList`](mcs_core::ErrorList) in one pass.
//! Defaulting must run first.

#![forbid(unsafe_code)]

pub mod defaults;
pub mod naming;
pub mod validation;

pub use defaults::{DefaultingConfig, SetDefaults};
pub use validation::{
    validate_object_meta, validate_service_export, validate_service_export_create, validate_service_export_update,
    validate_service_import, validate_service_import_create, validate_service_import_update,
};
