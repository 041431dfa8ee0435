//! Admission façade for multicluster resources (in-process).
//!
//! Frontends hand decoded objects to a [`Registry`]; it owns the order in which
//! defaulting, lifecycle strategy, validation and storage happen, and translates
//! failures into [`ApiError`]s.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod multicluster;
pub mod registry;
pub mod retry;
pub mod scheme;

pub use config::{AdmissionConfig, ConfigError, FeatureGates};
pub use error::{ApiError, ApiResult};
pub use multicluster::{ApplyOutcome, Multicluster};
pub use registry::Registry;
pub use retry::{retry_on_conflict, Backoff, DEFAULT_RETRY};
pub use scheme::{AnyObject, RegisteredKind, Scheme};
