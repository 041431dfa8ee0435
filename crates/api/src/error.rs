use mcs_core::{ErrorList, ObjectKey};
use mcs_store::StoreError;
use serde::{Deserialize, Serialize};

/// API errors suitable for transport; `code()` is the HTTP status a server would answer with.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum ApiError {
    #[error("{kind} {name:?} is invalid: {errors}")]
    Invalid { kind: String, name: String, errors: ErrorList },
    #[error("{kind} {key} not found")]
    NotFound { kind: String, key: ObjectKey },
    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: String, key: ObjectKey },
    #[error("operation cannot be fulfilled on {kind} {key}: {message}")]
    Conflict { kind: String, key: ObjectKey, message: String },
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("{verb} is not supported on {kind}")]
    MethodNotSupported { kind: String, verb: String },
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn code(&self) -> u16 {
        match self {
            ApiError::Invalid { .. } => 422,
            ApiError::NotFound { .. } => 404,
            ApiError::AlreadyExists { .. } | ApiError::Conflict { .. } => 409,
            ApiError::BadRequest(_) => 400,
            ApiError::MethodNotSupported { .. } => 405,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            ApiError::Invalid { .. } => "Invalid",
            ApiError::NotFound { .. } => "NotFound",
            ApiError::AlreadyExists { .. } => "AlreadyExists",
            ApiError::Conflict { .. } => "Conflict",
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::MethodNotSupported { .. } => "MethodNotAllowed",
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ApiError::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    pub(crate) fn from_store(kind: &str, err: StoreError) -> Self {
        let kind = kind.to_string();
        match err {
            StoreError::NotFound { key } => ApiError::NotFound { kind, key },
            StoreError::AlreadyExists { key } => ApiError::AlreadyExists { kind, key },
            StoreError::Conflict { key, expected, actual } => ApiError::Conflict {
                kind,
                key,
                message: format!(
                    "the object has been modified (resourceVersion {} is stale, current {}); apply your changes to the latest version and try again",
                    expected, actual
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_reasons() {
        let key = ObjectKey::namespaced("prod", "web");
        let nf = ApiError::NotFound { kind: "ServiceImport".into(), key: key.clone() };
        assert_eq!((nf.code(), nf.reason()), (404, "NotFound"));
        assert_eq!(nf.to_string(), "ServiceImport prod/web not found");
        let inv = ApiError::Invalid { kind: "ServiceImport".into(), name: "web".into(), errors: ErrorList::new() };
        assert_eq!(inv.code(), 422);
        assert_eq!(ApiError::BadRequest("x".into()).code(), 400);
        assert_eq!(ApiError::MethodNotSupported { kind: "ServiceExport".into(), verb: "patch".into() }.code(), 405);
    }

    #[test]
    fn store_conflict_maps_to_conflict() {
        let key = ObjectKey::namespaced("prod", "web");
        let err = ApiError::from_store(
            "ServiceExport",
            StoreError::Conflict { key: key.clone(), expected: "3".into(), actual: "5".into() },
        );
        assert!(err.is_conflict());
        assert_eq!(err.code(), 409);
        assert!(err.to_string().contains("prod/web"));
    }

    #[test]
    fn serializes_for_transport() {
        let err = ApiError::BadRequest("namespace mismatch".into());
        let v = serde_json::to_value(&err).unwrap();
        assert_eq!(v, serde_json::json!({ "BadRequest": "namespace mismatch" }));
    }
}
