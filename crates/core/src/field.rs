//! Field-scoped validation errors.
//!
//! Validation never stops at the first problem: callers collect every
//! [`FieldError`] into an [`ErrorList`] and surface the whole list at once.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Segment {
    Field(String),
    Index(usize),
    Key(String),
}

/// Path to a field, rendered as `status.conditions[1].type` or `metadata.labels[app]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    segments: SmallVec<[Segment; 6]>,
}

impl Path {
    pub fn new(root: &str) -> Self {
        let mut segments = SmallVec::new();
        segments.push(Segment::Field(root.to_string()));
        Self { segments }
    }

    pub fn child(&self, name: &str) -> Self {
        let mut p = self.clone();
        p.segments.push(Segment::Field(name.to_string()));
        p
    }

    pub fn index(&self, i: usize) -> Self {
        let mut p = self.clone();
        p.segments.push(Segment::Index(i));
        p
    }

    pub fn key(&self, k: &str) -> Self {
        let mut p = self.clone();
        p.segments.push(Segment::Key(k.to_string()));
        p
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            match seg {
                Segment::Field(name) => {
                    if i > 0 { f.write_str(".")?; }
                    f.write_str(name)?;
                }
                Segment::Index(n) => write!(f, "[{}]", n)?,
                Segment::Key(k) => write!(f, "[{}]", k)?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldErrorKind {
    Required,
    Invalid,
    Duplicate,
    NotSupported,
    TooLong,
    Forbidden,
}

impl FieldErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldErrorKind::Required => "Required value",
            FieldErrorKind::Invalid => "Invalid value",
            FieldErrorKind::Duplicate => "Duplicate value",
            FieldErrorKind::NotSupported => "Unsupported value",
            FieldErrorKind::TooLong => "Too long",
            FieldErrorKind::Forbidden => "Forbidden",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub kind: FieldErrorKind,
    pub field: Path,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bad_value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
}

impl FieldError {
    pub fn required(field: Path, detail: impl Into<String>) -> Self {
        Self { kind: FieldErrorKind::Required, field, bad_value: None, detail: detail.into() }
    }

    pub fn invalid(field: Path, value: impl Into<serde_json::Value>, detail: impl Into<String>) -> Self {
        Self { kind: FieldErrorKind::Invalid, field, bad_value: Some(value.into()), detail: detail.into() }
    }

    pub fn duplicate(field: Path, value: impl Into<serde_json::Value>) -> Self {
        Self { kind: FieldErrorKind::Duplicate, field, bad_value: Some(value.into()), detail: String::new() }
    }

    pub fn not_supported(field: Path, value: impl Into<serde_json::Value>, valid: &[&str]) -> Self {
        let detail = if valid.is_empty() {
            String::new()
        } else {
            let quoted: Vec<String> = valid.iter().map(|v| format!("\"{}\"", v)).collect();
            format!("supported values: {}", quoted.join(", "))
        };
        Self { kind: FieldErrorKind::NotSupported, field, bad_value: Some(value.into()), detail }
    }

    pub fn too_long(field: Path, max: usize) -> Self {
        Self {
            kind: FieldErrorKind::TooLong,
            field,
            bad_value: None,
            detail: format!("must have at most {} bytes", max),
        }
    }

    pub fn forbidden(field: Path, detail: impl Into<String>) -> Self {
        Self { kind: FieldErrorKind::Forbidden, field, bad_value: None, detail: detail.into() }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.kind.as_str())?;
        if let Some(v) = &self.bad_value {
            write!(f, ": {}", v)?;
        }
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for FieldError {}

/// Ordered list of field errors; empty means the object is acceptable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorList(Vec<FieldError>);

impl ErrorList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, err: FieldError) {
        self.0.push(err);
    }

    pub fn append(&mut self, mut other: ErrorList) {
        self.0.append(&mut other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[FieldError] {
        &self.0
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.len() {
            0 => Ok(()),
            1 => write!(f, "{}", self.0[0]),
            _ => {
                f.write_str("[")?;
                for (i, e) in self.0.iter().enumerate() {
                    if i > 0 { f.write_str(", ")?; }
                    write!(f, "{}", e)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<Vec<FieldError>> for ErrorList {
    fn from(v: Vec<FieldError>) -> Self {
        Self(v)
    }
}

impl FromIterator<FieldError> for ErrorList {
    fn from_iter<I: IntoIterator<Item = FieldError>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<FieldError> for ErrorList {
    fn extend<I: IntoIterator<Item = FieldError>>(&mut self, iter: I) {
        self.0.extend(iter)
    }
}

impl IntoIterator for ErrorList {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a FieldError;
    type IntoIter = std::slice::Iter<'a, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_rendering() {
        let p = Path::new("status").child("conditions").index(1).child("type");
        assert_eq!(p.to_string(), "status.conditions[1].type");
        let l = Path::new("metadata").child("labels").key("app");
        assert_eq!(l.to_string(), "metadata.labels[app]");
    }

    #[test]
    fn error_rendering() {
        let e = FieldError::invalid(Path::new("metadata").child("name"), "Bad_Name", "must be lowercase");
        assert_eq!(e.to_string(), "metadata.name: Invalid value: \"Bad_Name\": must be lowercase");
        let r = FieldError::required(Path::new("metadata").child("namespace"), "");
        assert_eq!(r.to_string(), "metadata.namespace: Required value");
        let n = FieldError::not_supported(Path::new("spec").child("ports").index(0).child("protocol"), "ICMP", &["TCP", "UDP"]);
        assert!(n.to_string().ends_with("supported values: \"TCP\", \"UDP\""));
    }

    #[test]
    fn list_keeps_order() {
        let mut errs = ErrorList::new();
        errs.push(FieldError::required(Path::new("a"), ""));
        errs.extend(vec![FieldError::required(Path::new("b"), "")]);
        let fields: Vec<String> = errs.iter().map(|e| e.field.to_string()).collect();
        assert_eq!(fields, vec!["a", "b"]);
        assert_eq!(errs.to_string(), "[a: Required value, b: Required value]");
    }
}
