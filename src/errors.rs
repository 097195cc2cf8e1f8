//! Error types for the rowledger crate.
//!
//! This module defines a unified error enumeration used across canonicalization,
//! storage, parsing, and the import worker. It mirrors the error kinds of §7 of
//! the versioning spec one-to-one and integrates with `thiserror` for `Display`
//! and source chaining.
//!
//! Notes:
//! - Each variant carries contextual details via its message payload.
//! - `Internal` never leaks its source to callers; it is logged in full and
//!   surfaced only as the opaque id it carries.

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RowledgerError {
    /// Malformed filename, unsupported extension, empty commit message,
    /// bad pagination bounds, or a logical row id that doesn't parse.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unknown dataset/ref/commit/job.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Ref CAS lost to a concurrent writer, or a ref/name collision.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Upload exceeded the incremental size bound.
    #[error("upload exceeded the maximum size of {limit_bytes} bytes")]
    FileTooLarge { limit_bytes: u64 },

    /// File content did not match its declared format.
    #[error("parse error in {filename}: {message}")]
    Parser { filename: String, message: String },

    /// Underlying store failure (I/O, constraint violation other than
    /// content-address collisions, which are expected and silently absorbed).
    #[error("storage error: {0}")]
    Storage(String),

    /// Catch-all. Logged in full server-side; the `id` is the only thing
    /// that crosses the trust boundary.
    #[error("internal error (reference {id})")]
    Internal { id: Uuid, source: String },
}

impl RowledgerError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        RowledgerError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn internal(source: impl std::fmt::Display) -> Self {
        let id = Uuid::new_v4();
        tracing::error!(error.id = %id, error.source = %source, "internal error");
        RowledgerError::Internal {
            id,
            source: source.to_string(),
        }
    }
}

impl From<sea_orm::DbErr> for RowledgerError {
    fn from(err: sea_orm::DbErr) -> Self {
        RowledgerError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for RowledgerError {
    fn from(err: std::io::Error) -> Self {
        RowledgerError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RowledgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_renders_kind_and_id() {
        let err = RowledgerError::not_found("dataset", "42");
        assert_eq!(err.to_string(), "dataset not found: 42");
    }

    #[test]
    fn internal_never_prints_its_source() {
        let err = RowledgerError::internal("column password leaked the connection string");
        let rendered = err.to_string();
        assert!(!rendered.contains("password"));
        assert!(rendered.contains("internal error"));
    }
}
