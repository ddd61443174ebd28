//! The closed set of error kinds the dispatcher recognizes and surfaces to
//! the coordinator.
//!
//! Every fallible operation in this crate returns `Result<_, EngineError>`.
//! `EngineError::kind` exposes a small tag enum so a coordinator-side caller
//! can branch on the failure category without string-matching a message, the
//! way the wire-level command table expects (see `Command::kind` in
//! `command.rs`).

use std::fmt;

/// Coordinator-facing failure category. Closed set; adding a variant is a
/// breaking change to the wire contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    DuplicateId,
    TypeMismatch,
    InvalidValue,
    MissingKey,
    UnsupportedOperation,
    InvalidOperation,
    IllegalState,
    DataType,
    LibraryLoad,
    StoreError,
    CommError,
    Unimplemented,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::DuplicateId => "DuplicateId",
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::InvalidValue => "InvalidValue",
            ErrorKind::MissingKey => "MissingKey",
            ErrorKind::UnsupportedOperation => "UnsupportedOperation",
            ErrorKind::InvalidOperation => "InvalidOperation",
            ErrorKind::IllegalState => "IllegalState",
            ErrorKind::DataType => "DataType",
            ErrorKind::LibraryLoad => "LibraryLoad",
            ErrorKind::StoreError => "StoreError",
            ErrorKind::CommError => "CommError",
            ErrorKind::Unimplemented => "Unimplemented",
        };
        f.write_str(s)
    }
}

/// A dispatcher-level error, closed over [`ErrorKind`].
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate id: {0}")]
    DuplicateId(String),

    #[error("type mismatch for id '{id}': expected {expected}, found {found}")]
    TypeMismatch {
        id: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("missing required key: {0}")]
    MissingKey(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("unsupported data type: {0}")]
    DataType(String),

    #[error("failed to load algorithm library '{0}': {1}")]
    LibraryLoad(String, String),

    #[error("object store error: {0}")]
    StoreError(String),

    #[error("communicator error: {0}")]
    CommError(String),

    #[error("unimplemented: {0}")]
    Unimplemented(String),
}

impl EngineError {
    /// The coordinator-facing category this error belongs to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::DuplicateId(_) => ErrorKind::DuplicateId,
            EngineError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            EngineError::InvalidValue { .. } => ErrorKind::InvalidValue,
            EngineError::MissingKey(_) => ErrorKind::MissingKey,
            EngineError::UnsupportedOperation(_) => ErrorKind::UnsupportedOperation,
            EngineError::InvalidOperation(_) => ErrorKind::InvalidOperation,
            EngineError::IllegalState(_) => ErrorKind::IllegalState,
            EngineError::DataType(_) => ErrorKind::DataType,
            EngineError::LibraryLoad(..) => ErrorKind::LibraryLoad,
            EngineError::StoreError(_) => ErrorKind::StoreError,
            EngineError::CommError(_) => ErrorKind::CommError,
            EngineError::Unimplemented(_) => ErrorKind::Unimplemented,
        }
    }

    /// True for validation-style failures the dispatcher can report
    /// without leaving shared state inconsistent. `StoreError`/`CommError`
    /// are deliberately excluded -- those are fatal collective failures.
    #[must_use]
    pub fn is_non_fatal(&self) -> bool {
        !matches!(self.kind(), ErrorKind::StoreError | ErrorKind::CommError)
    }
}

/// Convenience `Result` alias used throughout the public API.
pub type EngineResult<T> = Result<T, EngineError>;
