//! Error types for graphbin
//!
//! This module defines all error types used throughout the serializer.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! The variants map to the failure classes of a serialize/deserialize call:
//! - Unsupported: the active options cannot encode a type
//! - InvalidStream: decoded content violates a format invariant
//! - TypeNotFound: a stored type name has no runtime counterpart
//! - IdentityConflict: a placeholder was consumed before it could be replaced
//! - ShapeMismatch: the live field layout disagrees with the stream (strict mode)

use std::io;
use thiserror::Error;

/// Result type alias for graphbin operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for graphbin
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the underlying sink or source
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The type cannot be represented under the active option set
    #[error("Type '{type_name}' cannot be serialized: {reason}")]
    Unsupported {
        /// Display name of the offending type
        type_name: String,
        /// Why no encoding rule applies
        reason: String,
    },

    /// Structurally invalid stream content
    #[error("Invalid stream: {0}")]
    InvalidStream(String),

    /// A stored type name could not be mapped to a runtime type
    #[error("Type not found: {name} (assembly: {assembly:?})")]
    TypeNotFound {
        /// Stored assembly name, if any
        assembly: Option<String>,
        /// Stored type name
        name: String,
    },

    /// A tentative object cannot be replaced by its real instance
    #[error("Identity conflict: {0}")]
    IdentityConflict(String),

    /// The live type layout disagrees with the recorded one
    #[error("Shape mismatch in '{type_name}': {detail}")]
    ShapeMismatch {
        /// Type being restored
        type_name: String,
        /// What did not match
        detail: String,
    },

    /// Invalid operation on an object model value
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Failure reported by a user hook (surrogate, custom serializer, callback)
    #[error("Hook failed: {0}")]
    Hook(String),
}

/// Coarse classification of [`Error`] values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// I/O failure
    Io,
    /// Configuration / unsupported type
    Unsupported,
    /// Corrupt or truncated data
    InvalidStream,
    /// Missing type dependency
    TypeNotFound,
    /// Unresolvable circular reference
    IdentityConflict,
    /// Layout mismatch in strict mode
    ShapeMismatch,
    /// Misuse of the object model
    InvalidOperation,
    /// User hook failure
    Hook,
}

impl Error {
    /// Create an unsupported-type error
    pub fn unsupported(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Unsupported {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a stream-format error
    pub fn invalid_stream(detail: impl Into<String>) -> Self {
        Error::InvalidStream(detail.into())
    }

    /// Create a shape-mismatch error
    pub fn shape_mismatch(type_name: impl Into<String>, detail: impl Into<String>) -> Self {
        Error::ShapeMismatch {
            type_name: type_name.into(),
            detail: detail.into(),
        }
    }

    /// Coarse kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::Unsupported { .. } => ErrorKind::Unsupported,
            Error::InvalidStream(_) => ErrorKind::InvalidStream,
            Error::TypeNotFound { .. } => ErrorKind::TypeNotFound,
            Error::IdentityConflict(_) => ErrorKind::IdentityConflict,
            Error::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
            Error::InvalidOperation(_) => ErrorKind::InvalidOperation,
            Error::Hook(_) => ErrorKind::Hook,
        }
    }

    /// Map an I/O error from a reader: truncation is a format error
    pub fn from_read(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::InvalidStream("unexpected end of stream".to_string())
        } else {
            Error::Io(e)
        }
    }
}
