//! Error type for parsing, navigating, mutating and patching POF values.

use pof_buffers::BufferError;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PofError>;

/// Every failure the value engine reports.
///
/// Absent-but-valid lookups (a sparse array gap, a child of a null value)
/// are reported as `Ok(None)` by the relevant operations, never as errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PofError {
    /// Truncated buffer, bad UTF-8 or an oversized packed integer.
    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),

    /// The stream violates the POF layout.
    #[error("malformed POF stream at offset {offset}: {reason}")]
    Malformed {
        /// Offset relative to the start of the parsed buffer.
        offset: usize,
        /// What was wrong.
        reason: String,
    },

    /// A decorated binary whose mask lacks the value bit.
    #[error("decorated binary is missing a value")]
    MissingDecoratedValue,

    /// A `T_REFERENCE` whose identity was never registered.
    #[error("unresolved identity reference {0}")]
    UnresolvedReference(i32),

    /// The same identity registered for two different values.
    #[error("identity {0} registered for two different values")]
    DuplicateIdentity(i32),

    /// `child` called on a value that is not a container.
    #[error("cannot navigate further from a terminal value at offset {offset}")]
    NotNavigable {
        /// Offset of the terminal value.
        offset: usize,
    },

    /// Index past the end of a fixed-size array or collection.
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds {
        /// Requested index.
        index: i32,
        /// Element count of the container.
        len: usize,
    },

    /// A value could not be produced as the requested type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Requested type.
        expected: String,
        /// Type actually found.
        actual: String,
    },

    /// A known type identifier this implementation cannot decode.
    #[error("unsupported POF type {0}")]
    UnsupportedType(i32),

    /// A user type identifier the type context does not know.
    #[error("unknown user type {0}")]
    UnknownUserType(i32),

    /// A user type name the type context does not know.
    #[error("unknown user type name {0:?}")]
    UnknownTypeName(String),

    /// The operation is not available for this tree or node.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// A delta that cannot be applied to the given buffer.
    #[error("invalid delta: {0}")]
    InvalidDelta(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PofError {
    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Returns `true` for errors caused by a corrupt or truncated stream.
    pub fn is_corrupt_stream(&self) -> bool {
        matches!(
            self,
            PofError::Buffer(_)
                | PofError::Malformed { .. }
                | PofError::MissingDecoratedValue
                | PofError::UnresolvedReference(_)
                | PofError::DuplicateIdentity(_)
        )
    }
}
