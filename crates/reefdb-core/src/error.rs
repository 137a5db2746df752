use std::fmt;
use thiserror::Error as ThisError;

/// Crate-wide result alias.
pub type Result<T, E = DatumError> = std::result::Result<T, E>;

///
/// DatumError
///
/// Synchronous failure raised at the point of violation. `kind` is the stable
/// classification; `message` is the full user-facing rendering and usually
/// carries expected/actual type names plus a truncated print of the value.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("{message}")]
pub struct DatumError {
    pub kind: ErrorKind,
    pub message: String,
}

impl DatumError {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Construct a type error (operation requires a different variant).
    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, message)
    }

    /// Construct a non-existence error (missing index or field under throw
    /// semantics).
    pub(crate) fn non_existence(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NonExistence, message)
    }

    /// Construct a logic error (malformed pseudo-type, invalid key material,
    /// duplicate keys, non-finite numbers, corrupt buffers, invalid UTF-8).
    pub(crate) fn logic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Logic, message)
    }

    /// Construct a resource-limit error (array/key/depth caps).
    pub(crate) fn resource_limit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResourceLimit, message)
    }

    #[must_use]
    pub const fn is_type(&self) -> bool {
        matches!(self.kind, ErrorKind::Type)
    }

    #[must_use]
    pub const fn is_non_existence(&self) -> bool {
        matches!(self.kind, ErrorKind::NonExistence)
    }

    #[must_use]
    pub fn display_with_kind(&self) -> String {
        format!("{}: {}", self.kind, self.message)
    }
}

///
/// ErrorKind
///
/// Stable failure taxonomy for callers that branch on the class of violation.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Type,
    NonExistence,
    Logic,
    ResourceLimit,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Type => "type",
            Self::NonExistence => "non_existence",
            Self::Logic => "logic",
            Self::ResourceLimit => "resource_limit",
        };
        write!(f, "{label}")
    }
}
