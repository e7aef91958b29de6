//! Error classification shared by service-level errors.

use std::fmt;

/// Coarse error category used by transport layers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The addressed entity does not exist.
    NotFound,
    /// A phase gate was not satisfied or an identifier is already taken.
    Conflict,
    /// Caller input was rejected.
    BadRequest,
    /// Any other failure, typically a wrapped backend error.
    Internal,
}

impl ErrorKind {
    /// Returns the canonical name of the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::BadRequest => "bad_request",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
