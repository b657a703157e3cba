//! Error types for construction, cursor movement, search and format handling.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by [crate::BitSeq] operations.
#[derive(Debug, Error)]
pub enum Error {
    /// More than one source was given to a constructor, or a source was combined
    /// with an option it cannot take (e.g. `uint` with a nonzero offset).
    #[error("conflicting arguments: {0}")]
    Conflict(String),
    /// The caller supplied an invalid argument or combination of arguments.
    #[error("invalid argument: {0}")]
    Usage(String),
    /// A position or length is outside the valid bounds.
    #[error("{what} out of range: {value} not in {min}..={max}")]
    Range {
        what: &'static str,
        value: usize,
        min: usize,
        max: usize,
    },
    /// Bits could not be decoded into (or encoded from) the requested form.
    #[error("decode error: {0}")]
    Decode(String),
    /// A format string contains a malformed token.
    #[error(transparent)]
    Token(#[from] TokenError),
    /// The underlying byte source failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn range(what: &'static str, value: usize, min: usize, max: usize) -> Self {
        Error::Range {
            what,
            value,
            min,
            max,
        }
    }

    pub(crate) fn usage(msg: impl Into<String>) -> Self {
        Error::Usage(msg.into())
    }

    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        Error::Decode(msg.into())
    }

    pub(crate) fn conflict(msg: impl Into<String>) -> Self {
        Error::Conflict(msg.into())
    }
}

/// Errors produced when parsing a single token of a format string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Token text is not a kind, a literal or an identifier.
    #[error("malformed token '{0}'")]
    Malformed(String),
    /// Explicit length is negative or not a number/identifier.
    #[error("invalid length in token '{0}'")]
    InvalidLength(String),
    /// Kind never takes a length (`se`, `ue`).
    #[error("token '{0}' cannot take a length")]
    LengthNotAllowed(String),
    /// Name does not resolve to a kind where a concrete kind is required.
    #[error("unknown kind in token '{0}'")]
    UnknownKind(String),
}
