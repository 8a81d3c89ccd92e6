//! The error taxonomy shared by every fallible operation in `ksr`.

use std::fmt;

/// A result whose error is always [`Fatal`].
pub type Result<T> = std::result::Result<T, Fatal>;

/// The five ways a run of `ksr` can fail.
///
/// There is exactly one place in the program that turns a `Fatal` into an
/// exit code and a line on stderr: `main`. Every other function propagates
/// one of these variants with `?`.
#[derive(Debug, Clone)]
pub enum Fatal {
    /// The policy file, the named policy within it, or a command-line
    /// option describing it, is unusable.
    Configuration(String),
    /// A filesystem operation on the key directory failed.
    Io(String),
    /// The key backend could not produce key material.
    Crypto(String),
    /// An invariant the scheduler or emitter depends on did not hold.
    Invariant(String),
    /// The arguments given on the command line do not parse.
    Usage(String),
}

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "configuration error: {msg}"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
            Self::Crypto(msg) => write!(f, "cryptographic error: {msg}"),
            Self::Invariant(msg) => write!(f, "internal error: {msg}"),
            Self::Usage(msg) => write!(f, "usage error: {msg}"),
        }
    }
}

impl std::error::Error for Fatal {}

impl From<std::io::Error> for Fatal {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
