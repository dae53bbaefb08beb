//! Error types for streaming dispatch.
//!
//! Errors fall into four groups, matching the stages of a `process()` call:
//!
//! - [`RegistrationError`] and [`Error::Pattern`] are raised while the
//!   pattern list is prepared, before a single event has been read.
//! - [`ParseError`] comes from the tokenizer when the source is not
//!   well-formed. Locations are byte offsets into the source.
//! - [`Error::Callback`] wraps whatever a user callback returned.
//!
//! Nothing is retried or recovered; every error ends the current call.

use std::fmt;

/// The error type user callbacks return.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The result type user callbacks return.
pub type CallbackResult = Result<(), CallbackError>;

/// Location within the XML source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// 0-based byte offset from the start of the input.
    pub byte_offset: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offset {}", self.byte_offset)
    }
}

/// The error type returned when the source document is not well-formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// The primary error message.
    pub message: String,
    /// Where in the source the error was detected.
    pub location: SourceLocation,
}

impl ParseError {
    pub(crate) fn new(message: impl Into<String>, byte_offset: usize) -> Self {
        Self {
            message: message.into(),
            location: SourceLocation { byte_offset },
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error at {}: {}", self.location, self.message)
    }
}

impl std::error::Error for ParseError {}

/// A callback declared a parameter type that cannot be materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationError {
    /// The pattern the callback was registered under.
    pub pattern: String,
    /// The declared parameter type name.
    pub type_name: String,
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot pass value to callback as type {} (pattern '{}')",
            self.type_name, self.pattern
        )
    }
}

impl std::error::Error for RegistrationError {}

/// Top-level error returned by [`RegReader::process`](crate::RegReader::process).
#[derive(Debug)]
pub enum Error {
    /// The source document is malformed.
    Parse(ParseError),
    /// A callback declared an unsupported parameter type.
    Registration(RegistrationError),
    /// A pattern is not a valid regular expression.
    Pattern {
        /// The pattern as supplied by the caller.
        pattern: String,
        /// The compilation failure.
        source: regex::Error,
    },
    /// A callback returned an error.
    Callback {
        /// The pattern whose callback failed.
        pattern: String,
        /// The error the callback returned.
        source: CallbackError,
    },
    /// The source could not be opened.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "{e}"),
            Self::Registration(e) => write!(f, "registration error: {e}"),
            Self::Pattern { pattern, source } => {
                write!(f, "invalid pattern '{pattern}': {source}")
            }
            Self::Callback { pattern, source } => {
                write!(f, "callback for '{pattern}' failed: {source}")
            }
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(e) => Some(e),
            Self::Registration(e) => Some(e),
            Self::Pattern { source, .. } => Some(source),
            Self::Callback { source, .. } => Some(source.as_ref()),
            Self::Io(e) => Some(e),
        }
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<RegistrationError> for Error {
    fn from(e: RegistrationError) -> Self {
        Self::Registration(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
