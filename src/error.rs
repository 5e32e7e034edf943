use std::fmt;
use std::path::Path;

use thiserror::Error;

/// A 1-based location in the program source.
///
/// `column` counts bytes from the start of the line, not characters, so a tab
/// or each byte of a multi-byte character advances it by one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Position of byte `offset` within `src`.
    pub fn at_offset(src: &[u8], offset: usize) -> Self {
        let prefix = &src[..offset.min(src.len())];
        let line = prefix.iter().filter(|&&b| b == b'\n').count() + 1;
        let line_start = prefix.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
        Self::new(line, prefix.len() - line_start + 1)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A malformed AWK program, with the position the lexer or parser gave up at.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("parse error at {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: Position,
}

/// All error types for tawk
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Usage(String),

    #[error("{path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("runtime error: {message}")]
    Runtime { message: String },

    #[error("runtime error at {position}: {message}")]
    RuntimeWithPosition { message: String, position: Position },

    #[error("{0}")]
    Profile(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl Error {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    pub fn file(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::File {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub fn parse(message: impl Into<String>, position: Position) -> Self {
        Self::Parse(ParseError {
            message: message.into(),
            position,
        })
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    pub fn runtime_at(message: impl Into<String>, position: Position) -> Self {
        Self::RuntimeWithPosition {
            message: message.into(),
            position,
        }
    }

    /// Attaches `position` to a runtime error that lacks one.
    pub fn at(self, position: Position) -> Self {
        match self {
            Self::Runtime { message } => Self::RuntimeWithPosition { message, position },
            other => other,
        }
    }

    pub fn profile(message: impl Into<String>) -> Self {
        Self::Profile(message.into())
    }

    /// The parse failure behind this error, if it is one.
    pub fn as_parse_error(&self) -> Option<&ParseError> {
        match self {
            Self::Parse(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type alias for tawk operations
pub type Result<T> = std::result::Result<T, Error>;
