use std::io;
use std::ops::Range;
use thiserror::Error;

/// An error raised while parsing N-Quads.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NQuadsParseError {
    /// I/O error during parsing (file not found...).
    #[error(transparent)]
    Io(#[from] io::Error),
    /// An error in the content syntax.
    #[error(transparent)]
    Syntax(#[from] NQuadsSyntaxError),
}

impl From<NQuadsParseError> for io::Error {
    #[inline]
    fn from(error: NQuadsParseError) -> Self {
        match error {
            NQuadsParseError::Io(error) => error,
            NQuadsParseError::Syntax(error) => error.into(),
        }
    }
}

/// An error in the syntax of the parsed N-Quads content.
#[derive(Debug, Error, Clone)]
#[error("on line {line}, columns {}-{}: {kind}", .columns.start, .columns.end)]
pub struct NQuadsSyntaxError {
    pub(crate) kind: SyntaxErrorKind,
    pub(crate) line: u64,
    pub(crate) columns: Range<usize>,
}

impl NQuadsSyntaxError {
    /// Whether the content is malformed or merely truncated.
    #[inline]
    pub fn kind(&self) -> SyntaxErrorKind {
        self.kind.clone()
    }

    /// The 1-based line the error was raised on.
    #[inline]
    pub fn line(&self) -> u64 {
        self.line
    }

    /// The 0-based byte column range of the offending input.
    #[inline]
    pub fn columns(&self) -> Range<usize> {
        self.columns.clone()
    }
}

impl From<NQuadsSyntaxError> for io::Error {
    #[inline]
    fn from(error: NQuadsSyntaxError) -> Self {
        Self::new(io::ErrorKind::InvalidData, error)
    }
}

/// The ways N-Quads content can be syntactically wrong.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    /// A malformed term or statement.
    #[error("invalid syntax: {0}")]
    Invalid(String),
    /// The statement ends in the middle of a term.
    #[error("incomplete statement")]
    Incomplete,
}

impl SyntaxErrorKind {
    /// Whether this is the [`SyntaxErrorKind::Incomplete`] kind.
    #[inline]
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Incomplete)
    }
}
