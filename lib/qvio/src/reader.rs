use qvnquads::NQuadsParseError;
use qvquad::Quad;
use std::error::Error;
use std::io;
use thiserror::Error;

/// A streaming source of quads: what every codec parser provides.
///
/// `Ok(None)` signals the end of the stream. After an error the reader is in
/// an unspecified state and should be dropped.
pub trait QuadReader {
    fn read_quad(&mut self) -> Result<Option<Quad>, QuadReadError>;

    /// Drains the reader into a vector.
    fn read_all(&mut self) -> Result<Vec<Quad>, QuadReadError> {
        let mut quads = Vec::new();
        while let Some(quad) = self.read_quad()? {
            quads.push(quad);
        }
        Ok(quads)
    }
}

/// An error raised by a [`QuadReader`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuadReadError {
    /// I/O error while reading the underlying stream.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Codec-specific syntax error in the content.
    #[error(transparent)]
    Syntax(Box<dyn Error + Send + Sync + 'static>),
}

impl From<NQuadsParseError> for QuadReadError {
    #[inline]
    fn from(error: NQuadsParseError) -> Self {
        match error {
            NQuadsParseError::Io(e) => Self::Io(e),
            NQuadsParseError::Syntax(e) => Self::Syntax(Box::new(e)),
            other => Self::Syntax(Box::new(other)),
        }
    }
}

impl From<QuadReadError> for io::Error {
    #[inline]
    fn from(error: QuadReadError) -> Self {
        match error {
            QuadReadError::Io(e) => e,
            QuadReadError::Syntax(e) => Self::new(io::ErrorKind::InvalidData, e),
        }
    }
}

impl<R: QuadReader + ?Sized> QuadReader for Box<R> {
    fn read_quad(&mut self) -> Result<Option<Quad>, QuadReadError> {
        (**self).read_quad()
    }
}
