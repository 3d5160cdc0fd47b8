use crate::reader::{QuadReadError, QuadReader};
use crate::writer::QuadWriter;
use qvnquads::{NQuadsParser, NQuadsSerializer, ReaderNQuadsParser, WriterNQuadsSerializer};
use qvquad::Quad;
use std::fmt;
use std::io::{self, BufRead, Write};
use std::sync::{OnceLock, RwLock};

/// A constructor of codec readers.
pub type NewReaderFn = fn(Box<dyn BufRead>) -> Box<dyn QuadReader>;
/// A constructor of codec writers.
pub type NewWriterFn = fn(Box<dyn Write>) -> Box<dyn QuadWriter>;

/// A quad serialization format registered with the process-scoped codec
/// registry.
///
/// Formats are resolved by name, file extension or media type; the N-Quads
/// codec is always available:
/// ```
/// use qvio::QuadFormat;
///
/// let format = QuadFormat::from_media_type("application/n-quads").unwrap();
/// assert_eq!(format.name(), "nquads");
/// assert_eq!(format.extensions(), ["nq"]);
/// ```
#[derive(Clone)]
pub struct QuadFormat {
    name: &'static str,
    extensions: &'static [&'static str],
    media_types: &'static [&'static str],
    new_reader: NewReaderFn,
    new_writer: NewWriterFn,
}

impl QuadFormat {
    /// Describes a new format. Call [`register_format`] to install it.
    pub const fn new(
        name: &'static str,
        extensions: &'static [&'static str],
        media_types: &'static [&'static str],
        new_reader: NewReaderFn,
        new_writer: NewWriterFn,
    ) -> Self {
        Self {
            name,
            extensions,
            media_types,
            new_reader,
            new_writer,
        }
    }

    /// The registry name of the format.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The file extensions this format claims, without the leading dot.
    #[inline]
    pub fn extensions(&self) -> &'static [&'static str] {
        self.extensions
    }

    /// The [IANA media types](https://tools.ietf.org/html/rfc2046) this format claims.
    #[inline]
    pub fn media_types(&self) -> &'static [&'static str] {
        self.media_types
    }

    /// Opens a streaming reader over the given input.
    pub fn new_reader(&self, read: Box<dyn BufRead>) -> Box<dyn QuadReader> {
        (self.new_reader)(read)
    }

    /// Opens a streaming writer over the given output.
    pub fn new_writer(&self, write: Box<dyn Write>) -> Box<dyn QuadWriter> {
        (self.new_writer)(write)
    }

    /// Looks up a registered format by name.
    pub fn by_name(name: &str) -> Option<Self> {
        with_registry(|formats| formats.iter().find(|f| f.name == name).cloned())
    }

    /// Looks up a registered format by file extension, without the leading dot.
    pub fn from_extension(extension: &str) -> Option<Self> {
        with_registry(|formats| {
            formats
                .iter()
                .find(|f| {
                    f.extensions
                        .iter()
                        .any(|e| e.eq_ignore_ascii_case(extension))
                })
                .cloned()
        })
    }

    /// Looks up a registered format by media type.
    ///
    /// Media type parameters (`; charset=utf-8`) are ignored.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let media_type = media_type.split(';').next()?.trim();
        with_registry(|formats| {
            formats
                .iter()
                .find(|f| {
                    f.media_types
                        .iter()
                        .any(|m| m.eq_ignore_ascii_case(media_type))
                })
                .cloned()
        })
    }

    /// All registered formats, in registration order.
    pub fn all() -> Vec<Self> {
        with_registry(|formats| formats.to_vec())
    }
}

impl fmt::Debug for QuadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuadFormat")
            .field("name", &self.name)
            .field("extensions", &self.extensions)
            .field("media_types", &self.media_types)
            .finish_non_exhaustive()
    }
}

/// Installs a format in the process-scoped registry.
///
/// A format with the same name replaces the previous registration. The
/// registry is meant to be filled at startup and read-only afterwards.
pub fn register_format(format: QuadFormat) {
    let mut registry = registry()
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    if let Some(existing) = registry.iter_mut().find(|f| f.name == format.name) {
        *existing = format;
    } else {
        registry.push(format);
    }
}

fn registry() -> &'static RwLock<Vec<QuadFormat>> {
    static REGISTRY: OnceLock<RwLock<Vec<QuadFormat>>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        RwLock::new(vec![QuadFormat::new(
            "nquads",
            &["nq"],
            &["application/n-quads", "text/x-nquads"],
            new_nquads_reader,
            new_nquads_writer,
        )])
    })
}

fn with_registry<T>(f: impl FnOnce(&[QuadFormat]) -> T) -> T {
    f(&registry()
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner))
}

fn new_nquads_reader(read: Box<dyn BufRead>) -> Box<dyn QuadReader> {
    Box::new(NQuadsQuadReader {
        inner: NQuadsParser::new().for_reader(read),
    })
}

fn new_nquads_writer(write: Box<dyn Write>) -> Box<dyn QuadWriter> {
    Box::new(NQuadsQuadWriter {
        inner: NQuadsSerializer::new().for_writer(write),
    })
}

struct NQuadsQuadReader {
    inner: ReaderNQuadsParser<Box<dyn BufRead>>,
}

impl QuadReader for NQuadsQuadReader {
    fn read_quad(&mut self) -> Result<Option<Quad>, QuadReadError> {
        self.inner.next().transpose().map_err(Into::into)
    }
}

struct NQuadsQuadWriter {
    inner: WriterNQuadsSerializer<Box<dyn Write>>,
}

impl QuadWriter for NQuadsQuadWriter {
    fn write_quad(&mut self, quad: &Quad) -> io::Result<()> {
        self.inner.write_quad(quad)
    }
}
