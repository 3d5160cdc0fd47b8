use qvquad::Quad;
use std::io::{self, Write};

/// A [N-Quads](https://www.w3.org/TR/n-quads/) serializer.
///
/// Writes quads in their canonical form, one statement per line:
/// ```
/// use qvnquads::NQuadsSerializer;
/// use qvquad::{Iri, Quad};
///
/// let mut serializer = NQuadsSerializer::new().for_writer(Vec::new());
/// serializer.write_quad(&Quad::new(
///     Iri::new("http://example.com/a")?,
///     Iri::new("http://example.com/follows")?,
///     Iri::new("http://example.com/b")?,
///     None,
/// ))?;
/// assert_eq!(
///     serializer.finish(),
///     b"<http://example.com/a> <http://example.com/follows> <http://example.com/b> .\n"
/// );
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Default, Clone, Copy)]
#[must_use]
pub struct NQuadsSerializer;

impl NQuadsSerializer {
    /// Builds a new [`NQuadsSerializer`].
    #[inline]
    pub fn new() -> Self {
        Self
    }

    /// Writes to a [`Write`] implementation.
    pub fn for_writer<W: Write>(self, writer: W) -> WriterNQuadsSerializer<W> {
        WriterNQuadsSerializer { writer }
    }
}

/// Writes quads to a [`Write`] implementation.
///
/// Returned by [`NQuadsSerializer::for_writer`].
#[must_use]
pub struct WriterNQuadsSerializer<W: Write> {
    writer: W,
}

impl<W: Write> WriterNQuadsSerializer<W> {
    /// Writes a quad as one canonical N-Quads line.
    pub fn write_quad(&mut self, quad: &Quad) -> io::Result<()> {
        write!(self.writer, "{quad}")
    }

    /// Ends the serialization and returns the underlying writer.
    pub fn finish(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NQuadsParser;
    use qvquad::{Iri, Value};

    #[test]
    fn escaping_round_trips() {
        let original = Quad::new(
            Iri::new_unchecked("s"),
            Iri::new_unchecked("p"),
            Value::from("multi\nline \"quoted\"\t"),
            Some(Value::LangString {
                value: "étiquette".into(),
                lang: "fr".into(),
            }),
        );
        let mut serializer = NQuadsSerializer::new().for_writer(Vec::new());
        serializer.write_quad(&original).unwrap();
        let bytes = serializer.finish();

        let reparsed = NQuadsParser::new()
            .for_reader(bytes.as_slice())
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(reparsed, vec![original]);
    }

    #[test]
    fn native_values_round_trip() {
        let original = Quad::new(
            Iri::new_unchecked("s"),
            Iri::new_unchecked("p"),
            Value::Int(42),
            None,
        );
        let mut serializer = NQuadsSerializer::new().for_writer(Vec::new());
        serializer.write_quad(&original).unwrap();
        let reparsed = NQuadsParser::new()
            .for_reader(serializer.finish().as_slice())
            .next()
            .unwrap()
            .unwrap();
        // The schema.org integer datatype is registered by default,
        // so the native kind survives the trip.
        assert_eq!(reparsed.object, Value::Int(42));
    }
}
