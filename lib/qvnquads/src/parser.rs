use crate::error::{NQuadsParseError, NQuadsSyntaxError, SyntaxErrorKind};
use qvquad::{BNode, Iri, Quad, Value};
use std::io::{BufRead, BufReader, Read};

/// A streaming [N-Quads](https://www.w3.org/TR/n-quads/) parser.
///
/// The parser is line-oriented: one statement per line, `#` comments, blank
/// lines ignored. Any term kind is accepted in any of the four positions, and
/// typed literals are resolved through the [`qvquad::registry`] conversion
/// table.
///
/// ```
/// use qvnquads::NQuadsParser;
/// use qvquad::Value;
///
/// let file = r#"# a tiny graph
/// <alice> <follows> <bob> .
/// <bob> <status> "cool" <graph> ."#;
///
/// let quads = NQuadsParser::new()
///     .for_slice(file)
///     .collect::<Result<Vec<_>, _>>()?;
/// assert_eq!(quads.len(), 2);
/// assert_eq!(quads[1].object, Value::from("cool"));
/// # Result::<_, qvnquads::NQuadsParseError>::Ok(())
/// ```
#[derive(Default, Clone)]
#[must_use]
pub struct NQuadsParser {
    lenient: bool,
}

impl NQuadsParser {
    /// Builds a new [`NQuadsParser`].
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assumes the content is valid to make parsing faster.
    ///
    /// It will skip blank node label and language tag validation, and accept
    /// a statement without its final dot.
    #[inline]
    pub fn lenient(mut self) -> Self {
        self.lenient = true;
        self
    }

    /// Parses N-Quads from a [`Read`] implementation.
    pub fn for_reader<R: Read>(self, reader: R) -> ReaderNQuadsParser<R> {
        ReaderNQuadsParser {
            reader: BufReader::new(reader),
            buffer: String::new(),
            line: 0,
            lenient: self.lenient,
            done: false,
        }
    }

    /// Parses N-Quads from a string slice.
    pub fn for_slice(self, slice: &str) -> SliceNQuadsParser<'_> {
        SliceNQuadsParser {
            lines: slice.lines(),
            line: 0,
            lenient: self.lenient,
        }
    }
}

/// Parses N-Quads from a [`Read`] implementation.
///
/// Returned by [`NQuadsParser::for_reader`].
#[must_use]
pub struct ReaderNQuadsParser<R: Read> {
    reader: BufReader<R>,
    buffer: String,
    line: u64,
    lenient: bool,
    done: bool,
}

impl<R: Read> Iterator for ReaderNQuadsParser<R> {
    type Item = Result<Quad, NQuadsParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.buffer.clear();
            match self.reader.read_line(&mut self.buffer) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    self.line += 1;
                    match parse_line(self.buffer.trim_end_matches(['\n', '\r']), self.line, self.lenient) {
                        Ok(Some(quad)) => return Some(Ok(quad)),
                        Ok(None) => (),
                        Err(e) => {
                            self.done = true;
                            return Some(Err(e.into()));
                        }
                    }
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
        }
        None
    }
}

/// Parses N-Quads from a string slice.
///
/// Returned by [`NQuadsParser::for_slice`].
#[must_use]
pub struct SliceNQuadsParser<'a> {
    lines: std::str::Lines<'a>,
    line: u64,
    lenient: bool,
}

impl Iterator for SliceNQuadsParser<'_> {
    type Item = Result<Quad, NQuadsParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        for line in self.lines.by_ref() {
            self.line += 1;
            match parse_line(line, self.line, self.lenient) {
                Ok(Some(quad)) => return Some(Ok(quad)),
                Ok(None) => (),
                Err(e) => return Some(Err(e.into())),
            }
        }
        None
    }
}

fn parse_line(
    line: &str,
    line_number: u64,
    lenient: bool,
) -> Result<Option<Quad>, NQuadsSyntaxError> {
    let mut p = LineParser {
        line,
        bytes: line.as_bytes(),
        pos: 0,
        line_number,
        lenient,
    };
    p.parse_statement()
}

struct LineParser<'a> {
    line: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line_number: u64,
    lenient: bool,
}

impl LineParser<'_> {
    fn parse_statement(&mut self) -> Result<Option<Quad>, NQuadsSyntaxError> {
        self.skip_whitespace();
        if self.at_end_of_statement() {
            return Ok(None);
        }
        let subject = self.parse_term()?;
        let predicate = self.parse_term()?;
        let object = self.parse_term()?;

        self.skip_whitespace();
        let label = if self.peek() == Some(b'.') {
            None
        } else if self.at_end_of_statement() {
            if self.lenient {
                return Ok(Some(Quad::new(subject, predicate, object, None)));
            }
            return Err(self.incomplete());
        } else {
            Some(self.parse_term()?)
        };

        self.skip_whitespace();
        match self.peek() {
            Some(b'.') => {
                self.pos += 1;
            }
            None | Some(b'#') => {
                if !self.lenient {
                    return Err(self.incomplete());
                }
            }
            Some(_) => return Err(self.invalid("expecting the terminating dot")),
        }
        self.skip_whitespace();
        if !self.at_end_of_statement() {
            return Err(self.invalid("unexpected content after the terminating dot"));
        }
        Ok(Some(Quad::new(subject, predicate, object, label)))
    }

    fn parse_term(&mut self) -> Result<Value, NQuadsSyntaxError> {
        self.skip_whitespace();
        match self.peek() {
            Some(b'<') => self.parse_iri().map(Value::Iri),
            Some(b'_') => self.parse_bnode(),
            Some(b'"') => self.parse_literal(),
            Some(_) => Err(self.invalid("expecting an IRI, a blank node or a literal")),
            None => Err(self.incomplete()),
        }
    }

    fn parse_iri(&mut self) -> Result<Iri, NQuadsSyntaxError> {
        let start = self.pos;
        self.pos += 1; // '<'
        let mut iri = String::new();
        loop {
            match self.next_char() {
                Some('>') => return Ok(Iri::new_unchecked(iri)),
                Some('\\') => iri.push(self.parse_unicode_escape()?),
                Some(c) if c == ' ' || c == '<' => {
                    self.pos = start;
                    return Err(self.invalid("unescaped character in IRI"));
                }
                Some(c) => iri.push(c),
                None => return Err(self.incomplete()),
            }
        }
    }

    fn parse_bnode(&mut self) -> Result<Value, NQuadsSyntaxError> {
        let start = self.pos;
        self.pos += 1; // '_'
        if self.peek() != Some(b':') {
            self.pos = start;
            return Err(self.invalid("expecting ':' after '_' in a blank node"));
        }
        self.pos += 1;
        let label_start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
        let label = &self.line[label_start..self.pos];
        if self.lenient {
            return Ok(BNode::new_unchecked(label).into());
        }
        match BNode::new(label) {
            Ok(node) => Ok(node.into()),
            Err(_) => {
                self.pos = start;
                Err(self.invalid("invalid blank node label"))
            }
        }
    }

    fn parse_literal(&mut self) -> Result<Value, NQuadsSyntaxError> {
        self.pos += 1; // '"'
        let mut value = String::new();
        loop {
            match self.next_char() {
                Some('"') => break,
                Some('\\') => value.push(self.parse_escape()?),
                Some(c) => value.push(c),
                None => return Err(self.incomplete()),
            }
        }
        match self.peek() {
            Some(b'@') => {
                self.pos += 1;
                let tag_start = self.pos;
                while let Some(b) = self.peek() {
                    if !b.is_ascii_alphanumeric() && b != b'-' {
                        break;
                    }
                    self.pos += 1;
                }
                let lang = &self.line[tag_start..self.pos];
                if lang.is_empty() {
                    return Err(self.invalid("expecting a language tag after '@'"));
                }
                if self.lenient {
                    return Ok(Value::LangString {
                        value,
                        lang: lang.to_ascii_lowercase(),
                    });
                }
                match Value::new_lang_string(value, lang) {
                    Ok(v) => Ok(v),
                    Err(_) => Err(self.invalid("invalid language tag")),
                }
            }
            Some(b'^') => {
                self.pos += 1;
                if self.peek() != Some(b'^') {
                    return Err(self.invalid("expecting '^^' before the datatype"));
                }
                self.pos += 1;
                if self.peek() != Some(b'<') {
                    return Err(self.invalid("expecting an IRI datatype after '^^'"));
                }
                let datatype = self.parse_iri()?;
                // Known datatypes load as native values, unknown ones stay typed strings.
                Ok(Value::TypedString { value, datatype }.parse_typed())
            }
            _ => Ok(Value::String(value)),
        }
    }

    fn parse_escape(&mut self) -> Result<char, NQuadsSyntaxError> {
        match self.next_char() {
            Some('t') => Ok('\t'),
            Some('b') => Ok('\u{08}'),
            Some('n') => Ok('\n'),
            Some('r') => Ok('\r'),
            Some('f') => Ok('\u{0c}'),
            Some('"') => Ok('"'),
            Some('\'') => Ok('\''),
            Some('\\') => Ok('\\'),
            Some('u') => self.parse_hex_char(4),
            Some('U') => self.parse_hex_char(8),
            Some(_) => Err(self.invalid("invalid string escape")),
            None => Err(self.incomplete()),
        }
    }

    fn parse_unicode_escape(&mut self) -> Result<char, NQuadsSyntaxError> {
        match self.next_char() {
            Some('u') => self.parse_hex_char(4),
            Some('U') => self.parse_hex_char(8),
            Some(_) => Err(self.invalid("only \\u and \\U escapes are allowed in IRIs")),
            None => Err(self.incomplete()),
        }
    }

    fn parse_hex_char(&mut self, digits: usize) -> Result<char, NQuadsSyntaxError> {
        let mut code = 0_u32;
        for _ in 0..digits {
            let digit = match self.next_char() {
                Some(c) => c.to_digit(16),
                None => return Err(self.incomplete()),
            };
            match digit {
                Some(d) => code = code * 16 + d,
                None => return Err(self.invalid("invalid unicode escape digit")),
            }
        }
        char::from_u32(code).ok_or_else(|| self.invalid("invalid unicode code point"))
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if !b.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
    }

    fn at_end_of_statement(&self) -> bool {
        match self.peek() {
            None => true,
            Some(b'#') => true,
            Some(_) => false,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.line[self.pos..].chars().next()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn invalid(&self, message: &str) -> NQuadsSyntaxError {
        NQuadsSyntaxError {
            kind: SyntaxErrorKind::Invalid(message.into()),
            line: self.line_number,
            columns: self.pos..self.line.len(),
        }
    }

    fn incomplete(&self) -> NQuadsSyntaxError {
        NQuadsSyntaxError {
            kind: SyntaxErrorKind::Incomplete,
            line: self.line_number,
            columns: self.pos..self.line.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qvquad::vocab::xsd;
    use std::str::FromStr;

    fn parse_one(line: &str) -> Quad {
        let mut quads = NQuadsParser::new()
            .for_slice(line)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(quads.len(), 1);
        quads.pop().unwrap()
    }

    fn parse_err(line: &str) -> NQuadsSyntaxError {
        match NQuadsParser::new().for_slice(line).next().unwrap() {
            Err(NQuadsParseError::Syntax(e)) => e,
            other => panic!("expected a syntax error, got {other:?}"),
        }
    }

    #[test]
    fn plain_statement() {
        let q = parse_one("<s> <p> <o> .");
        assert_eq!(q.subject, Iri::new_unchecked("s").into());
        assert_eq!(q.label, None);
    }

    #[test]
    fn labeled_statement() {
        let q = parse_one("<s> <p> \"o\" <g> . # with a comment");
        assert_eq!(q.object, Value::from("o"));
        assert_eq!(q.label, Some(Iri::new_unchecked("g").into()));
    }

    #[test]
    fn lang_string_object() {
        let q = parse_one("<s> <p> \"o\"@en .");
        assert_eq!(
            q.object,
            Value::LangString {
                value: "o".into(),
                lang: "en".into()
            }
        );
    }

    #[test]
    fn recognised_datatype_converts() {
        let q = parse_one("<s> <p> \"1990-07-04\"^^<http://www.w3.org/2001/XMLSchema#date> .");
        assert_eq!(
            q.object,
            Value::Time(oxsdatatypes::DateTime::from_str("1990-07-04T00:00:00").unwrap())
        );
    }

    #[test]
    fn unknown_datatype_stays_typed() {
        let q = parse_one("<s> <p> \"x\"^^<http://example.com/t> .");
        assert_eq!(
            q.object,
            Value::TypedString {
                value: "x".into(),
                datatype: Iri::new_unchecked("http://example.com/t"),
            }
        );
    }

    #[test]
    fn bad_lexical_form_stays_typed() {
        let q = parse_one("<s> <p> \"abc\"^^<http://www.w3.org/2001/XMLSchema#integer> .");
        assert_eq!(
            q.object,
            Value::TypedString {
                value: "abc".into(),
                datatype: xsd::INTEGER.into_owned(),
            }
        );
    }

    #[test]
    fn literals_in_every_position() {
        let q = parse_one(r#""\"this" "\"is" "\"valid" "\"quad thing" ."#);
        assert_eq!(q.subject, Value::from("\"this"));
        assert_eq!(q.predicate, Value::from("\"is"));
        assert_eq!(q.object, Value::from("\"valid"));
        assert_eq!(q.label, Some(Value::from("\"quad thing")));
    }

    #[test]
    fn unicode_escapes() {
        let q = parse_one(r#"<s> <p> "aéb\U0001F600c" ."#);
        assert_eq!(q.object, Value::from("a\u{e9}b\u{1f600}c"));
    }

    #[test]
    fn standard_escapes() {
        let q = parse_one(r#"<s> <p> "\t\b\n\r\f\"\'\\" ."#);
        assert_eq!(q.object, Value::from("\t\u{8}\n\r\u{c}\"'\\"));
    }

    #[test]
    fn comments_and_blank_lines() {
        let quads = NQuadsParser::new()
            .for_slice("# header\n\n<s> <p> <o> .\n   # trailing\n")
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(quads.len(), 1);
    }

    #[test]
    fn incomplete_statements() {
        assert!(parse_err("<s> <p>").kind().is_incomplete());
        assert!(parse_err("<s> <p> \"o").kind().is_incomplete());
        assert!(parse_err("<s> <p> <o").kind().is_incomplete());
        assert!(parse_err("<s> <p> <o>").kind().is_incomplete());
    }

    #[test]
    fn invalid_statements() {
        assert!(!parse_err("<s> <p> oops .").kind().is_incomplete());
        assert!(!parse_err("<s> <p> <o> extra .").kind().is_incomplete());
        assert!(!parse_err("<s> <p> <o> . trailing").kind().is_incomplete());
        assert_eq!(parse_err("<s> <p 1> <o> .").line(), 1);
    }

    #[test]
    fn lenient_accepts_missing_dot() {
        let quads = NQuadsParser::new()
            .lenient()
            .for_slice("<s> <p> <o>")
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(quads.len(), 1);
    }

    #[test]
    fn reader_matches_slice() {
        let content = "<s> <p> <o> .\n<s2> <p2> \"o2\"@en-US .\n";
        let from_reader = NQuadsParser::new()
            .for_reader(content.as_bytes())
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        let from_slice = NQuadsParser::new()
            .for_slice(content)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(from_reader, from_slice);
        assert_eq!(
            from_reader[1].object,
            Value::LangString {
                value: "o2".into(),
                lang: "en-us".into()
            }
        );
    }
}
