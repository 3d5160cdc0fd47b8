use crate::hash::ValueHash;
use crate::registry;
use crate::vocab::schema;
use crate::{BNode, Iri};
use oxilangtag::{LanguageTag, LanguageTagParseError};
use oxsdatatypes::DateTime;
use std::fmt;
use std::fmt::Write;
use std::hash::{Hash, Hasher};
use std::mem::discriminant;

/// A node value: the possible content of a quad position.
///
/// The default string formatter is returning the canonical N-Quads
/// representation, which is also the input of the content hash:
/// ```
/// use qvquad::{Iri, Value};
///
/// assert_eq!("\"foo\\nbar\"", Value::from("foo\nbar").to_string());
/// assert_eq!(
///     "\"4\"^^<http://schema.org/Integer>",
///     Value::Int(4).to_string()
/// );
/// assert_eq!(
///     "<http://example.com>",
///     Value::from(Iri::new("http://example.com")?).to_string()
/// );
/// # Result::<_, qvquad::IriParseError>::Ok(())
/// ```
#[derive(Debug, Clone)]
pub enum Value {
    /// An absolute IRI.
    Iri(Iri),
    /// A blank node, scoped to the dataset that minted it.
    BNode(BNode),
    /// A plain string literal.
    String(String),
    /// A language-tagged string literal.
    LangString {
        value: String,
        /// A [BCP47](https://tools.ietf.org/html/bcp47) language tag.
        lang: String,
    },
    /// A string literal annotated with a datatype IRI.
    TypedString { value: String, datatype: Iri },
    /// A native 64-bit signed integer.
    Int(i64),
    /// A native 64-bit floating point number.
    Float(f64),
    /// A native boolean.
    Bool(bool),
    /// A native calendar instant.
    Time(DateTime),
    /// An already-escaped term written through verbatim.
    ///
    /// Only codecs produce this kind; the engine never does.
    Raw(String),
}

impl Value {
    /// Builds a [`Value::LangString`], validating the language tag.
    ///
    /// Tags are normalized to lowercase, as
    /// [BCP47](https://tools.ietf.org/html/bcp47) makes them case-insensitive.
    pub fn new_lang_string(
        value: impl Into<String>,
        lang: impl Into<String>,
    ) -> Result<Self, LanguageTagParseError> {
        let mut lang = lang.into();
        lang.make_ascii_lowercase();
        Ok(Self::LangString {
            value: value.into(),
            lang: LanguageTag::parse(lang)?.into_inner(),
        })
    }

    /// Checks whether this value is an [`Iri`].
    #[inline]
    pub fn is_iri(&self) -> bool {
        matches!(self, Self::Iri(_))
    }

    /// Checks whether this value is a [`BNode`].
    #[inline]
    pub fn is_bnode(&self) -> bool {
        matches!(self, Self::BNode(_))
    }

    /// Checks whether this value is one of the string literal kinds.
    #[inline]
    pub fn is_string(&self) -> bool {
        matches!(
            self,
            Self::String(_) | Self::LangString { .. } | Self::TypedString { .. }
        )
    }

    /// The underlying primitive of this value.
    ///
    /// String kinds project to their lexical form without conversion; use
    /// [`Value::parse_typed`] to resolve typed strings into native kinds first.
    pub fn native(&self) -> Native<'_> {
        match self {
            Self::Iri(iri) => Native::Str(iri.as_str()),
            Self::BNode(node) => Native::Str(node.as_str()),
            Self::String(value)
            | Self::LangString { value, .. }
            | Self::TypedString { value, .. }
            | Self::Raw(value) => Native::Str(value),
            Self::Int(value) => Native::Int(*value),
            Self::Float(value) => Native::Float(*value),
            Self::Bool(value) => Native::Bool(*value),
            Self::Time(value) => Native::Time(*value),
        }
    }

    /// Resolves a [`Value::TypedString`] into a native kind using the
    /// process-scoped [conversion registry](registry).
    ///
    /// Values of any other kind, typed strings with an unregistered datatype
    /// and lexical forms the registered parser rejects are returned unchanged.
    ///
    /// ```
    /// use qvquad::{vocab, Value};
    ///
    /// let typed = Value::TypedString {
    ///     value: "4".into(),
    ///     datatype: vocab::schema::INTEGER.into_owned(),
    /// };
    /// assert_eq!(typed.parse_typed(), Value::Int(4));
    /// ```
    pub fn parse_typed(&self) -> Self {
        if let Self::TypedString { value, datatype } = self {
            if let Some(Ok(converted)) = registry::convert_typed(datatype, value) {
                return converted;
            }
        }
        self.clone()
    }

    /// The 20-byte content hash of the canonical string form.
    #[inline]
    pub fn hash(&self) -> ValueHash {
        ValueHash::new(self)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        discriminant(self) == discriminant(other)
            && match (self, other) {
                (Self::Iri(a), Self::Iri(b)) => a == b,
                (Self::BNode(a), Self::BNode(b)) => a == b,
                (Self::String(a), Self::String(b)) => a == b,
                (
                    Self::LangString { value: va, lang: la },
                    Self::LangString { value: vb, lang: lb },
                ) => va == vb && la == lb,
                (
                    Self::TypedString {
                        value: va,
                        datatype: da,
                    },
                    Self::TypedString {
                        value: vb,
                        datatype: db,
                    },
                ) => va == vb && da == db,
                (Self::Int(a), Self::Int(b)) => a == b,
                // Bit equality, so that Value can be a map key; NaN equals NaN.
                (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
                (Self::Bool(a), Self::Bool(b)) => a == b,
                (Self::Time(a), Self::Time(b)) => a == b,
                (Self::Raw(a), Self::Raw(b)) => a == b,
                (_, _) => false,
            }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        discriminant(self).hash(state);
        match self {
            Self::Iri(iri) => iri.hash(state),
            Self::BNode(node) => node.hash(state),
            Self::String(value) | Self::Raw(value) => value.hash(state),
            Self::LangString { value, lang } => {
                value.hash(state);
                lang.hash(state);
            }
            Self::TypedString { value, datatype } => {
                value.hash(state);
                datatype.hash(state);
            }
            Self::Int(value) => value.hash(state),
            Self::Float(value) => value.to_bits().hash(state),
            Self::Bool(value) => value.hash(state),
            Self::Time(value) => value.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iri(iri) => iri.fmt(f),
            Self::BNode(node) => node.fmt(f),
            Self::String(value) => print_quoted_str(value, f),
            Self::LangString { value, lang } => {
                print_quoted_str(value, f)?;
                write!(f, "@{lang}")
            }
            Self::TypedString { value, datatype } => {
                print_quoted_str(value, f)?;
                write!(f, "^^{datatype}")
            }
            Self::Int(value) => write!(f, "\"{value}\"^^{}", schema::INTEGER),
            Self::Float(value) => write!(f, "\"{value}\"^^{}", schema::FLOAT),
            Self::Bool(value) => write!(f, "\"{value}\"^^{}", schema::BOOLEAN),
            Self::Time(value) => write!(f, "\"{value}\"^^{}", schema::DATE_TIME),
            Self::Raw(value) => f.write_str(value),
        }
    }
}

impl From<&str> for Value {
    #[inline]
    fn from(value: &str) -> Self {
        Self::String(value.into())
    }
}

impl From<String> for Value {
    #[inline]
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for Value {
    #[inline]
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    #[inline]
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    #[inline]
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<DateTime> for Value {
    #[inline]
    fn from(value: DateTime) -> Self {
        Self::Time(value)
    }
}

/// The primitive behind a [`Value`], as returned by [`Value::native`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Native<'a> {
    Str(&'a str),
    Int(i64),
    Float(f64),
    Bool(bool),
    Time(DateTime),
}

/// Writes `string` between double quotes, with N-Quads string escaping.
#[inline]
pub fn print_quoted_str(string: &str, f: &mut impl Write) -> fmt::Result {
    f.write_char('"')?;
    for c in string.chars() {
        match c {
            '\u{08}' => f.write_str("\\b"),
            '\t' => f.write_str("\\t"),
            '\n' => f.write_str("\\n"),
            '\u{0c}' => f.write_str("\\f"),
            '\r' => f.write_str("\\r"),
            '"' => f.write_str("\\\""),
            '\\' => f.write_str("\\\\"),
            '\0'..='\u{1f}' | '\u{7f}' => write!(f, "\\u{:04X}", u32::from(c)),
            c => f.write_char(c),
        }?;
    }
    f.write_char('"')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn canonical_forms() {
        assert_eq!(
            Value::from(Iri::new_unchecked("http://example.com/x")).to_string(),
            "<http://example.com/x>"
        );
        assert_eq!(
            Value::from(BNode::new_unchecked("b0")).to_string(),
            "_:b0"
        );
        assert_eq!(Value::from("say \"hi\"").to_string(), "\"say \\\"hi\\\"\"");
        assert_eq!(
            Value::LangString {
                value: "o".into(),
                lang: "en".into()
            }
            .to_string(),
            "\"o\"@en"
        );
        assert_eq!(
            Value::TypedString {
                value: "1990-07-04".into(),
                datatype: Iri::new_unchecked("http://www.w3.org/2001/XMLSchema#date"),
            }
            .to_string(),
            "\"1990-07-04\"^^<http://www.w3.org/2001/XMLSchema#date>"
        );
        assert_eq!(
            Value::Bool(true).to_string(),
            "\"true\"^^<http://schema.org/Boolean>"
        );
        assert_eq!(
            Value::Time(DateTime::from_str("2012-07-23T10:51:00Z").unwrap()).to_string(),
            "\"2012-07-23T10:51:00Z\"^^<http://schema.org/DateTime>"
        );
    }

    #[test]
    fn control_characters_are_escaped() {
        assert_eq!(Value::from("a\u{01}b").to_string(), "\"a\\u0001b\"");
        assert_eq!(Value::from("a\tb\n").to_string(), "\"a\\tb\\n\"");
    }

    #[test]
    fn float_identity() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
        assert_ne!(Value::Int(1), Value::Float(1.0));
    }

    #[test]
    fn time_equality_is_instant_based() {
        let utc = DateTime::from_str("2012-07-23T10:51:00Z").unwrap();
        let offset = DateTime::from_str("2012-07-23T12:51:00+02:00").unwrap();
        assert_eq!(Value::Time(utc), Value::Time(offset));
    }

    #[test]
    fn native_projection() {
        assert_eq!(Value::Int(4).native(), Native::Int(4));
        assert_eq!(Value::from("x").native(), Native::Str("x"));
        assert_eq!(
            Value::from(Iri::new_unchecked("http://example.com")).native(),
            Native::Str("http://example.com")
        );
    }

    #[test]
    fn lang_tags_are_validated_and_lowercased() {
        assert_eq!(
            Value::new_lang_string("o", "EN").unwrap(),
            Value::LangString {
                value: "o".into(),
                lang: "en".into()
            }
        );
        assert!(Value::new_lang_string("o", "not a tag").is_err());
    }

    #[test]
    fn parse_typed_keeps_unknown_datatypes() {
        let unknown = Value::TypedString {
            value: "x".into(),
            datatype: Iri::new_unchecked("http://example.com/custom"),
        };
        assert_eq!(unknown.parse_typed(), unknown);

        let bad_lexical = Value::TypedString {
            value: "abc".into(),
            datatype: crate::vocab::xsd::INTEGER.into_owned(),
        };
        assert_eq!(bad_lexical.parse_typed(), bad_lexical);
    }
}
