//! Process-scoped conversion of typed strings into native values.
//!
//! The table maps a datatype IRI to a parser turning the lexical form into a
//! native [`Value`] kind, so that `"4"^^<http://schema.org/Integer>` loaded
//! from a file behaves like [`Value::Int`]. Codecs consult it while reading;
//! deployments may register additional datatypes at startup. The table is
//! meant to be read-only once serving starts.

use crate::vocab::{schema, xsd};
use crate::{Iri, Value};
use oxsdatatypes::{Date, DateTime};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{OnceLock, RwLock};
use thiserror::Error;

/// A parser from a lexical form to a native [`Value`].
pub type ConvertFn = fn(&str) -> Result<Value, ConversionError>;

/// An error raised when a lexical form does not belong to the registered datatype.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("'{value}' is not a valid {datatype} lexical form")]
pub struct ConversionError {
    value: String,
    datatype: &'static str,
}

impl ConversionError {
    fn new(value: &str, datatype: &'static str) -> Self {
        Self {
            value: value.into(),
            datatype,
        }
    }
}

fn table() -> &'static RwLock<HashMap<String, ConvertFn>> {
    static TABLE: OnceLock<RwLock<HashMap<String, ConvertFn>>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = HashMap::<String, ConvertFn>::new();
        for iri in [
            xsd::INTEGER.as_str(),
            xsd::INT.as_str(),
            xsd::LONG.as_str(),
            xsd::SHORT.as_str(),
            schema::INTEGER.as_str(),
        ] {
            table.insert(iri.into(), parse_int);
        }
        for iri in [
            xsd::FLOAT.as_str(),
            xsd::DOUBLE.as_str(),
            schema::FLOAT.as_str(),
        ] {
            table.insert(iri.into(), parse_float);
        }
        for iri in [xsd::BOOLEAN.as_str(), schema::BOOLEAN.as_str()] {
            table.insert(iri.into(), parse_bool);
        }
        for iri in [xsd::DATE_TIME.as_str(), schema::DATE_TIME.as_str()] {
            table.insert(iri.into(), parse_date_time);
        }
        table.insert(xsd::DATE.as_str().into(), parse_date);
        RwLock::new(table)
    })
}

/// Registers `parser` for the given datatype IRI, replacing any previous entry.
///
/// ```
/// use qvquad::{registry, Iri, Value};
///
/// registry::register_conversion("http://example.com/upper", |s| {
///     Ok(Value::String(s.to_ascii_uppercase()))
/// });
/// let converted = registry::convert_typed(
///     &Iri::new_unchecked("http://example.com/upper"),
///     "loud",
/// );
/// assert_eq!(converted, Some(Ok(Value::String("LOUD".into()))));
/// ```
pub fn register_conversion(datatype: impl Into<String>, parser: ConvertFn) {
    table()
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .insert(datatype.into(), parser);
}

/// Removes the parser registered for the given datatype IRI, if any.
pub fn unregister_conversion(datatype: &str) {
    table()
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .remove(datatype);
}

/// Converts a lexical form using the parser registered for `datatype`.
///
/// Returns `None` when no parser is registered for the datatype.
pub fn convert_typed(datatype: &Iri, value: &str) -> Option<Result<Value, ConversionError>> {
    let parser = *table()
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .get(datatype.as_str())?;
    Some(parser(value))
}

/// Checks whether a parser is registered for the given datatype IRI.
pub fn is_registered(datatype: &Iri) -> bool {
    table()
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .contains_key(datatype.as_str())
}

fn parse_int(value: &str) -> Result<Value, ConversionError> {
    i64::from_str(value)
        .map(Value::Int)
        .map_err(|_| ConversionError::new(value, "integer"))
}

fn parse_float(value: &str) -> Result<Value, ConversionError> {
    f64::from_str(value)
        .map(Value::Float)
        .map_err(|_| ConversionError::new(value, "float"))
}

fn parse_bool(value: &str) -> Result<Value, ConversionError> {
    match value {
        "true" | "1" => Ok(Value::Bool(true)),
        "false" | "0" => Ok(Value::Bool(false)),
        _ => Err(ConversionError::new(value, "boolean")),
    }
}

fn parse_date_time(value: &str) -> Result<Value, ConversionError> {
    DateTime::from_str(value)
        .map(Value::Time)
        .map_err(|_| ConversionError::new(value, "dateTime"))
}

fn parse_date(value: &str) -> Result<Value, ConversionError> {
    let date = Date::from_str(value).map_err(|_| ConversionError::new(value, "date"))?;
    DateTime::try_from(date)
        .map(Value::Time)
        .map_err(|_| ConversionError::new(value, "date"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_conversions() {
        let int = convert_typed(&schema::INTEGER.into_owned(), "4");
        assert_eq!(int, Some(Ok(Value::Int(4))));

        let float = convert_typed(&xsd::DOUBLE.into_owned(), "1.5");
        assert_eq!(float, Some(Ok(Value::Float(1.5))));

        let boolean = convert_typed(&xsd::BOOLEAN.into_owned(), "true");
        assert_eq!(boolean, Some(Ok(Value::Bool(true))));

        let date = convert_typed(&xsd::DATE.into_owned(), "1990-07-04");
        assert!(matches!(date, Some(Ok(Value::Time(_)))));
    }

    #[test]
    fn unknown_datatype_is_skipped() {
        assert_eq!(
            convert_typed(&Iri::new_unchecked("http://example.com/unknown"), "x"),
            None
        );
    }

    #[test]
    fn bad_lexical_form_is_an_error() {
        assert!(matches!(
            convert_typed(&xsd::INTEGER.into_owned(), "abc"),
            Some(Err(_))
        ));
    }
}
