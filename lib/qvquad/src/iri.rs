use crate::Value;
use oxiri::IriParseError;
use std::cmp::Ordering;
use std::fmt;

/// An owned absolute IRI node identifier.
///
/// The default string formatter is returning an N-Quads compatible representation:
/// ```
/// use qvquad::Iri;
///
/// assert_eq!(
///     "<http://example.com/foo>",
///     Iri::new("http://example.com/foo")?.to_string()
/// );
/// # Result::<_, qvquad::IriParseError>::Ok(())
/// ```
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Clone, Hash)]
pub struct Iri {
    iri: String,
}

impl Iri {
    /// Builds and validates an absolute IRI.
    pub fn new(iri: impl Into<String>) -> Result<Self, IriParseError> {
        Ok(Self::new_unchecked(
            oxiri::Iri::parse(iri.into())?.into_inner(),
        ))
    }

    /// Builds an IRI from a string.
    ///
    /// It is the caller's responsibility to ensure that `iri` is a valid IRI.
    ///
    /// [`Iri::new()`] is a safe version of this constructor and should be used for untrusted data.
    #[inline]
    pub fn new_unchecked(iri: impl Into<String>) -> Self {
        Self { iri: iri.into() }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        self.iri.as_str()
    }

    #[inline]
    pub fn into_string(self) -> String {
        self.iri
    }

    #[inline]
    pub fn as_ref(&self) -> IriRef<'_> {
        IriRef::new_unchecked(&self.iri)
    }
}

impl fmt::Display for Iri {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_ref().fmt(f)
    }
}

impl PartialEq<str> for Iri {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<Iri> for str {
    #[inline]
    fn eq(&self, other: &Iri) -> bool {
        self == other.as_str()
    }
}

impl From<Iri> for Value {
    #[inline]
    fn from(iri: Iri) -> Self {
        Self::Iri(iri)
    }
}

/// A borrowed absolute IRI, usable in `const` contexts.
///
/// ```
/// use qvquad::IriRef;
///
/// assert_eq!(
///     "<http://example.com/foo>",
///     IriRef::new_unchecked("http://example.com/foo").to_string()
/// );
/// ```
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Clone, Copy, Hash)]
pub struct IriRef<'a> {
    iri: &'a str,
}

impl<'a> IriRef<'a> {
    /// Builds and validates an absolute IRI.
    pub fn new(iri: &'a str) -> Result<Self, IriParseError> {
        Ok(Self::new_unchecked(oxiri::Iri::parse(iri)?.into_inner()))
    }

    /// Builds an IRI from a string without validating it.
    #[inline]
    pub const fn new_unchecked(iri: &'a str) -> Self {
        Self { iri }
    }

    #[inline]
    pub const fn as_str(self) -> &'a str {
        self.iri
    }

    #[inline]
    pub fn into_owned(self) -> Iri {
        Iri::new_unchecked(self.iri)
    }
}

impl fmt::Display for IriRef<'_> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.iri)
    }
}

impl From<IriRef<'_>> for Iri {
    #[inline]
    fn from(iri: IriRef<'_>) -> Self {
        iri.into_owned()
    }
}

impl<'a> From<&'a Iri> for IriRef<'a> {
    #[inline]
    fn from(iri: &'a Iri) -> Self {
        iri.as_ref()
    }
}

impl From<IriRef<'_>> for Value {
    #[inline]
    fn from(iri: IriRef<'_>) -> Self {
        Self::Iri(iri.into_owned())
    }
}

impl PartialEq<Iri> for IriRef<'_> {
    #[inline]
    fn eq(&self, other: &Iri) -> bool {
        self.as_str() == other.as_str()
    }
}

impl PartialEq<IriRef<'_>> for Iri {
    #[inline]
    fn eq(&self, other: &IriRef<'_>) -> bool {
        self.as_str() == other.as_str()
    }
}

impl PartialEq<str> for IriRef<'_> {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<IriRef<'_>> for str {
    #[inline]
    fn eq(&self, other: &IriRef<'_>) -> bool {
        self == other.as_str()
    }
}

impl PartialOrd<Iri> for IriRef<'_> {
    #[inline]
    fn partial_cmp(&self, other: &Iri) -> Option<Ordering> {
        self.partial_cmp(&other.as_ref())
    }
}

impl PartialOrd<IriRef<'_>> for Iri {
    #[inline]
    fn partial_cmp(&self, other: &IriRef<'_>) -> Option<Ordering> {
        self.as_ref().partial_cmp(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation() {
        assert!(Iri::new("http://example.com/foo").is_ok());
        assert!(Iri::new("not an iri").is_err());
        assert_eq!(
            Iri::new_unchecked("not an iri").as_str(),
            "not an iri"
        );
    }

    #[test]
    fn borrowed_equality() {
        let owned = Iri::new_unchecked("http://example.com/foo");
        let borrowed = IriRef::new_unchecked("http://example.com/foo");
        assert_eq!(owned, borrowed);
        assert_eq!(borrowed, owned);
        assert_eq!(borrowed.into_owned(), owned);
    }
}
