use crate::Value;
use std::fmt;
use thiserror::Error;

/// An owned blank node identifier.
///
/// Blank node identifiers are only meaningful within the dataset that minted
/// them. The default string formatter is returning an N-Quads compatible
/// representation:
/// ```
/// use qvquad::BNode;
///
/// assert_eq!("_:a1", BNode::new("a1")?.to_string());
/// # Result::<_, qvquad::BNodeIdParseError>::Ok(())
/// ```
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Clone, Hash)]
pub struct BNode {
    id: String,
}

impl BNode {
    /// Builds a blank node, validating that the identifier is a legal
    /// N-Quads blank node label.
    pub fn new(id: impl Into<String>) -> Result<Self, BNodeIdParseError> {
        let id = id.into();
        validate_id(&id)?;
        Ok(Self { id })
    }

    /// Builds a blank node from an identifier without validating it.
    ///
    /// [`BNode::new()`] is a safe version of this constructor and should be used for untrusted data.
    #[inline]
    pub fn new_unchecked(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Builds a blank node with a freshly generated random identifier.
    ///
    /// Two calls are overwhelmingly unlikely to collide.
    pub fn random() -> Self {
        let id: u128 = rand::random();
        Self {
            id: format!("{id:032x}"),
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        self.id.as_str()
    }

    #[inline]
    pub fn into_string(self) -> String {
        self.id
    }
}

impl fmt::Display for BNode {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_:{}", self.id)
    }
}

impl PartialEq<str> for BNode {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<BNode> for str {
    #[inline]
    fn eq(&self, other: &BNode) -> bool {
        self == other.as_str()
    }
}

impl From<BNode> for Value {
    #[inline]
    fn from(node: BNode) -> Self {
        Self::BNode(node)
    }
}

fn validate_id(id: &str) -> Result<(), BNodeIdParseError> {
    if id.is_empty() {
        return Err(BNodeIdParseError);
    }
    let mut chars = id.chars();
    let first = chars.next().ok_or(BNodeIdParseError)?;
    if !matches!(first, '0'..='9' | '_' | ':') && !first.is_alphabetic() {
        return Err(BNodeIdParseError);
    }
    if !chars.all(|c| matches!(c, '0'..='9' | '.' | '-' | '_' | ':') || c.is_alphabetic()) {
        return Err(BNodeIdParseError);
    }
    // A label may not end with a dot.
    if id.ends_with('.') {
        return Err(BNodeIdParseError);
    }
    Ok(())
}

/// An error raised when a blank node identifier is not a legal N-Quads label.
#[derive(Debug, Error, Clone, Copy)]
#[error("the blank node identifier is invalid")]
pub struct BNodeIdParseError;
