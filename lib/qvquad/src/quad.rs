use crate::hash::ValueHash;
use crate::Value;
use std::fmt;

/// A quad position: subject, predicate, object or label.
///
/// `Any` stands for "no constraint" in pattern matching APIs and is never a
/// position of a stored quad.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Clone, Copy, Hash)]
pub enum Direction {
    Subject,
    Predicate,
    Object,
    Label,
    Any,
}

impl Direction {
    /// The four concrete positions of a quad, in canonical order.
    pub const ALL: [Self; 4] = [Self::Subject, Self::Predicate, Self::Object, Self::Label];

    /// A one-byte tag usable as a key prefix by storage backends.
    #[inline]
    pub const fn prefix(self) -> u8 {
        match self {
            Self::Subject => b's',
            Self::Predicate => b'p',
            Self::Object => b'o',
            Self::Label => b'c',
            Self::Any => b'a',
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Subject => "subject",
            Self::Predicate => "predicate",
            Self::Object => "object",
            Self::Label => "label",
            Self::Any => "any",
        })
    }
}

/// A labeled quad: the unit of storage of the engine.
///
/// Subject, predicate and object are always present; the label is optional
/// and names the graph the statement belongs to (`None` is the default
/// graph). The default string formatter is returning the canonical N-Quads
/// line:
/// ```
/// use qvquad::{Iri, Quad};
///
/// let q = Quad::new(
///     Iri::new("http://example.com/a")?,
///     Iri::new("http://example.com/follows")?,
///     Iri::new("http://example.com/b")?,
///     Some(Iri::new("http://example.com/g")?.into()),
/// );
/// assert_eq!(
///     q.to_string(),
///     "<http://example.com/a> <http://example.com/follows> <http://example.com/b> <http://example.com/g> .\n"
/// );
/// # Result::<_, qvquad::IriParseError>::Ok(())
/// ```
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Quad {
    pub subject: Value,
    pub predicate: Value,
    pub object: Value,
    pub label: Option<Value>,
}

impl Quad {
    #[inline]
    pub fn new(
        subject: impl Into<Value>,
        predicate: impl Into<Value>,
        object: impl Into<Value>,
        label: Option<Value>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            label,
        }
    }

    /// The value in the given position, or `None` for an absent label and
    /// for [`Direction::Any`].
    pub fn get(&self, d: Direction) -> Option<&Value> {
        match d {
            Direction::Subject => Some(&self.subject),
            Direction::Predicate => Some(&self.predicate),
            Direction::Object => Some(&self.object),
            Direction::Label => self.label.as_ref(),
            Direction::Any => None,
        }
    }

    /// Replaces the value in the given position.
    ///
    /// Setting [`Direction::Any`] is a no-op.
    pub fn set(&mut self, d: Direction, v: Value) {
        match d {
            Direction::Subject => self.subject = v,
            Direction::Predicate => self.predicate = v,
            Direction::Object => self.object = v,
            Direction::Label => self.label = Some(v),
            Direction::Any => (),
        }
    }

    /// The 20-byte content hash of the canonical quad line.
    #[inline]
    pub fn hash(&self) -> ValueHash {
        ValueHash::of_str(&self.to_string())
    }
}

impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)?;
        if let Some(label) = &self.label {
            write!(f, " {label}")?;
        }
        f.write_str(" .\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Iri;

    fn iri(s: &str) -> Value {
        Iri::new_unchecked(s).into()
    }

    #[test]
    fn get_and_set() {
        let mut q = Quad::new(iri("s"), iri("p"), iri("o"), None);
        assert_eq!(q.get(Direction::Subject), Some(&iri("s")));
        assert_eq!(q.get(Direction::Label), None);
        assert_eq!(q.get(Direction::Any), None);

        q.set(Direction::Label, iri("g"));
        assert_eq!(q.get(Direction::Label), Some(&iri("g")));
        q.set(Direction::Any, iri("x"));
        assert_eq!(q, Quad::new(iri("s"), iri("p"), iri("o"), Some(iri("g"))));
    }

    #[test]
    fn canonical_line() {
        let q = Quad::new(iri("s"), iri("p"), Value::from("o"), None);
        assert_eq!(q.to_string(), "<s> <p> \"o\" .\n");
        assert_eq!(q.hash(), ValueHash::of_str("<s> <p> \"o\" .\n"));
    }

    #[test]
    fn direction_prefixes_are_distinct() {
        let mut prefixes: Vec<u8> = Direction::ALL.iter().map(|d| d.prefix()).collect();
        prefixes.sort_unstable();
        prefixes.dedup();
        assert_eq!(prefixes.len(), 4);
    }
}
