use crate::error::DeltaError;
use qvquad::Quad;
use rustc_hash::FxHashMap;
use std::fmt;

/// The two kinds of change a [`Delta`] can describe.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Action {
    Add,
    Delete,
}

impl Action {
    /// The wire token of the action.
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Delete => "delete",
        }
    }

    /// Parses a wire token back into an action.
    pub fn from_str_token(token: &str) -> Result<Self, DeltaError> {
        match token {
            "add" => Ok(Self::Add),
            "delete" => Ok(Self::Delete),
            _ => Err(DeltaError::InvalidAction(token.into())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single quad change: the unit of the transaction log.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Delta {
    pub quad: Quad,
    pub action: Action,
}

impl Delta {
    #[inline]
    pub fn add(quad: Quad) -> Self {
        Self {
            quad,
            action: Action::Add,
        }
    }

    #[inline]
    pub fn delete(quad: Quad) -> Self {
        Self {
            quad,
            action: Action::Delete,
        }
    }
}

impl fmt::Display for Delta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The canonical quad form ends with " .\n"; keep deltas single-line.
        let quad = self.quad.to_string();
        write!(f, "{} {}", self.action, quad.trim_end())
    }
}

/// Flags softening [`apply_deltas`](crate::QuadStore::apply_deltas) conflicts.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default, Hash)]
pub struct IgnoreOpts {
    /// Adding an already-present quad is a no-op instead of
    /// [`DeltaError::QuadExists`].
    pub ignore_dup: bool,
    /// Deleting an absent quad is a no-op instead of
    /// [`DeltaError::QuadNotExist`].
    pub ignore_missing: bool,
}

impl IgnoreOpts {
    /// Both flags set: the batch can never conflict.
    pub const IGNORE_ALL: Self = Self {
        ignore_dup: true,
        ignore_missing: true,
    };
}

/// An ordered batch of deltas with append-time coalescing.
///
/// Appending the opposite action for a quad already in the log cancels both
/// out, and appending a duplicate collapses to one entry:
///
/// ```
/// use quiver::Transaction;
/// use qvquad::{Iri, Quad};
///
/// let quad = Quad::new(
///     Iri::new_unchecked("e"),
///     Iri::new_unchecked("follows"),
///     Iri::new_unchecked("g"),
///     None,
/// );
///
/// let mut tx = Transaction::new();
/// tx.add_quad(quad.clone());
/// tx.remove_quad(quad);
/// assert!(tx.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct Transaction {
    deltas: Vec<Option<Delta>>, // tombstones keep indexes in `by_quad` stable
    by_quad: FxHashMap<Quad, usize>,
    len: usize,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an [`Action::Add`] for the quad.
    pub fn add_quad(&mut self, quad: Quad) {
        self.append(Delta::add(quad));
    }

    /// Appends an [`Action::Delete`] for the quad.
    pub fn remove_quad(&mut self, quad: Quad) {
        self.append(Delta::delete(quad));
    }

    /// Appends a delta, coalescing against the existing log.
    pub fn append(&mut self, delta: Delta) {
        if let Some(&at) = self.by_quad.get(&delta.quad) {
            match self.deltas[at].as_ref() {
                // Duplicate: collapse to the first occurrence.
                Some(existing) if existing.action == delta.action => (),
                // Opposite action: the pair cancels out.
                _ => {
                    self.deltas[at] = None;
                    self.by_quad.remove(&delta.quad);
                    self.len -= 1;
                }
            }
            return;
        }
        self.by_quad.insert(delta.quad.clone(), self.deltas.len());
        self.deltas.push(Some(delta));
        self.len += 1;
    }

    /// The surviving deltas, in append order.
    pub fn deltas(&self) -> impl Iterator<Item = &Delta> {
        self.deltas.iter().filter_map(Option::as_ref)
    }

    /// Drains the log into an ordered batch ready for
    /// [`apply_deltas`](crate::QuadStore::apply_deltas).
    pub fn into_deltas(self) -> Vec<Delta> {
        self.deltas.into_iter().flatten().collect()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qvquad::Iri;

    fn quad(s: &str, o: &str) -> Quad {
        Quad::new(
            Iri::new_unchecked(s),
            Iri::new_unchecked("follows"),
            Iri::new_unchecked(o),
            None,
        )
    }

    #[test]
    fn independent_deltas_are_kept_in_order() {
        let mut tx = Transaction::new();
        tx.add_quad(quad("e", "f"));
        tx.add_quad(quad("f", "g"));
        tx.remove_quad(quad("a", "z"));
        assert_eq!(tx.len(), 3);
        let actions: Vec<_> = tx.deltas().map(|d| d.action).collect();
        assert_eq!(actions, [Action::Add, Action::Add, Action::Delete]);
    }

    #[test]
    fn opposite_actions_cancel() {
        let mut tx = Transaction::new();
        tx.add_quad(quad("e", "g"));
        tx.remove_quad(quad("e", "g"));
        assert!(tx.is_empty());
        assert_eq!(tx.into_deltas(), []);
    }

    #[test]
    fn duplicates_collapse() {
        let mut tx = Transaction::new();
        tx.add_quad(quad("e", "g"));
        tx.add_quad(quad("e", "g"));
        assert_eq!(tx.len(), 1);
    }

    #[test]
    fn cancel_then_reappend_survives() {
        let mut tx = Transaction::new();
        tx.add_quad(quad("e", "g"));
        tx.remove_quad(quad("e", "g"));
        tx.remove_quad(quad("e", "g"));
        assert_eq!(tx.len(), 1);
        assert_eq!(
            tx.deltas().next().map(|d| d.action),
            Some(Action::Delete)
        );
    }

    #[test]
    fn action_tokens_round_trip() {
        assert_eq!(Action::from_str_token("add").unwrap(), Action::Add);
        assert_eq!(Action::from_str_token("delete").unwrap(), Action::Delete);
        assert!(matches!(
            Action::from_str_token("upsert"),
            Err(DeltaError::InvalidAction(t)) if t == "upsert"
        ));
    }

    #[test]
    fn delta_displays_on_one_line() {
        let d = Delta::add(quad("e", "g"));
        assert_eq!(d.to_string(), "add <e> <follows> <g> .");
    }
}
