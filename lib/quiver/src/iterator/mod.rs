//! The cursor runtime: stateful iterators over refs with a
//! `next`/`contains`/`next_path` protocol and cost-based optimization.
//!
//! A [`Cursor`] is driven in exactly this pattern:
//!
//! ```text
//! while cursor.next(ctx) {
//!     emit(cursor.result(), tags);
//!     while cursor.next_path(ctx) {
//!         emit(cursor.result(), tags); // same result, different bindings
//!     }
//! }
//! ```
//!
//! `next_path` surfaces additional witness bindings for the current result
//! without advancing it, and is guaranteed to eventually return `false`.
//! Cursors are single-threaded; parallel evaluation clones the root and
//! drives independent cursors.

mod and;
mod comparison;
mod count;
mod fixed;
mod hasa;
mod linksto;
mod materialize;
mod not;
mod optional;
mod or;
mod paging;
mod regexp;
mod save;
mod sort;
mod unique;

pub use self::and::And;
pub use self::comparison::{CmpOp, Comparison};
pub use self::count::Count;
pub use self::fixed::Fixed;
pub use self::hasa::HasA;
pub use self::linksto::LinksTo;
pub use self::materialize::{materialize_threshold, set_materialize_threshold, Materialize};
pub use self::not::Not;
pub use self::optional::Optional;
pub use self::or::Or;
pub use self::paging::{Limit, Skip};
pub use self::regexp::Regexp;
pub use self::save::{FixedTags, Save};
pub use self::sort::Sort;
pub use self::unique::Unique;

use crate::error::StoreError;
use crate::limits::EvalContext;
use crate::store::{QuadStore, Size};
use std::any::Any;
use std::collections::HashMap;

/// Tag bindings recorded for one emitted result.
pub type TagMap<S> = HashMap<String, <S as QuadStore>::Ref>;

/// Relative cost estimates used by the optimizer.
///
/// Costs have no unit; the optimizer only compares them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Costs {
    pub contains_cost: i64,
    pub next_cost: i64,
    pub size: Size,
}

/// The concrete kind of a cursor, used by optimizer rewrites to recognise
/// sub-trees without downcasting first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum CursorKind {
    Null,
    Error,
    Fixed,
    /// A backend-provided universe cursor (all nodes or all quads).
    All,
    And,
    Or,
    HasA,
    LinksTo,
    Not,
    Unique,
    Save,
    FixedTags,
    Optional,
    Materialize,
    Count,
    Limit,
    Skip,
    Comparison,
    Regexp,
    Sort,
    /// A backend-native cursor (index scan...).
    Custom,
}

/// A stateful cursor over refs.
///
/// See the [module documentation](self) for the drive protocol. Errors do not
/// interrupt the control flow: the first one is recorded, subsequent calls
/// return `false` and the consumer picks the error up through
/// [`Cursor::err`] after draining.
pub trait Cursor<S: QuadStore> {
    /// The concrete kind of this cursor.
    fn kind(&self) -> CursorKind;

    /// Advances to the next result. The result is read with [`Cursor::result`].
    fn next(&mut self, ctx: &EvalContext) -> bool;

    /// Tests whether `v` belongs to this cursor. On `true` the cursor's
    /// result is `v` and its tags reflect the accepting bindings.
    fn contains(&mut self, ctx: &EvalContext, v: &S::Ref) -> bool;

    /// Advances to the next alternative binding yielding the same result.
    ///
    /// Only meaningful after a successful [`Cursor::next`] or
    /// [`Cursor::contains`]; eventually returns `false` without changing the
    /// result.
    fn next_path(&mut self, ctx: &EvalContext) -> bool;

    /// The value most recently yielded by `next` or accepted by `contains`.
    fn result(&self) -> Option<S::Ref>;

    /// The tags attached to this cursor.
    fn tagger(&mut self) -> &mut Tagger<S>;

    /// Writes the bindings of the current result into `dst`, recursing into
    /// sub-cursors.
    fn tag_results(&self, dst: &mut TagMap<S>);

    /// Cost and size estimates for the optimizer.
    fn stats(&self) -> Costs;

    /// The direct sub-cursors, for inspection.
    fn sub_cursors(&self) -> Vec<&dyn Cursor<S>>;

    /// Rewrites this cursor bottom-up, returning whether anything changed.
    fn optimize(self: Box<Self>) -> (Box<dyn Cursor<S>>, bool);

    /// A fresh cursor over the same data, sharing nothing with this one
    /// except the backend.
    fn clone_cursor(&self) -> Box<dyn Cursor<S>>;

    /// Rewinds to the initial state, keeping tags.
    fn reset(&mut self);

    /// The first error this cursor or its sub-cursors hit.
    fn err(&self) -> Option<&StoreError>;

    /// Releases resources. The cursor must not be used afterwards.
    fn close(&mut self) -> Result<(), StoreError>;

    /// Type-erasure escape hatch for optimizer rewrites.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

/// Free and fixed tags attached to one cursor.
///
/// Free tags bind to the cursor's current result; fixed tags always bind to
/// the ref they were registered with.
#[derive(Debug, Clone)]
pub struct Tagger<S: QuadStore> {
    tags: Vec<String>,
    fixed: Vec<(String, S::Ref)>,
}

impl<S: QuadStore> Tagger<S> {
    pub fn new() -> Self {
        Self {
            tags: Vec::new(),
            fixed: Vec::new(),
        }
    }

    /// Adds a free tag. Duplicates are kept once.
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    pub fn add_tags<T: Into<String>>(&mut self, tags: impl IntoIterator<Item = T>) {
        for tag in tags {
            self.add_tag(tag);
        }
    }

    /// Adds a tag bound to a constant ref.
    pub fn add_fixed(&mut self, tag: impl Into<String>, value: S::Ref) {
        let tag = tag.into();
        if let Some(entry) = self.fixed.iter_mut().find(|(t, _)| *t == tag) {
            entry.1 = value;
        } else {
            self.fixed.push((tag, value));
        }
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn fixed(&self) -> &[(String, S::Ref)] {
        &self.fixed
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.fixed.is_empty()
    }

    /// Merges every tag of `other` into this tagger.
    pub fn copy_from(&mut self, other: &Self) {
        for tag in &other.tags {
            self.add_tag(tag.clone());
        }
        for (tag, value) in &other.fixed {
            self.add_fixed(tag.clone(), value.clone());
        }
    }

    /// Binds the tags to `result` and writes them into `dst`.
    pub fn write_to(&self, dst: &mut TagMap<S>, result: &S::Ref) {
        for tag in &self.tags {
            dst.insert(tag.clone(), result.clone());
        }
        for (tag, value) in &self.fixed {
            dst.insert(tag.clone(), value.clone());
        }
    }
}

impl<S: QuadStore> Default for Tagger<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the cursor's own bottom-up optimization, then gives the backend's
/// [`IteratorOptimizer`](crate::store::IteratorOptimizer) the last word.
pub fn optimize_cursor<S: QuadStore>(store: &S, it: Box<dyn Cursor<S>>) -> Box<dyn Cursor<S>> {
    let (it, _) = it.optimize();
    if let Some(hook) = store.iterator_optimizer() {
        let (it, _) = hook.optimize_iterator(it);
        return it;
    }
    it
}

/// Records `error` as the cursor error unless one is already recorded.
pub(crate) fn record_err(slot: &mut Option<StoreError>, error: StoreError) {
    if slot.is_none() {
        *slot = Some(error);
    }
}

/// Checks the context; on cancellation records the error and returns `true`.
pub(crate) fn check_cancelled(ctx: &EvalContext, slot: &mut Option<StoreError>) -> bool {
    if ctx.done() {
        record_err(slot, StoreError::Cancelled);
        true
    } else {
        false
    }
}

/// The empty cursor: `next` and `contains` are always `false`.
#[derive(Debug)]
pub struct Null<S: QuadStore> {
    tagger: Tagger<S>,
}

impl<S: QuadStore> Null<S> {
    pub fn new() -> Self {
        Self {
            tagger: Tagger::new(),
        }
    }

    pub fn boxed() -> Box<dyn Cursor<S>> {
        Box::new(Self::new())
    }
}

impl<S: QuadStore> Default for Null<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: QuadStore> Cursor<S> for Null<S> {
    fn kind(&self) -> CursorKind {
        CursorKind::Null
    }

    fn next(&mut self, _ctx: &EvalContext) -> bool {
        false
    }

    fn contains(&mut self, _ctx: &EvalContext, _v: &S::Ref) -> bool {
        false
    }

    fn next_path(&mut self, _ctx: &EvalContext) -> bool {
        false
    }

    fn result(&self) -> Option<S::Ref> {
        None
    }

    fn tagger(&mut self) -> &mut Tagger<S> {
        &mut self.tagger
    }

    fn tag_results(&self, _dst: &mut TagMap<S>) {}

    fn stats(&self) -> Costs {
        Costs {
            contains_cost: 0,
            next_cost: 0,
            size: Size::exact(0),
        }
    }

    fn sub_cursors(&self) -> Vec<&dyn Cursor<S>> {
        Vec::new()
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor<S>>, bool) {
        (self, false)
    }

    fn clone_cursor(&self) -> Box<dyn Cursor<S>> {
        let mut out = Self::new();
        out.tagger.copy_from(&self.tagger);
        Box::new(out)
    }

    fn reset(&mut self) {}

    fn err(&self) -> Option<&StoreError> {
        None
    }

    fn close(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A cursor carrying a fatal error, yielding nothing.
///
/// Used where construction itself fails (negative paging bounds, misuse);
/// the error surfaces through [`Cursor::err`] like any runtime failure.
#[derive(Debug)]
pub struct ErrorCursor<S: QuadStore> {
    error: Option<StoreError>,
    tagger: Tagger<S>,
}

impl<S: QuadStore> ErrorCursor<S> {
    pub fn new(error: StoreError) -> Self {
        Self {
            error: Some(error),
            tagger: Tagger::new(),
        }
    }

    pub fn boxed(error: StoreError) -> Box<dyn Cursor<S>> {
        Box::new(Self::new(error))
    }
}

impl<S: QuadStore> Cursor<S> for ErrorCursor<S> {
    fn kind(&self) -> CursorKind {
        CursorKind::Error
    }

    fn next(&mut self, _ctx: &EvalContext) -> bool {
        false
    }

    fn contains(&mut self, _ctx: &EvalContext, _v: &S::Ref) -> bool {
        false
    }

    fn next_path(&mut self, _ctx: &EvalContext) -> bool {
        false
    }

    fn result(&self) -> Option<S::Ref> {
        None
    }

    fn tagger(&mut self) -> &mut Tagger<S> {
        &mut self.tagger
    }

    fn tag_results(&self, _dst: &mut TagMap<S>) {}

    fn stats(&self) -> Costs {
        Costs {
            contains_cost: 0,
            next_cost: 0,
            size: Size::exact(0),
        }
    }

    fn sub_cursors(&self) -> Vec<&dyn Cursor<S>> {
        Vec::new()
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor<S>>, bool) {
        (self, false)
    }

    fn clone_cursor(&self) -> Box<dyn Cursor<S>> {
        Box::new(Self {
            error: self.error.as_ref().map(clone_store_error),
            tagger: self.tagger.clone(),
        })
    }

    fn reset(&mut self) {}

    fn err(&self) -> Option<&StoreError> {
        self.error.as_ref()
    }

    fn close(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Best-effort structural clone of an error, for cursors whose clones must
/// carry the same failure.
pub(crate) fn clone_store_error(error: &StoreError) -> StoreError {
    match error {
        StoreError::Io(e) => StoreError::Io(std::io::Error::new(e.kind(), e.to_string())),
        StoreError::Corruption(e) => {
            StoreError::Corruption(crate::error::CorruptionError::Msg(e.to_string()))
        }
        StoreError::Cancelled => StoreError::Cancelled,
        StoreError::DatabaseExists => StoreError::DatabaseExists,
        StoreError::DatabaseNotInitialized => StoreError::DatabaseNotInitialized,
        StoreError::Misuse(msg) => StoreError::Misuse(msg.clone()),
        other => StoreError::Misuse(other.to_string()),
    }
}
