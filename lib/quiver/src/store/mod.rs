//! The contract every storage driver satisfies, and the in-memory reference
//! driver.

mod memory;

pub use self::memory::{MemRef, MemoryStore};

use crate::delta::{Delta, IgnoreOpts, Transaction};
use crate::error::{DeltaError, StoreError};
use crate::iterator::Cursor;
use crate::shape::Shape;
use qvquad::{Direction, Quad, Value};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::hash::Hash;

/// A backend-opaque handle for a node or a quad.
///
/// Refs are only valid within the store that minted them. The `Eq + Hash`
/// bounds make every ref its own comparison key, so generic code never relies
/// on pointer identity.
pub trait RefValue: Clone + Eq + Hash + Debug + 'static {
    /// Whether this ref names a node (as opposed to a quad).
    fn is_node(&self) -> bool;

    /// Wraps a value the engine computed itself (a count, a constant) into a
    /// ref that resolves without touching storage.
    fn pre_fetched(value: Value) -> Self;

    /// The wrapped value, if this ref was built by [`RefValue::pre_fetched`].
    fn as_pre_fetched(&self) -> Option<&Value>;
}

/// A size estimate, trusted only when `exact` is set.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default, Hash)]
pub struct Size {
    pub value: i64,
    pub exact: bool,
}

impl Size {
    #[inline]
    pub const fn exact(value: i64) -> Self {
        Self { value, exact: true }
    }

    #[inline]
    pub const fn around(value: i64) -> Self {
        Self {
            value,
            exact: false,
        }
    }
}

/// Node and quad counts reported by [`QuadStore::stats`].
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub struct StoreStats {
    pub nodes: Size,
    pub quads: Size,
}

/// The contract every storage driver must provide.
///
/// A store handle is a cheap clone sharing the underlying storage, safe for
/// concurrent use by multiple cursors. Reads are safe alongside a writer;
/// [`QuadStore::apply_deltas`] must appear atomic to readers that start after
/// it returns.
pub trait QuadStore: Clone + 'static {
    /// The driver's opaque node/quad handle.
    type Ref: RefValue;

    /// The ref for a value, or `None` when absent. Lookup never creates.
    fn value_of(&self, v: &Value) -> Option<Self::Ref>;

    /// The value behind a node ref, or `None` when unknown.
    fn name_of(&self, r: &Self::Ref) -> Option<Value>;

    /// Decodes a quad ref into the full quad.
    fn quad(&self, r: &Self::Ref) -> Result<Quad, StoreError>;

    /// The node ref in position `d` of the quad `r`, or `None` when the
    /// position is empty (absent label) or `r` is not a quad ref.
    fn quad_direction(&self, r: &Self::Ref, d: Direction) -> Option<Self::Ref>;

    /// All quads having `v` in direction `d`, without duplicates.
    fn quad_iterator(&self, d: Direction, v: &Self::Ref) -> Box<dyn Cursor<Self>>;

    /// Every node referenced by at least one stored quad, exactly once,
    /// in unspecified order.
    fn nodes_all_iterator(&self) -> Box<dyn Cursor<Self>>;

    /// Every stored quad, exactly once, in unspecified order.
    fn quads_all_iterator(&self) -> Box<dyn Cursor<Self>>;

    /// Applies an ordered batch atomically: on conflict the whole batch is
    /// rejected and the store is unchanged.
    fn apply_deltas(&self, deltas: &[Delta], opts: IgnoreOpts) -> Result<(), DeltaError>;

    /// Applies a coalesced [`Transaction`] with the default (strict) options.
    fn apply_transaction(&self, tx: Transaction) -> Result<(), DeltaError> {
        self.apply_deltas(&tx.into_deltas(), IgnoreOpts::default())
    }

    /// Node and quad counts. `exact` may force a full scan on backends that
    /// only keep estimates.
    fn stats(&self, exact: bool) -> Result<StoreStats, StoreError>;

    /// Releases the resources held by the store.
    fn close(&self) -> Result<(), StoreError>;

    /// The store's observability counters, if the driver keeps any.
    fn metrics(&self) -> Option<&crate::metrics::StoreMetrics> {
        None
    }

    /// The store-specific [`Shape`] rewriter, if the driver has one.
    fn shape_optimizer(&self) -> Option<&dyn ShapeOptimizer<Self>> {
        None
    }

    /// The store-specific cursor rewriter, if the driver has one.
    fn iterator_optimizer(&self) -> Option<&dyn IteratorOptimizer<Self>> {
        None
    }

    /// The quad index inspector, if the driver has one.
    fn quad_indexer(&self) -> Option<&dyn QuadIndexer<Self>> {
        None
    }
}

/// A per-direction constraint on a single quad, used by [`QuadIndexer`].
pub type DirectionFilter<S> = BTreeMap<Direction, <S as QuadStore>::Ref>;

/// Store capability: swapping [`Shape`] sub-trees for native implementations.
pub trait ShapeOptimizer<S: QuadStore> {
    /// Rewrites the shape, returning whether anything was replaced.
    fn optimize_shape(&self, shape: Shape<S>) -> (Shape<S>, bool);
}

/// Store capability: swapping cursors for native implementations.
pub trait IteratorOptimizer<S: QuadStore> {
    /// Rewrites the cursor, returning whether anything was replaced.
    fn optimize_iterator(&self, it: Box<dyn Cursor<S>>) -> (Box<dyn Cursor<S>>, bool);
}

/// Store capability: interrogating quad indexes, driving cost-based choices
/// and single-match folding.
pub trait QuadIndexer<S: QuadStore> {
    /// The number of quads matching the filter, according to the index.
    fn size_of_index(&self, filter: &DirectionFilter<S>) -> Option<Size>;

    /// The single quad matching the filter, when the index proves there is
    /// exactly one.
    fn lookup_quad_index(&self, filter: &DirectionFilter<S>) -> Option<S::Ref>;
}
