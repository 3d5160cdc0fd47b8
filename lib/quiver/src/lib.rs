#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod delta;
mod error;
pub mod io;
pub mod iterate;
pub mod iterator;
mod limits;
pub mod metrics;
mod shape;
mod store;

pub use crate::delta::{Action, Delta, IgnoreOpts, Transaction};
pub use crate::error::{CorruptionError, DeltaError, StoreError};
pub use crate::iterator::{
    materialize_threshold, optimize_cursor, set_materialize_threshold, And, CmpOp, Comparison,
    Costs, Count, Cursor, CursorKind, ErrorCursor, Fixed, FixedTags, HasA, Limit, LinksTo,
    Materialize, Not, Null, Optional, Or, Regexp, Save, Skip, Sort, TagMap, Tagger, Unique,
};
pub use crate::limits::{CancelSignal, EvalContext};
pub use crate::metrics::{QueryTimer, StoreMetrics};
pub use crate::shape::{QuadFilter, QuadsAction, Shape, ValueFilter};
pub use crate::store::{
    DirectionFilter, IteratorOptimizer, MemRef, MemoryStore, QuadIndexer, QuadStore, RefValue,
    ShapeOptimizer, Size, StoreStats,
};
