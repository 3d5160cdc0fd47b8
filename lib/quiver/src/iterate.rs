//! The canonical cursor consumers.
//!
//! Drains a cursor in the protocol order (`next`, then every `next_path`),
//! collects tag bindings, closes the cursor and surfaces the first recorded
//! error. Parallel evaluation slices work by cloning the root cursor, not by
//! sharing one.

use crate::error::StoreError;
use crate::iterator::{clone_store_error, Cursor, TagMap};
use crate::limits::EvalContext;
use crate::metrics::QueryTimer;
use crate::store::QuadStore;
use qvquad::Value;

/// Drives the cursor to exhaustion, calling `f` once per binding.
///
/// ```
/// use quiver::{iterate, EvalContext, Fixed, MemRef, MemoryStore, RefValue};
/// use qvquad::Value;
///
/// let cursor = Fixed::<MemoryStore>::boxed(vec![
///     MemRef::pre_fetched(Value::from("a")),
///     MemRef::pre_fetched(Value::from("b")),
/// ]);
/// let mut seen = Vec::new();
/// iterate::each_with_tags(cursor, &EvalContext::background(), |r, _tags| {
///     seen.push(r.clone());
/// })?;
/// assert_eq!(seen.len(), 2);
/// # Result::<_, quiver::StoreError>::Ok(())
/// ```
pub fn each_with_tags<S: QuadStore>(
    mut cursor: Box<dyn Cursor<S>>,
    ctx: &EvalContext,
    mut f: impl FnMut(&S::Ref, &TagMap<S>),
) -> Result<(), StoreError> {
    while cursor.next(ctx) {
        let Some(result) = cursor.result() else { break };
        let mut tags = TagMap::<S>::new();
        cursor.tag_results(&mut tags);
        f(&result, &tags);
        while cursor.next_path(ctx) {
            let mut tags = TagMap::<S>::new();
            cursor.tag_results(&mut tags);
            f(&result, &tags);
        }
    }
    finish(cursor)
}

/// Collects every surfaced ref, including repeats from alternative paths.
pub fn collect_refs<S: QuadStore>(
    cursor: Box<dyn Cursor<S>>,
    ctx: &EvalContext,
) -> Result<Vec<S::Ref>, StoreError> {
    let mut out = Vec::new();
    each_with_tags(cursor, ctx, |r, _| out.push(r.clone()))?;
    Ok(out)
}

/// Collects the values behind every surfaced ref, resolving them through the
/// store and recording query metrics on stores that keep them.
pub fn collect_values<S: QuadStore>(
    store: &S,
    cursor: Box<dyn Cursor<S>>,
    ctx: &EvalContext,
) -> Result<Vec<Value>, StoreError> {
    let timer = QueryTimer::start();
    let mut out = Vec::new();
    let result = each_with_tags(cursor, ctx, |r, _| {
        if let Some(value) = store.name_of(r) {
            out.push(value);
        }
    });
    record_query_metrics(store, timer, result.is_err());
    result?;
    Ok(out)
}

/// Counts the bindings without keeping them.
pub fn count<S: QuadStore>(
    cursor: Box<dyn Cursor<S>>,
    ctx: &EvalContext,
) -> Result<u64, StoreError> {
    let mut n = 0_u64;
    each_with_tags(cursor, ctx, |_, _| n += 1)?;
    Ok(n)
}

fn record_query_metrics<S: QuadStore>(store: &S, timer: QueryTimer, error: bool) {
    if let Some(metrics) = store.metrics() {
        metrics.record_query(timer.elapsed_ms(), error);
    }
}

fn finish<S: QuadStore>(mut cursor: Box<dyn Cursor<S>>) -> Result<(), StoreError> {
    let err = cursor.err().map(clone_store_error);
    cursor.close()?;
    match err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::{Fixed, Save};
    use crate::store::{MemRef, MemoryStore, RefValue};

    fn refs(names: &[&str]) -> Vec<MemRef> {
        names
            .iter()
            .map(|n| MemRef::pre_fetched(Value::from(*n)))
            .collect()
    }

    #[test]
    fn tags_are_collected_per_binding() {
        let cursor = Save::boxed(Fixed::<MemoryStore>::boxed(refs(&["a", "b"])), ["x"]);
        let mut bindings = Vec::new();
        each_with_tags(cursor, &EvalContext::background(), |r, tags| {
            bindings.push((r.clone(), tags["x"].clone()));
        })
        .unwrap();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].0, bindings[0].1);
    }

    #[test]
    fn cancellation_surfaces_as_an_error() {
        let (ctx, cancel) = EvalContext::cancelable();
        cancel.cancel();
        let cursor = crate::iterator::Unique::boxed(Fixed::<MemoryStore>::boxed(refs(&["a"])));
        let result = collect_refs(cursor, &ctx);
        assert!(matches!(result, Err(StoreError::Cancelled)));
    }

    #[test]
    fn count_counts_bindings() {
        let cursor = Fixed::<MemoryStore>::boxed(refs(&["a", "b", "c"]));
        assert_eq!(count(cursor, &EvalContext::background()).unwrap(), 3);
    }
}
