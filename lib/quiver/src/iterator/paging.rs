use crate::error::StoreError;
use crate::iterator::{check_cancelled, Costs, Cursor, CursorKind, ErrorCursor, Null, TagMap, Tagger};
use crate::limits::EvalContext;
use crate::store::QuadStore;
use std::any::Any;

/// Bounded pass-through: at most `limit` results surface. `limit <= 0` means
/// no bound.
pub struct Limit<S: QuadStore> {
    sub: Box<dyn Cursor<S>>,
    limit: i64,
    count: i64,
    err: Option<StoreError>,
    tagger: Tagger<S>,
}

impl<S: QuadStore> Limit<S> {
    pub fn new(sub: Box<dyn Cursor<S>>, limit: i64) -> Self {
        Self {
            sub,
            limit,
            count: 0,
            err: None,
            tagger: Tagger::new(),
        }
    }

    /// Boxes the cursor, rejecting a negative bound as a programmer error.
    pub fn boxed(sub: Box<dyn Cursor<S>>, limit: i64) -> Box<dyn Cursor<S>> {
        if limit < 0 {
            return ErrorCursor::boxed(StoreError::misuse(format!(
                "negative limit: {limit}"
            )));
        }
        Box::new(Self::new(sub, limit))
    }
}

impl<S: QuadStore> Cursor<S> for Limit<S> {
    fn kind(&self) -> CursorKind {
        CursorKind::Limit
    }

    fn next(&mut self, ctx: &EvalContext) -> bool {
        if check_cancelled(ctx, &mut self.err) {
            return false;
        }
        if self.limit > 0 && self.count >= self.limit {
            return false;
        }
        if self.sub.next(ctx) {
            self.count += 1;
            true
        } else {
            false
        }
    }

    fn contains(&mut self, ctx: &EvalContext, v: &S::Ref) -> bool {
        if check_cancelled(ctx, &mut self.err) {
            return false;
        }
        if self.limit > 0 && self.count >= self.limit {
            return false;
        }
        if self.sub.contains(ctx, v) {
            self.count += 1;
            true
        } else {
            false
        }
    }

    fn next_path(&mut self, ctx: &EvalContext) -> bool {
        // Alternative bindings do not count against the limit.
        self.sub.next_path(ctx)
    }

    fn result(&self) -> Option<S::Ref> {
        self.sub.result()
    }

    fn tagger(&mut self) -> &mut Tagger<S> {
        &mut self.tagger
    }

    fn tag_results(&self, dst: &mut TagMap<S>) {
        if let Some(result) = self.sub.result() {
            self.tagger.write_to(dst, &result);
        }
        self.sub.tag_results(dst);
    }

    fn stats(&self) -> Costs {
        let sub = self.sub.stats();
        let mut size = sub.size;
        if self.limit > 0 && size.value > self.limit {
            size.value = self.limit;
        }
        Costs {
            contains_cost: sub.contains_cost,
            next_cost: sub.next_cost,
            size,
        }
    }

    fn sub_cursors(&self) -> Vec<&dyn Cursor<S>> {
        vec![self.sub.as_ref()]
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor<S>>, bool) {
        let mut this = *self;
        let (sub, changed) = std::mem::replace(&mut this.sub, Null::boxed()).optimize();
        this.sub = sub;
        if this.sub.kind() == CursorKind::Null {
            let mut null = Null::new();
            null.tagger().copy_from(&this.tagger);
            return (Box::new(null), true);
        }
        (Box::new(this), changed)
    }

    fn clone_cursor(&self) -> Box<dyn Cursor<S>> {
        let mut out = Self::new(self.sub.clone_cursor(), self.limit);
        out.tagger.copy_from(&self.tagger);
        Box::new(out)
    }

    fn reset(&mut self) {
        self.sub.reset();
        self.count = 0;
        self.err = None;
    }

    fn err(&self) -> Option<&StoreError> {
        self.err.as_ref().or_else(|| self.sub.err())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.sub.close()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Offset pass-through: the first `skip` results are consumed silently.
/// Membership tests are unaffected by the offset.
pub struct Skip<S: QuadStore> {
    sub: Box<dyn Cursor<S>>,
    skip: i64,
    skipped: i64,
    err: Option<StoreError>,
    tagger: Tagger<S>,
}

impl<S: QuadStore> Skip<S> {
    pub fn new(sub: Box<dyn Cursor<S>>, skip: i64) -> Self {
        Self {
            sub,
            skip,
            skipped: 0,
            err: None,
            tagger: Tagger::new(),
        }
    }

    /// Boxes the cursor, rejecting a negative offset as a programmer error.
    pub fn boxed(sub: Box<dyn Cursor<S>>, skip: i64) -> Box<dyn Cursor<S>> {
        if skip < 0 {
            return ErrorCursor::boxed(StoreError::misuse(format!("negative skip: {skip}")));
        }
        Box::new(Self::new(sub, skip))
    }
}

impl<S: QuadStore> Cursor<S> for Skip<S> {
    fn kind(&self) -> CursorKind {
        CursorKind::Skip
    }

    fn next(&mut self, ctx: &EvalContext) -> bool {
        if check_cancelled(ctx, &mut self.err) {
            return false;
        }
        while self.skipped < self.skip {
            if !self.sub.next(ctx) {
                return false;
            }
            self.skipped += 1;
        }
        self.sub.next(ctx)
    }

    fn contains(&mut self, ctx: &EvalContext, v: &S::Ref) -> bool {
        if check_cancelled(ctx, &mut self.err) {
            return false;
        }
        self.sub.contains(ctx, v)
    }

    fn next_path(&mut self, ctx: &EvalContext) -> bool {
        self.sub.next_path(ctx)
    }

    fn result(&self) -> Option<S::Ref> {
        self.sub.result()
    }

    fn tagger(&mut self) -> &mut Tagger<S> {
        &mut self.tagger
    }

    fn tag_results(&self, dst: &mut TagMap<S>) {
        if let Some(result) = self.sub.result() {
            self.tagger.write_to(dst, &result);
        }
        self.sub.tag_results(dst);
    }

    fn stats(&self) -> Costs {
        let sub = self.sub.stats();
        let mut size = sub.size;
        size.value = (size.value - self.skip).max(0);
        Costs {
            contains_cost: sub.contains_cost,
            next_cost: sub.next_cost,
            size,
        }
    }

    fn sub_cursors(&self) -> Vec<&dyn Cursor<S>> {
        vec![self.sub.as_ref()]
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor<S>>, bool) {
        let mut this = *self;
        let (sub, changed) = std::mem::replace(&mut this.sub, Null::boxed()).optimize();
        this.sub = sub;
        if this.sub.kind() == CursorKind::Null {
            let mut null = Null::new();
            null.tagger().copy_from(&this.tagger);
            return (Box::new(null), true);
        }
        if this.skip == 0 && this.tagger.is_empty() {
            return (this.sub, true);
        }
        (Box::new(this), changed)
    }

    fn clone_cursor(&self) -> Box<dyn Cursor<S>> {
        let mut out = Self::new(self.sub.clone_cursor(), self.skip);
        out.tagger.copy_from(&self.tagger);
        Box::new(out)
    }

    fn reset(&mut self) {
        self.sub.reset();
        self.skipped = 0;
        self.err = None;
    }

    fn err(&self) -> Option<&StoreError> {
        self.err.as_ref().or_else(|| self.sub.err())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.sub.close()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::Fixed;
    use crate::store::{MemRef, MemoryStore, RefValue};
    use qvquad::Value;

    fn refs(names: &[&str]) -> Vec<MemRef> {
        names
            .iter()
            .map(|n| MemRef::pre_fetched(Value::from(*n)))
            .collect()
    }

    fn drain(it: &mut dyn Cursor<MemoryStore>) -> Vec<MemRef> {
        let ctx = EvalContext::background();
        let mut out = Vec::new();
        while it.next(&ctx) {
            out.push(it.result().unwrap());
        }
        out
    }

    #[test]
    fn limit_bounds_next() {
        let mut it = Limit::new(Fixed::<MemoryStore>::boxed(refs(&["a", "b", "c"])), 2);
        assert_eq!(drain(&mut it), refs(&["a", "b"]));
    }

    #[test]
    fn zero_limit_is_unbounded() {
        let mut it = Limit::new(Fixed::<MemoryStore>::boxed(refs(&["a", "b"])), 0);
        assert_eq!(drain(&mut it), refs(&["a", "b"]));
    }

    #[test]
    fn skip_consumes_the_head() {
        let mut it = Skip::new(Fixed::<MemoryStore>::boxed(refs(&["a", "b", "c"])), 2);
        assert_eq!(drain(&mut it), refs(&["c"]));
    }

    #[test]
    fn skip_past_the_end_is_empty() {
        let mut it = Skip::new(Fixed::<MemoryStore>::boxed(refs(&["a"])), 5);
        assert_eq!(drain(&mut it), refs(&[]));
    }

    #[test]
    fn negative_bounds_are_programmer_errors() {
        let ctx = EvalContext::background();
        let mut it = Limit::boxed(Fixed::<MemoryStore>::boxed(refs(&["a"])), -1);
        assert!(!it.next(&ctx));
        assert!(matches!(it.err(), Some(StoreError::Misuse(_))));

        let mut it = Skip::boxed(Fixed::<MemoryStore>::boxed(refs(&["a"])), -3);
        assert!(!it.next(&ctx));
        assert!(matches!(it.err(), Some(StoreError::Misuse(_))));
    }

    #[test]
    fn skip_then_limit_pages() {
        let inner = Skip::boxed(Fixed::<MemoryStore>::boxed(refs(&["a", "b", "c", "d"])), 1);
        let mut it = Limit::new(inner, 2);
        assert_eq!(drain(&mut it), refs(&["b", "c"]));
    }
}
