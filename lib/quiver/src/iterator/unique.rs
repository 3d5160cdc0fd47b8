use crate::error::StoreError;
use crate::iterator::{check_cancelled, Costs, Cursor, CursorKind, Null, TagMap, Tagger};
use crate::limits::EvalContext;
use crate::store::{QuadStore, Size};
use rustc_hash::FxHashSet;
use std::any::Any;

/// Deduplication of a sub-cursor.
///
/// Every surfaced ref is remembered; `next` skips refs seen before, and
/// `next_path` is suppressed so that one ref is emitted exactly once, with a
/// single binding.
pub struct Unique<S: QuadStore> {
    sub: Box<dyn Cursor<S>>,
    seen: FxHashSet<S::Ref>,
    result: Option<S::Ref>,
    err: Option<StoreError>,
    tagger: Tagger<S>,
}

impl<S: QuadStore> Unique<S> {
    pub fn new(sub: Box<dyn Cursor<S>>) -> Self {
        Self {
            sub,
            seen: FxHashSet::default(),
            result: None,
            err: None,
            tagger: Tagger::new(),
        }
    }

    pub fn boxed(sub: Box<dyn Cursor<S>>) -> Box<dyn Cursor<S>> {
        Box::new(Self::new(sub))
    }
}

impl<S: QuadStore> Cursor<S> for Unique<S> {
    fn kind(&self) -> CursorKind {
        CursorKind::Unique
    }

    fn next(&mut self, ctx: &EvalContext) -> bool {
        if check_cancelled(ctx, &mut self.err) {
            return false;
        }
        loop {
            if !self.sub.next(ctx) {
                self.result = None;
                return false;
            }
            let Some(candidate) = self.sub.result() else {
                self.result = None;
                return false;
            };
            if self.seen.insert(candidate.clone()) {
                self.result = Some(candidate);
                return true;
            }
            if check_cancelled(ctx, &mut self.err) {
                self.result = None;
                return false;
            }
        }
    }

    fn contains(&mut self, ctx: &EvalContext, v: &S::Ref) -> bool {
        if check_cancelled(ctx, &mut self.err) {
            return false;
        }
        // Dedup only constrains enumeration; membership is the sub's.
        if self.sub.contains(ctx, v) {
            self.seen.insert(v.clone());
            self.result = Some(v.clone());
            true
        } else {
            false
        }
    }

    fn next_path(&mut self, _ctx: &EvalContext) -> bool {
        // Alternative bindings would surface the same ref again.
        false
    }

    fn result(&self) -> Option<S::Ref> {
        self.result.clone()
    }

    fn tagger(&mut self) -> &mut Tagger<S> {
        &mut self.tagger
    }

    fn tag_results(&self, dst: &mut TagMap<S>) {
        if let Some(result) = &self.result {
            self.tagger.write_to(dst, result);
        }
        self.sub.tag_results(dst);
    }

    fn stats(&self) -> Costs {
        let sub = self.sub.stats();
        Costs {
            contains_cost: sub.contains_cost,
            next_cost: sub.next_cost,
            size: Size::around(sub.size.value / 2 + 1),
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
        let mut out = Self::new(self.sub.clone_cursor());
        out.tagger.copy_from(&self.tagger);
        Box::new(out)
    }

    fn reset(&mut self) {
        self.sub.reset();
        self.seen.clear();
        self.result = None;
        self.err = None;
    }

    fn err(&self) -> Option<&StoreError> {
        self.err.as_ref().or_else(|| self.sub.err())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.seen = FxHashSet::default();
        self.sub.close()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}
