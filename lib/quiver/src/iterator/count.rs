use crate::error::StoreError;
use crate::iterator::{check_cancelled, record_err, Costs, Cursor, CursorKind, Null, TagMap, Tagger};
use crate::limits::EvalContext;
use crate::store::{QuadStore, RefValue, Size};
use qvquad::Value;
use std::any::Any;

/// A single-value cursor emitting the number of results of the sub-cursor.
///
/// The count surfaces as a pre-fetched [`Value::Int`] ref, so it never needs
/// to exist in storage.
pub struct Count<S: QuadStore> {
    sub: Box<dyn Cursor<S>>,
    count: Option<i64>,
    done: bool,
    result: Option<S::Ref>,
    err: Option<StoreError>,
    tagger: Tagger<S>,
}

impl<S: QuadStore> Count<S> {
    pub fn new(sub: Box<dyn Cursor<S>>) -> Self {
        Self {
            sub,
            count: None,
            done: false,
            result: None,
            err: None,
            tagger: Tagger::new(),
        }
    }

    pub fn boxed(sub: Box<dyn Cursor<S>>) -> Box<dyn Cursor<S>> {
        Box::new(Self::new(sub))
    }

    fn compute(&mut self, ctx: &EvalContext) -> Option<i64> {
        if let Some(count) = self.count {
            return Some(count);
        }
        let stats = self.sub.stats();
        let count = if stats.size.exact {
            stats.size.value
        } else {
            let mut count = 0_i64;
            while self.sub.next(ctx) {
                if check_cancelled(ctx, &mut self.err) {
                    return None;
                }
                count += 1;
                while self.sub.next_path(ctx) {
                    count += 1;
                }
            }
            if let Some(e) = self.sub.err() {
                record_err(&mut self.err, crate::iterator::clone_store_error(e));
                return None;
            }
            count
        };
        self.count = Some(count);
        Some(count)
    }
}

impl<S: QuadStore> Cursor<S> for Count<S> {
    fn kind(&self) -> CursorKind {
        CursorKind::Count
    }

    fn next(&mut self, ctx: &EvalContext) -> bool {
        if check_cancelled(ctx, &mut self.err) {
            return false;
        }
        if self.done {
            self.result = None;
            return false;
        }
        let Some(count) = self.compute(ctx) else {
            return false;
        };
        self.result = Some(S::Ref::pre_fetched(Value::Int(count)));
        self.done = true;
        true
    }

    fn contains(&mut self, ctx: &EvalContext, v: &S::Ref) -> bool {
        if check_cancelled(ctx, &mut self.err) {
            return false;
        }
        let Some(count) = self.compute(ctx) else {
            return false;
        };
        if v.as_pre_fetched() == Some(&Value::Int(count)) {
            self.result = Some(v.clone());
            true
        } else {
            false
        }
    }

    fn next_path(&mut self, _ctx: &EvalContext) -> bool {
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
    }

    fn stats(&self) -> Costs {
        let sub = self.sub.stats();
        Costs {
            contains_cost: sub.next_cost.saturating_mul(sub.size.value.max(1)),
            next_cost: if sub.size.exact {
                1
            } else {
                sub.next_cost.saturating_mul(sub.size.value.max(1))
            },
            size: Size::exact(1),
        }
    }

    fn sub_cursors(&self) -> Vec<&dyn Cursor<S>> {
        vec![self.sub.as_ref()]
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor<S>>, bool) {
        let mut this = *self;
        let (sub, changed) = std::mem::replace(&mut this.sub, Null::boxed()).optimize();
        this.sub = sub;
        (Box::new(this), changed)
    }

    fn clone_cursor(&self) -> Box<dyn Cursor<S>> {
        let mut out = Self::new(self.sub.clone_cursor());
        out.tagger.copy_from(&self.tagger);
        Box::new(out)
    }

    fn reset(&mut self) {
        self.sub.reset();
        self.count = None;
        self.done = false;
        self.result = None;
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
    use crate::iterator::{Fixed, Unique};
    use crate::store::{MemRef, MemoryStore};

    fn refs(names: &[&str]) -> Vec<MemRef> {
        names
            .iter()
            .map(|n| MemRef::pre_fetched(Value::from(*n)))
            .collect()
    }

    #[test]
    fn emits_the_exact_size_once() {
        let ctx = EvalContext::background();
        let mut it = Count::new(Fixed::<MemoryStore>::boxed(refs(&["a", "b", "c"])));
        assert!(it.next(&ctx));
        assert_eq!(it.result(), Some(MemRef::pre_fetched(Value::Int(3))));
        assert!(!it.next(&ctx));
    }

    #[test]
    fn counts_by_draining_when_inexact() {
        let ctx = EvalContext::background();
        // Unique reports an inexact size, forcing a drain.
        let sub = Unique::boxed(Fixed::<MemoryStore>::boxed(refs(&["a", "b", "a"])));
        let mut it = Count::new(sub);
        assert!(it.next(&ctx));
        assert_eq!(it.result(), Some(MemRef::pre_fetched(Value::Int(2))));
    }

    #[test]
    fn contains_matches_only_the_count() {
        let ctx = EvalContext::background();
        let mut it = Count::new(Fixed::<MemoryStore>::boxed(refs(&["a", "b"])));
        assert!(it.contains(&ctx, &MemRef::pre_fetched(Value::Int(2))));
        assert!(!it.contains(&ctx, &MemRef::pre_fetched(Value::Int(3))));
        assert!(!it.contains(&ctx, &MemRef::pre_fetched(Value::from("a"))));
    }
}
