use crate::error::StoreError;
use crate::iterator::{check_cancelled, Costs, Cursor, CursorKind, Null, TagMap, Tagger};
use crate::limits::EvalContext;
use crate::store::{QuadStore, Size};
use std::any::Any;

/// Complement of a sub-cursor against a universe.
///
/// `next` walks the universe and skips everything the sub-cursor accepts;
/// `contains` is the direct complement test, still bounded by the universe.
pub struct Not<S: QuadStore> {
    sub: Box<dyn Cursor<S>>,
    universe: Box<dyn Cursor<S>>,
    result: Option<S::Ref>,
    err: Option<StoreError>,
    tagger: Tagger<S>,
}

impl<S: QuadStore> Not<S> {
    pub fn new(sub: Box<dyn Cursor<S>>, universe: Box<dyn Cursor<S>>) -> Self {
        Self {
            sub,
            universe,
            result: None,
            err: None,
            tagger: Tagger::new(),
        }
    }

    pub fn boxed(sub: Box<dyn Cursor<S>>, universe: Box<dyn Cursor<S>>) -> Box<dyn Cursor<S>> {
        Box::new(Self::new(sub, universe))
    }
}

impl<S: QuadStore> Cursor<S> for Not<S> {
    fn kind(&self) -> CursorKind {
        CursorKind::Not
    }

    fn next(&mut self, ctx: &EvalContext) -> bool {
        if check_cancelled(ctx, &mut self.err) {
            return false;
        }
        loop {
            if !self.universe.next(ctx) {
                self.result = None;
                return false;
            }
            let Some(candidate) = self.universe.result() else {
                self.result = None;
                return false;
            };
            if check_cancelled(ctx, &mut self.err) {
                self.result = None;
                return false;
            }
            if !self.sub.contains(ctx, &candidate) {
                if self.sub.err().is_some() {
                    self.result = None;
                    return false;
                }
                self.result = Some(candidate);
                return true;
            }
        }
    }

    fn contains(&mut self, ctx: &EvalContext, v: &S::Ref) -> bool {
        if check_cancelled(ctx, &mut self.err) {
            return false;
        }
        if self.sub.contains(ctx, v) {
            return false;
        }
        if self.sub.err().is_some() {
            return false;
        }
        if self.universe.contains(ctx, v) {
            self.result = Some(v.clone());
            true
        } else {
            false
        }
    }

    fn next_path(&mut self, _ctx: &EvalContext) -> bool {
        // An excluded result has exactly one witness: its absence.
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
        let universe = self.universe.stats();
        let sub = self.sub.stats();
        Costs {
            contains_cost: sub.contains_cost + universe.contains_cost,
            next_cost: universe.next_cost + sub.contains_cost,
            size: Size::around(universe.size.value),
        }
    }

    fn sub_cursors(&self) -> Vec<&dyn Cursor<S>> {
        vec![self.sub.as_ref(), self.universe.as_ref()]
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor<S>>, bool) {
        let mut this = *self;
        let (sub, sub_changed) = std::mem::replace(&mut this.sub, Null::boxed()).optimize();
        let (universe, uni_changed) =
            std::mem::replace(&mut this.universe, Null::boxed()).optimize();
        let mut changed = sub_changed || uni_changed;
        this.sub = sub;
        this.universe = universe;

        match this.sub.kind() {
            // Not(Null) is the whole universe.
            CursorKind::Null if this.tagger.is_empty() => {
                return (this.universe, true);
            }
            // Not(All) is empty.
            CursorKind::All => {
                let mut null = Null::new();
                null.tagger().copy_from(&this.tagger);
                return (Box::new(null), true);
            }
            // Not(Not(x)) is x, bounded by the same universe.
            CursorKind::Not if this.tagger.is_empty() => {
                let inner = std::mem::replace(&mut this.sub, Null::boxed());
                match inner.into_any().downcast::<Self>() {
                    Ok(mut inner) if inner.tagger.is_empty() => {
                        return (std::mem::replace(&mut inner.sub, Null::boxed()), true);
                    }
                    Ok(inner) => {
                        this.sub = inner;
                    }
                    Err(_) => unreachable!("kind() == Not guarantees the concrete type"),
                }
            }
            _ => (),
        }

        (Box::new(this), changed)
    }

    fn clone_cursor(&self) -> Box<dyn Cursor<S>> {
        let mut out = Self::new(self.sub.clone_cursor(), self.universe.clone_cursor());
        out.tagger.copy_from(&self.tagger);
        Box::new(out)
    }

    fn reset(&mut self) {
        self.sub.reset();
        self.universe.reset();
        self.result = None;
        self.err = None;
    }

    fn err(&self) -> Option<&StoreError> {
        if let Some(e) = &self.err {
            return Some(e);
        }
        self.sub.err().or_else(|| self.universe.err())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        let first = self.sub.close();
        let second = self.universe.close();
        first.and(second)
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

    fn fixed(names: &[&str]) -> Box<dyn Cursor<MemoryStore>> {
        Fixed::boxed(refs(names))
    }

    #[test]
    fn excludes_the_sub_set() {
        let ctx = EvalContext::background();
        let mut it = Not::new(fixed(&["b"]), fixed(&["a", "b", "c"]));
        let mut out = Vec::new();
        while it.next(&ctx) {
            out.push(it.result().unwrap());
        }
        assert_eq!(out, refs(&["a", "c"]));

        assert!(it.contains(&ctx, &MemRef::pre_fetched(Value::from("a"))));
        assert!(!it.contains(&ctx, &MemRef::pre_fetched(Value::from("b"))));
        // Outside the universe is outside the complement too.
        assert!(!it.contains(&ctx, &MemRef::pre_fetched(Value::from("z"))));
    }

    #[test]
    fn double_negation_cancels() {
        let inner = Not::boxed(fixed(&["b"]), fixed(&["a", "b"]));
        let outer = Not::boxed(inner, fixed(&["a", "b"]));
        let (opt, changed) = outer.optimize();
        assert!(changed);
        assert_eq!(opt.kind(), CursorKind::Fixed);
    }

    #[test]
    fn not_null_is_the_universe() {
        let it = Not::boxed(Null::boxed(), fixed(&["a"]));
        let (opt, changed) = it.optimize();
        assert!(changed);
        assert_eq!(opt.kind(), CursorKind::Fixed);
    }
}
