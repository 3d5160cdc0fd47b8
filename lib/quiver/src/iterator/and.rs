use crate::error::StoreError;
use crate::iterator::{
    check_cancelled, materialize_threshold, Costs, Cursor, CursorKind, Materialize, Null, TagMap,
    Tagger,
};
use crate::limits::EvalContext;
use crate::store::QuadStore;
use std::any::Any;

/// Intersection of sub-cursors.
///
/// One child is the *primary* and is advanced by `next`; the others are
/// *secondaries* probed with `contains`. Optional children never restrict the
/// result set, they only contribute tags when they match.
///
/// [`Cursor::optimize`] promotes the cheapest child to primary, flattens
/// nested intersections, short-circuits on an empty child and materializes
/// small expensive secondaries.
pub struct And<S: QuadStore> {
    primary: Box<dyn Cursor<S>>,
    secondaries: Vec<Box<dyn Cursor<S>>>,
    optionals: Vec<Box<dyn Cursor<S>>>,
    result: Option<S::Ref>,
    err: Option<StoreError>,
    tagger: Tagger<S>,
}

impl<S: QuadStore> And<S> {
    /// Builds the intersection; the first sub starts as the primary.
    pub fn new(mut subs: Vec<Box<dyn Cursor<S>>>) -> Self {
        let primary = if subs.is_empty() {
            Null::boxed()
        } else {
            subs.remove(0)
        };
        Self {
            primary,
            secondaries: subs,
            optionals: Vec::new(),
            result: None,
            err: None,
            tagger: Tagger::new(),
        }
    }

    pub fn boxed(subs: Vec<Box<dyn Cursor<S>>>) -> Box<dyn Cursor<S>> {
        Box::new(Self::new(subs))
    }

    /// Adds a non-restricting child consulted for tags only.
    pub fn add_optional(&mut self, it: Box<dyn Cursor<S>>) {
        self.optionals.push(it);
    }

    fn check_secondaries(&mut self, ctx: &EvalContext, candidate: &S::Ref) -> bool {
        for s in &mut self.secondaries {
            if !s.contains(ctx, candidate) {
                return false;
            }
        }
        for o in &mut self.optionals {
            // Optionals cannot reject, only bind tags.
            o.contains(ctx, candidate);
        }
        true
    }
}

impl<S: QuadStore> Cursor<S> for And<S> {
    fn kind(&self) -> CursorKind {
        CursorKind::And
    }

    fn next(&mut self, ctx: &EvalContext) -> bool {
        if check_cancelled(ctx, &mut self.err) {
            return false;
        }
        loop {
            if !self.primary.next(ctx) {
                self.result = None;
                return false;
            }
            let Some(candidate) = self.primary.result() else {
                self.result = None;
                return false;
            };
            if check_cancelled(ctx, &mut self.err) {
                self.result = None;
                return false;
            }
            if self.check_secondaries(ctx, &candidate) {
                self.result = Some(candidate);
                return true;
            }
        }
    }

    fn contains(&mut self, ctx: &EvalContext, v: &S::Ref) -> bool {
        if check_cancelled(ctx, &mut self.err) {
            return false;
        }
        if !self.primary.contains(ctx, v) {
            return false;
        }
        if self.check_secondaries(ctx, v) {
            self.result = Some(v.clone());
            true
        } else {
            false
        }
    }

    fn next_path(&mut self, ctx: &EvalContext) -> bool {
        if check_cancelled(ctx, &mut self.err) {
            return false;
        }
        for s in &mut self.secondaries {
            if s.next_path(ctx) {
                return true;
            }
        }
        for o in &mut self.optionals {
            if o.next_path(ctx) {
                return true;
            }
        }
        self.primary.next_path(ctx)
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
        self.primary.tag_results(dst);
        for s in &self.secondaries {
            s.tag_results(dst);
        }
        for o in &self.optionals {
            o.tag_results(dst);
        }
    }

    fn stats(&self) -> Costs {
        let primary = self.primary.stats();
        let mut contains_cost = primary.contains_cost;
        let mut next_cost = primary.next_cost;
        let mut size = primary.size;
        for s in &self.secondaries {
            let st = s.stats();
            contains_cost += st.contains_cost;
            next_cost += st.contains_cost;
            if st.size.value < size.value {
                size = st.size;
            }
        }
        // The intersection is bounded by the smallest child but not known.
        size.exact = size.exact && size.value == 0;
        Costs {
            contains_cost,
            next_cost,
            size,
        }
    }

    fn sub_cursors(&self) -> Vec<&dyn Cursor<S>> {
        let mut out: Vec<&dyn Cursor<S>> = vec![self.primary.as_ref()];
        out.extend(self.secondaries.iter().map(AsRef::as_ref));
        out.extend(self.optionals.iter().map(AsRef::as_ref));
        out
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor<S>>, bool) {
        let this = *self;
        let mut changed = false;
        let tagger = this.tagger;

        let mut subs = Vec::with_capacity(1 + this.secondaries.len());
        subs.push(this.primary);
        subs.extend(this.secondaries);
        let mut optionals = this.optionals;

        // Children first.
        let mut optimized = Vec::with_capacity(subs.len());
        for sub in subs {
            let (sub, sub_changed) = sub.optimize();
            changed |= sub_changed;
            optimized.push(sub);
        }
        for opt in &mut optionals {
            let (o, sub_changed) = std::mem::replace(opt, Null::boxed()).optimize();
            changed |= sub_changed;
            *opt = o;
        }

        // An empty child empties the whole intersection.
        if optimized.iter().any(|s| s.kind() == CursorKind::Null) {
            let mut null = Null::new();
            null.tagger().copy_from(&tagger);
            return (Box::new(null), true);
        }

        // Splice nested intersections without tags of their own.
        let mut flat: Vec<Box<dyn Cursor<S>>> = Vec::with_capacity(optimized.len());
        for mut sub in optimized {
            if sub.kind() == CursorKind::And && sub.tagger().is_empty() {
                if let Ok(inner) = sub.into_any().downcast::<Self>() {
                    let inner = *inner;
                    flat.push(inner.primary);
                    flat.extend(inner.secondaries);
                    optionals.extend(inner.optionals);
                    changed = true;
                    continue;
                }
                unreachable!("kind() == And guarantees the concrete type");
            }
            flat.push(sub);
        }

        // The universe adds no restriction next to a real child.
        let real_children = flat.iter().filter(|s| s.kind() != CursorKind::All).count();
        if real_children >= 1 && real_children < flat.len() {
            let mut kept: Vec<Box<dyn Cursor<S>>> = Vec::with_capacity(real_children);
            for mut sub in flat {
                if sub.kind() == CursorKind::All && sub.tagger().is_empty() {
                    changed = true;
                } else {
                    kept.push(sub);
                }
            }
            flat = kept;
        }

        if flat.len() == 1 && optionals.is_empty() && tagger.is_empty() {
            return (flat.pop().unwrap_or_else(Null::boxed), true);
        }

        // Cheapest child first: exact sizes are trusted over estimates.
        flat.sort_by_key(|s| {
            let st = s.stats();
            (!st.size.exact, st.size.value, st.contains_cost)
        });

        let mut flat = flat.into_iter();
        let primary = flat.next().unwrap_or_else(Null::boxed);
        let mut secondaries: Vec<Box<dyn Cursor<S>>> = Vec::new();
        for s in flat {
            let st = s.stats();
            let wrap = st.size.exact
                && st.size.value < materialize_threshold()
                && st.contains_cost > st.next_cost
                && !matches!(s.kind(), CursorKind::Materialize | CursorKind::Fixed);
            if wrap {
                changed = true;
                secondaries.push(Box::new(Materialize::new(s)));
            } else {
                secondaries.push(s);
            }
        }

        (
            Box::new(Self {
                primary,
                secondaries,
                optionals,
                result: None,
                err: None,
                tagger,
            }),
            changed,
        )
    }

    fn clone_cursor(&self) -> Box<dyn Cursor<S>> {
        let mut out = Self::new(Vec::new());
        out.primary = self.primary.clone_cursor();
        out.secondaries = self.secondaries.iter().map(|s| s.clone_cursor()).collect();
        out.optionals = self.optionals.iter().map(|s| s.clone_cursor()).collect();
        out.tagger.copy_from(&self.tagger);
        Box::new(out)
    }

    fn reset(&mut self) {
        self.primary.reset();
        for s in &mut self.secondaries {
            s.reset();
        }
        for o in &mut self.optionals {
            o.reset();
        }
        self.result = None;
        self.err = None;
    }

    fn err(&self) -> Option<&StoreError> {
        if let Some(e) = &self.err {
            return Some(e);
        }
        self.primary
            .err()
            .or_else(|| self.secondaries.iter().find_map(|s| s.err()))
            .or_else(|| self.optionals.iter().find_map(|s| s.err()))
    }

    fn close(&mut self) -> Result<(), StoreError> {
        let mut result = self.primary.close();
        for s in &mut self.secondaries {
            if let Err(e) = s.close() {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        for o in &mut self.optionals {
            if let Err(e) = o.close() {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::Fixed;
    use crate::store::{MemRef, MemoryStore, RefValue, Size};
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

    fn drain(it: &mut dyn Cursor<MemoryStore>) -> Vec<MemRef> {
        let ctx = EvalContext::background();
        let mut out = Vec::new();
        while it.next(&ctx) {
            out.push(it.result().unwrap());
        }
        out
    }

    #[test]
    fn intersects_two_sets() {
        let mut it = And::new(vec![fixed(&["a", "b", "c"]), fixed(&["b", "c", "d"])]);
        assert_eq!(drain(&mut it), refs(&["b", "c"]));
    }

    #[test]
    fn contains_requires_every_child() {
        let ctx = EvalContext::background();
        let mut it = And::new(vec![fixed(&["a", "b"]), fixed(&["b"])]);
        assert!(it.contains(&ctx, &MemRef::pre_fetched(Value::from("b"))));
        assert!(!it.contains(&ctx, &MemRef::pre_fetched(Value::from("a"))));
    }

    #[test]
    fn optional_child_does_not_restrict() {
        let mut it = And::new(vec![fixed(&["a", "b"])]);
        let mut opt = Fixed::<MemoryStore>::new(refs(&["b"]));
        opt.tagger().add_tag("seen");
        it.add_optional(Box::new(opt));

        let ctx = EvalContext::background();
        assert!(it.next(&ctx));
        let mut tags = TagMap::<MemoryStore>::new();
        it.tag_results(&mut tags);
        assert!(!tags.contains_key("seen")); // "a" did not match the optional

        assert!(it.next(&ctx));
        let mut tags = TagMap::<MemoryStore>::new();
        it.tag_results(&mut tags);
        assert_eq!(tags["seen"], MemRef::pre_fetched(Value::from("b")));
    }

    #[test]
    fn null_child_collapses_to_null() {
        let it = And::boxed(vec![fixed(&["a"]), Null::boxed()]);
        let (opt, changed) = it.optimize();
        assert!(changed);
        assert_eq!(opt.kind(), CursorKind::Null);
    }

    #[test]
    fn nested_and_is_flattened_and_single_child_unwrapped() {
        let inner = And::boxed(vec![fixed(&["a", "b"]), fixed(&["b"])]);
        let it = And::boxed(vec![inner]);
        let (mut opt, changed) = it.optimize();
        assert!(changed);
        assert_eq!(drain(opt.as_mut()), refs(&["b"]));
    }

    #[test]
    fn cheapest_child_becomes_primary() {
        let it = And::boxed(vec![fixed(&["a", "b", "c", "d"]), fixed(&["b"])]);
        let (opt, _) = it.optimize();
        // The smaller child was promoted: the intersection still holds.
        let any = opt.into_any().downcast::<And<MemoryStore>>().unwrap();
        assert_eq!(any.primary.stats().size, Size::exact(1));
    }

    #[test]
    fn cancellation_stops_iteration() {
        let (ctx, cancel) = EvalContext::cancelable();
        let mut it = And::new(vec![fixed(&["a", "b"])]);
        assert!(it.next(&ctx));
        cancel.cancel();
        assert!(!it.next(&ctx));
        assert!(matches!(it.err(), Some(StoreError::Cancelled)));
    }
}
