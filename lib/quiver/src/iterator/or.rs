use crate::error::StoreError;
use crate::iterator::{check_cancelled, Costs, Cursor, CursorKind, Null, TagMap, Tagger};
use crate::limits::EvalContext;
use crate::store::{QuadStore, Size};
use std::any::Any;

/// Union of sub-cursors, without deduplication.
///
/// `next` drains each child in declaration order; `contains` short-circuits
/// on the first child that accepts. `next_path` is delegated to the branch
/// that produced the current result.
pub struct Or<S: QuadStore> {
    subs: Vec<Box<dyn Cursor<S>>>,
    // Enumeration progress, and the branch the current result came from.
    active: usize,
    last: Option<usize>,
    result: Option<S::Ref>,
    err: Option<StoreError>,
    tagger: Tagger<S>,
}

impl<S: QuadStore> Or<S> {
    pub fn new(subs: Vec<Box<dyn Cursor<S>>>) -> Self {
        Self {
            subs,
            active: 0,
            last: None,
            result: None,
            err: None,
            tagger: Tagger::new(),
        }
    }

    pub fn boxed(subs: Vec<Box<dyn Cursor<S>>>) -> Box<dyn Cursor<S>> {
        Box::new(Self::new(subs))
    }
}

impl<S: QuadStore> Cursor<S> for Or<S> {
    fn kind(&self) -> CursorKind {
        CursorKind::Or
    }

    fn next(&mut self, ctx: &EvalContext) -> bool {
        if check_cancelled(ctx, &mut self.err) {
            return false;
        }
        while let Some(sub) = self.subs.get_mut(self.active) {
            if sub.next(ctx) {
                self.result = sub.result();
                self.last = Some(self.active);
                return true;
            }
            if sub.err().is_some() {
                self.result = None;
                return false;
            }
            self.active += 1;
        }
        self.result = None;
        self.last = None;
        false
    }

    fn contains(&mut self, ctx: &EvalContext, v: &S::Ref) -> bool {
        if check_cancelled(ctx, &mut self.err) {
            return false;
        }
        for (i, sub) in self.subs.iter_mut().enumerate() {
            if sub.contains(ctx, v) {
                self.last = Some(i);
                self.result = Some(v.clone());
                return true;
            }
        }
        false
    }

    fn next_path(&mut self, ctx: &EvalContext) -> bool {
        if check_cancelled(ctx, &mut self.err) {
            return false;
        }
        match self.last.and_then(|at| self.subs.get_mut(at)) {
            Some(sub) if self.result.is_some() => sub.next_path(ctx),
            _ => false,
        }
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
            // Only the branch that produced the result has bindings for it.
            if let Some(sub) = self.last.and_then(|at| self.subs.get(at)) {
                sub.tag_results(dst);
            }
        }
    }

    fn stats(&self) -> Costs {
        let mut costs = Costs {
            contains_cost: 0,
            next_cost: 0,
            size: Size::exact(0),
        };
        for sub in &self.subs {
            let st = sub.stats();
            costs.contains_cost += st.contains_cost;
            costs.next_cost = costs.next_cost.max(st.next_cost);
            costs.size.value = costs.size.value.saturating_add(st.size.value);
            costs.size.exact &= st.size.exact;
        }
        costs
    }

    fn sub_cursors(&self) -> Vec<&dyn Cursor<S>> {
        self.subs.iter().map(AsRef::as_ref).collect()
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor<S>>, bool) {
        let this = *self;
        let tagger = this.tagger;
        let mut changed = false;

        let mut flat: Vec<Box<dyn Cursor<S>>> = Vec::with_capacity(this.subs.len());
        for sub in this.subs {
            let (mut sub, sub_changed) = sub.optimize();
            changed |= sub_changed;
            // The empty branch contributes nothing; untagged nested unions
            // are spliced in place.
            if sub.kind() == CursorKind::Null {
                changed = true;
            } else if sub.kind() == CursorKind::Or && sub.tagger().is_empty() {
                if let Ok(inner) = sub.into_any().downcast::<Self>() {
                    flat.extend(inner.subs);
                    changed = true;
                }
            } else {
                flat.push(sub);
            }
        }

        if flat.is_empty() {
            let mut null = Null::new();
            null.tagger().copy_from(&tagger);
            return (Box::new(null), true);
        }
        if flat.len() == 1 && tagger.is_empty() {
            return (flat.pop().unwrap_or_else(Null::boxed), true);
        }

        (
            Box::new(Self {
                subs: flat,
                active: 0,
                last: None,
                result: None,
                err: None,
                tagger,
            }),
            changed,
        )
    }

    fn clone_cursor(&self) -> Box<dyn Cursor<S>> {
        let mut out = Self::new(self.subs.iter().map(|s| s.clone_cursor()).collect());
        out.tagger.copy_from(&self.tagger);
        Box::new(out)
    }

    fn reset(&mut self) {
        for sub in &mut self.subs {
            sub.reset();
        }
        self.active = 0;
        self.last = None;
        self.result = None;
        self.err = None;
    }

    fn err(&self) -> Option<&StoreError> {
        if let Some(e) = &self.err {
            return Some(e);
        }
        self.subs.iter().find_map(|s| s.err())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        let mut result = Ok(());
        for sub in &mut self.subs {
            if let Err(e) = sub.close() {
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

    fn drain(it: &mut dyn Cursor<MemoryStore>) -> Vec<MemRef> {
        let ctx = EvalContext::background();
        let mut out = Vec::new();
        while it.next(&ctx) {
            out.push(it.result().unwrap());
        }
        out
    }

    #[test]
    fn concatenates_without_dedup() {
        let mut it = Or::new(vec![fixed(&["a", "b"]), fixed(&["b", "c"])]);
        assert_eq!(drain(&mut it), refs(&["a", "b", "b", "c"]));
    }

    #[test]
    fn contains_short_circuits() {
        let ctx = EvalContext::background();
        let mut it = Or::new(vec![fixed(&["a"]), fixed(&["b"])]);
        assert!(it.contains(&ctx, &MemRef::pre_fetched(Value::from("b"))));
        assert_eq!(it.result(), Some(MemRef::pre_fetched(Value::from("b"))));
        assert!(!it.contains(&ctx, &MemRef::pre_fetched(Value::from("z"))));
    }

    #[test]
    fn null_branches_are_dropped_and_nested_or_flattened() {
        let inner = Or::boxed(vec![fixed(&["b"]), Null::boxed()]);
        let it = Or::boxed(vec![Null::boxed(), fixed(&["a"]), inner]);
        let (mut opt, changed) = it.optimize();
        assert!(changed);
        assert_eq!(drain(opt.as_mut()), refs(&["a", "b"]));
    }

    #[test]
    fn single_branch_collapses() {
        let it = Or::boxed(vec![fixed(&["a"])]);
        let (opt, changed) = it.optimize();
        assert!(changed);
        assert_eq!(opt.kind(), CursorKind::Fixed);
    }

    #[test]
    fn all_null_collapses_to_null() {
        let it = Or::boxed(vec![Null::<MemoryStore>::boxed(), Null::boxed()]);
        let (opt, _) = it.optimize();
        assert_eq!(opt.kind(), CursorKind::Null);
    }
}
