use crate::error::StoreError;
use crate::iterator::{Costs, Cursor, CursorKind, Null, TagMap, Tagger};
use crate::limits::EvalContext;
use crate::store::{QuadStore, Size};
use std::any::Any;

/// An explicit set of refs.
///
/// Equality is the refs' own key equality, so a `Fixed` built from refs of
/// another store is meaningless (and a programmer error).
pub struct Fixed<S: QuadStore> {
    values: Vec<S::Ref>,
    index: usize,
    result: Option<S::Ref>,
    tagger: Tagger<S>,
}

impl<S: QuadStore> Fixed<S> {
    pub fn new(values: Vec<S::Ref>) -> Self {
        Self {
            values,
            index: 0,
            result: None,
            tagger: Tagger::new(),
        }
    }

    pub fn boxed(values: Vec<S::Ref>) -> Box<dyn Cursor<S>> {
        Box::new(Self::new(values))
    }

    pub fn values(&self) -> &[S::Ref] {
        &self.values
    }
}

impl<S: QuadStore> Cursor<S> for Fixed<S> {
    fn kind(&self) -> CursorKind {
        CursorKind::Fixed
    }

    fn next(&mut self, _ctx: &EvalContext) -> bool {
        if let Some(value) = self.values.get(self.index) {
            self.result = Some(value.clone());
            self.index += 1;
            true
        } else {
            self.result = None;
            false
        }
    }

    fn contains(&mut self, _ctx: &EvalContext, v: &S::Ref) -> bool {
        if self.values.contains(v) {
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
        let len = i64::try_from(self.values.len()).unwrap_or(i64::MAX);
        Costs {
            contains_cost: len.max(1),
            next_cost: 1,
            size: Size::exact(len),
        }
    }

    fn sub_cursors(&self) -> Vec<&dyn Cursor<S>> {
        Vec::new()
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor<S>>, bool) {
        if self.values.is_empty() {
            let mut null = Null::new();
            null.tagger().copy_from(&self.tagger);
            (Box::new(null), true)
        } else {
            (self, false)
        }
    }

    fn clone_cursor(&self) -> Box<dyn Cursor<S>> {
        let mut out = Self::new(self.values.clone());
        out.tagger.copy_from(&self.tagger);
        Box::new(out)
    }

    fn reset(&mut self) {
        self.index = 0;
        self.result = None;
    }

    fn err(&self) -> Option<&StoreError> {
        None
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.values = Vec::new();
        Ok(())
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemRef, MemoryStore, RefValue};
    use qvquad::Value;

    fn refs(names: &[&str]) -> Vec<MemRef> {
        names
            .iter()
            .map(|n| MemRef::pre_fetched(Value::from(*n)))
            .collect()
    }

    #[test]
    fn next_walks_the_set_in_order() {
        let ctx = EvalContext::background();
        let mut it = Fixed::<MemoryStore>::new(refs(&["a", "b"]));
        assert!(it.next(&ctx));
        assert_eq!(it.result(), Some(MemRef::pre_fetched(Value::from("a"))));
        assert!(it.next(&ctx));
        assert!(!it.next(&ctx));
        assert_eq!(it.result(), None);

        it.reset();
        assert!(it.next(&ctx));
        assert_eq!(it.result(), Some(MemRef::pre_fetched(Value::from("a"))));
    }

    #[test]
    fn contains_checks_membership() {
        let ctx = EvalContext::background();
        let mut it = Fixed::<MemoryStore>::new(refs(&["a", "b"]));
        assert!(it.contains(&ctx, &MemRef::pre_fetched(Value::from("b"))));
        assert_eq!(it.result(), Some(MemRef::pre_fetched(Value::from("b"))));
        assert!(!it.contains(&ctx, &MemRef::pre_fetched(Value::from("c"))));
    }

    #[test]
    fn tags_bind_to_the_current_result() {
        let ctx = EvalContext::background();
        let mut it = Fixed::<MemoryStore>::new(refs(&["a"]));
        it.tagger().add_tag("x");
        assert!(it.next(&ctx));
        let mut tags = TagMap::<MemoryStore>::new();
        it.tag_results(&mut tags);
        assert_eq!(tags["x"], MemRef::pre_fetched(Value::from("a")));
    }

    #[test]
    fn empty_optimizes_to_null() {
        let it = Fixed::<MemoryStore>::boxed(Vec::new());
        let (opt, changed) = it.optimize();
        assert!(changed);
        assert_eq!(opt.kind(), CursorKind::Null);

        let (same, changed) = Fixed::<MemoryStore>::boxed(refs(&["a"])).optimize();
        assert!(!changed);
        assert_eq!(same.kind(), CursorKind::Fixed);
    }
}
