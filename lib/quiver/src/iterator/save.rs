use crate::error::StoreError;
use crate::iterator::{Costs, Cursor, CursorKind, Null, TagMap, Tagger};
use crate::limits::EvalContext;
use crate::store::QuadStore;
use std::any::Any;

/// Pass-through that binds tags to every surfaced ref.
pub struct Save<S: QuadStore> {
    sub: Box<dyn Cursor<S>>,
    tagger: Tagger<S>,
}

impl<S: QuadStore> Save<S> {
    pub fn new<T: Into<String>>(
        sub: Box<dyn Cursor<S>>,
        tags: impl IntoIterator<Item = T>,
    ) -> Self {
        let mut tagger = Tagger::new();
        tagger.add_tags(tags);
        Self { sub, tagger }
    }

    pub fn boxed<T: Into<String>>(
        sub: Box<dyn Cursor<S>>,
        tags: impl IntoIterator<Item = T>,
    ) -> Box<dyn Cursor<S>> {
        Box::new(Self::new(sub, tags))
    }
}

impl<S: QuadStore> Cursor<S> for Save<S> {
    fn kind(&self) -> CursorKind {
        CursorKind::Save
    }

    fn next(&mut self, ctx: &EvalContext) -> bool {
        self.sub.next(ctx)
    }

    fn contains(&mut self, ctx: &EvalContext, v: &S::Ref) -> bool {
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
        self.sub.stats()
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
        let mut out = Self::new::<String>(self.sub.clone_cursor(), []);
        out.tagger.copy_from(&self.tagger);
        Box::new(out)
    }

    fn reset(&mut self) {
        self.sub.reset();
    }

    fn err(&self) -> Option<&StoreError> {
        self.sub.err()
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.sub.close()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Pass-through that adds constant `tag → ref` bindings to every result.
pub struct FixedTags<S: QuadStore> {
    sub: Box<dyn Cursor<S>>,
    tagger: Tagger<S>,
}

impl<S: QuadStore> FixedTags<S> {
    pub fn new<T: Into<String>>(
        sub: Box<dyn Cursor<S>>,
        tags: impl IntoIterator<Item = (T, S::Ref)>,
    ) -> Self {
        let mut tagger = Tagger::new();
        for (tag, value) in tags {
            tagger.add_fixed(tag, value);
        }
        Self { sub, tagger }
    }

    pub fn boxed<T: Into<String>>(
        sub: Box<dyn Cursor<S>>,
        tags: impl IntoIterator<Item = (T, S::Ref)>,
    ) -> Box<dyn Cursor<S>> {
        Box::new(Self::new(sub, tags))
    }
}

impl<S: QuadStore> Cursor<S> for FixedTags<S> {
    fn kind(&self) -> CursorKind {
        CursorKind::FixedTags
    }

    fn next(&mut self, ctx: &EvalContext) -> bool {
        self.sub.next(ctx)
    }

    fn contains(&mut self, ctx: &EvalContext, v: &S::Ref) -> bool {
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
        self.sub.stats()
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
        let mut out = Self::new::<String>(self.sub.clone_cursor(), []);
        out.tagger.copy_from(&self.tagger);
        Box::new(out)
    }

    fn reset(&mut self) {
        self.sub.reset();
    }

    fn err(&self) -> Option<&StoreError> {
        self.sub.err()
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

    fn r(name: &str) -> MemRef {
        MemRef::pre_fetched(Value::from(name))
    }

    #[test]
    fn save_binds_every_result() {
        let ctx = EvalContext::background();
        let mut it = Save::new(Fixed::<MemoryStore>::boxed(vec![r("a"), r("b")]), ["x"]);
        assert!(it.next(&ctx));
        let mut tags = TagMap::<MemoryStore>::new();
        it.tag_results(&mut tags);
        assert_eq!(tags["x"], r("a"));

        assert!(it.contains(&ctx, &r("b")));
        let mut tags = TagMap::<MemoryStore>::new();
        it.tag_results(&mut tags);
        assert_eq!(tags["x"], r("b"));
    }

    #[test]
    fn fixed_tags_bind_constants() {
        let ctx = EvalContext::background();
        let mut it = FixedTags::new(
            Fixed::<MemoryStore>::boxed(vec![r("a")]),
            [("origin", r("seed"))],
        );
        assert!(it.next(&ctx));
        let mut tags = TagMap::<MemoryStore>::new();
        it.tag_results(&mut tags);
        assert_eq!(tags["origin"], r("seed"));
    }

    #[test]
    fn save_over_null_is_null() {
        let it = Save::<MemoryStore>::boxed(Null::boxed(), ["x"]);
        let (opt, changed) = it.optimize();
        assert!(changed);
        assert_eq!(opt.kind(), CursorKind::Null);
    }
}
