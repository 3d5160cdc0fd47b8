use crate::error::StoreError;
use crate::iterator::{record_err, Costs, Cursor, CursorKind, Null, TagMap, Tagger};
use crate::limits::EvalContext;
use crate::store::{QuadStore, Size};
use std::any::Any;

/// Non-blocking wrapper: inside an intersection it never restricts the
/// result set, it only contributes tags when the sub-cursor matches.
///
/// An optional cursor cannot drive iteration: `next` is a programmer error.
pub struct Optional<S: QuadStore> {
    sub: Box<dyn Cursor<S>>,
    last_check: bool,
    err: Option<StoreError>,
    tagger: Tagger<S>,
}

impl<S: QuadStore> Optional<S> {
    pub fn new(sub: Box<dyn Cursor<S>>) -> Self {
        Self {
            sub,
            last_check: false,
            err: None,
            tagger: Tagger::new(),
        }
    }

    pub fn boxed(sub: Box<dyn Cursor<S>>) -> Box<dyn Cursor<S>> {
        Box::new(Self::new(sub))
    }
}

impl<S: QuadStore> Cursor<S> for Optional<S> {
    fn kind(&self) -> CursorKind {
        CursorKind::Optional
    }

    fn next(&mut self, _ctx: &EvalContext) -> bool {
        record_err(
            &mut self.err,
            StoreError::misuse("an optional cursor cannot be iterated directly"),
        );
        false
    }

    fn contains(&mut self, ctx: &EvalContext, v: &S::Ref) -> bool {
        self.last_check = self.sub.contains(ctx, v);
        // Whether the sub matched or not, the value stays accepted.
        true
    }

    fn next_path(&mut self, ctx: &EvalContext) -> bool {
        if self.last_check {
            self.sub.next_path(ctx)
        } else {
            false
        }
    }

    fn result(&self) -> Option<S::Ref> {
        if self.last_check {
            self.sub.result()
        } else {
            None
        }
    }

    fn tagger(&mut self) -> &mut Tagger<S> {
        &mut self.tagger
    }

    fn tag_results(&self, dst: &mut TagMap<S>) {
        if !self.last_check {
            return;
        }
        if let Some(result) = self.sub.result() {
            self.tagger.write_to(dst, &result);
        }
        self.sub.tag_results(dst);
    }

    fn stats(&self) -> Costs {
        let sub = self.sub.stats();
        Costs {
            contains_cost: sub.contains_cost,
            next_cost: 0,
            size: Size::around(sub.size.value),
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
        self.last_check = false;
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

    fn r(name: &str) -> MemRef {
        MemRef::pre_fetched(Value::from(name))
    }

    #[test]
    fn contains_never_rejects() {
        let ctx = EvalContext::background();
        let mut it = Optional::new(Fixed::<MemoryStore>::boxed(vec![r("a")]));
        assert!(it.contains(&ctx, &r("a")));
        assert!(it.contains(&ctx, &r("z")));
        assert!(it.result().is_none()); // "z" did not match the sub
    }

    #[test]
    fn next_is_a_programmer_error() {
        let ctx = EvalContext::background();
        let mut it = Optional::new(Fixed::<MemoryStore>::boxed(vec![r("a")]));
        assert!(!it.next(&ctx));
        assert!(matches!(it.err(), Some(StoreError::Misuse(_))));
        assert!(!it.err().map(StoreError::is_retryable).unwrap_or(true));
    }

    #[test]
    fn tags_flow_only_on_match() {
        let ctx = EvalContext::background();
        let mut sub = Fixed::<MemoryStore>::new(vec![r("a")]);
        sub.tagger().add_tag("x");
        let mut it = Optional::new(Box::new(sub));

        assert!(it.contains(&ctx, &r("z")));
        let mut tags = TagMap::<MemoryStore>::new();
        it.tag_results(&mut tags);
        assert!(tags.is_empty());

        assert!(it.contains(&ctx, &r("a")));
        let mut tags = TagMap::<MemoryStore>::new();
        it.tag_results(&mut tags);
        assert_eq!(tags["x"], r("a"));
    }
}
