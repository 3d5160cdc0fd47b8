use crate::error::StoreError;
use crate::iterator::{check_cancelled, record_err, Costs, Cursor, CursorKind, LinksTo, Null, TagMap, Tagger};
use crate::limits::EvalContext;
use crate::store::QuadStore;
use qvquad::Direction;
use std::any::Any;

/// Projection of quads to one direction: for every quad ref produced by the
/// sub-cursor, yields the node in position `dir`.
///
/// A node may surface repeatedly under `next` (once per witness quad).
/// `contains` opens a transient per-node quad scan and probes the sub-cursor
/// with each candidate quad; `next_path` keeps consuming that scan, so every
/// witness quad for the same node is enumerable.
pub struct HasA<S: QuadStore> {
    store: S,
    primary: Box<dyn Cursor<S>>,
    dir: Direction,
    contains_it: Option<Box<dyn Cursor<S>>>,
    contains_target: Option<S::Ref>,
    result: Option<S::Ref>,
    err: Option<StoreError>,
    tagger: Tagger<S>,
}

impl<S: QuadStore> HasA<S> {
    pub fn new(store: S, primary: Box<dyn Cursor<S>>, dir: Direction) -> Self {
        Self {
            store,
            primary,
            dir,
            contains_it: None,
            contains_target: None,
            result: None,
            err: None,
            tagger: Tagger::new(),
        }
    }

    pub fn boxed(store: S, primary: Box<dyn Cursor<S>>, dir: Direction) -> Box<dyn Cursor<S>> {
        Box::new(Self::new(store, primary, dir))
    }

    pub fn direction(&self) -> Direction {
        self.dir
    }

    fn next_contains(&mut self, ctx: &EvalContext) -> bool {
        let Some(links) = &mut self.contains_it else {
            return false;
        };
        while links.next(ctx) {
            let Some(link) = links.result() else { break };
            if self.primary.contains(ctx, &link) {
                self.result = self.contains_target.clone();
                return true;
            }
        }
        if let Some(e) = links.err() {
            record_err(&mut self.err, crate::iterator::clone_store_error(e));
        }
        false
    }

    fn drop_contains_it(&mut self) {
        if let Some(mut it) = self.contains_it.take() {
            if let Err(e) = it.close() {
                record_err(&mut self.err, e);
            }
        }
        self.contains_target = None;
    }
}

impl<S: QuadStore> Cursor<S> for HasA<S> {
    fn kind(&self) -> CursorKind {
        CursorKind::HasA
    }

    fn next(&mut self, ctx: &EvalContext) -> bool {
        if check_cancelled(ctx, &mut self.err) {
            return false;
        }
        self.drop_contains_it();
        loop {
            if !self.primary.next(ctx) {
                self.result = None;
                return false;
            }
            let Some(link) = self.primary.result() else {
                self.result = None;
                return false;
            };
            // A quad may be empty in the projected direction (absent label).
            if let Some(node) = self.store.quad_direction(&link, self.dir) {
                self.result = Some(node);
                return true;
            }
        }
    }

    fn contains(&mut self, ctx: &EvalContext, v: &S::Ref) -> bool {
        if check_cancelled(ctx, &mut self.err) {
            return false;
        }
        self.drop_contains_it();
        self.contains_it = Some(self.store.quad_iterator(self.dir, v));
        self.contains_target = Some(v.clone());
        self.next_contains(ctx)
    }

    fn next_path(&mut self, ctx: &EvalContext) -> bool {
        if check_cancelled(ctx, &mut self.err) {
            return false;
        }
        if self.primary.next_path(ctx) {
            return true;
        }
        if self.primary.err().is_some() {
            return false;
        }
        self.next_contains(ctx)
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
    }

    fn stats(&self) -> Costs {
        let sub = self.primary.stats();
        Costs {
            // Contains opens an index scan and probes the sub-cursor per quad.
            contains_cost: sub.contains_cost + 20,
            next_cost: sub.next_cost + 1,
            size: crate::store::Size::around(sub.size.value),
        }
    }

    fn sub_cursors(&self) -> Vec<&dyn Cursor<S>> {
        vec![self.primary.as_ref()]
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor<S>>, bool) {
        let mut this = *self;
        let (primary, mut changed) = std::mem::replace(&mut this.primary, Null::boxed()).optimize();
        this.primary = primary;

        if this.primary.kind() == CursorKind::Null {
            let mut null = Null::new();
            null.tagger().copy_from(&this.tagger);
            return (Box::new(null), true);
        }

        // HasA(LinksTo(x, d), d) projects right back to x.
        if this.primary.kind() == CursorKind::LinksTo && this.tagger.is_empty() {
            let links = std::mem::replace(&mut this.primary, Null::boxed());
            match links.into_any().downcast::<LinksTo<S>>() {
                Ok(mut links) => {
                    if links.direction() == this.dir && links.tagger().is_empty() {
                        return (links.take_primary(), true);
                    }
                    this.primary = links;
                }
                Err(_) => unreachable!("kind() == LinksTo guarantees the concrete type"),
            }
        }

        (Box::new(this), changed)
    }

    fn clone_cursor(&self) -> Box<dyn Cursor<S>> {
        let mut out = Self::new(self.store.clone(), self.primary.clone_cursor(), self.dir);
        out.tagger.copy_from(&self.tagger);
        Box::new(out)
    }

    fn reset(&mut self) {
        self.primary.reset();
        self.drop_contains_it();
        self.result = None;
        self.err = None;
    }

    fn err(&self) -> Option<&StoreError> {
        if let Some(e) = &self.err {
            return Some(e);
        }
        self.primary
            .err()
            .or_else(|| self.contains_it.as_ref().and_then(|it| it.err()))
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.drop_contains_it();
        self.primary.close()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}
