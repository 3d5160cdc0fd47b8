use crate::error::StoreError;
use crate::iterator::{check_cancelled, record_err, Costs, Cursor, CursorKind, Null, TagMap, Tagger};
use crate::limits::EvalContext;
use crate::store::{QuadStore, Size};
use qvquad::Direction;
use std::any::Any;

/// The expected number of quads incident to one node, when the backend has
/// not told us better.
const FANOUT_FACTOR: i64 = 20;

/// The inverse of [`HasA`](crate::iterator::HasA): for every node produced by
/// the sub-cursor, yields the quads having that node in position `dir`.
pub struct LinksTo<S: QuadStore> {
    store: S,
    primary: Box<dyn Cursor<S>>,
    dir: Direction,
    next_it: Option<Box<dyn Cursor<S>>>,
    result: Option<S::Ref>,
    err: Option<StoreError>,
    tagger: Tagger<S>,
}

impl<S: QuadStore> LinksTo<S> {
    pub fn new(store: S, primary: Box<dyn Cursor<S>>, dir: Direction) -> Self {
        Self {
            store,
            primary,
            dir,
            next_it: None,
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

    /// Detaches the node sub-cursor, for optimizer rewrites.
    pub(crate) fn take_primary(&mut self) -> Box<dyn Cursor<S>> {
        std::mem::replace(&mut self.primary, Null::boxed())
    }

    /// Restores a sub-cursor detached by [`LinksTo::take_primary`].
    pub(crate) fn set_primary(&mut self, primary: Box<dyn Cursor<S>>) {
        self.primary = primary;
    }

    fn drop_next_it(&mut self) {
        if let Some(mut it) = self.next_it.take() {
            if let Err(e) = it.close() {
                record_err(&mut self.err, e);
            }
        }
    }
}

impl<S: QuadStore> Cursor<S> for LinksTo<S> {
    fn kind(&self) -> CursorKind {
        CursorKind::LinksTo
    }

    fn next(&mut self, ctx: &EvalContext) -> bool {
        if check_cancelled(ctx, &mut self.err) {
            return false;
        }
        loop {
            if let Some(it) = &mut self.next_it {
                if it.next(ctx) {
                    self.result = it.result();
                    return true;
                }
                if let Some(e) = it.err() {
                    record_err(&mut self.err, crate::iterator::clone_store_error(e));
                    self.result = None;
                    return false;
                }
            }
            // The per-node scan is exhausted, open the next one.
            if !self.primary.next(ctx) {
                self.result = None;
                return false;
            }
            let Some(node) = self.primary.result() else {
                self.result = None;
                return false;
            };
            self.drop_next_it();
            self.next_it = Some(self.store.quad_iterator(self.dir, &node));
        }
    }

    fn contains(&mut self, ctx: &EvalContext, v: &S::Ref) -> bool {
        if check_cancelled(ctx, &mut self.err) {
            return false;
        }
        let Some(node) = self.store.quad_direction(v, self.dir) else {
            return false;
        };
        if self.primary.contains(ctx, &node) {
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
    }

    fn stats(&self) -> Costs {
        let sub = self.primary.stats();
        Costs {
            contains_cost: sub.contains_cost + 1,
            next_cost: sub.next_cost + FANOUT_FACTOR,
            size: Size::around(sub.size.value.saturating_mul(FANOUT_FACTOR)),
        }
    }

    fn sub_cursors(&self) -> Vec<&dyn Cursor<S>> {
        vec![self.primary.as_ref()]
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor<S>>, bool) {
        let mut this = *self;
        let (primary, changed) = std::mem::replace(&mut this.primary, Null::boxed()).optimize();
        this.primary = primary;

        if this.primary.kind() == CursorKind::Null {
            let mut null = Null::new();
            null.tagger().copy_from(&this.tagger);
            return (Box::new(null), true);
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
        self.drop_next_it();
        self.result = None;
        self.err = None;
    }

    fn err(&self) -> Option<&StoreError> {
        if let Some(e) = &self.err {
            return Some(e);
        }
        self.primary
            .err()
            .or_else(|| self.next_it.as_ref().and_then(|it| it.err()))
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.drop_next_it();
        self.primary.close()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}
