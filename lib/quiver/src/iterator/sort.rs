use crate::error::StoreError;
use crate::iterator::{check_cancelled, record_err, Costs, Cursor, CursorKind, Null, TagMap, Tagger};
use crate::limits::EvalContext;
use crate::store::QuadStore;
use std::any::Any;

struct Row<S: QuadStore> {
    key: String,
    value: S::Ref,
    tags: TagMap<S>,
}

/// Buffers the sub-cursor and emits its results in ascending
/// canonical-string order.
///
/// Every binding becomes its own row, so alternative paths surface as
/// consecutive `next` results rather than through `next_path`. The multiset
/// of (result, bindings) pairs is unchanged.
pub struct Sort<S: QuadStore> {
    store: S,
    sub: Box<dyn Cursor<S>>,
    buffer: Option<Vec<Row<S>>>,
    pos: Option<usize>,
    err: Option<StoreError>,
    tagger: Tagger<S>,
}

impl<S: QuadStore> Sort<S> {
    pub fn new(store: S, sub: Box<dyn Cursor<S>>) -> Self {
        Self {
            store,
            sub,
            buffer: None,
            pos: None,
            err: None,
            tagger: Tagger::new(),
        }
    }

    pub fn boxed(store: S, sub: Box<dyn Cursor<S>>) -> Box<dyn Cursor<S>> {
        Box::new(Self::new(store, sub))
    }

    fn fill(&mut self, ctx: &EvalContext) {
        if self.buffer.is_some() {
            return;
        }
        let mut rows: Vec<Row<S>> = Vec::new();
        while self.sub.next(ctx) {
            if check_cancelled(ctx, &mut self.err) {
                break;
            }
            let Some(value) = self.sub.result() else { break };
            let key = self
                .store
                .name_of(&value)
                .map(|name| name.to_string())
                .unwrap_or_default();
            loop {
                let mut tags = TagMap::<S>::new();
                self.sub.tag_results(&mut tags);
                rows.push(Row {
                    key: key.clone(),
                    value: value.clone(),
                    tags,
                });
                if !self.sub.next_path(ctx) {
                    break;
                }
            }
        }
        if let Some(e) = self.sub.err() {
            record_err(&mut self.err, crate::iterator::clone_store_error(e));
        }
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        self.buffer = Some(rows);
    }
}

impl<S: QuadStore> Cursor<S> for Sort<S> {
    fn kind(&self) -> CursorKind {
        CursorKind::Sort
    }

    fn next(&mut self, ctx: &EvalContext) -> bool {
        if check_cancelled(ctx, &mut self.err) {
            return false;
        }
        self.fill(ctx);
        if self.err.is_some() {
            return false;
        }
        let Some(buffer) = &self.buffer else {
            return false;
        };
        let next = self.pos.map_or(0, |p| p + 1);
        if next < buffer.len() {
            self.pos = Some(next);
            true
        } else {
            self.pos = None;
            false
        }
    }

    fn contains(&mut self, ctx: &EvalContext, v: &S::Ref) -> bool {
        // Order does not matter for membership.
        self.sub.contains(ctx, v)
    }

    fn next_path(&mut self, _ctx: &EvalContext) -> bool {
        // Paths were flattened into their own rows while buffering.
        false
    }

    fn result(&self) -> Option<S::Ref> {
        let buffer = self.buffer.as_ref()?;
        self.pos.map(|p| buffer[p].value.clone())
    }

    fn tagger(&mut self) -> &mut Tagger<S> {
        &mut self.tagger
    }

    fn tag_results(&self, dst: &mut TagMap<S>) {
        let Some(buffer) = &self.buffer else { return };
        let Some(pos) = self.pos else { return };
        let row = &buffer[pos];
        for (tag, bound) in &row.tags {
            dst.insert(tag.clone(), bound.clone());
        }
        self.tagger.write_to(dst, &row.value);
    }

    fn stats(&self) -> Costs {
        let sub = self.sub.stats();
        Costs {
            contains_cost: sub.contains_cost,
            // The whole sub is drained before the first result.
            next_cost: sub.next_cost.saturating_mul(2),
            size: sub.size,
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
        let mut out = Self::new(self.store.clone(), self.sub.clone_cursor());
        out.tagger.copy_from(&self.tagger);
        Box::new(out)
    }

    fn reset(&mut self) {
        self.pos = None;
        if self.buffer.is_none() {
            self.sub.reset();
        }
        self.err = None;
    }

    fn err(&self) -> Option<&StoreError> {
        self.err.as_ref().or_else(|| self.sub.err())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.buffer = None;
        self.pos = None;
        self.sub.close()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}
