use crate::error::StoreError;
use crate::iterator::{check_cancelled, record_err, Costs, Cursor, CursorKind, Null, TagMap, Tagger};
use crate::limits::EvalContext;
use crate::store::{QuadStore, Size};
use rustc_hash::FxHashMap;
use std::any::Any;
use std::sync::atomic::{AtomicI64, Ordering};

static THRESHOLD: AtomicI64 = AtomicI64::new(100);

/// The global size threshold below which the optimizer materializes
/// expensive sub-cursors. Default 100.
pub fn materialize_threshold() -> i64 {
    THRESHOLD.load(Ordering::Relaxed)
}

/// Tunes the global materialization threshold. Meant for startup
/// configuration, not for per-query tweaking.
pub fn set_materialize_threshold(threshold: i64) {
    THRESHOLD.store(threshold, Ordering::Relaxed);
}

/// If the sub-cursor turns out to be bigger than this many bindings, the
/// materialization is abandoned and the cursor falls back to the sub.
const ABORT_LIMIT: usize = 10_000;

struct Data<S: QuadStore> {
    // One entry per distinct ref, holding every binding that surfaced it.
    entries: Vec<(S::Ref, Vec<TagMap<S>>)>,
    by_ref: FxHashMap<S::Ref, usize>,
    current: Option<usize>,
    path: usize,
}

enum State<S: QuadStore> {
    Pending,
    Ready(Data<S>),
    // The sub was too big to buffer; behave as a pass-through.
    Aborted,
}

/// Buffers the sub-cursor in memory on first use.
///
/// Afterwards `next` walks the buffer and `contains` is a map lookup. The
/// first use blocks until the sub-cursor is drained; cursors are
/// single-threaded so the one-shot initialisation needs no further guard.
pub struct Materialize<S: QuadStore> {
    sub: Box<dyn Cursor<S>>,
    state: State<S>,
    err: Option<StoreError>,
    tagger: Tagger<S>,
}

impl<S: QuadStore> Materialize<S> {
    pub fn new(sub: Box<dyn Cursor<S>>) -> Self {
        Self {
            sub,
            state: State::Pending,
            err: None,
            tagger: Tagger::new(),
        }
    }

    pub fn boxed(sub: Box<dyn Cursor<S>>) -> Box<dyn Cursor<S>> {
        Box::new(Self::new(sub))
    }

    fn materialize(&mut self, ctx: &EvalContext) {
        if !matches!(self.state, State::Pending) {
            return;
        }
        let mut entries: Vec<(S::Ref, Vec<TagMap<S>>)> = Vec::new();
        let mut by_ref = FxHashMap::default();
        let mut total = 0_usize;
        while self.sub.next(ctx) {
            if check_cancelled(ctx, &mut self.err) {
                break;
            }
            let Some(value) = self.sub.result() else { break };
            loop {
                let mut tags = TagMap::<S>::new();
                self.sub.tag_results(&mut tags);
                let at = *by_ref.entry(value.clone()).or_insert_with(|| {
                    entries.push((value.clone(), Vec::new()));
                    entries.len() - 1
                });
                entries[at].1.push(tags);
                total += 1;
                if total > ABORT_LIMIT {
                    self.sub.reset();
                    self.state = State::Aborted;
                    return;
                }
                if !self.sub.next_path(ctx) {
                    break;
                }
            }
        }
        if let Some(e) = self.sub.err() {
            record_err(&mut self.err, crate::iterator::clone_store_error(e));
        }
        self.state = State::Ready(Data {
            entries,
            by_ref,
            current: None,
            path: 0,
        });
    }
}

impl<S: QuadStore> Cursor<S> for Materialize<S> {
    fn kind(&self) -> CursorKind {
        CursorKind::Materialize
    }

    fn next(&mut self, ctx: &EvalContext) -> bool {
        if check_cancelled(ctx, &mut self.err) {
            return false;
        }
        self.materialize(ctx);
        match &mut self.state {
            State::Pending => false,
            State::Aborted => self.sub.next(ctx),
            State::Ready(data) => {
                let next = data.current.map_or(0, |c| c + 1);
                if next < data.entries.len() {
                    data.current = Some(next);
                    data.path = 0;
                    true
                } else {
                    data.current = None;
                    false
                }
            }
        }
    }

    fn contains(&mut self, ctx: &EvalContext, v: &S::Ref) -> bool {
        if check_cancelled(ctx, &mut self.err) {
            return false;
        }
        self.materialize(ctx);
        match &mut self.state {
            State::Pending => false,
            State::Aborted => self.sub.contains(ctx, v),
            State::Ready(data) => {
                if let Some(&at) = data.by_ref.get(v) {
                    data.current = Some(at);
                    data.path = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn next_path(&mut self, ctx: &EvalContext) -> bool {
        if check_cancelled(ctx, &mut self.err) {
            return false;
        }
        match &mut self.state {
            State::Pending => false,
            State::Aborted => self.sub.next_path(ctx),
            State::Ready(data) => {
                let Some(at) = data.current else { return false };
                if data.path + 1 < data.entries[at].1.len() {
                    data.path += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn result(&self) -> Option<S::Ref> {
        match &self.state {
            State::Pending => None,
            State::Aborted => self.sub.result(),
            State::Ready(data) => data.current.map(|at| data.entries[at].0.clone()),
        }
    }

    fn tagger(&mut self) -> &mut Tagger<S> {
        &mut self.tagger
    }

    fn tag_results(&self, dst: &mut TagMap<S>) {
        match &self.state {
            State::Pending => (),
            State::Aborted => self.sub.tag_results(dst),
            State::Ready(data) => {
                let Some(at) = data.current else { return };
                let (value, paths) = &data.entries[at];
                if let Some(tags) = paths.get(data.path) {
                    for (tag, bound) in tags {
                        dst.insert(tag.clone(), bound.clone());
                    }
                }
                self.tagger.write_to(dst, value);
            }
        }
    }

    fn stats(&self) -> Costs {
        match &self.state {
            State::Ready(data) => Costs {
                contains_cost: 1,
                next_cost: 1,
                size: Size::exact(i64::try_from(data.entries.len()).unwrap_or(i64::MAX)),
            },
            State::Pending | State::Aborted => {
                let sub = self.sub.stats();
                Costs {
                    contains_cost: 1,
                    next_cost: sub.next_cost,
                    size: sub.size,
                }
            }
        }
    }

    fn sub_cursors(&self) -> Vec<&dyn Cursor<S>> {
        vec![self.sub.as_ref()]
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor<S>>, bool) {
        let mut this = *self;
        let (sub, changed) = std::mem::replace(&mut this.sub, Null::boxed()).optimize();
        this.sub = sub;
        match this.sub.kind() {
            CursorKind::Null => {
                let mut null = Null::new();
                null.tagger().copy_from(&this.tagger);
                (Box::new(null), true)
            }
            // Buffering a buffer gains nothing.
            CursorKind::Materialize if this.tagger.is_empty() => (this.sub, true),
            _ => (Box::new(this), changed),
        }
    }

    fn clone_cursor(&self) -> Box<dyn Cursor<S>> {
        let mut out = Self::new(self.sub.clone_cursor());
        out.tagger.copy_from(&self.tagger);
        Box::new(out)
    }

    fn reset(&mut self) {
        match &mut self.state {
            State::Ready(data) => {
                data.current = None;
                data.path = 0;
            }
            State::Aborted | State::Pending => self.sub.reset(),
        }
        self.err = None;
    }

    fn err(&self) -> Option<&StoreError> {
        self.err.as_ref().or_else(|| self.sub.err())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.state = State::Pending;
        self.sub.close()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::{Fixed, Save};
    use crate::store::{MemRef, MemoryStore, RefValue};
    use qvquad::Value;

    fn refs(names: &[&str]) -> Vec<MemRef> {
        names
            .iter()
            .map(|n| MemRef::pre_fetched(Value::from(*n)))
            .collect()
    }

    #[test]
    fn buffer_preserves_results_and_dedups_next() {
        let ctx = EvalContext::background();
        let mut it = Materialize::new(Fixed::<MemoryStore>::boxed(refs(&["a", "b", "a"])));
        let mut out = Vec::new();
        while it.next(&ctx) {
            out.push(it.result().unwrap());
            while it.next_path(&ctx) {
                out.push(it.result().unwrap());
            }
        }
        // Three bindings survive, the duplicate through next_path.
        assert_eq!(out, refs(&["a", "a", "b"]));
    }

    #[test]
    fn contains_is_a_lookup_with_tags() {
        let ctx = EvalContext::background();
        let sub = Save::boxed(Fixed::<MemoryStore>::boxed(refs(&["a", "b"])), ["x"]);
        let mut it = Materialize::new(sub);
        assert!(it.contains(&ctx, &MemRef::pre_fetched(Value::from("b"))));
        let mut tags = TagMap::<MemoryStore>::new();
        it.tag_results(&mut tags);
        assert_eq!(tags["x"], MemRef::pre_fetched(Value::from("b")));
        assert!(!it.contains(&ctx, &MemRef::pre_fetched(Value::from("z"))));
    }

    #[test]
    fn ready_stats_are_exact() {
        let ctx = EvalContext::background();
        let mut it = Materialize::new(Fixed::<MemoryStore>::boxed(refs(&["a", "b", "a"])));
        assert!(it.next(&ctx));
        assert_eq!(it.stats().size, Size::exact(2));
    }

    #[test]
    fn threshold_is_a_global_tunable() {
        assert_eq!(materialize_threshold(), 100);
        set_materialize_threshold(10);
        assert_eq!(materialize_threshold(), 10);
        set_materialize_threshold(100);
    }
}
