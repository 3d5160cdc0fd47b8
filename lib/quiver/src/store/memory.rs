use crate::delta::{Action, Delta, IgnoreOpts};
use crate::error::{CorruptionError, DeltaError, StoreError};
use crate::iterator::{
    Costs, Cursor, CursorKind, ErrorCursor, Fixed, LinksTo, Null, TagMap, Tagger,
};
use crate::limits::EvalContext;
use crate::metrics::StoreMetrics;
use crate::store::{
    DirectionFilter, IteratorOptimizer, QuadIndexer, QuadStore, RefValue, Size, StoreStats,
};
use dashmap::DashMap;
use qvquad::{Direction, Quad, Value, ValueHash};
use rustc_hash::{FxHashMap, FxHasher};
use std::any::Any;
use std::hash::BuildHasherDefault;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

type FxDashMap<K, V> = DashMap<K, V, BuildHasherDefault<FxHasher>>;

/// The ref type minted by [`MemoryStore`]: an interned node id, a quad id, or
/// an engine-computed value that never touched storage.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum MemRef {
    Node(i64),
    Quad(u64),
    Value(Value),
}

impl RefValue for MemRef {
    fn is_node(&self) -> bool {
        !matches!(self, Self::Quad(_))
    }

    fn pre_fetched(value: Value) -> Self {
        Self::Value(value)
    }

    fn as_pre_fetched(&self) -> Option<&Value> {
        if let Self::Value(value) = self {
            Some(value)
        } else {
            None
        }
    }
}

/// In-memory storage with MVCC-lite visibility.
///
/// Every quad and node carries a version range; a cursor captures the commit
/// horizon when it is created and only sees entries live at it, so a batch
/// applied by [`MemoryStore::apply_deltas`] is atomic to cursors opened after
/// it returns. A single writer proceeds at a time; node ids are stable for
/// the lifetime of the store, so a value never reappears under a different
/// ref.
///
/// ```
/// use quiver::{MemoryStore, QuadStore, Transaction};
/// use qvquad::{Iri, Quad};
///
/// let store = MemoryStore::new();
/// let mut tx = Transaction::new();
/// tx.add_quad(Quad::new(
///     Iri::new_unchecked("a"),
///     Iri::new_unchecked("follows"),
///     Iri::new_unchecked("b"),
///     None,
/// ));
/// store.apply_transaction(tx)?;
/// assert_eq!(store.stats(true)?.quads.value, 1);
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Clone)]
pub struct MemoryStore(Arc<Inner>);

struct Inner {
    // Content hash of the canonical form → interned node id.
    values: FxDashMap<ValueHash, i64>,
    nodes: FxDashMap<i64, NodeEntry>,
    quads: FxDashMap<u64, QuadEntry>,
    // Direction ids (label 0 = default graph) → quad id.
    quad_set: FxDashMap<[i64; 4], u64>,
    // (direction prefix, node id) → append-only posting list of quad ids.
    index: FxDashMap<(u8, i64), Vec<u64>>,
    horizon: AtomicU64,
    next_node_id: AtomicI64,
    next_quad_id: AtomicU64,
    write_lock: Mutex<()>,
    metrics: StoreMetrics,
}

struct NodeEntry {
    value: Value,
    // Incident quad occurrences live at the newest version.
    refs: u64,
    range: VersionRange,
}

struct QuadEntry {
    dirs: [i64; 4],
    range: VersionRange,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self(Arc::new(Inner {
            values: FxDashMap::default(),
            nodes: FxDashMap::default(),
            quads: FxDashMap::default(),
            quad_set: FxDashMap::default(),
            index: FxDashMap::default(),
            horizon: AtomicU64::new(0),
            next_node_id: AtomicI64::new(1),
            next_quad_id: AtomicU64::new(1),
            write_lock: Mutex::new(()),
            metrics: StoreMetrics::new(),
        }))
    }

    fn current_horizon(&self) -> u64 {
        self.0.horizon.load(Ordering::Acquire)
    }

    fn node_id(&self, v: &Value) -> Option<i64> {
        self.0.values.view(&ValueHash::new(v), |_, id| *id)
    }

    fn dir_ids_of(&self, quad: &Quad) -> Option<[i64; 4]> {
        let s = self.node_id(&quad.subject)?;
        let p = self.node_id(&quad.predicate)?;
        let o = self.node_id(&quad.object)?;
        let l = match &quad.label {
            Some(label) => self.node_id(label)?,
            None => 0,
        };
        Some([s, p, o, l])
    }

    fn quad_live_at(&self, quad: &Quad, horizon: u64) -> bool {
        let Some(dirs) = self.dir_ids_of(quad) else {
            return false;
        };
        let Some(qid) = self.0.quad_set.view(&dirs, |_, id| *id) else {
            return false;
        };
        self.0
            .quads
            .view(&qid, |_, e| e.range.contains(horizon))
            .unwrap_or(false)
    }

    fn intern(&self, value: &Value) -> i64 {
        let hash = ValueHash::new(value);
        if let Some(id) = self.0.values.view(&hash, |_, id| *id) {
            debug_assert!(
                self.0
                    .nodes
                    .view(&id, |_, e| e.value == *value)
                    .unwrap_or(false),
                "hash conflict for two values"
            );
            return id;
        }
        let id = self.0.next_node_id.fetch_add(1, Ordering::Relaxed);
        self.0.nodes.insert(
            id,
            NodeEntry {
                value: value.clone(),
                refs: 0,
                range: VersionRange::Empty,
            },
        );
        self.0.values.insert(hash, id);
        id
    }

    fn commit_add(&self, quad: &Quad, version: u64) {
        let s = self.intern(&quad.subject);
        let p = self.intern(&quad.predicate);
        let o = self.intern(&quad.object);
        let l = quad.label.as_ref().map_or(0, |label| self.intern(label));
        let dirs = [s, p, o, l];

        let qid = if let Some(qid) = self.0.quad_set.view(&dirs, |_, id| *id) {
            qid
        } else {
            let qid = self.0.next_quad_id.fetch_add(1, Ordering::Relaxed);
            self.0.quads.insert(
                qid,
                QuadEntry {
                    dirs,
                    range: VersionRange::Empty,
                },
            );
            self.0.quad_set.insert(dirs, qid);
            for (d, id) in Direction::ALL.into_iter().zip(dirs) {
                if id != 0 {
                    self.0.index.entry((d.prefix(), id)).or_default().push(qid);
                }
            }
            qid
        };

        let added = self
            .0
            .quads
            .get_mut(&qid)
            .map(|mut e| e.range.add(version))
            .unwrap_or(false);
        if !added {
            return;
        }
        for id in dirs {
            if id == 0 {
                continue;
            }
            if let Some(mut node) = self.0.nodes.get_mut(&id) {
                node.refs += 1;
                if node.refs == 1 {
                    node.range.add(version);
                }
            }
        }
    }

    fn commit_delete(&self, quad: &Quad, version: u64) {
        let Some(dirs) = self.dir_ids_of(quad) else {
            return;
        };
        let Some(qid) = self.0.quad_set.view(&dirs, |_, id| *id) else {
            return;
        };
        let removed = self
            .0
            .quads
            .get_mut(&qid)
            .map(|mut e| e.range.remove(version))
            .unwrap_or(false);
        if !removed {
            return;
        }
        for id in dirs {
            if id == 0 {
                continue;
            }
            if let Some(mut node) = self.0.nodes.get_mut(&id) {
                node.refs = node.refs.saturating_sub(1);
                if node.refs == 0 {
                    node.range.remove(version);
                }
            }
        }
    }

    fn resolve_node(&self, v: &MemRef) -> Option<i64> {
        match v {
            MemRef::Node(id) => Some(*id),
            MemRef::Value(value) => self.node_id(value),
            MemRef::Quad(_) => None,
        }
    }

    fn posting_len(&self, d: Direction, id: i64) -> usize {
        self.0
            .index
            .view(&(d.prefix(), id), |_, list| list.len())
            .unwrap_or(0)
    }

    fn posting_at(&self, d: Direction, id: i64, pos: usize) -> Option<u64> {
        self.0
            .index
            .view(&(d.prefix(), id), |_, list| list.get(pos).copied())
            .flatten()
    }

    /// Walks the smallest posting list for the filter, calling `f` with every
    /// visible quad matching every constrained direction until `f` returns
    /// `false`. `None` means the index cannot answer (empty filter).
    fn scan_index(
        &self,
        filter: &DirectionFilter<Self>,
        mut f: impl FnMut(u64) -> bool,
    ) -> Option<()> {
        if filter.is_empty() {
            return None;
        }
        let horizon = self.current_horizon();
        let mut dirs: Vec<(Direction, i64)> = Vec::with_capacity(filter.len());
        for (d, r) in filter {
            match self.resolve_node(r) {
                Some(id) => dirs.push((*d, id)),
                // An unknown node can be incident to no quad at all.
                None => return Some(()),
            }
        }
        let pick = dirs
            .iter()
            .enumerate()
            .min_by_key(|(_, (d, id))| self.posting_len(*d, *id))
            .map(|(at, _)| at)?;
        let (start_dir, start_id) = dirs.swap_remove(pick);

        for pos in 0..self.posting_len(start_dir, start_id) {
            let Some(qid) = self.posting_at(start_dir, start_id, pos) else {
                break;
            };
            let matches = self
                .0
                .quads
                .view(&qid, |_, e| {
                    e.range.contains(horizon)
                        && dirs.iter().all(|(d, id)| dir_at(&e.dirs, *d) == Some(*id))
                })
                .unwrap_or(false);
            if matches && !f(qid) {
                break;
            }
        }
        Some(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn dir_at(dirs: &[i64; 4], d: Direction) -> Option<i64> {
    match d {
        Direction::Subject => Some(dirs[0]),
        Direction::Predicate => Some(dirs[1]),
        Direction::Object => Some(dirs[2]),
        Direction::Label => Some(dirs[3]),
        Direction::Any => None,
    }
}

impl QuadStore for MemoryStore {
    type Ref = MemRef;

    fn value_of(&self, v: &Value) -> Option<MemRef> {
        let id = self.node_id(v)?;
        let horizon = self.current_horizon();
        self.0
            .nodes
            .view(&id, |_, e| e.range.contains(horizon))
            .unwrap_or(false)
            .then_some(MemRef::Node(id))
    }

    fn name_of(&self, r: &MemRef) -> Option<Value> {
        match r {
            MemRef::Node(id) => self.0.nodes.view(id, |_, e| e.value.clone()),
            MemRef::Value(value) => Some(value.clone()),
            MemRef::Quad(_) => None,
        }
    }

    fn quad(&self, r: &MemRef) -> Result<Quad, StoreError> {
        let MemRef::Quad(qid) = r else {
            return Err(StoreError::misuse("not a quad ref"));
        };
        let dirs = self
            .0
            .quads
            .view(qid, |_, e| e.dirs)
            .ok_or_else(|| CorruptionError::msg(format!("unknown quad id {qid}")))?;
        let value = |id: i64| -> Result<Value, StoreError> {
            self.0
                .nodes
                .view(&id, |_, e| e.value.clone())
                .ok_or_else(|| CorruptionError::msg(format!("unknown node id {id}")).into())
        };
        Ok(Quad {
            subject: value(dirs[0])?,
            predicate: value(dirs[1])?,
            object: value(dirs[2])?,
            label: if dirs[3] == 0 {
                None
            } else {
                Some(value(dirs[3])?)
            },
        })
    }

    fn quad_direction(&self, r: &MemRef, d: Direction) -> Option<MemRef> {
        let MemRef::Quad(qid) = r else {
            return None;
        };
        let id = self.0.quads.view(qid, |_, e| dir_at(&e.dirs, d))??;
        (id != 0).then_some(MemRef::Node(id))
    }

    fn quad_iterator(&self, d: Direction, v: &MemRef) -> Box<dyn Cursor<Self>> {
        if d == Direction::Any {
            return ErrorCursor::boxed(StoreError::misuse(
                "a quad iterator needs a concrete direction",
            ));
        }
        let Some(id) = self.resolve_node(v) else {
            return Null::boxed();
        };
        Box::new(MemQuadIterator {
            store: self.clone(),
            horizon: self.current_horizon(),
            dir: d,
            id,
            pos: 0,
            result: None,
            tagger: Tagger::new(),
        })
    }

    fn nodes_all_iterator(&self) -> Box<dyn Cursor<Self>> {
        Box::new(MemNodesAll {
            store: self.clone(),
            horizon: self.current_horizon(),
            pos: 0,
            result: None,
            tagger: Tagger::new(),
        })
    }

    fn quads_all_iterator(&self) -> Box<dyn Cursor<Self>> {
        Box::new(MemQuadsAll {
            store: self.clone(),
            horizon: self.current_horizon(),
            pos: 0,
            result: None,
            tagger: Tagger::new(),
        })
    }

    fn apply_deltas(&self, deltas: &[Delta], opts: IgnoreOpts) -> Result<(), DeltaError> {
        let _guard = self
            .0
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let horizon = self.current_horizon();

        // Validate the whole batch before touching anything, tracking the
        // effect of earlier deltas on later ones.
        let mut overlay: FxHashMap<&Quad, bool> = FxHashMap::default();
        let mut ops: Vec<&Delta> = Vec::with_capacity(deltas.len());
        for delta in deltas {
            let live = overlay
                .get(&delta.quad)
                .copied()
                .unwrap_or_else(|| self.quad_live_at(&delta.quad, horizon));
            match delta.action {
                Action::Add if live => {
                    if !opts.ignore_dup {
                        return Err(DeltaError::QuadExists(delta.clone()));
                    }
                }
                Action::Add => {
                    overlay.insert(&delta.quad, true);
                    ops.push(delta);
                }
                Action::Delete if !live => {
                    if !opts.ignore_missing {
                        return Err(DeltaError::QuadNotExist(delta.clone()));
                    }
                }
                Action::Delete => {
                    overlay.insert(&delta.quad, false);
                    ops.push(delta);
                }
            }
        }

        let version = horizon + 1;
        let mut adds = 0_u64;
        let mut deletes = 0_u64;
        for delta in ops {
            match delta.action {
                Action::Add => {
                    self.commit_add(&delta.quad, version);
                    adds += 1;
                }
                Action::Delete => {
                    self.commit_delete(&delta.quad, version);
                    deletes += 1;
                }
            }
        }
        self.0.horizon.store(version, Ordering::Release);
        self.0.metrics.record_adds(adds);
        self.0.metrics.record_deletes(deletes);
        Ok(())
    }

    fn stats(&self, exact: bool) -> Result<StoreStats, StoreError> {
        let horizon = self.current_horizon();
        if exact {
            let nodes = self
                .0
                .nodes
                .iter()
                .filter(|e| e.range.contains(horizon))
                .count();
            let quads = self
                .0
                .quads
                .iter()
                .filter(|e| e.range.contains(horizon))
                .count();
            Ok(StoreStats {
                nodes: Size::exact(i64::try_from(nodes).unwrap_or(i64::MAX)),
                quads: Size::exact(i64::try_from(quads).unwrap_or(i64::MAX)),
            })
        } else {
            Ok(StoreStats {
                nodes: Size::around(i64::try_from(self.0.nodes.len()).unwrap_or(i64::MAX)),
                quads: Size::around(i64::try_from(self.0.quads.len()).unwrap_or(i64::MAX)),
            })
        }
    }

    fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn metrics(&self) -> Option<&StoreMetrics> {
        Some(&self.0.metrics)
    }

    fn iterator_optimizer(&self) -> Option<&dyn IteratorOptimizer<Self>> {
        Some(self)
    }

    fn quad_indexer(&self) -> Option<&dyn QuadIndexer<Self>> {
        Some(self)
    }
}

impl QuadIndexer<MemoryStore> for MemoryStore {
    fn size_of_index(&self, filter: &DirectionFilter<Self>) -> Option<Size> {
        let mut n = 0_i64;
        self.scan_index(filter, |_| {
            n += 1;
            true
        })?;
        Some(Size::exact(n))
    }

    fn lookup_quad_index(&self, filter: &DirectionFilter<Self>) -> Option<MemRef> {
        let mut found = None;
        let mut count = 0_usize;
        self.scan_index(filter, |qid| {
            count += 1;
            found = Some(qid);
            count < 2
        })?;
        if count == 1 {
            found.map(MemRef::Quad)
        } else {
            None
        }
    }
}

impl IteratorOptimizer<MemoryStore> for MemoryStore {
    /// Replaces `LinksTo(Fixed[node], d)` by a native index scan.
    fn optimize_iterator(
        &self,
        it: Box<dyn Cursor<Self>>,
    ) -> (Box<dyn Cursor<Self>>, bool) {
        if it.kind() != CursorKind::LinksTo {
            return (it, false);
        }
        let Ok(mut links) = it.into_any().downcast::<LinksTo<Self>>() else {
            unreachable!("kind() == LinksTo guarantees the concrete type");
        };
        if !links.tagger().is_empty() {
            return (links, false);
        }
        let mut primary = links.take_primary();
        if primary.kind() == CursorKind::Fixed && primary.tagger().is_empty() {
            let Ok(fixed) = primary.into_any().downcast::<Fixed<Self>>() else {
                unreachable!("kind() == Fixed guarantees the concrete type");
            };
            if let [node] = fixed.values() {
                return (self.quad_iterator(links.direction(), node), true);
            }
            links.set_primary(fixed);
            return (links, false);
        }
        links.set_primary(primary);
        (links, false)
    }
}

/// Native index scan: all quads with one node in one direction, at a fixed
/// horizon.
struct MemQuadIterator {
    store: MemoryStore,
    horizon: u64,
    dir: Direction,
    id: i64,
    pos: usize,
    result: Option<MemRef>,
    tagger: Tagger<MemoryStore>,
}

impl Cursor<MemoryStore> for MemQuadIterator {
    fn kind(&self) -> CursorKind {
        CursorKind::Custom
    }

    fn next(&mut self, _ctx: &EvalContext) -> bool {
        loop {
            let Some(qid) = self.store.posting_at(self.dir, self.id, self.pos) else {
                self.result = None;
                return false;
            };
            self.pos += 1;
            let visible = self
                .store
                .0
                .quads
                .view(&qid, |_, e| e.range.contains(self.horizon))
                .unwrap_or(false);
            if visible {
                self.result = Some(MemRef::Quad(qid));
                return true;
            }
        }
    }

    fn contains(&mut self, _ctx: &EvalContext, v: &MemRef) -> bool {
        let MemRef::Quad(qid) = v else {
            return false;
        };
        let matches = self
            .store
            .0
            .quads
            .view(qid, |_, e| {
                e.range.contains(self.horizon) && dir_at(&e.dirs, self.dir) == Some(self.id)
            })
            .unwrap_or(false);
        if matches {
            self.result = Some(v.clone());
        }
        matches
    }

    fn next_path(&mut self, _ctx: &EvalContext) -> bool {
        false
    }

    fn result(&self) -> Option<MemRef> {
        self.result.clone()
    }

    fn tagger(&mut self) -> &mut Tagger<MemoryStore> {
        &mut self.tagger
    }

    fn tag_results(&self, dst: &mut TagMap<MemoryStore>) {
        if let Some(result) = &self.result {
            self.tagger.write_to(dst, result);
        }
    }

    fn stats(&self) -> Costs {
        // The posting list length over-counts dead versions.
        let len = i64::try_from(self.store.posting_len(self.dir, self.id)).unwrap_or(i64::MAX);
        Costs {
            contains_cost: 1,
            next_cost: 1,
            size: Size::around(len),
        }
    }

    fn sub_cursors(&self) -> Vec<&dyn Cursor<MemoryStore>> {
        Vec::new()
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor<MemoryStore>>, bool) {
        (self, false)
    }

    fn clone_cursor(&self) -> Box<dyn Cursor<MemoryStore>> {
        let mut out = Self {
            store: self.store.clone(),
            horizon: self.horizon,
            dir: self.dir,
            id: self.id,
            pos: 0,
            result: None,
            tagger: Tagger::new(),
        };
        out.tagger.copy_from(&self.tagger);
        Box::new(out)
    }

    fn reset(&mut self) {
        self.pos = 0;
        self.result = None;
    }

    fn err(&self) -> Option<&StoreError> {
        None
    }

    fn close(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Every node live at the cursor's horizon, by ascending node id.
struct MemNodesAll {
    store: MemoryStore,
    horizon: u64,
    pos: i64,
    result: Option<MemRef>,
    tagger: Tagger<MemoryStore>,
}

impl Cursor<MemoryStore> for MemNodesAll {
    fn kind(&self) -> CursorKind {
        CursorKind::All
    }

    fn next(&mut self, _ctx: &EvalContext) -> bool {
        let last = self.store.0.next_node_id.load(Ordering::Relaxed);
        loop {
            self.pos += 1;
            if self.pos >= last {
                self.result = None;
                return false;
            }
            let visible = self
                .store
                .0
                .nodes
                .view(&self.pos, |_, e| e.range.contains(self.horizon))
                .unwrap_or(false);
            if visible {
                self.result = Some(MemRef::Node(self.pos));
                return true;
            }
        }
    }

    fn contains(&mut self, _ctx: &EvalContext, v: &MemRef) -> bool {
        let Some(id) = self.store.resolve_node(v) else {
            return false;
        };
        let visible = self
            .store
            .0
            .nodes
            .view(&id, |_, e| e.range.contains(self.horizon))
            .unwrap_or(false);
        if visible {
            self.result = Some(v.clone());
        }
        visible
    }

    fn next_path(&mut self, _ctx: &EvalContext) -> bool {
        false
    }

    fn result(&self) -> Option<MemRef> {
        self.result.clone()
    }

    fn tagger(&mut self) -> &mut Tagger<MemoryStore> {
        &mut self.tagger
    }

    fn tag_results(&self, dst: &mut TagMap<MemoryStore>) {
        if let Some(result) = &self.result {
            self.tagger.write_to(dst, result);
        }
    }

    fn stats(&self) -> Costs {
        let len = i64::try_from(self.store.0.nodes.len()).unwrap_or(i64::MAX);
        Costs {
            contains_cost: 1,
            next_cost: 1,
            size: Size::around(len),
        }
    }

    fn sub_cursors(&self) -> Vec<&dyn Cursor<MemoryStore>> {
        Vec::new()
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor<MemoryStore>>, bool) {
        (self, false)
    }

    fn clone_cursor(&self) -> Box<dyn Cursor<MemoryStore>> {
        let mut out = Self {
            store: self.store.clone(),
            horizon: self.horizon,
            pos: 0,
            result: None,
            tagger: Tagger::new(),
        };
        out.tagger.copy_from(&self.tagger);
        Box::new(out)
    }

    fn reset(&mut self) {
        self.pos = 0;
        self.result = None;
    }

    fn err(&self) -> Option<&StoreError> {
        None
    }

    fn close(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Every quad live at the cursor's horizon, by ascending quad id.
struct MemQuadsAll {
    store: MemoryStore,
    horizon: u64,
    pos: u64,
    result: Option<MemRef>,
    tagger: Tagger<MemoryStore>,
}

impl Cursor<MemoryStore> for MemQuadsAll {
    fn kind(&self) -> CursorKind {
        CursorKind::All
    }

    fn next(&mut self, _ctx: &EvalContext) -> bool {
        let last = self.store.0.next_quad_id.load(Ordering::Relaxed);
        loop {
            self.pos += 1;
            if self.pos >= last {
                self.result = None;
                return false;
            }
            let visible = self
                .store
                .0
                .quads
                .view(&self.pos, |_, e| e.range.contains(self.horizon))
                .unwrap_or(false);
            if visible {
                self.result = Some(MemRef::Quad(self.pos));
                return true;
            }
        }
    }

    fn contains(&mut self, _ctx: &EvalContext, v: &MemRef) -> bool {
        let MemRef::Quad(qid) = v else {
            return false;
        };
        let visible = self
            .store
            .0
            .quads
            .view(qid, |_, e| e.range.contains(self.horizon))
            .unwrap_or(false);
        if visible {
            self.result = Some(v.clone());
        }
        visible
    }

    fn next_path(&mut self, _ctx: &EvalContext) -> bool {
        false
    }

    fn result(&self) -> Option<MemRef> {
        self.result.clone()
    }

    fn tagger(&mut self) -> &mut Tagger<MemoryStore> {
        &mut self.tagger
    }

    fn tag_results(&self, dst: &mut TagMap<MemoryStore>) {
        if let Some(result) = &self.result {
            self.tagger.write_to(dst, result);
        }
    }

    fn stats(&self) -> Costs {
        let len = i64::try_from(self.store.0.quads.len()).unwrap_or(i64::MAX);
        Costs {
            contains_cost: 1,
            next_cost: 1,
            size: Size::around(len),
        }
    }

    fn sub_cursors(&self) -> Vec<&dyn Cursor<MemoryStore>> {
        Vec::new()
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor<MemoryStore>>, bool) {
        (self, false)
    }

    fn clone_cursor(&self) -> Box<dyn Cursor<MemoryStore>> {
        let mut out = Self {
            store: self.store.clone(),
            horizon: self.horizon,
            pos: 0,
            result: None,
            tagger: Tagger::new(),
        };
        out.tagger.copy_from(&self.tagger);
        Box::new(out)
    }

    fn reset(&mut self) {
        self.pos = 0;
        self.result = None;
    }

    fn err(&self) -> Option<&StoreError> {
        None
    }

    fn close(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// The versions an entry is live at, packed small.
///
/// Ranges only ever grow by one add/remove pair at a time, so most entries
/// stay in the two word-sized variants.
#[derive(Default, Eq, PartialEq, Clone, Debug)]
enum VersionRange {
    #[default]
    Empty,
    Start(u64),
    StartEnd(u64, u64),
    Bigger(Box<[u64]>),
}

impl VersionRange {
    fn contains(&self, version: u64) -> bool {
        match self {
            Self::Empty => false,
            Self::Start(start) => *start <= version,
            Self::StartEnd(start, end) => *start <= version && version < *end,
            Self::Bigger(range) => {
                for start_end in range.chunks(2) {
                    match *start_end {
                        [start, end] => {
                            if start <= version && version < end {
                                return true;
                            }
                        }
                        [start] => {
                            if start <= version {
                                return true;
                            }
                        }
                        _ => (),
                    }
                }
                false
            }
        }
    }

    fn add(&mut self, version: u64) -> bool {
        match self {
            Self::Empty => {
                *self = Self::Start(version);
                true
            }
            Self::Start(_) => false,
            Self::StartEnd(start, end) => {
                *self = if version == *end {
                    Self::Start(*start)
                } else {
                    Self::Bigger(Box::new([*start, *end, version]))
                };
                true
            }
            Self::Bigger(vec) => {
                if vec.len() % 2 == 0 {
                    *self = Self::Bigger(if vec.ends_with(&[version]) {
                        pop_boxed_slice(vec)
                    } else {
                        push_boxed_slice(vec, version)
                    });
                    true
                } else {
                    false
                }
            }
        }
    }

    fn remove(&mut self, version: u64) -> bool {
        match self {
            Self::Empty | Self::StartEnd(_, _) => false,
            Self::Start(start) => {
                *self = if *start == version {
                    Self::Empty
                } else {
                    Self::StartEnd(*start, version)
                };
                true
            }
            Self::Bigger(vec) => {
                if vec.len() % 2 == 0 {
                    false
                } else {
                    *self = if vec.ends_with(&[version]) {
                        match vec.as_ref() {
                            [start, end, _] => Self::StartEnd(*start, *end),
                            _ => Self::Bigger(pop_boxed_slice(vec)),
                        }
                    } else {
                        Self::Bigger(push_boxed_slice(vec, version))
                    };
                    true
                }
            }
        }
    }
}

fn push_boxed_slice(slice: &[u64], element: u64) -> Box<[u64]> {
    let mut out = Vec::with_capacity(slice.len() + 1);
    out.extend_from_slice(slice);
    out.push(element);
    out.into_boxed_slice()
}

fn pop_boxed_slice(slice: &[u64]) -> Box<[u64]> {
    slice[..slice.len() - 1].into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use qvquad::Iri;

    fn quad(s: &str, p: &str, o: &str, l: Option<&str>) -> Quad {
        Quad::new(
            Iri::new_unchecked(s),
            Iri::new_unchecked(p),
            Iri::new_unchecked(o),
            l.map(|l| Iri::new_unchecked(l).into()),
        )
    }

    fn add_all(store: &MemoryStore, quads: &[Quad]) {
        let deltas: Vec<Delta> = quads.iter().cloned().map(Delta::add).collect();
        store.apply_deltas(&deltas, IgnoreOpts::default()).unwrap();
    }

    #[test]
    fn version_range() {
        let mut range = VersionRange::default();

        assert!(range.add(1));
        assert!(!range.add(1));
        assert!(range.contains(1));
        assert!(!range.contains(0));
        assert!(range.contains(2));

        assert!(range.remove(1));
        assert!(!range.remove(1));
        assert!(!range.contains(1));

        assert!(range.add(1));
        assert!(range.remove(2));
        assert!(range.contains(1));
        assert!(!range.contains(2));

        assert!(range.add(2));
        assert!(range.contains(3));

        assert!(range.remove(2));
        assert!(range.add(4));
        assert!(range.remove(6));
        assert!(!range.contains(3));
        assert!(range.contains(4));
        assert!(!range.contains(6));
    }

    #[test]
    fn lookup_round_trips() {
        let store = MemoryStore::new();
        add_all(&store, &[quad("a", "follows", "b", None)]);

        let a = Value::from(Iri::new_unchecked("a"));
        let r = store.value_of(&a).unwrap();
        assert!(r.is_node());
        assert_eq!(store.name_of(&r), Some(a));
        assert_eq!(store.value_of(&Value::from(Iri::new_unchecked("zzz"))), None);
    }

    #[test]
    fn quad_direction_matches_the_quad() {
        let store = MemoryStore::new();
        let q = quad("a", "follows", "b", Some("g"));
        add_all(&store, std::slice::from_ref(&q));

        let ctx = EvalContext::background();
        let mut all = store.quads_all_iterator();
        assert!(all.next(&ctx));
        let quad_ref = all.result().unwrap();
        assert!(!quad_ref.is_node());
        assert_eq!(store.quad(&quad_ref).unwrap(), q);
        for d in Direction::ALL {
            let node = store.quad_direction(&quad_ref, d).unwrap();
            assert_eq!(store.name_of(&node), q.get(d).cloned());
        }
        assert!(!all.next(&ctx));
    }

    #[test]
    fn quad_iterator_filters_by_direction() {
        let store = MemoryStore::new();
        add_all(
            &store,
            &[
                quad("a", "follows", "b", None),
                quad("c", "follows", "b", None),
                quad("b", "follows", "d", None),
            ],
        );
        let ctx = EvalContext::background();
        let b = store.value_of(&Iri::new_unchecked("b").into()).unwrap();

        let mut incoming = store.quad_iterator(Direction::Object, &b);
        let mut count = 0;
        while incoming.next(&ctx) {
            let q = store.quad(&incoming.result().unwrap()).unwrap();
            assert_eq!(q.object, Iri::new_unchecked("b").into());
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn deletes_are_atomic_and_snapshots_stable() {
        let store = MemoryStore::new();
        let q = quad("a", "follows", "b", None);
        add_all(&store, std::slice::from_ref(&q));

        // A cursor opened before the delete keeps seeing the quad.
        let ctx = EvalContext::background();
        let mut before = store.quads_all_iterator();
        store
            .apply_deltas(&[Delta::delete(q.clone())], IgnoreOpts::default())
            .unwrap();
        assert!(before.next(&ctx));
        assert!(!before.next(&ctx));

        let mut after = store.quads_all_iterator();
        assert!(!after.next(&ctx));
        // Nodes without incident quads are invisible.
        assert_eq!(store.value_of(&Iri::new_unchecked("a").into()), None);
    }

    #[test]
    fn conflicting_batch_changes_nothing() {
        let store = MemoryStore::new();
        let q = quad("a", "follows", "b", None);
        let batch = [
            Delta::add(q.clone()),
            Delta::add(quad("c", "follows", "d", None)),
            Delta::add(q.clone()),
        ];
        let err = store.apply_deltas(&batch, IgnoreOpts::default()).unwrap_err();
        assert!(matches!(&err, DeltaError::QuadExists(d) if d.quad == q));
        assert_eq!(store.stats(true).unwrap().quads.value, 0);

        store.apply_deltas(&batch, IgnoreOpts::IGNORE_ALL).unwrap();
        assert_eq!(store.stats(true).unwrap().quads.value, 2);
    }

    #[test]
    fn batch_internal_effects_are_seen() {
        let store = MemoryStore::new();
        let q = quad("a", "follows", "b", None);
        // Add and delete within one batch: legal, and nothing survives.
        store
            .apply_deltas(
                &[Delta::add(q.clone()), Delta::delete(q.clone())],
                IgnoreOpts::default(),
            )
            .unwrap();
        assert_eq!(store.stats(true).unwrap().quads.value, 0);
    }

    #[test]
    fn delete_then_readd_is_visible() {
        let store = MemoryStore::new();
        let q = quad("a", "follows", "b", None);
        add_all(&store, std::slice::from_ref(&q));
        store
            .apply_deltas(&[Delta::delete(q.clone())], IgnoreOpts::default())
            .unwrap();
        store
            .apply_deltas(&[Delta::add(q.clone())], IgnoreOpts::default())
            .unwrap();
        assert_eq!(store.stats(true).unwrap().quads.value, 1);
        assert!(store.value_of(&Iri::new_unchecked("a").into()).is_some());
    }

    #[test]
    fn ignore_opts_make_reapplication_idempotent() {
        let store = MemoryStore::new();
        let q = quad("a", "follows", "b", None);
        let add = [Delta::add(q.clone())];
        store.apply_deltas(&add, IgnoreOpts::IGNORE_ALL).unwrap();
        store.apply_deltas(&add, IgnoreOpts::IGNORE_ALL).unwrap();
        assert_eq!(store.stats(true).unwrap().quads.value, 1);

        let del = [Delta::delete(q)];
        store.apply_deltas(&del, IgnoreOpts::IGNORE_ALL).unwrap();
        store.apply_deltas(&del, IgnoreOpts::IGNORE_ALL).unwrap();
        assert_eq!(store.stats(true).unwrap().quads.value, 0);

        let missing = store
            .apply_deltas(
                &[Delta::delete(quad("x", "y", "z", None))],
                IgnoreOpts::default(),
            )
            .unwrap_err();
        assert!(matches!(missing, DeltaError::QuadNotExist(_)));
    }

    #[test]
    fn index_lookup_finds_single_matches() {
        let store = MemoryStore::new();
        add_all(
            &store,
            &[
                quad("a", "follows", "b", None),
                quad("a", "follows", "c", None),
            ],
        );
        let a = store.value_of(&Iri::new_unchecked("a").into()).unwrap();
        let c = store.value_of(&Iri::new_unchecked("c").into()).unwrap();

        let mut filter = DirectionFilter::<MemoryStore>::new();
        filter.insert(Direction::Subject, a.clone());
        assert_eq!(store.size_of_index(&filter), Some(Size::exact(2)));
        assert_eq!(store.lookup_quad_index(&filter), None); // two matches

        filter.insert(Direction::Object, c);
        assert_eq!(store.size_of_index(&filter), Some(Size::exact(1)));
        let found = store.lookup_quad_index(&filter).unwrap();
        assert_eq!(
            store.quad(&found).unwrap(),
            quad("a", "follows", "c", None)
        );
    }

    #[test]
    fn linksto_over_single_fixed_becomes_native() {
        let store = MemoryStore::new();
        add_all(&store, &[quad("a", "follows", "b", None)]);
        let a = store.value_of(&Iri::new_unchecked("a").into()).unwrap();
        let links = LinksTo::boxed(
            store.clone(),
            Fixed::boxed(vec![a]),
            Direction::Subject,
        );
        let (it, replaced) = store.optimize_iterator(links);
        assert!(replaced);
        assert_eq!(it.kind(), CursorKind::Custom);
    }

    #[test]
    fn metrics_count_writes() {
        let store = MemoryStore::new();
        add_all(&store, &[quad("a", "follows", "b", None)]);
        let metrics = QuadStore::metrics(&store).unwrap();
        assert_eq!(metrics.adds_total.load(Ordering::Relaxed), 1);
    }
}
