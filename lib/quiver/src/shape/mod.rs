//! The declarative query algebra.
//!
//! A [`Shape`] describes a set of nodes (or quads) independently of any
//! backend. Shapes are optimized by generic rewrites plus an optional
//! store-specific pass, then lowered to a [`Cursor`] tree with
//! [`Shape::build_iterator`]. Keeping the two layers separate lets the shape
//! pass do cheap structural rewrites (fusion, tag hoisting) while the cursor
//! layer owns runtime state and cost.

mod optimize;

use crate::iterator::{
    And, CmpOp, Comparison, Count, Cursor, ErrorCursor, Fixed, FixedTags, HasA, Limit, LinksTo,
    Materialize, Not, Null, Optional, Or, Regexp, Save, Skip, Sort, Unique,
};
use crate::store::{QuadIndexer, QuadStore, RefValue, Size};
use qvquad::{Direction, Value};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;

/// A filter over the value behind a ref.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueFilter {
    /// Keep values ordered `op` against a constant.
    Comparison { op: CmpOp, value: Value },
    /// Keep values matching a regular expression.
    Regexp { pattern: String, allow_refs: bool },
    /// Keep values matching a `*`/`?` glob; compiled down to a regexp.
    Wildcard { pattern: String },
}

impl ValueFilter {
    /// The anchored regular expression equivalent to a glob pattern.
    pub fn wildcard_to_regexp(pattern: &str) -> String {
        let mut out = String::with_capacity(pattern.len() + 2);
        out.push('^');
        for c in pattern.chars() {
            match c {
                '*' => out.push_str(".*"),
                '?' => out.push('.'),
                c => out.push_str(&regex::escape(&c.to_string())),
            }
        }
        out.push('$');
        out
    }

    fn build<S: QuadStore>(&self, store: &S, sub: Box<dyn Cursor<S>>) -> Box<dyn Cursor<S>> {
        match self {
            Self::Comparison { op, value } => {
                Comparison::boxed(store.clone(), sub, *op, value.clone())
            }
            Self::Regexp {
                pattern,
                allow_refs,
            } => match Regex::new(pattern) {
                Ok(re) => {
                    let it = Regexp::new(store.clone(), sub, re);
                    Box::new(if *allow_refs { it.with_refs() } else { it })
                }
                Err(e) => ErrorCursor::boxed(crate::error::StoreError::misuse(format!(
                    "invalid regular expression: {e}"
                ))),
            },
            Self::Wildcard { pattern } => Self::Regexp {
                pattern: Self::wildcard_to_regexp(pattern),
                allow_refs: false,
            }
            .build(store, sub),
        }
    }
}

/// One per-direction constraint on a quad.
#[derive(Clone)]
pub struct QuadFilter<S: QuadStore> {
    pub dir: Direction,
    pub values: Box<Shape<S>>,
}

impl<S: QuadStore> QuadFilter<S> {
    pub fn new(dir: Direction, values: Shape<S>) -> Self {
        Self {
            dir,
            values: Box::new(values),
        }
    }
}

impl<S: QuadStore> fmt::Debug for QuadFilter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuadFilter")
            .field("dir", &self.dir)
            .field("values", &self.values)
            .finish()
    }
}

impl<S: QuadStore> PartialEq for QuadFilter<S> {
    fn eq(&self, other: &Self) -> bool {
        self.dir == other.dir && self.values == other.values
    }
}

/// The planner's preferred fused form: scan the quads matching `filter`,
/// bind `save` tags per direction, project to `result`.
#[derive(Clone)]
pub struct QuadsAction<S: QuadStore> {
    pub result: Direction,
    pub filter: BTreeMap<Direction, S::Ref>,
    pub save: BTreeMap<Direction, Vec<String>>,
    pub size: Size,
}

impl<S: QuadStore> QuadsAction<S> {
    fn build_iterator(&self, store: &S) -> Box<dyn Cursor<S>> {
        if let Some(indexer) = store.quad_indexer() {
            // Single-match folding: the index proves there is exactly one
            // quad, so the whole scan collapses to a constant.
            if let Some(quad) = indexer.lookup_quad_index(&self.filter) {
                let Some(result) = store.quad_direction(&quad, self.result) else {
                    return Null::boxed();
                };
                let mut bound = Vec::new();
                for (dir, tags) in &self.save {
                    let Some(node) = store.quad_direction(&quad, *dir) else {
                        return Null::boxed();
                    };
                    bound.extend(tags.iter().map(|t| (t.clone(), node.clone())));
                }
                let fixed = Fixed::boxed(vec![result]);
                return if bound.is_empty() {
                    fixed
                } else {
                    FixedTags::boxed(fixed, bound)
                };
            }
        }
        let mut subs: Vec<Box<dyn Cursor<S>>> = Vec::new();
        for (dir, r) in &self.filter {
            subs.push(LinksTo::boxed(
                store.clone(),
                Fixed::boxed(vec![r.clone()]),
                *dir,
            ));
        }
        for (dir, tags) in &self.save {
            subs.push(LinksTo::boxed(
                store.clone(),
                Save::boxed(store.nodes_all_iterator(), tags.clone()),
                *dir,
            ));
        }
        if subs.is_empty() {
            return HasA::boxed(store.clone(), store.quads_all_iterator(), self.result);
        }
        HasA::boxed(store.clone(), And::boxed(subs), self.result)
    }
}

impl<S: QuadStore> fmt::Debug for QuadsAction<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuadsAction")
            .field("result", &self.result)
            .field("filter", &self.filter)
            .field("save", &self.save)
            .field("size", &self.size)
            .finish()
    }
}

impl<S: QuadStore> PartialEq for QuadsAction<S> {
    fn eq(&self, other: &Self) -> bool {
        self.result == other.result
            && self.filter == other.filter
            && self.save == other.save
            && self.size == other.size
    }
}

/// A declarative query tree over one store's refs.
///
/// ```
/// use quiver::{iterate, EvalContext, MemoryStore, QuadStore, Shape, Transaction};
/// use qvquad::{Iri, Quad, Value};
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
///
/// let shape = Shape::lookup([Value::from(Iri::new_unchecked("a"))])
///     .out(Shape::lookup([Value::from(Iri::new_unchecked("follows"))]));
/// let followed = iterate::collect_values(
///     &store,
///     shape.optimize(&store).build_iterator(&store),
///     &EvalContext::background(),
/// )?;
/// assert_eq!(followed, vec![Value::from(Iri::new_unchecked("b"))]);
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Clone)]
pub enum Shape<S: QuadStore> {
    /// Every node in the store.
    AllNodes,
    /// The empty set.
    Null,
    /// An explicit set of refs.
    Fixed(Vec<S::Ref>),
    /// Values not yet resolved against the store; resolution happens at
    /// optimization time and an unknown value drops the shape to [`Shape::Null`].
    Lookup(Vec<Value>),
    /// `from` minus `exclude`.
    Except {
        exclude: Box<Shape<S>>,
        from: Box<Shape<S>>,
    },
    /// `from`, filtered by value predicates.
    Filter {
        from: Box<Shape<S>>,
        filters: Vec<ValueFilter>,
    },
    /// The number of results of `values`, as a single node.
    Count { values: Box<Shape<S>> },
    /// Quads satisfying every per-direction constraint.
    Quads(Vec<QuadFilter<S>>),
    /// Nodes in position `dir` of the quads.
    NodesFrom {
        dir: Direction,
        quads: Box<Shape<S>>,
    },
    /// The fused filter/save/project form.
    QuadsAction(QuadsAction<S>),
    /// `on`, with constant tag bindings added to every result.
    FixedTags {
        tags: Vec<(String, S::Ref)>,
        on: Box<Shape<S>>,
    },
    /// `values`, buffered in memory on first use.
    Materialize {
        size: i64,
        values: Box<Shape<S>>,
    },
    /// Intersection.
    Intersect(Vec<Shape<S>>),
    /// Intersection with non-restricting optional branches.
    IntersectOpt {
        sub: Vec<Shape<S>>,
        opt: Vec<Shape<S>>,
    },
    /// Union, without deduplication.
    Union(Vec<Shape<S>>),
    /// Paging: `skip` results dropped, then at most `limit` returned
    /// (0 = unbounded).
    Page {
        from: Box<Shape<S>>,
        skip: i64,
        limit: i64,
    },
    /// Deduplication.
    Unique(Box<Shape<S>>),
    /// `from`, with tags bound to every result.
    Save {
        tags: Vec<String>,
        from: Box<Shape<S>>,
    },
    /// Ascending canonical-string order.
    Sort(Box<Shape<S>>),
    /// A non-restricting branch; only meaningful under [`Shape::IntersectOpt`].
    Optional(Box<Shape<S>>),
}

impl<S: QuadStore> Shape<S> {
    /// A shape resolving the given values at optimization time.
    pub fn lookup(values: impl IntoIterator<Item = Value>) -> Self {
        Self::Lookup(values.into_iter().collect())
    }

    /// An explicit set of refs.
    pub fn fixed(refs: impl IntoIterator<Item = S::Ref>) -> Self {
        Self::Fixed(refs.into_iter().collect())
    }

    /// The nodes reachable from `self` over an outgoing `via` predicate.
    pub fn out(self, via: Self) -> Self {
        self.traverse(via, None, Direction::Subject, Direction::Object)
    }

    /// [`Shape::out`], restricted to quads labeled with `label`.
    pub fn out_with_label(self, via: Self, label: Self) -> Self {
        self.traverse(via, Some(label), Direction::Subject, Direction::Object)
    }

    /// The nodes reaching `self` over an incoming `via` predicate.
    pub fn r#in(self, via: Self) -> Self {
        self.traverse(via, None, Direction::Object, Direction::Subject)
    }

    fn traverse(self, via: Self, label: Option<Self>, from: Direction, to: Direction) -> Self {
        let mut filters = vec![
            QuadFilter::new(from, self),
            QuadFilter::new(Direction::Predicate, via),
        ];
        if let Some(label) = label {
            filters.push(QuadFilter::new(Direction::Label, label));
        }
        Self::NodesFrom {
            dir: to,
            quads: Box::new(Self::Quads(filters)),
        }
    }

    /// Binds `tag` to every result.
    pub fn tagged(self, tag: impl Into<String>) -> Self {
        Self::Save {
            tags: vec![tag.into()],
            from: Box::new(self),
        }
    }

    /// Checks whether this shape is trivially empty.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Lowers the shape to a cursor tree, structurally.
    ///
    /// Run [`Shape::optimize`] first to get a reasonable plan; lowering alone
    /// performs no rewrites except index-backed folding of
    /// [`Shape::QuadsAction`].
    pub fn build_iterator(&self, store: &S) -> Box<dyn Cursor<S>> {
        match self {
            Self::AllNodes => store.nodes_all_iterator(),
            Self::Null => Null::boxed(),
            Self::Fixed(refs) => Fixed::boxed(refs.clone()),
            Self::Lookup(values) => {
                let mut refs = Vec::with_capacity(values.len());
                for value in values {
                    match store.value_of(value) {
                        Some(r) => refs.push(r),
                        None => return Null::boxed(),
                    }
                }
                Fixed::boxed(refs)
            }
            Self::Except { exclude, from } => Not::boxed(
                exclude.build_iterator(store),
                from.build_iterator(store),
            ),
            Self::Filter { from, filters } => {
                let mut it = from.build_iterator(store);
                for filter in filters {
                    it = filter.build(store, it);
                }
                it
            }
            Self::Count { values } => Count::boxed(values.build_iterator(store)),
            Self::Quads(filters) => {
                if filters.is_empty() {
                    return store.quads_all_iterator();
                }
                And::boxed(
                    filters
                        .iter()
                        .map(|f| {
                            LinksTo::boxed(store.clone(), f.values.build_iterator(store), f.dir)
                        })
                        .collect(),
                )
            }
            Self::NodesFrom { dir, quads } => {
                HasA::boxed(store.clone(), quads.build_iterator(store), *dir)
            }
            Self::QuadsAction(action) => action.build_iterator(store),
            Self::FixedTags { tags, on } => {
                FixedTags::boxed(on.build_iterator(store), tags.iter().cloned())
            }
            Self::Materialize { values, .. } => Materialize::boxed(values.build_iterator(store)),
            Self::Intersect(subs) => {
                if subs.is_empty() {
                    return store.nodes_all_iterator();
                }
                And::boxed(subs.iter().map(|s| s.build_iterator(store)).collect())
            }
            Self::IntersectOpt { sub, opt } => {
                let mut and = if sub.is_empty() {
                    And::new(vec![store.nodes_all_iterator()])
                } else {
                    And::new(sub.iter().map(|s| s.build_iterator(store)).collect())
                };
                for o in opt {
                    and.add_optional(Optional::boxed(o.build_iterator(store)));
                }
                Box::new(and)
            }
            Self::Union(subs) => {
                Or::boxed(subs.iter().map(|s| s.build_iterator(store)).collect())
            }
            Self::Page { from, skip, limit } => {
                let mut it = from.build_iterator(store);
                if *skip != 0 {
                    it = Skip::boxed(it, *skip);
                }
                if *limit != 0 {
                    it = Limit::boxed(it, *limit);
                }
                it
            }
            Self::Unique(from) => Unique::boxed(from.build_iterator(store)),
            Self::Save { tags, from } => {
                Save::boxed(from.build_iterator(store), tags.iter().cloned())
            }
            Self::Sort(from) => Sort::boxed(store.clone(), from.build_iterator(store)),
            Self::Optional(from) => Optional::boxed(from.build_iterator(store)),
        }
    }

    /// Lowers and optimizes the cursor tree in one call, letting the store's
    /// iterator hook have the last word.
    pub fn build_optimized(&self, store: &S) -> Box<dyn Cursor<S>> {
        crate::iterator::optimize_cursor(store, self.build_iterator(store))
    }

    /// Unfolds composite shapes ([`Shape::QuadsAction`],
    /// [`ValueFilter::Wildcard`]) into their primitive equivalents, for
    /// backends that do not recognise them.
    pub fn simplify(self) -> Self {
        match self {
            Self::QuadsAction(action) => {
                let mut filters = Vec::new();
                for (dir, r) in action.filter {
                    filters.push(QuadFilter::new(dir, Self::Fixed(vec![r])));
                }
                for (dir, tags) in action.save {
                    filters.push(QuadFilter::new(
                        dir,
                        Self::Save {
                            tags,
                            from: Box::new(Self::AllNodes),
                        },
                    ));
                }
                Self::NodesFrom {
                    dir: action.result,
                    quads: Box::new(Self::Quads(filters)),
                }
            }
            Self::Filter { from, filters } => Self::Filter {
                from: Box::new(from.simplify()),
                filters: filters
                    .into_iter()
                    .map(|f| match f {
                        ValueFilter::Wildcard { pattern } => ValueFilter::Regexp {
                            pattern: ValueFilter::wildcard_to_regexp(&pattern),
                            allow_refs: false,
                        },
                        f => f,
                    })
                    .collect(),
            },
            Self::AllNodes | Self::Null | Self::Fixed(_) | Self::Lookup(_) => self,
            Self::Except { exclude, from } => Self::Except {
                exclude: Box::new(exclude.simplify()),
                from: Box::new(from.simplify()),
            },
            Self::Count { values } => Self::Count {
                values: Box::new(values.simplify()),
            },
            Self::Quads(filters) => Self::Quads(
                filters
                    .into_iter()
                    .map(|f| QuadFilter {
                        dir: f.dir,
                        values: Box::new(f.values.simplify()),
                    })
                    .collect(),
            ),
            Self::NodesFrom { dir, quads } => Self::NodesFrom {
                dir,
                quads: Box::new(quads.simplify()),
            },
            Self::FixedTags { tags, on } => Self::FixedTags {
                tags,
                on: Box::new(on.simplify()),
            },
            Self::Materialize { size, values } => Self::Materialize {
                size,
                values: Box::new(values.simplify()),
            },
            Self::Intersect(subs) => {
                Self::Intersect(subs.into_iter().map(Self::simplify).collect())
            }
            Self::IntersectOpt { sub, opt } => Self::IntersectOpt {
                sub: sub.into_iter().map(Self::simplify).collect(),
                opt: opt.into_iter().map(Self::simplify).collect(),
            },
            Self::Union(subs) => Self::Union(subs.into_iter().map(Self::simplify).collect()),
            Self::Page { from, skip, limit } => Self::Page {
                from: Box::new(from.simplify()),
                skip,
                limit,
            },
            Self::Unique(from) => Self::Unique(Box::new(from.simplify())),
            Self::Save { tags, from } => Self::Save {
                tags,
                from: Box::new(from.simplify()),
            },
            Self::Sort(from) => Self::Sort(Box::new(from.simplify())),
            Self::Optional(from) => Self::Optional(Box::new(from.simplify())),
        }
    }
}

impl<S: QuadStore> fmt::Debug for Shape<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllNodes => f.write_str("AllNodes"),
            Self::Null => f.write_str("Null"),
            Self::Fixed(refs) => f.debug_tuple("Fixed").field(refs).finish(),
            Self::Lookup(values) => f.debug_tuple("Lookup").field(values).finish(),
            Self::Except { exclude, from } => f
                .debug_struct("Except")
                .field("exclude", exclude)
                .field("from", from)
                .finish(),
            Self::Filter { from, filters } => f
                .debug_struct("Filter")
                .field("from", from)
                .field("filters", filters)
                .finish(),
            Self::Count { values } => f.debug_struct("Count").field("values", values).finish(),
            Self::Quads(filters) => f.debug_tuple("Quads").field(filters).finish(),
            Self::NodesFrom { dir, quads } => f
                .debug_struct("NodesFrom")
                .field("dir", dir)
                .field("quads", quads)
                .finish(),
            Self::QuadsAction(action) => f.debug_tuple("QuadsAction").field(action).finish(),
            Self::FixedTags { tags, on } => f
                .debug_struct("FixedTags")
                .field("tags", tags)
                .field("on", on)
                .finish(),
            Self::Materialize { size, values } => f
                .debug_struct("Materialize")
                .field("size", size)
                .field("values", values)
                .finish(),
            Self::Intersect(subs) => f.debug_tuple("Intersect").field(subs).finish(),
            Self::IntersectOpt { sub, opt } => f
                .debug_struct("IntersectOpt")
                .field("sub", sub)
                .field("opt", opt)
                .finish(),
            Self::Union(subs) => f.debug_tuple("Union").field(subs).finish(),
            Self::Page { from, skip, limit } => f
                .debug_struct("Page")
                .field("from", from)
                .field("skip", skip)
                .field("limit", limit)
                .finish(),
            Self::Unique(from) => f.debug_tuple("Unique").field(from).finish(),
            Self::Save { tags, from } => f
                .debug_struct("Save")
                .field("tags", tags)
                .field("from", from)
                .finish(),
            Self::Sort(from) => f.debug_tuple("Sort").field(from).finish(),
            Self::Optional(from) => f.debug_tuple("Optional").field(from).finish(),
        }
    }
}

impl<S: QuadStore> PartialEq for Shape<S> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::AllNodes, Self::AllNodes) | (Self::Null, Self::Null) => true,
            (Self::Fixed(a), Self::Fixed(b)) => a == b,
            (Self::Lookup(a), Self::Lookup(b)) => a == b,
            (
                Self::Except {
                    exclude: ea,
                    from: fa,
                },
                Self::Except {
                    exclude: eb,
                    from: fb,
                },
            ) => ea == eb && fa == fb,
            (
                Self::Filter {
                    from: fa,
                    filters: la,
                },
                Self::Filter {
                    from: fb,
                    filters: lb,
                },
            ) => fa == fb && la == lb,
            (Self::Count { values: a }, Self::Count { values: b }) => a == b,
            (Self::Quads(a), Self::Quads(b)) => a == b,
            (
                Self::NodesFrom { dir: da, quads: qa },
                Self::NodesFrom { dir: db, quads: qb },
            ) => da == db && qa == qb,
            (Self::QuadsAction(a), Self::QuadsAction(b)) => a == b,
            (
                Self::FixedTags { tags: ta, on: oa },
                Self::FixedTags { tags: tb, on: ob },
            ) => ta == tb && oa == ob,
            (
                Self::Materialize {
                    size: sa,
                    values: va,
                },
                Self::Materialize {
                    size: sb,
                    values: vb,
                },
            ) => sa == sb && va == vb,
            (Self::Intersect(a), Self::Intersect(b)) => a == b,
            (
                Self::IntersectOpt { sub: sa, opt: oa },
                Self::IntersectOpt { sub: sb, opt: ob },
            ) => sa == sb && oa == ob,
            (Self::Union(a), Self::Union(b)) => a == b,
            (
                Self::Page {
                    from: fa,
                    skip: sa,
                    limit: la,
                },
                Self::Page {
                    from: fb,
                    skip: sb,
                    limit: lb,
                },
            ) => fa == fb && sa == sb && la == lb,
            (Self::Unique(a), Self::Unique(b)) => a == b,
            (
                Self::Save { tags: ta, from: fa },
                Self::Save { tags: tb, from: fb },
            ) => ta == tb && fa == fb,
            (Self::Sort(a), Self::Sort(b)) => a == b,
            (Self::Optional(a), Self::Optional(b)) => a == b,
            _ => false,
        }
    }
}

/// A resolved count shape: used when a count is known at optimize time.
pub(crate) fn fixed_count<S: QuadStore>(count: i64) -> Shape<S> {
    Shape::Fixed(vec![S::Ref::pre_fetched(Value::Int(count))])
}
