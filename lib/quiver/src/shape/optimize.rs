//! Generic shape rewrites.
//!
//! Optimization is a single bottom-up pass, written so that running it twice
//! yields the same tree. After each node's generic rewrite the store's
//! [`ShapeOptimizer`](crate::store::ShapeOptimizer) hook gets a chance to
//! swap the node for a native equivalent.

use crate::shape::{fixed_count, QuadFilter, QuadsAction, Shape};
use crate::store::{QuadIndexer, QuadStore, Size};
use qvquad::Direction;
use std::collections::BTreeMap;

impl<S: QuadStore> Shape<S> {
    /// Rewrites the shape into an equivalent, cheaper one.
    ///
    /// The result is structurally stable: optimizing an already-optimized
    /// shape returns it unchanged.
    pub fn optimize(self, store: &S) -> Self {
        let shape = self.optimize_node(store);
        if let Some(hook) = store.shape_optimizer() {
            let (shape, _) = hook.optimize_shape(shape);
            shape
        } else {
            shape
        }
    }

    fn optimize_node(self, store: &S) -> Self {
        match self {
            Self::AllNodes | Self::Null => self,
            Self::Fixed(refs) => {
                if refs.is_empty() {
                    Self::Null
                } else {
                    Self::Fixed(refs)
                }
            }
            Self::Lookup(values) => {
                let mut refs = Vec::with_capacity(values.len());
                for value in &values {
                    // One unresolved value empties the whole set.
                    match store.value_of(value) {
                        Some(r) => refs.push(r),
                        None => return Self::Null,
                    }
                }
                Self::Fixed(refs).optimize_node(store)
            }
            Self::Except { exclude, from } => {
                let exclude = exclude.optimize(store);
                let from = from.optimize(store);
                match (exclude, from) {
                    (Self::AllNodes, _) | (_, Self::Null) => Self::Null,
                    (Self::Null, from) => from,
                    (exclude, from) => Self::Except {
                        exclude: Box::new(exclude),
                        from: Box::new(from),
                    },
                }
            }
            Self::Filter { from, filters } => {
                let from = from.optimize(store);
                if filters.is_empty() {
                    return from;
                }
                if from.is_null() {
                    return Self::Null;
                }
                Self::Filter {
                    from: Box::new(from),
                    filters,
                }
            }
            Self::Count { values } => {
                let values = values.optimize(store);
                if values.is_null() {
                    return fixed_count(0);
                }
                Self::Count {
                    values: Box::new(values),
                }
            }
            Self::Quads(filters) => {
                let mut out = Vec::with_capacity(filters.len());
                for filter in filters {
                    let values = filter.values.optimize(store);
                    // A constrained direction with no candidates matches no quad.
                    if values.is_null() {
                        return Self::Null;
                    }
                    out.push(QuadFilter {
                        dir: filter.dir,
                        values: Box::new(values),
                    });
                }
                Self::Quads(out)
            }
            Self::NodesFrom { dir, quads } => {
                let quads = quads.optimize(store);
                if quads.is_null() {
                    return Self::Null;
                }
                if let Self::Quads(filters) = &quads {
                    if let Some(action) = fuse_quads_action(dir, filters) {
                        return Self::QuadsAction(action).optimize_node(store);
                    }
                }
                Self::NodesFrom {
                    dir,
                    quads: Box::new(quads),
                }
            }
            Self::QuadsAction(mut action) => {
                if let Some(indexer) = store.quad_indexer() {
                    if let Some(size) = indexer.size_of_index(&action.filter) {
                        if size.exact && size.value == 0 {
                            return Self::Null;
                        }
                        action.size = size;
                    }
                }
                Self::QuadsAction(action)
            }
            Self::FixedTags { tags, on } => {
                let on = on.optimize(store);
                if tags.is_empty() {
                    return on;
                }
                if on.is_null() {
                    return Self::Null;
                }
                if let Self::FixedTags {
                    tags: inner_tags,
                    on: inner,
                } = on
                {
                    let mut tags = tags;
                    for tag in inner_tags {
                        if !tags.contains(&tag) {
                            tags.push(tag);
                        }
                    }
                    return Self::FixedTags { tags, on: inner };
                }
                Self::FixedTags {
                    tags,
                    on: Box::new(on),
                }
            }
            Self::Materialize { size, values } => {
                let values = values.optimize(store);
                if values.is_null() {
                    return Self::Null;
                }
                Self::Materialize {
                    size,
                    values: Box::new(values),
                }
            }
            Self::Intersect(subs) => optimize_intersect(subs, Vec::new(), store),
            Self::IntersectOpt { sub, opt } => {
                let opt: Vec<Shape<S>> = opt
                    .into_iter()
                    .map(|o| o.optimize(store))
                    .filter(|o| !o.is_null())
                    .collect();
                optimize_intersect(sub, opt, store)
            }
            Self::Union(subs) => {
                let mut flat = Vec::with_capacity(subs.len());
                for sub in subs {
                    match sub.optimize(store) {
                        Self::Null => (),
                        Self::Union(inner) => flat.extend(inner),
                        sub => flat.push(sub),
                    }
                }
                match flat.len() {
                    0 => Self::Null,
                    1 => flat.pop().unwrap_or(Self::Null),
                    _ => pop_union_fixed_tags(flat),
                }
            }
            Self::Page { from, skip, limit } => {
                let from = from.optimize(store);
                if from.is_null() {
                    return Self::Null;
                }
                let (from, skip, limit) = if let Self::Page {
                    from: inner,
                    skip: inner_skip,
                    limit: inner_limit,
                } = from
                {
                    // The outer page applies after the inner one.
                    let skip_total = inner_skip.saturating_add(skip);
                    let limit_total = if inner_limit > 0 {
                        let rest = inner_limit - skip;
                        if rest <= 0 {
                            return Self::Null;
                        }
                        if limit > 0 { rest.min(limit) } else { rest }
                    } else {
                        limit
                    };
                    (inner, skip_total, limit_total)
                } else {
                    (Box::new(from), skip, limit)
                };
                if skip == 0 && limit == 0 {
                    return *from;
                }
                Self::Page { from, skip, limit }
            }
            Self::Unique(from) => {
                let from = from.optimize(store);
                match from {
                    Self::Null => Self::Null,
                    Self::Unique(inner) => Self::Unique(inner),
                    from => Self::Unique(Box::new(from)),
                }
            }
            Self::Save { tags, from } => {
                let from = from.optimize(store);
                if tags.is_empty() {
                    return from;
                }
                if from.is_null() {
                    return Self::Null;
                }
                if let Self::Save {
                    tags: inner_tags,
                    from: inner,
                } = from
                {
                    let mut tags = tags;
                    for tag in inner_tags {
                        if !tags.contains(&tag) {
                            tags.push(tag);
                        }
                    }
                    return Self::Save { tags, from: inner };
                }
                Self::Save {
                    tags,
                    from: Box::new(from),
                }
            }
            Self::Sort(from) => {
                let from = from.optimize(store);
                match from {
                    Self::Null => Self::Null,
                    Self::Sort(inner) => Self::Sort(inner),
                    from => Self::Sort(Box::new(from)),
                }
            }
            Self::Optional(from) => {
                let from = from.optimize(store);
                if from.is_null() {
                    return Self::Null;
                }
                Self::Optional(Box::new(from))
            }
        }
    }
}

/// Recognises a quad set whose filters are all constants or saves, the
/// precondition for the fused [`QuadsAction`] form.
fn fuse_quads_action<S: QuadStore>(
    result: Direction,
    filters: &[QuadFilter<S>],
) -> Option<QuadsAction<S>> {
    let mut filter = BTreeMap::new();
    let mut save: BTreeMap<Direction, Vec<String>> = BTreeMap::new();
    for f in filters {
        match f.values.as_ref() {
            Shape::Fixed(refs) => {
                if let [r] = refs.as_slice() {
                    if let Some(existing) = filter.get(&f.dir) {
                        if existing != r {
                            // Contradictory constants; leave the generic
                            // lowering to produce the empty intersection.
                            return None;
                        }
                    } else {
                        filter.insert(f.dir, r.clone());
                    }
                } else {
                    return None;
                }
            }
            Shape::Save { tags, from } if matches!(from.as_ref(), Shape::AllNodes) => {
                save.entry(f.dir).or_default().extend(tags.iter().cloned());
            }
            _ => return None,
        }
    }
    Some(QuadsAction {
        result,
        filter,
        save,
        size: Size::around(0),
    })
}

/// The shared rewrite of [`Shape::Intersect`] and [`Shape::IntersectOpt`].
fn optimize_intersect<S: QuadStore>(
    subs: Vec<Shape<S>>,
    opt: Vec<Shape<S>>,
    store: &S,
) -> Shape<S> {
    let mut flat: Vec<Shape<S>> = Vec::with_capacity(subs.len());
    let mut opt = opt;
    let mut hoisted_tags: Vec<(String, S::Ref)> = Vec::new();
    let mut fixed: Option<Vec<S::Ref>> = None;

    let mut pending: Vec<Shape<S>> = subs;
    pending.reverse();
    while let Some(sub) = pending.pop() {
        match sub.optimize(store) {
            Shape::Null => return Shape::Null,
            // The universe adds no restriction.
            Shape::AllNodes => (),
            Shape::Intersect(inner) => {
                for s in inner.into_iter().rev() {
                    pending.push(s);
                }
            }
            Shape::IntersectOpt { sub: inner, opt: o } => {
                for s in inner.into_iter().rev() {
                    pending.push(s);
                }
                opt.extend(o);
            }
            // Constant tags apply to the whole intersection; pop them to the top.
            Shape::FixedTags { tags, on } => {
                hoisted_tags.extend(tags);
                pending.push(*on);
            }
            // Multiple explicit sets merge into their intersection.
            Shape::Fixed(refs) => {
                fixed = Some(match fixed.take() {
                    None => refs,
                    Some(prev) => prev.into_iter().filter(|r| refs.contains(r)).collect(),
                });
            }
            sub => flat.push(sub),
        }
    }

    // Exactly one tagging child is equivalent to tagging the intersection;
    // its content rejoins the normalization like any other child.
    let mut save_tags: Option<Vec<String>> = None;
    if flat.iter().filter(|s| matches!(s, Shape::Save { .. })).count() == 1 {
        let mut kept = Vec::with_capacity(flat.len());
        for sub in flat {
            match sub {
                Shape::Save { tags, from } if save_tags.is_none() => {
                    save_tags = Some(tags);
                    match *from {
                        Shape::Null => return Shape::Null,
                        Shape::AllNodes => (),
                        Shape::Intersect(inner) => kept.extend(inner),
                        Shape::Fixed(refs) => {
                            fixed = Some(match fixed.take() {
                                None => refs,
                                Some(prev) => {
                                    prev.into_iter().filter(|r| refs.contains(r)).collect()
                                }
                            });
                        }
                        from => kept.push(from),
                    }
                }
                sub => kept.push(sub),
            }
        }
        flat = kept;
    }

    if let Some(refs) = &fixed {
        if refs.is_empty() {
            return Shape::Null;
        }
    }

    // A single fixed value constrains the sibling's result direction
    // directly, so the explicit set disappears into the sibling.
    let mut pushed = false;
    if let (Some(refs), [sibling]) = (&fixed, flat.as_mut_slice()) {
        if let [r] = refs.as_slice() {
            if push_fixed_into(sibling, r) {
                fixed = None;
                pushed = true;
            }
        }
    }
    if pushed {
        // Renormalize the sibling: the new constraint may have emptied it.
        let sibling = flat.pop().unwrap_or(Shape::Null).optimize_node(store);
        if sibling.is_null() {
            return Shape::Null;
        }
        flat.push(sibling);
    }

    if let Some(refs) = fixed {
        flat.insert(0, Shape::Fixed(refs));
    }

    let mut out = match (flat.len(), opt.is_empty()) {
        (0, true) => Shape::AllNodes,
        (1, true) => flat.pop().unwrap_or(Shape::Null),
        (_, true) => Shape::Intersect(flat),
        (0, false) => Shape::IntersectOpt {
            sub: vec![Shape::AllNodes],
            opt,
        },
        (_, false) => Shape::IntersectOpt { sub: flat, opt },
    };
    if let Some(tags) = save_tags {
        out = Shape::Save {
            tags,
            from: Box::new(out),
        };
    }
    if !hoisted_tags.is_empty() {
        out = Shape::FixedTags {
            tags: hoisted_tags,
            on: Box::new(out),
        };
    }
    out
}

/// Pushes a single fixed ref into the sibling's result-direction constraint.
/// Returns whether the push happened.
fn push_fixed_into<S: QuadStore>(sibling: &mut Shape<S>, r: &S::Ref) -> bool {
    match sibling {
        Shape::QuadsAction(action) => match action.filter.get(&action.result) {
            Some(existing) => existing == r,
            None => {
                action.filter.insert(action.result, r.clone());
                true
            }
        },
        Shape::NodesFrom { dir, quads } => {
            if let Shape::Quads(filters) = quads.as_mut() {
                filters.push(QuadFilter::new(*dir, Shape::Fixed(vec![r.clone()])));
                true
            } else {
                false
            }
        }
        _ => false,
    }
}

/// Hoists identical constant tags common to every union branch.
fn pop_union_fixed_tags<S: QuadStore>(subs: Vec<Shape<S>>) -> Shape<S> {
    let all_same = match subs.first() {
        Some(Shape::FixedTags { tags, .. }) => {
            let tags = tags.clone();
            subs.iter().all(
                |s| matches!(s, Shape::FixedTags { tags: t, .. } if *t == tags),
            )
        }
        _ => false,
    };
    if !all_same {
        return Shape::Union(subs);
    }
    let mut tags = Vec::new();
    let inner: Vec<Shape<S>> = subs
        .into_iter()
        .map(|s| {
            if let Shape::FixedTags { tags: t, on } = s {
                tags = t;
                *on
            } else {
                s
            }
        })
        .collect();
    Shape::FixedTags {
        tags,
        on: Box::new(Shape::Union(inner)),
    }
}
