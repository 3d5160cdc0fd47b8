//! End-to-end queries over the canonical follows/status graph.

use quiver::{
    iterate, And, Cursor, CursorKind, Delta, EvalContext, Fixed, HasA, IgnoreOpts, LinksTo,
    MemoryStore, QuadStore, Save, Shape, TagMap, Unique,
};
use qvnquads::NQuadsParser;
use qvquad::{Direction, Iri, Quad, Value};

const GRAPH: &str = r#"
<A> <follows> <B> .
<C> <follows> <B> .
<C> <follows> <D> .
<D> <follows> <B> .
<B> <follows> <F> .
<F> <follows> <G> .
<D> <follows> <G> .
<E> <follows> <F> .
<B> <status> "cool" <status_graph> .
<D> <status> "cool" <status_graph> .
<G> <status> "cool" <status_graph> .
<predicates> <are> <follows> .
<predicates> <are> <status> .
<greg> <status> "smart_person" <smart_graph> .
"#;

fn test_store() -> MemoryStore {
    let store = MemoryStore::new();
    let deltas: Vec<Delta> = NQuadsParser::new()
        .for_slice(GRAPH)
        .map(|q| Delta::add(q.unwrap()))
        .collect();
    store.apply_deltas(&deltas, IgnoreOpts::default()).unwrap();
    store
}

fn iri(name: &str) -> Value {
    Iri::new_unchecked(name).into()
}

fn lookup(name: &str) -> Shape<MemoryStore> {
    Shape::lookup([iri(name)])
}

/// Runs the shape and returns the canonical forms of its results, sorted.
fn run(store: &MemoryStore, shape: Shape<MemoryStore>, optimized: bool) -> Vec<String> {
    let shape = if optimized {
        shape.optimize(store)
    } else {
        shape
    };
    let cursor = if optimized {
        shape.build_optimized(store)
    } else {
        shape.build_iterator(store)
    };
    let mut out: Vec<String> = iterate::collect_values(store, cursor, &EvalContext::background())
        .unwrap()
        .into_iter()
        .map(|v| v.to_string())
        .collect();
    out.sort();
    out
}

/// Runs the shape and returns every (result, bindings) pair, fully resolved
/// and sorted, for plan-equivalence comparisons.
fn run_with_tags(
    store: &MemoryStore,
    shape: &Shape<MemoryStore>,
    optimized: bool,
) -> Vec<(String, Vec<(String, String)>)> {
    let cursor = if optimized {
        shape.clone().optimize(store).build_optimized(store)
    } else {
        shape.build_iterator(store)
    };
    let mut out = Vec::new();
    iterate::each_with_tags(cursor, &EvalContext::background(), |r, tags| {
        let result = store.name_of(r).map(|v| v.to_string()).unwrap_or_default();
        let mut bound: Vec<(String, String)> = tags
            .iter()
            .map(|(tag, r)| {
                (
                    tag.clone(),
                    store.name_of(r).map(|v| v.to_string()).unwrap_or_default(),
                )
            })
            .collect();
        bound.sort();
        out.push((result, bound));
    })
    .unwrap();
    out.sort();
    out
}

#[test]
fn out_follows() {
    let store = test_store();
    let shape = lookup("A").out(lookup("follows"));
    assert_eq!(run(&store, shape, true), ["<B>"]);
}

#[test]
fn in_follows() {
    let store = test_store();
    let shape = lookup("B").r#in(lookup("follows"));
    assert_eq!(run(&store, shape, true), ["<A>", "<C>", "<D>"]);
}

#[test]
fn intersection_of_two_traversals() {
    let store = test_store();
    let shape = Shape::Intersect(vec![
        lookup("D").out(lookup("follows")),
        lookup("C").out(lookup("follows")),
    ]);
    assert_eq!(run(&store, shape, true), ["<B>"]);
}

#[test]
fn out_via_computed_predicates() {
    let store = test_store();
    let via = lookup("predicates").out(lookup("are"));
    let shape = Shape::Unique(Box::new(lookup("B").out(via)));
    assert_eq!(run(&store, shape, true), ["\"cool\"", "<F>"]);
}

#[test]
fn witness_paths_surface_through_contains() {
    let store = test_store();
    let ctx = EvalContext::background();
    let follows = store.value_of(&iri("follows")).unwrap();
    let b = store.value_of(&iri("B")).unwrap();

    // Everyone that follows something, subjects tagged "x"; probed with B.
    let links = And::boxed(vec![
        LinksTo::boxed(
            store.clone(),
            Save::boxed(store.nodes_all_iterator(), ["x"]),
            Direction::Subject,
        ),
        LinksTo::boxed(
            store.clone(),
            Fixed::boxed(vec![follows]),
            Direction::Predicate,
        ),
    ]);
    let mut hasa = HasA::new(store.clone(), links, Direction::Object);

    assert!(hasa.contains(&ctx, &b));
    let mut followers = Vec::new();
    loop {
        let mut tags = TagMap::<MemoryStore>::new();
        hasa.tag_results(&mut tags);
        followers.push(store.name_of(&tags["x"]).unwrap().to_string());
        if !hasa.next_path(&ctx) {
            break;
        }
    }
    followers.sort();
    assert_eq!(followers, ["<A>", "<C>", "<D>"]);
}

#[test]
fn out_restricted_to_a_label() {
    let store = test_store();
    let shape = lookup("greg").out_with_label(lookup("status"), lookup("smart_graph"));
    assert_eq!(run(&store, shape, true), ["\"smart_person\""]);

    // The same traversal under a different label finds nothing.
    let shape = lookup("greg").out_with_label(lookup("status"), lookup("status_graph"));
    assert_eq!(run(&store, shape, true), Vec::<String>::new());
}

#[test]
fn count_of_a_traversal() {
    let store = test_store();
    let shape = Shape::Count {
        values: Box::new(lookup("B").out(lookup("follows"))),
    };
    assert_eq!(
        run(&store, shape, true),
        ["\"1\"^^<http://schema.org/Integer>"]
    );
}

#[test]
fn sorted_traversal() {
    let store = test_store();
    let shape = Shape::Sort(Box::new(lookup("B").r#in(lookup("follows"))));
    let cursor = shape.optimize(&store).build_optimized(&store);
    // Order matters here, so no sorting of the output.
    let values = iterate::collect_values(&store, cursor, &EvalContext::background()).unwrap();
    let values: Vec<String> = values.into_iter().map(|v| v.to_string()).collect();
    assert_eq!(values, ["<A>", "<C>", "<D>"]);
}

#[test]
fn optimized_and_unoptimized_plans_agree() {
    let store = test_store();
    let shapes = [
        lookup("A").out(lookup("follows")),
        lookup("B").r#in(lookup("follows")),
        Shape::Intersect(vec![
            lookup("D").out(lookup("follows")),
            lookup("C").out(lookup("follows")),
        ]),
        Shape::Unique(Box::new(lookup("B").out(lookup("predicates").out(lookup("are"))))),
        lookup("greg").out_with_label(lookup("status"), lookup("smart_graph")),
        Shape::Union(vec![
            lookup("A").out(lookup("follows")),
            lookup("E").out(lookup("follows")),
        ]),
        Shape::Except {
            exclude: Box::new(lookup("B").r#in(lookup("follows"))),
            from: Box::new(Shape::AllNodes),
        },
        Shape::Page {
            from: Box::new(Shape::Sort(Box::new(lookup("B").r#in(lookup("follows"))))),
            skip: 1,
            limit: 1,
        },
        Shape::Intersect(vec![
            lookup("B").r#in(lookup("follows")).tagged("follower"),
            lookup("C").out(lookup("follows")),
        ]),
        Shape::Count {
            values: Box::new(lookup("B").out(lookup("follows"))),
        },
    ];
    for shape in shapes {
        assert_eq!(
            run_with_tags(&store, &shape, false),
            run_with_tags(&store, &shape, true),
            "plans disagree for {shape:?}"
        );
    }
}

#[test]
fn optimize_to_fixed_point_on_real_queries() {
    let store = test_store();
    let shapes = [
        lookup("A").out(lookup("follows")),
        Shape::Intersect(vec![
            lookup("D").out(lookup("follows")),
            lookup("C").out(lookup("follows")),
        ]),
        Shape::Union(vec![lookup("A"), Shape::Null, Shape::AllNodes]),
    ];
    for shape in shapes {
        let once = shape.clone().optimize(&store);
        assert_eq!(once.clone().optimize(&store), once);
    }
}

#[test]
fn values_round_trip_through_the_store() {
    let store = MemoryStore::new();
    let values = [
        iri("http://example.com/x"),
        Value::from("plain"),
        Value::new_lang_string("olá", "pt").unwrap(),
        Value::Int(-40),
        Value::Float(2.5),
        Value::Bool(true),
        Value::TypedString {
            value: "opaque".into(),
            datatype: Iri::new_unchecked("http://example.com/custom"),
        },
    ];
    let mut deltas = Vec::new();
    for v in &values {
        deltas.push(Delta::add(Quad::new(
            v.clone(),
            iri("is"),
            Value::from("present"),
            None,
        )));
    }
    store.apply_deltas(&deltas, IgnoreOpts::default()).unwrap();

    for v in &values {
        let r = store
            .value_of(v)
            .unwrap_or_else(|| panic!("value not found: {v}"));
        assert_eq!(store.name_of(&r).as_ref(), Some(v));
    }
}

#[test]
fn quad_directions_match_the_stored_quad() {
    let store = test_store();
    let ctx = EvalContext::background();
    let mut all = store.quads_all_iterator();
    let mut seen = 0;
    while all.next(&ctx) {
        let r = all.result().unwrap();
        let quad = store.quad(&r).unwrap();
        for d in Direction::ALL {
            let node = store.quad_direction(&r, d);
            let value = node.as_ref().and_then(|n| store.name_of(n));
            assert_eq!(value.as_ref(), quad.get(d));
        }
        seen += 1;
    }
    assert_eq!(seen, 14);
}

#[test]
fn unique_never_repeats() {
    let store = test_store();
    let ctx = EvalContext::background();
    // Subjects of every quad, with repeats (C and D each follow twice).
    let subjects = HasA::boxed(
        store.clone(),
        store.quads_all_iterator(),
        Direction::Subject,
    );
    let mut unique = Unique::new(subjects);
    let mut seen = Vec::new();
    while unique.next(&ctx) {
        seen.push(unique.result().unwrap());
    }
    let distinct: std::collections::HashSet<_> = seen.iter().cloned().collect();
    assert_eq!(distinct.len(), seen.len());
    // A, B, C, D, E, F, predicates and greg appear as subjects.
    assert_eq!(seen.len(), 8);

    // Membership still holds for anything the sub reaches.
    let b = store.value_of(&iri("B")).unwrap();
    assert!(unique.contains(&ctx, &b));
}

#[test]
fn hasa_of_linksto_collapses_and_agrees() {
    let store = test_store();
    let ctx = EvalContext::background();
    let follows = store.value_of(&iri("follows")).unwrap();

    let build = || {
        HasA::boxed(
            store.clone(),
            LinksTo::boxed(
                store.clone(),
                Fixed::boxed(vec![follows.clone()]),
                Direction::Predicate,
            ),
            Direction::Predicate,
        )
    };

    let (optimized, changed) = build().optimize();
    assert!(changed);
    assert_eq!(optimized.kind(), CursorKind::Fixed);

    // The collapse preserves the reachable set (the projection surfaces a
    // node once per witness quad, the collapsed form once).
    let drain = |mut it: Box<dyn Cursor<MemoryStore>>| {
        let mut out = std::collections::HashSet::new();
        while it.next(&ctx) {
            out.insert(it.result().unwrap());
        }
        out
    };
    assert_eq!(drain(optimized), drain(build()));
}

#[test]
fn cancellation_reaches_nested_cursors() {
    let store = test_store();
    let (ctx, cancel) = EvalContext::cancelable();
    let shape = lookup("B").r#in(lookup("follows"));
    let mut cursor = shape.optimize(&store).build_optimized(&store);
    assert!(cursor.next(&ctx));
    cancel.cancel();
    assert!(!cursor.next(&ctx));
    assert!(matches!(cursor.err(), Some(quiver::StoreError::Cancelled)));
}

#[test]
fn delta_log_matches_the_documented_scenarios() {
    use quiver::Transaction;

    fn q(s: &str, o: &str) -> Quad {
        Quad::new(
            Iri::new_unchecked(s),
            Iri::new_unchecked("follows"),
            Iri::new_unchecked(o),
            None,
        )
    }

    let mut tx = Transaction::new();
    tx.add_quad(q("E", "F"));
    tx.add_quad(q("F", "G"));
    tx.remove_quad(q("A", "Z"));
    assert_eq!(tx.len(), 3);

    let mut tx = Transaction::new();
    tx.add_quad(q("E", "G"));
    tx.remove_quad(q("E", "G"));
    assert_eq!(tx.len(), 0);

    let mut tx = Transaction::new();
    tx.add_quad(q("E", "G"));
    tx.add_quad(q("E", "G"));
    assert_eq!(tx.len(), 1);

    let store = test_store();
    let missing = [Delta::delete(q("E", "G"))];
    assert!(store
        .apply_deltas(
            &missing,
            IgnoreOpts {
                ignore_missing: true,
                ..IgnoreOpts::default()
            }
        )
        .is_ok());
    assert!(matches!(
        store.apply_deltas(&missing, IgnoreOpts::default()),
        Err(quiver::DeltaError::QuadNotExist(_))
    ));
}
