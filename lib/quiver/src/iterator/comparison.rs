use crate::error::StoreError;
use crate::iterator::{check_cancelled, Costs, Cursor, CursorKind, Null, TagMap, Tagger};
use crate::limits::EvalContext;
use crate::store::{QuadStore, Size};
use qvquad::Value;
use std::any::Any;
use std::cmp::Ordering;

/// An order operator for [`Comparison`].
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum CmpOp {
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CmpOp {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Lt => ordering == Ordering::Less,
            Self::Lte => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Gte => ordering != Ordering::Less,
        }
    }
}

/// Orders two values when they are comparable.
///
/// Numbers compare numerically across `Int` and `Float`, times
/// chronologically, and the string kinds lexically by their lexical form.
/// Everything else (IRIs, blank nodes, kind mismatches) is incomparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    fn lexical(v: &Value) -> Option<&str> {
        match v {
            Value::String(s)
            | Value::LangString { value: s, .. }
            | Value::TypedString { value: s, .. } => Some(s),
            _ => None,
        }
    }

    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        #[expect(clippy::cast_precision_loss)]
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        #[expect(clippy::cast_precision_loss)]
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Time(a), Value::Time(b)) => a.partial_cmp(b),
        (a, b) => Some(lexical(a)?.cmp(lexical(b)?)),
    }
}

/// Filter: keeps the refs whose value satisfies `op` against a constant.
pub struct Comparison<S: QuadStore> {
    store: S,
    sub: Box<dyn Cursor<S>>,
    op: CmpOp,
    value: Value,
    result: Option<S::Ref>,
    err: Option<StoreError>,
    tagger: Tagger<S>,
}

impl<S: QuadStore> Comparison<S> {
    pub fn new(store: S, sub: Box<dyn Cursor<S>>, op: CmpOp, value: Value) -> Self {
        Self {
            store,
            sub,
            op,
            value,
            result: None,
            err: None,
            tagger: Tagger::new(),
        }
    }

    pub fn boxed(
        store: S,
        sub: Box<dyn Cursor<S>>,
        op: CmpOp,
        value: Value,
    ) -> Box<dyn Cursor<S>> {
        Box::new(Self::new(store, sub, op, value))
    }

    fn accepts(&self, v: &S::Ref) -> bool {
        let Some(name) = self.store.name_of(v) else {
            return false;
        };
        compare_values(&name, &self.value)
            .map(|ordering| self.op.accepts(ordering))
            .unwrap_or(false)
    }
}

impl<S: QuadStore> Cursor<S> for Comparison<S> {
    fn kind(&self) -> CursorKind {
        CursorKind::Comparison
    }

    fn next(&mut self, ctx: &EvalContext) -> bool {
        if check_cancelled(ctx, &mut self.err) {
            return false;
        }
        loop {
            if !self.sub.next(ctx) {
                self.result = None;
                return false;
            }
            let Some(candidate) = self.sub.result() else {
                self.result = None;
                return false;
            };
            if self.accepts(&candidate) {
                self.result = Some(candidate);
                return true;
            }
            if check_cancelled(ctx, &mut self.err) {
                self.result = None;
                return false;
            }
        }
    }

    fn contains(&mut self, ctx: &EvalContext, v: &S::Ref) -> bool {
        if check_cancelled(ctx, &mut self.err) {
            return false;
        }
        if !self.accepts(v) {
            return false;
        }
        if self.sub.contains(ctx, v) {
            self.result = Some(v.clone());
            true
        } else {
            false
        }
    }

    fn next_path(&mut self, ctx: &EvalContext) -> bool {
        self.sub.next_path(ctx)
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
        self.sub.tag_results(dst);
    }

    fn stats(&self) -> Costs {
        let sub = self.sub.stats();
        Costs {
            contains_cost: sub.contains_cost + 1,
            next_cost: sub.next_cost + 1,
            size: Size::around(sub.size.value / 2 + 1),
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
        let mut out = Self::new(
            self.store.clone(),
            self.sub.clone_cursor(),
            self.op,
            self.value.clone(),
        );
        out.tagger.copy_from(&self.tagger);
        Box::new(out)
    }

    fn reset(&mut self) {
        self.sub.reset();
        self.result = None;
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

    #[test]
    fn numbers_compare_across_kinds() {
        assert_eq!(
            compare_values(&Value::Int(2), &Value::Float(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            compare_values(&Value::Float(3.0), &Value::Int(3)),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn strings_compare_lexically() {
        assert_eq!(
            compare_values(&Value::from("alice"), &Value::from("bob")),
            Some(Ordering::Less)
        );
        assert_eq!(
            compare_values(
                &Value::LangString {
                    value: "b".into(),
                    lang: "en".into()
                },
                &Value::from("a")
            ),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn iris_are_incomparable() {
        assert_eq!(
            compare_values(
                &Value::Iri(qvquad::Iri::new_unchecked("a")),
                &Value::from("b")
            ),
            None
        );
        assert_eq!(compare_values(&Value::Int(1), &Value::from("b")), None);
    }

    #[test]
    fn operators() {
        assert!(CmpOp::Lt.accepts(Ordering::Less));
        assert!(!CmpOp::Lt.accepts(Ordering::Equal));
        assert!(CmpOp::Lte.accepts(Ordering::Equal));
        assert!(CmpOp::Gt.accepts(Ordering::Greater));
        assert!(CmpOp::Gte.accepts(Ordering::Equal));
    }
}
