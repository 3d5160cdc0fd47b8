use crate::error::StoreError;
use crate::iterator::{check_cancelled, Costs, Cursor, CursorKind, Null, TagMap, Tagger};
use crate::limits::EvalContext;
use crate::store::{QuadStore, Size};
use qvquad::Value;
use regex::Regex;
use std::any::Any;

/// Filter: keeps refs whose value matches a regular expression.
///
/// The expression runs over the lexical form of string values. IRIs and
/// blank nodes are skipped unless `allow_iris` is set, in which case the
/// expression runs over their identifier.
pub struct Regexp<S: QuadStore> {
    store: S,
    sub: Box<dyn Cursor<S>>,
    re: Regex,
    allow_iris: bool,
    result: Option<S::Ref>,
    err: Option<StoreError>,
    tagger: Tagger<S>,
}

impl<S: QuadStore> Regexp<S> {
    pub fn new(store: S, sub: Box<dyn Cursor<S>>, re: Regex) -> Self {
        Self {
            store,
            sub,
            re,
            allow_iris: false,
            result: None,
            err: None,
            tagger: Tagger::new(),
        }
    }

    pub fn boxed(store: S, sub: Box<dyn Cursor<S>>, re: Regex) -> Box<dyn Cursor<S>> {
        Box::new(Self::new(store, sub, re))
    }

    /// Also matches IRIs and blank nodes by their identifier.
    pub fn with_refs(mut self) -> Self {
        self.allow_iris = true;
        self
    }

    fn accepts(&self, v: &S::Ref) -> bool {
        let Some(name) = self.store.name_of(v) else {
            return false;
        };
        match &name {
            Value::String(s)
            | Value::LangString { value: s, .. }
            | Value::TypedString { value: s, .. } => self.re.is_match(s),
            Value::Iri(iri) => self.allow_iris && self.re.is_match(iri.as_str()),
            Value::BNode(node) => self.allow_iris && self.re.is_match(node.as_str()),
            _ => false,
        }
    }
}

impl<S: QuadStore> Cursor<S> for Regexp<S> {
    fn kind(&self) -> CursorKind {
        CursorKind::Regexp
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
        let mut out = Self::new(self.store.clone(), self.sub.clone_cursor(), self.re.clone());
        out.allow_iris = self.allow_iris;
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
