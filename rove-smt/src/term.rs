use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::sort::{Sort, SortError};

static FRESH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Mint a process-unique variable name with the given prefix.
///
/// Used for havoc booleans and for freshening policy argument names at load
/// time, so that separately written policies can be composed without capture.
pub fn fresh_name(prefix: &str) -> String {
    let n = FRESH_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}~{n}")
}

/// A symbolic expression over named free constants.
///
/// Terms are immutable values; the constructors below perform light
/// constant folding but no sort checking. Sort checking happens on demand
/// through [`Term::sort`], which the evaluator calls at the points where
/// the route-map dialect requires a runtime type check.
#[derive(Clone, Debug, PartialEq)]
pub enum Term {
    /// A named free symbolic constant.
    Var(String, Sort),

    Bool(bool),
    Int(i64),
    Str(String),
    Unit,

    Not(Box<Term>),
    And(Box<Term>, Box<Term>),
    Or(Box<Term>, Box<Term>),
    Implies(Box<Term>, Box<Term>),
    Ite(Box<Term>, Box<Term>, Box<Term>),

    Add(Box<Term>, Box<Term>),
    Lt(Box<Term>, Box<Term>),
    Le(Box<Term>, Box<Term>),
    /// Structural equality at any sort.
    Eq(Box<Term>, Box<Term>),

    Pair(Box<Term>, Box<Term>),
    First(Box<Term>),
    Second(Box<Term>),

    SomeOf(Box<Term>),
    /// The empty option at the given payload sort.
    NoneOf(Sort),
    IsSome(Box<Term>),
    /// The payload of an option; for `None` it is the payload sort's
    /// default value (false / 0 / "" / empty).
    Unwrap(Box<Term>),

    Record(Vec<(String, Term)>),
    GetField(Box<Term>, String),
    WithField(Box<Term>, String, Box<Term>),

    EmptySet,
    SetAdd(Box<Term>, Box<Term>),
    SetContains(Box<Term>, Box<Term>),
    SetUnion(Box<Term>, Box<Term>),
}

impl Term {
    pub fn var(name: impl Into<String>, sort: Sort) -> Term {
        Term::Var(name.into(), sort)
    }

    /// A fresh unconstrained symbolic boolean (the havoc value).
    pub fn havoc() -> Term {
        Term::Var(fresh_name("havoc"), Sort::Bool)
    }

    pub fn not(t: Term) -> Term {
        match t {
            Term::Bool(b) => Term::Bool(!b),
            Term::Not(inner) => *inner,
            t => Term::Not(Box::new(t)),
        }
    }

    pub fn and(a: Term, b: Term) -> Term {
        match (a, b) {
            (Term::Bool(true), t) | (t, Term::Bool(true)) => t,
            (Term::Bool(false), _) | (_, Term::Bool(false)) => Term::Bool(false),
            (a, b) => Term::And(Box::new(a), Box::new(b)),
        }
    }

    pub fn or(a: Term, b: Term) -> Term {
        match (a, b) {
            (Term::Bool(false), t) | (t, Term::Bool(false)) => t,
            (Term::Bool(true), _) | (_, Term::Bool(true)) => Term::Bool(true),
            (a, b) => Term::Or(Box::new(a), Box::new(b)),
        }
    }

    pub fn implies(a: Term, b: Term) -> Term {
        match (a, b) {
            (Term::Bool(true), t) => t,
            (Term::Bool(false), _) => Term::Bool(true),
            (a, b) => Term::Implies(Box::new(a), Box::new(b)),
        }
    }

    pub fn ite(cond: Term, then_t: Term, else_t: Term) -> Term {
        match cond {
            Term::Bool(true) => then_t,
            Term::Bool(false) => else_t,
            cond => {
                if then_t == else_t {
                    then_t
                } else {
                    Term::Ite(Box::new(cond), Box::new(then_t), Box::new(else_t))
                }
            }
        }
    }

    /// Conjoin a sequence of boolean terms (empty conjunction is `true`).
    pub fn conj(terms: impl IntoIterator<Item = Term>) -> Term {
        terms.into_iter().fold(Term::Bool(true), Term::and)
    }

    pub fn add(a: Term, b: Term) -> Term {
        Term::Add(Box::new(a), Box::new(b))
    }

    pub fn lt(a: Term, b: Term) -> Term {
        Term::Lt(Box::new(a), Box::new(b))
    }

    pub fn le(a: Term, b: Term) -> Term {
        Term::Le(Box::new(a), Box::new(b))
    }

    pub fn eq(a: Term, b: Term) -> Term {
        Term::Eq(Box::new(a), Box::new(b))
    }

    pub fn pair(a: Term, b: Term) -> Term {
        Term::Pair(Box::new(a), Box::new(b))
    }

    pub fn first(t: Term) -> Term {
        Term::First(Box::new(t))
    }

    pub fn second(t: Term) -> Term {
        Term::Second(Box::new(t))
    }

    pub fn some_of(t: Term) -> Term {
        Term::SomeOf(Box::new(t))
    }

    pub fn is_some(t: Term) -> Term {
        Term::IsSome(Box::new(t))
    }

    pub fn unwrap_payload(t: Term) -> Term {
        Term::Unwrap(Box::new(t))
    }

    pub fn record<I, S>(fields: I) -> Term
    where
        I: IntoIterator<Item = (S, Term)>,
        S: Into<String>,
    {
        Term::Record(fields.into_iter().map(|(n, t)| (n.into(), t)).collect())
    }

    pub fn get_field(t: Term, field: impl Into<String>) -> Term {
        Term::GetField(Box::new(t), field.into())
    }

    pub fn with_field(t: Term, field: impl Into<String>, value: Term) -> Term {
        Term::WithField(Box::new(t), field.into(), Box::new(value))
    }

    pub fn set_add(set: Term, element: Term) -> Term {
        Term::SetAdd(Box::new(set), Box::new(element))
    }

    pub fn set_contains(set: Term, element: Term) -> Term {
        Term::SetContains(Box::new(set), Box::new(element))
    }

    pub fn set_union(a: Term, b: Term) -> Term {
        Term::SetUnion(Box::new(a), Box::new(b))
    }

    /// The default (all-zero) term of a sort. Used as the payload of `None`
    /// options and as the don't-care value when unwrapping them.
    pub fn default_of(sort: &Sort) -> Term {
        match sort {
            Sort::Bool => Term::Bool(false),
            Sort::Int => Term::Int(0),
            Sort::Str => Term::Str(String::new()),
            Sort::Unit => Term::Unit,
            Sort::Option(inner) => Term::NoneOf((**inner).clone()),
            Sort::Pair(a, b) => Term::pair(Term::default_of(a), Term::default_of(b)),
            Sort::Set => Term::EmptySet,
            Sort::Record(fields) => Term::Record(
                fields
                    .iter()
                    .map(|(n, s)| (n.clone(), Term::default_of(s)))
                    .collect(),
            ),
        }
    }

    /// Infer the sort of this term bottom-up.
    ///
    /// This doubles as the runtime type check of the route-map dialect:
    /// an ill-sorted term (e.g. `Plus` over booleans) fails here.
    pub fn sort(&self) -> Result<Sort, SortError> {
        match self {
            Term::Var(_, sort) => Ok(sort.clone()),
            Term::Bool(_) => Ok(Sort::Bool),
            Term::Int(_) => Ok(Sort::Int),
            Term::Str(_) => Ok(Sort::Str),
            Term::Unit => Ok(Sort::Unit),

            Term::Not(t) => {
                expect(t, Sort::Bool, "not")?;
                Ok(Sort::Bool)
            }
            Term::And(a, b) | Term::Or(a, b) | Term::Implies(a, b) => {
                expect(a, Sort::Bool, "boolean operator")?;
                expect(b, Sort::Bool, "boolean operator")?;
                Ok(Sort::Bool)
            }
            Term::Ite(cond, then_t, else_t) => {
                expect(cond, Sort::Bool, "ite condition")?;
                let ts = then_t.sort()?;
                let es = else_t.sort()?;
                if ts != es {
                    return Err(SortError::BranchMismatch {
                        then_sort: ts,
                        else_sort: es,
                    });
                }
                Ok(ts)
            }

            Term::Add(a, b) => {
                expect(a, Sort::Int, "plus")?;
                expect(b, Sort::Int, "plus")?;
                Ok(Sort::Int)
            }
            Term::Lt(a, b) | Term::Le(a, b) => {
                expect(a, Sort::Int, "comparison")?;
                expect(b, Sort::Int, "comparison")?;
                Ok(Sort::Bool)
            }
            Term::Eq(a, b) => {
                let left = a.sort()?;
                let right = b.sort()?;
                if left != right {
                    return Err(SortError::UnequalOperands { left, right });
                }
                Ok(Sort::Bool)
            }

            Term::Pair(a, b) => Ok(Sort::pair(a.sort()?, b.sort()?)),
            Term::First(t) => match t.sort()? {
                Sort::Pair(a, _) => Ok(*a),
                other => Err(mismatch("pair", other, "first")),
            },
            Term::Second(t) => match t.sort()? {
                Sort::Pair(_, b) => Ok(*b),
                other => Err(mismatch("pair", other, "second")),
            },

            Term::SomeOf(t) => Ok(Sort::option(t.sort()?)),
            Term::NoneOf(sort) => Ok(Sort::option(sort.clone())),
            Term::IsSome(t) => match t.sort()? {
                Sort::Option(_) => Ok(Sort::Bool),
                other => Err(mismatch("option", other, "is-some")),
            },
            Term::Unwrap(t) => match t.sort()? {
                Sort::Option(inner) => Ok(*inner),
                other => Err(mismatch("option", other, "unwrap")),
            },

            Term::Record(fields) => {
                let mut sorts = Vec::with_capacity(fields.len());
                for (name, t) in fields {
                    sorts.push((name.clone(), t.sort()?));
                }
                Ok(Sort::Record(sorts))
            }
            Term::GetField(t, field) => {
                let record = t.sort()?;
                record
                    .field(field)
                    .cloned()
                    .ok_or_else(|| SortError::UnknownField {
                        record,
                        field: field.clone(),
                    })
            }
            Term::WithField(t, field, value) => {
                let record = t.sort()?;
                let expected =
                    record
                        .field(field)
                        .cloned()
                        .ok_or_else(|| SortError::UnknownField {
                            record: record.clone(),
                            field: field.clone(),
                        })?;
                let found = value.sort()?;
                if found != expected {
                    return Err(SortError::Mismatch {
                        expected: expected.to_string(),
                        found,
                        context: "with-field value",
                    });
                }
                Ok(record)
            }

            Term::EmptySet => Ok(Sort::Set),
            Term::SetAdd(set, element) => {
                expect(set, Sort::Set, "set-add")?;
                expect(element, Sort::Str, "set-add element")?;
                Ok(Sort::Set)
            }
            Term::SetContains(set, element) => {
                expect(set, Sort::Set, "set-contains")?;
                expect(element, Sort::Str, "set-contains element")?;
                Ok(Sort::Bool)
            }
            Term::SetUnion(a, b) => {
                expect(a, Sort::Set, "set-union")?;
                expect(b, Sort::Set, "set-union")?;
                Ok(Sort::Set)
            }
        }
    }

    /// Collect the free symbolic constants of this term.
    pub fn free_vars(&self) -> BTreeMap<String, Sort> {
        let mut out = BTreeMap::new();
        self.collect_free_vars(&mut out);
        out
    }

    fn collect_free_vars(&self, out: &mut BTreeMap<String, Sort>) {
        match self {
            Term::Var(name, sort) => {
                out.entry(name.clone()).or_insert_with(|| sort.clone());
            }
            Term::Bool(_) | Term::Int(_) | Term::Str(_) | Term::Unit => {}
            Term::NoneOf(_) | Term::EmptySet => {}
            Term::Not(t)
            | Term::First(t)
            | Term::Second(t)
            | Term::SomeOf(t)
            | Term::IsSome(t)
            | Term::Unwrap(t)
            | Term::GetField(t, _) => t.collect_free_vars(out),
            Term::And(a, b)
            | Term::Or(a, b)
            | Term::Implies(a, b)
            | Term::Add(a, b)
            | Term::Lt(a, b)
            | Term::Le(a, b)
            | Term::Eq(a, b)
            | Term::Pair(a, b)
            | Term::SetAdd(a, b)
            | Term::SetContains(a, b)
            | Term::SetUnion(a, b) => {
                a.collect_free_vars(out);
                b.collect_free_vars(out);
            }
            Term::Ite(c, t, e) => {
                c.collect_free_vars(out);
                t.collect_free_vars(out);
                e.collect_free_vars(out);
            }
            Term::WithField(t, _, v) => {
                t.collect_free_vars(out);
                v.collect_free_vars(out);
            }
            Term::Record(fields) => {
                for (_, t) in fields {
                    t.collect_free_vars(out);
                }
            }
        }
    }

    /// Collect every string literal occurring in this term.
    ///
    /// The Z3 backend uses this as the universe when decoding concrete set
    /// values out of a model: a community tag can only end up in a set if
    /// some policy or annotation mentions it.
    pub fn string_literals(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_strings(&mut out);
        out.sort();
        out.dedup();
        out
    }

    fn collect_strings(&self, out: &mut Vec<String>) {
        match self {
            Term::Str(s) => out.push(s.clone()),
            Term::Var(..) | Term::Bool(_) | Term::Int(_) | Term::Unit => {}
            Term::NoneOf(_) | Term::EmptySet => {}
            Term::Not(t)
            | Term::First(t)
            | Term::Second(t)
            | Term::SomeOf(t)
            | Term::IsSome(t)
            | Term::Unwrap(t)
            | Term::GetField(t, _) => t.collect_strings(out),
            Term::And(a, b)
            | Term::Or(a, b)
            | Term::Implies(a, b)
            | Term::Add(a, b)
            | Term::Lt(a, b)
            | Term::Le(a, b)
            | Term::Eq(a, b)
            | Term::Pair(a, b)
            | Term::SetAdd(a, b)
            | Term::SetContains(a, b)
            | Term::SetUnion(a, b) => {
                a.collect_strings(out);
                b.collect_strings(out);
            }
            Term::Ite(c, t, e) => {
                c.collect_strings(out);
                t.collect_strings(out);
                e.collect_strings(out);
            }
            Term::WithField(t, _, v) => {
                t.collect_strings(out);
                v.collect_strings(out);
            }
            Term::Record(fields) => {
                for (_, t) in fields {
                    t.collect_strings(out);
                }
            }
        }
    }
}

fn expect(t: &Term, expected: Sort, context: &'static str) -> Result<(), SortError> {
    let found = t.sort()?;
    if found != expected {
        return Err(SortError::Mismatch {
            expected: expected.to_string(),
            found,
            context,
        });
    }
    Ok(())
}

fn mismatch(expected: &str, found: Sort, context: &'static str) -> SortError {
    SortError::Mismatch {
        expected: expected.to_string(),
        found,
        context,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_of_arithmetic() {
        let t = Term::add(Term::Int(1), Term::var("x", Sort::Int));
        assert_eq!(t.sort().unwrap(), Sort::Int);
        assert_eq!(
            Term::lt(Term::Int(0), Term::Int(1)).sort().unwrap(),
            Sort::Bool
        );
    }

    #[test]
    fn ill_sorted_plus_is_rejected() {
        let t = Term::add(Term::Bool(true), Term::Int(1));
        assert!(t.sort().is_err());
    }

    #[test]
    fn ite_branches_must_agree() {
        let t = Term::Ite(
            Box::new(Term::Bool(true)),
            Box::new(Term::Int(1)),
            Box::new(Term::Bool(false)),
        );
        assert!(matches!(t.sort(), Err(SortError::BranchMismatch { .. })));
    }

    #[test]
    fn record_field_sorts() {
        let r = Term::record([("lp", Term::Int(100)), ("tags", Term::EmptySet)]);
        assert_eq!(
            Term::get_field(r.clone(), "lp").sort().unwrap(),
            Sort::Int
        );
        assert!(Term::get_field(r, "nope").sort().is_err());
    }

    #[test]
    fn constant_folding_keeps_bool_literals_small() {
        assert_eq!(Term::and(Term::Bool(true), Term::Bool(false)), Term::Bool(false));
        assert_eq!(
            Term::or(Term::Bool(false), Term::var("g", Sort::Bool)),
            Term::var("g", Sort::Bool)
        );
        assert_eq!(
            Term::ite(Term::var("g", Sort::Bool), Term::Int(3), Term::Int(3)),
            Term::Int(3)
        );
    }

    #[test]
    fn free_vars_are_collected_once() {
        let x = Term::var("x", Sort::Int);
        let t = Term::add(x.clone(), Term::add(x, Term::Int(1)));
        let vars = t.free_vars();
        assert_eq!(vars.len(), 1);
        assert_eq!(vars.get("x"), Some(&Sort::Int));
    }

    #[test]
    fn fresh_names_are_distinct() {
        assert_ne!(fresh_name("havoc"), fresh_name("havoc"));
    }
}
