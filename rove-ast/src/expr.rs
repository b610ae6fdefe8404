use rove_smt::{Sort, Term};

use crate::env::Env;
use crate::error::AstError;

/// A literal constant.
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Bool(bool),
    Int(i64),
    Str(String),
    Unit,
}

impl Constant {
    fn term(&self) -> Term {
        match self {
            Constant::Bool(b) => Term::Bool(*b),
            Constant::Int(n) => Term::Int(*n),
            Constant::Str(s) => Term::Str(s.clone()),
            Constant::Unit => Term::Unit,
        }
    }
}

/// A policy expression. Evaluation is pure: it reads the environment and
/// produces a symbolic [`Term`], never mutating anything.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Const(Constant),
    Var(String),
    /// A fresh unconstrained symbolic boolean per evaluation; models a
    /// policy condition the network file chose not to model precisely.
    Havoc,

    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),

    Plus(Box<Expr>, Box<Expr>),
    LessThan(Box<Expr>, Box<Expr>),
    LessThanEqual(Box<Expr>, Box<Expr>),
    Equal(Box<Expr>, Box<Expr>),

    Pair(Box<Expr>, Box<Expr>),
    First(Box<Expr>),
    Second(Box<Expr>),

    SomeOf(Box<Expr>),
    /// The empty option at the given payload sort (resolved at load time).
    NoneOf(Sort),
    /// Option match: the binder is in scope for the some-arm only.
    Case {
        scrutinee: Box<Expr>,
        none: Box<Expr>,
        binder: String,
        some: Box<Expr>,
    },

    GetField(Box<Expr>, String),
    WithField(Box<Expr>, String, Box<Expr>),

    EmptySet,
    SetAdd(Box<Expr>, Box<Expr>),
    SetContains(Box<Expr>, Box<Expr>),
    SetUnion(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Expr {
        Expr::Var(name.into())
    }

    pub fn int(n: i64) -> Expr {
        Expr::Const(Constant::Int(n))
    }

    pub fn bool(b: bool) -> Expr {
        Expr::Const(Constant::Bool(b))
    }

    pub fn str(s: impl Into<String>) -> Expr {
        Expr::Const(Constant::Str(s.into()))
    }

    /// Evaluate to a symbolic term under the given environment.
    ///
    /// The resulting term is sort-checked, so an ill-typed expression
    /// (e.g. `Plus` over booleans) fails here with a sort error.
    pub fn evaluate(&self, env: &Env) -> Result<Term, AstError> {
        let term = self.eval_unchecked(env)?;
        term.sort()?;
        Ok(term)
    }

    fn eval_unchecked(&self, env: &Env) -> Result<Term, AstError> {
        match self {
            Expr::Const(c) => Ok(c.term()),
            Expr::Var(name) => env
                .get(name)
                .cloned()
                .ok_or_else(|| AstError::UnboundVariable { name: name.clone() }),
            Expr::Havoc => Ok(Term::havoc()),

            Expr::Not(e) => Ok(Term::not(e.eval_unchecked(env)?)),
            Expr::And(a, b) => Ok(Term::and(a.eval_unchecked(env)?, b.eval_unchecked(env)?)),
            Expr::Or(a, b) => Ok(Term::or(a.eval_unchecked(env)?, b.eval_unchecked(env)?)),

            Expr::Plus(a, b) => Ok(Term::add(a.eval_unchecked(env)?, b.eval_unchecked(env)?)),
            Expr::LessThan(a, b) => Ok(Term::lt(a.eval_unchecked(env)?, b.eval_unchecked(env)?)),
            Expr::LessThanEqual(a, b) => {
                Ok(Term::le(a.eval_unchecked(env)?, b.eval_unchecked(env)?))
            }
            Expr::Equal(a, b) => Ok(Term::eq(a.eval_unchecked(env)?, b.eval_unchecked(env)?)),

            Expr::Pair(a, b) => Ok(Term::pair(a.eval_unchecked(env)?, b.eval_unchecked(env)?)),
            Expr::First(e) => Ok(Term::first(e.eval_unchecked(env)?)),
            Expr::Second(e) => Ok(Term::second(e.eval_unchecked(env)?)),

            Expr::SomeOf(e) => Ok(Term::some_of(e.eval_unchecked(env)?)),
            Expr::NoneOf(sort) => Ok(Term::NoneOf(sort.clone())),
            Expr::Case {
                scrutinee,
                none,
                binder,
                some,
            } => {
                let scrutinee = scrutinee.eval_unchecked(env)?;
                let none_arm = none.eval_unchecked(env)?;
                let mut inner = env.clone();
                inner.bind(binder.clone(), Term::unwrap_payload(scrutinee.clone()));
                let some_arm = some.eval_unchecked(&inner)?;
                Ok(Term::ite(Term::is_some(scrutinee), some_arm, none_arm))
            }

            Expr::GetField(e, field) => Ok(Term::get_field(e.eval_unchecked(env)?, field)),
            Expr::WithField(e, field, value) => Ok(Term::with_field(
                e.eval_unchecked(env)?,
                field,
                value.eval_unchecked(env)?,
            )),

            Expr::EmptySet => Ok(Term::EmptySet),
            Expr::SetAdd(set, element) => Ok(Term::set_add(
                set.eval_unchecked(env)?,
                element.eval_unchecked(env)?,
            )),
            Expr::SetContains(set, element) => Ok(Term::set_contains(
                set.eval_unchecked(env)?,
                element.eval_unchecked(env)?,
            )),
            Expr::SetUnion(a, b) => Ok(Term::set_union(
                a.eval_unchecked(env)?,
                b.eval_unchecked(env)?,
            )),
        }
    }

    /// Rename every free occurrence of variable `old` to `new`.
    ///
    /// Purely syntactic: only `Var` nodes matching `old` are rewritten.
    /// A `Case` binder equal to `old` shadows it, so its some-arm is left
    /// alone.
    pub fn rename(&mut self, old: &str, new: &str) {
        match self {
            Expr::Var(name) => {
                if name == old {
                    *name = new.to_string();
                }
            }
            Expr::Const(_) | Expr::Havoc | Expr::NoneOf(_) | Expr::EmptySet => {}
            Expr::Not(e) | Expr::First(e) | Expr::Second(e) | Expr::SomeOf(e) => {
                e.rename(old, new);
            }
            Expr::GetField(e, _) => e.rename(old, new),
            Expr::And(a, b)
            | Expr::Or(a, b)
            | Expr::Plus(a, b)
            | Expr::LessThan(a, b)
            | Expr::LessThanEqual(a, b)
            | Expr::Equal(a, b)
            | Expr::Pair(a, b)
            | Expr::SetAdd(a, b)
            | Expr::SetContains(a, b)
            | Expr::SetUnion(a, b) => {
                a.rename(old, new);
                b.rename(old, new);
            }
            Expr::WithField(e, _, value) => {
                e.rename(old, new);
                value.rename(old, new);
            }
            Expr::Case {
                scrutinee,
                none,
                binder,
                some,
            } => {
                scrutinee.rename(old, new);
                none.rename(old, new);
                if binder != old {
                    some.rename(old, new);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rove_smt::{Model, Value};

    #[test]
    fn var_reads_the_environment() {
        let env = Env::new().with("x", Term::Int(5));
        assert_eq!(Expr::var("x").evaluate(&env).unwrap(), Term::Int(5));
    }

    #[test]
    fn unbound_var_fails() {
        let err = Expr::var("nope").evaluate(&Env::new()).unwrap_err();
        assert!(matches!(err, AstError::UnboundVariable { .. }));
    }

    #[test]
    fn havoc_is_fresh_per_evaluation() {
        let env = Env::new();
        let a = Expr::Havoc.evaluate(&env).unwrap();
        let b = Expr::Havoc.evaluate(&env).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn ill_typed_plus_is_a_sort_error() {
        let e = Expr::Plus(Box::new(Expr::bool(true)), Box::new(Expr::int(1)));
        assert!(matches!(e.evaluate(&Env::new()), Err(AstError::Sort(_))));
    }

    #[test]
    fn case_selects_the_some_arm() {
        let e = Expr::Case {
            scrutinee: Box::new(Expr::SomeOf(Box::new(Expr::int(4)))),
            none: Box::new(Expr::int(0)),
            binder: "v".into(),
            some: Box::new(Expr::Plus(Box::new(Expr::var("v")), Box::new(Expr::int(1)))),
        };
        let t = e.evaluate(&Env::new()).unwrap();
        assert_eq!(t.eval(&Model::new()).unwrap(), Value::Int(5));
    }

    #[test]
    fn rename_leaves_unrelated_names_alone() {
        let mut e = Expr::Plus(Box::new(Expr::var("x")), Box::new(Expr::var("y")));
        e.rename("x", "z");
        assert_eq!(
            e,
            Expr::Plus(Box::new(Expr::var("z")), Box::new(Expr::var("y")))
        );
    }

    #[test]
    fn rename_respects_case_shadowing() {
        let mut e = Expr::Case {
            scrutinee: Box::new(Expr::var("x")),
            none: Box::new(Expr::var("x")),
            binder: "x".into(),
            some: Box::new(Expr::var("x")),
        };
        e.rename("x", "y");
        let Expr::Case {
            scrutinee,
            none,
            some,
            ..
        } = &e
        else {
            panic!("still a case");
        };
        assert_eq!(**scrutinee, Expr::var("y"));
        assert_eq!(**none, Expr::var("y"));
        // bound occurrence is untouched
        assert_eq!(**some, Expr::var("x"));
    }
}
