use rove_smt::Term;

use crate::env::Env;
use crate::error::AstError;
use crate::expr::Expr;
use crate::stmt::Stmt;

/// A named-argument unary function over routes, written as a statement body
/// that must return.
#[derive(Clone, Debug, PartialEq)]
pub struct AstFunction {
    pub arg: String,
    pub body: Stmt,
}

impl AstFunction {
    pub fn new(arg: impl Into<String>, body: Stmt) -> AstFunction {
        AstFunction {
            arg: arg.into(),
            body,
        }
    }

    /// The function returning its argument unchanged.
    pub fn identity() -> AstFunction {
        AstFunction::new("x", Stmt::ret(Expr::var("x")))
    }

    /// Apply to a route term with no extra bindings in scope.
    pub fn apply(&self, route: Term) -> Result<Term, AstError> {
        self.apply_in(&Env::new(), route)
    }

    /// Apply to a route term with `globals` (e.g. symbolic network
    /// parameters) pre-bound. Fails if the body left the return slot empty
    /// on the taken path.
    pub fn apply_in(&self, globals: &Env, route: Term) -> Result<Term, AstError> {
        let mut env = globals.clone();
        env.bind(self.arg.clone(), route);
        self.body.evaluate(&mut env)?;
        env.take_return().ok_or(AstError::NoReturn)
    }

    /// Alpha-rename: substitute the argument name and every reference to it.
    pub fn rename(&mut self, old: &str, new: &str) {
        if self.arg == old {
            self.arg = new.to_string();
        }
        self.body.rename(old, new);
    }

    /// Compose: `x ↦ that(self(x))`.
    ///
    /// The first body's returns are rewritten into assignments of the
    /// second function's argument, and the two bodies are sequenced.
    /// Requires `self` to return on every path; a partial return would
    /// leave `that`'s argument unbound on the missing path, so it is
    /// rejected outright.
    pub fn compose(self, that: AstFunction) -> Result<AstFunction, AstError> {
        if !self.body.returns_on_all_paths() {
            return Err(AstError::PartialReturn);
        }
        Ok(AstFunction {
            arg: self.arg,
            body: Stmt::seq(self.body.bind(&that.arg), that.body),
        })
    }

    /// Compose a chain of functions left to right, starting from identity.
    /// An empty chain is the identity function.
    pub fn compose_all(
        functions: impl IntoIterator<Item = AstFunction>,
    ) -> Result<AstFunction, AstError> {
        let mut composed = AstFunction::identity();
        for f in functions {
            composed = composed.compose(f)?;
        }
        Ok(composed)
    }
}

/// A unary boolean function over routes. The body is a plain expression,
/// so there is no return ambiguity and no bind/compose machinery.
#[derive(Clone, Debug, PartialEq)]
pub struct AstPredicate {
    pub arg: String,
    pub expr: Expr,
}

impl AstPredicate {
    pub fn new(arg: impl Into<String>, expr: Expr) -> AstPredicate {
        AstPredicate {
            arg: arg.into(),
            expr,
        }
    }

    pub fn apply(&self, route: Term) -> Result<Term, AstError> {
        self.apply_in(&Env::new(), route)
    }

    pub fn apply_in(&self, globals: &Env, route: Term) -> Result<Term, AstError> {
        let env = globals.clone().with(self.arg.clone(), route);
        self.expr.evaluate(&env)
    }

    pub fn rename(&mut self, old: &str, new: &str) {
        if self.arg == old {
            self.arg = new.to_string();
        }
        self.expr.rename(old, new);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rove_smt::{Model, Sort, Value};

    fn plus_const(arg: &str, n: i64) -> AstFunction {
        AstFunction::new(
            arg,
            Stmt::ret(Expr::Plus(Box::new(Expr::var(arg)), Box::new(Expr::int(n)))),
        )
    }

    #[test]
    fn identity_returns_its_input() {
        let r = Term::var("r", Sort::Int);
        let out = AstFunction::identity().apply(r.clone()).unwrap();
        assert_eq!(out, r);
    }

    #[test]
    fn composition_applies_left_then_right() {
        // f(x) = x + 1, g(x) = x + 3; (f; g)(x) = x + 4.
        let f = plus_const("x", 1);
        let g = plus_const("x", 3);
        let fg = f.compose(g).unwrap();
        let out = fg.apply(Term::Int(10)).unwrap();
        assert_eq!(out.eval(&Model::new()).unwrap(), Value::Int(14));
    }

    #[test]
    fn composition_matches_sequential_application() {
        let f = AstFunction::new(
            "x",
            Stmt::if_else(
                Expr::LessThan(Box::new(Expr::var("x")), Box::new(Expr::int(0))),
                Stmt::ret(Expr::int(0)),
                Stmt::ret(Expr::var("x")),
            ),
        );
        let g = plus_const("y", 2);
        let composed = f.clone().compose(g.clone()).unwrap();

        for input in [-5i64, 0, 7] {
            let direct = composed.apply(Term::Int(input)).unwrap();
            let chained = g.apply(f.apply(Term::Int(input)).unwrap()).unwrap();
            assert_eq!(
                direct.eval(&Model::new()).unwrap(),
                chained.eval(&Model::new()).unwrap()
            );
        }
    }

    #[test]
    fn composing_a_partial_return_is_rejected() {
        let partial = AstFunction::new(
            "x",
            Stmt::if_else(Expr::Havoc, Stmt::ret(Expr::var("x")), Stmt::Skip),
        );
        let err = partial.compose(AstFunction::identity()).unwrap_err();
        assert!(matches!(err, AstError::PartialReturn));
    }

    #[test]
    fn body_without_return_fails_at_application() {
        let f = AstFunction::new("x", Stmt::assign("y", Expr::var("x")));
        assert!(matches!(f.apply(Term::Int(1)), Err(AstError::NoReturn)));
    }

    #[test]
    fn renaming_an_unused_name_preserves_meaning() {
        let mut f = plus_const("x", 1);
        f.rename("x", "y");
        assert_eq!(f.arg, "y");
        let out = f.apply(Term::Int(41)).unwrap();
        assert_eq!(out.eval(&Model::new()).unwrap(), Value::Int(42));
    }

    #[test]
    fn renaming_avoids_capture_when_composing() {
        // Both functions use "x" internally for different purposes; rename
        // the first one's argument before composing.
        let mut f = AstFunction::new(
            "x",
            Stmt::seq(
                Stmt::if_else(
                    Expr::Havoc,
                    Stmt::assign("x", Expr::Plus(Box::new(Expr::var("x")), Box::new(Expr::int(1)))),
                    Stmt::assign("x", Expr::int(0)),
                ),
                Stmt::ret(Expr::var("x")),
            ),
        );
        let g = plus_const("x", 3);
        f.rename("x", "y");
        let fg = f.compose(g).unwrap();

        // Whichever havoc branch fires, g still adds 3 to f's result.
        let out = fg.apply(Term::Int(5)).unwrap();
        let havocs = out.free_vars();
        let (havoc_name, _) = havocs.iter().next().expect("one havoc boolean");
        let taken = Model::new().with(havoc_name.clone(), Value::Bool(true));
        let skipped = Model::new().with(havoc_name.clone(), Value::Bool(false));
        assert_eq!(out.eval(&taken).unwrap(), Value::Int(9));
        assert_eq!(out.eval(&skipped).unwrap(), Value::Int(3));
    }

    #[test]
    fn predicate_is_plain_expression_evaluation() {
        let p = AstPredicate::new(
            "r",
            Expr::LessThan(Box::new(Expr::int(0)), Box::new(Expr::var("r"))),
        );
        let t = p.apply(Term::Int(3)).unwrap();
        assert_eq!(t.eval(&Model::new()).unwrap(), Value::Bool(true));
    }
}
