use crate::env::Env;
use crate::error::AstError;
use crate::expr::Expr;

/// A policy statement. Evaluation threads an [`Env`] through the body;
/// branching evaluates both arms and joins them under the symbolic guard.
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Skip,
    Assign(String, Expr),
    Return(Expr),
    Seq(Box<Stmt>, Box<Stmt>),
    If {
        guard: Expr,
        then_branch: Box<Stmt>,
        else_branch: Box<Stmt>,
    },
    SetDefaultPolicy(String),
}

impl Stmt {
    pub fn assign(var: impl Into<String>, expr: Expr) -> Stmt {
        Stmt::Assign(var.into(), expr)
    }

    pub fn ret(expr: Expr) -> Stmt {
        Stmt::Return(expr)
    }

    pub fn seq(first: Stmt, second: Stmt) -> Stmt {
        Stmt::Seq(Box::new(first), Box::new(second))
    }

    pub fn if_else(guard: Expr, then_branch: Stmt, else_branch: Stmt) -> Stmt {
        Stmt::If {
            guard,
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        }
    }

    /// Evaluate this statement against the environment.
    pub fn evaluate(&self, env: &mut Env) -> Result<(), AstError> {
        match self {
            Stmt::Skip => Ok(()),
            Stmt::Assign(var, expr) => {
                let value = expr.evaluate(env)?;
                env.bind(var.clone(), value);
                Ok(())
            }
            Stmt::Return(expr) => {
                let value = expr.evaluate(env)?;
                env.set_return(value);
                Ok(())
            }
            Stmt::Seq(first, second) => {
                first.evaluate(env)?;
                second.evaluate(env)
            }
            Stmt::If {
                guard,
                then_branch,
                else_branch,
            } => {
                let guard = guard.evaluate(env)?;
                let mut true_env = env.clone();
                let mut false_env = env.clone();
                then_branch.evaluate(&mut true_env)?;
                else_branch.evaluate(&mut false_env)?;
                *env = Env::join(env, guard, true_env, false_env);
                Ok(())
            }
            Stmt::SetDefaultPolicy(name) => {
                env.set_default_policy(name.clone());
                Ok(())
            }
        }
    }

    /// Rewrite every `Return(e)` into `Assign(var, e)`, recursing through
    /// sequences and branches. Used by function composition to feed one
    /// function's result into the next function's argument.
    pub fn bind(self, var: &str) -> Stmt {
        match self {
            Stmt::Return(expr) => Stmt::Assign(var.to_string(), expr),
            Stmt::Seq(first, second) => Stmt::seq(first.bind(var), second.bind(var)),
            Stmt::If {
                guard,
                then_branch,
                else_branch,
            } => Stmt::If {
                guard,
                then_branch: Box::new(then_branch.bind(var)),
                else_branch: Box::new(else_branch.bind(var)),
            },
            other => other,
        }
    }

    /// True when every control path through this statement reaches a
    /// `Return`. Composition requires a return-total first function;
    /// anything else would leave the continuation's argument unbound on
    /// some path.
    pub fn returns_on_all_paths(&self) -> bool {
        match self {
            Stmt::Return(_) => true,
            Stmt::Seq(first, second) => {
                first.returns_on_all_paths() || second.returns_on_all_paths()
            }
            Stmt::If {
                then_branch,
                else_branch,
                ..
            } => then_branch.returns_on_all_paths() && else_branch.returns_on_all_paths(),
            Stmt::Skip | Stmt::Assign(..) | Stmt::SetDefaultPolicy(_) => false,
        }
    }

    /// Rename every occurrence of variable `old` to `new`, including
    /// assignment targets.
    pub fn rename(&mut self, old: &str, new: &str) {
        match self {
            Stmt::Skip | Stmt::SetDefaultPolicy(_) => {}
            Stmt::Assign(var, expr) => {
                if var == old {
                    *var = new.to_string();
                }
                expr.rename(old, new);
            }
            Stmt::Return(expr) => expr.rename(old, new),
            Stmt::Seq(first, second) => {
                first.rename(old, new);
                second.rename(old, new);
            }
            Stmt::If {
                guard,
                then_branch,
                else_branch,
            } => {
                guard.rename(old, new);
                then_branch.rename(old, new);
                else_branch.rename(old, new);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rove_smt::{Model, Sort, Term, Value};

    fn eval(stmt: &Stmt, env: &mut Env) {
        stmt.evaluate(env).expect("statement evaluates");
    }

    #[test]
    fn assign_then_read() {
        let mut env = Env::new();
        eval(&Stmt::assign("x", Expr::int(3)), &mut env);
        eval(
            &Stmt::assign("y", Expr::Plus(Box::new(Expr::var("x")), Box::new(Expr::int(1)))),
            &mut env,
        );
        assert_eq!(
            env.get("y").unwrap().eval(&Model::new()).unwrap(),
            Value::Int(4)
        );
    }

    #[test]
    fn branch_not_writing_a_variable_leaves_it_intact() {
        // x bound before if(g, {y := 1}, skip): x must survive any g.
        let mut env = Env::new().with("x", Term::var("x0", Sort::Int));
        let stmt = Stmt::if_else(
            Expr::Havoc,
            Stmt::assign("y", Expr::int(1)),
            Stmt::Skip,
        );
        eval(&stmt, &mut env);
        assert_eq!(env.get("x").unwrap(), &Term::var("x0", Sort::Int));
    }

    #[test]
    fn branch_joins_both_assignments_under_the_guard() {
        let mut env = Env::new().with("g", Term::var("g", Sort::Bool));
        let stmt = Stmt::if_else(
            Expr::var("g"),
            Stmt::assign("x", Expr::int(1)),
            Stmt::assign("x", Expr::int(2)),
        );
        eval(&stmt, &mut env);

        let on_true = Model::new().with("g", Value::Bool(true));
        let on_false = Model::new().with("g", Value::Bool(false));
        assert_eq!(env.get("x").unwrap().eval(&on_true).unwrap(), Value::Int(1));
        assert_eq!(env.get("x").unwrap().eval(&on_false).unwrap(), Value::Int(2));
    }

    #[test]
    fn second_return_wins_on_a_straight_line() {
        let mut env = Env::new();
        let stmt = Stmt::seq(Stmt::ret(Expr::int(1)), Stmt::ret(Expr::int(2)));
        eval(&stmt, &mut env);
        assert_eq!(
            env.return_value().unwrap().eval(&Model::new()).unwrap(),
            Value::Int(2)
        );
    }

    #[test]
    fn bind_rewrites_returns_into_assignments() {
        let stmt = Stmt::if_else(
            Expr::Havoc,
            Stmt::ret(Expr::int(1)),
            Stmt::ret(Expr::int(2)),
        );
        let bound = stmt.bind("out");
        let Stmt::If {
            then_branch,
            else_branch,
            ..
        } = bound
        else {
            panic!("still an if");
        };
        assert_eq!(*then_branch, Stmt::assign("out", Expr::int(1)));
        assert_eq!(*else_branch, Stmt::assign("out", Expr::int(2)));
    }

    #[test]
    fn return_totality() {
        assert!(Stmt::ret(Expr::int(1)).returns_on_all_paths());
        assert!(!Stmt::Skip.returns_on_all_paths());
        assert!(
            Stmt::seq(Stmt::assign("x", Expr::int(1)), Stmt::ret(Expr::var("x")))
                .returns_on_all_paths()
        );
        // only one arm returns
        assert!(
            !Stmt::if_else(Expr::Havoc, Stmt::ret(Expr::int(1)), Stmt::Skip)
                .returns_on_all_paths()
        );
    }

    #[test]
    fn rename_rewrites_assignment_targets() {
        let mut stmt = Stmt::assign("x", Expr::Plus(Box::new(Expr::var("x")), Box::new(Expr::int(1))));
        stmt.rename("x", "y");
        assert_eq!(
            stmt,
            Stmt::assign("y", Expr::Plus(Box::new(Expr::var("y")), Box::new(Expr::int(1))))
        );
    }
}
