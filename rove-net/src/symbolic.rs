use std::fmt;
use std::sync::Arc;

use rove_ast::AstError;
use rove_smt::{Sort, Term};

/// Constraint attached to a symbolic parameter, as a term builder over the
/// parameter's variable.
pub type ConstraintFn = Arc<dyn Fn(&Term) -> Result<Term, AstError> + Send + Sync>;

/// A free symbolic value shared by every formula of a network, e.g. the
/// identity of a symbolic destination. Unconstrained unless a constraint
/// is attached.
#[derive(Clone)]
pub struct SymbolicParam {
    pub name: String,
    pub sort: Sort,
    constraint: Option<ConstraintFn>,
}

impl SymbolicParam {
    pub fn new(name: impl Into<String>, sort: Sort) -> SymbolicParam {
        SymbolicParam {
            name: name.into(),
            sort,
            constraint: None,
        }
    }

    pub fn constrained(
        name: impl Into<String>,
        sort: Sort,
        constraint: ConstraintFn,
    ) -> SymbolicParam {
        SymbolicParam {
            name: name.into(),
            sort,
            constraint: Some(constraint),
        }
    }

    /// The parameter as a term.
    pub fn var(&self) -> Term {
        Term::var(self.name.clone(), self.sort.clone())
    }

    /// The constraint instantiated at the parameter's variable, or `true`.
    pub fn encode(&self) -> Result<Term, AstError> {
        match &self.constraint {
            Some(f) => f(&self.var()),
            None => Ok(Term::Bool(true)),
        }
    }
}

impl fmt::Debug for SymbolicParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolicParam")
            .field("name", &self.name)
            .field("sort", &self.sort)
            .field("constrained", &self.constraint.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rove_smt::{Model, Value};

    #[test]
    fn unconstrained_parameters_encode_to_true() {
        let p = SymbolicParam::new("d", Sort::Int);
        assert_eq!(p.encode().unwrap(), Term::Bool(true));
        assert_eq!(p.var(), Term::var("d", Sort::Int));
    }

    #[test]
    fn constraints_apply_to_the_variable() {
        let p = SymbolicParam::constrained(
            "d",
            Sort::Int,
            Arc::new(|v| Ok(Term::le(Term::Int(0), v.clone()))),
        );
        let encoded = p.encode().unwrap();
        let ok = Model::new().with("d", Value::Int(3));
        let bad = Model::new().with("d", Value::Int(-1));
        assert!(encoded.eval_bool(&ok).unwrap());
        assert!(!encoded.eval_bool(&bad).unwrap());
    }
}
