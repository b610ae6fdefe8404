use std::collections::BTreeMap;

use rove_smt::Term;

use crate::env::Env;
use crate::error::AstError;
use crate::func::AstPredicate;

/// A temporal operator over named predicates, as it appears in a network
/// file. Predicate names are resolved against the file's declarations to
/// produce an [`Annotation`].
#[derive(Clone, Debug, PartialEq)]
pub enum Temporal {
    /// Holds from `time` onwards: `τ < time ∨ then(route)`.
    Finally { time: i64, then: String },
    /// Holds at every time: `predicate(route)`.
    Globally { predicate: String },
    /// `before` holds strictly before `time`, `after` from `time` onwards.
    Until {
        time: i64,
        before: String,
        after: String,
    },
}

impl Temporal {
    pub fn resolve(
        &self,
        predicates: &BTreeMap<String, AstPredicate>,
    ) -> Result<Annotation, AstError> {
        let lookup = |name: &str| {
            predicates
                .get(name)
                .cloned()
                .ok_or_else(|| AstError::UnknownPredicate {
                    name: name.to_string(),
                })
        };
        Ok(match self {
            Temporal::Finally { time, then } => Annotation::Finally {
                time: *time,
                then: lookup(then)?,
            },
            Temporal::Globally { predicate } => Annotation::Globally {
                predicate: lookup(predicate)?,
            },
            Temporal::Until {
                time,
                before,
                after,
            } => Annotation::Until {
                time: *time,
                before: lookup(before)?,
                after: lookup(after)?,
            },
        })
    }
}

/// A [`Temporal`] with its predicate names resolved, ready to be
/// instantiated at a symbolic route and time.
#[derive(Clone, Debug, PartialEq)]
pub enum Annotation {
    Finally { time: i64, then: AstPredicate },
    Globally { predicate: AstPredicate },
    Until {
        time: i64,
        before: AstPredicate,
        after: AstPredicate,
    },
}

impl Annotation {
    /// The annotation that holds of every route at every time.
    pub fn trivially_true() -> Annotation {
        Annotation::Globally {
            predicate: AstPredicate::new("r", crate::expr::Expr::bool(true)),
        }
    }

    /// Instantiate at a route and time term, with `globals` in scope for
    /// the predicate bodies.
    pub fn at(&self, globals: &Env, route: &Term, time: &Term) -> Result<Term, AstError> {
        match self {
            Annotation::Finally { time: t, then } => Ok(Term::or(
                Term::lt(time.clone(), Term::Int(*t)),
                then.apply_in(globals, route.clone())?,
            )),
            Annotation::Globally { predicate } => predicate.apply_in(globals, route.clone()),
            Annotation::Until {
                time: t,
                before,
                after,
            } => Ok(Term::ite(
                Term::lt(time.clone(), Term::Int(*t)),
                before.apply_in(globals, route.clone())?,
                after.apply_in(globals, route.clone())?,
            )),
        }
    }
}
