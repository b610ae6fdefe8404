use std::fmt;

use thiserror::Error;

/// The sort (symbolic type) of a [`crate::Term`].
///
/// `Int` covers every numeric discriminator the loader recognizes
/// (32-bit ints, times, big integers); the solver backend treats them all
/// as unbounded integers. Sets hold strings, which is all the route-map
/// dialect ever stores in them (community tags).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sort {
    Bool,
    Int,
    Str,
    Unit,
    Option(Box<Sort>),
    Pair(Box<Sort>, Box<Sort>),
    Set,
    /// A record with named fields in a fixed order.
    Record(Vec<(String, Sort)>),
}

impl Sort {
    pub fn option(inner: Sort) -> Sort {
        Sort::Option(Box::new(inner))
    }

    pub fn pair(first: Sort, second: Sort) -> Sort {
        Sort::Pair(Box::new(first), Box::new(second))
    }

    pub fn record<I, S>(fields: I) -> Sort
    where
        I: IntoIterator<Item = (S, Sort)>,
        S: Into<String>,
    {
        Sort::Record(fields.into_iter().map(|(n, s)| (n.into(), s)).collect())
    }

    /// Look up a field's sort in a record sort.
    pub fn field(&self, name: &str) -> Option<&Sort> {
        match self {
            Sort::Record(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, s)| s),
            _ => None,
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Bool => write!(f, "bool"),
            Sort::Int => write!(f, "int"),
            Sort::Str => write!(f, "string"),
            Sort::Unit => write!(f, "unit"),
            Sort::Option(inner) => write!(f, "option<{inner}>"),
            Sort::Pair(a, b) => write!(f, "pair<{a}, {b}>"),
            Sort::Set => write!(f, "set<string>"),
            Sort::Record(fields) => {
                write!(f, "{{")?;
                for (i, (name, sort)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {sort}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// A sort mismatch discovered while inferring the sort of a term.
///
/// Terms are built by the AST evaluator, so a sort error is a fault in the
/// supplied policy (or in a hand-built formula), not a solver problem.
#[derive(Debug, Error, miette::Diagnostic)]
#[diagnostic(code(rove::smt::sort))]
pub enum SortError {
    #[error("expected a term of sort {expected}, found {found} in {context}")]
    Mismatch {
        expected: String,
        found: Sort,
        context: &'static str,
    },

    #[error("branches of an ite disagree: {then_sort} vs {else_sort}")]
    BranchMismatch { then_sort: Sort, else_sort: Sort },

    #[error("equality compares {left} with {right}")]
    UnequalOperands { left: Sort, right: Sort },

    #[error("record {record} has no field named {field:?}")]
    UnknownField { record: Sort, field: String },
}
