#![forbid(unsafe_code)]

//! Symbolic terms, sorts and solver backends.
//!
//! Policy evaluation compiles route-map ASTs into [`Term`]s: unevaluated
//! formulas over named symbolic constants. The verification engine negates
//! its proof obligations and hands the resulting boolean terms to an
//! [`SmtBackend`], which answers `Unsat` (the obligation holds), `Sat` with
//! a concrete [`Model`] (a counterexample), or `Unknown` (timeout).

mod sort;
mod term;
mod value;

pub mod solver;

pub use sort::{Sort, SortError};
pub use term::{Term, fresh_name};
pub use value::{EvalModelError, Model, Value};

pub use solver::{SmtBackend, SmtProfile, SolverError, UnavailableBackend, Verdict};
