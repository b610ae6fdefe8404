#![forbid(unsafe_code)]

//! The route-map policy dialect: a small typed AST of expressions and
//! statements, symbolically evaluated into [`rove_smt::Term`]s.
//!
//! Policies are unary functions over the route record. Branching evaluates
//! both arms and joins the resulting environments under the symbolic guard,
//! so a single evaluation covers every execution path at once. Functions
//! compose by rewriting `return` into an assignment of the next function's
//! argument and sequencing the two bodies.

mod env;
mod error;
mod expr;
mod func;
mod stmt;
mod temporal;
mod ty;

pub mod load;

pub use env::Env;
pub use error::{AstError, LoadError};
pub use expr::{Constant, Expr};
pub use func::{AstFunction, AstPredicate};
pub use stmt::Stmt;
pub use temporal::{Annotation, Temporal};
pub use ty::Ty;
