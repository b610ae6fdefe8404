use miette::Diagnostic;
use thiserror::Error;

use rove_smt::SortError;

/// Fatal faults in a supplied policy, discovered during symbolic
/// evaluation or function construction. These are programmer errors in the
/// policy file, not recoverable conditions.
#[derive(Debug, Error, Diagnostic)]
pub enum AstError {
    #[error("unbound variable {name:?}")]
    #[diagnostic(code(rove::ast))]
    UnboundVariable { name: String },

    #[error("function body produced no return value")]
    #[diagnostic(code(rove::ast))]
    NoReturn,

    #[error("cannot compose: the first function does not return on every path")]
    #[diagnostic(code(rove::ast))]
    PartialReturn,

    #[error("no predicate named {name:?} is declared")]
    #[diagnostic(code(rove::ast))]
    UnknownPredicate { name: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Sort(#[from] SortError),
}

/// Well-formedness errors while loading an AST from its JSON form.
/// Always fatal: the file is rejected.
#[derive(Debug, Error, Diagnostic)]
#[diagnostic(code(rove::ast::load))]
pub enum LoadError {
    #[error("unknown discriminator {name:?}")]
    UnknownDiscriminator { name: String },

    #[error("type {name:?} expects {expected} argument(s), found {found}")]
    WrongArity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("malformed type string {input:?}: {reason}")]
    MalformedType { input: String, reason: &'static str },

    #[error("node {discriminator:?} is missing required field {field:?}")]
    MissingField {
        discriminator: String,
        field: &'static str,
    },

    #[error("field {field:?} of {discriminator:?} has the wrong shape: {reason}")]
    BadField {
        discriminator: String,
        field: &'static str,
        reason: &'static str,
    },

    #[error("expected a JSON object with a \"$type\" discriminator")]
    NotAnObject,
}
