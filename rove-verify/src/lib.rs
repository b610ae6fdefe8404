#![forbid(unsafe_code)]

//! The verification engine: compiles a [`rove_net::Network`] into SMT
//! proof obligations and dispatches them to a solver backend.
//!
//! Every check is solved by refutation: the obligation's formula asserts
//! the symbolic-parameter assumptions together with the negation of the
//! property, so UNSAT means the check holds and a model is a concrete
//! counterexample state. Obligations are mutually independent and run
//! through rayon's pool; failures are collected, never early-aborted.

mod counterexample;
mod engine;
mod obligation;

pub use counterexample::Counterexample;
pub use engine::{
    CheckOutcome, CollectingSink, NullSink, ObligationResult, ReportSink, VerificationReport,
    Verifier, VerifyError, run_obligation,
};
pub use obligation::{CheckKind, Obligation, build_obligations};
