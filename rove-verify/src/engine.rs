use std::sync::Mutex;
use std::time::{Duration, Instant};

use miette::Diagnostic;
use rayon::prelude::*;
use rove_net::{Network, NetworkError};
use rove_smt::{SmtBackend, SolverError, Verdict};
use thiserror::Error;

use crate::counterexample::Counterexample;
use crate::obligation::{CheckKind, Obligation, build_obligations};

#[derive(Debug, Error, Diagnostic)]
pub enum VerifyError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Net(#[from] NetworkError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Solver(#[from] SolverError),
}

/// The outcome of one obligation. `Unknown` (timeout or incomplete
/// theory) is never conflated with either of the others.
#[derive(Clone, Debug)]
pub enum CheckOutcome {
    Proved,
    Disproved(Counterexample),
    Unknown,
}

impl CheckOutcome {
    pub fn is_proved(&self) -> bool {
        matches!(self, CheckOutcome::Proved)
    }
}

#[derive(Clone, Debug)]
pub struct ObligationResult {
    pub kind: CheckKind,
    pub node: Option<String>,
    pub outcome: CheckOutcome,
    pub elapsed: Duration,
}

/// Receives each result as it completes, from worker threads.
pub trait ReportSink: Sync {
    fn record(&self, result: &ObligationResult);
}

/// A sink that drops everything.
pub struct NullSink;

impl ReportSink for NullSink {
    fn record(&self, _result: &ObligationResult) {}
}

/// A sink that keeps every result, for tests.
#[derive(Default)]
pub struct CollectingSink {
    results: Mutex<Vec<ObligationResult>>,
}

impl CollectingSink {
    pub fn new() -> CollectingSink {
        CollectingSink::default()
    }

    pub fn into_results(self) -> Vec<ObligationResult> {
        self.results.into_inner().unwrap_or_default()
    }
}

impl ReportSink for CollectingSink {
    fn record(&self, result: &ObligationResult) {
        if let Ok(mut results) = self.results.lock() {
            results.push(result.clone());
        }
    }
}

#[derive(Debug)]
pub struct VerificationReport {
    pub results: Vec<ObligationResult>,
    pub elapsed: Duration,
}

impl VerificationReport {
    pub fn all_proved(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_proved())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ObligationResult> {
        self.results.iter().filter(|r| !r.outcome.is_proved())
    }
}

/// Solve one obligation by refutation.
pub fn run_obligation(
    obligation: &Obligation,
    backend: &dyn SmtBackend,
    timeout_ms: u32,
) -> Result<CheckOutcome, SolverError> {
    match backend.solve(&obligation.formula, timeout_ms)? {
        Verdict::Unsat => Ok(CheckOutcome::Proved),
        Verdict::Sat(model) => Ok(CheckOutcome::Disproved(Counterexample::decode(
            obligation, &model,
        ))),
        Verdict::Unknown => Ok(CheckOutcome::Unknown),
    }
}

/// Dispatches a network's obligations across rayon's pool and gathers
/// the results. Obligations share no mutable state, so the fan-out needs
/// no locking; failures are collected rather than aborting the run.
pub struct Verifier<'a> {
    backend: &'a dyn SmtBackend,
    timeout_ms: u32,
    include_monolithic: bool,
}

impl<'a> Verifier<'a> {
    pub fn new(backend: &'a dyn SmtBackend, timeout_ms: u32) -> Verifier<'a> {
        Verifier {
            backend,
            timeout_ms,
            include_monolithic: true,
        }
    }

    pub fn skip_monolithic(mut self) -> Verifier<'a> {
        self.include_monolithic = false;
        self
    }

    pub fn run(
        &self,
        network: &Network,
        sink: &dyn ReportSink,
    ) -> Result<VerificationReport, VerifyError> {
        let start = Instant::now();
        let obligations: Vec<Obligation> = build_obligations(network)?
            .into_iter()
            .filter(|o| self.include_monolithic || o.kind != CheckKind::Monolithic)
            .collect();

        let results: Result<Vec<ObligationResult>, SolverError> = obligations
            .par_iter()
            .map(|obligation| {
                let begin = Instant::now();
                let outcome = run_obligation(obligation, self.backend, self.timeout_ms)?;
                let result = ObligationResult {
                    kind: obligation.kind,
                    node: obligation.node.clone(),
                    outcome,
                    elapsed: begin.elapsed(),
                };
                sink.record(&result);
                Ok(result)
            })
            .collect();

        Ok(VerificationReport {
            results: results?,
            elapsed: start.elapsed(),
        })
    }
}
