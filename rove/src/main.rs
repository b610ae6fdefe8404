#![forbid(unsafe_code)]

//! Command-line front end: load network specification files, build their
//! models, run every proof obligation and print per-node results.

use std::fs;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use miette::{IntoDiagnostic, Result, WrapErr};

use rove_smt::{SmtBackend, SmtProfile};
use rove_verify::{CheckOutcome, ObligationResult, ReportSink, Verifier};

#[derive(Parser)]
#[command(name = "rove", about = "Inductive verification of routing protocol policies")]
struct Cli {
    /// Network specification files to verify.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Solver effort profile.
    #[arg(long, value_enum, default_value_t = Profile::Fast)]
    profile: Profile,

    /// Per-query timeout override in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u32>,

    /// Run only the modular checks, skipping the whole-network query.
    #[arg(long)]
    skip_monolithic: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Profile {
    Fast,
    Ci,
    Thorough,
}

impl Profile {
    fn smt(self) -> SmtProfile {
        match self {
            Profile::Fast => SmtProfile::Fast,
            Profile::Ci => SmtProfile::Ci,
            Profile::Thorough => SmtProfile::Thorough,
        }
    }
}

/// Prints each result as its worker finishes it.
struct PrintingSink;

impl ReportSink for PrintingSink {
    fn record(&self, result: &ObligationResult) {
        let target = match &result.node {
            Some(node) => format!("{} at {node}", result.kind),
            None => result.kind.to_string(),
        };
        let verdict = match &result.outcome {
            CheckOutcome::Proved => "passed",
            CheckOutcome::Disproved(_) => "FAILED",
            CheckOutcome::Unknown => "unknown (timeout?)",
        };
        println!("    {target}: {verdict} in {:.3}s", result.elapsed.as_secs_f64());
    }
}

#[cfg(feature = "z3")]
fn backend() -> impl SmtBackend {
    rove_smt::solver::z3_backend::Z3Backend::new()
}

#[cfg(not(feature = "z3"))]
fn backend() -> impl SmtBackend {
    rove_smt::UnavailableBackend
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let timeout_ms = cli.timeout_ms.unwrap_or(cli.profile.smt().timeout_ms());
    let backend = backend();

    for path in &cli.files {
        println!("{}:", path.display());
        let text = fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("reading {}", path.display()))?;
        let spec = rove_net::NetworkSpec::from_json(&text)
            .wrap_err_with(|| format!("loading {}", path.display()))?;
        let route = spec.route.route_type();
        let network = spec
            .into_network(route)
            .wrap_err_with(|| format!("building the network from {}", path.display()))?;

        let mut verifier = Verifier::new(&backend, timeout_ms);
        if cli.skip_monolithic {
            verifier = verifier.skip_monolithic();
        }
        let report = verifier.run(&network, &PrintingSink)?;

        for failure in report.failures() {
            if let CheckOutcome::Disproved(cex) = &failure.outcome {
                print!("{cex}");
            }
        }
        let summary = if report.all_proved() {
            "all checks passed"
        } else {
            "some checks did not pass"
        };
        println!(
            "  {summary} ({} obligations in {:.3}s)",
            report.results.len(),
            report.elapsed.as_secs_f64()
        );
    }
    Ok(())
}
