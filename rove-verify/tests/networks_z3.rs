#![cfg(feature = "z3")]

use rove_net::{Network, NetworkSpec, RouteType};
use rove_smt::SmtProfile;
use rove_smt::solver::z3_backend::Z3Backend;
use rove_verify::{CheckKind, CheckOutcome, NullSink, Verifier};

fn build(spec: serde_json::Value, route: RouteType) -> Network {
    let spec: NetworkSpec = serde_json::from_value(spec).expect("spec");
    spec.into_network(route).expect("network")
}

/// A source node that starts reached and a chain forwarding the flag, with
/// annotations saying each node is reached one hop later.
fn reachability_chain(sound: bool) -> Network {
    // The unsound variant only asserts a is reached from time 1 onward, so
    // at time 0 nothing is known about a's route and the inductive step at
    // b cannot go through, even though every base check passes.
    let a_invariant = if sound {
        serde_json::json!({"$type": "Globally", "Predicate": "reached"})
    } else {
        serde_json::json!({"$type": "Finally", "Time": 1, "Then": "reached"})
    };
    build(
        serde_json::json!({
            "converge_time": 2,
            "declarations": {
                "forward": {
                    "Arg": "r",
                    "Body": [{"$type": "Return(_)", "Expr": {"$type": "Var(_)", "Name": "r"}}]
                }
            },
            "predicates": {
                "reached": {"Arg": "r", "Expr": {"$type": "Var(_)", "Name": "r"}}
            },
            "nodes": {
                "a": {
                    "initial": {"$type": "Bool", "Value": true},
                    "invariant": a_invariant,
                    "assert": "reached"
                },
                "b": {
                    "policies": {"a": {"import": ["forward"]}},
                    "invariant": {"$type": "Finally", "Time": 1, "Then": "reached"},
                    "assert": "reached"
                }
            }
        }),
        RouteType::boolean(),
    )
}

fn timeout() -> u32 {
    SmtProfile::Ci.timeout_ms()
}

#[test]
fn z3_sound_reachability_chain_proves_every_check() {
    let report = Verifier::new(&Z3Backend::new(), timeout())
        .run(&reachability_chain(true), &NullSink)
        .expect("run");
    for result in &report.results {
        assert!(
            result.outcome.is_proved(),
            "{} at {:?} was not proved",
            result.kind,
            result.node
        );
    }
}

#[test]
fn z3_unsound_annotation_fails_inductively_at_the_right_node() {
    let report = Verifier::new(&Z3Backend::new(), timeout())
        .skip_monolithic()
        .run(&reachability_chain(false), &NullSink)
        .expect("run");

    let inductive_b = report
        .results
        .iter()
        .find(|r| r.kind == CheckKind::Inductive && r.node.as_deref() == Some("b"))
        .expect("inductive result for b");
    match &inductive_b.outcome {
        CheckOutcome::Disproved(cex) => {
            let text = cex.to_string();
            assert!(text.contains("inductive check failed at node b"), "{text}");
            assert!(text.contains("neighbor a of b"), "{text}");
            assert!(cex.time.is_some());
        }
        other => panic!("expected a counterexample, got {other:?}"),
    }
}

#[test]
fn z3_modular_pass_implies_monolithic_pass() {
    let backend = Z3Backend::new();
    for k in 2..=4 {
        let mut nodes = serde_json::Map::new();
        nodes.insert(
            "n0".to_string(),
            serde_json::json!({
                "initial": {"$type": "Bool", "Value": true},
                "invariant": {"$type": "Globally", "Predicate": "reached"},
                "assert": "reached"
            }),
        );
        for i in 1..k {
            nodes.insert(
                format!("n{i}"),
                serde_json::json!({
                    "policies": { format!("n{}", i - 1): {} },
                    "invariant": {"$type": "Finally", "Time": i, "Then": "reached"},
                    "assert": "reached"
                }),
            );
        }
        let network = build(
            serde_json::json!({
                "converge_time": k,
                "predicates": {
                    "reached": {"Arg": "r", "Expr": {"$type": "Var(_)", "Name": "r"}}
                },
                "nodes": nodes
            }),
            RouteType::boolean(),
        );
        let report = Verifier::new(&backend, timeout())
            .run(&network, &NullSink)
            .expect("run");
        let modular_ok = report
            .results
            .iter()
            .filter(|r| r.kind != CheckKind::Monolithic)
            .all(|r| r.outcome.is_proved());
        let monolithic = report
            .results
            .iter()
            .find(|r| r.kind == CheckKind::Monolithic)
            .expect("monolithic result");
        assert!(modular_ok, "modular checks failed on the {k}-chain");
        assert!(
            monolithic.outcome.is_proved(),
            "monolithic disagreed with the modular checks on the {k}-chain"
        );
    }
}

#[test]
fn z3_symbolic_destination_constraint_reaches_the_counterexample() {
    // lp is symbolic but constrained nonnegative; the safety property
    // demands lp >= 1, so the counterexample must pick lp = 0.
    let network = build(
        serde_json::json!({
            "converge_time": 1,
            "symbolics": [
                {"name": "lp0", "type": "TInt32", "constraint": "nonneg"}
            ],
            "predicates": {
                "nonneg": {
                    "Arg": "x",
                    "Expr": {
                        "$type": "LessThanEqual(_)",
                        "Operand1": {"$type": "Int32", "Value": 0},
                        "Operand2": {"$type": "Var(_)", "Name": "x"}
                    }
                },
                "big": {
                    "Arg": "r",
                    "Expr": {
                        "$type": "LessThanEqual(_)",
                        "Operand1": {"$type": "Int32", "Value": 1},
                        "Operand2": {"$type": "Var(_)", "Name": "r"}
                    }
                },
                "is_lp0": {
                    "Arg": "r",
                    "Expr": {
                        "$type": "Equal(_)",
                        "Operand1": {"$type": "Var(_)", "Name": "r"},
                        "Operand2": {"$type": "Var(_)", "Name": "lp0"}
                    }
                }
            },
            "nodes": {
                "a": {
                    "initial": {"$type": "Var(_)", "Name": "lp0"},
                    "invariant": {"$type": "Globally", "Predicate": "is_lp0"},
                    "assert": "big"
                }
            }
        }),
        RouteType::new(rove_smt::Sort::Int),
    );
    let report = Verifier::new(&Z3Backend::new(), timeout())
        .skip_monolithic()
        .run(&network, &NullSink)
        .expect("run");
    let safety = report
        .results
        .iter()
        .find(|r| r.kind == CheckKind::Safety)
        .expect("safety result");
    match &safety.outcome {
        CheckOutcome::Disproved(cex) => {
            let lp0 = cex
                .symbolics
                .iter()
                .find(|(name, _)| name == "lp0")
                .map(|(_, v)| v.clone())
                .expect("symbolic lp0 in the counterexample");
            assert_eq!(lp0, rove_smt::Value::Int(0));
        }
        other => panic!("expected a counterexample, got {other:?}"),
    }
}
