use std::collections::BTreeMap;
use std::fmt;

use rove_net::{Network, NetworkError};
use rove_smt::{Term, fresh_name};

/// The four proof obligations of the modular induction scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckKind {
    /// The initial route satisfies the node's annotation at time zero.
    Base,
    /// If every predecessor's annotation holds at time t, the selected
    /// candidate satisfies the node's annotation at t + 1.
    Inductive,
    /// A route satisfying the annotation at the convergence time
    /// satisfies the safety property.
    Safety,
    /// The whole-network cross-check: every node's stable candidate
    /// satisfies every safety property, in one unrolled query.
    Monolithic,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CheckKind::Base => "base",
            CheckKind::Inductive => "inductive",
            CheckKind::Safety => "safety",
            CheckKind::Monolithic => "monolithic",
        })
    }
}

/// One refutation query, with the metadata needed to decode a model back
/// into a readable counterexample.
#[derive(Clone, Debug)]
pub struct Obligation {
    pub kind: CheckKind,
    /// The node under check; `None` for the monolithic query.
    pub node: Option<String>,
    /// Assumptions conjoined with the negated property. UNSAT = proved.
    pub formula: Term,
    /// Label (node or neighbor name) to route-variable name.
    pub route_vars: BTreeMap<String, String>,
    pub time_var: Option<String>,
    pub symbolics: Vec<String>,
}

impl Obligation {
    fn new(kind: CheckKind, node: Option<&str>, network: &Network, formula: Term) -> Obligation {
        Obligation {
            kind,
            node: node.map(str::to_string),
            formula,
            route_vars: BTreeMap::new(),
            time_var: None,
            symbolics: network
                .symbolics()
                .iter()
                .map(|s| s.name.clone())
                .collect(),
        }
    }
}

/// Build every obligation for a network: Base, Inductive and Safety per
/// node, plus one Monolithic query for the whole network.
pub fn build_obligations(network: &Network) -> Result<Vec<Obligation>, NetworkError> {
    let assumptions = network.assumptions()?;
    let route_sort = network.route().sort().clone();
    let mut obligations = Vec::new();

    for v in network.topology().nodes() {
        // Base: the initial route at time zero.
        let base = Term::conj(vec![
            assumptions.clone(),
            Term::not(network.annotation(v, network.initial(v)?, &Term::Int(0))?),
        ]);
        obligations.push(Obligation::new(CheckKind::Base, Some(v), network, base));

        // Inductive: fresh routes for every predecessor at a fresh time.
        let time = Term::var(fresh_name("time"), rove_smt::Sort::Int);
        let mut neighbor_routes = BTreeMap::new();
        let mut labels = BTreeMap::new();
        for u in network.topology().predecessors(v) {
            let name = fresh_name(&format!("route-{u}"));
            labels.insert(u.clone(), name.clone());
            neighbor_routes.insert(u.clone(), Term::var(name, route_sort.clone()));
        }
        let mut clauses = vec![assumptions.clone(), Term::le(Term::Int(0), time.clone())];
        for u in network.topology().predecessors(v) {
            clauses.push(network.annotation(u, &neighbor_routes[u], &time)?);
        }
        let candidate = network.candidate(v, &neighbor_routes)?;
        clauses.push(Term::not(network.annotation(
            v,
            &candidate,
            &Term::add(time.clone(), Term::Int(1)),
        )?));
        let mut inductive =
            Obligation::new(CheckKind::Inductive, Some(v), network, Term::conj(clauses));
        inductive.route_vars = labels;
        inductive.time_var = time_name(&time);
        obligations.push(inductive);

        // Safety: any route the annotation admits at convergence time.
        let name = fresh_name(&format!("route-{v}"));
        let route = Term::var(name.clone(), route_sort.clone());
        let safety = Term::conj(vec![
            assumptions.clone(),
            network.annotation(v, &route, &Term::Int(network.converge_time()))?,
            Term::not(network.property(v, &route)?),
        ]);
        let mut ob = Obligation::new(CheckKind::Safety, Some(v), network, safety);
        ob.route_vars.insert(v.to_string(), name);
        obligations.push(ob);
    }

    // Monolithic: one stable route per node, constrained to equal its
    // candidate, refuting the conjunction of all safety properties.
    let mut stable = BTreeMap::new();
    let mut labels = BTreeMap::new();
    for v in network.topology().nodes() {
        let name = fresh_name(&format!("route-{v}"));
        labels.insert(v.to_string(), name.clone());
        stable.insert(v.to_string(), Term::var(name, route_sort.clone()));
    }
    let mut clauses = vec![assumptions];
    let mut safeties = Vec::new();
    for v in network.topology().nodes() {
        let candidate = network.candidate(v, &stable)?;
        clauses.push(Term::eq(stable[v].clone(), candidate));
        safeties.push(network.property(v, &stable[v])?);
    }
    clauses.push(Term::not(Term::conj(safeties)));
    let mut monolithic =
        Obligation::new(CheckKind::Monolithic, None, network, Term::conj(clauses));
    monolithic.route_vars = labels;
    obligations.push(monolithic);

    Ok(obligations)
}

fn time_name(time: &Term) -> Option<String> {
    match time {
        Term::Var(name, _) => Some(name.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rove_net::{NetworkSpec, RouteType};

    fn two_node_network() -> Network {
        let spec: NetworkSpec = serde_json::from_value(serde_json::json!({
            "converge_time": 3,
            "predicates": {
                "reached": {"Arg": "r", "Expr": {"$type": "Var(_)", "Name": "r"}}
            },
            "nodes": {
                "a": {
                    "initial": {"$type": "Bool", "Value": true},
                    "invariant": {"$type": "Globally", "Predicate": "reached"},
                    "assert": "reached"
                },
                "b": {
                    "policies": {"a": {}},
                    "invariant": {"$type": "Finally", "Time": 1, "Then": "reached"},
                    "assert": "reached"
                }
            }
        }))
        .unwrap();
        spec.into_network(RouteType::boolean()).unwrap()
    }

    #[test]
    fn every_node_gets_three_modular_checks_plus_one_monolithic() {
        let obligations = build_obligations(&two_node_network()).unwrap();
        assert_eq!(obligations.len(), 2 * 3 + 1);
        let count = |k: CheckKind| obligations.iter().filter(|o| o.kind == k).count();
        assert_eq!(count(CheckKind::Base), 2);
        assert_eq!(count(CheckKind::Inductive), 2);
        assert_eq!(count(CheckKind::Safety), 2);
        assert_eq!(count(CheckKind::Monolithic), 1);
    }

    #[test]
    fn inductive_obligations_track_neighbor_routes_and_time() {
        let obligations = build_obligations(&two_node_network()).unwrap();
        let inductive_b = obligations
            .iter()
            .find(|o| o.kind == CheckKind::Inductive && o.node.as_deref() == Some("b"))
            .unwrap();
        assert!(inductive_b.route_vars.contains_key("a"));
        let time = inductive_b.time_var.as_ref().unwrap();
        let free = inductive_b.formula.free_vars();
        assert!(free.contains_key(time));
        assert!(free.contains_key(&inductive_b.route_vars["a"]));
    }

    #[test]
    fn base_obligation_of_a_true_initial_route_is_closed() {
        let obligations = build_obligations(&two_node_network()).unwrap();
        let base_a = obligations
            .iter()
            .find(|o| o.kind == CheckKind::Base && o.node.as_deref() == Some("a"))
            .unwrap();
        // No symbolics, concrete initial: the formula folds to a constant
        // false (the check is unrefutable).
        assert_eq!(base_a.formula, Term::Bool(false));
    }

    #[test]
    fn monolithic_covers_every_node() {
        let obligations = build_obligations(&two_node_network()).unwrap();
        let mono = obligations
            .iter()
            .find(|o| o.kind == CheckKind::Monolithic)
            .unwrap();
        assert!(mono.node.is_none());
        assert_eq!(mono.route_vars.len(), 2);
    }
}
