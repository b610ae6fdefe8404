use std::collections::BTreeMap;
use std::sync::Arc;

use miette::Diagnostic;
use rove_ast::AstError;
use rove_smt::Term;
use thiserror::Error;

use crate::route::RouteType;
use crate::symbolic::SymbolicParam;
use crate::topology::Topology;

/// Per-edge transfer over a symbolic route.
pub type RouteFn = Arc<dyn Fn(&Term) -> Result<Term, AstError> + Send + Sync>;
/// Binary route selection.
pub type MergeFn = Arc<dyn Fn(&Term, &Term) -> Term + Send + Sync>;
/// Time-indexed per-node invariant: `(route, time) -> bool`.
pub type AnnotationFn = Arc<dyn Fn(&Term, &Term) -> Result<Term, AstError> + Send + Sync>;
/// Per-node safety property over a route.
pub type PropertyFn = Arc<dyn Fn(&Term) -> Result<Term, AstError> + Send + Sync>;

#[derive(Debug, Error, Diagnostic)]
pub enum NetworkError {
    #[error("{map} is missing an entry for {key:?}")]
    #[diagnostic(code(rove::net))]
    MissingEntry { map: &'static str, key: String },

    #[error("{map} has an entry for {key:?}, which the topology does not contain")]
    #[diagnostic(code(rove::net))]
    ExtraEntry { map: &'static str, key: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Ast(#[from] AstError),
}

/// A compiled network model: immutable once built, with every closure
/// `Send + Sync` so proof obligations can be solved concurrently.
pub struct Network {
    topology: Topology,
    route: RouteType,
    initial: BTreeMap<String, Term>,
    transfer: BTreeMap<(String, String), RouteFn>,
    merge: MergeFn,
    annotations: BTreeMap<String, AnnotationFn>,
    properties: BTreeMap<String, PropertyFn>,
    symbolics: Vec<SymbolicParam>,
    converge_time: i64,
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("topology", &self.topology)
            .field("route", &self.route)
            .field("initial", &self.initial)
            .field("symbolics", &self.symbolics)
            .field("converge_time", &self.converge_time)
            .finish_non_exhaustive()
    }
}

impl Network {
    /// Build a network, checking that the per-node maps cover exactly the
    /// topology's nodes and the transfer map exactly its edges.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        topology: Topology,
        route: RouteType,
        initial: BTreeMap<String, Term>,
        transfer: BTreeMap<(String, String), RouteFn>,
        merge: MergeFn,
        annotations: BTreeMap<String, AnnotationFn>,
        properties: BTreeMap<String, PropertyFn>,
        symbolics: Vec<SymbolicParam>,
        converge_time: i64,
    ) -> Result<Network, NetworkError> {
        for (map, keys) in [
            (
                "initial routes",
                Box::new(initial.keys()) as Box<dyn Iterator<Item = &String>>,
            ),
            ("annotations", Box::new(annotations.keys()) as _),
            ("safety properties", Box::new(properties.keys()) as _),
        ] {
            let keys: Vec<&String> = keys.collect();
            for node in topology.nodes() {
                if !keys.iter().any(|k| *k == node) {
                    return Err(NetworkError::MissingEntry {
                        map,
                        key: node.to_string(),
                    });
                }
            }
            for key in keys {
                if !topology.contains(key) {
                    return Err(NetworkError::ExtraEntry {
                        map,
                        key: key.clone(),
                    });
                }
            }
        }
        for (u, v) in topology.edges() {
            if !transfer.contains_key(&(u.to_string(), v.to_string())) {
                return Err(NetworkError::MissingEntry {
                    map: "transfer functions",
                    key: format!("{u} -> {v}"),
                });
            }
        }
        if transfer.len() != topology.n_edges() {
            let extra = transfer
                .keys()
                .find(|(u, v)| !topology.predecessors(v).contains(u));
            if let Some((u, v)) = extra {
                return Err(NetworkError::ExtraEntry {
                    map: "transfer functions",
                    key: format!("{u} -> {v}"),
                });
            }
        }
        Ok(Network {
            topology,
            route,
            initial,
            transfer,
            merge,
            annotations,
            properties,
            symbolics,
            converge_time,
        })
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn route(&self) -> &RouteType {
        &self.route
    }

    pub fn symbolics(&self) -> &[SymbolicParam] {
        &self.symbolics
    }

    pub fn converge_time(&self) -> i64 {
        self.converge_time
    }

    pub fn initial(&self, node: &str) -> Result<&Term, NetworkError> {
        self.initial
            .get(node)
            .ok_or_else(|| missing("initial routes", node))
    }

    pub fn transfer(&self, u: &str, v: &str, route: &Term) -> Result<Term, NetworkError> {
        let f = self
            .transfer
            .get(&(u.to_string(), v.to_string()))
            .ok_or_else(|| missing("transfer functions", &format!("{u} -> {v}")))?;
        Ok(f(route)?)
    }

    pub fn merge(&self, a: &Term, b: &Term) -> Term {
        (self.merge)(a, b)
    }

    pub fn annotation(&self, node: &str, route: &Term, time: &Term) -> Result<Term, NetworkError> {
        let f = self
            .annotations
            .get(node)
            .ok_or_else(|| missing("annotations", node))?;
        Ok(f(route, time)?)
    }

    pub fn property(&self, node: &str, route: &Term) -> Result<Term, NetworkError> {
        let f = self
            .properties
            .get(node)
            .ok_or_else(|| missing("safety properties", node))?;
        Ok(f(route)?)
    }

    /// The route `node` would select given each predecessor's current
    /// route: its initial route merged with every transferred neighbor
    /// route, folded left-to-right in predecessor order.
    pub fn candidate(
        &self,
        node: &str,
        neighbor_routes: &BTreeMap<String, Term>,
    ) -> Result<Term, NetworkError> {
        let mut selected = self.initial(node)?.clone();
        for u in self.topology.predecessors(node) {
            let incoming = neighbor_routes
                .get(u)
                .ok_or_else(|| missing("neighbor routes", u))?;
            let transferred = self.transfer(u, node, incoming)?;
            selected = self.merge(&selected, &transferred);
        }
        Ok(selected)
    }

    /// The conjunction of every symbolic parameter's constraint.
    pub fn assumptions(&self) -> Result<Term, AstError> {
        let encoded: Result<Vec<Term>, AstError> =
            self.symbolics.iter().map(SymbolicParam::encode).collect();
        Ok(Term::conj(encoded?))
    }
}

fn missing(map: &'static str, key: &str) -> NetworkError {
    NetworkError::MissingEntry {
        map,
        key: key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rove_smt::{Model, Value};

    fn trivial_parts(
        t: &Topology,
    ) -> (
        BTreeMap<String, Term>,
        BTreeMap<(String, String), RouteFn>,
        BTreeMap<String, AnnotationFn>,
        BTreeMap<String, PropertyFn>,
    ) {
        let initial = t.for_all_nodes(|_| Term::Bool(false));
        let transfer: BTreeMap<(String, String), RouteFn> =
            t.for_all_edges(|_, _| Arc::new(|r: &Term| Ok(r.clone())) as RouteFn);
        let annotations: BTreeMap<String, AnnotationFn> = t.for_all_nodes(|_| {
            Arc::new(|_: &Term, _: &Term| Ok(Term::Bool(true))) as AnnotationFn
        });
        let properties: BTreeMap<String, PropertyFn> =
            t.for_all_nodes(|_| Arc::new(|_: &Term| Ok(Term::Bool(true))) as PropertyFn);
        (initial, transfer, annotations, properties)
    }

    fn or_merge() -> MergeFn {
        Arc::new(|a, b| Term::or(a.clone(), b.clone()))
    }

    #[test]
    fn construction_checks_node_coverage() {
        let t = Topology::path(2);
        let (initial, transfer, annotations, properties) = trivial_parts(&t);
        let mut missing = initial.clone();
        missing.remove("n1");
        let err = Network::new(
            t,
            RouteType::boolean(),
            missing,
            transfer,
            or_merge(),
            annotations,
            properties,
            Vec::new(),
            5,
        )
        .unwrap_err();
        assert!(matches!(err, NetworkError::MissingEntry { key, .. } if key == "n1"));
    }

    #[test]
    fn construction_checks_edge_coverage() {
        let t = Topology::path(2);
        let (initial, mut transfer, annotations, properties) = trivial_parts(&t);
        transfer.insert(
            ("n1".to_string(), "n1".to_string()),
            Arc::new(|r: &Term| Ok(r.clone())),
        );
        let err = Network::new(
            t,
            RouteType::boolean(),
            initial,
            transfer,
            or_merge(),
            annotations,
            properties,
            Vec::new(),
            5,
        )
        .unwrap_err();
        assert!(matches!(err, NetworkError::ExtraEntry { .. }));
    }

    #[test]
    fn candidate_folds_initial_with_transferred_routes() {
        let t = Topology::path(2);
        let (mut initial, transfer, annotations, properties) = trivial_parts(&t);
        initial.insert("n0".to_string(), Term::Bool(true));
        let net = Network::new(
            t,
            RouteType::boolean(),
            initial,
            transfer,
            or_merge(),
            annotations,
            properties,
            Vec::new(),
            5,
        )
        .unwrap();

        let mut routes = BTreeMap::new();
        routes.insert("n0".to_string(), Term::Bool(true));
        routes.insert("n1".to_string(), Term::Bool(false));
        let candidate = net.candidate("n1", &routes).unwrap();
        assert_eq!(
            candidate.eval(&Model::new()).unwrap(),
            Value::Bool(true)
        );
        let nobody = net
            .candidate(
                "n1",
                &routes
                    .iter()
                    .map(|(k, _)| (k.clone(), Term::Bool(false)))
                    .collect(),
            )
            .unwrap();
        assert_eq!(nobody.eval(&Model::new()).unwrap(), Value::Bool(false));
    }

    #[test]
    fn lookups_outside_the_topology_return_errors() {
        let t = Topology::path(2);
        let (initial, transfer, annotations, properties) = trivial_parts(&t);
        let net = Network::new(
            t,
            RouteType::boolean(),
            initial,
            transfer,
            or_merge(),
            annotations,
            properties,
            Vec::new(),
            5,
        )
        .unwrap();

        assert!(matches!(
            net.initial("n9"),
            Err(NetworkError::MissingEntry { key, .. }) if key == "n9"
        ));
        assert!(matches!(
            net.annotation("n9", &Term::Bool(true), &Term::Int(0)),
            Err(NetworkError::MissingEntry { .. })
        ));
        assert!(matches!(
            net.property("n9", &Term::Bool(true)),
            Err(NetworkError::MissingEntry { .. })
        ));
        assert!(matches!(
            net.transfer("n0", "n9", &Term::Bool(true)),
            Err(NetworkError::MissingEntry { .. })
        ));
        // A neighbor map that skips a predecessor is caught too.
        assert!(matches!(
            net.candidate("n1", &BTreeMap::new()),
            Err(NetworkError::MissingEntry { map, .. }) if map == "neighbor routes"
        ));
    }
}
