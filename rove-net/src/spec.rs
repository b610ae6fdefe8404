//! The on-disk network specification and its compilation into a
//! [`Network`].
//!
//! A file names its nodes, each with an optional initial route expression,
//! per-neighbor import/export policy chains (names into `declarations`),
//! an optional temporal invariant and an optional safety predicate name.
//! An edge `u -> v` exists exactly when `v` lists `u` under `policies`.

use std::collections::BTreeMap;
use std::sync::Arc;

use miette::Diagnostic;
use rove_ast::{AstError, AstFunction, AstPredicate, Env, LoadError, Ty};
use rove_ast::load::Loader;
use rove_smt::Term;
use serde::Deserialize;
use thiserror::Error;

use crate::network::{
    AnnotationFn, Network, NetworkError, PropertyFn, RouteFn,
};
use crate::route::RouteType;
use crate::symbolic::SymbolicParam;
use crate::topology::Topology;

#[derive(Debug, Error, Diagnostic)]
pub enum BuildError {
    #[error("specification is not valid JSON")]
    #[diagnostic(code(rove::net::build))]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Ast(#[from] AstError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Net(#[from] NetworkError),

    #[error("node {node:?} references undeclared function {name:?}")]
    #[diagnostic(code(rove::net::build))]
    UnknownDeclaration { node: String, name: String },

    #[error("node {node:?} names {name:?} as its safety predicate, which is not declared")]
    #[diagnostic(code(rove::net::build))]
    UnknownAssert { node: String, name: String },

    #[error("symbolic {name:?} names {predicate:?} as its constraint, which is not declared")]
    #[diagnostic(code(rove::net::build))]
    UnknownConstraint { name: String, predicate: String },
}

/// Which route datatype a file's policies are written against.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    #[default]
    Bgp,
    Boolean,
}

impl RouteKind {
    pub fn route_type(self) -> RouteType {
        match self {
            RouteKind::Bgp => RouteType::bgp(),
            RouteKind::Boolean => RouteType::boolean(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NetworkSpec {
    #[serde(default)]
    pub route: RouteKind,
    pub nodes: BTreeMap<String, NodeSpec>,
    #[serde(default)]
    pub declarations: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub predicates: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub symbolics: Vec<SymbolicSpec>,
    pub converge_time: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NodeSpec {
    /// Initial route expression; defaults to the route type's default.
    #[serde(default)]
    pub initial: Option<serde_json::Value>,
    /// Keyed by neighbor: having an entry for `u` makes `u` a predecessor.
    #[serde(default)]
    pub policies: BTreeMap<String, EdgePolicy>,
    /// Temporal invariant; defaults to globally-true.
    #[serde(default)]
    pub invariant: Option<serde_json::Value>,
    /// Safety predicate name; defaults to always-true.
    #[serde(default)]
    pub assert: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct EdgePolicy {
    /// Applied on this node when receiving from the neighbor.
    #[serde(default)]
    pub import: Vec<String>,
    /// Applied on this node when sending to the neighbor.
    #[serde(default)]
    pub export: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SymbolicSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    /// Predicate name constraining the parameter.
    #[serde(default)]
    pub constraint: Option<String>,
}

impl NetworkSpec {
    pub fn from_json(text: &str) -> Result<NetworkSpec, BuildError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Compile into a network over the given route type: load every
    /// declaration, compose per-edge transfer chains, resolve temporal
    /// invariants and safety predicates, and bind symbolic parameters
    /// into scope for all of them.
    pub fn into_network(self, route: RouteType) -> Result<Network, BuildError> {
        let loader = Loader::new(route.sort().clone());

        let mut declarations: BTreeMap<String, AstFunction> = BTreeMap::new();
        for (name, json) in &self.declarations {
            declarations.insert(name.clone(), loader.function(json)?);
        }
        let mut predicates: BTreeMap<String, AstPredicate> = BTreeMap::new();
        for (name, json) in &self.predicates {
            predicates.insert(name.clone(), loader.predicate(json)?);
        }

        let mut symbolics = Vec::new();
        let mut globals = Env::new();
        for s in &self.symbolics {
            let sort = Ty::parse(&s.ty)?.sort(route.sort());
            let param = match &s.constraint {
                None => SymbolicParam::new(s.name.clone(), sort),
                Some(pred_name) => {
                    let pred = predicates.get(pred_name).cloned().ok_or_else(|| {
                        BuildError::UnknownConstraint {
                            name: s.name.clone(),
                            predicate: pred_name.clone(),
                        }
                    })?;
                    SymbolicParam::constrained(
                        s.name.clone(),
                        sort,
                        Arc::new(move |v| pred.apply(v.clone())),
                    )
                }
            };
            globals.bind(s.name.clone(), param.var());
            symbolics.push(param);
        }

        let preds = self
            .nodes
            .iter()
            .map(|(v, spec)| (v.clone(), spec.policies.keys().cloned().collect()))
            .collect();
        let topology = Topology::new(preds);

        let chain = |node: &str, names: &[String]| -> Result<AstFunction, BuildError> {
            let mut fs = Vec::with_capacity(names.len());
            for name in names {
                let f = declarations.get(name).cloned().ok_or_else(|| {
                    BuildError::UnknownDeclaration {
                        node: node.to_string(),
                        name: name.clone(),
                    }
                })?;
                fs.push(f);
            }
            Ok(AstFunction::compose_all(fs)?)
        };

        let mut transfer: BTreeMap<(String, String), RouteFn> = BTreeMap::new();
        for (u, v) in topology.edges() {
            let export = match self.nodes.get(u).and_then(|n| n.policies.get(v)) {
                Some(p) => chain(u, &p.export)?,
                None => AstFunction::identity(),
            };
            let import = match self.nodes.get(v).and_then(|n| n.policies.get(u)) {
                Some(p) => chain(v, &p.import)?,
                None => AstFunction::identity(),
            };
            let edge_fn = export.compose(import)?;
            let env = globals.clone();
            transfer.insert(
                (u.to_string(), v.to_string()),
                Arc::new(move |r: &Term| edge_fn.apply_in(&env, r.clone())),
            );
        }

        let mut initial = BTreeMap::new();
        let mut annotations: BTreeMap<String, AnnotationFn> = BTreeMap::new();
        let mut properties: BTreeMap<String, PropertyFn> = BTreeMap::new();
        for (v, spec) in &self.nodes {
            let init = match &spec.initial {
                Some(json) => loader.expr(json)?.evaluate(&globals)?,
                None => route.default_route(),
            };
            initial.insert(v.clone(), init);

            let ann = match &spec.invariant {
                Some(json) => loader.temporal(json)?.resolve(&predicates)?,
                None => rove_ast::Annotation::trivially_true(),
            };
            let env = globals.clone();
            annotations.insert(
                v.clone(),
                Arc::new(move |r: &Term, t: &Term| ann.at(&env, r, t)),
            );

            let prop: PropertyFn = match &spec.assert {
                Some(name) => {
                    let pred = predicates.get(name).cloned().ok_or_else(|| {
                        BuildError::UnknownAssert {
                            node: v.clone(),
                            name: name.clone(),
                        }
                    })?;
                    let env = globals.clone();
                    Arc::new(move |r: &Term| pred.apply_in(&env, r.clone()))
                }
                None => Arc::new(|_: &Term| Ok(Term::Bool(true))),
            };
            properties.insert(v.clone(), prop);
        }

        let merge_route = route.clone();
        Ok(Network::new(
            topology,
            route,
            initial,
            transfer,
            Arc::new(move |a, b| merge_route.merge(a, b)),
            annotations,
            properties,
            symbolics,
            self.converge_time,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rove_smt::{Model, Value};
    use serde_json::json;

    fn reachability_spec() -> serde_json::Value {
        json!({
            "converge_time": 4,
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
                    "invariant": {"$type": "Globally", "Predicate": "reached"},
                    "assert": "reached"
                },
                "b": {
                    "policies": {"a": {"import": ["forward"]}},
                    "invariant": {"$type": "Finally", "Time": 1, "Then": "reached"},
                    "assert": "reached"
                }
            }
        })
    }

    fn build() -> Network {
        let spec: NetworkSpec = serde_json::from_value(reachability_spec()).unwrap();
        spec.into_network(RouteType::boolean()).unwrap()
    }

    #[test]
    fn edges_come_from_policy_entries() {
        let net = build();
        assert_eq!(net.topology().n_edges(), 1);
        assert_eq!(net.topology().predecessors("b"), &["a"]);
        assert!(net.topology().predecessors("a").is_empty());
    }

    #[test]
    fn missing_initial_defaults_to_the_route_default() {
        let net = build();
        assert_eq!(
            net.initial("b").unwrap().eval(&Model::new()).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            net.initial("a").unwrap().eval(&Model::new()).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn transfer_runs_the_composed_policy_chain() {
        let net = build();
        let out = net.transfer("a", "b", &Term::Bool(true)).unwrap();
        assert_eq!(out.eval(&Model::new()).unwrap(), Value::Bool(true));
    }

    #[test]
    fn invariants_resolve_through_the_temporal_layer() {
        let net = build();
        // b's Finally(1, reached) is vacuous at time 0, binding at time 1.
        let vacuous = net
            .annotation("b", &Term::Bool(false), &Term::Int(0))
            .unwrap();
        assert!(vacuous.eval_bool(&Model::new()).unwrap());
        let binding = net
            .annotation("b", &Term::Bool(false), &Term::Int(1))
            .unwrap();
        assert!(!binding.eval_bool(&Model::new()).unwrap());
    }

    #[test]
    fn unknown_policy_name_fails_the_build() {
        let mut spec_json = reachability_spec();
        spec_json["nodes"]["b"]["policies"]["a"]["import"] = json!(["no_such"]);
        let spec: NetworkSpec = serde_json::from_value(spec_json).unwrap();
        let err = spec.into_network(RouteType::boolean()).unwrap_err();
        assert!(matches!(err, BuildError::UnknownDeclaration { name, .. } if name == "no_such"));
    }

    #[test]
    fn symbolic_parameters_are_in_scope_for_initial_routes() {
        let spec_json = json!({
            "converge_time": 2,
            "symbolics": [
                {"name": "seed", "type": "TBool", "constraint": "yes"}
            ],
            "predicates": {
                "yes": {"Arg": "r", "Expr": {"$type": "Var(_)", "Name": "r"}}
            },
            "nodes": {
                "a": {"initial": {"$type": "Var(_)", "Name": "seed"}}
            }
        });
        let spec: NetworkSpec = serde_json::from_value(spec_json).unwrap();
        let net = spec.into_network(RouteType::boolean()).unwrap();
        assert_eq!(
            net.initial("a").unwrap(),
            &Term::var("seed", rove_smt::Sort::Bool)
        );
        let assumptions = net.assumptions().unwrap();
        let model = Model::new().with("seed", Value::Bool(true));
        assert!(assumptions.eval_bool(&model).unwrap());
    }
}
