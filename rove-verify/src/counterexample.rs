use std::fmt;

use rove_smt::{Model, Value};

use crate::obligation::{CheckKind, Obligation};

/// A concrete state refuting one obligation, decoded from a solver model
/// through the obligation's metadata.
#[derive(Clone, Debug)]
pub struct Counterexample {
    pub kind: CheckKind,
    pub node: Option<String>,
    /// Label (node or neighbor) and its concrete route.
    pub routes: Vec<(String, Value)>,
    pub time: Option<Value>,
    pub symbolics: Vec<(String, Value)>,
}

impl Counterexample {
    pub fn decode(obligation: &Obligation, model: &Model) -> Counterexample {
        let routes = obligation
            .route_vars
            .iter()
            .filter_map(|(label, var)| {
                model.get(var).map(|v| (label.clone(), v.clone()))
            })
            .collect();
        let time = obligation
            .time_var
            .as_ref()
            .and_then(|var| model.get(var))
            .cloned();
        let symbolics = obligation
            .symbolics
            .iter()
            .filter_map(|name| model.get(name).map(|v| (name.clone(), v.clone())))
            .collect();
        Counterexample {
            kind: obligation.kind,
            node: obligation.node.clone(),
            routes,
            time,
            symbolics,
        }
    }
}

impl fmt::Display for Counterexample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            Some(node) => writeln!(f, "{} check failed at node {node}:", self.kind)?,
            None => writeln!(f, "{} check failed:", self.kind)?,
        }
        for (name, value) in &self.symbolics {
            writeln!(f, "symbolic {name} := {value}")?;
        }
        if let Some(time) = &self.time {
            writeln!(f, "at time := {time}")?;
        }
        for (label, route) in &self.routes {
            match (self.kind, &self.node) {
                (CheckKind::Inductive, Some(node)) => {
                    writeln!(f, "neighbor {label} of {node} had route := {route}")?
                }
                _ => writeln!(f, "node {label} had route := {route}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use rove_smt::Term;

    fn inductive_obligation() -> Obligation {
        let mut route_vars = BTreeMap::new();
        route_vars.insert("a".to_string(), "route-a~1".to_string());
        Obligation {
            kind: CheckKind::Inductive,
            node: Some("b".to_string()),
            formula: Term::Bool(true),
            route_vars,
            time_var: Some("time~0".to_string()),
            symbolics: vec!["dest".to_string()],
        }
    }

    #[test]
    fn decode_pulls_values_through_the_metadata() {
        let model = Model::new()
            .with("route-a~1", Value::Bool(true))
            .with("time~0", Value::Int(4))
            .with("dest", Value::Int(7));
        let cex = Counterexample::decode(&inductive_obligation(), &model);
        assert_eq!(cex.routes, vec![("a".to_string(), Value::Bool(true))]);
        assert_eq!(cex.time, Some(Value::Int(4)));
        assert_eq!(cex.symbolics, vec![("dest".to_string(), Value::Int(7))]);
    }

    #[test]
    fn display_names_the_failing_node_and_neighbors() {
        let model = Model::new()
            .with("route-a~1", Value::Bool(true))
            .with("time~0", Value::Int(4));
        let cex = Counterexample::decode(&inductive_obligation(), &model);
        let text = cex.to_string();
        assert!(text.contains("inductive check failed at node b"));
        assert!(text.contains("at time := 4"));
        assert!(text.contains("neighbor a of b had route := true"));
    }

    #[test]
    fn absent_model_entries_are_skipped() {
        let cex = Counterexample::decode(&inductive_obligation(), &Model::new());
        assert!(cex.routes.is_empty());
        assert!(cex.time.is_none());
    }
}
