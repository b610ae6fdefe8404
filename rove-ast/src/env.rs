use std::collections::BTreeMap;

use rove_smt::Term;

/// The mutable state threaded through statement evaluation: variable
/// bindings, the distinguished return slot, and the default policy name.
///
/// Environments are ephemeral; one is created per function application and
/// discarded afterwards.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Env {
    vars: BTreeMap<String, Term>,
    ret: Option<Term>,
    default_policy: Option<String>,
}

impl Env {
    pub fn new() -> Env {
        Env::default()
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Term) {
        self.vars.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: Term) -> Env {
        self.bind(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Term> {
        self.vars.get(name)
    }

    pub fn set_return(&mut self, value: Term) {
        // Last write wins when a path returns more than once.
        self.ret = Some(value);
    }

    pub fn return_value(&self) -> Option<&Term> {
        self.ret.as_ref()
    }

    pub fn take_return(self) -> Option<Term> {
        self.ret
    }

    pub fn set_default_policy(&mut self, name: impl Into<String>) {
        self.default_policy = Some(name.into());
    }

    pub fn default_policy(&self) -> Option<&str> {
        self.default_policy.as_deref()
    }

    /// Merge the environments produced by the two arms of a branch.
    ///
    /// For every key in the union of both domains the result is
    /// `ite(guard, true_value, false_value)`, where a side that never
    /// bound the key falls back to its pre-branch value, so a variable
    /// untouched by one arm survives unmodified whichever way the guard
    /// goes. A key bound by exactly one arm (and absent before the branch)
    /// is kept from the arm that bound it. The return slot joins by the
    /// same rule with the pre-branch return as the placeholder.
    pub fn join(pre: &Env, guard: Term, true_env: Env, false_env: Env) -> Env {
        let mut keys: Vec<String> = true_env.vars.keys().cloned().collect();
        keys.extend(false_env.vars.keys().cloned());
        keys.sort();
        keys.dedup();

        let mut vars = BTreeMap::new();
        for key in keys {
            let t_val = true_env.vars.get(&key).or_else(|| pre.vars.get(&key));
            let f_val = false_env.vars.get(&key).or_else(|| pre.vars.get(&key));
            let joined = match (t_val, f_val) {
                (Some(t), Some(f)) => Term::ite(guard.clone(), t.clone(), f.clone()),
                (Some(t), None) => t.clone(),
                (None, Some(f)) => f.clone(),
                (None, None) => unreachable!("key came from one of the branches"),
            };
            vars.insert(key, joined);
        }

        let ret = match (true_env.ret, false_env.ret) {
            (Some(t), Some(f)) => Some(Term::ite(guard.clone(), t, f)),
            (Some(t), None) => match &pre.ret {
                Some(p) => Some(Term::ite(guard.clone(), t, p.clone())),
                None => Some(t),
            },
            (None, Some(f)) => match &pre.ret {
                Some(p) => Some(Term::ite(guard.clone(), p.clone(), f)),
                None => Some(f),
            },
            (None, None) => pre.ret.clone(),
        };

        let default_policy = true_env
            .default_policy
            .or(false_env.default_policy)
            .or_else(|| pre.default_policy.clone());

        Env {
            vars,
            ret,
            default_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rove_smt::{Model, Sort, Value};

    #[test]
    fn join_produces_identical_key_sets() {
        let guard = Term::var("g", Sort::Bool);
        let pre = Env::new().with("x", Term::Int(1));
        let t = pre.clone().with("y", Term::Int(2));
        let f = pre.clone().with("z", Term::Int(3));
        let joined = Env::join(&pre, guard, t, f);
        assert!(joined.get("x").is_some());
        assert!(joined.get("y").is_some());
        assert!(joined.get("z").is_some());
    }

    #[test]
    fn join_preserves_untouched_variables() {
        let guard = Term::var("g", Sort::Bool);
        let pre = Env::new().with("x", Term::Int(7));
        let mut t = pre.clone();
        t.bind("x", Term::Int(9));
        let f = pre.clone();
        let joined = Env::join(&pre, guard, t, f);

        // false side never wrote x, so under g=false it keeps its old value.
        let model = Model::new().with("g", Value::Bool(false));
        assert_eq!(joined.get("x").unwrap().eval(&model).unwrap(), Value::Int(7));
    }

    #[test]
    fn join_of_one_sided_return_keeps_pre_placeholder() {
        let guard = Term::var("g", Sort::Bool);
        let mut pre = Env::new();
        pre.set_return(Term::Int(0));
        let mut t = pre.clone();
        t.set_return(Term::Int(1));
        let f = pre.clone();
        let joined = Env::join(&pre, guard, t, f);

        let model = Model::new().with("g", Value::Bool(false));
        assert_eq!(
            joined.return_value().unwrap().eval(&model).unwrap(),
            Value::Int(0)
        );
    }
}
