use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use thiserror::Error;

use crate::sort::Sort;
use crate::term::Term;

/// A concrete value, mirroring [`Sort`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
    Unit,
    Option(Option<Box<Value>>),
    Pair(Box<Value>, Box<Value>),
    Set(BTreeSet<String>),
    Record(BTreeMap<String, Value>),
}

impl Value {
    /// The all-zero value of a sort; what [`Term::default_of`] evaluates to.
    pub fn default_of(sort: &Sort) -> Value {
        match sort {
            Sort::Bool => Value::Bool(false),
            Sort::Int => Value::Int(0),
            Sort::Str => Value::Str(String::new()),
            Sort::Unit => Value::Unit,
            Sort::Option(_) => Value::Option(None),
            Sort::Pair(a, b) => Value::Pair(
                Box::new(Value::default_of(a)),
                Box::new(Value::default_of(b)),
            ),
            Sort::Set => Value::Set(BTreeSet::new()),
            Sort::Record(fields) => Value::Record(
                fields
                    .iter()
                    .map(|(n, s)| (n.clone(), Value::default_of(s)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Unit => write!(f, "()"),
            Value::Option(None) => write!(f, "none"),
            Value::Option(Some(v)) => write!(f, "some({v})"),
            Value::Pair(a, b) => write!(f, "({a}, {b})"),
            Value::Set(elems) => {
                write!(f, "{{")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e:?}")?;
                }
                write!(f, "}}")
            }
            Value::Record(fields) => {
                write!(f, "{{")?;
                for (i, (name, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// An assignment of concrete values to symbolic constants: a satisfying
/// model returned by a backend, or a hand-built model in tests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Model {
    values: BTreeMap<String, Value>,
}

impl Model {
    pub fn new() -> Model {
        Model::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Model {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

#[derive(Debug, Error, miette::Diagnostic)]
#[diagnostic(code(rove::smt::eval))]
pub enum EvalModelError {
    #[error("model assigns no value to symbolic constant {name:?}")]
    UnassignedVar { name: String },

    #[error("model evaluation applied {operation} to an ill-sorted value")]
    IllSorted { operation: &'static str },
}

impl Term {
    /// Evaluate this term to a concrete value under the given model.
    ///
    /// Free variables missing from the model are an error: callers decode
    /// solver models (which assign every free variable of the query) or
    /// supply complete models in tests.
    pub fn eval(&self, model: &Model) -> Result<Value, EvalModelError> {
        match self {
            Term::Var(name, _) => model
                .get(name)
                .cloned()
                .ok_or_else(|| EvalModelError::UnassignedVar { name: name.clone() }),
            Term::Bool(b) => Ok(Value::Bool(*b)),
            Term::Int(n) => Ok(Value::Int(*n)),
            Term::Str(s) => Ok(Value::Str(s.clone())),
            Term::Unit => Ok(Value::Unit),

            Term::Not(t) => Ok(Value::Bool(!t.eval_bool(model)?)),
            Term::And(a, b) => Ok(Value::Bool(a.eval_bool(model)? && b.eval_bool(model)?)),
            Term::Or(a, b) => Ok(Value::Bool(a.eval_bool(model)? || b.eval_bool(model)?)),
            Term::Implies(a, b) => Ok(Value::Bool(!a.eval_bool(model)? || b.eval_bool(model)?)),
            Term::Ite(c, t, e) => {
                if c.eval_bool(model)? {
                    t.eval(model)
                } else {
                    e.eval(model)
                }
            }

            Term::Add(a, b) => Ok(Value::Int(
                a.eval_int(model)?.wrapping_add(b.eval_int(model)?),
            )),
            Term::Lt(a, b) => Ok(Value::Bool(a.eval_int(model)? < b.eval_int(model)?)),
            Term::Le(a, b) => Ok(Value::Bool(a.eval_int(model)? <= b.eval_int(model)?)),
            Term::Eq(a, b) => Ok(Value::Bool(a.eval(model)? == b.eval(model)?)),

            Term::Pair(a, b) => Ok(Value::Pair(
                Box::new(a.eval(model)?),
                Box::new(b.eval(model)?),
            )),
            Term::First(t) => match t.eval(model)? {
                Value::Pair(a, _) => Ok(*a),
                _ => Err(EvalModelError::IllSorted { operation: "first" }),
            },
            Term::Second(t) => match t.eval(model)? {
                Value::Pair(_, b) => Ok(*b),
                _ => Err(EvalModelError::IllSorted { operation: "second" }),
            },

            Term::SomeOf(t) => Ok(Value::Option(Some(Box::new(t.eval(model)?)))),
            Term::NoneOf(_) => Ok(Value::Option(None)),
            Term::IsSome(t) => match t.eval(model)? {
                Value::Option(opt) => Ok(Value::Bool(opt.is_some())),
                _ => Err(EvalModelError::IllSorted { operation: "is-some" }),
            },
            Term::Unwrap(t) => {
                let payload_sort = match t.sort() {
                    Ok(Sort::Option(inner)) => *inner,
                    _ => return Err(EvalModelError::IllSorted { operation: "unwrap" }),
                };
                match t.eval(model)? {
                    Value::Option(Some(v)) => Ok(*v),
                    Value::Option(None) => Ok(Value::default_of(&payload_sort)),
                    _ => Err(EvalModelError::IllSorted { operation: "unwrap" }),
                }
            }

            Term::Record(fields) => {
                let mut out = BTreeMap::new();
                for (name, t) in fields {
                    out.insert(name.clone(), t.eval(model)?);
                }
                Ok(Value::Record(out))
            }
            Term::GetField(t, field) => match t.eval(model)? {
                Value::Record(fields) => fields
                    .get(field)
                    .cloned()
                    .ok_or(EvalModelError::IllSorted {
                        operation: "get-field",
                    }),
                _ => Err(EvalModelError::IllSorted {
                    operation: "get-field",
                }),
            },
            Term::WithField(t, field, value) => match t.eval(model)? {
                Value::Record(mut fields) => {
                    fields.insert(field.clone(), value.eval(model)?);
                    Ok(Value::Record(fields))
                }
                _ => Err(EvalModelError::IllSorted {
                    operation: "with-field",
                }),
            },

            Term::EmptySet => Ok(Value::Set(BTreeSet::new())),
            Term::SetAdd(set, element) => {
                let mut s = set.eval_set(model)?;
                s.insert(element.eval_str(model)?);
                Ok(Value::Set(s))
            }
            Term::SetContains(set, element) => {
                let s = set.eval_set(model)?;
                Ok(Value::Bool(s.contains(&element.eval_str(model)?)))
            }
            Term::SetUnion(a, b) => {
                let mut s = a.eval_set(model)?;
                s.extend(b.eval_set(model)?);
                Ok(Value::Set(s))
            }
        }
    }

    /// Evaluate an expected-boolean term; convenience for tests and decoders.
    pub fn eval_bool(&self, model: &Model) -> Result<bool, EvalModelError> {
        match self.eval(model)? {
            Value::Bool(b) => Ok(b),
            _ => Err(EvalModelError::IllSorted { operation: "bool" }),
        }
    }

    fn eval_int(&self, model: &Model) -> Result<i64, EvalModelError> {
        match self.eval(model)? {
            Value::Int(n) => Ok(n),
            _ => Err(EvalModelError::IllSorted { operation: "int" }),
        }
    }

    fn eval_str(&self, model: &Model) -> Result<String, EvalModelError> {
        match self.eval(model)? {
            Value::Str(s) => Ok(s),
            _ => Err(EvalModelError::IllSorted { operation: "string" }),
        }
    }

    fn eval_set(&self, model: &Model) -> Result<BTreeSet<String>, EvalModelError> {
        match self.eval(model)? {
            Value::Set(s) => Ok(s),
            _ => Err(EvalModelError::IllSorted { operation: "set" }),
        }
    }
}
