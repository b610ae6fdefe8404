#![forbid(unsafe_code)]

use miette::Diagnostic;
use thiserror::Error;

use crate::term::Term;
use crate::value::Model;

/// The outcome of a single solver call.
///
/// `Unknown` (timeout, or the solver gave up) is a first-class outcome and
/// must never be collapsed into `Unsat` by callers.
#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    Unsat,
    Sat(Model),
    Unknown,
}

#[derive(Debug, Error, Diagnostic)]
#[diagnostic(code(rove::smt::solver))]
pub enum SolverError {
    #[error(
        "no SMT backend is enabled; rebuild with `--features rove-smt/z3` (requires libz3)"
    )]
    BackendUnavailable,

    #[error("failed to lower formula for the solver: {message}")]
    Lowering { message: String },

    #[error("solver reported SAT but produced no model")]
    MissingModel,
}

/// An external SMT solving backend.
///
/// Each call is atomic and stateless; callers may issue calls from many
/// threads at once, so implementations must not share mutable solver state.
pub trait SmtBackend: Send + Sync {
    /// Decide satisfiability of a boolean `formula` within `timeout_ms`.
    fn solve(&self, formula: &Term, timeout_ms: u32) -> Result<Verdict, SolverError>;
}

/// Solver effort presets, mapped to per-query timeouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SmtProfile {
    /// Low timeouts for interactive runs.
    Fast,
    /// CI-friendly medium timeouts.
    Ci,
    /// High timeouts for large topologies.
    Thorough,
}

impl SmtProfile {
    pub fn timeout_ms(self) -> u32 {
        match self {
            SmtProfile::Fast => 1_000,
            SmtProfile::Ci => 5_000,
            SmtProfile::Thorough => 30_000,
        }
    }
}

/// Fallback backend when compiled without `--features rove-smt/z3`.
///
/// This keeps the workspace buildable on machines without Z3.
pub struct UnavailableBackend;

impl SmtBackend for UnavailableBackend {
    fn solve(&self, _formula: &Term, _timeout_ms: u32) -> Result<Verdict, SolverError> {
        Err(SolverError::BackendUnavailable)
    }
}

#[cfg(feature = "z3")]
pub mod z3_backend {
    use std::collections::{BTreeSet, HashMap};

    use z3::ast::{Ast, Bool, Int};
    use z3::{Config, Context, Params, SatResult, Solver};

    use super::{SmtBackend, SolverError, Verdict};
    use crate::sort::Sort;
    use crate::term::Term;
    use crate::value::{Model, Value};

    /// Z3-powered backend.
    ///
    /// Every `solve` call builds its own Z3 context, so the backend itself
    /// is freely shared across the verifier's worker threads.
    pub struct Z3Backend;

    impl Z3Backend {
        pub fn new() -> Z3Backend {
            Z3Backend
        }
    }

    impl Default for Z3Backend {
        fn default() -> Z3Backend {
            Z3Backend::new()
        }
    }

    impl SmtBackend for Z3Backend {
        fn solve(&self, formula: &Term, timeout_ms: u32) -> Result<Verdict, SolverError> {
            let cfg = Config::new();
            let ctx = Context::new(&cfg);

            // The universe holds the formula's string literals plus one
            // slot per free string leaf, so a symbolic string can always
            // denote a value distinct from every literal and still be
            // representable in set membership flags.
            let mut universe = formula.string_literals();
            for (name, sort) in formula.free_vars() {
                reserve_string_slots(&mut universe, &name, &sort);
            }
            let mut lowerer = Lowerer::new(&ctx, universe);
            let lowered = lowerer.lower(formula)?;
            let assertion = lowered.into_bool("query formula")?;

            let solver = Solver::new(&ctx);
            let mut params = Params::new(&ctx);
            params.set_u32("timeout", timeout_ms);
            solver.set_params(&params);
            solver.assert(&assertion);
            for range in &lowerer.constraints {
                solver.assert(range);
            }

            match solver.check() {
                SatResult::Unsat => Ok(Verdict::Unsat),
                SatResult::Unknown => Ok(Verdict::Unknown),
                SatResult::Sat => {
                    let model = solver.get_model().ok_or(SolverError::MissingModel)?;
                    let mut out = Model::new();
                    for (name, _) in formula.free_vars() {
                        let lowered = lowerer.vars.get(&name).ok_or_else(|| {
                            lowering(format!("free variable {name:?} was never lowered"))
                        })?;
                        let value = lowerer.decode(&model, lowered)?;
                        out.insert(name, value);
                    }
                    Ok(Verdict::Sat(out))
                }
            }
        }
    }

    /// A term lowered to Z3 ASTs: options become a presence flag plus
    /// payload, pairs/records flatten component-wise, strings are interned
    /// into integer codes, and sets become membership flags over the
    /// universe of the query's string literals plus one reserved slot per
    /// free string leaf.
    #[derive(Clone, Debug)]
    enum Lowered<'ctx> {
        Bool(Bool<'ctx>),
        Int(Int<'ctx>),
        /// An interned string code.
        Str(Int<'ctx>),
        Unit,
        Option {
            present: Bool<'ctx>,
            payload: Box<Lowered<'ctx>>,
        },
        Pair(Box<Lowered<'ctx>>, Box<Lowered<'ctx>>),
        /// Membership flags, indexed like the universe.
        Set(Vec<Bool<'ctx>>),
        Record(Vec<(String, Lowered<'ctx>)>),
    }

    impl<'ctx> Lowered<'ctx> {
        fn into_bool(self, context: &str) -> Result<Bool<'ctx>, SolverError> {
            match self {
                Lowered::Bool(b) => Ok(b),
                other => Err(lowering(format!(
                    "expected a boolean in {context}, found {other:?}"
                ))),
            }
        }

        fn as_bool(&self, context: &str) -> Result<&Bool<'ctx>, SolverError> {
            match self {
                Lowered::Bool(b) => Ok(b),
                other => Err(lowering(format!(
                    "expected a boolean in {context}, found {other:?}"
                ))),
            }
        }

        fn as_int(&self, context: &str) -> Result<&Int<'ctx>, SolverError> {
            match self {
                Lowered::Int(n) => Ok(n),
                other => Err(lowering(format!(
                    "expected an integer in {context}, found {other:?}"
                ))),
            }
        }
    }

    /// Appends a universe slot for every string leaf in `sort`, named by
    /// its flattened path under `path`.
    fn reserve_string_slots(universe: &mut Vec<String>, path: &str, sort: &Sort) {
        match sort {
            Sort::Str => {
                let mut slot = path.to_string();
                while universe.contains(&slot) {
                    slot.push('\'');
                }
                universe.push(slot);
            }
            Sort::Option(inner) => {
                reserve_string_slots(universe, &format!("{path}.val"), inner);
            }
            Sort::Pair(a, b) => {
                reserve_string_slots(universe, &format!("{path}.fst"), a);
                reserve_string_slots(universe, &format!("{path}.snd"), b);
            }
            Sort::Record(fields) => {
                for (field, s) in fields {
                    reserve_string_slots(universe, &format!("{path}.{field}"), s);
                }
            }
            _ => {}
        }
    }

    struct Lowerer<'ctx> {
        ctx: &'ctx Context,
        universe: Vec<String>,
        codes: HashMap<String, i64>,
        vars: HashMap<String, Lowered<'ctx>>,
        /// Range assertions keeping every symbolic string code inside the
        /// universe.
        constraints: Vec<Bool<'ctx>>,
    }

    impl<'ctx> Lowerer<'ctx> {
        fn new(ctx: &'ctx Context, universe: Vec<String>) -> Self {
            let codes = universe
                .iter()
                .enumerate()
                .map(|(i, s)| (s.clone(), i as i64))
                .collect();
            Self {
                ctx,
                universe,
                codes,
                vars: HashMap::new(),
                constraints: Vec::new(),
            }
        }

        fn lower(&mut self, term: &Term) -> Result<Lowered<'ctx>, SolverError> {
            match term {
                Term::Var(name, sort) => {
                    if let Some(existing) = self.vars.get(name) {
                        return Ok(existing.clone());
                    }
                    let fresh = self.fresh(name, sort);
                    self.vars.insert(name.clone(), fresh.clone());
                    Ok(fresh)
                }
                Term::Bool(b) => Ok(Lowered::Bool(Bool::from_bool(self.ctx, *b))),
                Term::Int(n) => Ok(Lowered::Int(Int::from_i64(self.ctx, *n))),
                Term::Str(s) => {
                    let code = *self
                        .codes
                        .get(s)
                        .ok_or_else(|| lowering(format!("string literal {s:?} not interned")))?;
                    Ok(Lowered::Str(Int::from_i64(self.ctx, code)))
                }
                Term::Unit => Ok(Lowered::Unit),

                Term::Not(t) => {
                    let b = self.lower(t)?.into_bool("not")?;
                    Ok(Lowered::Bool(b.not()))
                }
                Term::And(a, b) => {
                    let a = self.lower(a)?.into_bool("and")?;
                    let b = self.lower(b)?.into_bool("and")?;
                    Ok(Lowered::Bool(Bool::and(self.ctx, &[&a, &b])))
                }
                Term::Or(a, b) => {
                    let a = self.lower(a)?.into_bool("or")?;
                    let b = self.lower(b)?.into_bool("or")?;
                    Ok(Lowered::Bool(Bool::or(self.ctx, &[&a, &b])))
                }
                Term::Implies(a, b) => {
                    let a = self.lower(a)?.into_bool("implies")?;
                    let b = self.lower(b)?.into_bool("implies")?;
                    Ok(Lowered::Bool(a.implies(&b)))
                }
                Term::Ite(c, t, e) => {
                    let c = self.lower(c)?.into_bool("ite condition")?;
                    let t = self.lower(t)?;
                    let e = self.lower(e)?;
                    self.ite(&c, &t, &e)
                }

                Term::Add(a, b) => {
                    let a = self.lower(a)?;
                    let b = self.lower(b)?;
                    Ok(Lowered::Int(Int::add(
                        self.ctx,
                        &[a.as_int("plus")?, b.as_int("plus")?],
                    )))
                }
                Term::Lt(a, b) => {
                    let a = self.lower(a)?;
                    let b = self.lower(b)?;
                    Ok(Lowered::Bool(a.as_int("lt")?.lt(b.as_int("lt")?)))
                }
                Term::Le(a, b) => {
                    let a = self.lower(a)?;
                    let b = self.lower(b)?;
                    Ok(Lowered::Bool(a.as_int("le")?.le(b.as_int("le")?)))
                }
                Term::Eq(a, b) => {
                    let a = self.lower(a)?;
                    let b = self.lower(b)?;
                    self.eq(&a, &b)
                }

                Term::Pair(a, b) => Ok(Lowered::Pair(
                    Box::new(self.lower(a)?),
                    Box::new(self.lower(b)?),
                )),
                Term::First(t) => match self.lower(t)? {
                    Lowered::Pair(a, _) => Ok(*a),
                    other => Err(lowering(format!("first of non-pair {other:?}"))),
                },
                Term::Second(t) => match self.lower(t)? {
                    Lowered::Pair(_, b) => Ok(*b),
                    other => Err(lowering(format!("second of non-pair {other:?}"))),
                },

                Term::SomeOf(t) => Ok(Lowered::Option {
                    present: Bool::from_bool(self.ctx, true),
                    payload: Box::new(self.lower(t)?),
                }),
                Term::NoneOf(sort) => Ok(Lowered::Option {
                    present: Bool::from_bool(self.ctx, false),
                    payload: Box::new(self.lower(&Term::default_of(sort))?),
                }),
                Term::IsSome(t) => match self.lower(t)? {
                    Lowered::Option { present, .. } => Ok(Lowered::Bool(present)),
                    other => Err(lowering(format!("is-some of non-option {other:?}"))),
                },
                Term::Unwrap(t) => {
                    let payload_sort = match t.sort() {
                        Ok(Sort::Option(inner)) => *inner,
                        other => {
                            return Err(lowering(format!("unwrap of non-option sort {other:?}")));
                        }
                    };
                    match self.lower(t)? {
                        Lowered::Option { present, payload } => {
                            let default = self.lower(&Term::default_of(&payload_sort))?;
                            self.ite(&present, &payload, &default)
                        }
                        other => Err(lowering(format!("unwrap of non-option {other:?}"))),
                    }
                }

                Term::Record(fields) => {
                    let mut out = Vec::with_capacity(fields.len());
                    for (name, t) in fields {
                        out.push((name.clone(), self.lower(t)?));
                    }
                    Ok(Lowered::Record(out))
                }
                Term::GetField(t, field) => match self.lower(t)? {
                    Lowered::Record(fields) => fields
                        .into_iter()
                        .find(|(n, _)| n == field)
                        .map(|(_, v)| v)
                        .ok_or_else(|| lowering(format!("no field {field:?}"))),
                    other => Err(lowering(format!("get-field of non-record {other:?}"))),
                },
                Term::WithField(t, field, value) => {
                    let value = self.lower(value)?;
                    match self.lower(t)? {
                        Lowered::Record(mut fields) => {
                            let slot = fields
                                .iter_mut()
                                .find(|(n, _)| n == field)
                                .ok_or_else(|| lowering(format!("no field {field:?}")))?;
                            slot.1 = value;
                            Ok(Lowered::Record(fields))
                        }
                        other => Err(lowering(format!("with-field of non-record {other:?}"))),
                    }
                }

                Term::EmptySet => {
                    let flags = self
                        .universe
                        .iter()
                        .map(|_| Bool::from_bool(self.ctx, false))
                        .collect();
                    Ok(Lowered::Set(flags))
                }
                Term::SetAdd(set, element) => {
                    let flags = self.lower_set(set)?;
                    let code = self.lower_str(element)?;
                    let updated = flags
                        .into_iter()
                        .enumerate()
                        .map(|(i, flag)| {
                            let here = code._eq(&Int::from_i64(self.ctx, i as i64));
                            Bool::or(self.ctx, &[&flag, &here])
                        })
                        .collect();
                    Ok(Lowered::Set(updated))
                }
                Term::SetContains(set, element) => {
                    let flags = self.lower_set(set)?;
                    let code = self.lower_str(element)?;
                    let hits: Vec<Bool<'ctx>> = flags
                        .into_iter()
                        .enumerate()
                        .map(|(i, flag)| {
                            let here = code._eq(&Int::from_i64(self.ctx, i as i64));
                            Bool::and(self.ctx, &[&flag, &here])
                        })
                        .collect();
                    Ok(Lowered::Bool(self.or_all(&hits)))
                }
                Term::SetUnion(a, b) => {
                    let a = self.lower_set(a)?;
                    let b = self.lower_set(b)?;
                    let joined = a
                        .into_iter()
                        .zip(b)
                        .map(|(x, y)| Bool::or(self.ctx, &[&x, &y]))
                        .collect();
                    Ok(Lowered::Set(joined))
                }
            }
        }

        fn lower_set(&mut self, term: &Term) -> Result<Vec<Bool<'ctx>>, SolverError> {
            match self.lower(term)? {
                Lowered::Set(flags) => Ok(flags),
                other => Err(lowering(format!("expected a set, found {other:?}"))),
            }
        }

        fn lower_str(&mut self, term: &Term) -> Result<Int<'ctx>, SolverError> {
            match self.lower(term)? {
                Lowered::Str(code) => Ok(code),
                other => Err(lowering(format!("expected a string, found {other:?}"))),
            }
        }

        /// A fresh Z3 constant (or bundle of constants) for a named free
        /// variable, flattened by sort.
        fn fresh(&mut self, name: &str, sort: &Sort) -> Lowered<'ctx> {
            match sort {
                Sort::Bool => Lowered::Bool(Bool::new_const(self.ctx, name)),
                Sort::Int => Lowered::Int(Int::new_const(self.ctx, name)),
                Sort::Str => {
                    let code = Int::new_const(self.ctx, name);
                    // Membership tests enumerate the universe, so the
                    // code must land on one of its slots.
                    self.constraints.push(code.ge(&Int::from_i64(self.ctx, 0)));
                    self.constraints.push(
                        code.lt(&Int::from_i64(self.ctx, self.universe.len() as i64)),
                    );
                    Lowered::Str(code)
                }
                Sort::Unit => Lowered::Unit,
                Sort::Option(inner) => Lowered::Option {
                    present: Bool::new_const(self.ctx, format!("{name}.some")),
                    payload: Box::new(self.fresh(&format!("{name}.val"), inner)),
                },
                Sort::Pair(a, b) => Lowered::Pair(
                    Box::new(self.fresh(&format!("{name}.fst"), a)),
                    Box::new(self.fresh(&format!("{name}.snd"), b)),
                ),
                Sort::Set => Lowered::Set(
                    self.universe
                        .iter()
                        .map(|elem| Bool::new_const(self.ctx, format!("{name}.has.{elem}")))
                        .collect(),
                ),
                Sort::Record(fields) => Lowered::Record(
                    fields
                        .iter()
                        .map(|(field, s)| {
                            (field.clone(), self.fresh(&format!("{name}.{field}"), s))
                        })
                        .collect(),
                ),
            }
        }

        /// Component-wise ite over lowered values.
        fn ite(
            &self,
            cond: &Bool<'ctx>,
            then_v: &Lowered<'ctx>,
            else_v: &Lowered<'ctx>,
        ) -> Result<Lowered<'ctx>, SolverError> {
            match (then_v, else_v) {
                (Lowered::Bool(t), Lowered::Bool(e)) => Ok(Lowered::Bool(cond.ite(t, e))),
                (Lowered::Int(t), Lowered::Int(e)) => Ok(Lowered::Int(cond.ite(t, e))),
                (Lowered::Str(t), Lowered::Str(e)) => Ok(Lowered::Str(cond.ite(t, e))),
                (Lowered::Unit, Lowered::Unit) => Ok(Lowered::Unit),
                (
                    Lowered::Option {
                        present: tp,
                        payload: tv,
                    },
                    Lowered::Option {
                        present: ep,
                        payload: ev,
                    },
                ) => Ok(Lowered::Option {
                    present: cond.ite(tp, ep),
                    payload: Box::new(self.ite(cond, tv, ev)?),
                }),
                (Lowered::Pair(ta, tb), Lowered::Pair(ea, eb)) => Ok(Lowered::Pair(
                    Box::new(self.ite(cond, ta, ea)?),
                    Box::new(self.ite(cond, tb, eb)?),
                )),
                (Lowered::Set(t), Lowered::Set(e)) => Ok(Lowered::Set(
                    t.iter().zip(e).map(|(a, b)| cond.ite(a, b)).collect(),
                )),
                (Lowered::Record(t), Lowered::Record(e)) => {
                    let mut out = Vec::with_capacity(t.len());
                    for ((name, tv), (_, ev)) in t.iter().zip(e) {
                        out.push((name.clone(), self.ite(cond, tv, ev)?));
                    }
                    Ok(Lowered::Record(out))
                }
                (t, e) => Err(lowering(format!("ite over mismatched shapes {t:?} / {e:?}"))),
            }
        }

        /// Structural equality over lowered values.
        fn eq(
            &self,
            a: &Lowered<'ctx>,
            b: &Lowered<'ctx>,
        ) -> Result<Lowered<'ctx>, SolverError> {
            let b = self.eq_bool(a, b)?;
            Ok(Lowered::Bool(b))
        }

        fn eq_bool(
            &self,
            a: &Lowered<'ctx>,
            b: &Lowered<'ctx>,
        ) -> Result<Bool<'ctx>, SolverError> {
            match (a, b) {
                (Lowered::Bool(x), Lowered::Bool(y)) => Ok(x._eq(y)),
                (Lowered::Int(x), Lowered::Int(y)) => Ok(x._eq(y)),
                (Lowered::Str(x), Lowered::Str(y)) => Ok(x._eq(y)),
                (Lowered::Unit, Lowered::Unit) => Ok(Bool::from_bool(self.ctx, true)),
                (
                    Lowered::Option {
                        present: xp,
                        payload: xv,
                    },
                    Lowered::Option {
                        present: yp,
                        payload: yv,
                    },
                ) => {
                    // Present flags must match; payloads only matter when present.
                    let same_presence = xp._eq(yp);
                    let same_payload = xp.implies(&self.eq_bool(xv, yv)?);
                    Ok(Bool::and(self.ctx, &[&same_presence, &same_payload]))
                }
                (Lowered::Pair(xa, xb), Lowered::Pair(ya, yb)) => {
                    let fst = self.eq_bool(xa, ya)?;
                    let snd = self.eq_bool(xb, yb)?;
                    Ok(Bool::and(self.ctx, &[&fst, &snd]))
                }
                (Lowered::Set(x), Lowered::Set(y)) => {
                    let parts: Vec<Bool<'ctx>> =
                        x.iter().zip(y).map(|(f, g)| f._eq(g)).collect();
                    Ok(self.and_all(&parts))
                }
                (Lowered::Record(x), Lowered::Record(y)) => {
                    let mut parts = Vec::with_capacity(x.len());
                    for ((_, xv), (_, yv)) in x.iter().zip(y) {
                        parts.push(self.eq_bool(xv, yv)?);
                    }
                    Ok(self.and_all(&parts))
                }
                (a, b) => Err(lowering(format!(
                    "equality over mismatched shapes {a:?} / {b:?}"
                ))),
            }
        }

        /// Decode a lowered variable back into a concrete [`Value`].
        fn decode(
            &self,
            model: &z3::Model<'ctx>,
            lowered: &Lowered<'ctx>,
        ) -> Result<Value, SolverError> {
            match lowered {
                Lowered::Bool(b) => {
                    let v = model.eval(b, true).and_then(|x| x.as_bool());
                    Ok(Value::Bool(v.unwrap_or(false)))
                }
                Lowered::Int(n) => {
                    let v = model.eval(n, true).and_then(|x| x.as_i64());
                    Ok(Value::Int(v.unwrap_or(0)))
                }
                Lowered::Str(code) => {
                    let v = model.eval(code, true).and_then(|x| x.as_i64()).unwrap_or(0);
                    let s = usize::try_from(v)
                        .ok()
                        .and_then(|i| self.universe.get(i).cloned())
                        .unwrap_or_else(|| format!("str#{v}"));
                    Ok(Value::Str(s))
                }
                Lowered::Unit => Ok(Value::Unit),
                Lowered::Option { present, payload } => {
                    let p = model.eval(present, true).and_then(|x| x.as_bool());
                    if p.unwrap_or(false) {
                        Ok(Value::Option(Some(Box::new(self.decode(model, payload)?))))
                    } else {
                        Ok(Value::Option(None))
                    }
                }
                Lowered::Pair(a, b) => Ok(Value::Pair(
                    Box::new(self.decode(model, a)?),
                    Box::new(self.decode(model, b)?),
                )),
                Lowered::Set(flags) => {
                    let mut elems = BTreeSet::new();
                    for (i, flag) in flags.iter().enumerate() {
                        let member = model.eval(flag, true).and_then(|x| x.as_bool());
                        if member.unwrap_or(false) {
                            elems.insert(self.universe[i].clone());
                        }
                    }
                    Ok(Value::Set(elems))
                }
                Lowered::Record(fields) => {
                    let mut out = std::collections::BTreeMap::new();
                    for (name, v) in fields {
                        out.insert(name.clone(), self.decode(model, v)?);
                    }
                    Ok(Value::Record(out))
                }
            }
        }
    }

    impl<'ctx> Lowerer<'ctx> {
        // Z3's variadic and/or reject empty argument lists.
        fn and_all(&self, parts: &[Bool<'ctx>]) -> Bool<'ctx> {
            if parts.is_empty() {
                return Bool::from_bool(self.ctx, true);
            }
            let refs: Vec<&Bool<'ctx>> = parts.iter().collect();
            Bool::and(self.ctx, &refs)
        }

        fn or_all(&self, parts: &[Bool<'ctx>]) -> Bool<'ctx> {
            if parts.is_empty() {
                return Bool::from_bool(self.ctx, false);
            }
            let refs: Vec<&Bool<'ctx>> = parts.iter().collect();
            Bool::or(self.ctx, &refs)
        }
    }

    fn lowering(message: String) -> SolverError {
        SolverError::Lowering { message }
    }
}
