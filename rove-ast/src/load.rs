//! Loading AST nodes from their JSON form.
//!
//! Every node is an object with a `"$type"` discriminator, e.g.
//! `{"$type": "Assign(_)", "Name": "route", "Expr": {...}}`. The text in
//! parentheses carries nested type arguments; most discriminators ignore
//! it, but `None` reads its payload type from there. Dispatch is a plain
//! match over the discriminator head, with explicit field lookups in each
//! arm, so an unknown or malformed node fails the load rather than a
//! later evaluation.

use rove_smt::{Sort, fresh_name};
use serde_json::Value as Json;

use crate::error::LoadError;
use crate::expr::{Constant, Expr};
use crate::func::{AstFunction, AstPredicate};
use crate::stmt::Stmt;
use crate::temporal::Temporal;
use crate::ty::Ty;

/// Loads policy ASTs for a network whose route type has a fixed sort.
/// The route sort is needed wherever a surface type must be resolved, such
/// as the payload type of a `None` literal.
pub struct Loader {
    route: Sort,
}

impl Loader {
    pub fn new(route: Sort) -> Loader {
        Loader { route }
    }

    /// Load a function declaration: `{"Arg": ..., "Body": [stmts]}`.
    /// The argument is renamed to a fresh name so that separately declared
    /// functions never collide on a shared local name when composed.
    pub fn function(&self, json: &Json) -> Result<AstFunction, LoadError> {
        let obj = object(json)?;
        let arg = str_field(obj, "function", "Arg")?;
        let body = self.stmts(field(obj, "function", "Body")?)?;
        let mut f = AstFunction::new(arg, body);
        let fresh = fresh_name(&f.arg);
        let old = f.arg.clone();
        f.rename(&old, &fresh);
        Ok(f)
    }

    /// Load a predicate declaration: `{"Arg": ..., "Expr": {...}}`.
    pub fn predicate(&self, json: &Json) -> Result<AstPredicate, LoadError> {
        let obj = object(json)?;
        let arg = str_field(obj, "predicate", "Arg")?;
        let expr = self.expr(field(obj, "predicate", "Expr")?)?;
        let mut p = AstPredicate::new(arg, expr);
        let fresh = fresh_name(&p.arg);
        let old = p.arg.clone();
        p.rename(&old, &fresh);
        Ok(p)
    }

    /// Load a temporal operator over named predicates.
    pub fn temporal(&self, json: &Json) -> Result<Temporal, LoadError> {
        let obj = object(json)?;
        let (disc, _) = discriminator(obj)?;
        match disc.as_str() {
            "Finally" => Ok(Temporal::Finally {
                time: int_field(obj, &disc, "Time")?,
                then: str_field(obj, &disc, "Then")?,
            }),
            "Globally" => Ok(Temporal::Globally {
                predicate: str_field(obj, &disc, "Predicate")?,
            }),
            "Until" => Ok(Temporal::Until {
                time: int_field(obj, &disc, "Time")?,
                before: str_field(obj, &disc, "Before")?,
                after: str_field(obj, &disc, "After")?,
            }),
            _ => Err(LoadError::UnknownDiscriminator { name: disc }),
        }
    }

    /// Load a statement. A JSON array is a block, folded left-to-right
    /// into a sequence; an empty block is `Skip`.
    pub fn stmts(&self, json: &Json) -> Result<Stmt, LoadError> {
        match json {
            Json::Array(items) => {
                let mut block = None;
                for item in items {
                    let next = self.stmts(item)?;
                    block = Some(match block {
                        None => next,
                        Some(acc) => Stmt::seq(acc, next),
                    });
                }
                Ok(block.unwrap_or(Stmt::Skip))
            }
            _ => self.stmt(json),
        }
    }

    fn stmt(&self, json: &Json) -> Result<Stmt, LoadError> {
        let obj = object(json)?;
        let (disc, _) = discriminator(obj)?;
        match disc.as_str() {
            "Skip" => Ok(Stmt::Skip),
            "Return" => Ok(Stmt::Return(self.expr(field(obj, &disc, "Expr")?)?)),
            "Assign" => Ok(Stmt::Assign(
                str_field(obj, &disc, "Name")?,
                self.expr(field(obj, &disc, "Expr")?)?,
            )),
            "If" => Ok(Stmt::if_else(
                self.expr(field(obj, &disc, "Guard")?)?,
                self.stmts(field(obj, &disc, "ThenCase")?)?,
                self.stmts(field(obj, &disc, "ElseCase")?)?,
            )),
            "Seq" => Ok(Stmt::seq(
                self.stmts(field(obj, &disc, "First")?)?,
                self.stmts(field(obj, &disc, "Second")?)?,
            )),
            "SetDefaultPolicy" => Ok(Stmt::SetDefaultPolicy(str_field(
                obj,
                &disc,
                "PolicyName",
            )?)),
            _ => Err(LoadError::UnknownDiscriminator { name: disc }),
        }
    }

    /// Load an expression.
    pub fn expr(&self, json: &Json) -> Result<Expr, LoadError> {
        let obj = object(json)?;
        let (disc, args) = discriminator(obj)?;
        let unary = |name: &'static str| -> Result<Box<Expr>, LoadError> {
            Ok(Box::new(self.expr(field(obj, &disc, name)?)?))
        };
        let operands = || -> Result<(Box<Expr>, Box<Expr>), LoadError> {
            Ok((unary("Operand1")?, unary("Operand2")?))
        };
        match disc.as_str() {
            "Var" => Ok(Expr::Var(str_field(obj, &disc, "Name")?)),
            "Havoc" => Ok(Expr::Havoc),

            "Bool" => Ok(Expr::Const(Constant::Bool(bool_field(obj, &disc, "Value")?))),
            "Int32" | "Uint32" | "BigInt" => {
                Ok(Expr::Const(Constant::Int(int_field(obj, &disc, "Value")?)))
            }
            "String" => Ok(Expr::Const(Constant::Str(str_field(obj, &disc, "Value")?))),

            "Not" => Ok(Expr::Not(unary("Operand")?)),
            "And" => operands().map(|(a, b)| Expr::And(a, b)),
            "Or" => operands().map(|(a, b)| Expr::Or(a, b)),
            "Plus" => operands().map(|(a, b)| Expr::Plus(a, b)),
            "LessThan" => operands().map(|(a, b)| Expr::LessThan(a, b)),
            "LessThanEqual" => operands().map(|(a, b)| Expr::LessThanEqual(a, b)),
            "Equal" => operands().map(|(a, b)| Expr::Equal(a, b)),

            "Pair" => operands().map(|(a, b)| Expr::Pair(a, b)),
            "First" => Ok(Expr::First(unary("Pair")?)),
            "Second" => Ok(Expr::Second(unary("Pair")?)),

            "Some" => Ok(Expr::SomeOf(unary("Expr")?)),
            "None" => {
                let ty = args.ok_or(LoadError::MalformedType {
                    input: disc.clone(),
                    reason: "None requires a payload type argument",
                })?;
                Ok(Expr::NoneOf(Ty::parse(&ty)?.sort(&self.route)))
            }
            "Case" => Ok(Expr::Case {
                scrutinee: unary("Scrutinee")?,
                none: unary("NoneCase")?,
                binder: str_field(obj, &disc, "Binder")?,
                some: unary("SomeCase")?,
            }),

            "GetField" => Ok(Expr::GetField(
                unary("Record")?,
                str_field(obj, &disc, "FieldName")?,
            )),
            "WithField" => Ok(Expr::WithField(
                unary("Record")?,
                str_field(obj, &disc, "FieldName")?,
                unary("FieldValue")?,
            )),

            "EmptySet" => Ok(Expr::EmptySet),
            // Operand1 is the element, Operand2 the set.
            "SetAdd" => operands().map(|(elem, set)| Expr::SetAdd(set, elem)),
            "SetContains" => operands().map(|(elem, set)| Expr::SetContains(set, elem)),
            "SetUnion" => operands().map(|(a, b)| Expr::SetUnion(a, b)),

            _ => Err(LoadError::UnknownDiscriminator { name: disc }),
        }
    }
}

/// Split a `"$type"` value into its head and the optional parenthesized
/// argument text: `"WithField(TRoute;TSet)"` → `("WithField", Some(...))`.
fn discriminator(obj: &serde_json::Map<String, Json>) -> Result<(String, Option<String>), LoadError> {
    let raw = obj
        .get("$type")
        .and_then(Json::as_str)
        .ok_or(LoadError::NotAnObject)?;
    match raw.split_once('(') {
        None => Ok((raw.to_string(), None)),
        Some((head, rest)) => {
            let args = rest.strip_suffix(')').unwrap_or(rest);
            let args = (args != "_" && !args.is_empty()).then(|| args.to_string());
            Ok((head.to_string(), args))
        }
    }
}

fn object(json: &Json) -> Result<&serde_json::Map<String, Json>, LoadError> {
    json.as_object().ok_or(LoadError::NotAnObject)
}

fn field<'a>(
    obj: &'a serde_json::Map<String, Json>,
    disc: &str,
    name: &'static str,
) -> Result<&'a Json, LoadError> {
    obj.get(name).ok_or_else(|| LoadError::MissingField {
        discriminator: disc.to_string(),
        field: name,
    })
}

fn str_field(
    obj: &serde_json::Map<String, Json>,
    disc: &str,
    name: &'static str,
) -> Result<String, LoadError> {
    field(obj, disc, name)?
        .as_str()
        .map(str::to_string)
        .ok_or(LoadError::BadField {
            discriminator: disc.to_string(),
            field: name,
            reason: "expected a string",
        })
}

fn int_field(
    obj: &serde_json::Map<String, Json>,
    disc: &str,
    name: &'static str,
) -> Result<i64, LoadError> {
    field(obj, disc, name)?.as_i64().ok_or(LoadError::BadField {
        discriminator: disc.to_string(),
        field: name,
        reason: "expected an integer",
    })
}

fn bool_field(
    obj: &serde_json::Map<String, Json>,
    disc: &str,
    name: &'static str,
) -> Result<bool, LoadError> {
    field(obj, disc, name)?
        .as_bool()
        .ok_or(LoadError::BadField {
            discriminator: disc.to_string(),
            field: name,
            reason: "expected a boolean",
        })
}
