use rove_smt::Sort;

use crate::error::LoadError;

/// A surface type annotation from a network file, e.g. `TRoute`,
/// `TPair(TBool;TRoute)`. All integer widths share one solver sort, so the
/// distinctions here matter only for parsing and error messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ty {
    Route,
    Bool,
    Int32,
    Uint32,
    Time,
    BigInt,
    String,
    Set,
    Unit,
    Pair(Box<Ty>, Box<Ty>),
    Option(Box<Ty>),
}

impl Ty {
    /// Parse a type string. Compound types take semicolon-separated
    /// arguments in parentheses: `TPair(TOption(TRoute);TBool)`.
    pub fn parse(input: &str) -> Result<Ty, LoadError> {
        let mut parser = Parser { input, pos: 0 };
        let ty = parser.ty()?;
        parser.skip_ws();
        if parser.pos != input.len() {
            return Err(malformed(input, "trailing characters after type"));
        }
        Ok(ty)
    }

    /// The solver sort this type denotes, given the sort chosen for
    /// `TRoute` in the current network.
    pub fn sort(&self, route: &Sort) -> Sort {
        match self {
            Ty::Route => route.clone(),
            Ty::Bool => Sort::Bool,
            Ty::Int32 | Ty::Uint32 | Ty::Time | Ty::BigInt => Sort::Int,
            Ty::String => Sort::Str,
            Ty::Set => Sort::Set,
            Ty::Unit => Sort::Unit,
            Ty::Pair(a, b) => Sort::pair(a.sort(route), b.sort(route)),
            Ty::Option(inner) => Sort::option(inner.sort(route)),
        }
    }
}

fn malformed(input: &str, reason: &'static str) -> LoadError {
    LoadError::MalformedType {
        input: input.to_string(),
        reason,
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn skip_ws(&mut self) {
        while self.input[self.pos..].starts_with(' ') {
            self.pos += 1;
        }
    }

    fn ident(&mut self) -> Result<&str, LoadError> {
        self.skip_ws();
        let rest = &self.input[self.pos..];
        let end = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        if end == 0 {
            return Err(malformed(self.input, "expected a type name"));
        }
        self.pos += end;
        Ok(&rest[..end])
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.input[self.pos..].starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn ty(&mut self) -> Result<Ty, LoadError> {
        let name = self.ident()?.to_string();
        let mut args = Vec::new();
        if self.eat('(') {
            loop {
                args.push(self.ty()?);
                if !self.eat(';') {
                    break;
                }
            }
            if !self.eat(')') {
                return Err(malformed(self.input, "unclosed parenthesis"));
            }
        }
        let arity = |expected: usize| -> Result<(), LoadError> {
            if args.len() == expected {
                Ok(())
            } else {
                Err(LoadError::WrongArity {
                    name: name.clone(),
                    expected,
                    found: args.len(),
                })
            }
        };
        Ok(match name.as_str() {
            "TPair" => {
                arity(2)?;
                let b = args.pop().unwrap();
                let a = args.pop().unwrap();
                Ty::Pair(Box::new(a), Box::new(b))
            }
            "TOption" => {
                arity(1)?;
                Ty::Option(Box::new(args.pop().unwrap()))
            }
            "TRoute" => {
                arity(0)?;
                Ty::Route
            }
            "TBool" => {
                arity(0)?;
                Ty::Bool
            }
            "TInt32" => {
                arity(0)?;
                Ty::Int32
            }
            "TUint32" => {
                arity(0)?;
                Ty::Uint32
            }
            "TTime" => {
                arity(0)?;
                Ty::Time
            }
            "TBigInt" => {
                arity(0)?;
                Ty::BigInt
            }
            "TString" => {
                arity(0)?;
                Ty::String
            }
            "TSet" => {
                arity(0)?;
                Ty::Set
            }
            "TUnit" => {
                arity(0)?;
                Ty::Unit
            }
            _ => return Err(malformed(self.input, "unknown type name")),
        })
    }
}
