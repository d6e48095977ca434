//! The names an expression may refer to.
//!
//! Names form a closed set. `Builtin::resolve` matches on every variant, so
//! adding a name without giving it a meaning does not compile.

use std::f64::consts;

use crate::number::{ArithmeticError, Number};
use crate::ops::UnaryFn;

const DOMAIN_ERROR: ArithmeticError = ArithmeticError::Domain("math domain error");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Pi,
    E,
    Sqrt,
    Sin,
    Cos,
    Tan,
    Log,
    Log10,
    Abs,
    Round,
}

/// What a name stands for.
#[derive(Debug, Clone, Copy)]
pub enum Symbol {
    Constant(f64),
    /// Every allowed function takes exactly one argument.
    Function(UnaryFn),
}

impl Builtin {
    pub const ALL: [Builtin; 10] = [
        Builtin::Pi,
        Builtin::E,
        Builtin::Sqrt,
        Builtin::Sin,
        Builtin::Cos,
        Builtin::Tan,
        Builtin::Log,
        Builtin::Log10,
        Builtin::Abs,
        Builtin::Round,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Pi => "pi",
            Builtin::E => "e",
            Builtin::Sqrt => "sqrt",
            Builtin::Sin => "sin",
            Builtin::Cos => "cos",
            Builtin::Tan => "tan",
            Builtin::Log => "log",
            Builtin::Log10 => "log10",
            Builtin::Abs => "abs",
            Builtin::Round => "round",
        }
    }

    pub fn lookup(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|builtin| builtin.name() == name)
    }

    pub fn resolve(self) -> Symbol {
        match self {
            Builtin::Pi => Symbol::Constant(consts::PI),
            Builtin::E => Symbol::Constant(consts::E),
            Builtin::Sqrt => Symbol::Function(sqrt),
            Builtin::Sin => Symbol::Function(sin),
            Builtin::Cos => Symbol::Function(cos),
            Builtin::Tan => Symbol::Function(tan),
            Builtin::Log => Symbol::Function(log),
            Builtin::Log10 => Symbol::Function(log10),
            Builtin::Abs => Symbol::Function(abs),
            Builtin::Round => Symbol::Function(round),
        }
    }
}

impl std::fmt::Display for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn sqrt(x: Number) -> Result<Number, ArithmeticError> {
    let x = x.as_f64();
    if x < 0.0 {
        return Err(DOMAIN_ERROR);
    }
    Ok(Number::Float(x.sqrt()))
}

fn trig(x: Number, f: fn(f64) -> f64) -> Result<Number, ArithmeticError> {
    let x = x.as_f64();
    if x.is_infinite() {
        return Err(DOMAIN_ERROR);
    }
    Ok(Number::Float(f(x)))
}

fn sin(x: Number) -> Result<Number, ArithmeticError> {
    trig(x, f64::sin)
}

fn cos(x: Number) -> Result<Number, ArithmeticError> {
    trig(x, f64::cos)
}

fn tan(x: Number) -> Result<Number, ArithmeticError> {
    trig(x, f64::tan)
}

fn log(x: Number) -> Result<Number, ArithmeticError> {
    let x = x.as_f64();
    if x <= 0.0 {
        return Err(DOMAIN_ERROR);
    }
    Ok(Number::Float(x.ln()))
}

fn log10(x: Number) -> Result<Number, ArithmeticError> {
    let x = x.as_f64();
    if x <= 0.0 {
        return Err(DOMAIN_ERROR);
    }
    Ok(Number::Float(x.log10()))
}

fn abs(x: Number) -> Result<Number, ArithmeticError> {
    Ok(match x {
        Number::Int(n) => n
            .checked_abs()
            .map_or_else(|| Number::Float((n as f64).abs()), Number::Int),
        Number::Float(x) => Number::Float(x.abs()),
    })
}

/// Rounds half to even and yields an integer.
fn round(x: Number) -> Result<Number, ArithmeticError> {
    let x = match x {
        Number::Int(_) => return Ok(x),
        Number::Float(x) => x,
    };
    if x.is_nan() {
        return Err(ArithmeticError::Domain("cannot convert float NaN to integer"));
    }
    if x.is_infinite() {
        return Err(ArithmeticError::Domain(
            "cannot convert float infinity to integer",
        ));
    }

    let rounded = x.round_ties_even();
    if (i64::MIN as f64..i64::MAX as f64).contains(&rounded) {
        Ok(Number::Int(rounded as i64))
    } else {
        Ok(Number::Float(rounded))
    }
}
