//! Operator allow-list.
//!
//! Every operator kind the parser can produce is listed here explicitly.
//! Kinds that map to `None` are refused by the evaluator.

use crate::number::{ArithmeticError, Number};
use crate::parser::{BinOp, UnaryOp};

pub type BinaryFn = fn(Number, Number) -> Result<Number, ArithmeticError>;
pub type UnaryFn = fn(Number) -> Result<Number, ArithmeticError>;

pub fn binary(op: BinOp) -> Option<BinaryFn> {
    match op {
        BinOp::Add => Some(add),
        BinOp::Sub => Some(sub),
        BinOp::Mul => Some(mul),
        BinOp::Div => Some(div),
        BinOp::Pow => Some(pow),
        BinOp::Mod => Some(modulo),
        BinOp::FloorDiv
        | BinOp::MatMul
        | BinOp::BitAnd
        | BinOp::BitOr
        | BinOp::BitXor
        | BinOp::LShift
        | BinOp::RShift => None,
    }
}

pub fn unary(op: UnaryOp) -> Option<UnaryFn> {
    match op {
        UnaryOp::Minus => Some(neg),
        UnaryOp::Plus => Some(pos),
        UnaryOp::Invert | UnaryOp::Not => None,
    }
}

/// Keeps an exact integer result, or redoes the operation in floating point
/// when it overflowed.
fn exact_or_float(exact: Option<i64>, float: impl FnOnce() -> f64) -> Number {
    exact.map_or_else(|| Number::Float(float()), Number::Int)
}

fn add(a: Number, b: Number) -> Result<Number, ArithmeticError> {
    Ok(match (a, b) {
        (Number::Int(x), Number::Int(y)) => exact_or_float(x.checked_add(y), || x as f64 + y as f64),
        _ => Number::Float(a.as_f64() + b.as_f64()),
    })
}

fn sub(a: Number, b: Number) -> Result<Number, ArithmeticError> {
    Ok(match (a, b) {
        (Number::Int(x), Number::Int(y)) => exact_or_float(x.checked_sub(y), || x as f64 - y as f64),
        _ => Number::Float(a.as_f64() - b.as_f64()),
    })
}

fn mul(a: Number, b: Number) -> Result<Number, ArithmeticError> {
    Ok(match (a, b) {
        (Number::Int(x), Number::Int(y)) => exact_or_float(x.checked_mul(y), || x as f64 * y as f64),
        _ => Number::Float(a.as_f64() * b.as_f64()),
    })
}

/// True division: the quotient is always a float.
fn div(a: Number, b: Number) -> Result<Number, ArithmeticError> {
    if b.is_zero() {
        return Err(ArithmeticError::DivisionByZero);
    }
    Ok(Number::Float(a.as_f64() / b.as_f64()))
}

/// The remainder takes the sign of the divisor, so `-7 % 3 == 2`.
fn modulo(a: Number, b: Number) -> Result<Number, ArithmeticError> {
    if b.is_zero() {
        return Err(ArithmeticError::DivisionByZero);
    }
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => {
            let r = x.checked_rem(y).unwrap_or(0);
            Ok(Number::Int(if r != 0 && (r < 0) != (y < 0) { r + y } else { r }))
        }
        _ => {
            let (x, y) = (a.as_f64(), b.as_f64());
            let r = x % y;
            let r = if r == 0.0 {
                0.0f64.copysign(y)
            } else if (r < 0.0) != (y < 0.0) {
                r + y
            } else {
                r
            };
            Ok(Number::Float(r))
        }
    }
}

fn pow(base: Number, exp: Number) -> Result<Number, ArithmeticError> {
    match (base, exp) {
        (Number::Int(b), Number::Int(e)) if e >= 0 => {
            match u32::try_from(e).ok().and_then(|e| b.checked_pow(e)) {
                Some(n) => Ok(Number::Int(n)),
                None => float_pow(b as f64, e as f64),
            }
        }
        _ => float_pow(base.as_f64(), exp.as_f64()),
    }
}

fn float_pow(base: f64, exp: f64) -> Result<Number, ArithmeticError> {
    if base == 0.0 && exp < 0.0 {
        return Err(ArithmeticError::DivisionByZero);
    }
    if base < 0.0 && exp.is_finite() && exp.fract() != 0.0 {
        return Err(ArithmeticError::Domain(
            "negative number cannot be raised to a fractional power",
        ));
    }
    let result = base.powf(exp);
    if result.is_infinite() && base.is_finite() && exp.is_finite() {
        return Err(ArithmeticError::Domain("numerical result out of range"));
    }
    Ok(Number::Float(result))
}

fn neg(a: Number) -> Result<Number, ArithmeticError> {
    Ok(match a {
        Number::Int(x) => exact_or_float(x.checked_neg(), || -(x as f64)),
        Number::Float(x) => Number::Float(-x),
    })
}

fn pos(a: Number) -> Result<Number, ArithmeticError> {
    Ok(a)
}
