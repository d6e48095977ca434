use miette::SourceSpan;
use thiserror::Error;

use crate::error::EvalError;

/// A calculator value. Integer arithmetic stays exact until it would
/// overflow; anything touching a float is a float.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

/// Failure raised by an operator or math function, before it is tied to a
/// location in the source.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ArithmeticError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("{0}")]
    Domain(&'static str),
}

impl ArithmeticError {
    pub fn at(self, span: SourceSpan) -> EvalError {
        match self {
            Self::DivisionByZero => EvalError::DivisionByZero { span },
            Self::Domain(message) => EvalError::EvaluationError {
                message: message.to_string(),
                span,
            },
        }
    }
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(x) => x,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Number::Int(n) => n == 0,
            Number::Float(x) => x == 0.0,
        }
    }

    /// True when the value has no fractional part.
    pub fn is_integral(self) -> bool {
        match self {
            Number::Int(_) => true,
            Number::Float(x) => x.is_finite() && x.fract() == 0.0,
        }
    }
}

impl From<i64> for Number {
    fn from(n: i64) -> Self {
        Number::Int(n)
    }
}

impl From<f64> for Number {
    fn from(x: f64) -> Self {
        Number::Float(x)
    }
}

/// Beyond this magnitude consecutive floats are more than one apart, so an
/// integral float no longer stands for an exact integer.
const EXACT_FLOAT_LIMIT: f64 = 9_007_199_254_740_992.0;

/// Integral values print without a fractional part, so `sqrt(16)` shows as
/// `4`. Floats too large to be exact integers, and very small magnitudes,
/// use exponent notation, which the lexer reads back when a result is
/// chained into the next expression.
impl std::fmt::Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Number::Int(n) => write!(f, "{n}"),
            Number::Float(x) if x.is_nan() => write!(f, "nan"),
            Number::Float(x) if x.is_infinite() => {
                write!(f, "{}", if x > 0.0 { "inf" } else { "-inf" })
            }
            Number::Float(x) if x == 0.0 => write!(f, "0"),
            Number::Float(x) if !(1e-4..EXACT_FLOAT_LIMIT).contains(&x.abs()) => {
                write!(f, "{x:e}")
            }
            Number::Float(x) if x.fract() == 0.0 => write!(f, "{x:.0}"),
            Number::Float(x) => write!(f, "{x}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers_render_plainly() {
        assert_eq!(Number::Int(42).to_string(), "42");
        assert_eq!(Number::Int(-7).to_string(), "-7");
    }

    #[test]
    fn test_integral_floats_drop_the_fraction() {
        assert_eq!(Number::Float(4.0).to_string(), "4");
        assert_eq!(Number::Float(-0.0).to_string(), "0");
        assert_eq!(Number::Float(1e15).to_string(), "1000000000000000");
        assert_eq!(Number::Float(-4096.0).to_string(), "-4096");
    }

    #[test]
    fn test_inexact_integral_floats_use_exponent() {
        assert_eq!(Number::Float(1e20).to_string(), "1e20");
        assert_eq!(Number::Float(-2e53).to_string(), "-2e53");
        assert_eq!(Number::Float(9_007_199_254_740_992.0).to_string(), "9.007199254740992e15");
        assert_eq!(Number::Float(9_007_199_254_740_990.0).to_string(), "9007199254740990");
        assert_eq!(Number::Int(i64::MAX).to_string(), "9223372036854775807");
    }

    #[test]
    fn test_fractional_floats() {
        assert_eq!(Number::Float(3.5).to_string(), "3.5");
        assert_eq!(Number::Float(0.1).to_string(), "0.1");
        assert_eq!(Number::Float(1.5e-5).to_string(), "1.5e-5");
    }

    #[test]
    fn test_non_finite() {
        assert_eq!(Number::Float(f64::INFINITY).to_string(), "inf");
        assert_eq!(Number::Float(f64::NEG_INFINITY).to_string(), "-inf");
        assert_eq!(Number::Float(f64::NAN).to_string(), "nan");
    }

    #[test]
    fn test_is_integral() {
        assert!(Number::Int(3).is_integral());
        assert!(Number::Float(3.0).is_integral());
        assert!(!Number::Float(3.25).is_integral());
        assert!(!Number::Float(f64::INFINITY).is_integral());
    }

    #[test]
    fn test_arithmetic_error_keeps_span() {
        let err = ArithmeticError::DivisionByZero.at((2, 3).into());
        assert_eq!(err, EvalError::DivisionByZero { span: (2, 3).into() });
    }
}
