use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

/// Every way an expression can fail to produce a number.
///
/// Each variant carries the span of the offending input so the CLI can point
/// at it when rendering the diagnostic against the source text.
#[derive(Diagnostic, Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("syntax error: {message}")]
    #[diagnostic(code(safecalc::syntax))]
    SyntaxError {
        message: String,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("{construct} is not allowed in a calculator expression")]
    #[diagnostic(
        code(safecalc::disallowed),
        help("only numbers, + - * / ** %, parentheses, pi, e and sqrt, sin, cos, tan, log, log10, abs, round are accepted")
    )]
    DisallowedConstruct {
        construct: &'static str,
        #[label("not allowed")]
        span: SourceSpan,
    },

    #[error("operator `{op}` is not supported")]
    #[diagnostic(code(safecalc::operator))]
    UnsupportedOperator {
        op: &'static str,
        #[label("this operator")]
        span: SourceSpan,
    },

    #[error("unknown identifier `{name}`")]
    #[diagnostic(code(safecalc::identifier), help("the known constants are pi and e"))]
    UnknownIdentifier {
        name: String,
        #[label("not a known constant")]
        span: SourceSpan,
    },

    #[error("unknown function `{name}`")]
    #[diagnostic(code(safecalc::function))]
    UnknownFunction {
        name: String,
        #[label("not a known function")]
        span: SourceSpan,
    },

    #[error("{name}() takes exactly {expected} argument ({found} given)")]
    #[diagnostic(code(safecalc::arity))]
    ArityError {
        name: &'static str,
        expected: usize,
        found: usize,
        #[label("in this call")]
        span: SourceSpan,
    },

    #[error("division by zero")]
    #[diagnostic(code(safecalc::zero_division))]
    DivisionByZero {
        #[label("the divisor is zero")]
        span: SourceSpan,
    },

    #[error("{message}")]
    #[diagnostic(code(safecalc::evaluation))]
    EvaluationError {
        message: String,
        #[label("while evaluating this")]
        span: SourceSpan,
    },
}

impl EvalError {
    pub fn syntax(message: impl Into<String>, span: impl Into<SourceSpan>) -> Self {
        Self::SyntaxError {
            message: message.into(),
            span: span.into(),
        }
    }

    pub fn span(&self) -> SourceSpan {
        match self {
            Self::SyntaxError { span, .. }
            | Self::DisallowedConstruct { span, .. }
            | Self::UnsupportedOperator { span, .. }
            | Self::UnknownIdentifier { span, .. }
            | Self::UnknownFunction { span, .. }
            | Self::ArityError { span, .. }
            | Self::DivisionByZero { span }
            | Self::EvaluationError { span, .. } => *span,
        }
    }
}
