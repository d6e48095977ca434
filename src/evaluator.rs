use miette::SourceSpan;

use crate::{
    env::{Builtin, Symbol},
    error::EvalError,
    number::Number,
    ops,
    parser::{Expr, ExprKind, Parser},
};

/// Parses `text` as a single expression and computes its value.
pub fn evaluate(text: &str) -> Result<Number, EvalError> {
    tracing::debug!(expression = text, "evaluating");

    let mut parser = Parser::new(text);
    let result = parser.parse().and_then(|tree| eval(&tree));

    match &result {
        Ok(value) => tracing::debug!(%value, "evaluated"),
        Err(err) => tracing::debug!(error = %err, "evaluation failed"),
    }
    result
}

/// Walks the tree. Only literals, names, unary and binary operations and
/// calls are evaluated; any other node is refused.
pub fn eval(expr: &Expr<'_>) -> Result<Number, EvalError> {
    match &expr.kind {
        ExprKind::Number(n) => Ok(*n),

        ExprKind::Name(name) => match Builtin::lookup(name).map(Builtin::resolve) {
            Some(Symbol::Constant(value)) => Ok(Number::Float(value)),
            Some(Symbol::Function(_)) => Err(EvalError::EvaluationError {
                message: format!("`{name}` is a function and must be called"),
                span: expr.span,
            }),
            None => {
                tracing::warn!(name, "rejected unknown identifier");
                Err(EvalError::UnknownIdentifier {
                    name: name.to_string(),
                    span: expr.span,
                })
            }
        },

        ExprKind::Unary { op, operand } => {
            let Some(apply) = ops::unary(*op) else {
                tracing::warn!(op = op.symbol(), "rejected unary operator");
                return Err(EvalError::UnsupportedOperator {
                    op: op.symbol(),
                    span: expr.span,
                });
            };
            let value = eval(operand)?;
            apply(value).map_err(|err| err.at(expr.span))
        }

        ExprKind::Binary { op, left, right } => {
            let Some(apply) = ops::binary(*op) else {
                tracing::warn!(op = op.symbol(), "rejected binary operator");
                return Err(EvalError::UnsupportedOperator {
                    op: op.symbol(),
                    span: expr.span,
                });
            };
            let left = eval(left)?;
            let right = eval(right)?;
            apply(left, right).map_err(|err| err.at(expr.span))
        }

        ExprKind::Call { func, args } => eval_call(func, args, expr.span),

        other => {
            tracing::warn!(construct = other.describe(), "rejected disallowed construct");
            Err(EvalError::DisallowedConstruct {
                construct: other.describe(),
                span: expr.span,
            })
        }
    }
}

fn eval_call(func: &Expr<'_>, args: &[Expr<'_>], span: SourceSpan) -> Result<Number, EvalError> {
    let ExprKind::Name(name) = func.kind else {
        tracing::warn!(callee = func.kind.describe(), "rejected call of a non-name");
        return Err(EvalError::DisallowedConstruct {
            construct: "call of anything but a function name",
            span: func.span,
        });
    };

    let unknown = || {
        tracing::warn!(name, "rejected unknown function");
        EvalError::UnknownFunction {
            name: name.to_string(),
            span: func.span,
        }
    };
    let builtin = Builtin::lookup(name).ok_or_else(unknown)?;
    let Symbol::Function(apply) = builtin.resolve() else {
        return Err(unknown());
    };

    let values = eval_list(args)?;
    let &[arg] = values.as_slice() else {
        return Err(EvalError::ArityError {
            name: builtin.name(),
            expected: 1,
            found: values.len(),
            span,
        });
    };
    apply(arg).map_err(|err| err.at(span))
}

fn eval_list(list: &[Expr<'_>]) -> Result<Vec<Number>, EvalError> {
    list.iter().map(eval).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::MAX_DEPTH;

    fn assert_close(input: &str, expected: f64) {
        let value = evaluate(input).unwrap().as_f64();
        assert!(
            (value - expected).abs() < 1e-9,
            "{input} evaluated to {value}, expected {expected}"
        );
    }

    #[test]
    fn test_literals_evaluate_to_themselves() {
        for n in [0i64, 7, 42, 123_456_789, i64::MAX] {
            assert_eq!(evaluate(&n.to_string()), Ok(Number::Int(n)));
        }
        for x in [0.5, 2.25, 1e-7, 6.02e23, 1e300] {
            assert_eq!(evaluate(&Number::Float(x).to_string()).unwrap().as_f64(), x);
        }
    }

    #[test]
    fn test_add() {
        assert_eq!(evaluate("12 + 331 + 10"), Ok(Number::Int(353)));
    }

    #[test]
    fn test_minus() {
        assert_eq!(evaluate("50 - 20 - 10"), Ok(Number::Int(20)));
    }

    #[test]
    fn test_unary_minus() {
        assert_eq!(evaluate("-50"), Ok(Number::Int(-50)));
        assert_eq!(evaluate("--50"), Ok(Number::Int(50)));
        assert_eq!(evaluate("+-+5"), Ok(Number::Int(-5)));
    }

    #[test]
    fn test_mult() {
        assert_eq!(evaluate("2 * 3 * 4"), Ok(Number::Int(24)));
    }

    #[test]
    fn test_div() {
        assert_eq!(evaluate("100 / 2 / 5"), Ok(Number::Float(10.0)));
        assert_eq!(evaluate("1 / 4"), Ok(Number::Float(0.25)));
    }

    #[test]
    fn test_modulo() {
        assert_eq!(evaluate("17 % 5"), Ok(Number::Int(2)));
        assert_eq!(evaluate("-17 % 5"), Ok(Number::Int(3)));
    }

    #[test]
    fn test_pow() {
        assert_eq!(evaluate("2 ** 10"), Ok(Number::Int(1024)));
        assert_eq!(evaluate("2 ** 3 ** 2"), Ok(Number::Int(512)));
        assert_eq!(evaluate("-2 ** 2"), Ok(Number::Int(-4)));
        assert_eq!(evaluate("(-2) ** 2"), Ok(Number::Int(4)));
        assert_eq!(evaluate("2 ** -1"), Ok(Number::Float(0.5)));
        assert_eq!(evaluate("4.0 ** 0.5"), Ok(Number::Float(2.0)));
    }

    #[test]
    fn test_nested_operations() {
        assert_eq!(evaluate("10 + (2 * 3) + (20 / 5)"), Ok(Number::Float(20.0)));
        assert_eq!(evaluate("(1 + 2) * (3 + 4)"), Ok(Number::Int(21)));
    }

    #[test]
    fn test_binary_operators_match_arithmetic() {
        let operands = [(7.5, 2.0), (-3.0, 4.0), (1e6, 3.0), (0.1, 0.2)];
        for (a, b) in operands {
            assert_close(&format!("{a} + {b}"), a + b);
            assert_close(&format!("{a} - {b}"), a - b);
            assert_close(&format!("{a} * {b}"), a * b);
            assert_close(&format!("{a} / {b}"), a / b);
        }
        assert_close("2.5 ** 2", 6.25);
        assert_close("7.5 % 2", 1.5);
    }

    #[test]
    fn test_constants() {
        assert_close("pi", std::f64::consts::PI);
        assert_close("e", std::f64::consts::E);
        assert_close("2 * pi", std::f64::consts::TAU);
    }

    #[test]
    fn test_functions() {
        assert_eq!(evaluate("sqrt(16)"), Ok(Number::Float(4.0)));
        assert_eq!(evaluate("sqrt(16)").unwrap().to_string(), "4");
        assert_eq!(evaluate("abs(-3)"), Ok(Number::Int(3)));
        assert_eq!(evaluate("round(2.5)"), Ok(Number::Int(2)));
        assert_close("sin(0)", 0.0);
        assert_close("cos(pi)", -1.0);
        assert_close("tan(pi / 4)", 1.0);
        assert_close("log(e)", 1.0);
        assert_close("log10(100)", 2.0);
        assert_close("sqrt(sqrt(81))", 3.0);
    }

    #[test]
    fn test_division_by_zero() {
        assert!(matches!(evaluate("1/0"), Err(EvalError::DivisionByZero { .. })));
        assert!(matches!(evaluate("1 % 0"), Err(EvalError::DivisionByZero { .. })));
        assert!(matches!(evaluate("1 / (2 - 2.0)"), Err(EvalError::DivisionByZero { .. })));
        assert!(matches!(evaluate("0 ** -1"), Err(EvalError::DivisionByZero { .. })));
    }

    #[test]
    fn test_division_by_zero_span() {
        let err = evaluate("1 + 4/0").unwrap_err();
        assert_eq!(err.span(), (4, 3).into());
    }

    #[test]
    fn test_domain_errors() {
        assert!(matches!(evaluate("sqrt(-1)"), Err(EvalError::EvaluationError { .. })));
        assert!(matches!(evaluate("log(0)"), Err(EvalError::EvaluationError { .. })));
        assert!(matches!(evaluate("log10(-2)"), Err(EvalError::EvaluationError { .. })));
        assert!(matches!(evaluate("(-8) ** 0.5"), Err(EvalError::EvaluationError { .. })));
    }

    #[test]
    fn test_code_execution_is_refused() {
        assert!(matches!(
            evaluate("__import__('os')"),
            Err(EvalError::UnknownFunction { ref name, .. }) if name == "__import__"
        ));
        assert!(matches!(
            evaluate("open('/etc/passwd')"),
            Err(EvalError::UnknownFunction { ref name, .. }) if name == "open"
        ));
        assert!(matches!(
            evaluate("__import__('os').system('ls')"),
            Err(EvalError::DisallowedConstruct { .. })
        ));
        assert!(matches!(
            evaluate("eval"),
            Err(EvalError::UnknownIdentifier { .. })
        ));
    }

    #[test]
    fn test_unknown_identifier() {
        let err = evaluate("2 * x").unwrap_err();
        assert_eq!(
            err,
            EvalError::UnknownIdentifier {
                name: "x".to_string(),
                span: (4, 1).into(),
            }
        );
    }

    #[test]
    fn test_disallowed_constructs() {
        let rejected = [
            ("'abc'", "string literal"),
            ("True + 1", "boolean literal"),
            ("None", "None"),
            ("pi.real", "attribute access"),
            ("(1, 2)[0]", "subscript"),
            ("1 < 2", "comparison"),
            ("1 and 2", "boolean operation"),
            ("1 if 1 else 2", "conditional expression"),
            ("lambda: 1", "lambda"),
            ("1, 2", "tuple"),
            ("[1]", "list"),
            ("{1}", "set"),
            ("{1: 2}", "dict"),
            ("x = 1", "assignment"),
            ("(y := 2)", "assignment expression"),
        ];
        for (input, expected) in rejected {
            match evaluate(input) {
                Err(EvalError::DisallowedConstruct { construct, .. }) => {
                    assert_eq!(construct, expected, "{input}")
                }
                other => panic!("{input} should be disallowed, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_disallowed_construct_inside_arithmetic() {
        assert!(matches!(
            evaluate("1 + sqrt('16')"),
            Err(EvalError::DisallowedConstruct { construct: "string literal", .. })
        ));
    }

    #[test]
    fn test_call_of_non_name() {
        assert!(matches!(
            evaluate("(sqrt)(4)"),
            Ok(Number::Float(x)) if x == 2.0
        ));
        assert!(matches!(
            evaluate("(lambda x: x)(4)"),
            Err(EvalError::DisallowedConstruct { .. })
        ));
        assert!(matches!(
            evaluate("math.sqrt(4)"),
            Err(EvalError::DisallowedConstruct { .. })
        ));
    }

    #[test]
    fn test_keyword_and_starred_arguments() {
        assert!(matches!(
            evaluate("round(2.5, ndigits=1)"),
            Err(EvalError::DisallowedConstruct { construct: "keyword argument", .. })
        ));
        assert!(matches!(
            evaluate("sqrt(*x)"),
            Err(EvalError::DisallowedConstruct { construct: "starred argument", .. })
        ));
    }

    #[test]
    fn test_unsupported_operators() {
        for (input, op) in [
            ("7 // 2", "//"),
            ("6 & 3", "&"),
            ("6 | 3", "|"),
            ("6 ^ 3", "^"),
            ("1 << 4", "<<"),
            ("8 >> 1", ">>"),
            ("2 @ 3", "@"),
            ("~5", "~"),
            ("not 1", "not"),
        ] {
            match evaluate(input) {
                Err(EvalError::UnsupportedOperator { op: found, .. }) => assert_eq!(found, op),
                other => panic!("{input} should be unsupported, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_arity() {
        assert_eq!(
            evaluate("sqrt()"),
            Err(EvalError::ArityError {
                name: "sqrt",
                expected: 1,
                found: 0,
                span: (0, 6).into(),
            })
        );
        assert!(matches!(
            evaluate("sqrt(4, 9)"),
            Err(EvalError::ArityError { found: 2, .. })
        ));
        assert!(matches!(
            evaluate("log(8, 2)"),
            Err(EvalError::ArityError { name: "log", .. })
        ));
    }

    #[test]
    fn test_names_and_callables_do_not_mix() {
        assert!(matches!(evaluate("pi(2)"), Err(EvalError::UnknownFunction { .. })));
        assert!(matches!(evaluate("sqrt + 1"), Err(EvalError::EvaluationError { .. })));
    }

    #[test]
    fn test_left_operand_error_wins() {
        assert!(matches!(
            evaluate("x + 1/0"),
            Err(EvalError::UnknownIdentifier { .. })
        ));
        assert!(matches!(
            evaluate("1/0 + x"),
            Err(EvalError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_unknown_function_checked_before_arguments() {
        assert!(matches!(
            evaluate("foo(1/0)"),
            Err(EvalError::UnknownFunction { .. })
        ));
    }

    #[test]
    fn test_syntax_errors() {
        for input in ["2 + ", "", "(1 + 2", "1 +* 2", "2 3", "sqrt(", "1; 2"] {
            assert!(
                matches!(evaluate(input), Err(EvalError::SyntaxError { .. })),
                "{input:?} should be a syntax error"
            );
        }
    }

    /// Runs `input` on a thread with the default spawned stack size.
    fn evaluate_on_small_stack(input: String) -> Result<Number, EvalError> {
        std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(move || evaluate(&input))
            .unwrap()
            .join()
            .unwrap()
    }

    #[test]
    fn test_deepest_accepted_nesting_fits_the_stack() {
        let depth = MAX_DEPTH - 1;
        let calls = format!("{}1{}", "sqrt(".repeat(depth), ")".repeat(depth));
        assert_eq!(evaluate_on_small_stack(calls), Ok(Number::Float(1.0)));

        let mixed = format!("{}1{}", "abs((-".repeat(depth / 3), "))".repeat(depth / 3));
        assert_eq!(evaluate_on_small_stack(mixed), Ok(Number::Int(1)));

        let too_deep = format!("{}1{}", "sqrt(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert!(matches!(
            evaluate_on_small_stack(too_deep),
            Err(EvalError::SyntaxError { .. })
        ));
    }

    #[test]
    fn test_inexact_large_results_render_in_exponent_form() {
        let value = evaluate("3**50").unwrap();
        assert!(matches!(value, Number::Float(_)));
        let rendered = value.to_string();
        assert!(rendered.contains('e'), "{rendered} looks exact");
        assert_eq!(evaluate(&rendered), Ok(value));

        assert_eq!(evaluate("2**53").unwrap().to_string(), "9007199254740992");
        assert_eq!(evaluate("3**39").unwrap().to_string(), "4052555153018976267");
    }
}
