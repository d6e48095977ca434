use miette::SourceSpan;

use crate::{
    error::EvalError,
    lexer::{Token, TokenKind},
    number::Number,
    Lexer,
};

/// Nesting of sub-expressions, calls, brackets and unary operators beyond
/// this is refused. A nested call costs a full descent through every
/// precedence level, so this is kept well below what a 2 MiB thread can
/// take in an unoptimized build.
pub const MAX_DEPTH: usize = 40;

/// Upper bound on tree nodes for a single expression.
pub const MAX_NODES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    MatMul,
    BitAnd,
    BitOr,
    BitXor,
    LShift,
    RShift,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::MatMul => "@",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::LShift => "<<",
            BinOp::RShift => ">>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Invert,
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::Invert => "~",
            UnaryOp::Not => "not",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr<'a> {
    pub kind: ExprKind<'a>,
    pub span: SourceSpan,
}

/// Syntax tree node kinds. Only the first five are ever evaluated; the rest
/// exist so that the evaluator can name what it refuses.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind<'a> {
    Number(Number),
    Name(&'a str),
    Unary {
        op: UnaryOp,
        operand: Box<Expr<'a>>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr<'a>>,
        right: Box<Expr<'a>>,
    },
    Call {
        func: Box<Expr<'a>>,
        args: Vec<Expr<'a>>,
    },

    Str(&'a str),
    Bool(bool),
    None,
    Attribute {
        value: Box<Expr<'a>>,
        attr: &'a str,
    },
    Subscript {
        value: Box<Expr<'a>>,
        index: Box<Expr<'a>>,
    },
    Compare {
        left: Box<Expr<'a>>,
        rest: Vec<(CmpOp, Expr<'a>)>,
    },
    BoolOp {
        op: BoolOp,
        values: Vec<Expr<'a>>,
    },
    IfElse {
        body: Box<Expr<'a>>,
        test: Box<Expr<'a>>,
        orelse: Box<Expr<'a>>,
    },
    Lambda {
        params: Vec<&'a str>,
        body: Box<Expr<'a>>,
    },
    Tuple(Vec<Expr<'a>>),
    List(Vec<Expr<'a>>),
    Set(Vec<Expr<'a>>),
    Dict(Vec<(Expr<'a>, Expr<'a>)>),
    Starred(Box<Expr<'a>>),
    Keyword {
        name: &'a str,
        value: Box<Expr<'a>>,
    },
    Assign {
        target: Box<Expr<'a>>,
        value: Box<Expr<'a>>,
    },
    NamedExpr {
        target: Box<Expr<'a>>,
        value: Box<Expr<'a>>,
    },
}

impl ExprKind<'_> {
    /// Human-readable name of the construct, used in error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            ExprKind::Number(_) => "number",
            ExprKind::Name(_) => "name",
            ExprKind::Unary { .. } => "unary operation",
            ExprKind::Binary { .. } => "binary operation",
            ExprKind::Call { .. } => "function call",
            ExprKind::Str(_) => "string literal",
            ExprKind::Bool(_) => "boolean literal",
            ExprKind::None => "None",
            ExprKind::Attribute { .. } => "attribute access",
            ExprKind::Subscript { .. } => "subscript",
            ExprKind::Compare { .. } => "comparison",
            ExprKind::BoolOp { .. } => "boolean operation",
            ExprKind::IfElse { .. } => "conditional expression",
            ExprKind::Lambda { .. } => "lambda",
            ExprKind::Tuple(_) => "tuple",
            ExprKind::List(_) => "list",
            ExprKind::Set(_) => "set",
            ExprKind::Dict(_) => "dict",
            ExprKind::Starred(_) => "starred argument",
            ExprKind::Keyword { .. } => "keyword argument",
            ExprKind::Assign { .. } => "assignment",
            ExprKind::NamedExpr { .. } => "assignment expression",
        }
    }
}

fn join(start: SourceSpan, end: SourceSpan) -> SourceSpan {
    (start.offset()..end.offset() + end.len()).into()
}

fn binary_op(kind: TokenKind) -> Option<(BinOp, u8)> {
    let op = match kind {
        TokenKind::Pipe => (BinOp::BitOr, 1),
        TokenKind::Caret => (BinOp::BitXor, 2),
        TokenKind::Amp => (BinOp::BitAnd, 3),
        TokenKind::LessLess => (BinOp::LShift, 4),
        TokenKind::GreaterGreater => (BinOp::RShift, 4),
        TokenKind::Plus => (BinOp::Add, 5),
        TokenKind::Minus => (BinOp::Sub, 5),
        TokenKind::Star => (BinOp::Mul, 6),
        TokenKind::Slash => (BinOp::Div, 6),
        TokenKind::SlashSlash => (BinOp::FloorDiv, 6),
        TokenKind::Percent => (BinOp::Mod, 6),
        TokenKind::At => (BinOp::MatMul, 6),
        _ => return None,
    };
    Some(op)
}

pub struct Parser<'a> {
    source: &'a str,
    lexer: Lexer<'a>,
    depth: usize,
    nodes: usize,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            source: input,
            lexer: Lexer::new(input),
            depth: 0,
            nodes: 0,
        }
    }

    /// Parses the whole input as exactly one expression.
    pub fn parse(&mut self) -> Result<Expr<'a>, EvalError> {
        if self.peek_kind()?.is_none() {
            return Err(EvalError::syntax(
                "empty expression",
                (self.source.len(), 0),
            ));
        }

        let expr = self.parse_tuple()?;
        let expr = if self.eat(TokenKind::Equal)?.is_some() {
            let value = self.parse_tuple()?;
            let span = join(expr.span, value.span);
            self.node(
                ExprKind::Assign {
                    target: Box::new(expr),
                    value: Box::new(value),
                },
                span,
            )?
        } else {
            expr
        };

        match self.lexer.next() {
            None => Ok(expr),
            Some(Ok(token)) => Err(self.unexpected(token)),
            Some(Err(err)) => Err(err),
        }
    }

    fn node(&mut self, kind: ExprKind<'a>, span: SourceSpan) -> Result<Expr<'a>, EvalError> {
        self.nodes += 1;
        if self.nodes > MAX_NODES {
            return Err(EvalError::syntax("expression is too long", span));
        }
        Ok(Expr { kind, span })
    }

    fn enter(&mut self, span: SourceSpan) -> Result<(), EvalError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(EvalError::syntax("expression is nested too deeply", span));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn peek_kind(&mut self) -> Result<Option<TokenKind>, EvalError> {
        match self.lexer.peek() {
            Some(Ok(token)) => Ok(Some(token.kind)),
            Some(Err(err)) => Err(err.clone()),
            None => Ok(None),
        }
    }

    fn eat(&mut self, kind: TokenKind) -> Result<Option<Token<'a>>, EvalError> {
        if self.peek_kind()? == Some(kind) {
            return self.lexer.next().transpose();
        }
        Ok(None)
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token<'a>, EvalError> {
        match self.lexer.next() {
            Some(Ok(token)) if token.kind == kind => Ok(token),
            Some(Ok(token)) => Err(EvalError::syntax(
                format!("expected {what}, found `{}`", token.slice),
                token.span(),
            )),
            Some(Err(err)) => Err(err),
            None => Err(self.eof(what)),
        }
    }

    fn eof(&self, what: &str) -> EvalError {
        EvalError::syntax(
            format!("unexpected end of input, expected {what}"),
            (self.source.len(), 0),
        )
    }

    fn unexpected(&self, token: Token<'a>) -> EvalError {
        EvalError::syntax(format!("unexpected `{}`", token.slice), token.span())
    }

    /// `a, b, c` with an optional trailing comma becomes a tuple.
    fn parse_tuple(&mut self) -> Result<Expr<'a>, EvalError> {
        let first = self.parse_named()?;
        if self.peek_kind()? != Some(TokenKind::Comma) {
            return Ok(first);
        }

        let start = first.span;
        let mut end = first.span;
        let mut items = vec![first];
        while let Some(comma) = self.eat(TokenKind::Comma)? {
            end = comma.span();
            if !self.starts_expression()? {
                break;
            }
            let item = self.parse_named()?;
            end = item.span;
            items.push(item);
        }
        self.node(ExprKind::Tuple(items), join(start, end))
    }

    fn starts_expression(&mut self) -> Result<bool, EvalError> {
        Ok(!matches!(
            self.peek_kind()?,
            None | Some(
                TokenKind::RightParen
                    | TokenKind::RightBracket
                    | TokenKind::RightBrace
                    | TokenKind::Equal
                    | TokenKind::Colon
                    | TokenKind::Semicolon
            )
        ))
    }

    fn parse_named(&mut self) -> Result<Expr<'a>, EvalError> {
        let target = self.parse_expr()?;
        if self.eat(TokenKind::ColonEqual)?.is_none() {
            return Ok(target);
        }
        let value = self.parse_expr()?;
        let span = join(target.span, value.span);
        self.node(
            ExprKind::NamedExpr {
                target: Box::new(target),
                value: Box::new(value),
            },
            span,
        )
    }

    fn parse_expr(&mut self) -> Result<Expr<'a>, EvalError> {
        let start: SourceSpan = (self.lexer.position(), 0).into();
        self.enter(start)?;
        let expr = self.parse_conditional();
        self.leave();
        expr
    }

    fn parse_conditional(&mut self) -> Result<Expr<'a>, EvalError> {
        if let Some(lambda) = self.eat(TokenKind::Lambda)? {
            return self.parse_lambda(lambda);
        }

        let body = self.parse_or()?;
        if self.eat(TokenKind::If)?.is_none() {
            return Ok(body);
        }
        let test = self.parse_or()?;
        self.expect(TokenKind::Else, "`else`")?;
        let orelse = self.parse_expr()?;
        let span = join(body.span, orelse.span);
        self.node(
            ExprKind::IfElse {
                body: Box::new(body),
                test: Box::new(test),
                orelse: Box::new(orelse),
            },
            span,
        )
    }

    fn parse_lambda(&mut self, lambda: Token<'a>) -> Result<Expr<'a>, EvalError> {
        let mut params = vec![];
        while let Some(param) = self.eat(TokenKind::Ident)? {
            params.push(param.slice);
            if self.eat(TokenKind::Comma)?.is_none() {
                break;
            }
        }
        self.expect(TokenKind::Colon, "`:`")?;
        let body = self.parse_expr()?;
        let span = join(lambda.span(), body.span);
        self.node(
            ExprKind::Lambda {
                params,
                body: Box::new(body),
            },
            span,
        )
    }

    fn parse_or(&mut self) -> Result<Expr<'a>, EvalError> {
        self.parse_bool(BoolOp::Or, TokenKind::Or, Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr<'a>, EvalError> {
        self.parse_bool(BoolOp::And, TokenKind::And, Self::parse_not)
    }

    fn parse_bool(
        &mut self,
        op: BoolOp,
        token: TokenKind,
        operand: fn(&mut Self) -> Result<Expr<'a>, EvalError>,
    ) -> Result<Expr<'a>, EvalError> {
        let first = operand(self)?;
        if self.peek_kind()? != Some(token) {
            return Ok(first);
        }

        let mut values = vec![first];
        while self.eat(token)?.is_some() {
            values.push(operand(self)?);
        }
        let span = join(values[0].span, values[values.len() - 1].span);
        self.node(ExprKind::BoolOp { op, values }, span)
    }

    fn parse_not(&mut self) -> Result<Expr<'a>, EvalError> {
        let Some(not) = self.eat(TokenKind::Not)? else {
            return self.parse_comparison();
        };
        self.enter(not.span())?;
        let operand = self.parse_not();
        self.leave();
        let operand = operand?;
        let span = join(not.span(), operand.span);
        self.node(
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            },
            span,
        )
    }

    fn comparison_op(&mut self) -> Result<Option<CmpOp>, EvalError> {
        let op = match self.peek_kind()? {
            Some(TokenKind::EqualEqual) => CmpOp::Eq,
            Some(TokenKind::BangEqual) => CmpOp::NotEq,
            Some(TokenKind::Less) => CmpOp::Lt,
            Some(TokenKind::LessEqual) => CmpOp::LtE,
            Some(TokenKind::Greater) => CmpOp::Gt,
            Some(TokenKind::GreaterEqual) => CmpOp::GtE,
            Some(TokenKind::In) => CmpOp::In,
            Some(TokenKind::Is) => {
                self.lexer.next();
                return Ok(Some(if self.eat(TokenKind::Not)?.is_some() {
                    CmpOp::IsNot
                } else {
                    CmpOp::Is
                }));
            }
            Some(TokenKind::Not) => {
                self.lexer.next();
                self.expect(TokenKind::In, "`in` after `not`")?;
                return Ok(Some(CmpOp::NotIn));
            }
            _ => return Ok(None),
        };
        self.lexer.next();
        Ok(Some(op))
    }

    fn parse_comparison(&mut self) -> Result<Expr<'a>, EvalError> {
        let left = self.parse_binary(1)?;
        let mut rest = vec![];
        while let Some(op) = self.comparison_op()? {
            rest.push((op, self.parse_binary(1)?));
        }
        let Some((_, last)) = rest.last() else {
            return Ok(left);
        };
        let span = join(left.span, last.span);
        self.node(
            ExprKind::Compare {
                left: Box::new(left),
                rest,
            },
            span,
        )
    }

    /// Precedence climbing over the left-associative binary operators.
    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr<'a>, EvalError> {
        let mut left = self.parse_unary()?;
        loop {
            let Some((op, prec)) = self.peek_kind()?.and_then(binary_op) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            self.lexer.next();
            let right = self.parse_binary(prec + 1)?;
            let span = join(left.span, right.span);
            left = self.node(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            )?;
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr<'a>, EvalError> {
        let op = match self.peek_kind()? {
            Some(TokenKind::Plus) => UnaryOp::Plus,
            Some(TokenKind::Minus) => UnaryOp::Minus,
            Some(TokenKind::Tilde) => UnaryOp::Invert,
            _ => return self.parse_power(),
        };
        let Some(token) = self.lexer.next().transpose()? else {
            return Err(self.eof("an operand"));
        };

        self.enter(token.span())?;
        let operand = self.parse_unary();
        self.leave();
        let operand = operand?;
        let span = join(token.span(), operand.span);
        self.node(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        )
    }

    /// `**` binds tighter than a unary operator on its left and is
    /// right-associative, so `-2 ** 2` is `-(2 ** 2)` and `2 ** -1` parses.
    fn parse_power(&mut self) -> Result<Expr<'a>, EvalError> {
        let base = self.parse_postfix()?;
        let Some(star_star) = self.eat(TokenKind::StarStar)? else {
            return Ok(base);
        };
        self.enter(star_star.span())?;
        let exponent = self.parse_unary();
        self.leave();
        let exponent = exponent?;
        let span = join(base.span, exponent.span);
        self.node(
            ExprKind::Binary {
                op: BinOp::Pow,
                left: Box::new(base),
                right: Box::new(exponent),
            },
            span,
        )
    }

    fn parse_postfix(&mut self) -> Result<Expr<'a>, EvalError> {
        let mut expr = self.parse_atom()?;
        loop {
            match self.peek_kind()? {
                Some(TokenKind::LeftParen) => {
                    self.lexer.next();
                    let (args, close) = self.parse_call_args()?;
                    let span = join(expr.span, close.span());
                    expr = self.node(
                        ExprKind::Call {
                            func: Box::new(expr),
                            args,
                        },
                        span,
                    )?;
                }
                Some(TokenKind::Dot) => {
                    self.lexer.next();
                    let attr = self.expect(TokenKind::Ident, "an attribute name")?;
                    let span = join(expr.span, attr.span());
                    expr = self.node(
                        ExprKind::Attribute {
                            value: Box::new(expr),
                            attr: attr.slice,
                        },
                        span,
                    )?;
                }
                Some(TokenKind::LeftBracket) => {
                    self.lexer.next();
                    let index = self.parse_tuple()?;
                    let close = self.expect(TokenKind::RightBracket, "`]`")?;
                    let span = join(expr.span, close.span());
                    expr = self.node(
                        ExprKind::Subscript {
                            value: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    )?;
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_call_args(&mut self) -> Result<(Vec<Expr<'a>>, Token<'a>), EvalError> {
        let mut args = vec![];
        loop {
            if let Some(close) = self.eat(TokenKind::RightParen)? {
                return Ok((args, close));
            }

            let arg = if let Some(star) = self.eat(TokenKind::Star)? {
                let value = self.parse_expr()?;
                let span = join(star.span(), value.span);
                self.node(ExprKind::Starred(Box::new(value)), span)?
            } else {
                let value = self.parse_named()?;
                match value.kind {
                    ExprKind::Name(name) if self.eat(TokenKind::Equal)?.is_some() => {
                        let keyword_value = self.parse_expr()?;
                        let span = join(value.span, keyword_value.span);
                        self.node(
                            ExprKind::Keyword {
                                name,
                                value: Box::new(keyword_value),
                            },
                            span,
                        )?
                    }
                    _ => value,
                }
            };
            args.push(arg);

            if self.eat(TokenKind::Comma)?.is_none() {
                let close = self.expect(TokenKind::RightParen, "`,` or `)`")?;
                return Ok((args, close));
            }
        }
    }

    fn parse_atom(&mut self) -> Result<Expr<'a>, EvalError> {
        let token = match self.lexer.next() {
            Some(Ok(token)) => token,
            Some(Err(err)) => return Err(err),
            None => return Err(self.eof("an expression")),
        };

        match token.kind {
            TokenKind::Number => {
                let value = parse_number(token.slice)
                    .ok_or_else(|| EvalError::syntax("invalid decimal literal", token.span()))?;
                self.node(ExprKind::Number(value), token.span())
            }
            TokenKind::Ident => self.node(ExprKind::Name(token.slice), token.span()),
            TokenKind::True => self.node(ExprKind::Bool(true), token.span()),
            TokenKind::False => self.node(ExprKind::Bool(false), token.span()),
            TokenKind::None => self.node(ExprKind::None, token.span()),
            TokenKind::String => {
                let mut span = token.span();
                while let Some(next) = self.eat(TokenKind::String)? {
                    span = join(span, next.span());
                }
                let literal = &self.source[span.offset()..span.offset() + span.len()];
                self.node(ExprKind::Str(literal), span)
            }
            TokenKind::LeftParen => {
                if let Some(close) = self.eat(TokenKind::RightParen)? {
                    return self.node(ExprKind::Tuple(vec![]), join(token.span(), close.span()));
                }
                let inner = self.parse_tuple()?;
                self.expect(TokenKind::RightParen, "`)`")?;
                Ok(inner)
            }
            TokenKind::LeftBracket => {
                let (items, close) = self.parse_items(TokenKind::RightBracket, "`]`")?;
                self.node(ExprKind::List(items), join(token.span(), close.span()))
            }
            TokenKind::LeftBrace => self.parse_braces(token),
            _ => Err(self.unexpected(token)),
        }
    }

    fn parse_items(
        &mut self,
        close: TokenKind,
        what: &str,
    ) -> Result<(Vec<Expr<'a>>, Token<'a>), EvalError> {
        let mut items = vec![];
        loop {
            if let Some(token) = self.eat(close)? {
                return Ok((items, token));
            }
            items.push(self.parse_named()?);
            if self.eat(TokenKind::Comma)?.is_none() {
                let token = self.expect(close, what)?;
                return Ok((items, token));
            }
        }
    }

    fn parse_braces(&mut self, open: Token<'a>) -> Result<Expr<'a>, EvalError> {
        if let Some(close) = self.eat(TokenKind::RightBrace)? {
            return self.node(ExprKind::Dict(vec![]), join(open.span(), close.span()));
        }

        let first = self.parse_expr()?;
        if self.eat(TokenKind::Colon)?.is_none() {
            let mut items = vec![first];
            let close = if self.eat(TokenKind::Comma)?.is_some() {
                let (rest, close) = self.parse_items(TokenKind::RightBrace, "`}`")?;
                items.extend(rest);
                close
            } else {
                self.expect(TokenKind::RightBrace, "`}`")?
            };
            return self.node(ExprKind::Set(items), join(open.span(), close.span()));
        }

        let mut entries = vec![(first, self.parse_expr()?)];
        loop {
            if let Some(close) = self.eat(TokenKind::RightBrace)? {
                return self.node(ExprKind::Dict(entries), join(open.span(), close.span()));
            }
            if self.eat(TokenKind::Comma)?.is_none() {
                let close = self.expect(TokenKind::RightBrace, "`}`")?;
                return self.node(ExprKind::Dict(entries), join(open.span(), close.span()));
            }
            if let Some(close) = self.eat(TokenKind::RightBrace)? {
                return self.node(ExprKind::Dict(entries), join(open.span(), close.span()));
            }
            let key = self.parse_expr()?;
            self.expect(TokenKind::Colon, "`:`")?;
            entries.push((key, self.parse_expr()?));
        }
    }
}

/// Converts a literal the lexer accepted. Integers that do not fit in an
/// `i64` fall back to floating point.
pub fn parse_number(slice: &str) -> Option<Number> {
    let digits: String = slice.chars().filter(|&c| c != '_').collect();
    let is_integer = digits.bytes().all(|b| b.is_ascii_digit());
    if is_integer {
        if let Ok(n) = digits.parse::<i64>() {
            return Some(Number::Int(n));
        }
    }
    digits.parse::<f64>().ok().map(Number::Float)
}
