use miette::SourceSpan;

use crate::error::EvalError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'a> {
    pub slice: &'a str,
    pub offset: usize,
    pub kind: TokenKind,
}

impl Token<'_> {
    pub fn span(&self) -> SourceSpan {
        (self.offset, self.slice.len()).into()
    }
}

impl<'a> std::fmt::Display for Token<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.slice)
    }
}

/// Everything a Python-style expression can be made of. The lexer knows
/// about far more than the evaluator accepts so that strings, attribute
/// access and friends reach the evaluator as tree nodes and get rejected
/// there, instead of being misread as something harmless.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Colon,
    Semicolon,
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    Percent,
    At,
    Amp,
    Pipe,
    Caret,
    Tilde,
    LessLess,
    GreaterGreater,
    Equal,
    ColonEqual,
    EqualEqual,
    BangEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    String,
    Number,
    Ident,
    And,
    Or,
    Not,
    If,
    Else,
    Lambda,
    In,
    Is,
    True,
    False,
    None,
}

#[derive(Debug)]
pub struct Lexer<'a> {
    rest: &'a str,
    byte: usize,
    pub peeked: Option<Result<Token<'a>, EvalError>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            rest: input,
            byte: 0,
            peeked: None,
        }
    }

    pub fn peek(&mut self) -> Option<&Result<Token<'a>, EvalError>> {
        if self.peeked.is_some() {
            return self.peeked.as_ref();
        }

        self.peeked = self.next();
        self.peeked.as_ref()
    }

    /// Byte offset just past the last consumed character.
    pub fn position(&self) -> usize {
        self.byte
    }

    fn advance(&mut self, bytes: usize) {
        self.byte += bytes;
        self.rest = &self.rest[bytes..];
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>, EvalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(next) = self.peeked.take() {
            return Some(next);
        }

        loop {
            let mut chars = self.rest.chars();
            let c = chars.next()?;
            let offset = self.byte;
            let c_onwards = self.rest;
            self.rest = chars.as_str();
            self.byte += c.len_utf8();

            enum Started {
                String(char),
                Number,
                Ident,
                DotOrNumber,
                Compound(&'static [(char, TokenKind)], Option<TokenKind>),
                Comment,
            }

            let make_token = |kind: TokenKind| {
                Some(Ok(Token {
                    slice: &c_onwards[..c.len_utf8()],
                    offset,
                    kind,
                }))
            };

            let started = match c {
                '(' => return make_token(TokenKind::LeftParen),
                ')' => return make_token(TokenKind::RightParen),
                '[' => return make_token(TokenKind::LeftBracket),
                ']' => return make_token(TokenKind::RightBracket),
                '{' => return make_token(TokenKind::LeftBrace),
                '}' => return make_token(TokenKind::RightBrace),
                ',' => return make_token(TokenKind::Comma),
                ';' => return make_token(TokenKind::Semicolon),
                '+' => return make_token(TokenKind::Plus),
                '-' => return make_token(TokenKind::Minus),
                '%' => return make_token(TokenKind::Percent),
                '@' => return make_token(TokenKind::At),
                '&' => return make_token(TokenKind::Amp),
                '|' => return make_token(TokenKind::Pipe),
                '^' => return make_token(TokenKind::Caret),
                '~' => return make_token(TokenKind::Tilde),
                '*' => Started::Compound(&[('*', TokenKind::StarStar)], Some(TokenKind::Star)),
                '/' => Started::Compound(&[('/', TokenKind::SlashSlash)], Some(TokenKind::Slash)),
                '=' => Started::Compound(&[('=', TokenKind::EqualEqual)], Some(TokenKind::Equal)),
                ':' => Started::Compound(&[('=', TokenKind::ColonEqual)], Some(TokenKind::Colon)),
                '!' => Started::Compound(&[('=', TokenKind::BangEqual)], None),
                '<' => Started::Compound(
                    &[('=', TokenKind::LessEqual), ('<', TokenKind::LessLess)],
                    Some(TokenKind::Less),
                ),
                '>' => Started::Compound(
                    &[('=', TokenKind::GreaterEqual), ('>', TokenKind::GreaterGreater)],
                    Some(TokenKind::Greater),
                ),
                '.' => Started::DotOrNumber,
                '#' => Started::Comment,
                '"' | '\'' => Started::String(c),
                '0'..='9' => Started::Number,
                'a'..='z' | 'A'..='Z' | '_' => Started::Ident,
                c if c.is_whitespace() => continue,
                _ => {
                    return Some(Err(EvalError::syntax(
                        format!("unexpected character `{c}`"),
                        (offset, c.len_utf8()),
                    )))
                }
            };

            match started {
                Started::Compound(pairs, single) => {
                    let second = self.rest.chars().next();
                    if let Some(&(_, kind)) = pairs.iter().find(|(ch, _)| Some(*ch) == second) {
                        self.advance(1);
                        return Some(Ok(Token {
                            slice: &c_onwards[..2],
                            offset,
                            kind,
                        }));
                    }
                    return match single {
                        Some(kind) => make_token(kind),
                        None => Some(Err(EvalError::syntax(
                            format!("unexpected character `{c}`"),
                            (offset, c.len_utf8()),
                        ))),
                    };
                }
                Started::Comment => {
                    let line_end = self.rest.find('\n').unwrap_or(self.rest.len());
                    self.advance(line_end);
                    continue;
                }
                Started::DotOrNumber => {
                    if !self.rest.starts_with(|ch: char| ch.is_ascii_digit()) {
                        return make_token(TokenKind::Dot);
                    }
                    return Some(self.number(c_onwards, offset));
                }
                Started::Number => return Some(self.number(c_onwards, offset)),
                Started::Ident => {
                    let first_non_ident = c_onwards
                        .find(|c| !matches!(c, 'a'..='z' | 'A'..='Z' | '_' | '0'..='9'))
                        .unwrap_or(c_onwards.len());

                    let literal = &c_onwards[..first_non_ident];
                    self.advance(literal.len() - c.len_utf8());

                    let kind = match literal {
                        "and" => TokenKind::And,
                        "or" => TokenKind::Or,
                        "not" => TokenKind::Not,
                        "if" => TokenKind::If,
                        "else" => TokenKind::Else,
                        "lambda" => TokenKind::Lambda,
                        "in" => TokenKind::In,
                        "is" => TokenKind::Is,
                        "True" => TokenKind::True,
                        "False" => TokenKind::False,
                        "None" => TokenKind::None,
                        _ => TokenKind::Ident,
                    };

                    return Some(Ok(Token {
                        slice: literal,
                        offset,
                        kind,
                    }));
                }
                Started::String(quote) => {
                    let mut escaped = false;
                    let end = self.rest.char_indices().find_map(|(i, ch)| {
                        if escaped {
                            escaped = false;
                        } else if ch == '\\' {
                            escaped = true;
                        } else if ch == quote || ch == '\n' {
                            return Some((i, ch));
                        }
                        None
                    });

                    match end {
                        Some((end, ch)) if ch == quote => {
                            let literal = &c_onwards[..end + 2];
                            self.advance(end + 1);
                            return Some(Ok(Token {
                                slice: literal,
                                offset,
                                kind: TokenKind::String,
                            }));
                        }
                        _ => {
                            let len = c_onwards.len();
                            self.advance(self.rest.len());
                            return Some(Err(EvalError::syntax(
                                "unterminated string literal",
                                (offset, len),
                            )));
                        }
                    }
                }
            }
        }
    }
}

impl<'a> Lexer<'a> {
    /// Scans a decimal literal starting at `c_onwards`, whose first character
    /// has already been consumed.
    fn number(&mut self, c_onwards: &'a str, offset: usize) -> Result<Token<'a>, EvalError> {
        let bytes = c_onwards.as_bytes();
        let digits = |from: usize| {
            from + bytes[from..]
                .iter()
                .take_while(|b| b.is_ascii_digit() || **b == b'_')
                .count()
        };

        let mut end = digits(0);
        if bytes.get(end) == Some(&b'.') {
            end = digits(end + 1);
        }
        if matches!(bytes.get(end), Some(b'e' | b'E')) {
            let mut exp = end + 1;
            if matches!(bytes.get(exp), Some(b'+' | b'-')) {
                exp += 1;
            }
            if bytes.get(exp).is_some_and(u8::is_ascii_digit) {
                end = digits(exp);
            }
        }

        let literal = &c_onwards[..end];
        self.advance(end - 1);

        let invalid = |message: &str| -> Result<Token<'a>, EvalError> {
            Err(EvalError::syntax(message, (offset, end)))
        };

        if c_onwards[end..].starts_with(|ch: char| ch.is_alphanumeric() || ch == '_') {
            return invalid("invalid decimal literal");
        }
        let misplaced_underscore = literal.ends_with('_')
            || literal.contains("__")
            || ["_.", "._", "_e", "_E", "e_", "E_"]
                .iter()
                .any(|pair| literal.contains(pair));
        if misplaced_underscore {
            return invalid("invalid decimal literal");
        }
        let is_integer = literal.bytes().all(|b| b.is_ascii_digit() || b == b'_');
        if is_integer && literal.starts_with('0') && literal.bytes().any(|b| (b'1'..=b'9').contains(&b)) {
            return invalid("leading zeros in decimal integer literals are not permitted");
        }

        Ok(Token {
            slice: literal,
            offset,
            kind: TokenKind::Number,
        })
    }
}
