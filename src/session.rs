//! Calculator front-end state.
//!
//! A `Session` owns what a calculator window shows: the expression being
//! composed, the display line and the memory register. Buttons and keys are
//! explicit transitions on that state; evaluation goes through
//! [`normalize`](crate::normalize::normalize) and
//! [`evaluate`](crate::evaluator::evaluate).

use crate::{error::EvalError, evaluator::evaluate, normalize::normalize, number::Number};

/// What the display shows after any failed evaluation.
pub const ERROR_DISPLAY: &str = "Error";

/// How an evaluation failure is shown on the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorDisplay {
    /// A bare `Error`, whatever went wrong.
    #[default]
    Generic,
    /// The error message, e.g. `division by zero`.
    Detailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Digit(char),
    Dot,
    Add,
    Subtract,
    Multiply,
    Divide,
    Percent,
    Power,
    Sqrt,
    Equals,
    Back,
    Clear,
    AllClear,
    MemoryClear,
    MemoryRecall,
    MemoryAdd,
}

impl Key {
    /// Maps a button label as printed on the keypad.
    pub fn from_label(label: &str) -> Option<Self> {
        let key = match label {
            "." => Key::Dot,
            "+" => Key::Add,
            "-" => Key::Subtract,
            "×" => Key::Multiply,
            "÷" => Key::Divide,
            "%" => Key::Percent,
            "^" => Key::Power,
            "√" => Key::Sqrt,
            "=" => Key::Equals,
            "Back" => Key::Back,
            "C" => Key::Clear,
            "AC" => Key::AllClear,
            "MC" => Key::MemoryClear,
            "MR" => Key::MemoryRecall,
            "M+" => Key::MemoryAdd,
            _ => {
                let mut chars = label.chars();
                return match (chars.next(), chars.next()) {
                    (Some(d), None) if d.is_ascii_digit() => Some(Key::Digit(d)),
                    _ => None,
                };
            }
        };
        Some(key)
    }

    /// Maps a typed character. Enter evaluates, backspace deletes and escape
    /// clears everything.
    pub fn from_char(c: char) -> Option<Self> {
        let key = match c {
            '0'..='9' => Key::Digit(c),
            '.' => Key::Dot,
            '+' => Key::Add,
            '-' => Key::Subtract,
            '*' => Key::Multiply,
            '/' => Key::Divide,
            '^' => Key::Power,
            '\n' | '\r' => Key::Equals,
            '\u{8}' | '\u{7f}' => Key::Back,
            '\u{1b}' => Key::AllClear,
            _ => return None,
        };
        Some(key)
    }

    /// Text appended to the expression, for keys that append.
    fn token(self) -> Option<&'static str> {
        let token = match self {
            Key::Digit(d) => return DIGITS.get(d.to_digit(10)? as usize).copied(),
            Key::Dot => ".",
            Key::Add => "+",
            Key::Subtract => "-",
            Key::Multiply => "*",
            Key::Divide => "/",
            Key::Percent => "%",
            Key::Power => "**",
            Key::Sqrt => "sqrt(",
            _ => return None,
        };
        Some(token)
    }
}

const DIGITS: [&str; 10] = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    expression: String,
    display: String,
    memory: f64,
    errors: ErrorDisplay,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(ErrorDisplay::default())
    }
}

impl Session {
    pub fn new(errors: ErrorDisplay) -> Self {
        Self {
            expression: String::new(),
            display: "0".to_string(),
            memory: 0.0,
            errors,
        }
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn memory(&self) -> f64 {
        self.memory
    }

    pub fn press(&mut self, key: Key) {
        tracing::trace!(?key, "key pressed");

        match key {
            Key::Equals => {
                if let Err(err) = self.calculate() {
                    tracing::trace!(error = %err, "calculation failed");
                }
            }
            Key::Back => self.back(),
            Key::Clear => self.clear(),
            Key::AllClear => self.all_clear(),
            Key::MemoryClear => self.memory = 0.0,
            Key::MemoryRecall => {
                self.expression = Number::Float(self.memory).to_string();
                self.display = self.expression.clone();
            }
            Key::MemoryAdd => {
                if let Ok(value) = self.display.trim().parse::<f64>() {
                    self.memory += value;
                }
            }
            _ => {
                if let Some(token) = key.token() {
                    self.type_text(token);
                }
            }
        }
    }

    /// Appends raw text to the expression, as if typed.
    pub fn type_text(&mut self, text: &str) {
        self.expression.push_str(text);
        self.display = self.expression.clone();
    }

    /// Evaluates the current expression. `%` means percent here, so it is
    /// expanded to `/100` before the glyphs are normalized.
    ///
    /// On success the rendered result becomes both the display and the new
    /// expression, so the next keys continue from it. On failure the
    /// expression is dropped.
    pub fn calculate(&mut self) -> Result<Number, EvalError> {
        let expanded = self.expression.replace('%', "/100");
        let result = evaluate(&normalize(&expanded));

        match &result {
            Ok(value) => {
                self.display = value.to_string();
                self.expression = self.display.clone();
            }
            Err(err) => {
                self.display = match self.errors {
                    ErrorDisplay::Generic => ERROR_DISPLAY.to_string(),
                    ErrorDisplay::Detailed => err.to_string(),
                };
                self.expression.clear();
            }
        }
        tracing::trace!(display = %self.display, "calculated");
        result
    }

    pub fn back(&mut self) {
        self.expression.pop();
        self.display = if self.expression.is_empty() {
            "0".to_string()
        } else {
            self.expression.clone()
        };
    }

    pub fn clear(&mut self) {
        self.expression.clear();
        self.display = "0".to_string();
    }

    pub fn all_clear(&mut self) {
        self.clear();
        self.memory = 0.0;
    }
}
