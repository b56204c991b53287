//! Declarative boolean expressions over action inputs.
//!
//! Grammar:
//!
//! ```text
//! or      := and (("||" | "or") and)*
//! and     := unary (("&&" | "and") unary)*
//! unary   := ("!" | "not") unary | primary
//! primary := "(" or ")" | operand (cmp operand)?
//! cmp     := "==" | "!=" | "<" | "<=" | ">" | ">="
//! operand := number | string | "true" | "false" | "null" | path
//! ```
//!
//! Paths resolve against the action: `harm` and `parameters.harm` read a
//! parameter, `context.consent` reads the context, and `action.type`,
//! `action.actor`, `action.target`, `action.description` read fields.
//!
//! Evaluation is three-valued. A missing path, or an ordering comparison
//! between values that have no order, yields [`Truth::Unknown`].

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use covenant_primitives::Action;
use serde_json::{Map, Value};
use thiserror::Error;

/// Kleene truth value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Truth {
    /// Proven to hold.
    True,
    /// Proven not to hold.
    False,
    /// Could not be decided from the available inputs.
    Unknown,
}

impl Truth {
    /// Converts a boolean.
    #[must_use]
    pub const fn from_bool(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }

    /// Kleene conjunction.
    #[must_use]
    pub const fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::False, _) | (_, Self::False) => Self::False,
            (Self::True, Self::True) => Self::True,
            _ => Self::Unknown,
        }
    }

    /// Kleene disjunction.
    #[must_use]
    pub const fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::True, _) | (_, Self::True) => Self::True,
            (Self::False, Self::False) => Self::False,
            _ => Self::Unknown,
        }
    }

    /// Kleene negation.
    #[must_use]
    pub const fn not(self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Unknown => Self::Unknown,
        }
    }
}

/// Expression parse failure.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid expression at byte {position}: {message}")]
pub struct ExprError {
    /// Byte offset where the failure was detected.
    pub position: usize,
    /// Description of the failure.
    pub message: String,
}

impl ExprError {
    fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Comparison operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        })
    }
}

/// Parsed expression tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Literal value.
    Literal(Value),
    /// Dotted path into the action.
    Path(Vec<String>),
    /// Negation.
    Not(Box<Expr>),
    /// Conjunction.
    And(Box<Expr>, Box<Expr>),
    /// Disjunction.
    Or(Box<Expr>, Box<Expr>),
    /// Binary comparison between two operands.
    Compare {
        /// Operator.
        op: CompareOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
}

/// Values an expression is evaluated against.
#[derive(Clone, Copy, Debug)]
pub struct Bindings<'a> {
    action: &'a Action,
    parameters: &'a Map<String, Value>,
}

impl<'a> Bindings<'a> {
    /// Binds directly to the action's own parameters.
    #[must_use]
    pub fn of(action: &'a Action) -> Self {
        Self {
            action,
            parameters: action.parameters(),
        }
    }

    /// Binds to the action but substitutes the parameter map.
    #[must_use]
    pub fn with_parameters(action: &'a Action, parameters: &'a Map<String, Value>) -> Self {
        Self { action, parameters }
    }

    fn resolve(&self, path: &[String]) -> Option<Cow<'a, Value>> {
        let (head, rest) = path.split_first()?;
        match head.as_str() {
            "parameters" => walk_map(self.parameters, rest),
            "context" => walk_map(self.action.context(), rest),
            "action" => {
                let [field] = rest else { return None };
                let value = match field.as_str() {
                    "type" => Value::from(self.action.kind()),
                    "actor" => Value::from(self.action.actor()),
                    "description" => Value::from(self.action.description()),
                    "id" => Value::from(self.action.id().as_str()),
                    "target" => Value::from(self.action.target()?),
                    _ => return None,
                };
                Some(Cow::Owned(value))
            }
            _ => walk_map(self.parameters, path),
        }
    }
}

fn walk_map<'a>(map: &'a Map<String, Value>, path: &[String]) -> Option<Cow<'a, Value>> {
    let Some((head, rest)) = path.split_first() else {
        return Some(Cow::Owned(Value::Object(map.clone())));
    };
    let mut current = map.get(head)?;
    for segment in rest {
        current = match current {
            Value::Object(inner) => inner.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(Cow::Borrowed(current))
}

impl Expr {
    /// Parses an expression.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError`] describing the first syntax error.
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            tokens,
            index: 0,
            end: source.len(),
        };
        let expr = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(ExprError::new(token.position, "unexpected trailing input"));
        }
        Ok(expr)
    }

    /// Evaluates the expression against the action's own inputs.
    #[must_use]
    pub fn evaluate(&self, action: &Action) -> Truth {
        self.evaluate_with(&Bindings::of(action))
    }

    /// Evaluates the expression against explicit bindings.
    #[must_use]
    pub fn evaluate_with(&self, bindings: &Bindings<'_>) -> Truth {
        match self {
            Self::Literal(Value::Bool(value)) => Truth::from_bool(*value),
            Self::Literal(_) => Truth::Unknown,
            Self::Path(path) => match bindings.resolve(path).as_deref() {
                Some(Value::Bool(value)) => Truth::from_bool(*value),
                _ => Truth::Unknown,
            },
            Self::Not(inner) => inner.evaluate_with(bindings).not(),
            Self::And(left, right) => left
                .evaluate_with(bindings)
                .and(right.evaluate_with(bindings)),
            Self::Or(left, right) => left
                .evaluate_with(bindings)
                .or(right.evaluate_with(bindings)),
            Self::Compare { op, left, right } => {
                let (Some(left), Some(right)) = (left.operand(bindings), right.operand(bindings))
                else {
                    return Truth::Unknown;
                };
                compare(*op, &left, &right)
            }
        }
    }

    /// Returns the parameter names referenced by the expression.
    #[must_use]
    pub fn parameter_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_parameters(&mut names);
        names.sort();
        names.dedup();
        names
    }

    fn collect_parameters(&self, names: &mut Vec<String>) {
        match self {
            Self::Literal(_) => {}
            Self::Path(path) => match path.first().map(String::as_str) {
                Some("context" | "action") | None => {}
                Some("parameters") => {
                    if let Some(name) = path.get(1) {
                        names.push(name.clone());
                    }
                }
                Some(name) => names.push(name.to_owned()),
            },
            Self::Not(inner) => inner.collect_parameters(names),
            Self::And(left, right) | Self::Or(left, right) => {
                left.collect_parameters(names);
                right.collect_parameters(names);
            }
            Self::Compare { left, right, .. } => {
                left.collect_parameters(names);
                right.collect_parameters(names);
            }
        }
    }

    fn operand<'a>(&'a self, bindings: &Bindings<'a>) -> Option<Cow<'a, Value>> {
        match self {
            Self::Literal(value) => Some(Cow::Borrowed(value)),
            Self::Path(path) => bindings.resolve(path),
            _ => None,
        }
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Truth {
    let ordering = match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    };

    match op {
        CompareOp::Eq => Truth::from_bool(ordering.map_or(left == right, Ordering::is_eq)),
        CompareOp::Ne => Truth::from_bool(ordering.map_or(left != right, Ordering::is_ne)),
        CompareOp::Lt => ordering.map_or(Truth::Unknown, |o| Truth::from_bool(o.is_lt())),
        CompareOp::Le => ordering.map_or(Truth::Unknown, |o| Truth::from_bool(o.is_le())),
        CompareOp::Gt => ordering.map_or(Truth::Unknown, |o| Truth::from_bool(o.is_gt())),
        CompareOp::Ge => ordering.map_or(Truth::Unknown, |o| Truth::from_bool(o.is_ge())),
    }
}

#[derive(Clone, Debug, PartialEq)]
enum TokenKind {
    Literal(Value),
    Ident(Vec<String>),
    Cmp(CompareOp),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

#[derive(Clone, Debug)]
struct Token {
    kind: TokenKind,
    position: usize,
}

fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;
        let two = bytes.get(i..i + 2);
        let kind = match c {
            b' ' | b'\t' | b'\n' | b'\r' => {
                i += 1;
                continue;
            }
            b'(' => {
                i += 1;
                TokenKind::LParen
            }
            b')' => {
                i += 1;
                TokenKind::RParen
            }
            b'&' if two == Some(b"&&") => {
                i += 2;
                TokenKind::And
            }
            b'|' if two == Some(b"||") => {
                i += 2;
                TokenKind::Or
            }
            b'=' if two == Some(b"==") => {
                i += 2;
                TokenKind::Cmp(CompareOp::Eq)
            }
            b'!' if two == Some(b"!=") => {
                i += 2;
                TokenKind::Cmp(CompareOp::Ne)
            }
            b'!' => {
                i += 1;
                TokenKind::Not
            }
            b'<' | b'>' => {
                let inclusive = bytes.get(i + 1) == Some(&b'=');
                i += if inclusive { 2 } else { 1 };
                TokenKind::Cmp(match (c, inclusive) {
                    (b'<', false) => CompareOp::Lt,
                    (b'<', true) => CompareOp::Le,
                    (_, false) => CompareOp::Gt,
                    (_, true) => CompareOp::Ge,
                })
            }
            b'"' | b'\'' => {
                let quote = c;
                i += 1;
                let content_start = i;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                if i >= bytes.len() {
                    return Err(ExprError::new(start, "unterminated string literal"));
                }
                let text = &source[content_start..i];
                i += 1;
                TokenKind::Literal(Value::from(text))
            }
            b'0'..=b'9' | b'-' | b'.' => {
                i += 1;
                while i < bytes.len() && matches!(bytes[i], b'0'..=b'9' | b'.' | b'e' | b'E') {
                    i += 1;
                }
                let text = &source[start..i];
                let number: f64 = text
                    .parse()
                    .map_err(|_| ExprError::new(start, format!("invalid number `{text}`")))?;
                let value = serde_json::Number::from_f64(number)
                    .map(Value::Number)
                    .ok_or_else(|| ExprError::new(start, "number must be finite"))?;
                TokenKind::Literal(value)
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                while i < bytes.len()
                    && matches!(bytes[i], b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'.')
                {
                    i += 1;
                }
                let word = &source[start..i];
                match word {
                    "true" => TokenKind::Literal(Value::Bool(true)),
                    "false" => TokenKind::Literal(Value::Bool(false)),
                    "null" => TokenKind::Literal(Value::Null),
                    "and" => TokenKind::And,
                    "or" => TokenKind::Or,
                    "not" => TokenKind::Not,
                    _ => {
                        let segments: Vec<String> = word.split('.').map(str::to_owned).collect();
                        if segments.iter().any(String::is_empty) {
                            return Err(ExprError::new(start, format!("invalid path `{word}`")));
                        }
                        TokenKind::Ident(segments)
                    }
                }
            }
            _ => {
                return Err(ExprError::new(
                    start,
                    format!("unexpected character `{}`", char::from(c)),
                ));
            }
        };
        tokens.push(Token {
            kind,
            position: start,
        });
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    index: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().is_some_and(|t| &t.kind == kind) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_unary()?;
        while self.eat(&TokenKind::And) {
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if self.eat(&TokenKind::Not) {
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        if self.eat(&TokenKind::LParen) {
            let inner = self.parse_or()?;
            if !self.eat(&TokenKind::RParen) {
                let position = self.peek().map_or(self.end, |t| t.position);
                return Err(ExprError::new(position, "expected `)`"));
            }
            return Ok(inner);
        }

        let (left, position) = self.parse_operand()?;
        if let Some(TokenKind::Cmp(op)) = self.peek().map(|t| t.kind.clone()) {
            self.index += 1;
            let (right, _) = self.parse_operand()?;
            return Ok(Expr::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
            });
        }

        match &left {
            Expr::Path(_) | Expr::Literal(Value::Bool(_)) => Ok(left),
            _ => Err(ExprError::new(position, "expected a boolean expression")),
        }
    }

    fn parse_operand(&mut self) -> Result<(Expr, usize), ExprError> {
        let Some(token) = self.next() else {
            return Err(ExprError::new(self.end, "unexpected end of expression"));
        };
        match token.kind {
            TokenKind::Literal(value) => Ok((Expr::Literal(value), token.position)),
            TokenKind::Ident(path) => Ok((Expr::Path(path), token.position)),
            _ => Err(ExprError::new(token.position, "expected a value or path")),
        }
    }
}
