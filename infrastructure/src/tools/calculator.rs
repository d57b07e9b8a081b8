//! Arithmetic tool: calculator
//!
//! Expressions are parsed by a small recursive-descent parser over a fixed
//! grammar. Nothing is ever handed to an interpreter.
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := factor (('*' | '×' | '/' | '÷') factor)*
//! factor  := ('+' | '-') factor | primary
//! primary := number | '(' expr ')'
//! ```

use std::time::Duration;

use aion_domain::{
    ArgumentsExt, ToolArguments, ToolContext, ToolContract, ToolDefinition, ToolError,
    ToolParameter,
};
use async_trait::async_trait;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

/// Tool name constant
pub const CALCULATOR: &str = "calculator";

/// Parenthesis nesting limit.
const MAX_DEPTH: usize = 64;

/// Largest integer an f64 holds exactly (2^53).
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("unexpected {0}")]
    UnexpectedToken(String),

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("division by zero")]
    DivisionByZero,

    #[error("expression nested too deeply")]
    TooDeep,

    #[error("result is not a finite number")]
    NotFinite,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Plus,
    Minus,
    Mul,
    Div,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Num(n) => format!("number {}", n),
            Token::Plus => "'+'".into(),
            Token::Minus => "'-'".into(),
            Token::Mul => "'*'".into(),
            Token::Div => "'/'".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, EvalError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        literal.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| EvalError::InvalidNumber(literal.clone()))?;
                tokens.push(Token::Num(value));
            }
            _ => {
                let token = match c {
                    '+' => Token::Plus,
                    '-' | '−' => Token::Minus,
                    '*' | '×' => Token::Mul,
                    '/' | '÷' => Token::Div,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    other => return Err(EvalError::UnexpectedChar(other)),
                };
                tokens.push(token);
                chars.next();
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expr(&mut self) -> Result<f64, EvalError> {
        let mut value = self.term()?;
        while let Some(op @ (Token::Plus | Token::Minus)) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == Token::Plus { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, EvalError> {
        let mut value = self.factor()?;
        while let Some(op @ (Token::Mul | Token::Div)) = self.peek() {
            self.pos += 1;
            let rhs = self.factor()?;
            value = if op == Token::Mul {
                value * rhs
            } else {
                if rhs == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                value / rhs
            };
        }
        Ok(value)
    }

    fn factor(&mut self) -> Result<f64, EvalError> {
        match self.peek() {
            Some(Token::Plus) => {
                self.pos += 1;
                self.nested(|p| p.factor())
            }
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(-self.nested(|p| p.factor())?)
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<f64, EvalError> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.nested(|p| p.expr())?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    Some(other) => Err(EvalError::UnexpectedToken(other.describe())),
                    None => Err(EvalError::UnexpectedEnd),
                }
            }
            Some(other) => Err(EvalError::UnexpectedToken(other.describe())),
            None => Err(EvalError::UnexpectedEnd),
        }
    }

    fn nested(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<f64, EvalError>,
    ) -> Result<f64, EvalError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(EvalError::TooDeep);
        }
        let value = f(self);
        self.depth -= 1;
        value
    }
}

/// Evaluate an arithmetic expression.
pub fn evaluate(expression: &str) -> Result<f64, EvalError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(EvalError::Empty);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if let Some(extra) = parser.peek() {
        return Err(EvalError::UnexpectedToken(extra.describe()));
    }
    if !value.is_finite() {
        return Err(EvalError::NotFinite);
    }
    Ok(value)
}

/// Integral results become JSON integers, everything else a float.
fn to_json_number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() <= MAX_EXACT_INT {
        json!(value as i64)
    } else {
        json!(value)
    }
}

pub struct Calculator {
    definition: ToolDefinition,
}

impl Calculator {
    pub fn new() -> Self {
        Self {
            definition: ToolDefinition::new(
                CALCULATOR,
                "Evaluate an arithmetic expression. Supports numbers, + - * / (also × ÷), \
                 unary minus and parentheses. Use it for any calculation instead of doing \
                 arithmetic yourself.",
            )
            .with_parameter(ToolParameter::new(
                "expression",
                "Expression to evaluate, e.g. '156*78+234' or '(2.5 + 1) ÷ 7'",
                true,
            )),
        }
    }
}

impl Default for Calculator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolContract for Calculator {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn default_timeout(&self) -> Duration {
        Duration::from_secs(2)
    }

    async fn execute(&self, args: &ToolArguments, _ctx: &ToolContext) -> Result<Value, ToolError> {
        let expression = args
            .require_string("expression")
            .map_err(ToolError::invalid_argument)?;

        debug!(expression, "Evaluating expression");
        evaluate(expression)
            .map(to_json_number)
            .map_err(|e| {
                ToolError::execution_with_payload(
                    format!("Invalid expression: {}", e),
                    json!({ "expression": expression }),
                )
            })
    }
}
