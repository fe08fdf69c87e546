//! Minimal sandboxed expression grammar for `SetVariable`, `If` and `Loop`.
//!
//! Supports numeric and string literals, booleans, arithmetic (`+ - * /`),
//! comparisons (`== != < > <= >=`), parentheses and unary minus. `+` doubles
//! as string concatenation when either operand is a string. Variable
//! references are not part of the grammar: `{name}` tokens are textually
//! substituted before evaluation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::AutomationError;

/// A scalar variable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Str(String),
}

impl Value {
    /// Truthiness used when a bare value stands as a condition.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty() && s != "false" && s != "0",
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Str(s) => s.trim().parse().ok(),
            Value::Bool(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            // Whole numbers stringify without a decimal point so that
            // substitution of `1+2` yields the literal "3".
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            Value::Number(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

/// Replace every `{name}` occurrence with the stringified current value.
///
/// Names are applied in descending length order so that overlapping variable
/// names resolve deterministically.
pub fn substitute(text: &str, variables: &BTreeMap<String, Value>) -> String {
    if !text.contains('{') || variables.is_empty() {
        return text.to_string();
    }
    let mut names: Vec<&String> = variables.keys().collect();
    names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    let mut out = text.to_string();
    for name in names {
        let token = format!("{{{name}}}");
        if out.contains(&token) {
            out = out.replace(&token, &variables[name].to_string());
        }
    }
    out
}

/// Evaluate an already-substituted expression to a scalar value.
pub fn evaluate(expression: &str) -> Result<Value, AutomationError> {
    let tokens = tokenize(expression)?;
    let mut parser = ExprParser {
        tokens,
        pos: 0,
        input: expression,
    };
    let value = parser.comparison()?;
    if parser.pos != parser.tokens.len() {
        return Err(parser.error("trailing input after expression"));
    }
    Ok(value)
}

/// Evaluate an already-substituted expression as a condition.
pub fn evaluate_bool(expression: &str) -> Result<bool, AutomationError> {
    Ok(evaluate(expression)?.is_truthy())
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Bool(bool),
    Plus,
    Minus,
    Star,
    Slash,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, AutomationError> {
    let err = |msg: String| AutomationError::InvalidExpression(format!("{msg} in '{input}'"));
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '=' | '!' | '<' | '>' => {
                chars.next();
                let eq = chars.peek() == Some(&'=');
                if eq {
                    chars.next();
                }
                tokens.push(match (c, eq) {
                    ('=', true) => Token::Eq,
                    ('!', true) => Token::Ne,
                    ('<', true) => Token::Le,
                    ('>', true) => Token::Ge,
                    ('<', false) => Token::Lt,
                    ('>', false) => Token::Gt,
                    _ => return Err(err(format!("unexpected operator '{c}'"))),
                });
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some(escaped) => s.push(escaped),
                            None => return Err(err("dangling escape".into())),
                        },
                        Some(ch) if ch == quote => break,
                        Some(ch) => s.push(ch),
                        None => return Err(err("unterminated string literal".into())),
                    }
                }
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut digits = String::new();
                while matches!(chars.peek(), Some(d) if d.is_ascii_digit() || *d == '.') {
                    digits.push(chars.next().unwrap());
                }
                let n: f64 = digits
                    .parse()
                    .map_err(|_| err(format!("invalid number '{digits}'")))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut word = String::new();
                while matches!(chars.peek(), Some(w) if w.is_alphanumeric() || *w == '_') {
                    word.push(chars.next().unwrap());
                }
                match word.as_str() {
                    "true" | "True" => tokens.push(Token::Bool(true)),
                    "false" | "False" => tokens.push(Token::Bool(false)),
                    other => return Err(err(format!("unknown identifier '{other}'"))),
                }
            }
            other => return Err(err(format!("unexpected character '{other}'"))),
        }
    }
    Ok(tokens)
}

struct ExprParser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    input: &'a str,
}

impl ExprParser<'_> {
    fn error(&self, message: &str) -> AutomationError {
        AutomationError::InvalidExpression(format!("{message} in '{}'", self.input))
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    // comparison := additive (cmp-op additive)?   (non-associative)
    fn comparison(&mut self) -> Result<Value, AutomationError> {
        let left = self.additive()?;
        let op = match self.peek() {
            Some(Token::Eq | Token::Ne | Token::Lt | Token::Gt | Token::Le | Token::Ge) => {
                self.next().unwrap()
            }
            _ => return Ok(left),
        };
        let right = self.additive()?;
        let result = match op {
            Token::Eq => values_equal(&left, &right),
            Token::Ne => !values_equal(&left, &right),
            ordered => {
                let (l, r) = self.numeric_pair(&left, &right)?;
                match ordered {
                    Token::Lt => l < r,
                    Token::Gt => l > r,
                    Token::Le => l <= r,
                    Token::Ge => l >= r,
                    _ => unreachable!(),
                }
            }
        };
        Ok(Value::Bool(result))
    }

    fn additive(&mut self) -> Result<Value, AutomationError> {
        let mut left = self.multiplicative()?;
        while let Some(op @ (Token::Plus | Token::Minus)) = self.peek().cloned() {
            self.next();
            let right = self.multiplicative()?;
            left = match op {
                Token::Plus => self.add(left, right)?,
                Token::Minus => {
                    let (l, r) = self.numeric_pair(&left, &right)?;
                    Value::Number(l - r)
                }
                _ => unreachable!(),
            };
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> Result<Value, AutomationError> {
        let mut left = self.unary()?;
        while let Some(op @ (Token::Star | Token::Slash)) = self.peek().cloned() {
            self.next();
            let right = self.unary()?;
            let (l, r) = self.numeric_pair(&left, &right)?;
            left = match op {
                Token::Star => Value::Number(l * r),
                Token::Slash => {
                    if r == 0.0 {
                        return Err(self.error("division by zero"));
                    }
                    Value::Number(l / r)
                }
                _ => unreachable!(),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Value, AutomationError> {
        if self.peek() == Some(&Token::Minus) {
            self.next();
            let value = self.unary()?;
            let n = value
                .as_number()
                .ok_or_else(|| self.error("unary minus on a non-number"))?;
            return Ok(Value::Number(-n));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Value, AutomationError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Value::Number(n)),
            Some(Token::Str(s)) => Ok(Value::Str(s)),
            Some(Token::Bool(b)) => Ok(Value::Bool(b)),
            Some(Token::LParen) => {
                let value = self.comparison()?;
                if self.next() != Some(Token::RParen) {
                    return Err(self.error("missing ')'"));
                }
                Ok(value)
            }
            _ => Err(self.error("expected a literal or '('")),
        }
    }

    fn add(&mut self, left: Value, right: Value) -> Result<Value, AutomationError> {
        match (&left, &right) {
            (Value::Str(_), _) | (_, Value::Str(_)) => {
                Ok(Value::Str(format!("{left}{right}")))
            }
            _ => {
                let (l, r) = self.numeric_pair(&left, &right)?;
                Ok(Value::Number(l + r))
            }
        }
    }

    fn numeric_pair(&self, left: &Value, right: &Value) -> Result<(f64, f64), AutomationError> {
        match (left.as_number(), right.as_number()) {
            (Some(l), Some(r)) => Ok((l, r)),
            _ => Err(self.error("operator requires numeric operands")),
        }
    }
}

/// Equality with numeric coercion: `3 == '3'` holds, `'OK' == 'OK'` holds.
fn values_equal(left: &Value, right: &Value) -> bool {
    if let (Some(l), Some(r)) = (left.as_number(), right.as_number()) {
        return l == r;
    }
    match (left, right) {
        (Value::Bool(l), Value::Bool(r)) => l == r,
        _ => left.to_string() == right.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn arithmetic_with_precedence() {
        assert_eq!(evaluate("1+2").unwrap(), Value::Number(3.0));
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), Value::Number(14.0));
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), Value::Number(20.0));
        assert_eq!(evaluate("10 / 4").unwrap(), Value::Number(2.5));
        assert_eq!(evaluate("-3 + 5").unwrap(), Value::Number(2.0));
    }

    #[test]
    fn comparisons() {
        assert_eq!(evaluate("1 < 2").unwrap(), Value::Bool(true));
        assert_eq!(evaluate("2 <= 1").unwrap(), Value::Bool(false));
        assert_eq!(evaluate("'OK' == 'OK'").unwrap(), Value::Bool(true));
        assert_eq!(evaluate("'OK' != 'NG'").unwrap(), Value::Bool(true));
        assert_eq!(evaluate("3 == '3'").unwrap(), Value::Bool(true));
        assert_eq!(evaluate("1 + 1 == 2").unwrap(), Value::Bool(true));
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(
            evaluate("'foo' + 'bar'").unwrap(),
            Value::Str("foobar".into())
        );
        assert_eq!(evaluate("'v' + 2").unwrap(), Value::Str("v2".into()));
    }

    #[test]
    fn rejects_malformed_expressions() {
        assert!(evaluate("1 +").is_err());
        assert!(evaluate("unknown_word").is_err());
        assert!(evaluate("1 / 0").is_err());
        assert!(evaluate("'a' - 'b'").is_err());
        assert!(evaluate("(1 + 2").is_err());
    }

    #[test]
    fn whole_numbers_stringify_without_decimal_point() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
    }

    #[test]
    fn substitution_is_longest_name_first() {
        let vars = vars(&[
            ("x", Value::Str("{xx}".into())),
            ("xx", Value::Number(7.0)),
        ]);
        // "{xx}" must be replaced by the xx binding, not expanded via x.
        assert_eq!(substitute("{xx}", &vars), "7");
        assert_eq!(substitute("a {x} b", &vars), "a {xx} b");
        assert_eq!(substitute("no tokens", &vars), "no tokens");
    }

    #[test]
    fn truthiness_of_bare_values() {
        assert!(evaluate_bool("true").unwrap());
        assert!(!evaluate_bool("0").unwrap());
        assert!(evaluate_bool("3").unwrap());
        assert!(evaluate_bool("'yes'").unwrap());
        assert!(!evaluate_bool("''").unwrap());
    }
}
