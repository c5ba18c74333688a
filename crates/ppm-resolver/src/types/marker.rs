//! Environment marker expressions ([PEP 508](https://peps.python.org/pep-0508/) `; extra ==
//! "test"`-style suffixes).
//!
//! The parser and evaluator here are a hand-rolled tagged-variant AST rather than a grammar
//! crate, following the shape of the teacher's own hand-rolled requirement grammar. Evaluation
//! walks the tree directly against a `dyn Env` rather than invoking a Python interpreter.

use std::fmt::{self, Display, Formatter};

use pep440_rs::Version;

/// A comparison operator accepted inside a marker expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
}

impl CompareOp {
    fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "==" => CompareOp::Equal,
            "!=" => CompareOp::NotEqual,
            "<" => CompareOp::Less,
            "<=" => CompareOp::LessEqual,
            ">" => CompareOp::Greater,
            ">=" => CompareOp::GreaterEqual,
            _ => return None,
        })
    }

    fn eval_str(self, lhs: &str, rhs: &str) -> bool {
        match self {
            CompareOp::Equal => lhs == rhs,
            CompareOp::NotEqual => lhs != rhs,
            CompareOp::Less => lhs < rhs,
            CompareOp::LessEqual => lhs <= rhs,
            CompareOp::Greater => lhs > rhs,
            CompareOp::GreaterEqual => lhs >= rhs,
        }
    }

    fn eval_version(self, lhs: &Version, rhs: &Version) -> bool {
        match self {
            CompareOp::Equal => lhs == rhs,
            CompareOp::NotEqual => lhs != rhs,
            CompareOp::Less => lhs < rhs,
            CompareOp::LessEqual => lhs <= rhs,
            CompareOp::Greater => lhs > rhs,
            CompareOp::GreaterEqual => lhs >= rhs,
        }
    }
}

impl Display for CompareOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Equal => "==",
            CompareOp::NotEqual => "!=",
            CompareOp::Less => "<",
            CompareOp::LessEqual => "<=",
            CompareOp::Greater => ">",
            CompareOp::GreaterEqual => ">=",
        };
        write!(f, "{s}")
    }
}

/// The relational operator at the leaf of a marker expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// One of `==`, `!=`, `<`, `<=`, `>`, `>=`.
    Compare(CompareOp),
    /// `in`
    In,
    /// `not in`
    NotIn,
}

impl Display for Op {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Op::Compare(op) => write!(f, "{op}"),
            Op::In => write!(f, "in"),
            Op::NotIn => write!(f, "not in"),
        }
    }
}

/// One side of a leaf comparison: either a marker variable (`python_version`, `extra`, ...) or a
/// quoted string literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A bare identifier, e.g. `os_name` or `extra`.
    Variable(String),
    /// A single- or double-quoted string literal, unquoted.
    Literal(String),
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Variable(v) => write!(f, "{v}"),
            Value::Literal(v) => write!(f, "\"{v}\""),
        }
    }
}

/// Everything a marker expression can ask about the environment it is being evaluated in.
///
/// Absent keys MUST resolve to the empty string rather than `None`: a marker like
/// `extra == ""` still has to evaluate deterministically when no extras were requested.
pub trait Env {
    /// Resolves a marker variable name to its current string value.
    fn get(&self, key: &str) -> String;

    /// Returns true if `extra` is currently being activated (PEP 685 evaluation path for the
    /// `extra` variable specifically, which may be asked about more than one active extra).
    fn has_extra(&self, extra: &str) -> bool {
        self.get("extra") == extra
    }
}

/// A marker expression tree: `and`/`or` of leaf comparisons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvMarkerExpr {
    /// `lhs and rhs`.
    And(Box<EnvMarkerExpr>, Box<EnvMarkerExpr>),
    /// `lhs or rhs`.
    Or(Box<EnvMarkerExpr>, Box<EnvMarkerExpr>),
    /// A single leaf: `lhs op rhs`.
    Operator(Value, Op, Value),
}

/// Error produced while parsing a marker expression string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct MarkerParseError(pub String);

impl EnvMarkerExpr {
    /// Parses a marker expression, e.g. `python_version >= "3.8" and extra == "test"`.
    pub fn parse(input: &str) -> Result<Self, MarkerParseError> {
        let mut parser = MarkerParser {
            tokens: tokenize(input)?,
            pos: 0,
        };
        let expr = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(MarkerParseError(format!(
                "unexpected trailing input in marker expression '{input}'"
            )));
        }
        Ok(expr)
    }

    /// Evaluates the expression against `env`.
    pub fn eval(&self, env: &dyn Env) -> bool {
        match self {
            EnvMarkerExpr::And(lhs, rhs) => lhs.eval(env) && rhs.eval(env),
            EnvMarkerExpr::Or(lhs, rhs) => lhs.eval(env) || rhs.eval(env),
            EnvMarkerExpr::Operator(lhs, op, rhs) => eval_operator(lhs, op, rhs, env),
        }
    }
}

impl Display for EnvMarkerExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            EnvMarkerExpr::And(lhs, rhs) => write!(f, "{lhs} and {rhs}"),
            EnvMarkerExpr::Or(lhs, rhs) => write!(f, "{lhs} or {rhs}"),
            EnvMarkerExpr::Operator(lhs, op, rhs) => write!(f, "{lhs} {op} {rhs}"),
        }
    }
}

fn resolve(value: &Value, env: &dyn Env) -> String {
    match value {
        Value::Variable(name) => env.get(name),
        Value::Literal(lit) => lit.clone(),
    }
}

fn eval_operator(lhs: &Value, op: &Op, rhs: &Value, env: &dyn Env) -> bool {
    // PEP 685: `extra` comparisons are normalized (case, `-`/`_`/`.` runs collapse) the same
    // way a distribution name is, rather than compared as a raw string.
    if matches!(lhs, Value::Variable(v) if v == "extra") || matches!(rhs, Value::Variable(v) if v == "extra")
    {
        let (extra_side, other_side) = match lhs {
            Value::Variable(v) if v == "extra" => (rhs, lhs),
            _ => (lhs, rhs),
        };
        let wanted = normalize_extra(&resolve(extra_side, env));
        let active = normalize_extra(&resolve(other_side, env));
        return match op {
            Op::Compare(CompareOp::Equal) => wanted == active,
            Op::Compare(CompareOp::NotEqual) => wanted != active,
            Op::In => active.contains(&wanted),
            Op::NotIn => !active.contains(&wanted),
            _ => false,
        };
    }

    let lhs_val = resolve(lhs, env);
    let rhs_val = resolve(rhs, env);

    match op {
        Op::Compare(cmp) => {
            // Prefer numeric (PEP 440) comparison when both sides parse as versions; this is
            // what lets `python_version >= "3.8"` compare numerically rather than lexically.
            if let (Ok(lhs_ver), Ok(rhs_ver)) =
                (lhs_val.parse::<Version>(), rhs_val.parse::<Version>())
            {
                cmp.eval_version(&lhs_ver, &rhs_ver)
            } else {
                cmp.eval_str(&lhs_val, &rhs_val)
            }
        }
        Op::In => rhs_val.contains(&lhs_val),
        Op::NotIn => !rhs_val.contains(&lhs_val),
    }
}

fn normalize_extra(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_sep = false;
    for c in s.chars() {
        if c == '-' || c == '_' || c == '.' {
            if !last_was_sep {
                out.push('-');
            }
            last_was_sep = true;
        } else {
            out.push(c.to_ascii_lowercase());
            last_was_sep = false;
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    Op(String),
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, MarkerParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && chars[j] != quote {
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(MarkerParseError(format!(
                        "unterminated string literal in '{input}'"
                    )));
                }
                tokens.push(Token::Str(chars[start..j].iter().collect()));
                i = j + 1;
            }
            '=' | '!' | '<' | '>' => {
                let mut op = String::new();
                op.push(c);
                if i + 1 < chars.len() && chars[i + 1] == '=' {
                    op.push('=');
                    i += 2;
                } else {
                    i += 1;
                }
                tokens.push(Token::Op(op));
            }
            _ => {
                let start = i;
                while i < chars.len() && !chars[i].is_whitespace() && !"()'\"".contains(chars[i])
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(Token::Ident(word));
            }
        }
    }
    Ok(tokens)
}

struct MarkerParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl MarkerParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn is_ident(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s.eq_ignore_ascii_case(word))
    }

    fn parse_or(&mut self) -> Result<EnvMarkerExpr, MarkerParseError> {
        let mut lhs = self.parse_and()?;
        while self.is_ident("or") {
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = EnvMarkerExpr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<EnvMarkerExpr, MarkerParseError> {
        let mut lhs = self.parse_atom()?;
        while self.is_ident("and") {
            self.pos += 1;
            let rhs = self.parse_atom()?;
            lhs = EnvMarkerExpr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_atom(&mut self) -> Result<EnvMarkerExpr, MarkerParseError> {
        if matches!(self.peek(), Some(Token::LParen)) {
            self.pos += 1;
            let inner = self.parse_or()?;
            match self.peek() {
                Some(Token::RParen) => {
                    self.pos += 1;
                    Ok(inner)
                }
                _ => Err(MarkerParseError("expected closing ')'".to_string())),
            }
        } else {
            self.parse_comparison()
        }
    }

    fn parse_value(&mut self) -> Result<Value, MarkerParseError> {
        match self.tokens.get(self.pos) {
            Some(Token::Str(s)) => {
                self.pos += 1;
                Ok(Value::Literal(s.clone()))
            }
            Some(Token::Ident(s)) => {
                self.pos += 1;
                Ok(Value::Variable(s.clone()))
            }
            other => Err(MarkerParseError(format!(
                "expected a marker value, found {other:?}"
            ))),
        }
    }

    fn parse_comparison(&mut self) -> Result<EnvMarkerExpr, MarkerParseError> {
        let lhs = self.parse_value()?;
        let op = match self.tokens.get(self.pos) {
            Some(Token::Op(op_str)) => {
                let op = CompareOp::from_str(op_str).ok_or_else(|| {
                    MarkerParseError(format!("unknown comparison operator '{op_str}'"))
                })?;
                self.pos += 1;
                Op::Compare(op)
            }
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case("in") => {
                self.pos += 1;
                Op::In
            }
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case("not") => {
                self.pos += 1;
                if !self.is_ident("in") {
                    return Err(MarkerParseError("expected 'in' after 'not'".to_string()));
                }
                self.pos += 1;
                Op::NotIn
            }
            other => {
                return Err(MarkerParseError(format!(
                    "expected a comparison operator, found {other:?}"
                )))
            }
        };
        let rhs = self.parse_value()?;
        Ok(EnvMarkerExpr::Operator(lhs, op, rhs))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    struct MapEnv(HashMap<&'static str, &'static str>);

    impl Env for MapEnv {
        fn get(&self, key: &str) -> String {
            self.0.get(key).copied().unwrap_or("").to_string()
        }
    }

    #[test]
    fn test_simple_equality() {
        let expr = EnvMarkerExpr::parse("os_name == \"posix\"").unwrap();
        let env = MapEnv(HashMap::from([("os_name", "posix")]));
        assert!(expr.eval(&env));
        let env = MapEnv(HashMap::from([("os_name", "nt")]));
        assert!(!expr.eval(&env));
    }

    #[test]
    fn test_and_or_precedence() {
        let expr =
            EnvMarkerExpr::parse("python_version >= \"3.8\" and sys_platform == \"linux\"")
                .unwrap();
        let env = MapEnv(HashMap::from([
            ("python_version", "3.11"),
            ("sys_platform", "linux"),
        ]));
        assert!(expr.eval(&env));
    }

    #[test]
    fn test_numeric_version_comparison() {
        let expr = EnvMarkerExpr::parse("python_version < \"3.9\"").unwrap();
        let env = MapEnv(HashMap::from([("python_version", "3.10")]));
        // Lexically "3.10" < "3.9" but numerically it is not.
        assert!(!expr.eval(&env));
    }

    #[test]
    fn test_extra_absent_key_is_empty_string_not_none() {
        let expr = EnvMarkerExpr::parse("extra == \"\"").unwrap();
        let env = MapEnv(HashMap::new());
        assert!(expr.eval(&env));
    }

    #[test]
    fn test_in_operator() {
        let expr = EnvMarkerExpr::parse("\"2.7\" not in python_version").unwrap();
        let env = MapEnv(HashMap::from([("python_version", "3.11.4")]));
        assert!(expr.eval(&env));
    }

    #[test]
    fn test_parenthesized_or() {
        let expr =
            EnvMarkerExpr::parse("(os_name == \"nt\" or os_name == \"posix\") and extra == \"test\"")
                .unwrap();
        let env = MapEnv(HashMap::from([("os_name", "posix"), ("extra", "test")]));
        assert!(expr.eval(&env));
    }
}
