//! Restricted expression language for guards and formulas.
//!
//! Guards and `=`-prefixed formulas are parsed into a small typed AST over
//! literals, arithmetic, comparisons and boolean connectives. There are no
//! variables, calls or attribute lookups: by the time an expression is
//! evaluated every case variable must already have been substituted.
//!
//! # Examples
//!
//! ```
//! # use mom_interface_lib::expr::eval_formula;
//! # use mom_interface_lib::value::Value;
//! assert_eq!(eval_formula("3*5").unwrap(), Value::Int(15));
//! assert_eq!(eval_formula("'tx0.66v1' != 'gx1v6'").unwrap(), Value::Bool(true));
//! ```

use std::cmp::Ordering;
use std::convert::TryFrom;

use logos::Logos;
use thiserror::Error;

use crate::error::{MomError, MomResult};
use crate::value::Value;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("**")]
    DoubleStar,
    #[token("/")]
    Slash,
    #[token("//")]
    DoubleSlash,
    #[token("%")]
    Percent,

    #[token("==")]
    EqEq,
    #[token("!=")]
    #[token("<>")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,

    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,

    #[token("True")]
    #[token("true")]
    True,
    #[token("False")]
    #[token("false")]
    False,
    #[token("None")]
    Null,

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| unescape(lex.slice()))]
    Str(String),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_owned())]
    Ident(String),
}

fn unescape(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn is_equality(self) -> bool {
        matches!(self, CompareOp::Eq | CompareOp::Ne)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// A bare name; never resolvable, reported when evaluated.
    Symbol(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// Chained comparison `a < b <= c`.
    Compare(Box<Expr>, Vec<(CompareOp, Expr)>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("unresolved symbol '{0}'")]
    UnresolvedSymbol(String),
    #[error("cannot compare {0} with {1}")]
    TypeConfusion(&'static str, &'static str),
    #[error("operand of '{op}' must be bool, not {found}")]
    NotBoolean { op: &'static str, found: &'static str },
    #[error("{0}")]
    Type(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    Overflow,
}

/// How cross-type comparisons are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparisons {
    /// Equality across types is false, ordering across types is an error.
    Lenient,
    /// Every comparison, equality included, must compare orderable types.
    Strict,
}

impl Expr {
    pub fn parse(source: &str) -> Result<Expr, EvalError> {
        let mut tokens = Vec::new();
        let mut lexer = Token::lexer(source);
        while let Some(token) = lexer.next() {
            match token {
                Ok(token) => tokens.push(token),
                Err(()) => {
                    return Err(EvalError::Syntax(format!(
                        "unexpected character(s) '{}'",
                        lexer.slice()
                    )))
                }
            }
        }

        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.or_expr()?;
        match parser.peek() {
            None => Ok(expr),
            Some(token) => Err(EvalError::Syntax(format!("unexpected token {:?}", token))),
        }
    }

    /// True if the outermost operation yields a boolean: a comparison, a
    /// boolean connective, or a boolean literal.
    pub fn is_logical(&self) -> bool {
        matches!(
            self,
            Expr::Compare(..)
                | Expr::And(..)
                | Expr::Or(..)
                | Expr::Unary(UnaryOp::Not, _)
                | Expr::Literal(Value::Bool(_))
        )
    }

    pub fn evaluate(&self) -> Result<Value, EvalError> {
        self.eval(Comparisons::Lenient)
    }

    pub fn evaluate_strict(&self) -> Result<Value, EvalError> {
        self.eval(Comparisons::Strict)
    }

    fn eval(&self, mode: Comparisons) -> Result<Value, EvalError> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Symbol(name) => Err(EvalError::UnresolvedSymbol(name.clone())),
            Expr::Unary(op, operand) => unary(*op, operand.eval(mode)?),
            Expr::Binary(op, lhs, rhs) => binary(*op, lhs.eval(mode)?, rhs.eval(mode)?),
            Expr::Compare(first, rest) => {
                let mut lhs = first.eval(mode)?;
                for (op, operand) in rest {
                    let rhs = operand.eval(mode)?;
                    if !compare(*op, &lhs, &rhs, mode)? {
                        return Ok(Value::Bool(false));
                    }
                    lhs = rhs;
                }
                Ok(Value::Bool(true))
            }
            Expr::And(lhs, rhs) => {
                if !truth(lhs.eval(mode)?, "and")? {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(truth(rhs.eval(mode)?, "and")?))
            }
            Expr::Or(lhs, rhs) => {
                if truth(lhs.eval(mode)?, "or")? {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(truth(rhs.eval(mode)?, "or")?))
            }
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn or_expr(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.and_expr()?;
        while self.eat(&Token::Or) {
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.not_expr()?;
        while self.eat(&Token::And) {
            let rhs = self.not_expr()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr, EvalError> {
        if self.eat(&Token::Not) {
            let operand = self.not_expr()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, EvalError> {
        let first = self.sum()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => CompareOp::Eq,
                Some(Token::NotEq) => CompareOp::Ne,
                Some(Token::Lt) => CompareOp::Lt,
                Some(Token::LtEq) => CompareOp::Le,
                Some(Token::Gt) => CompareOp::Gt,
                Some(Token::GtEq) => CompareOp::Ge,
                _ => break,
            };
            self.pos += 1;
            rest.push((op, self.sum()?));
        }

        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), rest))
        }
    }

    fn sum(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn term(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::DoubleSlash) => BinaryOp::FloorDiv,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.factor()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn factor(&mut self) -> Result<Expr, EvalError> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.factor()?)));
        }
        if self.eat(&Token::Plus) {
            return Ok(Expr::Unary(UnaryOp::Pos, Box::new(self.factor()?)));
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, EvalError> {
        let base = self.atom()?;
        if self.eat(&Token::DoubleStar) {
            let exponent = self.factor()?;
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr, EvalError> {
        match self.advance() {
            Some(Token::Int(i)) => Ok(Expr::Literal(Value::Int(i))),
            Some(Token::Float(x)) => Ok(Expr::Literal(Value::Float(x))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
            Some(Token::True) => Ok(Expr::Literal(Value::Bool(true))),
            Some(Token::False) => Ok(Expr::Literal(Value::Bool(false))),
            Some(Token::Null) => Ok(Expr::Literal(Value::Null)),
            Some(Token::Ident(name)) => Ok(Expr::Symbol(name)),
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                if self.eat(&Token::RParen) {
                    Ok(inner)
                } else {
                    Err(EvalError::Syntax("expected ')'".to_owned()))
                }
            }
            Some(token) => Err(EvalError::Syntax(format!("unexpected token {:?}", token))),
            None => Err(EvalError::Syntax("unexpected end of expression".to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(x) => x,
        }
    }
}

fn number(value: &Value) -> Option<Number> {
    match value {
        Value::Bool(b) => Some(Number::Int(i64::from(*b))),
        Value::Int(i) => Some(Number::Int(*i)),
        Value::Float(x) => Some(Number::Float(*x)),
        _ => None,
    }
}

fn truth(value: Value, op: &'static str) -> Result<bool, EvalError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(EvalError::NotBoolean {
            op,
            found: other.type_name(),
        }),
    }
}

fn unary(op: UnaryOp, operand: Value) -> Result<Value, EvalError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!truth(operand, "not")?)),
        UnaryOp::Pos => match number(&operand) {
            Some(Number::Int(i)) => Ok(Value::Int(i)),
            Some(Number::Float(x)) => Ok(Value::Float(x)),
            None => Err(bad_operand("unary +", &operand, None)),
        },
        UnaryOp::Neg => match number(&operand) {
            Some(Number::Int(i)) => i.checked_neg().map(Value::Int).ok_or(EvalError::Overflow),
            Some(Number::Float(x)) => Ok(Value::Float(-x)),
            None => Err(bad_operand("unary -", &operand, None)),
        },
    }
}

fn bad_operand(op: &str, lhs: &Value, rhs: Option<&Value>) -> EvalError {
    match rhs {
        Some(rhs) => EvalError::Type(format!(
            "unsupported operand types for {}: {} and {}",
            op,
            lhs.type_name(),
            rhs.type_name()
        )),
        None => EvalError::Type(format!(
            "bad operand type for {}: {}",
            op,
            lhs.type_name()
        )),
    }
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    if let (BinaryOp::Add, Value::Str(a), Value::Str(b)) = (op, &lhs, &rhs) {
        return Ok(Value::Str(format!("{}{}", a, b)));
    }

    let symbol = match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::FloorDiv => "//",
        BinaryOp::Mod => "%",
        BinaryOp::Pow => "**",
    };
    let (a, b) = match (number(&lhs), number(&rhs)) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(bad_operand(symbol, &lhs, Some(&rhs))),
    };

    match (a, b) {
        (Number::Int(a), Number::Int(b)) => int_binary(op, a, b),
        (a, b) => float_binary(op, a.as_f64(), b.as_f64()),
    }
}

fn int_binary(op: BinaryOp, a: i64, b: i64) -> Result<Value, EvalError> {
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => return float_binary(op, a as f64, b as f64),
        BinaryOp::FloorDiv | BinaryOp::Mod if b == 0 => return Err(EvalError::DivisionByZero),
        BinaryOp::FloorDiv => a.checked_div(b).map(|q| {
            if a % b != 0 && ((a < 0) != (b < 0)) {
                q - 1
            } else {
                q
            }
        }),
        BinaryOp::Mod => a.checked_rem(b).map(|r| {
            if r != 0 && ((r < 0) != (b < 0)) {
                r + b
            } else {
                r
            }
        }),
        BinaryOp::Pow if b < 0 => return float_binary(op, a as f64, b as f64),
        BinaryOp::Pow => u32::try_from(b).ok().and_then(|exp| a.checked_pow(exp)),
    };
    result.map(Value::Int).ok_or(EvalError::Overflow)
}

fn float_binary(op: BinaryOp, a: f64, b: f64) -> Result<Value, EvalError> {
    let divides = matches!(op, BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod);
    if divides && b == 0.0 {
        return Err(EvalError::DivisionByZero);
    }
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::FloorDiv => (a / b).floor(),
        BinaryOp::Mod => a - b * (a / b).floor(),
        BinaryOp::Pow => a.powf(b),
    };
    Ok(Value::Float(result))
}

fn order(lhs: &Value, rhs: &Value) -> Result<Option<Ordering>, EvalError> {
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
        _ => match (number(lhs), number(rhs)) {
            (Some(Number::Int(a)), Some(Number::Int(b))) => Ok(Some(a.cmp(&b))),
            (Some(a), Some(b)) => Ok(a.as_f64().partial_cmp(&b.as_f64())),
            _ => Err(EvalError::TypeConfusion(lhs.type_name(), rhs.type_name())),
        },
    }
}

fn compare(op: CompareOp, lhs: &Value, rhs: &Value, mode: Comparisons) -> Result<bool, EvalError> {
    if op.is_equality() {
        let ordering = match (mode, order(lhs, rhs)) {
            (_, Ok(ordering)) => ordering,
            (Comparisons::Strict, Err(err)) => return Err(err),
            (Comparisons::Lenient, Err(_)) => {
                let equal = lhs.is_null() && rhs.is_null();
                return Ok(equal == (op == CompareOp::Eq));
            }
        };
        let equal = ordering == Some(Ordering::Equal);
        return Ok(equal == (op == CompareOp::Eq));
    }

    let ordering = match order(lhs, rhs)? {
        Some(ordering) => ordering,
        None => return Ok(false),
    };
    Ok(match op {
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
        CompareOp::Eq | CompareOp::Ne => unreachable!(),
    })
}

/// Evaluates a guard or formula body. Every comparison must compare values
/// of orderable types (numbers with numbers, strings with strings).
pub fn eval_formula(formula: &str) -> MomResult<Value> {
    if formula.contains('$') {
        return Err(MomError::UnexpandedVariable(formula.to_owned()));
    }

    Expr::parse(formula)
        .and_then(|expr| expr.evaluate_strict())
        .map_err(|err| formula_error(formula, err))
}

/// Evaluates a guard to its truth value. The result, and every operand of
/// `and`, `or` and `not`, must be a boolean.
pub fn eval_guard(guard: &str) -> MomResult<bool> {
    if guard.contains('$') {
        return Err(MomError::UnexpandedVariable(guard.to_owned()));
    }

    let non_boolean = |value: String| MomError::NonBooleanGuard {
        guard: guard.to_owned(),
        value,
    };
    match Expr::parse(guard).and_then(|expr| expr.evaluate_strict()) {
        Ok(Value::Bool(b)) => Ok(b),
        Ok(other) => Err(non_boolean(other.to_string())),
        Err(EvalError::NotBoolean { found, .. }) => Err(non_boolean(found.to_owned())),
        Err(err) => Err(formula_error(guard, err)),
    }
}

fn formula_error(formula: &str, err: EvalError) -> MomError {
    match err {
        EvalError::TypeConfusion(..) => MomError::TypeConfusion(formula.to_owned()),
        other => MomError::InvalidFormula {
            formula: formula.to_owned(),
            reason: other.to_string(),
        },
    }
}

/// True for the literal `else` and for any expression whose outermost
/// operation is boolean.
pub fn is_logical_expr(entry: &str) -> bool {
    if entry.trim() == "else" {
        return true;
    }
    Expr::parse(entry)
        .map(|expr| expr.is_logical())
        .unwrap_or(false)
}
