//! Arithmetic expression language used by tracker expressions and object
//! bindings.
//!
//! ```text
//! [id]             // tracker reference, resolved against the environment
//! value, x         // bare variables, resolved against the environment
//! pi, e            // constants
//!
//! // Operators (precedence low to high)
//! a + b, a - b
//! a * b, a / b
//! -a, +a
//! a ^ b            // right associative
//!
//! sin(a) cos(a) tan(a) sqrt(a) abs(a) floor(a) ceil(a) round(a)
//! exp(a) ln(a) log(a) min(a, b) max(a, b) clamp(a, lo, hi)
//! ```
//!
//! A trailing `;` is accepted and ignored so statement-style input parses.

use std::collections::{BTreeSet, HashMap};
use std::f64::consts::{E, PI};

/// Expression parse error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected token {0}")]
    UnexpectedToken(String),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("invalid tracker reference '[{0}]'")]
    InvalidReference(String),
    #[error("unterminated tracker reference")]
    UnterminatedReference,
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("function '{name}' expects {expected} arguments, got {got}")]
    WrongArgCount {
        name: String,
        expected: usize,
        got: usize,
    },
}

/// Expression evaluation error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("unknown tracker '{0}'")]
    UnknownTracker(String),
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("expression produced a non-finite result")]
    NonFinite,
}

/// Name lookup used while evaluating an [`Expr`].
pub trait Env {
    /// Current value of the tracker with the given id.
    fn tracker(&self, id: &str) -> Option<f64>;

    /// Value bound to a bare variable name.
    fn variable(&self, _name: &str) -> Option<f64> {
        None
    }
}

impl Env for HashMap<String, f64> {
    fn tracker(&self, id: &str) -> Option<f64> {
        self.get(id).copied()
    }
}

/// Environment that binds `value` (and its alias `x`) to a single number.
#[derive(Debug, Clone, Copy)]
pub struct ValueEnv(pub f64);

impl Env for ValueEnv {
    fn tracker(&self, _id: &str) -> Option<f64> {
        None
    }

    fn variable(&self, name: &str) -> Option<f64> {
        match name {
            "value" | "x" => Some(self.0),
            _ => None,
        }
    }
}

/// Returns `true` for characters allowed inside a tracker id.
pub fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Returns `true` when `id` is a non-empty run of tracker id characters.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(is_id_char)
}

/// Collects the ids of every well-formed `[id]` reference in `input`, in
/// order of first appearance, without parsing the surrounding arithmetic.
pub fn tracker_refs(input: &str) -> Vec<String> {
    let mut refs: Vec<String> = Vec::new();
    let mut rest = input;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(']') else {
            break;
        };
        let id = &after[..close];
        if is_valid_id(id) && !refs.iter().any(|r| r == id) {
            refs.push(id.to_string());
        }
        rest = &after[close + 1..];
    }
    refs
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Ref(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    Comma,
    Semicolon,
    Eof,
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(n)
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.next_char();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> Result<f64, ParseError> {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() || c == '.' {
                self.next_char();
            } else {
                break;
            }
        }

        // Only treat `e` as an exponent when digits follow, so `2e` stays
        // "2 followed by the constant e" and fails later as a syntax error.
        if matches!(self.peek_char(), Some('e' | 'E')) {
            let has_digits = match self.peek_nth(1) {
                Some(c) if c.is_ascii_digit() => true,
                Some('+' | '-') => self.peek_nth(2).is_some_and(|c| c.is_ascii_digit()),
                _ => false,
            };
            if has_digits {
                self.next_char();
                if matches!(self.peek_char(), Some('+' | '-')) {
                    self.next_char();
                }
                while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                    self.next_char();
                }
            }
        }

        let s = &self.input[start..self.pos];
        s.parse()
            .map_err(|_| ParseError::InvalidNumber(s.to_string()))
    }

    fn read_ident(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.next_char();
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn read_ref(&mut self) -> Result<String, ParseError> {
        self.next_char();
        let start = self.pos;
        loop {
            match self.next_char() {
                Some(']') => break,
                Some(_) => {}
                None => return Err(ParseError::UnterminatedReference),
            }
        }
        let id = &self.input[start..self.pos - 1];
        if is_valid_id(id) {
            Ok(id.to_string())
        } else {
            Err(ParseError::InvalidReference(id.to_string()))
        }
    }

    fn single(&mut self, token: Token) -> Result<Token, ParseError> {
        self.next_char();
        Ok(token)
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_whitespace();

        let Some(c) = self.peek_char() else {
            return Ok(Token::Eof);
        };

        match c {
            '+' => self.single(Token::Plus),
            '-' => self.single(Token::Minus),
            '*' => self.single(Token::Star),
            '/' => self.single(Token::Slash),
            '^' => self.single(Token::Caret),
            '(' => self.single(Token::LParen),
            ')' => self.single(Token::RParen),
            ',' => self.single(Token::Comma),
            ';' => self.single(Token::Semicolon),
            '[' => Ok(Token::Ref(self.read_ref()?)),
            '0'..='9' | '.' => Ok(Token::Number(self.read_number()?)),
            'a'..='z' | 'A'..='Z' | '_' => Ok(Token::Ident(self.read_ident())),
            _ => Err(ParseError::UnexpectedChar(c)),
        }
    }
}

// ============================================================================
// AST
// ============================================================================

/// AST node for expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    Num(f64),
    /// `[id]`: the current value of another tracker.
    Tracker(String),
    /// A bare identifier bound by the evaluation environment.
    Var(String),
    Unary(UnaryOp, Box<Ast>),
    Binary(BinOp, Box<Ast>, Box<Ast>),
    Call(Builtin, Vec<Ast>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Functions callable from expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Sin,
    Cos,
    Tan,
    Sqrt,
    Abs,
    Floor,
    Ceil,
    Round,
    Exp,
    Ln,
    Log,
    Min,
    Max,
    Clamp,
}

impl Builtin {
    fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "sin" => Self::Sin,
            "cos" => Self::Cos,
            "tan" => Self::Tan,
            "sqrt" => Self::Sqrt,
            "abs" => Self::Abs,
            "floor" => Self::Floor,
            "ceil" => Self::Ceil,
            "round" => Self::Round,
            "exp" => Self::Exp,
            "ln" => Self::Ln,
            "log" => Self::Log,
            "min" => Self::Min,
            "max" => Self::Max,
            "clamp" => Self::Clamp,
            _ => return None,
        })
    }

    /// Number of arguments the function takes.
    pub fn arity(self) -> usize {
        match self {
            Self::Min | Self::Max => 2,
            Self::Clamp => 3,
            _ => 1,
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        match (self, args) {
            (Self::Sin, [a]) => a.sin(),
            (Self::Cos, [a]) => a.cos(),
            (Self::Tan, [a]) => a.tan(),
            (Self::Sqrt, [a]) => a.sqrt(),
            (Self::Abs, [a]) => a.abs(),
            (Self::Floor, [a]) => a.floor(),
            (Self::Ceil, [a]) => a.ceil(),
            (Self::Round, [a]) => a.round(),
            (Self::Exp, [a]) => a.exp(),
            (Self::Ln, [a]) => a.ln(),
            (Self::Log, [a]) => a.log10(),
            (Self::Min, [a, b]) => a.min(*b),
            (Self::Max, [a, b]) => a.max(*b),
            // `f64::clamp` panics when lo > hi.
            (Self::Clamp, [x, lo, hi]) => x.max(*lo).min(*hi),
            _ => f64::NAN,
        }
    }
}

// ============================================================================
// Parser
// ============================================================================

struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token()?;
        Ok(Self { lexer, current })
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn unexpected(&self) -> ParseError {
        match self.current {
            Token::Eof => ParseError::UnexpectedEnd,
            ref other => ParseError::UnexpectedToken(format!("{other:?}")),
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        if self.current == expected {
            self.advance()
        } else {
            Err(self.unexpected())
        }
    }

    fn parse_statement(&mut self) -> Result<Ast, ParseError> {
        let ast = self.parse_expr()?;
        while self.current == Token::Semicolon {
            self.advance()?;
        }
        if self.current != Token::Eof {
            return Err(self.unexpected());
        }
        Ok(ast)
    }

    fn parse_expr(&mut self) -> Result<Ast, ParseError> {
        let mut left = self.parse_term()?;

        loop {
            let op = match self.current {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_term()?;
            left = Ast::Binary(op, Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Ast, ParseError> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.current {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_unary()?;
            left = Ast::Binary(op, Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    // Unary minus binds looser than `^`, so `-2^2` is `-(2^2)`.
    fn parse_unary(&mut self) -> Result<Ast, ParseError> {
        match self.current {
            Token::Minus => {
                self.advance()?;
                let inner = self.parse_unary()?;
                Ok(Ast::Unary(UnaryOp::Neg, Box::new(inner)))
            }
            Token::Plus => {
                self.advance()?;
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Ast, ParseError> {
        let base = self.parse_primary()?;

        if self.current == Token::Caret {
            self.advance()?;
            let exp = self.parse_unary()?; // right associative
            Ok(Ast::Binary(BinOp::Pow, Box::new(base), Box::new(exp)))
        } else {
            Ok(base)
        }
    }

    fn parse_primary(&mut self) -> Result<Ast, ParseError> {
        match &self.current {
            Token::Number(n) => {
                let n = *n;
                self.advance()?;
                Ok(Ast::Num(n))
            }
            Token::Ref(id) => {
                let id = id.clone();
                self.advance()?;
                Ok(Ast::Tracker(id))
            }
            Token::Ident(name) => {
                let name = name.clone();
                self.advance()?;

                if self.current == Token::LParen {
                    self.advance()?;
                    let func = Builtin::lookup(&name)
                        .ok_or_else(|| ParseError::UnknownFunction(name.clone()))?;
                    let mut args = Vec::new();
                    if self.current != Token::RParen {
                        args.push(self.parse_expr()?);
                        while self.current == Token::Comma {
                            self.advance()?;
                            args.push(self.parse_expr()?);
                        }
                    }
                    self.expect(Token::RParen)?;
                    if args.len() != func.arity() {
                        return Err(ParseError::WrongArgCount {
                            name,
                            expected: func.arity(),
                            got: args.len(),
                        });
                    }
                    Ok(Ast::Call(func, args))
                } else {
                    match name.as_str() {
                        "pi" | "PI" => Ok(Ast::Num(PI)),
                        "e" | "E" => Ok(Ast::Num(E)),
                        _ => Ok(Ast::Var(name)),
                    }
                }
            }
            Token::LParen => {
                self.advance()?;
                let inner = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            _ => Err(self.unexpected()),
        }
    }
}

// ============================================================================
// Expression
// ============================================================================

/// A parsed expression that can be evaluated against an [`Env`].
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    ast: Ast,
}

impl Expr {
    /// Parses an expression from a string.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut parser = Parser::new(input)?;
        let ast = parser.parse_statement()?;
        Ok(Self { ast })
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    /// Tracker ids referenced with `[id]`, deduplicated and sorted.
    pub fn tracker_refs(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        visit(&self.ast, &mut |node| {
            if let Ast::Tracker(id) = node {
                out.insert(id.clone());
            }
        });
        out
    }

    /// Bare variable names used by the expression, deduplicated and sorted.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        visit(&self.ast, &mut |node| {
            if let Ast::Var(name) = node {
                out.insert(name.clone());
            }
        });
        out
    }

    /// Evaluates the expression. Results that are NaN or infinite are
    /// reported as [`EvalError::NonFinite`].
    pub fn eval(&self, env: &dyn Env) -> Result<f64, EvalError> {
        let value = eval_ast(&self.ast, env)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(EvalError::NonFinite)
        }
    }
}

fn visit(ast: &Ast, f: &mut dyn FnMut(&Ast)) {
    f(ast);
    match ast {
        Ast::Unary(_, inner) => visit(inner, f),
        Ast::Binary(_, l, r) => {
            visit(l, f);
            visit(r, f);
        }
        Ast::Call(_, args) => args.iter().for_each(|arg| visit(arg, f)),
        Ast::Num(_) | Ast::Tracker(_) | Ast::Var(_) => {}
    }
}

fn eval_ast(ast: &Ast, env: &dyn Env) -> Result<f64, EvalError> {
    match ast {
        Ast::Num(n) => Ok(*n),
        Ast::Tracker(id) => env
            .tracker(id)
            .ok_or_else(|| EvalError::UnknownTracker(id.clone())),
        Ast::Var(name) => env
            .variable(name)
            .ok_or_else(|| EvalError::UnknownVariable(name.clone())),
        Ast::Unary(UnaryOp::Neg, inner) => Ok(-eval_ast(inner, env)?),
        Ast::Binary(op, l, r) => {
            let l = eval_ast(l, env)?;
            let r = eval_ast(r, env)?;
            Ok(match op {
                BinOp::Add => l + r,
                BinOp::Sub => l - r,
                BinOp::Mul => l * r,
                BinOp::Div => l / r,
                BinOp::Pow => l.powf(r),
            })
        }
        Ast::Call(func, args) => {
            let values = args
                .iter()
                .map(|arg| eval_ast(arg, env))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(func.apply(&values))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(src: &str) -> f64 {
        Expr::parse(src).unwrap().eval(&HashMap::new()).unwrap()
    }

    fn env(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn respects_precedence_and_associativity() {
        assert_eq!(eval("1 + 2 * 3"), 7.0);
        assert_eq!(eval("(1 + 2) * 3"), 9.0);
        assert_eq!(eval("2 ^ 3 ^ 2"), 512.0);
        assert_eq!(eval("-2 ^ 2"), -4.0);
        assert_eq!(eval("10 - 4 - 3"), 3.0);
        assert_eq!(eval("+3 * -2"), -6.0);
    }

    #[test]
    fn parses_exponent_literals() {
        assert_eq!(eval("1.5e2"), 150.0);
        assert_eq!(eval("2E-1 * 10"), 2.0);
        assert!(Expr::parse("2e").is_err());
    }

    #[test]
    fn trailing_semicolons_are_transparent() {
        assert_eq!(eval("4 / 2;"), 2.0);
        assert_eq!(eval("4 / 2;;"), 2.0);
        assert!(Expr::parse("4; 2").is_err());
    }

    #[test]
    fn resolves_tracker_references() {
        let expr = Expr::parse("[a] * 3 + [b-2]").unwrap();
        let refs: Vec<_> = expr.tracker_refs().into_iter().collect();
        assert_eq!(refs, vec!["a".to_string(), "b-2".to_string()]);

        let value = expr.eval(&env(&[("a", 2.0), ("b-2", -1.5)])).unwrap();
        assert_eq!(value, 4.5);

        let err = expr.eval(&env(&[("a", 2.0)])).unwrap_err();
        assert_eq!(err, EvalError::UnknownTracker("b-2".into()));
    }

    #[test]
    fn evaluates_builtins_and_constants() {
        assert!((eval("sin(pi / 2)") - 1.0).abs() < 1e-12);
        assert_eq!(eval("max(2, min(7, 5))"), 5.0);
        assert_eq!(eval("clamp(12, 0, 10)"), 10.0);
        assert!((eval("log(1000)") - 3.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_bad_calls() {
        assert_eq!(
            Expr::parse("nope(1)").unwrap_err(),
            ParseError::UnknownFunction("nope".into())
        );
        assert!(matches!(
            Expr::parse("min(1)").unwrap_err(),
            ParseError::WrongArgCount { expected: 2, got: 1, .. }
        ));
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(Expr::parse("").unwrap_err(), ParseError::UnexpectedEnd);
        assert_eq!(Expr::parse("1 +").unwrap_err(), ParseError::UnexpectedEnd);
        assert!(Expr::parse("(1 + 2").is_err());
        assert_eq!(Expr::parse("1 % 2").unwrap_err(), ParseError::UnexpectedChar('%'));
        assert_eq!(Expr::parse("[a").unwrap_err(), ParseError::UnterminatedReference);
        assert_eq!(
            Expr::parse("[a b]").unwrap_err(),
            ParseError::InvalidReference("a b".into())
        );
    }

    #[test]
    fn non_finite_results_are_errors() {
        let expr = Expr::parse("1 / 0").unwrap();
        assert_eq!(expr.eval(&HashMap::new()), Err(EvalError::NonFinite));
        let expr = Expr::parse("sqrt(-1)").unwrap();
        assert_eq!(expr.eval(&HashMap::new()), Err(EvalError::NonFinite));
    }

    #[test]
    fn value_env_binds_value_and_x() {
        let expr = Expr::parse("value * 2 + x").unwrap();
        assert_eq!(expr.eval(&ValueEnv(3.0)).unwrap(), 9.0);
        let vars: Vec<_> = expr.variables().into_iter().collect();
        assert_eq!(vars, vec!["value".to_string(), "x".to_string()]);
    }

    #[test]
    fn scans_references_lexically() {
        assert_eq!(tracker_refs("[a] + [b] * [a] - [bad id]"), vec!["a", "b"]);
        assert!(tracker_refs("1 + 2").is_empty());
    }
}
