//! Infix expression parser.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! expr   := term (("+" | "-") term)*
//! term   := unary (("*" | "/") unary)*
//! unary  := "-" unary | power
//! power  := atom (("^" | "**") unary)?
//! atom   := number | ident | ident "(" expr ")" | "(" expr ")"
//! ```
//!
//! Decimal literals are read exactly, so `0.5` parses to the rational `1/2`.

use std::str::FromStr;

use num_rational::Rational64;

use crate::error::{ExprError, Result};
use crate::expr::{Expr, Func};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(Rational64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn parse_error(position: usize, message: impl Into<String>) -> ExprError {
    ExprError::Parse {
        position,
        message: message.into(),
    }
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        let start = i;
        match c {
            b' ' | b'\t' | b'\n' | b'\r' => {
                i += 1;
                continue;
            }
            b'+' => tokens.push((start, Token::Plus)),
            b'-' => tokens.push((start, Token::Minus)),
            b'/' => tokens.push((start, Token::Slash)),
            b'^' => tokens.push((start, Token::Caret)),
            b'(' => tokens.push((start, Token::LParen)),
            b')' => tokens.push((start, Token::RParen)),
            b'*' => {
                if bytes.get(i + 1) == Some(&b'*') {
                    i += 1;
                    tokens.push((start, Token::Caret));
                } else {
                    tokens.push((start, Token::Star));
                }
            }
            b'0'..=b'9' | b'.' => {
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                let value = parse_decimal(&input[start..i], start)?;
                tokens.push((start, Token::Num(value)));
                continue;
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                tokens.push((start, Token::Ident(input[start..i].to_string())));
                continue;
            }
            _ => {
                let ch = input[start..].chars().next().unwrap_or('?');
                return Err(parse_error(start, format!("unexpected character '{ch}'")));
            }
        }
        i += 1;
    }
    Ok(tokens)
}

fn parse_decimal(text: &str, position: usize) -> Result<Rational64> {
    let (int_part, frac_part) = match text.split_once('.') {
        Some((a, b)) => (a, b),
        None => (text, ""),
    };
    if frac_part.contains('.') || (int_part.is_empty() && frac_part.is_empty()) {
        return Err(parse_error(position, format!("malformed number '{text}'")));
    }
    let too_large = || parse_error(position, format!("numeric literal '{text}' is too large"));
    let mut numer: i64 = 0;
    let mut denom: i64 = 1;
    for d in int_part.bytes().chain(frac_part.bytes()) {
        numer = numer
            .checked_mul(10)
            .and_then(|n| n.checked_add(i64::from(d - b'0')))
            .ok_or_else(too_large)?;
    }
    for _ in 0..frac_part.len() {
        denom = denom.checked_mul(10).ok_or_else(too_large)?;
    }
    Ok(Rational64::new(numer, denom))
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(p, _)| *p)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        t
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(parse_error(self.position(), format!("expected {what}")))
        }
    }

    fn expr(&mut self) -> Result<Expr> {
        let mut acc = self.term()?;
        loop {
            if self.eat(&Token::Plus) {
                acc = acc + self.term()?;
            } else if self.eat(&Token::Minus) {
                acc = acc - self.term()?;
            } else {
                return Ok(acc);
            }
        }
    }

    fn term(&mut self) -> Result<Expr> {
        let mut acc = self.unary()?;
        loop {
            if self.eat(&Token::Star) {
                acc = acc * self.unary()?;
            } else if self.eat(&Token::Slash) {
                acc = acc / self.unary()?;
            } else {
                return Ok(acc);
            }
        }
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.eat(&Token::Minus) {
            return Ok(-self.unary()?);
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr> {
        let base = self.atom()?;
        if self.eat(&Token::Caret) {
            let exponent = self.unary()?;
            return Ok(base.pow(exponent));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr> {
        let position = self.position();
        match self.bump() {
            Some(Token::Num(r)) => Ok(Expr::ratio(r)),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if !self.eat(&Token::LParen) {
                    return Ok(Expr::symbol(name));
                }
                let arg = self.expr()?;
                self.expect(&Token::RParen, "')'")?;
                if name == "sqrt" {
                    return Ok(arg.sqrt());
                }
                Func::from_name(&name)
                    .map(|func| Expr::call(func, arg))
                    .ok_or_else(|| parse_error(position, format!("unknown function '{name}'")))
            }
            Some(other) => Err(parse_error(position, format!("unexpected token {other:?}"))),
            None => Err(parse_error(position, "unexpected end of input")),
        }
    }
}

/// Parse an infix expression such as `a^2*sin(u)^2`.
pub fn parse(input: &str) -> Result<Expr> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        pos: 0,
        end: input.len(),
    };
    let expr = parser.expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(parse_error(parser.position(), "trailing input"));
    }
    Ok(expr)
}

impl Expr {
    /// Parse infix text such as `"a^2*sin(x)^2"`.
    pub fn parse(input: &str) -> Result<Expr> {
        parse(input)
    }
}

impl FromStr for Expr {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self> {
        parse(s)
    }
}
