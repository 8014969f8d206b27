//! Immutable expression trees over named symbols.
//!
//! [`Expr`] is a cheap-to-clone handle to a [`Node`]. Constructors fold
//! numeric constants and flatten nested sums and products, but perform no
//! algebraic rewriting; canonicalisation is done by [`Expr::simplify`].

use std::collections::BTreeSet;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::Arc;

use num_rational::Rational64;
use num_traits::{CheckedAdd, CheckedDiv, CheckedMul, One, Signed, Zero};

/// A named coordinate or parameter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(Arc<str>);

impl Symbol {
    /// Intern `name` as a symbol.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The symbol name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Symbol {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Elementary functions understood by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Func {
    Sin,
    Cos,
    Tan,
    Exp,
    Ln,
    Sinh,
    Cosh,
}

impl Func {
    pub const ALL: [Func; 7] = [
        Func::Sin,
        Func::Cos,
        Func::Tan,
        Func::Exp,
        Func::Ln,
        Func::Sinh,
        Func::Cosh,
    ];

    /// Lower-case name used by the parser and `Display`.
    pub fn name(self) -> &'static str {
        match self {
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Tan => "tan",
            Func::Exp => "exp",
            Func::Ln => "ln",
            Func::Sinh => "sinh",
            Func::Cosh => "cosh",
        }
    }

    /// Look up a function by name. `log` is accepted as an alias for `ln`.
    pub fn from_name(name: &str) -> Option<Self> {
        if name == "log" {
            return Some(Func::Ln);
        }
        Self::ALL.into_iter().find(|func| func.name() == name)
    }

    /// Apply the function to a float.
    pub fn eval(self, x: f64) -> f64 {
        match self {
            Func::Sin => x.sin(),
            Func::Cos => x.cos(),
            Func::Tan => x.tan(),
            Func::Exp => x.exp(),
            Func::Ln => x.ln(),
            Func::Sinh => x.sinh(),
            Func::Cosh => x.cosh(),
        }
    }
}

/// Expression node.
///
/// Invariants maintained by the constructors: `Add` and `Mul` hold at least
/// two operands, never directly contain another node of the same kind, and
/// carry at most one numeric operand (last in a sum, first in a product)
/// unless folding them would overflow.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Node {
    Num(Rational64),
    Sym(Symbol),
    Add(Vec<Expr>),
    Mul(Vec<Expr>),
    Pow(Expr, Expr),
    Call(Func, Expr),
}

/// Shared handle to an immutable expression.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Expr(Arc<Node>);

impl Expr {
    fn from_node(node: Node) -> Self {
        Self(Arc::new(node))
    }

    /// The root node.
    pub fn node(&self) -> &Node {
        &self.0
    }

    /// The constant `0`.
    pub fn zero() -> Self {
        Self::ratio(Rational64::zero())
    }

    /// The constant `1`.
    pub fn one() -> Self {
        Self::ratio(Rational64::one())
    }

    /// Integer constant.
    pub fn int(n: i64) -> Self {
        Self::ratio(Rational64::from_integer(n))
    }

    /// Exact rational `numer / denom`.
    ///
    /// Panics if `denom` is zero.
    pub fn rational(numer: i64, denom: i64) -> Self {
        Self::ratio(Rational64::new(numer, denom))
    }

    /// Rational constant.
    pub fn ratio(r: Rational64) -> Self {
        Self::from_node(Node::Num(r))
    }

    /// Expression consisting of the single symbol `name`.
    pub fn symbol(name: impl AsRef<str>) -> Self {
        Self::from_node(Node::Sym(Symbol::new(name)))
    }

    /// The value of a numeric constant.
    pub fn as_number(&self) -> Option<Rational64> {
        match self.node() {
            Node::Num(r) => Some(*r),
            _ => None,
        }
    }

    /// The symbol, if this is a bare symbol.
    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self.node() {
            Node::Sym(s) => Some(s),
            _ => None,
        }
    }

    /// `true` only for the literal `0`; see [`Expr::is_identically_zero`].
    pub fn is_zero(&self) -> bool {
        matches!(self.node(), Node::Num(r) if r.is_zero())
    }

    /// `true` only for the literal `1`.
    pub fn is_one(&self) -> bool {
        matches!(self.node(), Node::Num(r) if r.is_one())
    }

    /// Sum of terms, flattening nested sums and folding numeric terms.
    ///
    /// A numeric term whose fold would overflow is kept as its own operand.
    pub fn sum(terms: impl IntoIterator<Item = Expr>) -> Self {
        let mut constant = Rational64::zero();
        let mut out = Vec::new();
        let mut fold = |term: &Expr, out: &mut Vec<Expr>| match term.node() {
            Node::Num(r) => match constant.checked_add(r) {
                Some(c) => constant = c,
                None => out.push(term.clone()),
            },
            _ => out.push(term.clone()),
        };
        for term in terms {
            match term.node() {
                Node::Add(inner) => {
                    for t in inner {
                        fold(t, &mut out);
                    }
                }
                _ => fold(&term, &mut out),
            }
        }
        if !constant.is_zero() {
            out.push(Self::ratio(constant));
        }
        match out.len() {
            0 => Self::zero(),
            1 => out.swap_remove(0),
            _ => Self::from_node(Node::Add(out)),
        }
    }

    /// Product of factors, flattening nested products and folding numeric factors.
    ///
    /// A numeric factor whose fold would overflow is kept as its own operand.
    pub fn product(factors: impl IntoIterator<Item = Expr>) -> Self {
        let mut coeff = Rational64::one();
        let mut out = Vec::new();
        let mut fold = |factor: &Expr, out: &mut Vec<Expr>| match factor.node() {
            Node::Num(r) => match coeff.checked_mul(r) {
                Some(c) => coeff = c,
                None => out.push(factor.clone()),
            },
            _ => out.push(factor.clone()),
        };
        for factor in factors {
            match factor.node() {
                Node::Mul(inner) => {
                    for g in inner {
                        fold(g, &mut out);
                    }
                }
                _ => fold(&factor, &mut out),
            }
        }
        if coeff.is_zero() {
            return Self::zero();
        }
        if out.is_empty() {
            return Self::ratio(coeff);
        }
        if !coeff.is_one() {
            out.insert(0, Self::ratio(coeff));
        }
        if out.len() == 1 {
            out.swap_remove(0)
        } else {
            Self::from_node(Node::Mul(out))
        }
    }

    /// `self^exponent`.
    ///
    /// Folds numeric powers that fit in `i64` and `(b^r)^k` for integer `k`;
    /// anything else stays a `Pow` node.
    pub fn pow(&self, exponent: impl Into<Expr>) -> Self {
        let exponent = exponent.into();
        if let Some(e) = exponent.as_number() {
            if e.is_zero() {
                return Self::one();
            }
            if e.is_one() {
                return self.clone();
            }
            match self.node() {
                Node::Num(b) => {
                    if b.is_one() {
                        return Self::one();
                    }
                    if e.is_integer() && !(b.is_zero() && e.is_negative()) {
                        if let Some(r) = ratio_powi(*b, e.to_integer()) {
                            return Self::ratio(r);
                        }
                    }
                }
                Node::Pow(base, inner) => {
                    // (b^r)^k = b^(r k) holds for integer k.
                    if let Some(r) = inner.as_number() {
                        if let Some(re) = r.checked_mul(&e).filter(|_| e.is_integer()) {
                            return base.pow(Self::ratio(re));
                        }
                    }
                }
                _ => {}
            }
        }
        Self::from_node(Node::Pow(self.clone(), exponent))
    }

    /// Integer power; see [`Expr::pow`].
    pub fn powi(&self, k: i64) -> Self {
        self.pow(Self::int(k))
    }

    /// `self^(1/2)`.
    pub fn sqrt(&self) -> Self {
        self.pow(Self::rational(1, 2))
    }

    /// `self^-1`.
    pub fn recip(&self) -> Self {
        self.powi(-1)
    }

    /// Apply `func` to `arg` without evaluating.
    pub fn call(func: Func, arg: Expr) -> Self {
        Self::from_node(Node::Call(func, arg))
    }

    /// `sin(self)`.
    pub fn sin(&self) -> Self {
        Self::call(Func::Sin, self.clone())
    }

    /// `cos(self)`.
    pub fn cos(&self) -> Self {
        Self::call(Func::Cos, self.clone())
    }

    /// `tan(self)`.
    pub fn tan(&self) -> Self {
        Self::call(Func::Tan, self.clone())
    }

    /// `exp(self)`.
    pub fn exp(&self) -> Self {
        Self::call(Func::Exp, self.clone())
    }

    /// Natural logarithm.
    pub fn ln(&self) -> Self {
        Self::call(Func::Ln, self.clone())
    }

    /// `sinh(self)`.
    pub fn sinh(&self) -> Self {
        Self::call(Func::Sinh, self.clone())
    }

    /// `cosh(self)`.
    pub fn cosh(&self) -> Self {
        Self::call(Func::Cosh, self.clone())
    }

    /// All symbols referenced by the expression.
    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<Symbol>) {
        match self.node() {
            Node::Num(_) => {}
            Node::Sym(s) => {
                out.insert(s.clone());
            }
            Node::Add(items) | Node::Mul(items) => {
                for item in items {
                    item.collect_symbols(out);
                }
            }
            Node::Pow(b, e) => {
                b.collect_symbols(out);
                e.collect_symbols(out);
            }
            Node::Call(_, arg) => arg.collect_symbols(out),
        }
    }

    /// `true` if `sym` occurs anywhere in the tree.
    pub fn contains(&self, sym: &Symbol) -> bool {
        match self.node() {
            Node::Num(_) => false,
            Node::Sym(s) => s == sym,
            Node::Add(items) | Node::Mul(items) => items.iter().any(|item| item.contains(sym)),
            Node::Pow(b, e) => b.contains(sym) || e.contains(sym),
            Node::Call(_, arg) => arg.contains(sym),
        }
    }
}

/// Exact integer power of a rational, or `None` if it leaves `i64`.
///
/// The base must be nonzero when `k` is negative.
pub(crate) fn ratio_powi(base: Rational64, k: i64) -> Option<Rational64> {
    let mut result = Rational64::one();
    let mut b = if k < 0 {
        Rational64::one().checked_div(&base)?
    } else {
        base
    };
    let mut n = k.unsigned_abs();
    while n > 0 {
        if n & 1 == 1 {
            result = result.checked_mul(&b)?;
        }
        n >>= 1;
        if n > 0 {
            b = b.checked_mul(&b)?;
        }
    }
    Some(result)
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Self::int(n)
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        Self::int(i64::from(n))
    }
}

impl From<Rational64> for Expr {
    fn from(r: Rational64) -> Self {
        Self::ratio(r)
    }
}

impl From<Symbol> for Expr {
    fn from(s: Symbol) -> Self {
        Self::from_node(Node::Sym(s))
    }
}

impl From<&Symbol> for Expr {
    fn from(s: &Symbol) -> Self {
        Self::from_node(Node::Sym(s.clone()))
    }
}

impl From<&Expr> for Expr {
    fn from(e: &Expr) -> Self {
        e.clone()
    }
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

fn add_exprs(a: &Expr, b: &Expr) -> Expr {
    Expr::sum([a.clone(), b.clone()])
}

fn sub_exprs(a: &Expr, b: &Expr) -> Expr {
    Expr::sum([a.clone(), -b])
}

fn mul_exprs(a: &Expr, b: &Expr) -> Expr {
    Expr::product([a.clone(), b.clone()])
}

fn div_exprs(a: &Expr, b: &Expr) -> Expr {
    Expr::product([a.clone(), b.recip()])
}

macro_rules! impl_binop {
    ($trait:ident, $method:ident, $build:path) => {
        impl $trait<Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                $build(&self, &rhs)
            }
        }

        impl $trait<&Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                $build(&self, rhs)
            }
        }

        impl $trait<Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                $build(self, &rhs)
            }
        }

        impl $trait<&Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                $build(self, rhs)
            }
        }

        impl $trait<i64> for Expr {
            type Output = Expr;
            fn $method(self, rhs: i64) -> Expr {
                $build(&self, &Expr::int(rhs))
            }
        }

        impl $trait<i64> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: i64) -> Expr {
                $build(self, &Expr::int(rhs))
            }
        }

        impl $trait<Expr> for i64 {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                $build(&Expr::int(self), &rhs)
            }
        }

        impl $trait<&Expr> for i64 {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                $build(&Expr::int(self), rhs)
            }
        }
    };
}

impl_binop!(Add, add, add_exprs);
impl_binop!(Sub, sub, sub_exprs);
impl_binop!(Mul, mul, mul_exprs);
impl_binop!(Div, div, div_exprs);

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::product([Expr::int(-1), self])
    }
}

impl Neg for &Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::product([Expr::int(-1), self.clone()])
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

const PREC_ADD: u8 = 1;
const PREC_MUL: u8 = 2;
const PREC_POW: u8 = 3;
const PREC_ATOM: u8 = 4;

fn is_negative_number(e: &Expr) -> bool {
    matches!(e.node(), Node::Num(r) if r.is_negative())
}

impl Expr {
    fn precedence(&self) -> u8 {
        match self.node() {
            Node::Num(r) if r.is_negative() => PREC_ADD,
            Node::Num(r) if !r.is_integer() => PREC_MUL,
            Node::Num(_) | Node::Sym(_) | Node::Call(..) => PREC_ATOM,
            Node::Add(_) => PREC_ADD,
            Node::Mul(factors) if is_negative_number(&factors[0]) => PREC_ADD,
            Node::Mul(_) => PREC_MUL,
            Node::Pow(_, e) if is_negative_number(e) => PREC_MUL,
            Node::Pow(..) => PREC_POW,
        }
    }

    /// The term with its sign flipped, when it prints with a leading minus.
    fn negated_term(&self) -> Option<Expr> {
        match self.node() {
            Node::Num(r) if r.is_negative() => r.checked_mul(&-Rational64::one()).map(Expr::ratio),
            Node::Mul(factors) if is_negative_number(&factors[0]) => Some(-self),
            _ => None,
        }
    }

    fn write_prec(&self, f: &mut fmt::Formatter<'_>, parent: u8) -> fmt::Result {
        if self.precedence() < parent {
            f.write_str("(")?;
            self.write_bare(f)?;
            f.write_str(")")
        } else {
            self.write_bare(f)
        }
    }

    fn write_bare(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node() {
            Node::Num(r) if r.is_integer() => write!(f, "{}", r.numer()),
            Node::Num(r) => write!(f, "{}/{}", r.numer(), r.denom()),
            Node::Sym(s) => write!(f, "{s}"),
            Node::Call(func, arg) => {
                write!(f, "{}(", func.name())?;
                arg.write_prec(f, 0)?;
                f.write_str(")")
            }
            Node::Add(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    if i == 0 {
                        term.write_prec(f, PREC_ADD)?;
                        continue;
                    }
                    match term.negated_term() {
                        Some(abs) => {
                            f.write_str(" - ")?;
                            abs.write_prec(f, PREC_MUL)?;
                        }
                        None => {
                            f.write_str(" + ")?;
                            term.write_prec(f, PREC_ADD)?;
                        }
                    }
                }
                Ok(())
            }
            Node::Mul(factors) => write_product(f, factors),
            Node::Pow(_, e) if is_negative_number(e) => write_product(f, std::slice::from_ref(self)),
            Node::Pow(b, e) => {
                b.write_prec(f, PREC_ATOM)?;
                f.write_str("^")?;
                e.write_prec(f, PREC_ATOM)
            }
        }
    }
}

/// Numeric exponent of a factor, treating anything else as `g^1`.
fn base_and_exponent(g: &Expr) -> (Expr, Rational64) {
    if let Node::Pow(b, e) = g.node() {
        if let Some(r) = e.as_number() {
            return (b.clone(), r);
        }
    }
    (g.clone(), Rational64::one())
}

/// Merge factors sharing a base into one power, keeping first-seen order.
fn merge_factors(factors: Vec<Expr>) -> Vec<Expr> {
    let mut merged: Vec<(Expr, Rational64)> = Vec::with_capacity(factors.len());
    for g in &factors {
        let (base, e) = base_and_exponent(g);
        let slot = merged
            .iter_mut()
            .find(|(b, _)| *b == base)
            .and_then(|(_, total)| total.checked_add(&e).map(|sum| (total, sum)));
        match slot {
            Some((total, sum)) => *total = sum,
            None => merged.push((base, e)),
        }
    }
    merged
        .into_iter()
        .map(|(base, e)| base.pow(Expr::ratio(e)))
        .collect()
}

fn write_product(f: &mut fmt::Formatter<'_>, factors: &[Expr]) -> fmt::Result {
    let mut coeff = Rational64::one();
    let mut numer = Vec::new();
    let mut denom = Vec::new();
    for g in factors {
        match g.node() {
            Node::Num(r) => match coeff.checked_mul(r) {
                Some(c) => coeff = c,
                None => numer.push(g.clone()),
            },
            Node::Pow(b, e) if is_negative_number(e) => denom.push(b.pow(-e)),
            _ => numer.push(g.clone()),
        }
    }
    let numer = merge_factors(numer);
    let denom = merge_factors(denom);
    if coeff.is_negative() {
        if let Some(abs) = coeff.checked_mul(&-Rational64::one()) {
            f.write_str("-")?;
            coeff = abs;
        }
    }

    let mut wrote = false;
    if !coeff.numer().is_one() || numer.is_empty() {
        write!(f, "{}", coeff.numer())?;
        wrote = true;
    }
    for g in numer {
        if wrote {
            f.write_str("*")?;
        }
        g.write_prec(f, PREC_MUL)?;
        wrote = true;
    }

    let scalar_denom = !coeff.denom().is_one();
    let denom_count = denom.len() + usize::from(scalar_denom);
    if denom_count == 0 {
        return Ok(());
    }
    f.write_str("/")?;
    let grouped = denom_count > 1;
    if grouped {
        f.write_str("(")?;
    }
    let mut first = true;
    if scalar_denom {
        write!(f, "{}", coeff.denom())?;
        first = false;
    }
    for g in &denom {
        if !first {
            f.write_str("*")?;
        }
        first = false;
        g.write_prec(f, if grouped { PREC_MUL } else { PREC_POW })?;
    }
    if grouped {
        f.write_str(")")?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_prec(f, 0)
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expr({self})")
    }
}
