//! Rational normal form used by the simplifier.
//!
//! An expression is brought to `N / (M * F_1^k_1 * ... * F_m^k_m)` where `N`
//! is an expanded polynomial over *atoms* (symbols, function applications,
//! non-integer powers) with exact rational coefficients, `M` is a monomial
//! and each `F_i` is a monic polynomial with no monomial content.
//!
//! Sums are put over the least common denominator of their factored
//! denominators, so an expression that vanishes identically as a rational
//! function of independent atoms always ends with a zero numerator. With
//! trigonometric identities enabled, `cos^2 u` and `cosh^2 u` are rewritten in
//! terms of `sin u` and `sinh u`, which makes the same hold modulo
//! `sin^2 + cos^2 = 1` and `cosh^2 - sinh^2 = 1`.
//!
//! # Limitations
//!
//! - No polynomial factorisation: a denominator factor is only cancelled when
//!   it divides the numerator exactly as a whole.
//! - `exp(2u)` and `exp(u)^2` are distinct atoms, as are `sin(2u)` and
//!   `sin u cos u`.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use num_rational::Rational64;
use num_traits::{CheckedAdd, CheckedDiv, CheckedMul, One, Signed, Zero};

use crate::BackendConfig;
use crate::error::{ExprError, Result};
use crate::expr::{Expr, Func, Node, Symbol};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Atom {
    Sym(Symbol),
    /// Function applied to a simplified argument.
    Call(Func, Expr),
    /// Simplified base raised to a non-integer or symbolic exponent.
    Pow(Expr, Expr),
}

impl Atom {
    fn to_expr(&self) -> Expr {
        match self {
            Atom::Sym(s) => Expr::from(s),
            Atom::Call(func, arg) => Expr::call(*func, arg.clone()),
            Atom::Pow(base, exponent) => base.pow(exponent.clone()),
        }
    }
}

type Monomial = BTreeMap<Atom, u32>;

fn add_coeff(a: Rational64, b: Rational64) -> Result<Rational64> {
    a.checked_add(&b).ok_or(ExprError::Overflow)
}

fn mul_coeff(a: Rational64, b: Rational64) -> Result<Rational64> {
    a.checked_mul(&b).ok_or(ExprError::Overflow)
}

fn div_coeff(a: Rational64, b: Rational64) -> Result<Rational64> {
    a.checked_div(&b).ok_or(ExprError::Overflow)
}

fn add_exponent(slot: &mut u32, e: u32) -> Result<()> {
    *slot = slot.checked_add(e).ok_or(ExprError::Overflow)?;
    Ok(())
}

fn mono_mul(a: &Monomial, b: &Monomial) -> Result<Monomial> {
    let mut out = a.clone();
    for (atom, e) in b {
        add_exponent(out.entry(atom.clone()).or_insert(0), *e)?;
    }
    Ok(out)
}

/// `a / b`, or `None` if `b` does not divide `a`.
fn mono_div(a: &Monomial, b: &Monomial) -> Option<Monomial> {
    let mut out = a.clone();
    for (atom, e) in b {
        let have = out.get(atom).copied().unwrap_or(0);
        if have < *e {
            return None;
        }
        if have == *e {
            out.remove(atom);
        } else {
            out.insert(atom.clone(), have - e);
        }
    }
    Some(out)
}

fn mono_gcd(a: &Monomial, b: &Monomial) -> Monomial {
    a.iter()
        .filter_map(|(atom, e)| b.get(atom).map(|f| (atom.clone(), (*e).min(*f))))
        .collect()
}

fn mono_lcm(a: &Monomial, b: &Monomial) -> Monomial {
    let mut out = a.clone();
    for (atom, e) in b {
        let slot = out.entry(atom.clone()).or_insert(0);
        *slot = (*slot).max(*e);
    }
    out
}

/// Lexicographic monomial order; atoms that sort first have priority.
fn lex_cmp(a: &Monomial, b: &Monomial) -> Ordering {
    let mut ia = a.iter().peekable();
    let mut ib = b.iter().peekable();
    loop {
        match (ia.peek(), ib.peek()) {
            (None, None) => return Ordering::Equal,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some((ka, ea)), Some((kb, eb))) => match ka.cmp(kb) {
                Ordering::Less => return Ordering::Greater,
                Ordering::Greater => return Ordering::Less,
                Ordering::Equal => match ea.cmp(eb) {
                    Ordering::Equal => {
                        ia.next();
                        ib.next();
                    }
                    other => return other,
                },
            },
        }
    }
}

fn mono_to_exprs(m: &Monomial) -> impl Iterator<Item = Expr> + '_ {
    m.iter().map(|(atom, e)| atom.to_expr().powi(i64::from(*e)))
}

/// `Some((base, q))` when the atom is the root `base^(1/q)`.
fn root_of(atom: &Atom) -> Option<(&Expr, u32)> {
    let Atom::Pow(base, exponent) = atom else {
        return None;
    };
    let r = exponent.as_number()?;
    if !r.numer().is_one() {
        return None;
    }
    u32::try_from(*r.denom())
        .ok()
        .filter(|q| *q > 1)
        .map(|q| (base, q))
}

/// `true` if some root `b^(1/q)` appears to a power of at least `q`.
fn has_whole_roots(m: &Monomial) -> bool {
    m.iter()
        .any(|(atom, e)| root_of(atom).is_some_and(|(_, q)| *e >= q))
}

/// Sparse polynomial over atoms with rational coefficients.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
struct Poly {
    terms: BTreeMap<Monomial, Rational64>,
}

impl Poly {
    fn zero() -> Self {
        Self::default()
    }

    fn constant(c: Rational64) -> Self {
        Self::term(Monomial::new(), c)
    }

    fn term(m: Monomial, c: Rational64) -> Self {
        let mut terms = BTreeMap::new();
        if !c.is_zero() {
            terms.insert(m, c);
        }
        Self { terms }
    }

    fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    fn len(&self) -> usize {
        self.terms.len()
    }

    fn as_constant(&self) -> Option<Rational64> {
        match self.terms.len() {
            0 => Some(Rational64::zero()),
            1 => self
                .terms
                .iter()
                .next()
                .filter(|(m, _)| m.is_empty())
                .map(|(_, c)| *c),
            _ => None,
        }
    }

    fn add_term(&mut self, m: Monomial, c: Rational64) -> Result<()> {
        if c.is_zero() {
            return Ok(());
        }
        match self.terms.entry(m) {
            Entry::Vacant(slot) => {
                slot.insert(c);
            }
            Entry::Occupied(mut slot) => {
                let sum = add_coeff(*slot.get(), c)?;
                if sum.is_zero() {
                    slot.remove();
                } else {
                    *slot.get_mut() = sum;
                }
            }
        }
        Ok(())
    }

    fn add(&self, other: &Poly) -> Result<Poly> {
        let mut out = self.clone();
        for (m, c) in &other.terms {
            out.add_term(m.clone(), *c)?;
        }
        Ok(out)
    }

    fn sub(&self, other: &Poly) -> Result<Poly> {
        self.add(&other.scale(-Rational64::one())?)
    }

    fn scale(&self, c: Rational64) -> Result<Poly> {
        if c.is_zero() {
            return Ok(Poly::zero());
        }
        let terms = self
            .terms
            .iter()
            .map(|(m, v)| Ok((m.clone(), mul_coeff(*v, c)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Poly { terms })
    }

    fn mul(&self, other: &Poly) -> Result<Poly> {
        let mut out = Poly::zero();
        for (m1, c1) in &self.terms {
            for (m2, c2) in &other.terms {
                out.add_term(mono_mul(m1, m2)?, mul_coeff(*c1, *c2)?)?;
            }
        }
        Ok(out)
    }

    fn mul_monomial(&self, m: &Monomial) -> Result<Poly> {
        if m.is_empty() {
            return Ok(self.clone());
        }
        let terms = self
            .terms
            .iter()
            .map(|(t, c)| Ok((mono_mul(t, m)?, *c)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Poly { terms })
    }

    fn powi(&self, k: u32) -> Result<Poly> {
        let mut out = Poly::constant(Rational64::one());
        for _ in 0..k {
            out = out.mul(self)?;
        }
        Ok(out)
    }

    fn leading(&self) -> Option<(&Monomial, Rational64)> {
        self.terms
            .iter()
            .max_by(|a, b| lex_cmp(a.0, b.0))
            .map(|(m, c)| (m, *c))
    }

    /// Greatest common monomial divisor of all terms.
    fn monomial_content(&self) -> Monomial {
        let mut iter = self.terms.keys();
        let Some(first) = iter.next() else {
            return Monomial::new();
        };
        let mut g = first.clone();
        for m in iter {
            if g.is_empty() {
                break;
            }
            g = mono_gcd(&g, m);
        }
        g
    }

    fn div_monomial(&self, m: &Monomial) -> Poly {
        if m.is_empty() {
            return self.clone();
        }
        Poly {
            terms: self
                .terms
                .iter()
                .filter_map(|(t, c)| mono_div(t, m).map(|q| (q, *c)))
                .collect(),
        }
    }

    /// Exact multivariate division; `None` if `divisor` does not divide `self`.
    fn exact_div(&self, divisor: &Poly) -> Result<Option<Poly>> {
        let Some((lm, lc)) = divisor.leading().map(|(m, c)| (m.clone(), c)) else {
            return Ok(None);
        };
        let mut rem = self.clone();
        let mut quot = Poly::zero();
        while let Some((m, c)) = rem.leading().map(|(m, c)| (m.clone(), c)) {
            let Some(qm) = mono_div(&m, &lm) else {
                return Ok(None);
            };
            let t = Poly::term(qm, div_coeff(c, lc)?);
            rem = rem.sub(&divisor.mul(&t)?)?;
            quot = quot.add(&t)?;
        }
        Ok(Some(quot))
    }

    /// Split into `c * m * p` with `m` the monomial content and `p` monic.
    fn split_content(&self) -> Result<(Rational64, Monomial, Poly)> {
        let m = self.monomial_content();
        let rest = self.div_monomial(&m);
        let lc = rest.leading().map(|(_, c)| c).unwrap_or_else(Rational64::one);
        let monic = rest.scale(div_coeff(Rational64::one(), lc)?)?;
        Ok((lc, m, monic))
    }

    fn to_expr(&self) -> Expr {
        let mut terms: Vec<_> = self.terms.iter().collect();
        terms.sort_by(|a, b| lex_cmp(b.0, a.0));
        Expr::sum(terms.into_iter().map(|(m, c)| {
            Expr::product(std::iter::once(Expr::ratio(*c)).chain(mono_to_exprs(m)))
        }))
    }
}

/// `cos u -> (sin u, -1)` and `cosh u -> (sinh u, +1)`: the partner atom and
/// sign in `atom^2 = 1 + sign * partner^2`.
fn pythagorean_partner(atom: &Atom) -> Option<(Atom, i64)> {
    match atom {
        Atom::Call(Func::Cos, arg) => Some((Atom::Call(Func::Sin, arg.clone()), -1)),
        Atom::Call(Func::Cosh, arg) => Some((Atom::Call(Func::Sinh, arg.clone()), 1)),
        _ => None,
    }
}

/// Rewrite `cos^2 u -> 1 - sin^2 u` and `cosh^2 u -> 1 + sinh^2 u` until no
/// squared `cos`/`cosh` atom remains.
fn apply_identities(poly: &Poly) -> Result<Poly> {
    let mut out = Poly::zero();
    let mut work: Vec<(Monomial, Rational64)> =
        poly.terms.iter().map(|(m, c)| (m.clone(), *c)).collect();
    while let Some((m, c)) = work.pop() {
        let reducible = m
            .iter()
            .filter(|(_, e)| **e >= 2)
            .find_map(|(atom, e)| pythagorean_partner(atom).map(|p| (atom.clone(), *e, p)));
        let Some((atom, e, (partner, sign))) = reducible else {
            out.add_term(m, c)?;
            continue;
        };
        let mut base = m;
        if e == 2 {
            base.remove(&atom);
        } else {
            base.insert(atom, e - 2);
        }
        let mut with_partner = base.clone();
        add_exponent(with_partner.entry(partner).or_insert(0), 2)?;
        work.push((base, c));
        work.push((with_partner, mul_coeff(c, Rational64::from_integer(sign))?));
    }
    Ok(out)
}

/// Cancel `cos^2 u` (`cosh^2 u`) in the denominator monomial against a
/// numerator divisible by `1 - sin^2 u` (`1 + sinh^2 u`).
fn cancel_pythagorean(f: &mut Fraction) -> Result<()> {
    let candidates: Vec<(Atom, Atom, i64)> = f
        .den
        .iter()
        .filter(|(_, e)| **e >= 2)
        .filter_map(|(atom, _)| pythagorean_partner(atom).map(|(p, s)| (atom.clone(), p, s)))
        .collect();
    for (atom, partner, sign) in candidates {
        let mut square = Monomial::new();
        square.insert(partner, 2);
        let mut identity = Poly::constant(Rational64::one());
        identity.add_term(square, Rational64::from_integer(sign))?;
        loop {
            let e = f.den.get(&atom).copied().unwrap_or(0);
            if e < 2 {
                break;
            }
            let Some(q) = f.num.exact_div(&identity)? else {
                break;
            };
            f.num = q;
            if e == 2 {
                f.den.remove(&atom);
            } else {
                f.den.insert(atom.clone(), e - 2);
            }
        }
    }
    Ok(())
}

/// `num / (den * prod factors^k)`.
#[derive(Debug, Clone)]
struct Fraction {
    num: Poly,
    den: Monomial,
    factors: BTreeMap<Poly, u32>,
}

impl Fraction {
    fn zero() -> Self {
        Self {
            num: Poly::zero(),
            den: Monomial::new(),
            factors: BTreeMap::new(),
        }
    }

    fn constant(c: Rational64) -> Self {
        Self {
            num: Poly::constant(c),
            ..Self::zero()
        }
    }

    fn one() -> Self {
        Self::constant(Rational64::one())
    }

    fn atom(atom: Atom) -> Self {
        let mut m = Monomial::new();
        m.insert(atom, 1);
        Self {
            num: Poly::term(m, Rational64::one()),
            ..Self::zero()
        }
    }

    fn is_zero(&self) -> bool {
        self.num.is_zero()
    }

    fn has_unit_denominator(&self) -> bool {
        self.den.is_empty() && self.factors.is_empty()
    }

    fn as_constant(&self) -> Option<Rational64> {
        if self.has_unit_denominator() {
            self.num.as_constant()
        } else {
            None
        }
    }

    /// `Some(u)` when the fraction is exactly `func(u)`.
    fn as_call(&self, func: Func) -> Option<Expr> {
        if !self.has_unit_denominator() || self.num.len() != 1 {
            return None;
        }
        let (m, c) = self.num.terms.iter().next()?;
        if !c.is_one() || m.len() != 1 {
            return None;
        }
        match m.iter().next()? {
            (Atom::Call(f, arg), 1) if *f == func => Some(arg.clone()),
            _ => None,
        }
    }

    fn neg(&self) -> Result<Self> {
        Ok(Self {
            num: self.num.scale(-Rational64::one())?,
            ..self.clone()
        })
    }

    fn is_negative(&self) -> bool {
        self.num.leading().is_some_and(|(_, c)| c.is_negative())
    }

    /// `true` if a root `b^(1/q)` is raised to `q` or more anywhere.
    fn has_whole_roots(&self) -> bool {
        has_whole_roots(&self.den) || self.num.terms.keys().any(has_whole_roots)
    }

    fn to_expr(&self) -> Expr {
        let mut factors = vec![self.num.to_expr()];
        for (atom, e) in &self.den {
            factors.push(atom.to_expr().powi(-i64::from(*e)));
        }
        for (p, k) in &self.factors {
            factors.push(p.to_expr().powi(-i64::from(*k)));
        }
        Expr::product(factors)
    }
}

/// Numerator of `f` rewritten over the denominator `den * prod factors`.
fn lift(f: &Fraction, den: &Monomial, factors: &BTreeMap<Poly, u32>) -> Result<Poly> {
    let extra = mono_div(den, &f.den).unwrap_or_default();
    let mut num = f.num.mul_monomial(&extra)?;
    for (p, k) in factors {
        let have = f.factors.get(p).copied().unwrap_or(0);
        if *k > have {
            num = num.mul(&p.powi(k - have)?)?;
        }
    }
    Ok(num)
}

fn cancel_monomial(f: &mut Fraction) {
    if f.den.is_empty() {
        return;
    }
    let common = mono_gcd(&f.num.monomial_content(), &f.den);
    if common.is_empty() {
        return;
    }
    f.num = f.num.div_monomial(&common);
    f.den = mono_div(&f.den, &common).unwrap_or_default();
}

/// Normal-form arithmetic under a backend configuration.
pub(crate) struct Simplifier<'a> {
    config: &'a BackendConfig,
}

impl<'a> Simplifier<'a> {
    pub(crate) fn new(config: &'a BackendConfig) -> Self {
        Self { config }
    }

    pub(crate) fn simplify(&self, expr: &Expr) -> Result<Expr> {
        Ok(self.normalize(expr)?.to_expr())
    }

    fn normalize(&self, expr: &Expr) -> Result<Fraction> {
        match expr.node() {
            Node::Num(r) => Ok(Fraction::constant(*r)),
            Node::Sym(s) => Ok(Fraction::atom(Atom::Sym(s.clone()))),
            Node::Add(terms) => {
                let mut acc = Fraction::zero();
                for t in terms {
                    let f = self.normalize(t)?;
                    acc = self.add(&acc, &f)?;
                }
                Ok(acc)
            }
            Node::Mul(factors) => {
                let mut acc = Fraction::one();
                for g in factors {
                    let f = self.normalize(g)?;
                    acc = self.mul(&acc, &f)?;
                }
                Ok(acc)
            }
            Node::Pow(base, exponent) => self.normalize_pow(base, exponent),
            Node::Call(func, arg) => self.normalize_call(*func, arg),
        }
    }

    fn normalize_pow(&self, base: &Expr, exponent: &Expr) -> Result<Fraction> {
        let b = self.normalize(base)?;
        let e = self.normalize(exponent)?;
        let Some(r) = e.as_constant() else {
            return Ok(Fraction::atom(Atom::Pow(b.to_expr(), e.to_expr())));
        };
        if r.is_integer() {
            return self.powi(&b, r.to_integer());
        }
        if b.is_zero() {
            return if r.is_positive() {
                Ok(Fraction::zero())
            } else {
                Err(ExprError::DivisionByZero)
            };
        }
        if b.as_constant().is_some_and(|c| c.is_one()) {
            return Ok(Fraction::one());
        }
        // b^(p/q) = (b^(1/q))^p
        let root = Fraction::atom(Atom::Pow(b.to_expr(), Expr::rational(1, *r.denom())));
        self.powi(&root, *r.numer())
    }

    fn normalize_call(&self, func: Func, arg: &Expr) -> Result<Fraction> {
        let a = self.normalize(arg)?;
        if let Some(c) = a.as_constant() {
            if c.is_zero() {
                return match func {
                    Func::Sin | Func::Tan | Func::Sinh => Ok(Fraction::zero()),
                    Func::Cos | Func::Cosh | Func::Exp => Ok(Fraction::one()),
                    Func::Ln => Err(ExprError::Undefined("ln(0)".into())),
                };
            }
            if c.is_one() && func == Func::Ln {
                return Ok(Fraction::zero());
            }
        }
        match func {
            Func::Exp => match a.as_call(Func::Ln) {
                Some(inner) => self.normalize(&inner),
                None => Ok(Fraction::atom(Atom::Call(Func::Exp, a.to_expr()))),
            },
            Func::Ln => match a.as_call(Func::Exp) {
                Some(inner) => self.normalize(&inner),
                None => Ok(Fraction::atom(Atom::Call(Func::Ln, a.to_expr()))),
            },
            Func::Tan => {
                let sin = self.parity_atom(Func::Sin, &a)?;
                let cos = self.parity_atom(Func::Cos, &a)?;
                let sec = self.recip(&cos)?;
                self.mul(&sin, &sec)
            }
            Func::Sin | Func::Cos | Func::Sinh | Func::Cosh => self.parity_atom(func, &a),
        }
    }

    /// `func(a)` using the parity of `func` to keep the argument's leading
    /// coefficient positive.
    fn parity_atom(&self, func: Func, a: &Fraction) -> Result<Fraction> {
        if !a.is_negative() {
            return Ok(Fraction::atom(Atom::Call(func, a.to_expr())));
        }
        let atom = Fraction::atom(Atom::Call(func, a.neg()?.to_expr()));
        match func {
            Func::Sin | Func::Sinh | Func::Tan => atom.neg(),
            _ => Ok(atom),
        }
    }

    fn mul(&self, a: &Fraction, b: &Fraction) -> Result<Fraction> {
        if a.is_zero() || b.is_zero() {
            return Ok(Fraction::zero());
        }
        let mut factors = a.factors.clone();
        for (p, k) in &b.factors {
            add_exponent(factors.entry(p.clone()).or_insert(0), *k)?;
        }
        self.reduce(Fraction {
            num: a.num.mul(&b.num)?,
            den: mono_mul(&a.den, &b.den)?,
            factors,
        })
    }

    fn recip(&self, a: &Fraction) -> Result<Fraction> {
        if a.is_zero() {
            return Err(ExprError::DivisionByZero);
        }
        let mut num = Poly::term(a.den.clone(), Rational64::one());
        for (p, k) in &a.factors {
            num = num.mul(&p.powi(*k)?)?;
        }
        let (c, m, rest) = a.num.split_content()?;
        let mut factors = BTreeMap::new();
        if rest.as_constant().is_none() {
            factors.insert(rest, 1);
        }
        self.reduce(Fraction {
            num: num.scale(div_coeff(Rational64::one(), c)?)?,
            den: m,
            factors,
        })
    }

    fn powi(&self, a: &Fraction, k: i64) -> Result<Fraction> {
        let mut base = if k < 0 { self.recip(a)? } else { a.clone() };
        let mut n = k.unsigned_abs();
        let mut result = Fraction::one();
        while n > 0 {
            if n & 1 == 1 {
                result = self.mul(&result, &base)?;
            }
            n >>= 1;
            if n > 0 {
                base = self.mul(&base, &base)?;
            }
        }
        Ok(result)
    }

    fn add(&self, a: &Fraction, b: &Fraction) -> Result<Fraction> {
        if a.is_zero() {
            return Ok(b.clone());
        }
        if b.is_zero() {
            return Ok(a.clone());
        }
        if a.den == b.den && a.factors == b.factors {
            return self.reduce(Fraction {
                num: a.num.add(&b.num)?,
                den: a.den.clone(),
                factors: a.factors.clone(),
            });
        }
        let den = mono_lcm(&a.den, &b.den);
        let mut factors = a.factors.clone();
        for (p, k) in &b.factors {
            let slot = factors.entry(p.clone()).or_insert(0);
            *slot = (*slot).max(*k);
        }
        let num = lift(a, &den, &factors)?.add(&lift(b, &den, &factors)?)?;
        self.reduce(Fraction { num, den, factors })
    }

    fn reduce(&self, mut f: Fraction) -> Result<Fraction> {
        if f.num.is_zero() {
            return Ok(Fraction::zero());
        }
        f.factors.retain(|_, k| *k > 0);
        cancel_monomial(&mut f);
        if self.config.trig_identities {
            f.num = apply_identities(&f.num)?;
            if f.num.is_zero() {
                return Ok(Fraction::zero());
            }
            cancel_monomial(&mut f);
        }

        let mut divided = false;
        let candidates: Vec<Poly> = f.factors.keys().cloned().collect();
        for p in candidates {
            while let Some(k) = f.factors.get(&p).copied() {
                let Some(q) = f.num.exact_div(&p)? else {
                    break;
                };
                f.num = q;
                divided = true;
                if k == 1 {
                    f.factors.remove(&p);
                } else {
                    f.factors.insert(p.clone(), k - 1);
                }
            }
        }
        if divided {
            if self.config.trig_identities {
                f.num = apply_identities(&f.num)?;
            }
            cancel_monomial(&mut f);
        }
        if self.config.trig_identities {
            cancel_pythagorean(&mut f)?;
        }
        if f.has_whole_roots() {
            return self.fold_roots(f);
        }

        let terms = f.num.len();
        if terms > self.config.max_terms {
            tracing::warn!(terms, limit = self.config.max_terms, "expression exceeds term budget");
            return Err(ExprError::TooComplex {
                terms,
                limit: self.config.max_terms,
            });
        }
        Ok(f)
    }

    /// Rewrite `(b^(1/q))^e` with `e >= q` as `b^(e div q) * (b^(1/q))^(e mod q)`,
    /// so a root never appears to a whole power of its base.
    fn fold_roots(&self, f: Fraction) -> Result<Fraction> {
        let mut num = Fraction::zero();
        for (m, c) in &f.num.terms {
            let (rest, whole) = self.split_roots(m)?;
            let mut term = Fraction {
                num: Poly::term(rest, *c),
                ..Fraction::zero()
            };
            for (base, k) in whole {
                term = self.mul(&term, &self.powi(&base, k)?)?;
            }
            num = self.add(&num, &term)?;
        }
        let (rest, whole) = self.split_roots(&f.den)?;
        let mut den = Fraction {
            num: Poly::constant(Rational64::one()),
            den: rest,
            factors: f.factors,
        };
        for (base, k) in whole {
            den = self.mul(&den, &self.powi(&base, -k)?)?;
        }
        self.mul(&num, &den)
    }

    /// Remainder monomial and the whole powers `(b, e div q)` pulled out of it.
    fn split_roots(&self, m: &Monomial) -> Result<(Monomial, Vec<(Fraction, i64)>)> {
        let mut rest = Monomial::new();
        let mut whole = Vec::new();
        for (atom, e) in m {
            match root_of(atom) {
                Some((base, q)) if *e >= q => {
                    if e % q > 0 {
                        rest.insert(atom.clone(), e % q);
                    }
                    whole.push((self.normalize(base)?, i64::from(e / q)));
                }
                _ => {
                    rest.insert(atom.clone(), *e);
                }
            }
        }
        Ok((rest, whole))
    }
}

impl Expr {
    /// Simplify with the default backend configuration.
    pub fn simplify(&self) -> Result<Expr> {
        self.simplify_with(&BackendConfig::default())
    }

    /// Bring the expression to rational normal form under `config`.
    pub fn simplify_with(&self, config: &BackendConfig) -> Result<Expr> {
        Simplifier::new(config).simplify(self)
    }

    /// `true` if the expression simplifies to the literal zero.
    pub fn is_identically_zero(&self) -> Result<bool> {
        Ok(self.simplify()?.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Expr {
        Expr::symbol("x")
    }

    fn y() -> Expr {
        Expr::symbol("y")
    }

    fn zero(e: Expr) -> bool {
        e.is_identically_zero().unwrap()
    }

    #[test]
    fn test_collects_like_terms() {
        assert_eq!((x() + x()).simplify().unwrap(), (Expr::int(2) * x()).simplify().unwrap());
        assert!(zero(x() - x()));
    }

    #[test]
    fn test_expands_products() {
        let lhs = (x() + 1).powi(2);
        let rhs = x().powi(2) + Expr::int(2) * x() + 1;
        assert!(zero(lhs - rhs));
    }

    #[test]
    fn test_cancels_polynomial_factor() {
        let e = (x().powi(2) - 1) / (x() - 1);
        assert_eq!(e.simplify().unwrap(), (x() + 1).simplify().unwrap());
    }

    #[test]
    fn test_common_denominator() {
        let lhs = x().recip() + y().recip();
        let rhs = (x() + y()) / (x() * y());
        assert_eq!(lhs.simplify().unwrap(), rhs.simplify().unwrap());
    }

    #[test]
    fn test_cancels_repeated_factor() {
        let f = Expr::one() - x().powi(2) - y().powi(2);
        let e = f.clone() / f.powi(2);
        assert_eq!(e.simplify().unwrap(), f.recip().simplify().unwrap());
    }

    #[test]
    fn test_pythagorean_identities() {
        assert!((x().sin().powi(2) + x().cos().powi(2)).simplify().unwrap().is_one());
        assert!((x().cosh().powi(2) - x().sinh().powi(2)).simplify().unwrap().is_one());
    }

    #[test]
    fn test_secant_squared_minus_tangent_squared() {
        let e = x().cos().powi(-2) - x().tan().powi(2);
        assert!(e.simplify().unwrap().is_one());
        let h = x().cosh().powi(-2) + (x().sinh() / x().cosh()).powi(2);
        assert!(h.simplify().unwrap().is_one());
    }

    #[test]
    fn test_identities_can_be_disabled() {
        let config = BackendConfig::default().trig_identities(false);
        let e = x().sin().powi(2) + x().cos().powi(2);
        assert!(!e.simplify_with(&config).unwrap().is_one());
    }

    #[test]
    fn test_tan_folds_to_sin_over_cos() {
        let e = x().tan() * x().cos();
        assert_eq!(e.simplify().unwrap(), x().sin());
    }

    #[test]
    fn test_parity() {
        assert!(zero((-x()).sin() + x().sin()));
        assert!(zero((-x()).cos() - x().cos()));
        assert!(zero((Expr::int(-2) * x()).sinh() + (Expr::int(2) * x()).sinh()));
    }

    #[test]
    fn test_exp_ln_inverse() {
        assert_eq!(x().ln().exp().simplify().unwrap(), x());
        assert_eq!(x().exp().ln().simplify().unwrap(), x());
        assert!(zero(x().exp() / x().exp() - 1));
    }

    #[test]
    fn test_special_values() {
        assert!(Expr::zero().sin().simplify().unwrap().is_zero());
        assert!(Expr::zero().cos().simplify().unwrap().is_one());
        assert!(Expr::one().ln().simplify().unwrap().is_zero());
        assert_eq!(
            Expr::zero().ln().simplify(),
            Err(ExprError::Undefined("ln(0)".into()))
        );
    }

    #[test]
    fn test_division_by_zero() {
        let e = x() / (x() - x());
        assert_eq!(e.simplify(), Err(ExprError::DivisionByZero));
    }

    #[test]
    fn test_radicals_cancel() {
        let r = (x().powi(2) + 1).sqrt();
        assert!(zero(r.clone() / r.clone() - 1));
        assert!(zero(r.powi(3) * r.recip() - r.clone() * r.clone()));
    }

    #[test]
    fn test_roots_fold_into_their_base() {
        assert!(zero(x().sqrt() * x().sqrt() - x()));
        assert!(zero(x().sqrt().powi(2) - x()));
        assert!(zero(x().pow(Expr::rational(1, 3)) * x().pow(Expr::rational(2, 3)) - x()));
        assert!(zero(x().pow(Expr::rational(3, 2)) - x() * x().sqrt()));
        assert!(zero(x().sqrt().powi(-2) - x().recip()));
        assert_eq!(
            (x().sqrt() * x().sqrt() * x().sqrt()).simplify().unwrap(),
            (x() * x().sqrt()).simplify().unwrap()
        );
    }

    #[test]
    fn test_roots_of_sums_fold() {
        let r = (x() + 1).sqrt();
        assert!(zero(r.clone() * r.clone() - x() - 1));
        let square = (Expr::one() + x().sqrt()).powi(2);
        let expanded = Expr::one() + Expr::int(2) * x().sqrt() + x();
        assert!(zero(square.clone() - expanded));
        assert!(zero(square.clone() / square - 1));
    }

    #[test]
    fn test_numeric_roots_fold() {
        let r2 = Expr::int(2).sqrt();
        assert_eq!((r2.clone() * r2.clone()).simplify().unwrap(), Expr::int(2));
        assert!(zero(r2.powi(3) - Expr::int(2) * Expr::int(2).sqrt()));
    }

    #[test]
    fn test_coefficient_overflow_is_an_error() {
        let e = (x() + 1).powi(70);
        assert_eq!((e.clone() - e).simplify(), Err(ExprError::Overflow));
        let big = Expr::int(i64::MAX);
        assert_eq!((big.clone() * x() + big * x()).simplify(), Err(ExprError::Overflow));
    }

    #[test]
    fn test_large_exact_powers() {
        let e = (x() + 1).powi(20) - (x() + 1).powi(20);
        assert!(e.simplify().unwrap().is_zero());
        assert_eq!("2^40 - 1099511627776".parse::<Expr>().unwrap(), Expr::zero());
    }

    #[test]
    fn test_term_budget() {
        let config = BackendConfig::default().max_terms(5);
        let e = (x() + y() + Expr::symbol("z")).powi(3);
        assert!(matches!(
            e.simplify_with(&config),
            Err(ExprError::TooComplex { limit: 5, .. })
        ));
    }

    #[test]
    fn test_simplify_is_idempotent() {
        let e = (x().sin() * y() + x().cos().powi(2)) / (y().powi(2) + 1) - x().tan();
        let once = e.simplify().unwrap();
        assert_eq!(once.simplify().unwrap(), once);
    }

    #[test]
    fn test_lex_order_is_multiplicative() {
        let mut a = Monomial::new();
        a.insert(Atom::Sym(Symbol::new("x")), 1);
        let mut b = Monomial::new();
        b.insert(Atom::Sym(Symbol::new("y")), 5);
        assert_eq!(lex_cmp(&a, &b), Ordering::Greater);
        let ax = mono_mul(&a, &a).unwrap();
        let bx = mono_mul(&b, &a).unwrap();
        assert_eq!(lex_cmp(&ax, &bx), Ordering::Greater);
    }
}
