//! Symbolic differentiation.
//!
//! Applies the sum, product, power and chain rules structurally. The result
//! is not simplified; callers simplify once after assembling a full formula.

use crate::expr::{Expr, Func, Node, Symbol};

/// Partial derivative of `expr` with respect to `var`.
pub fn differentiate(expr: &Expr, var: &Symbol) -> Expr {
    if !expr.contains(var) {
        return Expr::zero();
    }
    match expr.node() {
        Node::Num(_) => Expr::zero(),
        Node::Sym(s) => {
            if s == var {
                Expr::one()
            } else {
                Expr::zero()
            }
        }
        Node::Add(terms) => Expr::sum(terms.iter().map(|t| differentiate(t, var))),
        Node::Mul(factors) => {
            // d(f_0 f_1 ... f_n) = sum_i f_i' prod_{j != i} f_j
            let mut terms = Vec::with_capacity(factors.len());
            for (i, factor) in factors.iter().enumerate() {
                let d = differentiate(factor, var);
                if d.is_zero() {
                    continue;
                }
                let rest = factors
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != i)
                    .map(|(_, g)| g.clone());
                terms.push(Expr::product(rest.chain(std::iter::once(d))));
            }
            Expr::sum(terms)
        }
        Node::Pow(base, exponent) => {
            let db = differentiate(base, var);
            let de = differentiate(exponent, var);
            if de.is_zero() {
                // d(b^e) = e b^(e-1) b'
                Expr::product([
                    exponent.clone(),
                    base.pow(Expr::sum([exponent.clone(), Expr::int(-1)])),
                    db,
                ])
            } else {
                // d(b^e) = b^e (e' ln b + e b' / b)
                let inner = Expr::sum([
                    Expr::product([de, base.ln()]),
                    Expr::product([exponent.clone(), db, base.recip()]),
                ]);
                Expr::product([expr.clone(), inner])
            }
        }
        Node::Call(func, arg) => {
            let da = differentiate(arg, var);
            let outer = match func {
                Func::Sin => arg.cos(),
                Func::Cos => -arg.sin(),
                Func::Tan => Expr::sum([Expr::one(), expr.powi(2)]),
                Func::Exp => expr.clone(),
                Func::Ln => arg.recip(),
                Func::Sinh => arg.cosh(),
                Func::Cosh => arg.sinh(),
            };
            Expr::product([outer, da])
        }
    }
}

impl Expr {
    /// Partial derivative with respect to `var`.
    pub fn diff(&self, var: &Symbol) -> Expr {
        differentiate(self, var)
    }
}
