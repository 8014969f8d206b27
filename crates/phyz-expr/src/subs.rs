//! Substitution of symbols by expressions.

use std::collections::BTreeMap;

use crate::expr::{Expr, Node, Symbol};

/// Ordered mapping from symbols to replacement expressions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitution {
    map: BTreeMap<Symbol, Expr>,
}

impl Substitution {
    /// Empty substitution.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, sym: impl Into<Symbol>, value: impl Into<Expr>) -> Self {
        self.insert(sym, value);
        self
    }

    /// Bind `sym`, replacing any earlier value.
    pub fn insert(&mut self, sym: impl Into<Symbol>, value: impl Into<Expr>) {
        self.map.insert(sym.into(), value.into());
    }

    /// Value bound to `sym`.
    pub fn get(&self, sym: &Symbol) -> Option<&Expr> {
        self.map.get(sym)
    }

    /// Number of bound symbols.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// `true` if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Bindings ordered by symbol name.
    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &Expr)> {
        self.map.iter()
    }
}

impl FromIterator<(Symbol, Expr)> for Substitution {
    fn from_iter<I: IntoIterator<Item = (Symbol, Expr)>>(iter: I) -> Self {
        Self {
            map: iter.into_iter().collect(),
        }
    }
}

/// Replace every occurrence of a mapped symbol. Replacement is simultaneous:
/// substituted expressions are not themselves rewritten.
pub fn substitute(expr: &Expr, subs: &Substitution) -> Expr {
    if subs.is_empty() {
        return expr.clone();
    }
    match expr.node() {
        Node::Num(_) => expr.clone(),
        Node::Sym(s) => subs.get(s).cloned().unwrap_or_else(|| expr.clone()),
        Node::Add(terms) => Expr::sum(terms.iter().map(|t| substitute(t, subs))),
        Node::Mul(factors) => Expr::product(factors.iter().map(|f| substitute(f, subs))),
        Node::Pow(b, e) => substitute(b, subs).pow(substitute(e, subs)),
        Node::Call(func, arg) => Expr::call(*func, substitute(arg, subs)),
    }
}

impl Expr {
    /// Replace every bound symbol simultaneously, then fold constants.
    pub fn subs(&self, subs: &Substitution) -> Expr {
        substitute(self, subs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_folds_constants() {
        let x = Expr::symbol("x");
        let a = Expr::symbol("a");
        let e = a.powi(2) * &x + 1;
        let s = Substitution::new().with("a", 2).with("x", 3);
        assert_eq!(e.subs(&s), Expr::int(13));
    }

    #[test]
    fn test_substitution_is_simultaneous() {
        let x = Expr::symbol("x");
        let y = Expr::symbol("y");
        let s = Substitution::new()
            .with("x", y.clone())
            .with("y", x.clone());
        let swapped = (x.clone() - y.clone()).subs(&s);
        assert_eq!(swapped, y - x);
    }

    #[test]
    fn test_unmapped_symbols_untouched() {
        let e = Expr::symbol("z").sin();
        let s = Substitution::new().with("x", 1);
        assert_eq!(e.subs(&s), e);
    }
}
