//! Symbolic scalar expressions for tensor derivations.
//!
//! Provides the computer-algebra layer the geometry crate builds on:
//! 1. Expression trees with exact rational constants ([`Expr`])
//! 2. Partial differentiation ([`Expr::diff`])
//! 3. Rational normal-form simplification with exact zero detection
//! 4. Substitution, determinants and inverses of [`ExprMatrix`]
//! 5. Compilation to numeric closures ([`compile_many`])
//!
//! # Example
//!
//! ```
//! use phyz_expr::{Expr, NativeBackend, Symbol, SymbolicBackend};
//!
//! let backend = NativeBackend::default();
//! let u = Symbol::new("u");
//! let e: Expr = "sin(u)^2 + cos(u)^2".parse().unwrap();
//!
//! let d = backend.differentiate(&e, &u);
//! assert!(backend.simplify(&d).unwrap().is_zero());
//! assert!(backend.simplify(&e).unwrap().is_one());
//! ```

pub mod compile;
pub mod diff;
pub mod error;
pub mod expr;
pub mod matrix;
mod normal;
pub mod parse;
pub mod subs;

pub use compile::{CompiledExpr, CompiledFn, compile_many};
pub use error::{ExprError, Result};
pub use expr::{Expr, Func, Node, Symbol};
pub use matrix::ExprMatrix;
pub use subs::Substitution;

/// Tuning knobs for the native simplifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendConfig {
    /// Largest expanded numerator accepted before failing with
    /// [`ExprError::TooComplex`].
    pub max_terms: usize,
    /// Reduce with `sin^2 + cos^2 = 1` and `cosh^2 - sinh^2 = 1`.
    pub trig_identities: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            max_terms: 20_000,
            trig_identities: true,
        }
    }
}

impl BackendConfig {
    /// Set the numerator term budget.
    pub fn max_terms(mut self, max_terms: usize) -> Self {
        self.max_terms = max_terms;
        self
    }

    /// Toggle the Pythagorean rewrites.
    pub fn trig_identities(mut self, enabled: bool) -> Self {
        self.trig_identities = enabled;
        self
    }
}

/// Operations a symbolic algebra engine must provide to the geometry layer.
///
/// Implementations must simplify identically vanishing expressions to the
/// literal zero; curvature results rely on it.
pub trait SymbolicBackend {
    /// Partial derivative of `expr` with respect to `var`.
    fn differentiate(&self, expr: &Expr, var: &Symbol) -> Expr;

    /// Canonical simplified form.
    fn simplify(&self, expr: &Expr) -> Result<Expr>;

    /// Simultaneous replacement of symbols.
    fn substitute(&self, expr: &Expr, subs: &Substitution) -> Expr {
        expr.subs(subs)
    }

    /// Compile `exprs` into one closure taking `inputs` in order.
    fn compile(&self, exprs: &[Expr], inputs: &[Symbol]) -> Result<CompiledFn> {
        compile_many(exprs, inputs)
    }

    /// Simplified determinant of a square matrix.
    fn determinant(&self, m: &ExprMatrix) -> Result<Expr> {
        self.simplify(&m.cofactor_determinant()?)
    }

    /// Simplified inverse of a square matrix.
    ///
    /// Fails with [`ExprError::DivisionByZero`] when the determinant
    /// simplifies to zero.
    fn inverse(&self, m: &ExprMatrix) -> Result<ExprMatrix> {
        let det = self.determinant(m)?;
        if det.is_zero() {
            return Err(ExprError::DivisionByZero);
        }
        let inv_det = self.simplify(&det.recip())?;
        let adj = m.adjugate()?;
        adj.try_map(|c| self.simplify(&(c * &inv_det)))
    }
}

/// The built-in backend: rational normal form with exact arithmetic.
#[derive(Debug, Clone, Default)]
pub struct NativeBackend {
    config: BackendConfig,
}

impl NativeBackend {
    /// Backend with an explicit configuration.
    pub fn new(config: BackendConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }
}

impl SymbolicBackend for NativeBackend {
    fn differentiate(&self, expr: &Expr, var: &Symbol) -> Expr {
        diff::differentiate(expr, var)
    }

    fn simplify(&self, expr: &Expr) -> Result<Expr> {
        expr.simplify_with(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverse_of_sphere_metric() {
        let backend = NativeBackend::default();
        let a = Expr::symbol("a");
        let u = Expr::symbol("u");
        let g = ExprMatrix::diag([a.powi(2), a.powi(2) * u.sin().powi(2)]);
        let inv = backend.inverse(&g).unwrap();
        let expected = (a.powi(2) * u.sin().powi(2)).recip();
        assert!((&inv[(1, 1)] - expected).is_identically_zero().unwrap());
        assert!(inv[(0, 1)].is_zero());
        assert!((&inv[(0, 0)] - a.powi(-2)).is_identically_zero().unwrap());
    }

    #[test]
    fn test_singular_inverse() {
        let backend = NativeBackend::default();
        let x = Expr::symbol("x");
        let g = ExprMatrix::from_rows(vec![
            vec![x.clone(), x.clone()],
            vec![x.clone(), x.clone()],
        ])
        .unwrap();
        assert_eq!(backend.determinant(&g).unwrap(), Expr::zero());
        assert_eq!(backend.inverse(&g), Err(ExprError::DivisionByZero));
    }

    #[test]
    fn test_config_reaches_simplifier() {
        let backend = NativeBackend::new(BackendConfig::default().trig_identities(false));
        let u = Expr::symbol("u");
        let e = u.sin().powi(2) + u.cos().powi(2);
        assert!(!backend.simplify(&e).unwrap().is_one());
        assert!(!backend.config().trig_identities);
    }
}
