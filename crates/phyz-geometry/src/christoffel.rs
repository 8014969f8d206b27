//! Levi-Civita connection coefficients.

use phyz_expr::{Expr, SymbolicBackend};
use tracing::debug;

use crate::error::Result;
use crate::metric::MetricModel;
use crate::tensor::Tensor;

/// Christoffel symbols of the second kind, indexed `[rho, lambda, nu]`:
///
/// ```text
/// G[rho][lambda][nu] = sum_mu g^{rho mu} (d_lambda g_{mu nu} + d_nu g_{mu lambda} - d_mu g_{nu lambda}) / 2
/// ```
///
/// Symmetric in `(lambda, nu)`: only `lambda <= nu` is derived, the rest is
/// mirrored.
#[derive(Debug, Clone, PartialEq)]
pub struct ChristoffelSymbols {
    symbols: Tensor<3>,
}

impl ChristoffelSymbols {
    /// Derive every `Gamma^rho_{lambda nu}` from the metric and its inverse.
    pub fn compute<B: SymbolicBackend + ?Sized>(backend: &B, model: &MetricModel) -> Result<Self> {
        let n = model.dim();
        let g = model.metric();
        let inv = model.inverse();
        let coords = model.coordinates();

        // dg[[a, b, c]] = d g_{ab} / d x^c
        let dg = Tensor::<3>::from_fn(n, |[a, b, c]| backend.differentiate(&g[(a, b)], &coords[c]));

        let symbols = Tensor::<3>::try_build(n, |[rho, lambda, nu], built| {
            if lambda > nu {
                return Ok(built[Tensor::<3>::offset(n, [rho, nu, lambda])].clone());
            }
            let terms = (0..n).filter(|&mu| !inv[(rho, mu)].is_zero()).map(|mu| {
                let bracket = Expr::sum([
                    dg[[mu, nu, lambda]].clone(),
                    dg[[mu, lambda, nu]].clone(),
                    -&dg[[nu, lambda, mu]],
                ]);
                Expr::product([inv[(rho, mu)].clone(), bracket])
            });
            let sum = Expr::sum(terms) * Expr::rational(1, 2);
            backend.simplify(&sum)
        })?;

        debug!(
            dim = n,
            nonzero = symbols.nonzero().count(),
            "christoffel symbols computed"
        );
        Ok(Self { symbols })
    }

    /// Manifold dimension.
    pub fn dim(&self) -> usize {
        self.symbols.dim()
    }

    /// `Gamma^rho_{lambda nu}`. Panics on an out-of-range index.
    pub fn get(&self, rho: usize, lambda: usize, nu: usize) -> &Expr {
        &self.symbols[[rho, lambda, nu]]
    }

    /// The symbols as a rank-3 tensor indexed `[rho, lambda, nu]`.
    pub fn tensor(&self) -> &Tensor<3> {
        &self.symbols
    }

    /// `true` if the connection vanishes identically.
    pub fn is_zero(&self) -> bool {
        self.symbols.is_zero()
    }
}
