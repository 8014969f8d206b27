//! Riemann, Ricci and Einstein tensors.
//!
//! Sign convention:
//!
//! ```text
//! R[rho][lambda][mu][nu] = d_mu G[rho][lambda][nu] - d_nu G[rho][lambda][mu]
//!     + sum_sigma (G[sigma][lambda][nu] G[rho][sigma][mu] - G[sigma][lambda][mu] G[rho][sigma][nu])
//! Ricci[mu][nu]  = sum_lambda R[lambda][mu][lambda][nu]
//! R              = sum_{mu,nu} g^{mu nu} Ricci[mu][nu]
//! Einstein[mu][nu] = Ricci[mu][nu] - R g[mu][nu] / 2
//! ```
//!
//! With this convention the unit sphere has `R = 2`.

use phyz_expr::{Expr, SymbolicBackend};
use tracing::debug;

use crate::christoffel::ChristoffelSymbols;
use crate::error::Result;
use crate::metric::MetricModel;
use crate::tensor::Tensor;

/// All curvature quantities derived from one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Curvature {
    riemann: Tensor<4>,
    ricci: Tensor<2>,
    ricci_scalar: Expr,
    einstein: Tensor<2>,
}

impl Curvature {
    /// Riemann, Ricci, scalar and Einstein tensors from a connection.
    pub fn compute<B: SymbolicBackend + ?Sized>(
        backend: &B,
        model: &MetricModel,
        christoffel: &ChristoffelSymbols,
    ) -> Result<Self> {
        let riemann = riemann_tensor(backend, model, christoffel)?;
        let ricci = ricci_tensor(backend, &riemann)?;
        let ricci_scalar = ricci_scalar(backend, model, &ricci)?;
        let einstein = einstein_tensor(backend, model, &ricci, &ricci_scalar)?;
        debug!(
            dim = model.dim(),
            riemann_nonzero = riemann.nonzero().count(),
            ricci_scalar = %ricci_scalar,
            "curvature computed"
        );
        Ok(Self {
            riemann,
            ricci,
            ricci_scalar,
            einstein,
        })
    }

    /// `R^rho_{sigma mu nu}` indexed `[rho, sigma, mu, nu]`.
    pub fn riemann(&self) -> &Tensor<4> {
        &self.riemann
    }

    /// `R_{mu nu} = R^rho_{mu rho nu}`.
    pub fn ricci(&self) -> &Tensor<2> {
        &self.ricci
    }

    /// `R = g^{mu nu} R_{mu nu}`.
    pub fn ricci_scalar(&self) -> &Expr {
        &self.ricci_scalar
    }

    /// `G_{mu nu} = R_{mu nu} - R g_{mu nu} / 2`.
    pub fn einstein(&self) -> &Tensor<2> {
        &self.einstein
    }

    /// `true` if the Riemann tensor vanishes identically.
    pub fn is_flat(&self) -> bool {
        self.riemann.is_zero()
    }
}

/// Riemann tensor `R[rho][lambda][mu][nu]`, antisymmetric in `(mu, nu)`.
///
/// Entries with `mu < nu` are derived and simplified once; the diagonal is
/// zero and `mu > nu` is the simplified negation of its partner.
pub fn riemann_tensor<B: SymbolicBackend + ?Sized>(
    backend: &B,
    model: &MetricModel,
    christoffel: &ChristoffelSymbols,
) -> Result<Tensor<4>> {
    let n = model.dim();
    let coords = model.coordinates();
    let gamma = christoffel.tensor();

    let riemann = Tensor::<4>::try_build(n, |[rho, lambda, mu, nu], built| {
        if mu == nu {
            return Ok(Expr::zero());
        }
        if mu > nu {
            let partner = &built[Tensor::<4>::offset(n, [rho, lambda, nu, mu])];
            return backend.simplify(&-partner);
        }
        let mut terms = vec![
            backend.differentiate(&gamma[[rho, lambda, nu]], &coords[mu]),
            -backend.differentiate(&gamma[[rho, lambda, mu]], &coords[nu]),
        ];
        for sigma in 0..n {
            let a = &gamma[[sigma, lambda, nu]];
            let b = &gamma[[rho, sigma, mu]];
            if !a.is_zero() && !b.is_zero() {
                terms.push(a * b);
            }
            let c = &gamma[[sigma, lambda, mu]];
            let d = &gamma[[rho, sigma, nu]];
            if !c.is_zero() && !d.is_zero() {
                terms.push(-(c * d));
            }
        }
        backend.simplify(&Expr::sum(terms))
    })?;
    Ok(riemann)
}

/// Contraction of the first and third Riemann indices.
pub fn ricci_tensor<B: SymbolicBackend + ?Sized>(backend: &B, riemann: &Tensor<4>) -> Result<Tensor<2>> {
    let n = riemann.dim();
    let ricci = Tensor::<2>::try_from_fn(n, |[mu, nu]| {
        let sum = Expr::sum((0..n).map(|lambda| riemann[[lambda, mu, lambda, nu]].clone()));
        backend.simplify(&sum)
    })?;
    Ok(ricci)
}

/// Full contraction of the Ricci tensor with the inverse metric.
pub fn ricci_scalar<B: SymbolicBackend + ?Sized>(
    backend: &B,
    model: &MetricModel,
    ricci: &Tensor<2>,
) -> Result<Expr> {
    let inv = model.inverse();
    let n = model.dim();
    let terms = (0..n)
        .flat_map(|mu| (0..n).map(move |nu| (mu, nu)))
        .filter(|&(mu, nu)| !inv[(mu, nu)].is_zero() && !ricci[[mu, nu]].is_zero())
        .map(|(mu, nu)| &inv[(mu, nu)] * &ricci[[mu, nu]]);
    Ok(backend.simplify(&Expr::sum(terms))?)
}

/// `Ricci - R g / 2`, simplified per entry.
pub fn einstein_tensor<B: SymbolicBackend + ?Sized>(
    backend: &B,
    model: &MetricModel,
    ricci: &Tensor<2>,
    ricci_scalar: &Expr,
) -> Result<Tensor<2>> {
    let g = model.metric();
    let half_r = ricci_scalar * Expr::rational(1, 2);
    let einstein = Tensor::<2>::try_from_fn(model.dim(), |[mu, nu]| {
        backend.simplify(&(&ricci[[mu, nu]] - &half_r * &g[(mu, nu)]))
    })?;
    Ok(einstein)
}
