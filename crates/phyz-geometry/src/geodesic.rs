//! Geodesic equations and their first-order numeric form.

use std::fmt;

use nalgebra::DVector;
use phyz_expr::{CompiledFn, Expr, Substitution, Symbol, SymbolicBackend};
use tracing::debug;

use crate::christoffel::ChristoffelSymbols;
use crate::error::Result;
use crate::metric::MetricModel;

/// Dense state vector `(x_0 .. x_{n-1}, v_0 .. v_{n-1})`.
pub type DVec = DVector<f64>;

/// Second-order geodesic equations
///
/// ```text
/// d^2 x^i / ds^2 = -sum_{j,k} G[i][j][k] (dx^j/ds) (dx^k/ds)
/// ```
///
/// with `dx^j/ds` represented by the velocity symbols `<coord>_dot`.
#[derive(Debug, Clone, PartialEq)]
pub struct GeodesicSystem {
    coordinates: Vec<Symbol>,
    velocities: Vec<Symbol>,
    parameter: Symbol,
    accelerations: Vec<Expr>,
}

impl GeodesicSystem {
    /// Assemble `x''^rho = -Gamma^rho_{lambda nu} x'^lambda x'^nu` for each coordinate.
    pub fn new(model: &MetricModel, christoffel: &ChristoffelSymbols) -> Self {
        let n = model.dim();
        let velocities = model.velocity_symbols();
        let v: Vec<Expr> = velocities.iter().map(Expr::from).collect();

        let accelerations = (0..n)
            .map(|i| {
                // Off-diagonal (j, k) pairs are folded using G[i][j][k] = G[i][k][j].
                let mut terms = Vec::new();
                for j in 0..n {
                    for k in j..n {
                        let gamma = christoffel.get(i, j, k);
                        if gamma.is_zero() {
                            continue;
                        }
                        let weight = if j == k { -1 } else { -2 };
                        terms.push(Expr::product([
                            Expr::int(weight),
                            gamma.clone(),
                            v[j].clone(),
                            v[k].clone(),
                        ]));
                    }
                }
                Expr::sum(terms)
            })
            .collect();

        Self {
            coordinates: model.coordinates().to_vec(),
            velocities,
            parameter: model.parameter(),
            accelerations,
        }
    }

    /// Number of coordinates.
    pub fn dim(&self) -> usize {
        self.coordinates.len()
    }

    /// Position symbols, in state order.
    pub fn coordinates(&self) -> &[Symbol] {
        &self.coordinates
    }

    /// Velocity symbols `<coord>_dot`, in coordinate order.
    pub fn velocities(&self) -> &[Symbol] {
        &self.velocities
    }

    /// The curve parameter.
    pub fn parameter(&self) -> &Symbol {
        &self.parameter
    }

    /// Right-hand sides `d^2 x^i / ds^2`, in coordinate order.
    pub fn accelerations(&self) -> &[Expr] {
        &self.accelerations
    }

    /// `(coordinate, acceleration)` pairs.
    pub fn equations(&self) -> impl Iterator<Item = (&Symbol, &Expr)> {
        self.coordinates.iter().zip(&self.accelerations)
    }

    /// Lower to a numeric first-order system.
    ///
    /// `params` binds every non-coordinate symbol (e.g. `a = 1`); anything
    /// left unbound is a backend error.
    pub fn compile<B: SymbolicBackend + ?Sized>(
        &self,
        backend: &B,
        params: &Substitution,
    ) -> Result<CompiledGeodesic> {
        let exprs: Vec<Expr> = self
            .accelerations
            .iter()
            .map(|a| backend.substitute(a, params))
            .collect();
        let inputs: Vec<Symbol> = self
            .coordinates
            .iter()
            .chain(&self.velocities)
            .cloned()
            .collect();
        let accel = backend.compile(&exprs, &inputs)?;
        debug!(dim = self.dim(), params = params.len(), "geodesic system compiled");
        Ok(CompiledGeodesic {
            dim: self.dim(),
            accel,
        })
    }
}

impl fmt::Display for GeodesicSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (coord, accel) in self.equations() {
            writeln!(f, "{coord}'' = {accel}")?;
        }
        Ok(())
    }
}

/// Numeric geodesic flow on the `2n`-dimensional state space.
pub struct CompiledGeodesic {
    dim: usize,
    accel: CompiledFn,
}

impl CompiledGeodesic {
    /// Number of coordinates `n`; the state has `2n` components.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Length of the `(x, v)` state vector.
    pub fn state_dim(&self) -> usize {
        2 * self.dim
    }

    /// State derivative `(v, a(x, v))`.
    pub fn derivative(&self, state: &DVec) -> DVec {
        let n = self.dim;
        let mut out = DVec::zeros(2 * n);
        out.rows_mut(0, n).copy_from(&state.rows(n, n));
        (self.accel)(state.as_slice(), &mut out.as_mut_slice()[n..]);
        out
    }
}

impl fmt::Debug for CompiledGeodesic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledGeodesic")
            .field("dim", &self.dim)
            .finish_non_exhaustive()
    }
}
