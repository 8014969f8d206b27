//! Gaussian curvature of a 2D metric via Brioschi's formula.

use phyz_expr::{Expr, SymbolicBackend};
use tracing::debug;

use crate::error::{GeometryError, Result};
use crate::metric::MetricModel;

/// Gaussian curvature `K` of a surface with first fundamental form
/// `E du^2 + 2F du dv + G dv^2`, computed directly from the metric and its
/// first and second partials:
///
/// ```text
/// K = -(E_vv - 2F_uv + G_uu) / (2 det)
///     + [ G (E_u G_u - 2E_u F_v + E_v^2)
///       + F (E_u G_v - E_v G_u - 2E_v F_v + 4F_u F_v - 2F_u G_u)
///       + E (E_v G_v - 2F_u G_v + G_u^2) ] / (4 det^2)
/// ```
///
/// Independent of the Riemann path; for any 2D metric `K = R / 2`.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianCurvature {
    value: Expr,
}

impl GaussianCurvature {
    /// Fails with [`GeometryError::Dimensionality`] unless the metric is 2D.
    pub fn compute<B: SymbolicBackend + ?Sized>(backend: &B, model: &MetricModel) -> Result<Self> {
        if model.dim() != 2 {
            return Err(GeometryError::Dimensionality {
                operation: "Gaussian curvature",
                expected: 2,
                actual: model.dim(),
            });
        }
        let g = model.metric();
        let (u, v) = (&model.coordinates()[0], &model.coordinates()[1]);
        let d = |e: &Expr, x| backend.differentiate(e, x);

        let (e, f, gg) = (&g[(0, 0)], &g[(0, 1)], &g[(1, 1)]);
        let (e_u, e_v) = (d(e, u), d(e, v));
        let (f_u, f_v) = (d(f, u), d(f, v));
        let (g_u, g_v) = (d(gg, u), d(gg, v));
        let e_vv = d(&e_v, v);
        let f_uv = d(&f_u, v);
        let g_uu = d(&g_u, u);

        let det = model.determinant();
        let two_det = Expr::int(2) * det;
        let four_det_sq = Expr::int(4) * det.powi(2);

        let first = (Expr::int(2) * &f_uv - &e_vv - &g_uu) / &two_det;
        let second = (&e_u * (Expr::int(2) * &f_v - &g_u) - e_v.powi(2)) * gg / &four_det_sq;
        let third = (&e_u * &g_v - Expr::int(2) * &e_v * &g_u
            + (Expr::int(2) * &f_u - &e_v) * (Expr::int(2) * &f_v - &g_u))
            * f
            / &four_det_sq;
        let fourth = (&g_v * (Expr::int(2) * &f_u - &e_v) - g_u.powi(2)) * e / &four_det_sq;

        let value = backend.simplify(&(first - second + third - fourth))?;
        debug!(k = %value, "gaussian curvature computed");
        Ok(Self { value })
    }

    /// Simplified `K`.
    pub fn value(&self) -> &Expr {
        &self.value
    }

    /// Take the curvature expression.
    pub fn into_inner(self) -> Expr {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phyz_expr::{ExprMatrix, NativeBackend, Symbol};

    fn gaussian(rows: &[&[&str]], coords: &[&str]) -> Result<Expr> {
        let backend = NativeBackend::default();
        let model = MetricModel::parse(&backend, rows, coords)?;
        GaussianCurvature::compute(&backend, &model).map(GaussianCurvature::into_inner)
    }

    fn equiv(a: &Expr, b: &str) -> bool {
        (a - Expr::parse(b).unwrap()).is_identically_zero().unwrap()
    }

    #[test]
    fn test_sphere() {
        let k = gaussian(&[&["a^2", "0"], &["0", "a^2*sin(x)^2"]], &["x", "y"]).unwrap();
        assert!(equiv(&k, "1/a^2"));
    }

    #[test]
    fn test_plane_polar() {
        let k = gaussian(&[&["1", "0"], &["0", "r^2"]], &["r", "t"]).unwrap();
        assert!(k.is_zero());
    }

    #[test]
    fn test_saddle() {
        let k = gaussian(&[&["1 + y^2", "x*y"], &["x*y", "1 + x^2"]], &["x", "y"]).unwrap();
        assert!(equiv(&k, "-1/(1 + x^2 + y^2)^2"));
    }

    #[test]
    fn test_poincare_half_plane() {
        let k = gaussian(&[&["1/y^2", "0"], &["0", "1/y^2"]], &["x", "y"]).unwrap();
        assert!(equiv(&k, "-1"));
    }

    #[test]
    fn test_rejects_non_surface() {
        let backend = NativeBackend::default();
        let coords = vec![Symbol::new("x"), Symbol::new("y"), Symbol::new("z")];
        let model = MetricModel::new(&backend, ExprMatrix::identity(3), coords).unwrap();
        let err = GaussianCurvature::compute(&backend, &model).unwrap_err();
        assert_eq!(
            err,
            GeometryError::Dimensionality {
                operation: "Gaussian curvature",
                expected: 2,
                actual: 3
            }
        );
    }
}
