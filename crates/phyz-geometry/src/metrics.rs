//! Catalog of well-known metrics.
//!
//! | name            | coordinates          | metric                                              |
//! |-----------------|----------------------|-----------------------------------------------------|
//! | `sphere`        | `x, y`               | `diag(a^2, a^2 sin^2 x)`                            |
//! | `klein_disk`    | `x1, x2`             | `a^2 [[1 - x2^2, x1 x2], [x1 x2, 1 - x1^2]] / w^2`  |
//! | `saddle`        | `x, y`               | `[[1 + y^2, x y], [x y, 1 + x^2]]`                  |
//! | `rindler`       | `t, x`               | `diag(-e^{2ax}, e^{2ax})`                           |
//! | `euclidean`     | `x0 .. x{n-1}`       | identity                                            |
//! | `schwarzschild` | `t, r, theta, phi`   | `diag(-(1 - rs/r), 1/(1 - rs/r), r^2, r^2 sin^2 theta)` |
//!
//! with `w = 1 - x1^2 - x2^2`. Scale parameters are ordinary expressions:
//! pass `Expr::symbol("a")` to keep them symbolic or a number to fix them.

use phyz_expr::{Expr, ExprMatrix, Symbol, SymbolicBackend};

use crate::error::Result;
use crate::metric::MetricModel;

/// Named metric with its coordinates, ready to be validated.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardMetric {
    pub name: &'static str,
    pub metric: ExprMatrix,
    pub coordinates: Vec<Symbol>,
}

impl StandardMetric {
    /// Validate into a [`MetricModel`].
    pub fn model<B: SymbolicBackend + ?Sized>(&self, backend: &B) -> Result<MetricModel> {
        MetricModel::new(backend, self.metric.clone(), self.coordinates.clone())
    }
}

fn coords(names: &[&str]) -> Vec<Symbol> {
    names.iter().map(|n| Symbol::new(n)).collect()
}

/// Sphere of radius `a` in colatitude/longitude `(x, y)`; `K = 1/a^2`.
pub fn sphere(a: impl Into<Expr>) -> StandardMetric {
    let a: Expr = a.into();
    let a2 = a.powi(2);
    let x = Expr::symbol("x");
    StandardMetric {
        name: "sphere",
        metric: ExprMatrix::diag([a2.clone(), a2 * x.sin().powi(2)]),
        coordinates: coords(&["x", "y"]),
    }
}

/// Gauss-Bolyai-Lobachevsky plane in Klein coordinates on the unit disk;
/// `K = -1/a^2`.
pub fn klein_disk(a: impl Into<Expr>) -> StandardMetric {
    let a: Expr = a.into();
    let a2 = a.powi(2);
    let (x1, x2) = (Expr::symbol("x1"), Expr::symbol("x2"));
    let w2 = (Expr::one() - x1.powi(2) - x2.powi(2)).powi(2);
    let off = &a2 * &x1 * &x2 / &w2;
    StandardMetric {
        name: "klein_disk",
        metric: ExprMatrix::from_fn(2, 2, |i, j| match (i, j) {
            (0, 0) => &a2 * (Expr::one() - x2.powi(2)) / &w2,
            (1, 1) => &a2 * (Expr::one() - x1.powi(2)) / &w2,
            _ => off.clone(),
        }),
        coordinates: coords(&["x1", "x2"]),
    }
}

/// Induced metric of the saddle `z = x y`; `K = -1/(1 + x^2 + y^2)^2`.
pub fn saddle() -> StandardMetric {
    let (x, y) = (Expr::symbol("x"), Expr::symbol("y"));
    let xy = &x * &y;
    StandardMetric {
        name: "saddle",
        metric: ExprMatrix::from_fn(2, 2, |i, j| match (i, j) {
            (0, 0) => Expr::one() + y.powi(2),
            (1, 1) => Expr::one() + x.powi(2),
            _ => xy.clone(),
        }),
        coordinates: coords(&["x", "y"]),
    }
}

/// Two-dimensional Rindler spacetime in `(t, x)`; flat.
pub fn rindler(a: impl Into<Expr>) -> StandardMetric {
    let a: Expr = a.into();
    let conformal = (Expr::int(2) * a * Expr::symbol("x")).exp();
    StandardMetric {
        name: "rindler",
        metric: ExprMatrix::diag([-conformal.clone(), conformal]),
        coordinates: coords(&["t", "x"]),
    }
}

/// Flat `n`-space in Cartesian coordinates `x0 .. x{n-1}`.
pub fn euclidean(n: usize) -> StandardMetric {
    let names: Vec<String> = (0..n).map(|i| format!("x{i}")).collect();
    StandardMetric {
        name: "euclidean",
        metric: ExprMatrix::identity(n),
        coordinates: names.iter().map(Symbol::new).collect(),
    }
}

/// Exterior Schwarzschild spacetime with radius `rs`; Ricci-flat.
pub fn schwarzschild(rs: impl Into<Expr>) -> StandardMetric {
    let r = Expr::symbol("r");
    let rs: Expr = rs.into();
    let lapse = Expr::one() - rs / &r;
    let r2 = r.powi(2);
    StandardMetric {
        name: "schwarzschild",
        metric: ExprMatrix::diag([
            -lapse.clone(),
            lapse.recip(),
            r2.clone(),
            r2 * Expr::symbol("theta").sin().powi(2),
        ]),
        coordinates: coords(&["t", "r", "theta", "phi"]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phyz_expr::NativeBackend;

    #[test]
    fn test_catalog_models_validate() {
        let backend = NativeBackend::default();
        let a = Expr::symbol("a");
        for metric in [
            sphere(a.clone()),
            klein_disk(a.clone()),
            saddle(),
            rindler(a),
            euclidean(3),
            schwarzschild(Expr::symbol("rs")),
        ] {
            let model = metric.model(&backend).unwrap();
            assert_eq!(model.dim(), metric.coordinates.len(), "{}", metric.name);
        }
    }

    #[test]
    fn test_numeric_scale() {
        let backend = NativeBackend::default();
        let model = sphere(2).model(&backend).unwrap();
        assert!(model.parameters().is_empty());
        assert_eq!(model.metric()[(0, 0)].to_string(), "4");
    }
}
