//! Metric tensor with precomputed determinant and inverse.

use std::collections::BTreeSet;
use std::fmt;

use phyz_expr::{Expr, ExprError, ExprMatrix, Symbol, SymbolicBackend};
use tracing::{debug, warn};

use crate::error::{GeometryError, Result};

/// Name of the curve parameter used by geodesics.
pub const CURVE_PARAMETER: &str = "s";

/// Validated metric `g` over ordered coordinates.
///
/// Entries are stored simplified. The inverse and determinant are computed
/// once at construction; the model is immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricModel {
    coordinates: Vec<Symbol>,
    metric: ExprMatrix,
    inverse: ExprMatrix,
    determinant: Expr,
}

impl MetricModel {
    /// Validate and precompute.
    ///
    /// Fails with:
    /// - [`GeometryError::DuplicateCoordinate`] if a coordinate repeats
    /// - [`GeometryError::DimensionMismatch`] unless `metric` is `n x n` for
    ///   `n = coordinates.len() > 0`
    /// - [`GeometryError::AsymmetricMetric`] if `g[i][j] - g[j][i]` does not
    ///   simplify to zero
    /// - [`GeometryError::SingularMetric`] if the determinant simplifies to
    ///   the literal zero. Metrics that are singular only at particular
    ///   coordinate values are not detected.
    pub fn new<B: SymbolicBackend + ?Sized>(
        backend: &B,
        metric: ExprMatrix,
        coordinates: Vec<Symbol>,
    ) -> Result<Self> {
        check_shape(&metric, &coordinates)?;
        let n = coordinates.len();

        let metric = metric.try_map(|e| backend.simplify(e))?;
        check_reserved(&metric, &coordinates)?;
        for i in 0..n {
            for j in 0..i {
                let diff = backend.simplify(&(&metric[(i, j)] - &metric[(j, i)]))?;
                if !diff.is_zero() {
                    return Err(GeometryError::AsymmetricMetric { row: i, col: j });
                }
            }
        }

        let determinant = backend.determinant(&metric)?;
        if determinant.is_zero() {
            warn!(dim = n, "metric determinant simplifies to zero");
            return Err(GeometryError::SingularMetric);
        }
        let inverse = backend.inverse(&metric).map_err(|e| match e {
            ExprError::DivisionByZero => GeometryError::SingularMetric,
            other => GeometryError::Backend(other),
        })?;
        debug!(dim = n, det = %determinant, "metric model built");

        Ok(Self {
            coordinates,
            metric,
            inverse,
            determinant,
        })
    }

    /// Build from infix strings, e.g. `[["a^2", "0"], ["0", "a^2*sin(x)^2"]]`.
    pub fn parse<B: SymbolicBackend + ?Sized>(
        backend: &B,
        rows: &[&[&str]],
        coordinates: &[&str],
    ) -> Result<Self> {
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|s| Expr::parse(s)).collect::<phyz_expr::Result<Vec<_>>>())
            .collect::<phyz_expr::Result<Vec<Vec<Expr>>>>()?;
        let metric = ExprMatrix::from_rows(rows)?;
        Self::new(backend, metric, coordinates.iter().map(|c| Symbol::new(c)).collect())
    }

    /// Number of coordinates.
    pub fn dim(&self) -> usize {
        self.coordinates.len()
    }

    /// Coordinate symbols in index order.
    pub fn coordinates(&self) -> &[Symbol] {
        &self.coordinates
    }

    /// Simplified `g_{mu nu}`.
    pub fn metric(&self) -> &ExprMatrix {
        &self.metric
    }

    /// Simplified `g^{mu nu}`.
    pub fn inverse(&self) -> &ExprMatrix {
        &self.inverse
    }

    /// Simplified `det g`, nonzero by construction.
    pub fn determinant(&self) -> &Expr {
        &self.determinant
    }

    /// Curve parameter `s` for parameterised coordinates.
    pub fn parameter(&self) -> Symbol {
        Symbol::new(CURVE_PARAMETER)
    }

    /// Coordinates as functions of the curve parameter: `x(s)`, `y(s)`, ...
    pub fn parameterized(&self) -> Vec<String> {
        self.coordinates
            .iter()
            .map(|c| format!("{c}({CURVE_PARAMETER})"))
            .collect()
    }

    /// Symbols for `dx/ds`, named `<coord>_dot`.
    pub fn velocity_symbols(&self) -> Vec<Symbol> {
        self.coordinates
            .iter()
            .map(|c| Symbol::new(format!("{c}_dot")))
            .collect()
    }

    /// Symbols other than the coordinates appearing in the metric.
    pub fn parameters(&self) -> BTreeSet<Symbol> {
        let mut out: BTreeSet<Symbol> = self.metric.iter().flat_map(Expr::free_symbols).collect();
        for c in &self.coordinates {
            out.remove(c);
        }
        out
    }
}

impl fmt::Display for MetricModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.coordinates.iter().map(Symbol::name).collect();
        write!(f, "g({}) = {}", names.join(", "), self.metric)
    }
}

/// Distinct coordinates and an `n x n` metric with `n > 0`.
pub(crate) fn check_shape(metric: &ExprMatrix, coordinates: &[Symbol]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for c in coordinates {
        if !seen.insert(c) {
            return Err(GeometryError::DuplicateCoordinate(c.to_string()));
        }
    }
    let n = coordinates.len();
    if n == 0 || metric.nrows() != n || metric.ncols() != n {
        return Err(GeometryError::DimensionMismatch {
            rows: metric.nrows(),
            cols: metric.ncols(),
            coords: n,
        });
    }
    Ok(())
}

/// Velocity names and the curve parameter must not already be in use.
fn check_reserved(metric: &ExprMatrix, coordinates: &[Symbol]) -> Result<()> {
    let mut reserved: BTreeSet<Symbol> = coordinates
        .iter()
        .map(|c| Symbol::new(format!("{c}_dot")))
        .collect();
    reserved.insert(Symbol::new(CURVE_PARAMETER));
    let used = coordinates
        .iter()
        .cloned()
        .chain(metric.iter().flat_map(Expr::free_symbols));
    for sym in used {
        if reserved.contains(&sym) {
            return Err(GeometryError::ReservedSymbol(sym.to_string()));
        }
    }
    Ok(())
}
