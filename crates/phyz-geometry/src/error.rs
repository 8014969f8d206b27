//! Error types for phyz-geometry.

use phyz_expr::ExprError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("metric is {rows}x{cols} but {coords} coordinates were given")]
    DimensionMismatch {
        rows: usize,
        cols: usize,
        coords: usize,
    },

    #[error("metric determinant simplifies to zero")]
    SingularMetric,

    #[error("{operation} requires a {expected}-dimensional metric, got {actual}")]
    Dimensionality {
        operation: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("symbolic backend error: {0}")]
    Backend(#[from] ExprError),

    #[error("integration diverged at s = {t}: {reason}")]
    IntegrationDivergence { t: f64, reason: String },

    #[error("metric is not symmetric: g[{row}][{col}] != g[{col}][{row}]")]
    AsymmetricMetric { row: usize, col: usize },

    #[error("coordinate '{0}' appears more than once")]
    DuplicateCoordinate(String),

    /// A coordinate or parameter shadows a velocity symbol `<coord>_dot`
    /// or the curve parameter.
    #[error("symbol '{0}' clashes with a derived geodesic symbol")]
    ReservedSymbol(String),

    #[error("invalid integrator config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, GeometryError>;
