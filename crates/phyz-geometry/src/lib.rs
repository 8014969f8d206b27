//! Riemannian geometry from symbolic metrics.
//!
//! Given a metric tensor over named coordinates, derives:
//! 1. Christoffel symbols of the Levi-Civita connection
//! 2. Riemann, Ricci and Einstein tensors and the Ricci scalar
//! 3. Gaussian curvature of surfaces (Brioschi's formula)
//! 4. Geodesic equations, compiled and integrated numerically
//!
//! Every tensor is built entry by entry as a pure function of its index
//! tuple; a failed entry fails the whole computation.
//!
//! # Example
//!
//! ```
//! use phyz_expr::{Expr, NativeBackend, Substitution};
//! use phyz_geometry::{DVec, GeodesicIntegrator, IntegratorConfig, RiemannGeometry, metrics};
//!
//! let backend = NativeBackend::default();
//! let sphere = metrics::sphere(Expr::symbol("a"));
//! let geometry = RiemannGeometry::new(&backend, sphere.metric, sphere.coordinates).unwrap();
//!
//! // R = 2 K = 2 / a^2
//! let expected: Expr = "2/a^2".parse().unwrap();
//! assert!((geometry.ricci_scalar() - expected).is_identically_zero().unwrap());
//!
//! let flow = geometry
//!     .geodesic_system()
//!     .compile(&backend, &Substitution::new().with("a", 1))
//!     .unwrap();
//! let integrator = GeodesicIntegrator::new(IntegratorConfig::default().t_end(1.0).samples(11)).unwrap();
//! let start = DVec::from_vec(vec![1.0, 0.0, 0.0, 0.5]);
//! let trajectory = integrator.solve_from(&flow, start).unwrap();
//! assert_eq!(trajectory.len(), 11);
//! ```

pub mod christoffel;
pub mod curvature;
pub mod error;
pub mod gaussian;
pub mod geodesic;
pub mod integrator;
pub mod metric;
pub mod metrics;
pub mod solver;
pub mod tensor;
pub mod trajectory;

pub use christoffel::ChristoffelSymbols;
pub use curvature::{Curvature, einstein_tensor, ricci_scalar, ricci_tensor, riemann_tensor};
pub use error::{GeometryError, Result};
pub use gaussian::GaussianCurvature;
pub use geodesic::{CompiledGeodesic, DVec, GeodesicSystem};
pub use integrator::{GeodesicIntegrator, IntegrationMethod, IntegratorConfig};
pub use metric::{CURVE_PARAMETER, MetricModel};
pub use metrics::StandardMetric;
pub use solver::{CashKarp, NumericIntegrator, PiController, Rk4};
pub use tensor::Tensor;
pub use trajectory::Trajectory;

use phyz_expr::{Expr, ExprMatrix, Symbol, SymbolicBackend};
use tracing::info;

/// Metric, connection and curvature of an `n`-dimensional manifold.
///
/// All tensors are computed at construction. For `n = 2` the Gaussian
/// curvature is attached as well.
#[derive(Debug, Clone, PartialEq)]
pub struct RiemannGeometry {
    model: MetricModel,
    christoffel: ChristoffelSymbols,
    curvature: Curvature,
    gaussian: Option<GaussianCurvature>,
}

impl RiemannGeometry {
    /// Validate the metric and derive every tensor.
    pub fn new<B: SymbolicBackend + ?Sized>(
        backend: &B,
        metric: ExprMatrix,
        coordinates: Vec<Symbol>,
    ) -> Result<Self> {
        let model = MetricModel::new(backend, metric, coordinates)?;
        Self::from_model(backend, model)
    }

    /// Derive every tensor from an already validated model.
    pub fn from_model<B: SymbolicBackend + ?Sized>(backend: &B, model: MetricModel) -> Result<Self> {
        let christoffel = ChristoffelSymbols::compute(backend, &model)?;
        let curvature = Curvature::compute(backend, &model, &christoffel)?;
        let gaussian = if model.dim() == 2 {
            Some(GaussianCurvature::compute(backend, &model)?)
        } else {
            None
        };
        info!(
            dim = model.dim(),
            flat = curvature.is_flat(),
            "riemann geometry computed"
        );
        Ok(Self {
            model,
            christoffel,
            curvature,
            gaussian,
        })
    }

    /// The validated metric.
    pub fn model(&self) -> &MetricModel {
        &self.model
    }

    /// Manifold dimension.
    pub fn dim(&self) -> usize {
        self.model.dim()
    }

    /// Connection coefficients.
    pub fn christoffel(&self) -> &ChristoffelSymbols {
        &self.christoffel
    }

    /// All curvature tensors.
    pub fn curvature(&self) -> &Curvature {
        &self.curvature
    }

    /// Shorthand for `self.curvature().riemann()`.
    pub fn riemann(&self) -> &Tensor<4> {
        self.curvature.riemann()
    }

    /// Ricci tensor.
    pub fn ricci(&self) -> &Tensor<2> {
        self.curvature.ricci()
    }

    /// Ricci scalar.
    pub fn ricci_scalar(&self) -> &Expr {
        self.curvature.ricci_scalar()
    }

    /// Einstein tensor.
    pub fn einstein(&self) -> &Tensor<2> {
        self.curvature.einstein()
    }

    /// Gaussian curvature, present only for surfaces.
    pub fn gaussian(&self) -> Option<&Expr> {
        self.gaussian.as_ref().map(GaussianCurvature::value)
    }

    /// Geodesic equations, assembled on each call.
    pub fn geodesic_system(&self) -> GeodesicSystem {
        GeodesicSystem::new(&self.model, &self.christoffel)
    }
}

/// Two-dimensional metric with its Gaussian curvature.
///
/// Skips the Riemann path entirely; use [`RiemannGeometry`] for the full
/// tensor set.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceGeometry {
    model: MetricModel,
    gaussian: GaussianCurvature,
}

impl SurfaceGeometry {
    /// Fails with [`GeometryError::Dimensionality`] unless the metric is 2x2.
    pub fn new<B: SymbolicBackend + ?Sized>(
        backend: &B,
        metric: ExprMatrix,
        coordinates: Vec<Symbol>,
    ) -> Result<Self> {
        crate::metric::check_shape(&metric, &coordinates)?;
        if coordinates.len() != 2 {
            return Err(GeometryError::Dimensionality {
                operation: "surface geometry",
                expected: 2,
                actual: coordinates.len(),
            });
        }
        let model = MetricModel::new(backend, metric, coordinates)?;
        let gaussian = GaussianCurvature::compute(backend, &model)?;
        Ok(Self { model, gaussian })
    }

    /// The validated metric.
    pub fn model(&self) -> &MetricModel {
        &self.model
    }

    /// Gaussian curvature from Brioschi's formula.
    pub fn gaussian_curvature(&self) -> &Expr {
        self.gaussian.value()
    }

    /// Geodesic equations; derives the Christoffel symbols on each call.
    pub fn geodesic_system<B: SymbolicBackend + ?Sized>(&self, backend: &B) -> Result<GeodesicSystem> {
        let christoffel = ChristoffelSymbols::compute(backend, &self.model)?;
        Ok(GeodesicSystem::new(&self.model, &christoffel))
    }
}
