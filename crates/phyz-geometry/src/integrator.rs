//! Numeric integration of geodesics from a random initial state.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{GeometryError, Result};
use crate::geodesic::{CompiledGeodesic, DVec};
use crate::solver::{CashKarp, NumericIntegrator, Rk4};
use crate::trajectory::Trajectory;

/// Solver selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrationMethod {
    /// Fixed-step RK4 with `substeps` steps per sample interval.
    Rk4 { substeps: usize },
    /// Adaptive Cash-Karp 4(5).
    #[default]
    CashKarp,
}

/// Sampling and solver settings. Samples are `linspace(0, t_end, samples)`,
/// endpoints included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorConfig {
    pub t_end: f64,
    pub samples: usize,
    pub method: IntegrationMethod,
    pub rtol: f64,
    pub atol: f64,
    /// Attempted steps before the adaptive solver gives up.
    pub max_steps: usize,
    /// Smallest adaptive step.
    pub dt_min: f64,
    /// State norm treated as divergence.
    pub blowup: f64,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            t_end: 10.0,
            samples: 1000,
            method: IntegrationMethod::CashKarp,
            rtol: 1e-8,
            atol: 1e-10,
            max_steps: 100_000,
            dt_min: 1e-12,
            blowup: 1e10,
        }
    }
}

impl IntegratorConfig {
    /// Set the last sample parameter.
    pub fn t_end(mut self, t_end: f64) -> Self {
        self.t_end = t_end;
        self
    }

    /// Set the number of samples, endpoints included.
    pub fn samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    /// Select the solver.
    pub fn method(mut self, method: IntegrationMethod) -> Self {
        self.method = method;
        self
    }

    /// Relative and absolute tolerance of the adaptive solver.
    pub fn tolerances(mut self, rtol: f64, atol: f64) -> Self {
        self.rtol = rtol;
        self.atol = atol;
        self
    }

    /// Set the adaptive step budget.
    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Set the divergence threshold on any state component.
    pub fn blowup(mut self, blowup: f64) -> Self {
        self.blowup = blowup;
        self
    }

    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| GeometryError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check ranges; fails with [`GeometryError::InvalidConfig`].
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(GeometryError::InvalidConfig(msg));
        if !(self.t_end.is_finite() && self.t_end > 0.0) {
            return invalid(format!("t_end must be positive and finite, got {}", self.t_end));
        }
        if self.samples < 2 {
            return invalid(format!("need at least 2 samples, got {}", self.samples));
        }
        if !(self.rtol > 0.0 && self.atol > 0.0) {
            return invalid(format!(
                "tolerances must be positive, got rtol={} atol={}",
                self.rtol, self.atol
            ));
        }
        if self.max_steps == 0 {
            return invalid("max_steps must be positive".into());
        }
        if !(self.dt_min > 0.0 && self.dt_min < self.t_end) {
            return invalid(format!("dt_min must lie in (0, t_end), got {}", self.dt_min));
        }
        if !(self.blowup > 0.0) {
            return invalid(format!("blowup must be positive, got {}", self.blowup));
        }
        if let IntegrationMethod::Rk4 { substeps: 0 } = self.method {
            return invalid("rk4 substeps must be positive".into());
        }
        Ok(())
    }

    /// Sample parameter values `s_i = t_end * i / (samples - 1)`.
    pub fn sample_times(&self) -> Vec<f64> {
        let last = (self.samples - 1) as f64;
        (0..self.samples)
            .map(|i| self.t_end * i as f64 / last)
            .collect()
    }

    fn solver(&self) -> Box<dyn NumericIntegrator> {
        match self.method {
            IntegrationMethod::Rk4 { substeps } => Box::new(Rk4 {
                substeps,
                blowup: self.blowup,
            }),
            IntegrationMethod::CashKarp => Box::new(CashKarp {
                rtol: self.rtol,
                atol: self.atol,
                max_steps: self.max_steps,
                dt_min: self.dt_min,
                blowup: self.blowup,
            }),
        }
    }
}

/// Integrates compiled geodesic systems.
///
/// Randomness is always supplied by the caller; nothing here touches a
/// global generator.
#[derive(Debug, Clone)]
pub struct GeodesicIntegrator {
    config: IntegratorConfig,
}

impl GeodesicIntegrator {
    /// Validates `config` up front.
    pub fn new(config: IntegratorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The validated configuration.
    pub fn config(&self) -> &IntegratorConfig {
        &self.config
    }

    /// `2n` independent draws from `Uniform[0, 1)`, ordered `(x, v)`.
    pub fn initial_state<R: Rng + ?Sized>(dim: usize, rng: &mut R) -> DVec {
        DVec::from_iterator(2 * dim, (0..2 * dim).map(|_| rng.gen_range(0.0..1.0)))
    }

    /// Integrate from a random initial state drawn from `rng`.
    pub fn solve<R: Rng + ?Sized>(&self, system: &CompiledGeodesic, rng: &mut R) -> Result<Trajectory> {
        let y0 = Self::initial_state(system.dim(), rng);
        self.solve_from(system, y0)
    }

    /// [`GeodesicIntegrator::solve`] with `StdRng::seed_from_u64(seed)`.
    pub fn solve_seeded(&self, system: &CompiledGeodesic, seed: u64) -> Result<Trajectory> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.solve(system, &mut rng)
    }

    /// Integrate from an explicit `(x, v)` state.
    pub fn solve_from(&self, system: &CompiledGeodesic, y0: DVec) -> Result<Trajectory> {
        if y0.len() != system.state_dim() {
            return Err(GeometryError::InvalidConfig(format!(
                "initial state has {} components, expected {}",
                y0.len(),
                system.state_dim()
            )));
        }
        let times = self.config.sample_times();
        info!(
            dim = system.dim(),
            samples = times.len(),
            t_end = self.config.t_end,
            method = ?self.config.method,
            "integrating geodesic"
        );
        let rhs = |_s: f64, y: &DVec| system.derivative(y);
        let states = self.config.solver().integrate(&rhs, &y0, &times)?;
        Ok(Trajectory::new(system.dim(), times, states))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sampling() {
        let config = IntegratorConfig::default();
        let times = config.sample_times();
        assert_eq!(times.len(), 1000);
        assert_eq!(times[0], 0.0);
        assert_eq!(times[999], 10.0);
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = IntegratorConfig::from_json(r#"{"t_end": 2.5, "method": {"kind": "rk4", "substeps": 8}}"#)
            .unwrap();
        assert_eq!(config.t_end, 2.5);
        assert_eq!(config.samples, 1000);
        assert_eq!(config.method, IntegrationMethod::Rk4 { substeps: 8 });
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            IntegratorConfig::default().samples(1).validate(),
            Err(GeometryError::InvalidConfig(_))
        ));
        assert!(matches!(
            IntegratorConfig::default().t_end(-1.0).validate(),
            Err(GeometryError::InvalidConfig(_))
        ));
        assert!(matches!(
            IntegratorConfig::from_json(r#"{"samples": "many"}"#),
            Err(GeometryError::InvalidConfig(_))
        ));
        assert!(GeodesicIntegrator::new(
            IntegratorConfig::default().method(IntegrationMethod::Rk4 { substeps: 0 })
        )
        .is_err());
    }

    #[test]
    fn test_initial_state_is_seeded() {
        let a = GeodesicIntegrator::initial_state(3, &mut StdRng::seed_from_u64(104));
        let b = GeodesicIntegrator::initial_state(3, &mut StdRng::seed_from_u64(104));
        let c = GeodesicIntegrator::initial_state(3, &mut StdRng::seed_from_u64(105));
        assert_eq!(a.len(), 6);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.iter().all(|v| (0.0..1.0).contains(v)));
    }
}
