//! Explicit ODE solvers for first-order systems `dy/dt = f(t, y)`.
//!
//! Implements:
//! - Fixed-step classical RK4 with sub-stepping between samples
//! - Adaptive embedded Cash-Karp 4(5) with a PI step-size controller

use tracing::{debug, trace};

use crate::error::{GeometryError, Result};
use crate::geodesic::DVec;

/// Right-hand side of `dy/dt = f(t, y)`.
pub type Rhs<'a> = dyn Fn(f64, &DVec) -> DVec + 'a;

/// Numeric ODE solver contract.
pub trait NumericIntegrator {
    /// Integrate from `times[0]` and return the state at every sample time,
    /// starting with `y0` itself. `times` must be non-decreasing.
    fn integrate(&self, rhs: &Rhs<'_>, y0: &DVec, times: &[f64]) -> Result<Vec<DVec>>;
}

fn divergence(t: f64, reason: impl Into<String>) -> GeometryError {
    GeometryError::IntegrationDivergence {
        t,
        reason: reason.into(),
    }
}

fn check_state(t: f64, y: &DVec, blowup: f64) -> Result<()> {
    if y.iter().any(|v| !v.is_finite()) {
        return Err(divergence(t, "non-finite state"));
    }
    let norm = y.norm();
    if norm > blowup {
        return Err(divergence(t, format!("state norm {norm:.3e} exceeds {blowup:.3e}")));
    }
    Ok(())
}

fn check_times(times: &[f64]) -> Result<()> {
    if times.iter().any(|t| !t.is_finite()) || times.windows(2).any(|w| w[1] < w[0]) {
        return Err(GeometryError::InvalidConfig(
            "sample times must be finite and non-decreasing".into(),
        ));
    }
    Ok(())
}

/// Classical fourth-order Runge-Kutta with `substeps` equal steps per
/// sample interval.
#[derive(Debug, Clone)]
pub struct Rk4 {
    pub substeps: usize,
    /// State norm treated as divergence.
    pub blowup: f64,
}

impl Rk4 {
    /// At least one substep; default blowup threshold.
    pub fn new(substeps: usize) -> Self {
        Self {
            substeps: substeps.max(1),
            blowup: 1e10,
        }
    }

    fn step(rhs: &Rhs<'_>, t: f64, y: &DVec, dt: f64) -> DVec {
        let k1 = rhs(t, y);
        let k2 = rhs(t + dt / 2.0, &(y + &k1 * (dt / 2.0)));
        let k3 = rhs(t + dt / 2.0, &(y + &k2 * (dt / 2.0)));
        let k4 = rhs(t + dt, &(y + &k3 * dt));
        y + (&k1 + &k2 * 2.0 + &k3 * 2.0 + &k4) * (dt / 6.0)
    }
}

impl NumericIntegrator for Rk4 {
    fn integrate(&self, rhs: &Rhs<'_>, y0: &DVec, times: &[f64]) -> Result<Vec<DVec>> {
        check_times(times)?;
        let Some(&t0) = times.first() else {
            return Ok(Vec::new());
        };
        check_state(t0, y0, self.blowup)?;

        let mut out = Vec::with_capacity(times.len());
        let mut y = y0.clone();
        let mut t = t0;
        out.push(y.clone());
        for &target in &times[1..] {
            let dt = (target - t) / self.substeps as f64;
            if dt > 0.0 {
                for _ in 0..self.substeps {
                    y = Self::step(rhs, t, &y, dt);
                    t += dt;
                    check_state(t, &y, self.blowup)?;
                }
            }
            t = target;
            out.push(y.clone());
        }
        Ok(out)
    }
}

/// PI step-size controller on a scaled error estimate (accept when `err <= 1`).
///
/// Accepted steps use `dt * safety * err^-alpha * prev_err^beta`; rejected
/// steps use the elementary `dt * safety * err^(-1/5)` and always shrink.
/// The step after a rejection is not allowed to grow.
#[derive(Debug, Clone)]
pub struct PiController {
    /// Exponent on the current error.
    pub alpha: f64,
    /// Exponent on the last accepted error.
    pub beta: f64,
    pub safety: f64,
    /// Growth limit per step.
    pub max_growth: f64,
    /// Shrink limit per step.
    pub min_shrink: f64,
    pub dt_min: f64,
    pub dt_max: f64,
    prev_error: f64,
    rejected_last: bool,
}

/// Errors below this are treated as this, bounding the growth factor.
const ERROR_FLOOR: f64 = 1e-4;

impl PiController {
    /// Gains for a fifth-order propagated solution.
    pub fn new(dt_min: f64, dt_max: f64) -> Self {
        Self {
            alpha: 0.7 / 5.0,
            beta: 0.4 / 5.0,
            safety: 0.9,
            max_growth: 5.0,
            min_shrink: 0.1,
            dt_min,
            dt_max,
            prev_error: 1.0,
            rejected_last: false,
        }
    }

    /// Next step size after a trial of size `dt`, and whether to accept it.
    pub fn adjust(&mut self, dt: f64, error: f64) -> (f64, bool) {
        let error = error.max(ERROR_FLOOR);
        if error <= 1.0 {
            let mut factor = self.safety * error.powf(-self.alpha) * self.prev_error.powf(self.beta);
            factor = factor.clamp(self.min_shrink, self.max_growth);
            if self.rejected_last {
                factor = factor.min(1.0);
            }
            self.prev_error = error;
            self.rejected_last = false;
            ((dt * factor).clamp(self.dt_min, self.dt_max), true)
        } else {
            let factor = (self.safety * error.powf(-0.2)).max(self.min_shrink);
            self.rejected_last = true;
            ((dt * factor).max(self.dt_min), false)
        }
    }

    /// Forget the error history, e.g. after a non-finite trial.
    pub fn reset(&mut self) {
        self.prev_error = 1.0;
        self.rejected_last = true;
    }
}

/// Adaptive embedded Runge-Kutta (Cash-Karp 4(5)).
///
/// The fifth-order solution is propagated; the difference to the embedded
/// fourth-order solution, scaled by `atol + rtol * |y|`, drives the
/// controller.
#[derive(Debug, Clone)]
pub struct CashKarp {
    pub rtol: f64,
    pub atol: f64,
    /// Attempted steps (accepted or rejected) before giving up.
    pub max_steps: usize,
    pub dt_min: f64,
    pub blowup: f64,
}

impl Default for CashKarp {
    fn default() -> Self {
        Self {
            rtol: 1e-8,
            atol: 1e-10,
            max_steps: 100_000,
            dt_min: 1e-12,
            blowup: 1e10,
        }
    }
}

impl CashKarp {
    /// One trial step: returns the fifth-order state and the scaled error.
    fn trial(&self, rhs: &Rhs<'_>, t: f64, y: &DVec, dt: f64) -> (DVec, f64) {
        let k1 = rhs(t, y);
        let k2 = rhs(t + dt / 5.0, &(y + &k1 * (dt / 5.0)));
        let k3 = rhs(
            t + 3.0 * dt / 10.0,
            &(y + (&k1 * (3.0 / 40.0) + &k2 * (9.0 / 40.0)) * dt),
        );
        let k4 = rhs(
            t + 3.0 * dt / 5.0,
            &(y + (&k1 * (3.0 / 10.0) - &k2 * (9.0 / 10.0) + &k3 * (6.0 / 5.0)) * dt),
        );
        let k5 = rhs(
            t + dt,
            &(y + (&k1 * (-11.0 / 54.0) + &k2 * (5.0 / 2.0) - &k3 * (70.0 / 27.0)
                + &k4 * (35.0 / 27.0))
                * dt),
        );
        let k6 = rhs(
            t + 7.0 * dt / 8.0,
            &(y + (&k1 * (1631.0 / 55296.0)
                + &k2 * (175.0 / 512.0)
                + &k3 * (575.0 / 13824.0)
                + &k4 * (44275.0 / 110592.0)
                + &k5 * (253.0 / 4096.0))
                * dt),
        );

        let y5 = y + (&k1 * (37.0 / 378.0)
            + &k3 * (250.0 / 621.0)
            + &k4 * (125.0 / 594.0)
            + &k6 * (512.0 / 1771.0))
            * dt;
        let y4 = y + (&k1 * (2825.0 / 27648.0)
            + &k3 * (18575.0 / 48384.0)
            + &k4 * (13525.0 / 55296.0)
            + &k5 * (277.0 / 14336.0)
            + &k6 * 0.25)
            * dt;

        let error = y5
            .iter()
            .zip(y4.iter())
            .zip(y.iter())
            .map(|((a, b), y0)| (a - b).abs() / (self.atol + self.rtol * a.abs().max(y0.abs())))
            .fold(0.0_f64, |m, e| {
                if m.is_nan() || e.is_nan() {
                    f64::NAN
                } else {
                    m.max(e)
                }
            });
        (y5, error)
    }
}

impl NumericIntegrator for CashKarp {
    fn integrate(&self, rhs: &Rhs<'_>, y0: &DVec, times: &[f64]) -> Result<Vec<DVec>> {
        check_times(times)?;
        let (Some(&t0), Some(&t_last)) = (times.first(), times.last()) else {
            return Ok(Vec::new());
        };
        check_state(t0, y0, self.blowup)?;

        let span = (t_last - t0).max(self.dt_min);
        let mut controller = PiController::new(self.dt_min, span);
        let mut dt = times
            .get(1)
            .map_or(span, |&t1| t1 - t0)
            .clamp(self.dt_min, span);

        let mut out = Vec::with_capacity(times.len());
        let mut y = y0.clone();
        let mut t = t0;
        let mut steps = 0usize;
        let mut rejected = 0usize;
        out.push(y.clone());

        for &target in &times[1..] {
            while t < target {
                if steps >= self.max_steps {
                    return Err(divergence(t, format!("step budget of {} exhausted", self.max_steps)));
                }
                steps += 1;

                let remaining = target - t;
                let h = dt.min(remaining);
                let (y_next, error) = self.trial(rhs, t, &y, h);

                if !error.is_finite() {
                    rejected += 1;
                    controller.reset();
                    dt = h * 0.1;
                    if dt < self.dt_min {
                        return Err(divergence(t, "non-finite derivative"));
                    }
                    continue;
                }

                let (new_dt, accept) = controller.adjust(h, error);
                if accept {
                    t = if h >= remaining { target } else { t + h };
                    y = y_next;
                    check_state(t, &y, self.blowup)?;
                } else {
                    rejected += 1;
                    trace!(t, h, error, "step rejected");
                    if h <= self.dt_min {
                        return Err(divergence(
                            t,
                            format!("step size fell below {:.3e}", self.dt_min),
                        ));
                    }
                }
                // A step shortened to land on a sample must not shrink the next one.
                if !(accept && h < dt) {
                    dt = new_dt;
                }
            }
            out.push(y.clone());
        }
        debug!(steps, rejected, "adaptive integration finished");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn linspace(end: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| end * i as f64 / (n - 1) as f64).collect()
    }

    /// y'' = -y as a first-order system.
    fn oscillator(_t: f64, y: &DVec) -> DVec {
        DVec::from_vec(vec![y[1], -y[0]])
    }

    #[test]
    fn test_controller_shrinks_after_smooth_run() {
        let mut controller = PiController::new(1e-12, 10.0);
        let mut dt = 0.1;
        for _ in 0..20 {
            let (next, accept) = controller.adjust(dt, 1e-12);
            assert!(accept);
            assert!(next <= dt * controller.max_growth);
            dt = next;
        }
        // A failing trial of the sample interval must come back smaller.
        let (next, accept) = controller.adjust(0.1, 2.77);
        assert!(!accept);
        assert!(next < 0.1);
        let (again, accept) = controller.adjust(next, 2.77);
        assert!(!accept);
        assert!(again < next);
    }

    #[test]
    fn test_controller_no_growth_after_reject() {
        let mut controller = PiController::new(1e-12, 10.0);
        let (dt, accept) = controller.adjust(0.5, 50.0);
        assert!(!accept);
        assert_relative_eq!(dt, 0.5 * 0.9 * 50.0_f64.powf(-0.2));
        let (next, accept) = controller.adjust(dt, 1e-8);
        assert!(accept);
        assert!(next <= dt);
        let (grown, _) = controller.adjust(next, 1e-8);
        assert!(grown > next);
    }

    #[test]
    fn test_controller_limits() {
        let mut controller = PiController::new(1e-3, 1.0);
        let (dt, _) = controller.adjust(0.9, 0.0);
        assert_relative_eq!(dt, 1.0);
        let (dt, accept) = controller.adjust(2e-3, 1e12);
        assert!(!accept);
        assert_relative_eq!(dt, 1e-3);
    }

    #[test]
    fn test_rk4_oscillator() {
        let times = linspace(std::f64::consts::PI, 11);
        let y0 = DVec::from_vec(vec![1.0, 0.0]);
        let out = Rk4::new(20).integrate(&oscillator, &y0, &times).unwrap();
        assert_eq!(out.len(), times.len());
        for (t, y) in times.iter().zip(&out) {
            assert_relative_eq!(y[0], t.cos(), epsilon = 1e-6);
            assert_relative_eq!(y[1], -t.sin(), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_cash_karp_oscillator() {
        let times = linspace(10.0, 101);
        let y0 = DVec::from_vec(vec![0.0, 1.0]);
        let out = CashKarp::default().integrate(&oscillator, &y0, &times).unwrap();
        assert_eq!(out.len(), times.len());
        for (t, y) in times.iter().zip(&out) {
            assert_relative_eq!(y[0], t.sin(), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_cash_karp_reports_blowup() {
        // y' = y^2, y(0) = 1 blows up at t = 1.
        let rhs = |_t: f64, y: &DVec| DVec::from_vec(vec![y[0] * y[0]]);
        let y0 = DVec::from_vec(vec![1.0]);
        let err = CashKarp::default()
            .integrate(&rhs, &y0, &linspace(2.0, 5))
            .unwrap_err();
        match err {
            GeometryError::IntegrationDivergence { t, .. } => assert!(t <= 1.0 + 1e-6),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_rk4_reports_non_finite() {
        let rhs = |_t: f64, y: &DVec| DVec::from_vec(vec![y[0] * y[0]]);
        let y0 = DVec::from_vec(vec![1.0]);
        let err = Rk4::new(4).integrate(&rhs, &y0, &linspace(3.0, 4)).unwrap_err();
        assert!(matches!(err, GeometryError::IntegrationDivergence { .. }));
    }

    #[test]
    fn test_rejects_decreasing_times() {
        let y0 = DVec::from_vec(vec![1.0, 0.0]);
        let err = Rk4::new(1).integrate(&oscillator, &y0, &[0.0, 1.0, 0.5]).unwrap_err();
        assert!(matches!(err, GeometryError::InvalidConfig(_)));
    }
}
