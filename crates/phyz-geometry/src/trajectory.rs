//! Sampled geodesic trajectories and JSON export.

use serde::Serialize;

use crate::geodesic::DVec;

/// States `(x, v)` of a geodesic at increasing parameter values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    dim: usize,
    times: Vec<f64>,
    states: Vec<Vec<f64>>,
}

impl Trajectory {
    /// `dim` is the number of coordinates; each state has `2 * dim` entries.
    pub fn new(dim: usize, times: Vec<f64>, states: Vec<DVec>) -> Self {
        debug_assert_eq!(times.len(), states.len());
        Self {
            dim,
            times,
            states: states.iter().map(|s| s.as_slice().to_vec()).collect(),
        }
    }

    /// Number of coordinates `n`.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// `true` if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Parameter value of each sample.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Full `2n`-vectors, one per sample.
    pub fn states(&self) -> &[Vec<f64>] {
        &self.states
    }

    /// The first `n` entries of each state.
    pub fn positions(&self) -> impl Iterator<Item = &[f64]> {
        self.states.iter().map(|s| &s[..self.dim])
    }

    /// The last `n` entries of each state.
    pub fn velocities(&self) -> impl Iterator<Item = &[f64]> {
        self.states.iter().map(|s| &s[self.dim..])
    }

    /// State at the first sample.
    pub fn initial_state(&self) -> Option<&[f64]> {
        self.states.first().map(Vec::as_slice)
    }

    /// State at the last sample.
    pub fn final_state(&self) -> Option<&[f64]> {
        self.states.last().map(Vec::as_slice)
    }

    /// Export to a JSON string with keys `dim`, `times` and `states`.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
