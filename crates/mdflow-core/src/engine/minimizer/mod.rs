//! Local energy minimizers operating on an [`Ensemble`] in place.

pub mod steepest_descent;

use super::ensemble::{Ensemble, EnsembleError};
use super::state::StateError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MinimizerError {
    #[error("This minimizer does not implement minimize()")]
    NotImplemented,
    #[error("Invalid {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error("Ensemble error: {0}")]
    Ensemble(#[from] EnsembleError),
    #[error("State error: {0}")]
    State(#[from] StateError),
}

/// Outcome of a minimization run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinimizationReport {
    pub iterations: usize,
    pub initial_energy: f64,
    pub final_energy: f64,
    pub converged: bool,
}

pub trait Minimizer {
    /// Lowers the potential energy of `ensemble` until an accepted step improves it by less than
    /// `energy_tolerance` kcal/mol or `max_iterations` is reached.
    fn minimize(
        &mut self,
        ensemble: &mut Ensemble,
        energy_tolerance: f64,
        max_iterations: usize,
    ) -> Result<MinimizationReport, MinimizerError> {
        let _ = (ensemble, energy_tolerance, max_iterations);
        Err(MinimizerError::NotImplemented)
    }
}
