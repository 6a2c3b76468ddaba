//! Time integrators that advance an [`Ensemble`] by a number of fixed-size steps.
//!
//! Integrators keep history between calls (previous positions, accelerations, noise). Call
//! [`Integrator::reset`] after changing positions or velocities from outside, or after handing
//! the integrator a different ensemble.

pub mod langevin;
pub mod verlet;

use super::ensemble::{Ensemble, EnsembleError};
use super::state::{State, StateError};
use crate::core::units::acceleration;
use nalgebra::Vector3;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IntegratorError {
    #[error("Integrator history holds {expected} particles but the ensemble has {found}; call reset()")]
    ParticleCountChanged { expected: usize, found: usize },
    #[error("Invalid {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error("Ensemble error: {0}")]
    Ensemble(#[from] EnsembleError),
    #[error("State error: {0}")]
    State(#[from] StateError),
}

pub trait Integrator {
    /// Step size in fs.
    fn time_step(&self) -> f64;

    /// Advances `ensemble` by `num_steps` steps. On return the ensemble's forces and energies
    /// correspond to the final positions.
    fn integrate(&mut self, ensemble: &mut Ensemble, num_steps: usize) -> Result<(), IntegratorError>;

    /// Discards all history carried between calls.
    fn reset(&mut self);
}

pub(crate) fn check_positive(name: &'static str, value: f64) -> Result<f64, IntegratorError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(IntegratorError::InvalidParameter { name, value })
    }
}

pub(crate) fn check_non_negative(name: &'static str, value: f64) -> Result<f64, IntegratorError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(IntegratorError::InvalidParameter { name, value })
    }
}

pub(crate) fn check_history_len<T>(
    history: Option<&Vec<T>>,
    found: usize,
) -> Result<(), IntegratorError> {
    match history {
        Some(h) if h.len() != found => Err(IntegratorError::ParticleCountChanged {
            expected: h.len(),
            found,
        }),
        _ => Ok(()),
    }
}

/// Per-particle accelerations in Å/fs² from the ensemble's current forces.
pub(crate) fn accelerations(ensemble: &Ensemble) -> Vec<Vector3<f64>> {
    ensemble
        .forces()
        .iter()
        .zip(ensemble.state().masses())
        .map(|(f, &m)| f.map(|c| acceleration(c, m)))
        .collect()
}

/// Minimum image of `d` under the state's box, or `d` itself without one.
pub(crate) fn minimum_image(state: &State, d: Vector3<f64>) -> Vector3<f64> {
    match state.pbc() {
        Some(pbc) => pbc.minimum_image(&d),
        None => d,
    }
}

pub(crate) fn wrap(state: &State, position: Vector3<f64>) -> Vector3<f64> {
    match state.pbc() {
        Some(pbc) => pbc.wrap(&position),
        None => position,
    }
}
