use super::{MinimizationReport, Minimizer, MinimizerError};
use crate::engine::ensemble::Ensemble;
use nalgebra::Vector3;
use tracing::{debug, info};

const STEP_GROWTH: f64 = 1.2;
const STEP_SHRINK: f64 = 0.5;
const MIN_STEP: f64 = 1e-10;

/// Steepest descent with an adaptive step length.
///
/// Each trial moves every particle along its force, scaled so the largest displacement equals
/// the current step length (Å). A trial is accepted only when it strictly lowers the potential
/// energy, after which the step grows; otherwise positions are restored and the step shrinks.
#[derive(Debug, Clone)]
pub struct SteepestDescent {
    initial_step: f64,
}

impl SteepestDescent {
    pub fn new(initial_step: f64) -> Result<Self, MinimizerError> {
        if !initial_step.is_finite() || initial_step <= 0.0 {
            return Err(MinimizerError::InvalidParameter {
                name: "initial step",
                value: initial_step,
            });
        }
        Ok(Self { initial_step })
    }
}

impl Default for SteepestDescent {
    fn default() -> Self {
        Self { initial_step: 0.01 }
    }
}

impl Minimizer for SteepestDescent {
    fn minimize(
        &mut self,
        ensemble: &mut Ensemble,
        energy_tolerance: f64,
        max_iterations: usize,
    ) -> Result<MinimizationReport, MinimizerError> {
        ensemble.update()?;
        let initial_energy = ensemble.potential_energy();
        let mut energy = initial_energy;
        let mut step = self.initial_step;
        let mut converged = false;
        let mut iterations = 0;

        while iterations < max_iterations {
            iterations += 1;
            let max_force = ensemble
                .forces()
                .iter()
                .map(Vector3::norm)
                .fold(0.0, f64::max);
            if max_force == 0.0 {
                converged = true;
                break;
            }

            let current = ensemble.state().positions().to_vec();
            let scale = step / max_force;
            let trial: Vec<_> = current
                .iter()
                .zip(ensemble.forces())
                .map(|(x, f)| x + f * scale)
                .collect();
            ensemble.state_mut().set_positions(&trial)?;
            ensemble.update()?;
            let trial_energy = ensemble.potential_energy();

            if trial_energy < energy {
                let improvement = energy - trial_energy;
                energy = trial_energy;
                step *= STEP_GROWTH;
                if improvement < energy_tolerance {
                    converged = true;
                    break;
                }
            } else {
                ensemble.state_mut().set_positions(&current)?;
                ensemble.update()?;
                step *= STEP_SHRINK;
                if step < MIN_STEP {
                    debug!("Step length fell below {MIN_STEP} Å; stopping.");
                    converged = true;
                    break;
                }
            }
        }

        info!(
            iterations,
            initial_energy,
            final_energy = energy,
            converged,
            "Steepest descent finished."
        );
        Ok(MinimizationReport {
            iterations,
            initial_energy,
            final_energy: energy,
            converged,
        })
    }
}
