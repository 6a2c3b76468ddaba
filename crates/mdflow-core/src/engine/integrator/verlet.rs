use super::{
    Integrator, IntegratorError, accelerations, check_history_len, check_positive, minimum_image,
    wrap,
};
use crate::engine::ensemble::Ensemble;
use nalgebra::Vector3;
use tracing::debug;

/// Position (Störmer) Verlet: `x(t+Δt) = x(t) + [x(t) - x(t-Δt)] + a(t) Δt²`.
///
/// The first call seeds the history with `x(-Δt) = x(0) - v(0) Δt + ½ a(0) Δt²`. Differences
/// between successive positions are taken under the minimum image, so wrapping positions into the
/// box never breaks the recurrence. Velocities are written back once per call as the central
/// difference `[x(T) - x(T-2Δt)] / 2Δt`, which lags the final positions by one step.
#[derive(Debug, Clone)]
pub struct Verlet {
    time_step: f64,
    previous_positions: Option<Vec<Vector3<f64>>>,
}

impl Verlet {
    pub fn new(time_step: f64) -> Result<Self, IntegratorError> {
        Ok(Self {
            time_step: check_positive("time step", time_step)?,
            previous_positions: None,
        })
    }
}

impl Integrator for Verlet {
    fn time_step(&self) -> f64 {
        self.time_step
    }

    fn integrate(&mut self, ensemble: &mut Ensemble, num_steps: usize) -> Result<(), IntegratorError> {
        check_history_len(self.previous_positions.as_ref(), ensemble.num_particles())?;
        if num_steps == 0 {
            return Ok(());
        }
        let dt = self.time_step;
        let dt_sq = dt * dt;

        let mut previous = match self.previous_positions.take() {
            Some(previous) => previous,
            None => {
                ensemble.update()?;
                let a = accelerations(ensemble);
                let state = ensemble.state();
                state
                    .positions()
                    .iter()
                    .zip(state.velocities())
                    .zip(&a)
                    .map(|((x, v), a)| x - v * dt + a * (0.5 * dt_sq))
                    .collect()
            }
        };
        let mut before_previous = previous.clone();

        for _ in 0..num_steps {
            let a = accelerations(ensemble);
            let state = ensemble.state();
            let current = state.positions().to_vec();
            let next: Vec<_> = current
                .iter()
                .zip(&previous)
                .zip(&a)
                .map(|((x, p), a)| wrap(state, x + minimum_image(state, x - p) + a * dt_sq))
                .collect();
            ensemble.state_mut().set_positions(&next)?;
            ensemble.update()?;
            before_previous = std::mem::replace(&mut previous, current);
        }

        let state = ensemble.state();
        let velocities: Vec<_> = state
            .positions()
            .iter()
            .zip(&before_previous)
            .map(|(x, p)| minimum_image(state, x - p) / (2.0 * dt))
            .collect();
        ensemble.state_mut().set_velocities(&velocities)?;
        ensemble.refresh_kinetic_energy();
        self.previous_positions = Some(previous);

        debug!(
            "Verlet advanced {} step(s); total energy {:.6} kcal/mol.",
            num_steps,
            ensemble.total_energy()
        );
        Ok(())
    }

    fn reset(&mut self) {
        self.previous_positions = None;
    }
}
