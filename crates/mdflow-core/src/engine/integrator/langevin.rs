use super::{
    Integrator, IntegratorError, check_history_len, check_non_negative, check_positive, wrap,
};
use crate::core::units::thermal_velocity_variance;
use crate::engine::ensemble::Ensemble;
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tracing::debug;

#[derive(Debug, Clone)]
struct History {
    accelerations: Vec<Vector3<f64>>,
    noise: Vec<Vector3<f64>>,
}

/// Brünger-Brooks-Karplus Langevin dynamics.
///
/// Each step performs
///
/// ```text
/// v(t+½) = v(t) + ½Δt [a(t) - γ v(t) + R(t)]
/// x(t+Δt) = x(t) + Δt v(t+½)
/// v(t+Δt) = [v(t+½) + ½Δt (a(t+Δt) + R(t+Δt))] / (1 + ½γΔt)
/// ```
///
/// where every component of the random acceleration `R` is Gaussian with variance
/// `2 γ k_B T / (m Δt)`. With zero friction the noise vanishes and the scheme reduces to
/// velocity Verlet. The random stream is seeded, so runs are reproducible.
#[derive(Debug, Clone)]
pub struct Langevin {
    time_step: f64,
    temperature: f64,
    friction: f64,
    rng: StdRng,
    history: Option<History>,
}

impl Langevin {
    /// `time_step` in fs, `temperature` in K, `friction` in 1/fs.
    pub fn new(time_step: f64, temperature: f64, friction: f64, seed: u64) -> Result<Self, IntegratorError> {
        Ok(Self {
            time_step: check_positive("time step", time_step)?,
            temperature: check_non_negative("temperature", temperature)?,
            friction: check_non_negative("friction", friction)?,
            rng: StdRng::seed_from_u64(seed),
            history: None,
        })
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn friction(&self) -> f64 {
        self.friction
    }

    fn draw_noise(&mut self, masses: &[f64]) -> Vec<Vector3<f64>> {
        if self.friction == 0.0 || self.temperature == 0.0 {
            return vec![Vector3::zeros(); masses.len()];
        }
        let scale = 2.0 * self.friction / self.time_step;
        masses
            .iter()
            .map(|&m| {
                let sigma = (scale * thermal_velocity_variance(self.temperature, m)).sqrt();
                Vector3::from_fn(|_, _| sigma * self.rng.sample::<f64, _>(StandardNormal))
            })
            .collect()
    }
}

impl Integrator for Langevin {
    fn time_step(&self) -> f64 {
        self.time_step
    }

    fn integrate(&mut self, ensemble: &mut Ensemble, num_steps: usize) -> Result<(), IntegratorError> {
        check_history_len(
            self.history.as_ref().map(|h| &h.accelerations),
            ensemble.num_particles(),
        )?;
        if num_steps == 0 {
            return Ok(());
        }
        let masses = ensemble.state().masses().to_vec();
        let dt = self.time_step;
        let half_dt = 0.5 * dt;
        let gamma = self.friction;
        let damping = 1.0 / (1.0 + gamma * half_dt);

        let History {
            mut accelerations,
            mut noise,
        } = match self.history.take() {
            Some(history) => history,
            None => {
                ensemble.update()?;
                History {
                    accelerations: super::accelerations(ensemble),
                    noise: self.draw_noise(&masses),
                }
            }
        };

        for _ in 0..num_steps {
            let state = ensemble.state();
            let half_step: Vec<_> = state
                .velocities()
                .iter()
                .zip(&accelerations)
                .zip(&noise)
                .map(|((v, a), r)| v + (a - v * gamma + r) * half_dt)
                .collect();
            let next: Vec<_> = state
                .positions()
                .iter()
                .zip(&half_step)
                .map(|(x, v)| wrap(state, x + v * dt))
                .collect();
            ensemble.state_mut().set_positions(&next)?;
            ensemble.update()?;

            accelerations = super::accelerations(ensemble);
            noise = self.draw_noise(&masses);
            let velocities: Vec<_> = half_step
                .iter()
                .zip(&accelerations)
                .zip(&noise)
                .map(|((v, a), r)| (v + (a + r) * half_dt) * damping)
                .collect();
            ensemble.state_mut().set_velocities(&velocities)?;
        }

        ensemble.refresh_kinetic_energy();
        self.history = Some(History {
            accelerations,
            noise,
        });
        debug!(
            "Langevin advanced {} step(s); temperature {:.2} K.",
            num_steps,
            ensemble.temperature()
        );
        Ok(())
    }

    fn reset(&mut self) {
        self.history = None;
    }
}
