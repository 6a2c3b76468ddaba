use super::{MIN_DISTANCE_SQ, pair_search};
use crate::core::forcefield::constraint::{Constraint, ConstraintError, Frame, TermOutput};
use crate::core::forcefield::kernel::{Contribution, Kernel};
use crate::core::forcefield::params::{ForcefieldParams, NonbondedParam};
use crate::core::forcefield::potentials::{combine_epsilon, combine_sigma, lennard_jones_12_6};
use crate::core::models::topology::{AdjacencyTable, Topology};
use nalgebra::Vector3;
use std::sync::Arc;
use tracing::debug;

const NAME: &str = "lennard-jones";

/// Truncated 12-6 Lennard-Jones over all non-excluded pairs within `cutoff_radius`.
///
/// Well depths combine by geometric mean and radii by arithmetic mean. Pairs in the scaling
/// table use the 1-4 parameter set of both particles instead of the regular one.
#[derive(Debug)]
pub struct LennardJones {
    params: Arc<ForcefieldParams>,
    kernel: Kernel,
    cutoff_radius: f64,
    per_particle: Vec<NonbondedParam>,
    exclusions: AdjacencyTable,
    scaling: AdjacencyTable,
    output: TermOutput,
}

impl LennardJones {
    pub fn new(params: Arc<ForcefieldParams>, cutoff_radius: f64, kernel: Kernel) -> Self {
        Self {
            params,
            kernel,
            cutoff_radius,
            per_particle: Vec::new(),
            exclusions: AdjacencyTable::default(),
            scaling: AdjacencyTable::default(),
            output: TermOutput::default(),
        }
    }
}

impl Constraint for LennardJones {
    fn name(&self) -> &'static str {
        NAME
    }

    fn bind(&mut self, topology: &Topology) -> Result<(), ConstraintError> {
        self.output.ensure_unbound(NAME)?;
        let dense = topology.dense()?;

        let per_particle = dense
            .particle_types
            .iter()
            .map(|particle_type| {
                self.params.nonbonded(particle_type).copied().ok_or_else(|| {
                    ConstraintError::MissingParameter {
                        term: NAME,
                        key: particle_type.clone(),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.per_particle = per_particle;
        self.exclusions = dense.bonded_particles.clone();
        self.scaling = dense.scaling_particles.clone();
        self.output.mark_bound(topology.num_particles());
        debug!(
            "Bound Lennard-Jones over {} particles (cutoff {} Å).",
            self.per_particle.len(),
            self.cutoff_radius
        );
        Ok(())
    }

    fn is_bound(&self) -> bool {
        self.output.is_bound()
    }

    fn cutoff_radius(&self) -> Option<f64> {
        Some(self.cutoff_radius)
    }

    fn update(&mut self, frame: &Frame<'_>) -> Result<(), ConstraintError> {
        self.output.check_frame(NAME, frame)?;
        let cutoff_sq = self.cutoff_radius * self.cutoff_radius;
        let (per_particle, exclusions, scaling) =
            (&self.per_particle, &self.exclusions, &self.scaling);

        let result = self.kernel.accumulate_pairs(
            frame.num_particles(),
            pair_search(frame, Some(self.cutoff_radius)),
            |i, j| {
                if exclusions.contains(i, j) {
                    return None;
                }
                let d = frame.displacement(i, j);
                let r_sq = d.norm_squared();
                if r_sq > cutoff_sq || r_sq < MIN_DISTANCE_SQ {
                    return None;
                }
                let (a, b) = (&per_particle[i], &per_particle[j]);
                let (epsilon, sigma) = if scaling.contains(i, j) {
                    (
                        combine_epsilon(a.epsilon14, b.epsilon14),
                        combine_sigma(a.sigma14, b.sigma14),
                    )
                } else {
                    (combine_epsilon(a.epsilon, b.epsilon), combine_sigma(a.sigma, b.sigma))
                };
                let r = r_sq.sqrt();
                let (energy, de_dr) = lennard_jones_12_6(r, sigma, epsilon);
                let f_i = d * (de_dr / r);
                Some(Contribution {
                    energy,
                    particles: [i, j],
                    forces: [f_i, -f_i],
                })
            },
        );
        self.output.store(result);
        Ok(())
    }

    fn forces(&self) -> Result<&[Vector3<f64>], ConstraintError> {
        self.output.forces(NAME)
    }

    fn potential_energy(&self) -> Result<f64, ConstraintError> {
        self.output.potential_energy(NAME)
    }
}
