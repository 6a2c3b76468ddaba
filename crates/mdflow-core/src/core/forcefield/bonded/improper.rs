use super::torsion;
use crate::core::forcefield::constraint::{Constraint, ConstraintError, Frame, TermOutput};
use crate::core::forcefield::kernel::{Contribution, Kernel};
use crate::core::forcefield::params::{ForcefieldParams, ImproperParam, type_key};
use crate::core::forcefield::potentials::harmonic_periodic;
use crate::core::models::topology::Topology;
use nalgebra::Vector3;
use std::sync::Arc;
use tracing::debug;

const NAME: &str = "improper";

/// Harmonic out-of-plane restraint `E = k (ψ - ψ0)²`, where `ψ` is the torsion angle of the
/// quadruple as written.
#[derive(Debug)]
pub struct HarmonicImproper {
    params: Arc<ForcefieldParams>,
    kernel: Kernel,
    impropers: Vec<[usize; 4]>,
    values: Vec<ImproperParam>,
    output: TermOutput,
}

impl HarmonicImproper {
    pub fn new(params: Arc<ForcefieldParams>, kernel: Kernel) -> Self {
        Self {
            params,
            kernel,
            impropers: Vec::new(),
            values: Vec::new(),
            output: TermOutput::default(),
        }
    }
}

impl Constraint for HarmonicImproper {
    fn name(&self) -> &'static str {
        NAME
    }

    fn bind(&mut self, topology: &Topology) -> Result<(), ConstraintError> {
        self.output.ensure_unbound(NAME)?;
        let types = &topology.dense()?.particle_types;

        let values = topology
            .impropers()
            .iter()
            .map(|quad| {
                let key = quad.map(|p| types[p].as_str());
                self.params
                    .improper(key)
                    .copied()
                    .ok_or_else(|| ConstraintError::MissingParameter {
                        term: NAME,
                        key: type_key(&key),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.impropers = topology.impropers().to_vec();
        self.values = values;
        self.output.mark_bound(topology.num_particles());
        debug!("Bound {} improper(s).", self.impropers.len());
        Ok(())
    }

    fn is_bound(&self) -> bool {
        self.output.is_bound()
    }

    fn update(&mut self, frame: &Frame<'_>) -> Result<(), ConstraintError> {
        self.output.check_frame(NAME, frame)?;
        let (impropers, values) = (&self.impropers, &self.values);
        let result = self
            .kernel
            .accumulate(frame.num_particles(), impropers.len(), |n| {
                let param = values[n];
                let (energy, forces) = torsion(frame, impropers[n], |psi| {
                    harmonic_periodic(psi, param.psi0, param.k)
                });
                Some(Contribution {
                    energy,
                    particles: impropers[n],
                    forces,
                })
            });
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
