use super::torsion;
use crate::core::forcefield::constraint::{Constraint, ConstraintError, Frame, TermOutput};
use crate::core::forcefield::kernel::{Contribution, Kernel};
use crate::core::forcefield::params::{DihedralTerm, ForcefieldParams, type_key};
use crate::core::forcefield::potentials::periodic_torsion;
use crate::core::models::topology::Topology;
use nalgebra::Vector3;
use std::sync::Arc;
use tracing::debug;

const NAME: &str = "dihedral";

/// Proper torsions, `E = Σ k (1 + cos(n φ - δ))`, with any number of cosine terms per quadruple.
#[derive(Debug)]
pub struct PeriodicTorsion {
    params: Arc<ForcefieldParams>,
    kernel: Kernel,
    dihedrals: Vec<[usize; 4]>,
    series: Vec<Vec<DihedralTerm>>,
    output: TermOutput,
}

impl PeriodicTorsion {
    pub fn new(params: Arc<ForcefieldParams>, kernel: Kernel) -> Self {
        Self {
            params,
            kernel,
            dihedrals: Vec::new(),
            series: Vec::new(),
            output: TermOutput::default(),
        }
    }
}

impl Constraint for PeriodicTorsion {
    fn name(&self) -> &'static str {
        NAME
    }

    fn bind(&mut self, topology: &Topology) -> Result<(), ConstraintError> {
        self.output.ensure_unbound(NAME)?;
        let types = &topology.dense()?.particle_types;

        let dihedrals: Vec<[usize; 4]> = topology.dihedrals().iter().map(|d| d.particles).collect();
        let series = dihedrals
            .iter()
            .map(|quad| {
                let key = quad.map(|p| types[p].as_str());
                self.params
                    .dihedral(key)
                    .map(<[DihedralTerm]>::to_vec)
                    .ok_or_else(|| ConstraintError::MissingParameter {
                        term: NAME,
                        key: type_key(&key),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            "Bound {} dihedral(s) with {} cosine term(s).",
            dihedrals.len(),
            series.iter().map(Vec::len).sum::<usize>()
        );
        self.dihedrals = dihedrals;
        self.series = series;
        self.output.mark_bound(topology.num_particles());
        Ok(())
    }

    fn is_bound(&self) -> bool {
        self.output.is_bound()
    }

    fn update(&mut self, frame: &Frame<'_>) -> Result<(), ConstraintError> {
        self.output.check_frame(NAME, frame)?;
        let (dihedrals, series) = (&self.dihedrals, &self.series);
        let result = self
            .kernel
            .accumulate(frame.num_particles(), dihedrals.len(), |n| {
                let (energy, forces) =
                    torsion(frame, dihedrals[n], |phi| periodic_torsion(phi, &series[n]));
                Some(Contribution {
                    energy,
                    particles: dihedrals[n],
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
