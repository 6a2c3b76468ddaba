use super::{MIN_DISTANCE_SQ, pair_search};
use crate::core::forcefield::constraint::{Constraint, ConstraintError, Frame, TermOutput};
use crate::core::forcefield::kernel::{Contribution, Kernel};
use crate::core::forcefield::potentials::coulomb;
use crate::core::models::topology::{AdjacencyTable, Topology};
use nalgebra::Vector3;
use tracing::debug;

const NAME: &str = "electrostatic";

/// Direct-space Coulomb interaction `k_e q_i q_j / r` between non-excluded pairs.
///
/// Without a cutoff every pair is evaluated (under the minimum image when a box is set). With a
/// cutoff, pairs are enumerated through the cell list and truncated at the cutoff. Pairs in the
/// scaling table are multiplied by their 1-4 factor.
#[derive(Debug)]
pub struct Electrostatic {
    kernel: Kernel,
    cutoff_radius: Option<f64>,
    charges: Vec<f64>,
    exclusions: AdjacencyTable,
    scaling: AdjacencyTable,
    output: TermOutput,
}

impl Electrostatic {
    /// Evaluates every non-excluded pair.
    pub fn new(kernel: Kernel) -> Self {
        Self::build(None, kernel)
    }

    /// Evaluates only pairs closer than `cutoff_radius`.
    pub fn with_cutoff(cutoff_radius: f64, kernel: Kernel) -> Self {
        Self::build(Some(cutoff_radius), kernel)
    }

    fn build(cutoff_radius: Option<f64>, kernel: Kernel) -> Self {
        Self {
            kernel,
            cutoff_radius,
            charges: Vec::new(),
            exclusions: AdjacencyTable::default(),
            scaling: AdjacencyTable::default(),
            output: TermOutput::default(),
        }
    }
}

impl Constraint for Electrostatic {
    fn name(&self) -> &'static str {
        NAME
    }

    fn bind(&mut self, topology: &Topology) -> Result<(), ConstraintError> {
        self.output.ensure_unbound(NAME)?;
        let dense = topology.dense()?;
        self.charges = dense.charges.clone();
        self.exclusions = dense.bonded_particles.clone();
        self.scaling = dense.scaling_particles.clone();
        self.output.mark_bound(topology.num_particles());
        debug!(
            "Bound electrostatics over {} particles (net charge {:.4} e).",
            self.charges.len(),
            self.charges.iter().sum::<f64>()
        );
        Ok(())
    }

    fn is_bound(&self) -> bool {
        self.output.is_bound()
    }

    fn cutoff_radius(&self) -> Option<f64> {
        self.cutoff_radius
    }

    fn update(&mut self, frame: &Frame<'_>) -> Result<(), ConstraintError> {
        self.output.check_frame(NAME, frame)?;
        let cutoff_sq = self.cutoff_radius.map_or(f64::INFINITY, |c| c * c);
        let (charges, exclusions, scaling) = (&self.charges, &self.exclusions, &self.scaling);

        let result = self.kernel.accumulate_pairs(
            frame.num_particles(),
            pair_search(frame, self.cutoff_radius),
            |i, j| {
                if exclusions.contains(i, j) || charges[i] == 0.0 || charges[j] == 0.0 {
                    return None;
                }
                let d = frame.displacement(i, j);
                let r_sq = d.norm_squared();
                if r_sq > cutoff_sq || r_sq < MIN_DISTANCE_SQ {
                    return None;
                }
                let factor = scaling.factor(i, j).unwrap_or(1.0);
                let r = r_sq.sqrt();
                let (energy, de_dr) = coulomb(r, charges[i], charges[j], factor);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::bonded::test_utils::{assert_forces_close, net_force};
    use crate::core::forcefield::nonbonded::test_utils::{PeriodicFixture, mixed_gas};
    use crate::core::models::particle::Particle;
    use crate::core::units::COULOMB_CONSTANT;

    const TOLERANCE: f64 = 1e-9;

    fn ion_pair() -> Topology {
        let mut topology = Topology::new();
        topology
            .add_particles([
                Particle::new(1, "Na", "NA", 22.99, 1.0),
                Particle::new(2, "Cl", "CL", 35.45, -1.0),
            ])
            .unwrap();
        topology.join();
        topology
    }

    fn evaluate(term: &mut Electrostatic, topology: &Topology, frame: &Frame<'_>) -> (Vec<Vector3<f64>>, f64) {
        term.bind(topology).unwrap();
        term.update(frame).unwrap();
        (term.forces().unwrap().to_vec(), term.potential_energy().unwrap())
    }

    #[test]
    fn ion_pair_attracts_with_coulomb_energy() {
        let positions = [Vector3::zeros(), Vector3::new(0.0, 2.8, 0.0)];
        let mut term = Electrostatic::new(Kernel::Host);
        let (forces, energy) = evaluate(&mut term, &ion_pair(), &Frame::open(&positions));

        assert!((energy + COULOMB_CONSTANT / 2.8).abs() < TOLERANCE);
        assert!((forces[0].y - COULOMB_CONSTANT / (2.8 * 2.8)).abs() < TOLERANCE);
        assert!((forces[0] + forces[1]).norm() < TOLERANCE);
        assert_eq!(term.cutoff_radius(), None);
    }

    #[test]
    fn one_four_pairs_are_scaled_and_bonded_pairs_excluded() {
        let mut topology = Topology::new();
        topology
            .add_particles((0..4).map(|i| Particle::new(i, "C", "C", 12.0, if i % 2 == 0 { 0.5 } else { -0.5 })))
            .unwrap();
        topology.add_bond(&[0, 1]).unwrap();
        topology.add_bond(&[1, 2]).unwrap();
        topology.add_bond(&[2, 3]).unwrap();
        topology.add_angle(&[0, 1, 2]).unwrap();
        topology.add_angle(&[1, 2, 3]).unwrap();
        topology.add_dihedral_with_scaling(&[0, 1, 2, 3], 0.5).unwrap();
        topology.join();

        let positions = [
            Vector3::zeros(),
            Vector3::new(1.5, 0.0, 0.0),
            Vector3::new(2.0, 1.4, 0.0),
            Vector3::new(3.0, 1.4, 1.0),
        ];
        let mut term = Electrostatic::new(Kernel::Host);
        let (_, energy) = evaluate(&mut term, &topology, &Frame::open(&positions));

        let r03 = positions[3].norm();
        let expected = COULOMB_CONSTANT * 0.5 * -0.5 * 0.5 / r03;
        assert!((energy - expected).abs() < TOLERANCE);
    }

    #[test]
    fn cutoff_truncates_distant_pairs() {
        let positions = [Vector3::zeros(), Vector3::new(0.0, 9.0, 0.0)];
        let mut term = Electrostatic::with_cutoff(8.0, Kernel::Host);
        let (forces, energy) = evaluate(&mut term, &ion_pair(), &Frame::open(&positions));
        assert_eq!(energy, 0.0);
        assert!(forces.iter().all(|f| f.norm() == 0.0));
    }

    #[test]
    fn uncut_periodic_sum_uses_minimum_image() {
        let fixture = PeriodicFixture::new(
            vec![Vector3::new(1.0, 1.0, 1.0), Vector3::new(14.0, 1.0, 1.0)],
            15.0,
            0.0,
        );
        let mut term = Electrostatic::new(Kernel::Host);
        let (_, energy) = evaluate(&mut term, &ion_pair(), &fixture.frame());
        assert!((energy + COULOMB_CONSTANT / 2.0).abs() < TOLERANCE);
    }

    #[test]
    fn cell_list_path_matches_all_pairs_within_cutoff() {
        let (topology, positions) = mixed_gas(64, 20.0, 3);
        let fixture = PeriodicFixture::new(positions, 20.0, 6.0);

        let mut with_cells = Electrostatic::with_cutoff(6.0, Kernel::Host);
        let mut without_cells = Electrostatic::with_cutoff(6.0, Kernel::Host);
        let (cell_forces, cell_energy) = evaluate(&mut with_cells, &topology, &fixture.frame());
        let (pair_forces, pair_energy) =
            evaluate(&mut without_cells, &topology, &fixture.frame_without_cells());

        assert!((cell_energy - pair_energy).abs() <= 1e-9 * pair_energy.abs().max(1.0));
        assert_forces_close(&cell_forces, &pair_forces, 1e-9);
        assert!(net_force(&cell_forces).norm() < 1e-8);
    }

    #[test]
    fn host_and_accelerator_kernels_agree() {
        let (topology, positions) = mixed_gas(27, 15.0, 9);
        let fixture = PeriodicFixture::new(positions, 15.0, 5.0);
        for cutoff in [None, Some(5.0)] {
            let (mut host, mut accelerator) = match cutoff {
                Some(c) => (
                    Electrostatic::with_cutoff(c, Kernel::Host),
                    Electrostatic::with_cutoff(c, Kernel::Accelerator),
                ),
                None => (
                    Electrostatic::new(Kernel::Host),
                    Electrostatic::new(Kernel::Accelerator),
                ),
            };
            let (host_forces, host_energy) = evaluate(&mut host, &topology, &fixture.frame());
            let (acc_forces, acc_energy) = evaluate(&mut accelerator, &topology, &fixture.frame());
            assert!((host_energy - acc_energy).abs() <= 1e-6 * host_energy.abs().max(1.0));
            assert_forces_close(&host_forces, &acc_forces, 1e-6);
        }
    }
}
