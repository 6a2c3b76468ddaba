use super::stretch;
use crate::core::forcefield::constraint::{Constraint, ConstraintError, Frame, TermOutput};
use crate::core::forcefield::kernel::{Contribution, Kernel};
use crate::core::forcefield::params::{BondParam, ForcefieldParams, type_key};
use crate::core::models::topology::Topology;
use nalgebra::Vector3;
use std::sync::Arc;
use tracing::debug;

const NAME: &str = "bond";

/// Harmonic bond stretching, `E = k (r - r0)²`, over every bond of the topology.
#[derive(Debug)]
pub struct HarmonicBond {
    params: Arc<ForcefieldParams>,
    kernel: Kernel,
    bonds: Vec<[usize; 2]>,
    values: Vec<BondParam>,
    output: TermOutput,
}

impl HarmonicBond {
    pub fn new(params: Arc<ForcefieldParams>, kernel: Kernel) -> Self {
        Self {
            params,
            kernel,
            bonds: Vec::new(),
            values: Vec::new(),
            output: TermOutput::default(),
        }
    }
}

impl Constraint for HarmonicBond {
    fn name(&self) -> &'static str {
        NAME
    }

    fn bind(&mut self, topology: &Topology) -> Result<(), ConstraintError> {
        self.output.ensure_unbound(NAME)?;
        let types = &topology.dense()?.particle_types;

        let values = topology
            .bonds()
            .iter()
            .map(|&[i, j]| {
                let key = [types[i].as_str(), types[j].as_str()];
                self.params
                    .bond(key)
                    .copied()
                    .ok_or_else(|| ConstraintError::MissingParameter {
                        term: NAME,
                        key: type_key(&key),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.bonds = topology.bonds().to_vec();
        self.values = values;
        self.output.mark_bound(topology.num_particles());
        debug!("Bound {} bond(s).", self.bonds.len());
        Ok(())
    }

    fn is_bound(&self) -> bool {
        self.output.is_bound()
    }

    fn update(&mut self, frame: &Frame<'_>) -> Result<(), ConstraintError> {
        self.output.check_frame(NAME, frame)?;
        let (bonds, values) = (&self.bonds, &self.values);
        let result = self
            .kernel
            .accumulate(frame.num_particles(), bonds.len(), |n| {
                let [i, j] = bonds[n];
                let (energy, forces) = stretch(frame, i, j, values[n].k, values[n].r0);
                Some(Contribution {
                    energy,
                    particles: [i, j],
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::bonded::test_utils::*;
    use crate::core::models::particle::Particle;

    const TOLERANCE: f64 = 1e-9;

    fn params() -> Arc<ForcefieldParams> {
        let mut params = ForcefieldParams::default();
        params
            .bond
            .insert("C-C".to_string(), BondParam { k: 305.0, r0: 1.375 });
        params
            .bond
            .insert("C-H".to_string(), BondParam { k: 340.0, r0: 1.09 });
        Arc::new(params)
    }

    fn diatomic() -> Topology {
        let mut topology = Topology::new();
        topology
            .add_particles([
                Particle::new(1, "C", "C1", 12.011, 0.0),
                Particle::new(2, "C", "C2", 12.011, 0.0),
            ])
            .unwrap();
        topology.add_bond(&[0, 1]).unwrap();
        topology.join();
        topology
    }

    fn methyl() -> Topology {
        let mut topology = Topology::new();
        topology
            .add_particles([
                Particle::new(1, "C", "C", 12.011, 0.0),
                Particle::new(2, "H", "H1", 1.008, 0.0),
                Particle::new(3, "H", "H2", 1.008, 0.0),
                Particle::new(4, "H", "H3", 1.008, 0.0),
            ])
            .unwrap();
        for h in 1..4 {
            topology.add_bond(&[0, h]).unwrap();
        }
        topology.join();
        topology
    }

    fn methyl_positions() -> Vec<Vector3<f64>> {
        vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.2, 0.1, -0.05),
            Vector3::new(-0.4, 0.95, 0.2),
            Vector3::new(-0.3, -0.5, 0.98),
        ]
    }

    #[test]
    fn compressed_bond_matches_reference_values() {
        let mut term = HarmonicBond::new(params(), Kernel::Host);
        term.bind(&diatomic()).unwrap();
        let positions = [Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0)];
        term.update(&Frame::open(&positions)).unwrap();

        let energy = term.potential_energy().unwrap();
        assert!((energy - 305.0 * (1.0f64 - 1.375).powi(2)).abs() < TOLERANCE);

        let forces = term.forces().unwrap();
        let magnitude = 2.0 * 305.0 * (1.0 - 1.375);
        assert!((forces[0] - Vector3::new(magnitude, 0.0, 0.0)).norm() < TOLERANCE);
        assert!((forces[1] + forces[0]).norm() < TOLERANCE);
        assert!(forces[0].x < 0.0, "compressed bond pushes the particles apart");
    }

    #[test]
    fn forces_sum_to_zero_and_match_energy_gradient() {
        let topology = methyl();
        let positions = methyl_positions();
        let mut term = HarmonicBond::new(params(), Kernel::Host);
        term.bind(&topology).unwrap();
        term.update(&Frame::open(&positions)).unwrap();
        let forces = term.forces().unwrap().to_vec();

        assert!(net_force(&forces).norm() < FORCE_TOLERANCE);

        let energy_of = |x: &[Vector3<f64>]| {
            let mut probe = HarmonicBond::new(params(), Kernel::Host);
            probe.bind(&topology).unwrap();
            probe.update(&Frame::open(x)).unwrap();
            probe.potential_energy().unwrap()
        };
        for particle in 0..4 {
            for axis in 0..3 {
                let numeric = numeric_force(&positions, particle, axis, &energy_of);
                assert!((numeric - forces[particle][axis]).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn host_and_accelerator_kernels_agree() {
        let topology = methyl();
        let positions = methyl_positions();
        let mut host = HarmonicBond::new(params(), Kernel::Host);
        let mut accelerator = HarmonicBond::new(params(), Kernel::Accelerator);
        host.bind(&topology).unwrap();
        accelerator.bind(&topology).unwrap();
        host.update(&Frame::open(&positions)).unwrap();
        accelerator.update(&Frame::open(&positions)).unwrap();

        assert_forces_close(host.forces().unwrap(), accelerator.forces().unwrap(), 1e-6);
        let (eh, ea) = (
            host.potential_energy().unwrap(),
            accelerator.potential_energy().unwrap(),
        );
        assert!((eh - ea).abs() <= 1e-6 * eh.abs().max(1.0));
    }

    #[test]
    fn unbound_term_rejects_access() {
        let mut term = HarmonicBond::new(params(), Kernel::Host);
        let positions = [Vector3::zeros(); 2];
        assert_eq!(
            term.update(&Frame::open(&positions)),
            Err(ConstraintError::NotBound { term: "bond" })
        );
        assert!(term.forces().is_err());
        assert!(term.potential_energy().is_err());
    }

    #[test]
    fn bind_twice_fails() {
        let topology = diatomic();
        let mut term = HarmonicBond::new(params(), Kernel::Host);
        term.bind(&topology).unwrap();
        assert_eq!(
            term.bind(&topology),
            Err(ConstraintError::AlreadyBound { term: "bond" })
        );
    }

    #[test]
    fn bind_requires_joined_topology_and_known_types() {
        let mut topology = diatomic();
        topology.split();
        let mut term = HarmonicBond::new(params(), Kernel::Host);
        assert!(matches!(
            term.bind(&topology),
            Err(ConstraintError::Topology(_))
        ));

        let mut topology = Topology::new();
        topology
            .add_particles([
                Particle::new(1, "C", "C", 12.0, 0.0),
                Particle::new(2, "N", "N", 14.0, 0.0),
            ])
            .unwrap();
        topology.add_bond(&[0, 1]).unwrap();
        topology.join();
        assert_eq!(
            term.bind(&topology),
            Err(ConstraintError::MissingParameter {
                term: "bond",
                key: "C-N".to_string()
            })
        );
        assert!(!term.is_bound());
    }
}
