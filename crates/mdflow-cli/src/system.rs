use crate::error::Result;
use mdflow::core::forcefield::bonded::angle::HarmonicAngle;
use mdflow::core::forcefield::bonded::bond::HarmonicBond;
use mdflow::core::forcefield::bonded::dihedral::PeriodicTorsion;
use mdflow::core::forcefield::bonded::improper::HarmonicImproper;
use mdflow::core::forcefield::constraint::Constraint;
use mdflow::core::forcefield::kernel::Kernel;
use mdflow::core::forcefield::nonbonded::electrostatic::Electrostatic;
use mdflow::core::forcefield::nonbonded::lennard_jones::LennardJones;
use mdflow::core::forcefield::params::ForcefieldParams;
use mdflow::core::models::particle::Particle;
use mdflow::core::models::topology::Topology;
use nalgebra::{Matrix3, Vector3};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ParticleSpec {
    /// Defaults to the 1-based position in the particle list.
    pub id: Option<i64>,
    #[serde(rename = "type")]
    pub particle_type: String,
    /// Defaults to the particle type.
    pub name: Option<String>,
    pub mass: f64,
    #[serde(default)]
    pub charge: f64,
    pub position: [f64; 3],
    pub velocity: Option<[f64; 3]>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum DihedralSpec {
    Plain([usize; 4]),
    Scaled { particles: [usize; 4], scaling: f64 },
}

/// Particles, connectivity and box of the simulated system. Connectivity refers to particles
/// by their 0-based position in `particles`.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SystemSpec {
    /// Box vectors, one per row.
    #[serde(rename = "box")]
    pub box_vectors: Option<[[f64; 3]; 3]>,
    pub particles: Vec<ParticleSpec>,
    #[serde(default)]
    pub bonds: Vec<[usize; 2]>,
    #[serde(default)]
    pub angles: Vec<[usize; 3]>,
    #[serde(default)]
    pub dihedrals: Vec<DihedralSpec>,
    #[serde(default)]
    pub impropers: Vec<[usize; 4]>,
}

#[derive(Debug)]
pub struct BuiltSystem {
    pub topology: Topology,
    pub positions: Vec<Vector3<f64>>,
    pub velocities: Option<Vec<Vector3<f64>>>,
    /// Box vectors as matrix columns.
    pub pbc: Option<Matrix3<f64>>,
}

impl SystemSpec {
    pub fn build(&self) -> Result<BuiltSystem> {
        let mut topology = Topology::new();
        topology.add_particles(self.particles.iter().enumerate().map(|(i, p)| {
            Particle::new(
                p.id.unwrap_or(i as i64 + 1),
                &p.particle_type,
                p.name.as_deref().unwrap_or(&p.particle_type),
                p.mass,
                p.charge,
            )
        }))?;
        for bond in &self.bonds {
            topology.add_bond(bond)?;
        }
        for angle in &self.angles {
            topology.add_angle(angle)?;
        }
        for dihedral in &self.dihedrals {
            match dihedral {
                DihedralSpec::Plain(particles) => topology.add_dihedral(particles)?,
                DihedralSpec::Scaled { particles, scaling } => {
                    topology.add_dihedral_with_scaling(particles, *scaling)?
                }
            }
        }
        for improper in &self.impropers {
            topology.add_improper(improper)?;
        }
        topology.join();

        let positions = self
            .particles
            .iter()
            .map(|p| Vector3::from(p.position))
            .collect();
        let velocities = self
            .particles
            .iter()
            .any(|p| p.velocity.is_some())
            .then(|| {
                self.particles
                    .iter()
                    .map(|p| p.velocity.map_or_else(Vector3::zeros, Vector3::from))
                    .collect()
            });
        let pbc = self.box_vectors.map(|rows| {
            Matrix3::from_columns(&[
                Vector3::from(rows[0]),
                Vector3::from(rows[1]),
                Vector3::from(rows[2]),
            ])
        });

        debug!(
            "Built topology: {} particles, {} bonds, {} angles, {} dihedrals, {} impropers.",
            topology.num_particles(),
            topology.num_bonds(),
            topology.num_angles(),
            topology.num_dihedrals(),
            topology.num_impropers()
        );
        Ok(BuiltSystem {
            topology,
            positions,
            velocities,
            pbc,
        })
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LennardJonesSpec {
    pub cutoff: f64,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ElectrostaticSpec {
    /// Without a cutoff every non-excluded pair is evaluated.
    pub cutoff: Option<f64>,
}

/// Which force-field terms act on the system.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TermsSpec {
    /// Adds one term per connectivity kind present in the topology.
    #[serde(default = "enabled")]
    pub bonded: bool,
    pub lennard_jones: Option<LennardJonesSpec>,
    pub electrostatic: Option<ElectrostaticSpec>,
}

fn enabled() -> bool {
    true
}

impl Default for TermsSpec {
    fn default() -> Self {
        Self {
            bonded: true,
            lennard_jones: None,
            electrostatic: None,
        }
    }
}

impl TermsSpec {
    pub fn build(
        &self,
        topology: &Topology,
        params: &Arc<ForcefieldParams>,
        kernel: Kernel,
    ) -> Vec<Box<dyn Constraint>> {
        let mut terms: Vec<Box<dyn Constraint>> = Vec::new();
        if self.bonded {
            if topology.num_bonds() > 0 {
                terms.push(Box::new(HarmonicBond::new(params.clone(), kernel)));
            }
            if topology.num_angles() > 0 {
                terms.push(Box::new(HarmonicAngle::new(params.clone(), kernel)));
            }
            if topology.num_dihedrals() > 0 {
                terms.push(Box::new(PeriodicTorsion::new(params.clone(), kernel)));
            }
            if topology.num_impropers() > 0 {
                terms.push(Box::new(HarmonicImproper::new(params.clone(), kernel)));
            }
        }
        if let Some(lj) = self.lennard_jones {
            terms.push(Box::new(LennardJones::new(params.clone(), lj.cutoff, kernel)));
        }
        if let Some(es) = self.electrostatic {
            terms.push(Box::new(match es.cutoff {
                Some(cutoff) => Electrostatic::with_cutoff(cutoff, kernel),
                None => Electrostatic::new(kernel),
            }));
        }
        info!(
            "Selected terms: {}.",
            terms.iter().map(|t| t.name()).collect::<Vec<_>>().join(", ")
        );
        terms
    }
}
