use std::collections::{BTreeMap, BTreeSet};

/// A single interaction site with its physical attributes and adjacency bookkeeping.
///
/// Adjacency is stored as dense matrix ids rather than references, so a particle never
/// points back into the topology that owns it.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Externally assigned identifier (e.g. the serial number in a structure file).
    pub particle_id: i64,
    /// Force-field type used to look up parameters (e.g. "CT1", "OW").
    pub particle_type: String,
    /// Human-readable name (e.g. "CA").
    pub name: String,
    /// Mass in amu.
    pub mass: f64,
    /// Partial charge in units of e.
    pub charge: f64,
    matrix_id: Option<usize>,
    bonded_particles: BTreeSet<usize>,
    scaling_particles: BTreeMap<usize, f64>,
}

impl Particle {
    /// Creates a detached particle. The matrix id is assigned when it joins a topology.
    pub fn new(
        particle_id: i64,
        particle_type: &str,
        name: &str,
        mass: f64,
        charge: f64,
    ) -> Self {
        Self {
            particle_id,
            particle_type: particle_type.to_string(),
            name: name.to_string(),
            mass,
            charge,
            matrix_id: None,
            bonded_particles: BTreeSet::new(),
            scaling_particles: BTreeMap::new(),
        }
    }

    /// Dense index of this particle inside its topology, `None` while detached.
    pub fn matrix_id(&self) -> Option<usize> {
        self.matrix_id
    }

    /// Matrix ids excluded from nonbonded evaluation against this particle.
    pub fn bonded_particles(&self) -> &BTreeSet<usize> {
        &self.bonded_particles
    }

    /// Matrix ids of 1-4 partners together with their scaling factor.
    pub fn scaling_particles(&self) -> &BTreeMap<usize, f64> {
        &self.scaling_particles
    }

    pub fn is_bonded_to(&self, matrix_id: usize) -> bool {
        self.bonded_particles.contains(&matrix_id)
    }

    pub fn scaling_factor_with(&self, matrix_id: usize) -> Option<f64> {
        self.scaling_particles.get(&matrix_id).copied()
    }

    pub(crate) fn set_matrix_id(&mut self, matrix_id: Option<usize>) {
        self.matrix_id = matrix_id;
    }

    pub(crate) fn add_bonded_particle(&mut self, matrix_id: usize) {
        self.bonded_particles.insert(matrix_id);
    }

    pub(crate) fn add_scaling_particle(&mut self, matrix_id: usize, factor: f64) {
        self.scaling_particles.insert(matrix_id, factor);
    }

    pub(crate) fn clear_adjacency(&mut self) {
        self.bonded_particles.clear();
        self.scaling_particles.clear();
    }
}
