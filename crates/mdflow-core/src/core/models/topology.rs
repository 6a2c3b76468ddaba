use super::particle::Particle;
use itertools::Itertools;
use std::ops::Range;
use thiserror::Error;
use tracing::debug;

/// Padding value for unused slots of an [`AdjacencyTable`] row.
pub const SENTINEL: usize = usize::MAX;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TopologyError {
    #[error("Particle conflict in {kind} {indices:?}: {reason}")]
    ParticleConflict {
        kind: &'static str,
        indices: Vec<usize>,
        reason: &'static str,
    },
    #[error("A {kind} requires {expected} particles, got {found}")]
    GeometryDim {
        kind: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Cannot modify a joined topology; call split() first")]
    ModifyJoined,
    #[error("Topology has not been joined; dense arrays are unavailable")]
    NotJoined,
}

/// A dihedral quadruple together with the 1-4 scaling factor of its outer pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dihedral {
    pub particles: [usize; 4],
    pub scaling_factor: f64,
}

/// Fixed-width per-particle neighbor table padded with [`SENTINEL`].
///
/// Each row lists matrix ids in ascending order, with a parallel factor per entry
/// (1.0 for exclusion tables, the 1-4 scaling factor for scaling tables).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AdjacencyTable {
    width: usize,
    entries: Vec<usize>,
    factors: Vec<f64>,
}

impl AdjacencyTable {
    fn from_rows(rows: Vec<Vec<(usize, f64)>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
        let mut entries = vec![SENTINEL; rows.len() * width];
        let mut factors = vec![0.0; rows.len() * width];
        for (i, row) in rows.iter().enumerate() {
            for (slot, &(j, factor)) in row.iter().enumerate() {
                entries[i * width + slot] = j;
                factors[i * width + slot] = factor;
            }
        }
        Self {
            width,
            entries,
            factors,
        }
    }

    /// Row width `K`; every row holds exactly this many slots.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn num_rows(&self) -> usize {
        if self.width == 0 {
            0
        } else {
            self.entries.len() / self.width
        }
    }

    /// Raw padded row, including trailing [`SENTINEL`] slots.
    pub fn padded_row(&self, i: usize) -> &[usize] {
        &self.entries[i * self.width..(i + 1) * self.width]
    }

    /// Occupied entries of row `i` as `(matrix_id, factor)` pairs.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let start = i * self.width;
        self.entries[start..start + self.width]
            .iter()
            .zip(&self.factors[start..start + self.width])
            .take_while(|(j, _)| **j != SENTINEL)
            .map(|(j, f)| (*j, *f))
    }

    pub fn contains(&self, i: usize, j: usize) -> bool {
        self.factor(i, j).is_some()
    }

    pub fn factor(&self, i: usize, j: usize) -> Option<f64> {
        self.row(i).find(|(k, _)| *k == j).map(|(_, f)| f)
    }
}

/// Frozen per-particle arrays produced by [`Topology::join`].
#[derive(Debug, Clone, PartialEq)]
pub struct DenseArrays {
    pub masses: Vec<f64>,
    pub charges: Vec<f64>,
    pub particle_types: Vec<String>,
    pub bonded_particles: AdjacencyTable,
    pub scaling_particles: AdjacencyTable,
}

/// Ordered particle collection plus bond/angle/dihedral/improper connectivity.
///
/// Connectivity is mutable until [`join`](Topology::join) freezes the dense arrays; any
/// mutation afterwards fails with [`TopologyError::ModifyJoined`] until [`split`](Topology::split).
#[derive(Debug, Clone, Default)]
pub struct Topology {
    particles: Vec<Particle>,
    bonds: Vec<[usize; 2]>,
    angles: Vec<[usize; 3]>,
    dihedrals: Vec<Dihedral>,
    impropers: Vec<[usize; 4]>,
    dense: Option<DenseArrays>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_particles(&self) -> usize {
        self.particles.len()
    }

    pub fn num_bonds(&self) -> usize {
        self.bonds.len()
    }

    pub fn num_angles(&self) -> usize {
        self.angles.len()
    }

    pub fn num_dihedrals(&self) -> usize {
        self.dihedrals.len()
    }

    pub fn num_impropers(&self) -> usize {
        self.impropers.len()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particle(&self, matrix_id: usize) -> Option<&Particle> {
        self.particles.get(matrix_id)
    }

    pub fn bonds(&self) -> &[[usize; 2]] {
        &self.bonds
    }

    pub fn angles(&self) -> &[[usize; 3]] {
        &self.angles
    }

    pub fn dihedrals(&self) -> &[Dihedral] {
        &self.dihedrals
    }

    pub fn impropers(&self) -> &[[usize; 4]] {
        &self.impropers
    }

    pub fn is_joined(&self) -> bool {
        self.dense.is_some()
    }

    /// Dense arrays frozen by the last [`join`](Topology::join).
    pub fn dense(&self) -> Result<&DenseArrays, TopologyError> {
        self.dense.as_ref().ok_or(TopologyError::NotJoined)
    }

    /// Appends particles in order and returns the range of matrix ids they received.
    pub fn add_particles<I>(&mut self, particles: I) -> Result<Range<usize>, TopologyError>
    where
        I: IntoIterator<Item = Particle>,
    {
        self.ensure_mutable()?;
        let start = self.particles.len();
        for mut particle in particles {
            particle.clear_adjacency();
            particle.set_matrix_id(Some(self.particles.len()));
            self.particles.push(particle);
        }
        Ok(start..self.particles.len())
    }

    /// Removes particles by matrix id, prunes every tuple referencing them and renumbers the
    /// survivors so matrix ids stay dense. Returns the removed particles, detached.
    pub fn del_particles(&mut self, matrix_ids: &[usize]) -> Result<Vec<Particle>, TopologyError> {
        self.ensure_mutable()?;
        self.validate_indices("particle deletion", matrix_ids)?;

        let mut remap = vec![None; self.particles.len()];
        let mut kept = Vec::with_capacity(self.particles.len() - matrix_ids.len());
        let mut removed = Vec::with_capacity(matrix_ids.len());
        for (old_id, mut particle) in std::mem::take(&mut self.particles).into_iter().enumerate() {
            if matrix_ids.contains(&old_id) {
                particle.set_matrix_id(None);
                particle.clear_adjacency();
                removed.push(particle);
            } else {
                remap[old_id] = Some(kept.len());
                particle.set_matrix_id(Some(kept.len()));
                kept.push(particle);
            }
        }
        self.particles = kept;

        let remap_tuple = |tuple: &[usize]| -> Option<Vec<usize>> {
            tuple.iter().map(|&i| remap[i]).collect()
        };
        self.bonds = self
            .bonds
            .iter()
            .filter_map(|b| remap_tuple(b).map(|t| [t[0], t[1]]))
            .collect();
        self.angles = self
            .angles
            .iter()
            .filter_map(|a| remap_tuple(a).map(|t| [t[0], t[1], t[2]]))
            .collect();
        self.dihedrals = self
            .dihedrals
            .iter()
            .filter_map(|d| {
                remap_tuple(&d.particles).map(|t| Dihedral {
                    particles: [t[0], t[1], t[2], t[3]],
                    scaling_factor: d.scaling_factor,
                })
            })
            .collect();
        self.impropers = self
            .impropers
            .iter()
            .filter_map(|q| remap_tuple(q).map(|t| [t[0], t[1], t[2], t[3]]))
            .collect();

        self.rebuild_adjacency();
        debug!(
            "Deleted {} particle(s); {} remain.",
            removed.len(),
            self.particles.len()
        );
        Ok(removed)
    }

    pub fn add_bond(&mut self, indices: &[usize]) -> Result<(), TopologyError> {
        self.ensure_mutable()?;
        let [a, b] = self.validate_tuple::<2>("bond", indices)?;
        if contains_tuple(&self.bonds, &[a, b]) {
            debug!("Bond {:?} already present; ignoring.", [a, b]);
            return Ok(());
        }
        self.bonds.push([a, b]);
        self.link_bonded(&[a, b]);
        Ok(())
    }

    pub fn add_angle(&mut self, indices: &[usize]) -> Result<(), TopologyError> {
        self.ensure_mutable()?;
        let angle = self.validate_tuple::<3>("angle", indices)?;
        if contains_tuple(&self.angles, &angle) {
            debug!("Angle {:?} already present; ignoring.", angle);
            return Ok(());
        }
        self.angles.push(angle);
        self.link_bonded(&angle);
        Ok(())
    }

    /// Adds a dihedral whose outer pair is scaled by the default factor of 1.
    pub fn add_dihedral(&mut self, indices: &[usize]) -> Result<(), TopologyError> {
        self.add_dihedral_with_scaling(indices, 1.0)
    }

    pub fn add_dihedral_with_scaling(
        &mut self,
        indices: &[usize],
        scaling_factor: f64,
    ) -> Result<(), TopologyError> {
        self.ensure_mutable()?;
        let particles = self.validate_tuple::<4>("dihedral", indices)?;
        if self
            .dihedrals
            .iter()
            .any(|d| same_tuple(&d.particles, &particles))
        {
            debug!("Dihedral {:?} already present; ignoring.", particles);
            return Ok(());
        }
        self.dihedrals.push(Dihedral {
            particles,
            scaling_factor,
        });
        self.link_scaling(particles[0], particles[3], scaling_factor);
        Ok(())
    }

    pub fn add_improper(&mut self, indices: &[usize]) -> Result<(), TopologyError> {
        self.ensure_mutable()?;
        let improper = self.validate_tuple::<4>("improper", indices)?;
        if self.impropers.contains(&improper) {
            debug!("Improper {:?} already present; ignoring.", improper);
            return Ok(());
        }
        self.impropers.push(improper);
        Ok(())
    }

    /// Removes a bond in either orientation. Returns `false` if it was not present.
    pub fn del_bond(&mut self, indices: &[usize]) -> Result<bool, TopologyError> {
        self.ensure_mutable()?;
        check_arity("bond", indices, 2)?;
        let removed = remove_matching(&mut self.bonds, |b| same_tuple(b, indices));
        if removed {
            self.rebuild_adjacency();
        }
        Ok(removed)
    }

    pub fn del_angle(&mut self, indices: &[usize]) -> Result<bool, TopologyError> {
        self.ensure_mutable()?;
        check_arity("angle", indices, 3)?;
        let removed = remove_matching(&mut self.angles, |a| same_tuple(a, indices));
        if removed {
            self.rebuild_adjacency();
        }
        Ok(removed)
    }

    pub fn del_dihedral(&mut self, indices: &[usize]) -> Result<bool, TopologyError> {
        self.ensure_mutable()?;
        check_arity("dihedral", indices, 4)?;
        let removed = remove_matching(&mut self.dihedrals, |d| same_tuple(&d.particles, indices));
        if removed {
            self.rebuild_adjacency();
        }
        Ok(removed)
    }

    /// Impropers are order sensitive: only the exact quadruple matches.
    pub fn del_improper(&mut self, indices: &[usize]) -> Result<bool, TopologyError> {
        self.ensure_mutable()?;
        check_arity("improper", indices, 4)?;
        Ok(remove_matching(&mut self.impropers, |q| q[..] == indices[..]))
    }

    /// Freezes masses, charges, types and the padded exclusion/scaling tables. O(N·K).
    pub fn join(&mut self) {
        if self.dense.is_some() {
            return;
        }
        let bonded_rows = self
            .particles
            .iter()
            .map(|p| p.bonded_particles().iter().map(|&j| (j, 1.0)).collect())
            .collect();
        let scaling_rows = self
            .particles
            .iter()
            .map(|p| p.scaling_particles().iter().map(|(&j, &f)| (j, f)).collect())
            .collect();
        let dense = DenseArrays {
            masses: self.particles.iter().map(|p| p.mass).collect(),
            charges: self.particles.iter().map(|p| p.charge).collect(),
            particle_types: self
                .particles
                .iter()
                .map(|p| p.particle_type.clone())
                .collect(),
            bonded_particles: AdjacencyTable::from_rows(bonded_rows),
            scaling_particles: AdjacencyTable::from_rows(scaling_rows),
        };
        debug!(
            "Joined topology: {} particles, {} bonds, {} angles, {} dihedrals, {} impropers (exclusion width {}, scaling width {}).",
            self.particles.len(),
            self.bonds.len(),
            self.angles.len(),
            self.dihedrals.len(),
            self.impropers.len(),
            dense.bonded_particles.width(),
            dense.scaling_particles.width()
        );
        self.dense = Some(dense);
    }

    /// Discards the dense arrays so the topology can be modified again.
    pub fn split(&mut self) {
        self.dense = None;
    }

    fn ensure_mutable(&self) -> Result<(), TopologyError> {
        if self.is_joined() {
            Err(TopologyError::ModifyJoined)
        } else {
            Ok(())
        }
    }

    fn validate_indices(&self, kind: &'static str, indices: &[usize]) -> Result<(), TopologyError> {
        if indices.iter().any(|&i| i >= self.particles.len()) {
            return Err(TopologyError::ParticleConflict {
                kind,
                indices: indices.to_vec(),
                reason: "index out of range",
            });
        }
        if !indices.iter().all_unique() {
            return Err(TopologyError::ParticleConflict {
                kind,
                indices: indices.to_vec(),
                reason: "repeated index",
            });
        }
        Ok(())
    }

    fn validate_tuple<const N: usize>(
        &self,
        kind: &'static str,
        indices: &[usize],
    ) -> Result<[usize; N], TopologyError> {
        check_arity(kind, indices, N)?;
        self.validate_indices(kind, indices)?;
        let mut tuple = [0; N];
        tuple.copy_from_slice(indices);
        Ok(tuple)
    }

    fn link_bonded(&mut self, indices: &[usize]) {
        for (&a, &b) in indices.iter().tuple_combinations() {
            self.particles[a].add_bonded_particle(b);
            self.particles[b].add_bonded_particle(a);
        }
    }

    fn link_scaling(&mut self, a: usize, b: usize, factor: f64) {
        self.particles[a].add_scaling_particle(b, factor);
        self.particles[b].add_scaling_particle(a, factor);
    }

    fn rebuild_adjacency(&mut self) {
        for particle in &mut self.particles {
            particle.clear_adjacency();
        }
        let bonds = self.bonds.clone();
        for bond in &bonds {
            self.link_bonded(bond);
        }
        let angles = self.angles.clone();
        for angle in &angles {
            self.link_bonded(angle);
        }
        let dihedrals = self.dihedrals.clone();
        for dihedral in &dihedrals {
            self.link_scaling(
                dihedral.particles[0],
                dihedral.particles[3],
                dihedral.scaling_factor,
            );
        }
    }
}

fn check_arity(kind: &'static str, indices: &[usize], expected: usize) -> Result<(), TopologyError> {
    if indices.len() != expected {
        return Err(TopologyError::GeometryDim {
            kind,
            expected,
            found: indices.len(),
        });
    }
    Ok(())
}

/// Equal as written or reversed.
fn same_tuple(a: &[usize], b: &[usize]) -> bool {
    a.len() == b.len() && (a.iter().eq(b.iter()) || a.iter().eq(b.iter().rev()))
}

fn contains_tuple<const N: usize>(tuples: &[[usize; N]], candidate: &[usize; N]) -> bool {
    tuples.iter().any(|t| same_tuple(t, candidate))
}

fn remove_matching<T, F>(items: &mut Vec<T>, predicate: F) -> bool
where
    F: Fn(&T) -> bool,
{
    let before = items.len();
    items.retain(|item| !predicate(item));
    items.len() != before
}
