use crate::core::spatial::cell_list::CellList;
use nalgebra::Vector3;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Execution strategy for a force-field term, fixed when the term is constructed.
///
/// Both kernels run the same per-interaction function; they differ only in how work items are
/// scheduled and how contributions reach the force array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Kernel {
    /// Sequential loop with direct read-modify-write of the force array.
    #[default]
    Host,
    /// One independent work item per tuple or per (particle, candidate slot), accumulated
    /// atomically so concurrent items may target the same particle.
    Accelerator,
}

/// Energy and per-particle forces produced by one interaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contribution<const N: usize> {
    pub energy: f64,
    pub particles: [usize; N],
    pub forces: [Vector3<f64>; N],
}

/// Where candidate pairs for a nonbonded term come from.
#[derive(Debug, Clone, Copy)]
pub enum PairSearch<'a> {
    /// Every unordered pair.
    AllPairs,
    /// Only pairs sharing a neighboring cell.
    CellList(&'a CellList),
}

/// Force array shared between concurrent work items.
///
/// Each component is an `f64` stored as bits in an `AtomicU64`; additions retry a
/// compare-and-swap until they land.
#[derive(Debug)]
pub struct AtomicForceBuffer {
    components: Vec<AtomicU64>,
}

impl AtomicForceBuffer {
    pub fn new(num_particles: usize) -> Self {
        Self {
            components: (0..3 * num_particles)
                .map(|_| AtomicU64::new(0f64.to_bits()))
                .collect(),
        }
    }

    pub fn add(&self, particle: usize, force: &Vector3<f64>) {
        for axis in 0..3 {
            atomic_add(&self.components[3 * particle + axis], force[axis]);
        }
    }

    pub fn into_forces(self) -> Vec<Vector3<f64>> {
        let values: Vec<f64> = self
            .components
            .into_iter()
            .map(|c| f64::from_bits(c.into_inner()))
            .collect();
        values
            .chunks_exact(3)
            .map(|c| Vector3::new(c[0], c[1], c[2]))
            .collect()
    }
}

#[inline]
fn atomic_add(cell: &AtomicU64, value: f64) {
    let mut current = cell.load(Ordering::Relaxed);
    loop {
        let updated = (f64::from_bits(current) + value).to_bits();
        match cell.compare_exchange_weak(current, updated, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return,
            Err(actual) => current = actual,
        }
    }
}

/// Runs `body` for every work item in `0..count` and sums the returned energies.
fn dispatch<F>(count: usize, body: F) -> f64
where
    F: Fn(usize) -> f64 + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        (0..count).into_par_iter().map(body).sum()
    }
    #[cfg(not(feature = "parallel"))]
    {
        (0..count).map(body).sum()
    }
}

impl Kernel {
    /// Evaluates `interaction` for each of `num_items` tuples and accumulates the result into a
    /// fresh force array of `num_particles` entries. Items yielding `None` contribute nothing.
    pub fn accumulate<const N: usize, F>(
        self,
        num_particles: usize,
        num_items: usize,
        interaction: F,
    ) -> (Vec<Vector3<f64>>, f64)
    where
        F: Fn(usize) -> Option<Contribution<N>> + Sync + Send,
    {
        match self {
            Kernel::Host => {
                let mut forces = vec![Vector3::zeros(); num_particles];
                let mut energy = 0.0;
                for item in 0..num_items {
                    if let Some(contribution) = interaction(item) {
                        apply(&mut forces, &contribution);
                        energy += contribution.energy;
                    }
                }
                (forces, energy)
            }
            Kernel::Accelerator => {
                let buffer = AtomicForceBuffer::new(num_particles);
                let energy = dispatch(num_items, |item| match interaction(item) {
                    Some(contribution) => {
                        for (p, f) in contribution.particles.iter().zip(&contribution.forces) {
                            buffer.add(*p, f);
                        }
                        contribution.energy
                    }
                    None => 0.0,
                });
                (buffer.into_forces(), energy)
            }
        }
    }

    /// Evaluates `interaction(i, j)` once per unordered candidate pair with `i < j`.
    pub fn accumulate_pairs<F>(
        self,
        num_particles: usize,
        search: PairSearch<'_>,
        interaction: F,
    ) -> (Vec<Vector3<f64>>, f64)
    where
        F: Fn(usize, usize) -> Option<Contribution<2>> + Sync + Send,
    {
        match (self, search) {
            (Kernel::Host, PairSearch::AllPairs) => {
                let mut forces = vec![Vector3::zeros(); num_particles];
                let mut energy = 0.0;
                for i in 0..num_particles {
                    for j in i + 1..num_particles {
                        if let Some(contribution) = interaction(i, j) {
                            apply(&mut forces, &contribution);
                            energy += contribution.energy;
                        }
                    }
                }
                (forces, energy)
            }
            (Kernel::Host, PairSearch::CellList(cell_list)) => {
                let mut forces = vec![Vector3::zeros(); num_particles];
                let mut energy = 0.0;
                for i in 0..num_particles {
                    for j in cell_list.candidates(i).filter(|&j| j > i) {
                        if let Some(contribution) = interaction(i, j) {
                            apply(&mut forces, &contribution);
                            energy += contribution.energy;
                        }
                    }
                }
                (forces, energy)
            }
            (Kernel::Accelerator, PairSearch::AllPairs) => {
                self.accumulate(num_particles, num_particles * num_particles, |item| {
                    let (i, j) = (item / num_particles, item % num_particles);
                    if j > i { interaction(i, j) } else { None }
                })
            }
            (Kernel::Accelerator, PairSearch::CellList(cell_list)) => {
                let slots = cell_list.num_candidate_slots();
                self.accumulate(num_particles, num_particles * slots, |item| {
                    let i = item / slots;
                    cell_list
                        .candidate(i, item % slots)
                        .filter(|&j| j > i)
                        .and_then(|j| interaction(i, j))
                })
            }
        }
    }
}

#[inline]
fn apply<const N: usize>(forces: &mut [Vector3<f64>], contribution: &Contribution<N>) {
    for (p, f) in contribution.particles.iter().zip(&contribution.forces) {
        forces[*p] += f;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::spatial::pbc::PeriodicBox;

    #[test]
    fn atomic_buffer_accumulates_concurrent_additions() {
        let buffer = AtomicForceBuffer::new(2);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..1000 {
                        buffer.add(1, &Vector3::new(0.5, -1.0, 0.25));
                    }
                });
            }
        });
        let forces = buffer.into_forces();
        assert_eq!(forces[0], Vector3::zeros());
        assert_eq!(forces[1], Vector3::new(4000.0, -8000.0, 2000.0));
    }

    fn pair_counter(i: usize, j: usize) -> Option<Contribution<2>> {
        Some(Contribution {
            energy: 1.0,
            particles: [i, j],
            forces: [Vector3::new(1.0, 0.0, 0.0), Vector3::new(-1.0, 0.0, 0.0)],
        })
    }

    #[test]
    fn kernels_visit_each_unordered_pair_once() {
        for kernel in [Kernel::Host, Kernel::Accelerator] {
            let (forces, energy) = kernel.accumulate_pairs(5, PairSearch::AllPairs, pair_counter);
            assert_eq!(energy, 10.0);
            let net: Vector3<f64> = forces.iter().sum();
            assert_eq!(net, Vector3::zeros());
            assert_eq!(forces[0].x, 4.0);
            assert_eq!(forces[4].x, -4.0);
        }
    }

    #[test]
    fn cell_list_search_agrees_between_kernels() {
        let pbc = PeriodicBox::cubic(9.0).unwrap();
        let positions: Vec<Vector3<f64>> = (0..27)
            .map(|n| {
                Vector3::new(
                    (n % 3) as f64 * 3.0 + 1.5,
                    ((n / 3) % 3) as f64 * 3.0 + 1.5,
                    (n / 9) as f64 * 3.0 + 1.5,
                )
            })
            .collect();
        let mut cell_list = CellList::new(3.0);
        cell_list.build(&positions, &pbc);

        let (host_forces, host_energy) =
            Kernel::Host.accumulate_pairs(27, PairSearch::CellList(&cell_list), pair_counter);
        let (acc_forces, acc_energy) = Kernel::Accelerator.accumulate_pairs(
            27,
            PairSearch::CellList(&cell_list),
            pair_counter,
        );
        assert_eq!(host_energy, acc_energy);
        assert_eq!(host_forces, acc_forces);
        // A 3x3x3 grid of one particle per cell makes every pair a neighbor.
        assert_eq!(host_energy, (27 * 26 / 2) as f64);
    }

    #[test]
    fn accumulate_skips_empty_items() {
        let (forces, energy) = Kernel::Accelerator.accumulate(3, 4, |item| {
            (item % 2 == 0).then(|| Contribution {
                energy: 0.5,
                particles: [item / 2],
                forces: [Vector3::new(0.0, 1.0, 0.0)],
            })
        });
        assert_eq!(energy, 1.0);
        assert_eq!(forces[0].y, 1.0);
        assert_eq!(forces[1].y, 1.0);
        assert_eq!(forces[2].y, 0.0);
    }
}
