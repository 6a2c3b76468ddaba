use super::pbc::PeriodicBox;
use nalgebra::Vector3;
use tracing::{debug, warn};

/// Padding value for unused slots in the cell membership table.
pub const EMPTY_SLOT: usize = usize::MAX;

/// Number of cells visited around (and including) a particle's own cell.
pub const NUM_NEIGHBOR_CELLS: usize = 27;

/// The `{-1, 0, 1}³` offset template, computed once at compile time.
pub const NEIGHBOR_OFFSETS: [[isize; 3]; NUM_NEIGHBOR_CELLS] = neighbor_offsets();

const fn neighbor_offsets() -> [[isize; 3]; NUM_NEIGHBOR_CELLS] {
    let mut offsets = [[0; 3]; NUM_NEIGHBOR_CELLS];
    let mut n = 0;
    while n < NUM_NEIGHBOR_CELLS {
        offsets[n] = [
            (n / 9) as isize - 1,
            ((n / 3) % 3) as isize - 1,
            (n % 3) as isize - 1,
        ];
        n += 1;
    }
    offsets
}

/// Spatial bucket grid for neighbor enumeration under periodic boundary conditions.
///
/// Every cell edge is at least `cutoff_radius` long (measured perpendicular to the faces of the
/// box), so all partners within the cutoff of a particle lie in the 27 cells surrounding its own.
/// Membership is stored in a fixed-capacity `[cells, capacity]` table padded with
/// [`EMPTY_SLOT`], which lets data-parallel kernels address candidate partners by slot index.
#[derive(Debug, Clone)]
pub struct CellList {
    cutoff_radius: f64,
    dims: [usize; 3],
    capacity: usize,
    slots: Vec<usize>,
    cell_index: Vec<usize>,
    neighbor_cells: Vec<Vec<usize>>,
}

impl CellList {
    /// Creates an empty list. It holds no particles until [`build`](CellList::build) is called.
    pub fn new(cutoff_radius: f64) -> Self {
        Self {
            cutoff_radius,
            dims: [1, 1, 1],
            capacity: 0,
            slots: Vec::new(),
            cell_index: Vec::new(),
            neighbor_cells: vec![vec![0]],
        }
    }

    pub fn cutoff_radius(&self) -> f64 {
        self.cutoff_radius
    }

    /// Changes the cutoff. The grid is stale until the next [`build`](CellList::build).
    pub fn set_cutoff_radius(&mut self, cutoff_radius: f64) {
        self.cutoff_radius = cutoff_radius;
    }

    /// Number of cells along each box vector.
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn num_cells(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    /// Maximum occupancy over all cells; the row width of the membership table.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn num_particles(&self) -> usize {
        self.cell_index.len()
    }

    /// Flat index of the cell holding particle `i`.
    pub fn cell_of(&self, i: usize) -> usize {
        self.cell_index[i]
    }

    /// Distinct cells (own cell included) whose members are candidate partners.
    pub fn neighbor_cells(&self, cell: usize) -> &[usize] {
        &self.neighbor_cells[cell]
    }

    pub fn cell_members(&self, cell: usize) -> impl Iterator<Item = usize> + '_ {
        self.slots[cell * self.capacity..(cell + 1) * self.capacity]
            .iter()
            .copied()
            .take_while(|&j| j != EMPTY_SLOT)
    }

    /// Every particle sharing a neighbor cell with `i`, excluding `i` itself.
    pub fn candidates(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        self.neighbor_cells[self.cell_index[i]]
            .iter()
            .flat_map(move |&cell| self.cell_members(cell))
            .filter(move |&j| j != i)
    }

    /// Number of candidate slots addressable per particle by [`candidate`](CellList::candidate).
    pub fn num_candidate_slots(&self) -> usize {
        NUM_NEIGHBOR_CELLS * self.capacity
    }

    /// Partner stored in candidate slot `slot` of particle `i`, if the slot is occupied and is
    /// not `i` itself.
    pub fn candidate(&self, i: usize, slot: usize) -> Option<usize> {
        if self.capacity == 0 {
            return None;
        }
        let cells = &self.neighbor_cells[self.cell_index[i]];
        let cell = *cells.get(slot / self.capacity)?;
        let j = self.slots[cell * self.capacity + slot % self.capacity];
        (j != EMPTY_SLOT && j != i).then_some(j)
    }

    /// Reassigns every particle to its bucket. Must complete before any term reads the list.
    pub fn build(&mut self, positions: &[Vector3<f64>], pbc: &PeriodicBox) {
        let widths = pbc.perpendicular_widths();
        let dims = [0, 1, 2].map(|axis| {
            if self.cutoff_radius > 0.0 {
                ((widths[axis] / self.cutoff_radius).floor() as usize).max(1)
            } else {
                1
            }
        });
        if self.cutoff_radius > 0.5 * widths.min() {
            warn!(
                "Cutoff radius {} exceeds half the narrowest box width {}; minimum-image distances may miss partners.",
                self.cutoff_radius,
                widths.min()
            );
        }

        if dims != self.dims || self.neighbor_cells.len() != dims.iter().product::<usize>() {
            self.dims = dims;
            self.neighbor_cells = (0..self.num_cells())
                .map(|cell| self.compute_neighbor_cells(cell))
                .collect();
        }

        self.cell_index = positions
            .iter()
            .map(|position| {
                let fractional = pbc.to_fractional(position);
                let coords = [0, 1, 2].map(|axis| {
                    let wrapped = fractional[axis] - fractional[axis].floor();
                    ((wrapped * dims[axis] as f64) as usize).min(dims[axis] - 1)
                });
                self.flat_index(coords)
            })
            .collect();

        let mut counts = vec![0usize; self.num_cells()];
        for &cell in &self.cell_index {
            counts[cell] += 1;
        }
        self.capacity = counts.iter().copied().max().unwrap_or(0);
        self.slots = vec![EMPTY_SLOT; self.num_cells() * self.capacity];
        counts.iter_mut().for_each(|c| *c = 0);
        for (i, &cell) in self.cell_index.iter().enumerate() {
            self.slots[cell * self.capacity + counts[cell]] = i;
            counts[cell] += 1;
        }

        debug!(
            "Cell list rebuilt: {} particles in {:?} cells (capacity {}).",
            positions.len(),
            self.dims,
            self.capacity
        );
    }

    fn flat_index(&self, coords: [usize; 3]) -> usize {
        coords[0] + self.dims[0] * (coords[1] + self.dims[1] * coords[2])
    }

    fn compute_neighbor_cells(&self, cell: usize) -> Vec<usize> {
        let coords = [
            cell % self.dims[0],
            (cell / self.dims[0]) % self.dims[1],
            cell / (self.dims[0] * self.dims[1]),
        ];
        let mut cells: Vec<usize> = NEIGHBOR_OFFSETS
            .iter()
            .map(|offset| {
                let wrapped = [0, 1, 2].map(|axis| {
                    (coords[axis] as isize + offset[axis]).rem_euclid(self.dims[axis] as isize)
                        as usize
                });
                self.flat_index(wrapped)
            })
            .collect();
        cells.sort_unstable();
        cells.dedup();
        cells
    }
}
