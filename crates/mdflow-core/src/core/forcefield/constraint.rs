use crate::core::models::topology::{Topology, TopologyError};
use crate::core::spatial::cell_list::CellList;
use crate::core::spatial::pbc::PeriodicBox;
use nalgebra::Vector3;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConstraintError {
    #[error("The {term} term has not been bound to an ensemble")]
    NotBound { term: &'static str },
    #[error("The {term} term is already bound to an ensemble")]
    AlreadyBound { term: &'static str },
    #[error("No {term} parameters for type key '{key}'")]
    MissingParameter { term: &'static str, key: String },
    #[error("The {term} term was bound to {expected} particles but received {found} positions")]
    ParticleCountMismatch {
        term: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),
}

/// Read-only view of the simulated configuration handed to every term on update.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub positions: &'a [Vector3<f64>],
    pub pbc: Option<&'a PeriodicBox>,
    /// Present only when a box is set; membership reflects `positions`.
    pub cell_list: Option<&'a CellList>,
}

impl<'a> Frame<'a> {
    /// A frame without periodic boundaries.
    pub fn open(positions: &'a [Vector3<f64>]) -> Self {
        Self {
            positions,
            pbc: None,
            cell_list: None,
        }
    }

    pub fn num_particles(&self) -> usize {
        self.positions.len()
    }

    /// `r_j - r_i`, reduced to the minimum image when a box is set.
    #[inline]
    pub fn displacement(&self, i: usize, j: usize) -> Vector3<f64> {
        let d = self.positions[j] - self.positions[i];
        match self.pbc {
            Some(pbc) => pbc.minimum_image(&d),
            None => d,
        }
    }
}

/// A force-field term: binds once to a joined topology, then turns frames into forces and a
/// potential energy.
///
/// Every method other than [`bind`](Constraint::bind) fails with [`ConstraintError::NotBound`]
/// until binding succeeds.
pub trait Constraint: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Resolves topology-derived parameter tables. A second call fails with
    /// [`ConstraintError::AlreadyBound`].
    fn bind(&mut self, topology: &Topology) -> Result<(), ConstraintError>;

    fn is_bound(&self) -> bool;

    /// Interaction range of nonbonded terms; bonded terms have none.
    fn cutoff_radius(&self) -> Option<f64> {
        None
    }

    fn update(&mut self, frame: &Frame<'_>) -> Result<(), ConstraintError>;

    /// Forces from the last [`update`](Constraint::update), one entry per particle.
    fn forces(&self) -> Result<&[Vector3<f64>], ConstraintError>;

    fn potential_energy(&self) -> Result<f64, ConstraintError>;
}

/// Binding flag plus the private force/energy pair each term owns.
#[derive(Debug, Clone, Default)]
pub(crate) struct TermOutput {
    bound: bool,
    forces: Vec<Vector3<f64>>,
    potential_energy: f64,
}

impl TermOutput {
    pub(crate) fn is_bound(&self) -> bool {
        self.bound
    }

    pub(crate) fn ensure_unbound(&self, term: &'static str) -> Result<(), ConstraintError> {
        if self.bound {
            Err(ConstraintError::AlreadyBound { term })
        } else {
            Ok(())
        }
    }

    pub(crate) fn mark_bound(&mut self, num_particles: usize) {
        self.bound = true;
        self.forces = vec![Vector3::zeros(); num_particles];
        self.potential_energy = 0.0;
    }

    /// Checks binding and that the frame matches the bound particle count.
    pub(crate) fn check_frame(
        &self,
        term: &'static str,
        frame: &Frame<'_>,
    ) -> Result<(), ConstraintError> {
        if !self.bound {
            return Err(ConstraintError::NotBound { term });
        }
        if frame.num_particles() != self.forces.len() {
            return Err(ConstraintError::ParticleCountMismatch {
                term,
                expected: self.forces.len(),
                found: frame.num_particles(),
            });
        }
        Ok(())
    }

    pub(crate) fn store(&mut self, (forces, potential_energy): (Vec<Vector3<f64>>, f64)) {
        self.forces = forces;
        self.potential_energy = potential_energy;
    }

    pub(crate) fn forces(&self, term: &'static str) -> Result<&[Vector3<f64>], ConstraintError> {
        if self.bound {
            Ok(&self.forces)
        } else {
            Err(ConstraintError::NotBound { term })
        }
    }

    pub(crate) fn potential_energy(&self, term: &'static str) -> Result<f64, ConstraintError> {
        if self.bound {
            Ok(self.potential_energy)
        } else {
            Err(ConstraintError::NotBound { term })
        }
    }
}
