use super::state::{State, StateError};
use crate::core::forcefield::constraint::{Constraint, ConstraintError};
use crate::core::models::topology::Topology;
use crate::core::units::{BOLTZMANN_KCAL_PER_MOL_K, kinetic_energy};
use nalgebra::Vector3;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EnsembleError {
    #[error("Term '{term}' is already bound to an ensemble")]
    ConstraintConflict { term: &'static str },
    #[error("Term '{term}' produced a non-finite {quantity}")]
    NonFiniteEnergy {
        term: &'static str,
        quantity: &'static str,
    },
    #[error("Constraint error: {0}")]
    Constraint(#[from] ConstraintError),
    #[error("State error: {0}")]
    State(#[from] StateError),
}

/// A topology, its dynamic state and the set of force-field terms acting on it.
///
/// [`update`](Ensemble::update) evaluates every term against the current positions and caches
/// the summed forces together with the potential, kinetic and total energies.
#[derive(Debug)]
pub struct Ensemble {
    topology: Topology,
    state: State,
    constraints: Vec<Box<dyn Constraint>>,
    forces: Vec<Vector3<f64>>,
    term_energies: Vec<f64>,
    potential_energy: f64,
    kinetic_energy: f64,
}

impl Ensemble {
    /// Takes ownership of `topology`, joining it first if needed.
    pub fn new(mut topology: Topology) -> Result<Self, EnsembleError> {
        if !topology.is_joined() {
            topology.join();
        }
        let state = State::from_topology(&topology)?;
        let n = state.num_particles();
        info!(
            "Created ensemble with {} particles, {} bonds, {} angles, {} dihedrals, {} impropers.",
            n,
            topology.num_bonds(),
            topology.num_angles(),
            topology.num_dihedrals(),
            topology.num_impropers()
        );
        Ok(Self {
            topology,
            state,
            constraints: Vec::new(),
            forces: vec![Vector3::zeros(); n],
            term_energies: Vec::new(),
            potential_energy: 0.0,
            kinetic_energy: 0.0,
        })
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }

    pub fn num_particles(&self) -> usize {
        self.state.num_particles()
    }

    /// Binds `constraint` to this ensemble's topology and registers it.
    ///
    /// A term that is already bound is rejected with [`EnsembleError::ConstraintConflict`].
    /// Terms with a cutoff widen the cell list when they need a larger radius.
    pub fn add_constraint(
        &mut self,
        mut constraint: Box<dyn Constraint>,
    ) -> Result<(), EnsembleError> {
        if constraint.is_bound() {
            return Err(EnsembleError::ConstraintConflict {
                term: constraint.name(),
            });
        }
        constraint.bind(&self.topology)?;
        if let Some(cutoff) = constraint.cutoff_radius() {
            self.state.raise_cutoff(cutoff);
        }
        debug!("Registered term '{}'.", constraint.name());
        self.constraints.push(constraint);
        self.term_energies.push(0.0);
        Ok(())
    }

    pub fn add_constraints<I>(&mut self, constraints: I) -> Result<(), EnsembleError>
    where
        I: IntoIterator<Item = Box<dyn Constraint>>,
    {
        for constraint in constraints {
            self.add_constraint(constraint)?;
        }
        Ok(())
    }

    pub fn constraints(&self) -> &[Box<dyn Constraint>] {
        &self.constraints
    }

    /// Evaluates every term at the current positions and refreshes all cached quantities.
    pub fn update(&mut self) -> Result<(), EnsembleError> {
        let frame = self.state.frame();
        self.forces.iter_mut().for_each(|f| *f = Vector3::zeros());
        self.potential_energy = 0.0;

        for (constraint, term_energy) in self.constraints.iter_mut().zip(&mut self.term_energies) {
            constraint.update(&frame)?;
            let energy = constraint.potential_energy()?;
            let forces = constraint.forces()?;
            if !energy.is_finite() {
                warn!("Term '{}' returned energy {}.", constraint.name(), energy);
                return Err(EnsembleError::NonFiniteEnergy {
                    term: constraint.name(),
                    quantity: "energy",
                });
            }
            if forces.iter().any(|f| !f.iter().all(|c| c.is_finite())) {
                warn!("Term '{}' returned non-finite forces.", constraint.name());
                return Err(EnsembleError::NonFiniteEnergy {
                    term: constraint.name(),
                    quantity: "force",
                });
            }
            for (total, f) in self.forces.iter_mut().zip(forces) {
                *total += f;
            }
            *term_energy = energy;
            self.potential_energy += energy;
        }

        self.refresh_kinetic_energy();
        Ok(())
    }

    /// Recomputes the kinetic energy from the current velocities without touching forces.
    pub fn refresh_kinetic_energy(&mut self) {
        self.kinetic_energy = self
            .state
            .velocities()
            .iter()
            .zip(self.state.masses())
            .map(|(v, &m)| kinetic_energy(m, v.norm_squared()))
            .sum();
    }

    /// Summed forces in kcal/(mol·Å) from the last [`update`](Ensemble::update).
    pub fn forces(&self) -> &[Vector3<f64>] {
        &self.forces
    }

    pub fn potential_energy(&self) -> f64 {
        self.potential_energy
    }

    pub fn kinetic_energy(&self) -> f64 {
        self.kinetic_energy
    }

    pub fn total_energy(&self) -> f64 {
        self.potential_energy + self.kinetic_energy
    }

    /// Instantaneous temperature `2 KE / (3 N k_B)`; zero for an empty ensemble.
    pub fn temperature(&self) -> f64 {
        let n = self.num_particles();
        if n == 0 {
            return 0.0;
        }
        2.0 * self.kinetic_energy / (3.0 * n as f64 * BOLTZMANN_KCAL_PER_MOL_K)
    }

    /// Potential energy of each term from the last update, in registration order.
    pub fn energy_breakdown(&self) -> Vec<(&'static str, f64)> {
        self.constraints
            .iter()
            .zip(&self.term_energies)
            .map(|(c, &e)| (c.name(), e))
            .collect()
    }
}
