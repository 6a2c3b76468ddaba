use crate::core::forcefield::constraint::Frame;
use crate::core::models::topology::{Topology, TopologyError};
use crate::core::spatial::cell_list::CellList;
use crate::core::spatial::pbc::{PbcError, PeriodicBox};
use crate::core::units::thermal_velocity_variance;
use nalgebra::{Matrix3, Vector3};
use rand::Rng;
use rand::distributions::{Distribution, Uniform};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StateError {
    #[error("{0}")]
    PbcPoorDefined(#[from] PbcError),
    #[error("Expected {expected} {what} rows, got {found}")]
    ArrayDim {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Invalid temperature: {0} K (must be finite and non-negative)")]
    InvalidTemperature(f64),
    #[error("Particle {index} has non-positive mass {mass}")]
    InvalidMass { index: usize, mass: f64 },
    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),
}

/// Positions, velocities and periodic box of a simulated system.
///
/// The cell list is rebuilt on every [`set_positions`](State::set_positions) call, so its
/// membership always matches the stored positions. Without a box the cell list stays empty and
/// nonbonded terms fall back to scanning all pairs.
#[derive(Debug, Clone)]
pub struct State {
    positions: Vec<Vector3<f64>>,
    velocities: Vec<Vector3<f64>>,
    masses: Vec<f64>,
    pbc: Option<PeriodicBox>,
    cell_list: CellList,
}

impl State {
    /// Zero positions and velocities for every particle of a joined topology.
    pub fn from_topology(topology: &Topology) -> Result<Self, StateError> {
        let masses = topology.dense()?.masses.clone();
        let n = masses.len();
        Ok(Self {
            positions: vec![Vector3::zeros(); n],
            velocities: vec![Vector3::zeros(); n],
            masses,
            pbc: None,
            cell_list: CellList::new(0.0),
        })
    }

    pub fn num_particles(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[Vector3<f64>] {
        &self.positions
    }

    pub fn velocities(&self) -> &[Vector3<f64>] {
        &self.velocities
    }

    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    pub fn pbc(&self) -> Option<&PeriodicBox> {
        self.pbc.as_ref()
    }

    /// Box vectors as matrix columns.
    pub fn pbc_matrix(&self) -> Option<&Matrix3<f64>> {
        self.pbc.as_ref().map(PeriodicBox::matrix)
    }

    pub fn pbc_inverse(&self) -> Option<&Matrix3<f64>> {
        self.pbc.as_ref().map(PeriodicBox::inverse)
    }

    pub fn cell_list(&self) -> &CellList {
        &self.cell_list
    }

    pub fn cutoff_radius(&self) -> f64 {
        self.cell_list.cutoff_radius()
    }

    /// Installs a periodic box whose vectors are the columns of `matrix`.
    ///
    /// Fails with [`StateError::PbcPoorDefined`] for singular or non-finite matrices, leaving the
    /// previous box in place.
    pub fn set_pbc_matrix(&mut self, matrix: Matrix3<f64>) -> Result<(), StateError> {
        let pbc = PeriodicBox::new(matrix)?;
        debug!("Periodic box set, volume {:.3} Å³.", pbc.volume());
        self.pbc = Some(pbc);
        self.rebuild_cell_list();
        Ok(())
    }

    pub fn set_positions(&mut self, positions: &[Vector3<f64>]) -> Result<(), StateError> {
        self.check_len("position", positions.len())?;
        self.positions.copy_from_slice(positions);
        self.rebuild_cell_list();
        Ok(())
    }

    pub fn set_velocities(&mut self, velocities: &[Vector3<f64>]) -> Result<(), StateError> {
        self.check_len("velocity", velocities.len())?;
        self.velocities.copy_from_slice(velocities);
        Ok(())
    }

    /// Draws each velocity component from a zero-centred uniform distribution whose variance is
    /// `k_B T / m`, i.e. half-width `sqrt(3 k_B T / m)`.
    pub fn set_velocities_to_temperature<R: Rng + ?Sized>(
        &mut self,
        temperature: f64,
        rng: &mut R,
    ) -> Result<(), StateError> {
        if !temperature.is_finite() || temperature < 0.0 {
            return Err(StateError::InvalidTemperature(temperature));
        }
        if let Some((index, &mass)) = self.masses.iter().enumerate().find(|(_, m)| **m <= 0.0) {
            return Err(StateError::InvalidMass { index, mass });
        }

        for (velocity, &mass) in self.velocities.iter_mut().zip(&self.masses) {
            let half_width = (3.0 * thermal_velocity_variance(temperature, mass)).sqrt();
            let distribution = Uniform::new_inclusive(-half_width, half_width);
            *velocity = Vector3::from_fn(|_, _| distribution.sample(rng));
        }
        info!(
            "Assigned velocities for {} particles at {} K.",
            self.velocities.len(),
            temperature
        );
        Ok(())
    }

    /// `r_j - r_i`, reduced to the minimum image when a box is set.
    pub fn displacement(&self, i: usize, j: usize) -> Vector3<f64> {
        let d = self.positions[j] - self.positions[i];
        match &self.pbc {
            Some(pbc) => pbc.minimum_image(&d),
            None => d,
        }
    }

    /// Maps every position into the primary image of the box. No-op without a box.
    pub fn wrap_positions(&mut self) {
        if let Some(pbc) = &self.pbc {
            for position in &mut self.positions {
                *position = pbc.wrap(position);
            }
            self.rebuild_cell_list();
        }
    }

    /// Read-only view handed to force-field terms.
    pub fn frame(&self) -> Frame<'_> {
        Frame {
            positions: &self.positions,
            pbc: self.pbc.as_ref(),
            cell_list: self.pbc.as_ref().map(|_| &self.cell_list),
        }
    }

    /// Grows the cell-list cutoff to at least `cutoff`; never shrinks it.
    pub(crate) fn raise_cutoff(&mut self, cutoff: f64) {
        if cutoff > self.cell_list.cutoff_radius() {
            debug!(
                "Raising cell-list cutoff from {} to {} Å.",
                self.cell_list.cutoff_radius(),
                cutoff
            );
            self.cell_list.set_cutoff_radius(cutoff);
            self.rebuild_cell_list();
        }
    }

    fn rebuild_cell_list(&mut self) {
        if let Some(pbc) = &self.pbc {
            self.cell_list.build(&self.positions, pbc);
        }
    }

    fn check_len(&self, what: &'static str, found: usize) -> Result<(), StateError> {
        if found != self.positions.len() {
            return Err(StateError::ArrayDim {
                what,
                expected: self.positions.len(),
                found,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::particle::Particle;
    use crate::core::units::BOLTZMANN_KCAL_PER_MOL_K;
    use crate::core::units::kinetic_energy;
    use rand::{SeedableRng, rngs::StdRng};

    fn argon(n: usize) -> State {
        let mut topology = Topology::new();
        topology
            .add_particles((0..n).map(|i| Particle::new(i as i64, "Ar", "AR", 39.948, 0.0)))
            .unwrap();
        topology.join();
        State::from_topology(&topology).unwrap()
    }

    #[test]
    fn requires_joined_topology() {
        let topology = Topology::new();
        assert_eq!(
            State::from_topology(&topology).unwrap_err(),
            StateError::Topology(TopologyError::NotJoined)
        );
    }

    #[test]
    fn set_positions_round_trips_exactly() {
        let mut state = argon(3);
        let positions = vec![
            Vector3::new(0.1, 0.2, 0.3),
            Vector3::new(-4.0, 5.5, 1e-9),
            Vector3::new(1e6, -2.0, 3.25),
        ];
        state.set_positions(&positions).unwrap();
        assert_eq!(state.positions(), positions.as_slice());
    }

    #[test]
    fn setters_reject_wrong_row_count() {
        let mut state = argon(3);
        assert_eq!(
            state.set_positions(&[Vector3::zeros(); 2]),
            Err(StateError::ArrayDim {
                what: "position",
                expected: 3,
                found: 2
            })
        );
        assert!(matches!(
            state.set_velocities(&[Vector3::zeros(); 4]),
            Err(StateError::ArrayDim { what: "velocity", .. })
        ));
    }

    #[test]
    fn pbc_matrix_and_inverse_are_consistent() {
        let mut state = argon(1);
        let matrix = Matrix3::new(20.0, 4.0, 0.0, 0.0, 18.0, 2.0, 0.0, 0.0, 15.0);
        state.set_pbc_matrix(matrix).unwrap();
        assert_eq!(state.pbc_matrix(), Some(&matrix));
        let product = state.pbc_matrix().unwrap() * state.pbc_inverse().unwrap();
        assert!((product - Matrix3::identity()).amax() < 1e-12);
    }

    #[test]
    fn singular_box_is_rejected_and_previous_box_kept() {
        let mut state = argon(1);
        state.set_pbc_matrix(Matrix3::from_diagonal_element(10.0)).unwrap();
        let result = state.set_pbc_matrix(Matrix3::from_diagonal(&Vector3::new(1.0, 0.0, 1.0)));
        assert!(matches!(result, Err(StateError::PbcPoorDefined(_))));
        assert_eq!(state.pbc_matrix(), Some(&Matrix3::from_diagonal_element(10.0)));
    }

    #[test]
    fn cell_list_follows_positions() {
        let mut state = argon(2);
        state.set_pbc_matrix(Matrix3::from_diagonal_element(10.0)).unwrap();
        state.raise_cutoff(2.0);
        state
            .set_positions(&[Vector3::new(0.5, 0.5, 0.5), Vector3::new(5.5, 5.5, 5.5)])
            .unwrap();
        assert!(!state.cell_list().candidates(0).any(|j| j == 1));

        state
            .set_positions(&[Vector3::new(0.5, 0.5, 0.5), Vector3::new(9.5, 0.5, 0.5)])
            .unwrap();
        assert!(state.cell_list().candidates(0).any(|j| j == 1));
        assert!(state.frame().cell_list.is_some());
    }

    #[test]
    fn raise_cutoff_never_shrinks() {
        let mut state = argon(1);
        state.raise_cutoff(8.0);
        state.raise_cutoff(3.0);
        assert_eq!(state.cutoff_radius(), 8.0);
    }

    #[test]
    fn wrap_positions_and_minimum_image_displacement() {
        let mut state = argon(2);
        state.set_pbc_matrix(Matrix3::from_diagonal_element(10.0)).unwrap();
        state
            .set_positions(&[Vector3::new(-0.5, 0.0, 0.0), Vector3::new(10.5, 0.0, 0.0)])
            .unwrap();
        assert!((state.displacement(0, 1) - Vector3::new(1.0, 0.0, 0.0)).norm() < 1e-12);

        state.wrap_positions();
        assert!((state.positions()[0] - Vector3::new(9.5, 0.0, 0.0)).norm() < 1e-12);
        assert!((state.positions()[1] - Vector3::new(0.5, 0.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn velocities_match_target_temperature_on_average() {
        let mut state = argon(3000);
        let mut rng = StdRng::seed_from_u64(2024);
        state.set_velocities_to_temperature(300.0, &mut rng).unwrap();

        let ke: f64 = state
            .velocities()
            .iter()
            .zip(state.masses())
            .map(|(v, &m)| kinetic_energy(m, v.norm_squared()))
            .sum();
        let temperature = 2.0 * ke / (3.0 * 3000.0 * BOLTZMANN_KCAL_PER_MOL_K);
        assert!((temperature - 300.0).abs() < 15.0, "got {temperature} K");

        let half_width = (3.0 * thermal_velocity_variance(300.0, 39.948)).sqrt();
        assert!(
            state
                .velocities()
                .iter()
                .all(|v| v.iter().all(|c| c.abs() <= half_width))
        );
    }

    #[test]
    fn invalid_temperature_is_rejected() {
        let mut state = argon(2);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            state.set_velocities_to_temperature(-1.0, &mut rng),
            Err(StateError::InvalidTemperature(-1.0))
        );
        state.set_velocities_to_temperature(0.0, &mut rng).unwrap();
        assert!(state.velocities().iter().all(|v| v.norm() == 0.0));
    }
}
