//! # Core Models Module
//!
//! Data structures describing *what* is simulated: particles and their connectivity.
//!
//! - [`particle`] - A single interaction site with mass, charge, type and adjacency bookkeeping
//! - [`topology`] - The ordered particle arena plus bonds, angles, dihedrals and impropers, and
//!   the dense per-particle arrays produced by joining it
//!
//! Everything outside the topology refers to particles by their dense `matrix_id`, never by
//! reference, which keeps ownership a simple tree rooted at the ensemble.
//!
//! ```ignore
//! use mdflow::core::models::{particle::Particle, topology::Topology};
//!
//! let mut topology = Topology::new();
//! topology.add_particles(vec![
//!     Particle::new(1, "C", "C1", 12.011, 0.0),
//!     Particle::new(2, "C", "C2", 12.011, 0.0),
//! ])?;
//! topology.add_bond(&[0, 1])?;
//! topology.join();
//! ```

pub mod particle;
pub mod topology;
