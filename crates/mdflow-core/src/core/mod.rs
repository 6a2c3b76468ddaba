//! # Core Module
//!
//! The fundamental building blocks of the engine: molecular models, spatial indexing under
//! periodic boundary conditions, and the force-field terms.
//!
//! - **Molecular Representation** ([`models`]) - Particles, connectivity tuples and the dense
//!   per-particle arrays produced by joining a topology
//! - **Spatial Indexing** ([`spatial`]) - Periodic box geometry and the cell list used for
//!   neighbor enumeration
//! - **Force Field** ([`forcefield`]) - Parameter dictionary, potentials, execution kernels and
//!   the bonded/nonbonded terms
//! - **Units** ([`units`]) - Physical constants expressed in the engine's unit system

pub mod forcefield;
pub mod models;
pub mod spatial;
pub mod units;
