//! # Force Field Module
//!
//! Force-field terms that turn a frame of particle positions into per-particle forces and a
//! potential energy.
//!
//! ## Overview
//!
//! Every term implements the [`constraint::Constraint`] trait. A term is constructed with its
//! parameters and an execution [`kernel::Kernel`], bound once to a joined
//! [`Topology`](crate::core::models::topology::Topology), and then updated once per step:
//!
//! - **Bonded terms** ([`bonded`]) - harmonic bonds, harmonic angles with an optional
//!   Urey-Bradley term, periodic dihedrals and harmonic impropers
//! - **Nonbonded terms** ([`nonbonded`]) - truncated Lennard-Jones with 1-4 parameters and
//!   direct-space Coulomb
//!
//! ## Key Components
//!
//! - [`params`] - The parameter dictionary keyed by particle-type strings, loadable from TOML
//! - [`potentials`] - Closed-form energies and their derivatives
//! - [`kernel`] - Host and accelerator execution paths with lock-free force accumulation
//! - [`constraint`] - The term contract and the [`constraint::Frame`] view handed to updates
//!
//! ## Usage
//!
//! ```ignore
//! use mdflow::core::forcefield::bonded::bond::HarmonicBond;
//! use mdflow::core::forcefield::kernel::Kernel;
//!
//! let mut bond = HarmonicBond::new(params.clone(), Kernel::Host);
//! bond.bind(&topology)?;
//! bond.update(&frame)?;
//! let energy = bond.potential_energy()?;
//! ```

pub mod bonded;
pub mod constraint;
pub mod kernel;
pub mod nonbonded;
pub mod params;
pub mod potentials;
