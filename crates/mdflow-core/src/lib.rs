//! # mdflow Core Library
//!
//! A molecular-dynamics engine that maintains particle connectivity, evaluates a pluggable set of
//! force-field terms under periodic boundary conditions, and advances particles in time.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Particle`, `Topology`), spatial indexing
//!   (`PeriodicBox`, `CellList`), the parameter dictionary and every force-field term
//!   (`Constraint` implementations with host and accelerator kernels).
//!
//! - **[`engine`]: The Logic Core.** The stateful layer: `State` owns positions, velocities and the
//!   cell list, `Ensemble` aggregates bound terms into forces and energies, and the integrators and
//!   minimizers move the system.
//!
//! - **[`workflows`]: The Public API.** Complete procedures, such as a minimize-then-integrate
//!   simulation run with periodic energy records.

pub mod core;
pub mod engine;
pub mod workflows;
