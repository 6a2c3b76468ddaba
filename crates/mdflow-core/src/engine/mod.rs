//! # Engine Module
//!
//! The stateful simulation layer built on top of [`crate::core`].
//!
//! ## Overview
//!
//! The engine owns everything that changes during a run: particle positions and velocities,
//! the set of bound force-field terms, the cached forces and energies, and the history carried
//! by integrators between calls.
//!
//! ## Architecture
//!
//! - **State** ([`state`]) - Positions, velocities, masses, the periodic box and the cell list
//!   that is rebuilt whenever positions change
//! - **Ensemble** ([`ensemble`]) - Topology, state and bound terms; `update()` is the single
//!   point where forces and energies are recomputed
//! - **Integrators** ([`integrator`]) - Position Verlet and BBK Langevin dynamics
//! - **Minimizers** ([`minimizer`]) - The minimization contract and steepest descent
//! - **Configuration** ([`config`]) - Builder-validated run settings
//! - **Progress** ([`progress`]) - Callback-based progress events for front ends
//! - **Errors** ([`error`]) - The aggregate error returned by workflows
//!
//! ## Ordering
//!
//! `State::set_positions` rebuilds the cell list before returning, and `Ensemble::update`
//! evaluates every term before any force is read. Integrator steps run strictly in sequence;
//! only the work inside a single term evaluation may run in parallel.

pub mod config;
pub mod ensemble;
pub mod error;
pub mod integrator;
pub mod minimizer;
pub mod progress;
pub mod state;
