//! # Workflows Module
//!
//! End-to-end procedures built from the engine layer.
//!
//! ## Overview
//!
//! A workflow takes a prepared [`Ensemble`](crate::engine::ensemble::Ensemble) together with a
//! validated configuration and drives it through a complete run, reporting progress through a
//! [`ProgressReporter`](crate::engine::progress::ProgressReporter) and returning the collected
//! results.
//!
//! ## Available Workflows
//!
//! - **Simulation** ([`simulate`]) - Optional minimization, velocity seeding, then integration in
//!   report-sized chunks with one energy record per chunk.

pub mod simulate;
