//! Periodic geometry and neighbor bookkeeping.
//!
//! [`pbc::PeriodicBox`] owns the box matrix and its inverse; [`cell_list::CellList`] buckets
//! particles so that nonbonded terms with a finite cutoff only visit nearby partners.

pub mod cell_list;
pub mod pbc;
