//! Pairwise terms evaluated between particles that are not bonded to each other.
//!
//! Pairs listed in the topology's exclusion table are skipped; pairs in its scaling table
//! (the outer particles of a dihedral) are evaluated with 1-4 parameters.

pub mod electrostatic;
pub mod lennard_jones;

use super::constraint::Frame;
use super::kernel::PairSearch;
use tracing::trace;

/// Pairs closer than this are treated as overlapping and skipped.
const MIN_DISTANCE_SQ: f64 = 1e-12;

/// Picks the cell list when one is present and wide enough for `cutoff`, otherwise all pairs.
pub(crate) fn pair_search<'a>(frame: &Frame<'a>, cutoff: Option<f64>) -> PairSearch<'a> {
    match (cutoff, frame.cell_list) {
        (Some(cutoff), Some(cell_list)) if cell_list.cutoff_radius() >= cutoff => {
            PairSearch::CellList(cell_list)
        }
        (Some(cutoff), Some(cell_list)) => {
            trace!(
                "Cell list cutoff {} is below the term cutoff {}; scanning all pairs.",
                cell_list.cutoff_radius(),
                cutoff
            );
            PairSearch::AllPairs
        }
        _ => PairSearch::AllPairs,
    }
}
