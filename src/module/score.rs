//! Load scoring for registry selection.

use super::{Counts, Module};

/// The default score: in-flight work dominates, so a busy replica prices
/// itself out of selection quickly.
pub fn calculate_score_simple(counts: Counts) -> u64 {
    counts.called_count
        + (counts.accepted_count << 1)
        + (counts.completed_count << 2)
        + (counts.handling_number << 4)
}

/// Recomputes and stores a module's score using its own calculator or the
/// default. Returns whether the stored value changed.
pub fn refresh_score(module: &dyn Module) -> bool {
    let new_score = match module.score_calculator() {
        Some(calculator) => calculator(module.counts()),
        None => calculate_score_simple(module.counts()),
    };
    if new_score == module.score() {
        return false;
    }
    module.set_score(new_score);
    true
}
