//! Round resolution, match-win detection, and statistics aggregation.
//!
//! Everything in this module is a pure transform over explicit values:
//! callers thread `MatchState` and `GameStats` through and decide when to
//! persist. The only capability consumed is a [`RandomSource`].

mod round;
mod stats;

pub use round::{apply_outcome, check_match_winner, roll_round, RandomSource, ThreadRngSource};
pub use stats::record_stats;
