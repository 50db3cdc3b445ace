use crate::types::{MatchState, PlayerSlot, RoundOutcome, RoundWinner};
use rand::Rng;

/// Supplies uniformly distributed integers over an inclusive range.
pub trait RandomSource: Send + Sync {
    fn next(&self, min: u32, max: u32) -> u32;
}

/// Production source backed by the thread-local RNG.
pub struct ThreadRngSource;

impl RandomSource for ThreadRngSource {
    fn next(&self, min: u32, max: u32) -> u32 {
        rand::rng().random_range(min..=max)
    }
}

/// Roll one round: two independent uniform draws in 1..=6.
pub fn roll_round(rng: &dyn RandomSource) -> RoundOutcome {
    let player_one_roll = rng.next(1, 6) as u8;
    let player_two_roll = rng.next(1, 6) as u8;
    RoundOutcome::new(player_one_roll, player_two_roll)
}

/// Apply a round outcome to the match state.
///
/// The winner's own roll value is added to their score; a draw changes
/// neither score. The round counter always advances by exactly one.
pub fn apply_outcome(state: &MatchState, outcome: &RoundOutcome) -> MatchState {
    let mut next = state.clone();
    match outcome.winner {
        RoundWinner::PlayerOne => next.player_one_score += outcome.player_one_roll as u32,
        RoundWinner::PlayerTwo => next.player_two_score += outcome.player_two_roll as u32,
        RoundWinner::Draw => {}
    }
    next.round_count += 1;
    next
}

/// Check whether a player has won the match.
///
/// A player wins by reaching the threshold while strictly ahead of the
/// opponent. If both sit at or above the threshold with equal scores,
/// nobody has won yet and play continues.
pub fn check_match_winner(state: &MatchState, threshold: u32) -> Option<PlayerSlot> {
    if state.player_one_score >= threshold && state.player_one_score > state.player_two_score {
        Some(PlayerSlot::One)
    } else if state.player_two_score >= threshold && state.player_two_score > state.player_one_score
    {
        Some(PlayerSlot::Two)
    } else {
        None
    }
}
