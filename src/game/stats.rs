use crate::types::{GameStats, RoundOutcome, RoundWinner};

/// Fold a round outcome into the lifetime counters.
///
/// `total_games` advances on every call; exactly one of the win/draw
/// counters advances with it, so the counter sum always equals
/// `total_games`. Persisting the returned value is the caller's job.
pub fn record_stats(stats: &GameStats, outcome: &RoundOutcome) -> GameStats {
    let mut next = stats.clone();
    match outcome.winner {
        RoundWinner::PlayerOne => next.player_one_wins += 1,
        RoundWinner::PlayerTwo => next.player_two_wins += 1,
        RoundWinner::Draw => next.draws += 1,
    }
    next.total_games += 1;
    next
}
