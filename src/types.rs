use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type UserId = String;
pub type SessionToken = String;

/// The two seats at the dice table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlayerSlot {
    One,
    Two,
}

/// Outcome of a single round from the scoring side's perspective.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoundWinner {
    PlayerOne,
    PlayerTwo,
    Draw,
}

/// One dice-roll exchange. Produced once per round and never mutated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoundOutcome {
    /// Player one's roll, in 1..=6
    pub player_one_roll: u8,
    /// Player two's roll, in 1..=6
    pub player_two_roll: u8,
    pub winner: RoundWinner,
}

impl RoundOutcome {
    /// Build an outcome from two rolls, deriving the winner:
    /// higher roll wins, equal rolls draw.
    pub fn new(player_one_roll: u8, player_two_roll: u8) -> Self {
        let winner = if player_one_roll > player_two_roll {
            RoundWinner::PlayerOne
        } else if player_two_roll > player_one_roll {
            RoundWinner::PlayerTwo
        } else {
            RoundWinner::Draw
        };
        Self {
            player_one_roll,
            player_two_roll,
            winner,
        }
    }
}

/// Cumulative state of the match in progress.
///
/// Scores only ever increase; the whole value is replaced by zeroes on an
/// explicit match reset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MatchState {
    pub player_one_score: u32,
    pub player_two_score: u32,
    pub round_count: u32,
}

/// Lifetime per-user round statistics.
///
/// Invariant: `player_one_wins + player_two_wins + draws == total_games`.
/// A match-level win does not touch these counters, only round outcomes do.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameStats {
    pub player_one_wins: u32,
    pub player_two_wins: u32,
    pub draws: u32,
    pub total_games: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Score a player must reach (while strictly ahead) to win the match
    pub win_threshold: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self { win_threshold: 50 }
    }
}

impl GameConfig {
    /// Load config from environment variables
    pub fn from_env() -> Self {
        let win_threshold = std::env::var("WIN_THRESHOLD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(50);
        Self { win_threshold }
    }
}

/// A registered account. The credential is an opaque bcrypt hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}
