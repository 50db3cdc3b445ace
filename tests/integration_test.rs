use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use dicebattle::email::{DisclosurePolicy, Email, EmailError, EmailSender};
use dicebattle::game::RandomSource;
use dicebattle::reset::{Clock, ResetError};
use dicebattle::state::{AppState, ResetRequestOutcome};
use dicebattle::store::MemoryStore;
use dicebattle::types::{GameConfig, PlayerSlot, RoundWinner};

/// Dice that replay a scripted sequence of values.
struct ScriptedDice {
    rolls: Mutex<VecDeque<u32>>,
}

impl ScriptedDice {
    fn new(rolls: &[u32]) -> Arc<Self> {
        Arc::new(Self {
            rolls: Mutex::new(rolls.iter().copied().collect()),
        })
    }
}

impl RandomSource for ScriptedDice {
    fn next(&self, min: u32, _max: u32) -> u32 {
        self.rolls.lock().unwrap().pop_front().unwrap_or(min)
    }
}

/// Mailer that records every message, optionally failing each send.
struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
    fail: bool,
}

impl RecordingMailer {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail,
        })
    }

    fn last_token(&self) -> String {
        let sent = self.sent.lock().unwrap();
        let body = &sent.last().expect("no email recorded").body;
        body.split("?token=")
            .nth(1)
            .expect("email body has no token link")
            .split_whitespace()
            .next()
            .unwrap()
            .to_string()
    }
}

#[async_trait]
impl EmailSender for RecordingMailer {
    async fn send(&self, email: Email) -> Result<(), EmailError> {
        if self.fail {
            return Err(EmailError::Status(502));
        }
        self.sent.lock().unwrap().push(email);
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Adjustable test clock.
struct TestClock {
    now: Mutex<DateTime<Utc>>,
}

impl TestClock {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(Utc::now()),
        })
    }

    fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// End-to-end flow: signup, play a match to the winning threshold,
/// reset the board, and come back later to intact lifetime stats.
#[tokio::test]
async fn test_full_game_flow() {
    // Three rounds: p1 wins with 6, draw at 4-4, p2 wins with 5.
    let dice = ScriptedDice::new(&[6, 2, 4, 4, 3, 5]);
    let state = AppState::new(Arc::new(MemoryStore::new()))
        .with_rng(dice)
        .with_game_config(GameConfig { win_threshold: 6 });

    let session = state
        .signup("alice", "alice@example.com", "secret1")
        .await
        .expect("signup should succeed");

    // Round 1: player one scores 6 and, with threshold 6, wins the match.
    let report = state.roll_for_session(&session.token).await.unwrap();
    assert_eq!(report.outcome.winner, RoundWinner::PlayerOne);
    assert_eq!(report.match_state.player_one_score, 6);
    assert_eq!(report.match_winner, Some(PlayerSlot::One));
    assert_eq!(report.stats.player_one_wins, 1);

    // Round 2: a draw moves no scores, only counters.
    let report = state.roll_for_session(&session.token).await.unwrap();
    assert_eq!(report.outcome.winner, RoundWinner::Draw);
    assert_eq!(report.match_state.player_one_score, 6);
    assert_eq!(report.match_state.round_count, 2);
    assert_eq!(report.stats.draws, 1);

    // Round 3: player two gets on the board.
    let report = state.roll_for_session(&session.token).await.unwrap();
    assert_eq!(report.outcome.winner, RoundWinner::PlayerTwo);
    assert_eq!(report.match_state.player_two_score, 5);

    // Stats sum invariant after every round.
    let stats = report.stats;
    assert_eq!(
        stats.player_one_wins + stats.player_two_wins + stats.draws,
        stats.total_games
    );
    assert_eq!(stats.total_games, 3);

    // Resetting the match clears scores but not lifetime stats.
    let cleared = state.reset_match(&session.token).await.unwrap();
    assert_eq!(cleared.player_one_score, 0);
    assert_eq!(cleared.round_count, 0);
    assert_eq!(
        state.stats_for(&session.user.id).await.unwrap().total_games,
        3
    );

    // Log out, log back in: stats follow the identity, the match does not.
    assert!(state.end_session(&session.token).await);
    let session = state.login("alice", "secret1").await.unwrap();
    assert_eq!(session.match_state.round_count, 0);
    assert_eq!(
        state.stats_for(&session.user.id).await.unwrap().total_games,
        3
    );
}

/// Stats survive a process restart via the store snapshot.
#[tokio::test]
async fn test_stats_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");

    let user_id = {
        let store = Arc::new(MemoryStore::with_snapshot(path.clone()).await.unwrap());
        let state = AppState::new(store);
        let session = state
            .signup("alice", "alice@example.com", "secret1")
            .await
            .unwrap();
        for _ in 0..5 {
            state.roll_for_session(&session.token).await.unwrap();
        }
        session.user.id
    };

    let store = Arc::new(MemoryStore::with_snapshot(path).await.unwrap());
    let state = AppState::new(store);
    let session = state.login("alice", "secret1").await.unwrap();
    assert_eq!(session.user.id, user_id);

    let stats = state.stats_for(&user_id).await.unwrap();
    assert_eq!(stats.total_games, 5);
    assert_eq!(
        stats.player_one_wins + stats.player_two_wins + stats.draws,
        5
    );
}

/// Full password-reset flow: request, email, consume, re-login.
#[tokio::test]
async fn test_password_reset_flow() {
    let mailer = RecordingMailer::new(false);
    let mut state = AppState::new(Arc::new(MemoryStore::new())).with_mailer(mailer.clone());
    // Await sends so the recorded email is visible synchronously.
    state.disclosure = DisclosurePolicy::ReportFailure;

    let session = state
        .signup("alice", "alice@example.com", "secret1")
        .await
        .unwrap();

    let outcome = state
        .request_password_reset("alice@example.com")
        .await
        .unwrap();
    assert_eq!(outcome, ResetRequestOutcome::Sent);

    let token = mailer.last_token();
    state
        .complete_password_reset(&token, "a-new-password")
        .await
        .expect("reset should succeed");

    // The old session is gone and the old password no longer works.
    assert!(state.session(&session.token).await.is_none());
    assert!(state.login("alice", "secret1").await.is_err());
    assert!(state.login("alice", "a-new-password").await.is_ok());

    // The token was single-use.
    let again = state.complete_password_reset(&token, "yet-another").await;
    assert!(matches!(again, Err(ResetError::NotFound)));
}

/// A second request supersedes the first token instead of adding a row.
#[tokio::test]
async fn test_reissued_token_supersedes_first() {
    let mailer = RecordingMailer::new(false);
    let mut state = AppState::new(Arc::new(MemoryStore::new())).with_mailer(mailer.clone());
    state.disclosure = DisclosurePolicy::ReportFailure;

    state
        .signup("alice", "alice@example.com", "secret1")
        .await
        .unwrap();

    state
        .request_password_reset("alice@example.com")
        .await
        .unwrap();
    let first = mailer.last_token();

    state
        .request_password_reset("alice@example.com")
        .await
        .unwrap();
    let second = mailer.last_token();
    assert_ne!(first, second);

    assert!(matches!(
        state.complete_password_reset(&first, "a-new-password").await,
        Err(ResetError::NotFound)
    ));
    assert!(state
        .complete_password_reset(&second, "a-new-password")
        .await
        .is_ok());
}

/// Tokens expire after an hour; consuming a stale one removes it.
#[tokio::test]
async fn test_token_expiry_is_checked_at_consume_time() {
    let mailer = RecordingMailer::new(false);
    let clock = TestClock::new();
    let mut state = AppState::new(Arc::new(MemoryStore::new()))
        .with_mailer(mailer.clone())
        .with_clock(clock.clone());
    state.disclosure = DisclosurePolicy::ReportFailure;

    state
        .signup("alice", "alice@example.com", "secret1")
        .await
        .unwrap();
    state
        .request_password_reset("alice@example.com")
        .await
        .unwrap();
    let token = mailer.last_token();

    clock.advance(Duration::minutes(90));

    let result = state.complete_password_reset(&token, "a-new-password").await;
    assert!(matches!(result, Err(ResetError::Expired)));

    // Lazy cleanup: the row is gone now.
    let result = state.complete_password_reset(&token, "a-new-password").await;
    assert!(matches!(result, Err(ResetError::NotFound)));
}

/// Under the generic disclosure policy a broken mailer never surfaces:
/// the request still counts as sent and the token still works.
#[tokio::test]
async fn test_generic_policy_hides_email_failure() {
    let mailer = RecordingMailer::new(true);
    let state = AppState::new(Arc::new(MemoryStore::new())).with_mailer(mailer);

    state
        .signup("alice", "alice@example.com", "secret1")
        .await
        .unwrap();

    let outcome = state
        .request_password_reset("alice@example.com")
        .await
        .unwrap();
    assert_eq!(outcome, ResetRequestOutcome::Sent);
}

/// Unknown addresses look exactly like known ones from the outside.
#[tokio::test]
async fn test_unknown_email_issues_no_token() {
    let mailer = RecordingMailer::new(false);
    let state = AppState::new(Arc::new(MemoryStore::new())).with_mailer(mailer.clone());

    let outcome = state
        .request_password_reset("ghost@example.com")
        .await
        .unwrap();
    assert_eq!(outcome, ResetRequestOutcome::UnknownEmail);
    assert!(mailer.sent.lock().unwrap().is_empty());
}
