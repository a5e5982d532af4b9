//! Conversation state machine — the stateful heart of the orchestrator.
//!
//! Every inbound chat message passes through [`handle_turn`]: the session is
//! loaded (created lazily on first contact), the message is classified or —
//! when a PIN challenge is pending — parsed as a PIN entry, collaborators
//! are consulted, and exactly one inbound plus one outbound turn is appended
//! to the history. Turn appends, pending-action changes, and any booking
//! created by the turn commit in a single transaction, so a store failure
//! records nothing and the same message is safe to retry.
//!
//! Ordering: turns for one user are serialized by that user's lock in
//! `CoreState`; users never share a turn lock.

pub mod intent;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::booking::{self, LedgerError};
use crate::core_state::{CoreError, CoreState};
use crate::db::repository;
use crate::models::{PendingAction, TurnRole};
use crate::report_gate::{self, GateError};

use intent::Intent;

const MAX_MESSAGE_LEN: usize = 2000;

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Response shape for `POST /api/chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub message: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ReplyKind>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tests: Vec<TestRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    Suggestions,
    ActionRequired,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestRef {
    pub code: String,
    pub name: String,
}

impl ChatReply {
    fn plain(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: None,
            tests: Vec::new(),
            action: None,
        }
    }

    fn suggestions(message: impl Into<String>, tests: Vec<TestRef>) -> Self {
        Self {
            message: message.into(),
            kind: Some(ReplyKind::Suggestions),
            tests,
            action: None,
        }
    }

    fn verify_pin(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: Some(ReplyKind::ActionRequired),
            tests: Vec::new(),
            action: Some("verify_pin"),
        }
    }
}

/// Process one chat message for `user_id` and produce the reply.
pub async fn handle_turn(
    core: &CoreState,
    user_id: &str,
    text: &str,
) -> Result<ChatReply, TurnError> {
    let user_id = user_id.trim();
    let text = text.trim();
    if user_id.is_empty() {
        return Err(TurnError::Validation("user_id cannot be empty".into()));
    }
    if text.is_empty() {
        return Err(TurnError::Validation("Message cannot be empty".into()));
    }
    if text.len() > MAX_MESSAGE_LEN {
        return Err(TurnError::Validation(
            "Message too long (max 2000 chars)".into(),
        ));
    }

    // One logical turn at a time per user.
    let _turn_guard = core.user_lock(user_id).await;
    let now = Utc::now();

    let keep = core.config.max_turns_retained;
    let session = core.with_db(|conn| {
        let session = repository::ensure_session(conn, user_id, now)?;
        // Retention runs between turns, never while one is in flight.
        repository::trim_turns(conn, user_id, keep)?;
        Ok(session)
    })?;

    match session.pending {
        PendingAction::AwaitingPin { booking_hint } => {
            pin_turn(core, user_id, text, booking_hint.as_deref(), now).await
        }
        PendingAction::None => idle_turn(core, user_id, text, now).await,
    }
}

// ─── Idle state ──────────────────────────────────────────────────────────────

async fn idle_turn(
    core: &CoreState,
    user_id: &str,
    text: &str,
    now: DateTime<Utc>,
) -> Result<ChatReply, TurnError> {
    match intent::classify(text, now) {
        Intent::BookingCommand { test_code, when } => {
            booking_turn(core, user_id, text, &test_code, when, now)
        }
        Intent::ReportRequest => {
            let pending = PendingAction::AwaitingPin {
                booking_hint: intent::extract_booking_hint(text),
            };
            let reply = ChatReply::verify_pin(
                "To view a report, please share your booking ID and your 4-digit PIN.",
            );
            finish(core, user_id, text, &reply, Some(&pending), now)?;
            Ok(reply)
        }
        Intent::Smalltalk => {
            let reply = ChatReply::plain(
                "Hi! I'm Laura. Tell me how you're feeling, or say \"book CBC tomorrow 10am\" to schedule a test.",
            );
            finish(core, user_id, text, &reply, None, now)?;
            Ok(reply)
        }
        Intent::SymptomReport => {
            // Scoring runs before any mutation; a timeout degrades to an
            // empty list and the turn still completes.
            let suggestions = core.matcher.suggest(text).await;
            let reply = if suggestions.is_empty() {
                ChatReply::plain(
                    "I couldn't match that to a specific test. Could you describe your symptoms a little more?",
                )
            } else {
                let tests = suggestions
                    .iter()
                    .map(|s| TestRef {
                        code: s.test.code.clone(),
                        name: s.test.name.clone(),
                    })
                    .collect();
                ChatReply::suggestions(
                    "Based on what you describe, these tests could help. You can book one with \"book <code> <date>\".",
                    tests,
                )
            };
            finish(core, user_id, text, &reply, None, now)?;
            Ok(reply)
        }
    }
}

fn booking_turn(
    core: &CoreState,
    user_id: &str,
    text: &str,
    test_code: &str,
    when: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<ChatReply, TurnError> {
    let Some(test) = core.catalog.get(test_code) else {
        let reply = ChatReply::plain(format!(
            "I don't know a test called {test_code}. Check the Tests tab for the full catalog."
        ));
        finish(core, user_id, text, &reply, None, now)?;
        return Ok(reply);
    };

    let Some(scheduled_at) = when else {
        let reply = ChatReply::plain(format!(
            "When should I schedule {}? Try \"book {} tomorrow 10am\" or a date like 2026-08-15T09:30.",
            booking::describe_test(test),
            test.code
        ));
        finish(core, user_id, text, &reply, None, now)?;
        return Ok(reply);
    };

    if scheduled_at <= now {
        let reply =
            ChatReply::plain("That time is already in the past — please pick a future slot.");
        finish(core, user_id, text, &reply, None, now)?;
        return Ok(reply);
    }

    // Booking insert and turn appends commit together.
    let reply = core.with_db(|conn| {
        let tx = conn.transaction()?;
        let created = match booking::create_booking(
            &tx,
            &core.catalog,
            user_id,
            &test.code,
            scheduled_at,
            None,
            now,
        ) {
            Ok(created) => created,
            Err(LedgerError::Database(e)) => return Err(e),
            // Validated above; a domain rejection here still turns into a
            // polite reply rather than a failed turn.
            Err(other) => {
                let reply = ChatReply::plain(other.to_string());
                append_turn_pair(&tx, user_id, text, &reply.message, now)?;
                tx.commit()?;
                return Ok(reply);
            }
        };

        let reply = ChatReply::plain(format!(
            "Booked {} for {}. Your booking ID is {} and your PIN is {} — keep it safe, you'll need it to view your report.",
            booking::describe_test(test),
            created.booking.scheduled_at.format("%Y-%m-%d %H:%M UTC"),
            created.booking.id,
            created.pin
        ));
        append_turn_pair(&tx, user_id, text, &reply.message, now)?;
        tx.commit()?;
        Ok(reply)
    })?;

    Ok(reply)
}

// ─── AwaitingPin state ───────────────────────────────────────────────────────

async fn pin_turn(
    core: &CoreState,
    user_id: &str,
    text: &str,
    booking_hint: Option<&str>,
    now: DateTime<Utc>,
) -> Result<ChatReply, TurnError> {
    if intent::is_cancel(text) {
        let reply = ChatReply::plain("No problem, I've closed the report request. How else can I help?");
        finish(core, user_id, text, &reply, Some(&PendingAction::None), now)?;
        return Ok(reply);
    }

    let Some((booking_id, pin)) = intent::parse_pin_entry(text, booking_hint) else {
        // Unrelated or unparseable input: stay in AwaitingPin and re-prompt.
        let reply = ChatReply::verify_pin(
            "I still need your booking ID and 4-digit PIN to open the report. Say \"cancel\" to do something else.",
        );
        finish(core, user_id, text, &reply, None, now)?;
        return Ok(reply);
    };

    let verdict = core.with_db(|conn| {
        match report_gate::verify_and_fetch(conn, &booking_id, &pin, now, core.policy) {
            Err(GateError::Database(e)) => Err(e),
            other => Ok(other),
        }
    })?;

    let (reply, pending) = match verdict {
        Ok(document) => {
            let summary = document["summary"]
                .as_str()
                .unwrap_or("Your report is ready.");
            (
                ChatReply::plain(format!(
                    "Here is your report for booking {booking_id}: {summary}"
                )),
                Some(PendingAction::None),
            )
        }
        // Unknown booking reads the same as a wrong PIN.
        Err(GateError::NotFound) | Err(GateError::InvalidPin) => (
            ChatReply::verify_pin(
                "That booking ID and PIN combination doesn't match. Please check both and try again.",
            ),
            None,
        ),
        Err(GateError::Locked { retry_after_secs }) => {
            let minutes = retry_after_secs.div_ceil(60).max(1);
            (
                ChatReply::plain(format!(
                    "Too many incorrect attempts — report access is locked for about {minutes} minute(s). Please try again later."
                )),
                Some(PendingAction::None),
            )
        }
        Err(GateError::NotReady) => (
            ChatReply::plain(
                "You're verified, but the report isn't ready yet. Please check back once your sample has been processed.",
            ),
            Some(PendingAction::None),
        ),
        Err(GateError::Database(_)) => unreachable!("database errors handled above"),
    };

    finish(core, user_id, text, &reply, pending.as_ref(), now)?;
    Ok(reply)
}

// ─── Persistence ─────────────────────────────────────────────────────────────

/// Append the inbound/outbound turn pair and any pending-action change in
/// one transaction.
fn finish(
    core: &CoreState,
    user_id: &str,
    inbound: &str,
    reply: &ChatReply,
    pending: Option<&PendingAction>,
    now: DateTime<Utc>,
) -> Result<(), TurnError> {
    core.with_db(|conn| {
        let tx = conn.transaction()?;
        append_turn_pair(&tx, user_id, inbound, &reply.message, now)?;
        if let Some(pending) = pending {
            repository::set_pending_action(&tx, user_id, pending, now)?;
        }
        tx.commit()?;
        Ok(())
    })?;
    Ok(())
}

fn append_turn_pair(
    conn: &rusqlite::Connection,
    user_id: &str,
    inbound: &str,
    outbound: &str,
    now: DateTime<Utc>,
) -> Result<(), crate::db::DatabaseError> {
    repository::append_turn(conn, user_id, TurnRole::User, inbound, now)?;
    repository::append_turn(conn, user_id, TurnRole::Assistant, outbound, now)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookingStatus;

    fn turn_contents(core: &CoreState, user_id: &str) -> Vec<(TurnRole, String)> {
        core.with_db(|conn| {
            Ok(repository::list_turns(conn, user_id)?
                .into_iter()
                .map(|t| (t.role, t.content))
                .collect())
        })
        .unwrap()
    }

    fn pending_of(core: &CoreState, user_id: &str) -> PendingAction {
        core.with_db(|conn| Ok(repository::get_session(conn, user_id)?.unwrap().pending))
            .unwrap()
    }

    /// Create + complete a booking so its report is available.
    fn completed_booking(core: &CoreState, user_id: &str) -> (String, String) {
        core.with_db(|conn| {
            let now = Utc::now();
            let created = booking::create_booking(
                conn,
                &core.catalog,
                user_id,
                "CBC",
                now + chrono::Duration::days(1),
                None,
                now,
            )
            .map_err(|e| match e {
                LedgerError::Database(e) => e,
                other => panic!("{other}"),
            })?;
            let id = created.booking.id;
            booking::update_status(conn, &id, BookingStatus::Confirmed, now).unwrap();
            booking::update_status(conn, &id, BookingStatus::Completed, now).unwrap();
            Ok((id.to_string(), created.pin))
        })
        .unwrap()
    }

    fn wrong_pin(pin: &str) -> String {
        if pin == "0000" { "0001".into() } else { "0000".into() }
    }

    #[tokio::test]
    async fn symptom_report_yields_suggestions() {
        let core = CoreState::in_memory();
        let reply = handle_turn(&core, "u1", "I have fever and chills")
            .await
            .unwrap();

        assert_eq!(reply.kind, Some(ReplyKind::Suggestions));
        assert!(!reply.tests.is_empty());
        assert!(reply.tests.iter().any(|t| t.code == "CBC" || t.code == "MP"));
    }

    #[tokio::test]
    async fn every_turn_appends_inbound_and_outbound() {
        let core = CoreState::in_memory();
        handle_turn(&core, "u1", "I have fever and chills").await.unwrap();
        handle_turn(&core, "u1", "I have fever and chills").await.unwrap();

        let turns = turn_contents(&core, "u1");
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0].0, TurnRole::User);
        assert_eq!(turns[1].0, TurnRole::Assistant);
        assert_eq!(turns[2].0, TurnRole::User);
        assert_eq!(turns[0].1, turns[2].1);
    }

    #[tokio::test]
    async fn unmatched_symptoms_get_plain_fallback() {
        let core = CoreState::in_memory();
        let reply = handle_turn(&core, "u1", "zzz qqq unrelated words").await.unwrap();
        assert_eq!(reply.kind, None);
        assert!(reply.tests.is_empty());
    }

    #[tokio::test]
    async fn smalltalk_gets_plain_greeting() {
        let core = CoreState::in_memory();
        let reply = handle_turn(&core, "u1", "hello!").await.unwrap();
        assert_eq!(reply.kind, None);
        assert!(reply.message.contains("Laura"));
    }

    #[tokio::test]
    async fn booking_command_creates_booking_and_reveals_pin_once() {
        let core = CoreState::in_memory();
        let reply = handle_turn(&core, "u1", "book CBC tomorrow 10am").await.unwrap();

        assert!(reply.message.contains("Booked Complete Blood Count"));
        let bookings = core
            .with_db(|conn| Ok(repository::list_bookings_for_user(conn, "u1")?))
            .unwrap();
        assert_eq!(bookings.len(), 1);
        assert!(reply.message.contains(&bookings[0].id.to_string()));
    }

    #[tokio::test]
    async fn booking_command_with_unknown_test_creates_nothing() {
        let core = CoreState::in_memory();
        let reply = handle_turn(&core, "u1", "book XRAY tomorrow 10am").await.unwrap();

        assert!(reply.message.contains("XRAY"));
        let bookings = core
            .with_db(|conn| Ok(repository::list_bookings_for_user(conn, "u1")?))
            .unwrap();
        assert!(bookings.is_empty());
        // The failed command still records a full turn pair.
        assert_eq!(turn_contents(&core, "u1").len(), 2);
    }

    #[tokio::test]
    async fn booking_command_without_time_asks_for_one() {
        let core = CoreState::in_memory();
        let reply = handle_turn(&core, "u1", "book CBC").await.unwrap();
        assert!(reply.message.contains("When should I schedule"));
        let bookings = core
            .with_db(|conn| Ok(repository::list_bookings_for_user(conn, "u1")?))
            .unwrap();
        assert!(bookings.is_empty());
    }

    #[tokio::test]
    async fn report_request_moves_to_awaiting_pin() {
        let core = CoreState::in_memory();
        let reply = handle_turn(&core, "u1", "I want to see my report").await.unwrap();

        assert_eq!(reply.kind, Some(ReplyKind::ActionRequired));
        assert_eq!(reply.action, Some("verify_pin"));
        assert!(matches!(
            pending_of(&core, "u1"),
            PendingAction::AwaitingPin { .. }
        ));
    }

    #[tokio::test]
    async fn report_request_remembers_inline_booking_id() {
        let core = CoreState::in_memory();
        let (id, pin) = completed_booking(&core, "u1");

        handle_turn(&core, "u1", &format!("show my report for {id}"))
            .await
            .unwrap();
        // Only the PIN is needed now; the id came from the hint.
        let reply = handle_turn(&core, "u1", &pin).await.unwrap();
        assert!(reply.message.contains("Here is your report"));
        assert_eq!(pending_of(&core, "u1"), PendingAction::None);
    }

    #[tokio::test]
    async fn correct_pin_returns_report_and_goes_idle() {
        let core = CoreState::in_memory();
        let (id, pin) = completed_booking(&core, "u1");

        handle_turn(&core, "u1", "show me my report").await.unwrap();
        let reply = handle_turn(&core, "u1", &format!("{id} {pin}")).await.unwrap();

        assert!(reply.message.contains("Here is your report"));
        assert_eq!(pending_of(&core, "u1"), PendingAction::None);
    }

    #[tokio::test]
    async fn wrong_pin_stays_awaiting() {
        let core = CoreState::in_memory();
        let (id, pin) = completed_booking(&core, "u1");

        handle_turn(&core, "u1", "show me my report").await.unwrap();
        let reply = handle_turn(&core, "u1", &format!("{id} {}", wrong_pin(&pin)))
            .await
            .unwrap();

        assert!(reply.message.contains("doesn't match"));
        assert!(matches!(
            pending_of(&core, "u1"),
            PendingAction::AwaitingPin { .. }
        ));
    }

    #[tokio::test]
    async fn unrelated_text_while_awaiting_reprompts() {
        let core = CoreState::in_memory();
        handle_turn(&core, "u1", "show me my report").await.unwrap();
        let reply = handle_turn(&core, "u1", "I have fever and chills").await.unwrap();

        // Still awaiting: no suggestions, an explicit re-prompt instead.
        assert_eq!(reply.kind, Some(ReplyKind::ActionRequired));
        assert!(matches!(
            pending_of(&core, "u1"),
            PendingAction::AwaitingPin { .. }
        ));
    }

    #[tokio::test]
    async fn cancel_leaves_pin_flow() {
        let core = CoreState::in_memory();
        handle_turn(&core, "u1", "show me my report").await.unwrap();
        let reply = handle_turn(&core, "u1", "cancel").await.unwrap();

        assert!(reply.message.contains("closed the report request"));
        assert_eq!(pending_of(&core, "u1"), PendingAction::None);
    }

    #[tokio::test]
    async fn lockout_via_chat_returns_to_idle() {
        let core = CoreState::in_memory();
        let (id, pin) = completed_booking(&core, "u1");
        let bad = wrong_pin(&pin);

        handle_turn(&core, "u1", "show me my report").await.unwrap();
        for _ in 0..5 {
            handle_turn(&core, "u1", &format!("{id} {bad}")).await.unwrap();
        }

        // Locked out now: even the correct PIN is refused and the session
        // returns to idle.
        handle_turn(&core, "u1", "show me my report").await.unwrap();
        let reply = handle_turn(&core, "u1", &format!("{id} {pin}")).await.unwrap();
        assert!(reply.message.contains("locked"));
        assert_eq!(pending_of(&core, "u1"), PendingAction::None);
    }

    #[tokio::test]
    async fn pin_for_pending_booking_says_not_ready() {
        let core = CoreState::in_memory();
        // Booked but never completed: no report exists yet.
        handle_turn(&core, "u1", "book CBC tomorrow 10am").await.unwrap();
        let bookings = core
            .with_db(|conn| Ok(repository::list_bookings_for_user(conn, "u1")?))
            .unwrap();
        let id = bookings[0].id.to_string();
        let pin_hash = bookings[0].pin_hash;

        // Recover the plaintext PIN by brute force over the 10k space —
        // only viable in a test, which is rather the point of the gate.
        let pin = (0..10_000)
            .map(|n| format!("{n:04}"))
            .find(|p| booking::hash_pin(p) == pin_hash)
            .unwrap();

        handle_turn(&core, "u1", "show me my report").await.unwrap();
        let reply = handle_turn(&core, "u1", &format!("{id} {pin}")).await.unwrap();
        assert!(reply.message.contains("isn't ready yet"));
        assert_eq!(pending_of(&core, "u1"), PendingAction::None);
    }

    #[tokio::test]
    async fn empty_message_is_a_validation_error() {
        let core = CoreState::in_memory();
        let result = handle_turn(&core, "u1", "   ").await;
        assert!(matches!(result, Err(TurnError::Validation(_))));
        // Nothing recorded.
        assert!(turn_contents(&core, "u1").is_empty());
    }

    #[tokio::test]
    async fn retention_trims_oldest_turns_between_conversations() {
        let conn = crate::db::open_memory_database().unwrap();
        let mut config = crate::config::AppConfig::default();
        config.max_turns_retained = 4;
        let core = CoreState::new(config, conn);

        for _ in 0..4 {
            handle_turn(&core, "u1", "hello").await.unwrap();
        }
        // 8 turns written; the cap is applied at the start of the next
        // turn, so after one more exchange we hold 4 + 2.
        handle_turn(&core, "u1", "hello").await.unwrap();
        assert_eq!(turn_contents(&core, "u1").len(), 6);
    }
}
