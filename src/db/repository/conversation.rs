use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::{PendingAction, Session, Turn, TurnRole};

/// Load the session for a user, creating it lazily on first contact.
pub fn ensure_session(
    conn: &Connection,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<Session, DatabaseError> {
    if let Some(session) = get_session(conn, user_id)? {
        return Ok(session);
    }
    conn.execute(
        "INSERT INTO conversation_sessions (user_id, pending_action, booking_hint, started_at, updated_at)
         VALUES (?1, 'none', NULL, ?2, ?2)",
        params![user_id, now],
    )?;
    Ok(Session {
        user_id: user_id.into(),
        pending: PendingAction::None,
        started_at: now,
        updated_at: now,
    })
}

pub fn get_session(conn: &Connection, user_id: &str) -> Result<Option<Session>, DatabaseError> {
    let result = conn.query_row(
        "SELECT user_id, pending_action, booking_hint, started_at, updated_at
         FROM conversation_sessions WHERE user_id = ?1",
        params![user_id],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, DateTime<Utc>>(3)?,
                row.get::<_, DateTime<Utc>>(4)?,
            ))
        },
    );

    match result {
        Ok((user_id, action, hint, started_at, updated_at)) => Ok(Some(Session {
            user_id,
            pending: PendingAction::from_columns(&action, hint)?,
            started_at,
            updated_at,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn set_pending_action(
    conn: &Connection,
    user_id: &str,
    pending: &PendingAction,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let (action, hint) = pending.to_columns();
    conn.execute(
        "UPDATE conversation_sessions
         SET pending_action = ?2, booking_hint = ?3, updated_at = ?4
         WHERE user_id = ?1",
        params![user_id, action, hint, now],
    )?;
    Ok(())
}

pub fn append_turn(
    conn: &Connection,
    user_id: &str,
    role: TurnRole,
    content: &str,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO conversation_turns (user_id, role, content, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![user_id, role.as_str(), content, now],
    )?;
    Ok(())
}

/// All turns for a user in arrival order.
pub fn list_turns(conn: &Connection, user_id: &str) -> Result<Vec<Turn>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT seq, role, content, created_at
         FROM conversation_turns WHERE user_id = ?1 ORDER BY seq ASC",
    )?;

    let rows = stmt.query_map(params![user_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, DateTime<Utc>>(3)?,
        ))
    })?;

    let mut turns = Vec::new();
    for row in rows {
        let (seq, role, content, created_at) = row?;
        turns.push(Turn {
            seq,
            role: TurnRole::from_str(&role)?,
            content,
            created_at,
        });
    }
    Ok(turns)
}

pub fn count_turns(conn: &Connection, user_id: &str) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM conversation_turns WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Retention policy: drop the oldest turns beyond `keep_last`.
/// Runs between conversations, never mid-turn.
pub fn trim_turns(conn: &Connection, user_id: &str, keep_last: usize) -> Result<usize, DatabaseError> {
    let removed = conn.execute(
        "DELETE FROM conversation_turns
         WHERE user_id = ?1 AND seq NOT IN (
             SELECT seq FROM conversation_turns
             WHERE user_id = ?1 ORDER BY seq DESC LIMIT ?2
         )",
        params![user_id, keep_last as i64],
    )?;
    Ok(removed)
}
