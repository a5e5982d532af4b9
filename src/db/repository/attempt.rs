use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};

use crate::db::DatabaseError;

/// Outcome of recording one failed PIN attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureOutcome {
    pub attempt_count: u32,
    /// Set when this failure tripped (or found) an active lockout.
    pub locked_until: Option<DateTime<Utc>>,
}

/// Lockout expiry for a booking, if one is active at `now`.
pub fn active_lockout(
    conn: &Connection,
    booking_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    let result = conn.query_row(
        "SELECT locked_until FROM report_access_attempts WHERE booking_id = ?1",
        params![booking_id],
        |row| row.get::<_, Option<DateTime<Utc>>>(0),
    );

    match result {
        Ok(Some(until)) if until > now => Ok(Some(until)),
        Ok(_) => Ok(None),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Record one failed attempt for a booking.
///
/// The read-increment-compare runs inside a single transaction so concurrent
/// guesses cannot slip past the threshold. Reaching `threshold` sets
/// `locked_until = now + window` and resets the counter for the next window.
pub fn record_failure(
    conn: &mut Connection,
    booking_id: &str,
    threshold: u32,
    window: Duration,
    now: DateTime<Utc>,
) -> Result<FailureOutcome, DatabaseError> {
    let tx = conn.transaction()?;

    let current: u32 = tx
        .query_row(
            "SELECT attempt_count FROM report_access_attempts WHERE booking_id = ?1",
            params![booking_id],
            |row| row.get(0),
        )
        .unwrap_or(0);

    let incremented = current + 1;
    let outcome = if incremented >= threshold {
        let until = now + window;
        tx.execute(
            "INSERT INTO report_access_attempts (booking_id, attempt_count, locked_until)
             VALUES (?1, 0, ?2)
             ON CONFLICT(booking_id) DO UPDATE SET attempt_count = 0, locked_until = ?2",
            params![booking_id, until],
        )?;
        FailureOutcome {
            attempt_count: 0,
            locked_until: Some(until),
        }
    } else {
        tx.execute(
            "INSERT INTO report_access_attempts (booking_id, attempt_count, locked_until)
             VALUES (?1, ?2, NULL)
             ON CONFLICT(booking_id) DO UPDATE SET attempt_count = ?2, locked_until = NULL",
            params![booking_id, incremented],
        )?;
        FailureOutcome {
            attempt_count: incremented,
            locked_until: None,
        }
    };

    tx.commit()?;
    Ok(outcome)
}

/// Clear the attempt record after a successful verification.
pub fn clear_attempts(conn: &Connection, booking_id: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "DELETE FROM report_access_attempts WHERE booking_id = ?1",
        params![booking_id],
    )?;
    Ok(())
}
