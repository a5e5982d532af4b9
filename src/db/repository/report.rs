use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::db::DatabaseError;

/// A released report document, stored as JSON keyed by booking id.
#[derive(Debug, Clone)]
pub struct StoredReport {
    pub booking_id: String,
    pub document: serde_json::Value,
    pub released_at: DateTime<Utc>,
}

pub fn insert_report(
    conn: &Connection,
    booking_id: &str,
    document: &serde_json::Value,
    released_at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO reports (booking_id, document, released_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(booking_id) DO UPDATE SET document = ?2, released_at = ?3",
        params![booking_id, document.to_string(), released_at],
    )?;
    Ok(())
}

pub fn get_report(conn: &Connection, booking_id: &str) -> Result<Option<StoredReport>, DatabaseError> {
    let result = conn.query_row(
        "SELECT booking_id, document, released_at FROM reports WHERE booking_id = ?1",
        params![booking_id],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, DateTime<Utc>>(2)?,
            ))
        },
    );

    match result {
        Ok((booking_id, document, released_at)) => {
            let document = serde_json::from_str(&document)
                .map_err(|e| DatabaseError::ConstraintViolation(format!("report JSON: {e}")))?;
            Ok(Some(StoredReport {
                booking_id,
                document,
                released_at,
            }))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
