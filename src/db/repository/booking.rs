use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{Booking, BookingStatus};

pub fn insert_booking(conn: &Connection, booking: &Booking) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO bookings (id, user_id, test_code, scheduled_at, address, status, pin_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            booking.id.to_string(),
            booking.user_id,
            booking.test_code,
            booking.scheduled_at,
            booking.address,
            booking.status.as_str(),
            booking.pin_hash.as_slice(),
            booking.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &Uuid) -> Result<Option<Booking>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, user_id, test_code, scheduled_at, address, status, pin_hash, created_at
         FROM bookings WHERE id = ?1",
        params![id.to_string()],
        row_to_booking_row,
    );

    match result {
        Ok(row) => Ok(Some(booking_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Bookings for one user, soonest first.
pub fn list_bookings_for_user(
    conn: &Connection,
    user_id: &str,
) -> Result<Vec<Booking>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, test_code, scheduled_at, address, status, pin_hash, created_at
         FROM bookings WHERE user_id = ?1 ORDER BY scheduled_at ASC",
    )?;

    let rows = stmt.query_map(params![user_id], row_to_booking_row)?;

    let mut bookings = Vec::new();
    for row in rows {
        bookings.push(booking_from_row(row?)?);
    }
    Ok(bookings)
}

pub fn set_booking_status(
    conn: &Connection,
    id: &Uuid,
    status: BookingStatus,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE bookings SET status = ?2 WHERE id = ?1",
        params![id.to_string(), status.as_str()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "booking".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

struct BookingRow {
    id: String,
    user_id: String,
    test_code: String,
    scheduled_at: DateTime<Utc>,
    address: Option<String>,
    status: String,
    pin_hash: Vec<u8>,
    created_at: DateTime<Utc>,
}

fn row_to_booking_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BookingRow> {
    Ok(BookingRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        test_code: row.get(2)?,
        scheduled_at: row.get(3)?,
        address: row.get(4)?,
        status: row.get(5)?,
        pin_hash: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn booking_from_row(row: BookingRow) -> Result<Booking, DatabaseError> {
    let pin_hash: [u8; 32] = row
        .pin_hash
        .try_into()
        .map_err(|_| DatabaseError::ConstraintViolation("pin_hash must be 32 bytes".into()))?;
    Ok(Booking {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        user_id: row.user_id,
        test_code: row.test_code,
        scheduled_at: row.scheduled_at,
        address: row.address,
        status: BookingStatus::from_str(&row.status)?,
        pin_hash,
        created_at: row.created_at,
    })
}
