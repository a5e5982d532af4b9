//! Booking ledger — creates and lists lab-test bookings, enforces
//! scheduling constraints and forward-only status transitions.

use chrono::{DateTime, NaiveDateTime, Utc};
use rand::Rng;
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::db::repository;
use crate::db::DatabaseError;
use crate::models::{Booking, BookingStatus, BookingView, Test};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Unknown test code: {0}")]
    UnknownTest(String),
    #[error("Scheduled time must be in the future")]
    InvalidSchedule,
    #[error("Cannot move booking from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },
    #[error("Booking not found")]
    NotFound,
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Result of creating a booking. The plaintext PIN appears here and
/// nowhere else; the ledger stores only its digest.
#[derive(Debug)]
pub struct CreatedBooking {
    pub booking: Booking,
    pub pin: String,
}

/// Hash a PIN for storage using SHA-256.
pub fn hash_pin(pin: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(pin.as_bytes());
    hasher.finalize().into()
}

/// Generate a random 4-digit PIN ("0000" through "9999").
pub fn generate_pin() -> String {
    let n: u16 = rand::thread_rng().gen_range(0..10_000);
    format!("{n:04}")
}

/// Parse an absolute schedule string: RFC 3339, or the HTML
/// datetime-local format `YYYY-MM-DDTHH:MM[:SS]` (read as UTC).
pub fn parse_schedule(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// Create a booking for `user_id`. Rejects unknown test codes and
/// schedules that are not strictly in the future.
pub fn create_booking(
    conn: &Connection,
    catalog: &Catalog,
    user_id: &str,
    test_code: &str,
    scheduled_at: DateTime<Utc>,
    address: Option<String>,
    now: DateTime<Utc>,
) -> Result<CreatedBooking, LedgerError> {
    let test = catalog
        .get(test_code)
        .ok_or_else(|| LedgerError::UnknownTest(test_code.trim().to_uppercase()))?;

    if scheduled_at <= now {
        return Err(LedgerError::InvalidSchedule);
    }

    let pin = generate_pin();
    let booking = Booking {
        id: Uuid::new_v4(),
        user_id: user_id.into(),
        test_code: test.code.clone(),
        scheduled_at,
        address: address.filter(|a| !a.trim().is_empty()),
        status: BookingStatus::Pending,
        pin_hash: hash_pin(&pin),
        created_at: now,
    };

    repository::insert_booking(conn, &booking)?;
    tracing::info!(booking_id = %booking.id, test_code = %booking.test_code, "booking created");

    Ok(CreatedBooking { booking, pin })
}

/// Bookings for a user, soonest first, as PIN-free listing views.
pub fn list_bookings(conn: &Connection, user_id: &str) -> Result<Vec<BookingView>, DatabaseError> {
    let bookings = repository::list_bookings_for_user(conn, user_id)?;
    Ok(bookings.iter().map(BookingView::from).collect())
}

/// Move a booking to a new status, enforcing forward-only transitions.
///
/// Completing a booking also writes its report document to the report
/// store so the access gate has something to release.
pub fn update_status(
    conn: &Connection,
    id: &Uuid,
    next: BookingStatus,
    now: DateTime<Utc>,
) -> Result<Booking, LedgerError> {
    let booking = repository::get_booking(conn, id)?.ok_or(LedgerError::NotFound)?;

    if !booking.status.can_transition_to(next) {
        return Err(LedgerError::InvalidTransition {
            from: booking.status.as_str(),
            to: next.as_str(),
        });
    }

    repository::set_booking_status(conn, id, next)?;

    if next == BookingStatus::Completed {
        let document = report_document(&booking, now);
        repository::insert_report(conn, &booking.id.to_string(), &document, now)?;
    }

    Ok(Booking {
        status: next,
        ..booking
    })
}

/// Deterministic panel-summary document for a completed booking.
fn report_document(booking: &Booking, released_at: DateTime<Utc>) -> serde_json::Value {
    serde_json::json!({
        "booking_id": booking.id.to_string(),
        "test_code": booking.test_code,
        "collected_at": booking.scheduled_at,
        "released_at": released_at,
        "summary": "All measured parameters are within reference ranges.",
        "advice": "Share this report with your physician for interpretation.",
    })
}

/// Catalog-backed summary line for chat confirmations.
pub fn describe_test(test: &Test) -> String {
    format!("{} ({})", test.name, test.code)
}
