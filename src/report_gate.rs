//! Report access gate — booking-ID + PIN challenge protecting report
//! retrieval, with attempt throttling.
//!
//! The gate must resist online brute force (bounded attempts, time-boxed
//! lockout) and must not leak whether a booking id is valid versus whether
//! a PIN is wrong: PIN digests are compared in constant time, the unknown-
//! booking path performs the same digest comparison against a dummy value,
//! and the API layer surfaces `NotFound` and `InvalidPin` identically.

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::booking::hash_pin;
use crate::db::{repository, DatabaseError};
use crate::models::BookingStatus;

/// Lockout policy, resolved from configuration at startup.
#[derive(Debug, Clone, Copy)]
pub struct GatePolicy {
    pub threshold: u32,
    pub window: Duration,
}

impl GatePolicy {
    pub fn new(threshold: u32, window: std::time::Duration) -> Self {
        Self {
            threshold,
            window: Duration::from_std(window).unwrap_or_else(|_| Duration::minutes(15)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// Unknown booking. Surfaced identically to `InvalidPin` at the API
    /// boundary to prevent booking-id enumeration.
    #[error("Booking not found")]
    NotFound,
    #[error("Incorrect PIN")]
    InvalidPin,
    #[error("Access locked")]
    Locked { retry_after_secs: u64 },
    #[error("Report not ready")]
    NotReady,
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Verify a booking-ID + PIN pair and fetch the report document.
pub fn verify_and_fetch(
    conn: &mut Connection,
    booking_id: &str,
    pin: &str,
    now: DateTime<Utc>,
    policy: GatePolicy,
) -> Result<serde_json::Value, GateError> {
    let booking_id = booking_id.trim();
    let presented = hash_pin(pin.trim());

    let booking = Uuid::parse_str(booking_id)
        .ok()
        .map(|id| repository::get_booking(conn, &id))
        .transpose()?
        .flatten();

    let Some(booking) = booking else {
        // Same digest comparison as the real path, so the timing profile
        // does not distinguish an unknown booking from a wrong PIN.
        let dummy = [0u8; 32];
        let _ = presented.as_slice().ct_eq(dummy.as_slice());
        return Err(GateError::NotFound);
    };

    let key = booking.id.to_string();

    if let Some(until) = repository::active_lockout(conn, &key, now)? {
        return Err(GateError::Locked {
            retry_after_secs: (until - now).num_seconds().max(0) as u64,
        });
    }

    if !bool::from(presented.as_slice().ct_eq(booking.pin_hash.as_slice())) {
        let outcome =
            repository::record_failure(conn, &key, policy.threshold, policy.window, now)?;
        if outcome.locked_until.is_some() {
            tracing::warn!(booking_id = %key, "report access locked out");
        }
        return Err(GateError::InvalidPin);
    }

    repository::clear_attempts(conn, &key)?;

    if booking.status != BookingStatus::Completed {
        return Err(GateError::NotReady);
    }

    match repository::get_report(conn, &key)? {
        Some(stored) => Ok(stored.document),
        None => Err(GateError::NotReady),
    }
}
