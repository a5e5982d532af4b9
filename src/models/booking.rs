use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::enums::BookingStatus;

/// A booked lab test. Owned by the booking ledger.
///
/// Deliberately not `Serialize`: the stored PIN digest must never reach a
/// wire format. Endpoints expose `BookingView` instead.
#[derive(Debug, Clone)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: String,
    pub test_code: String,
    pub scheduled_at: DateTime<Utc>,
    pub address: Option<String>,
    pub status: BookingStatus,
    pub pin_hash: [u8; 32],
    pub created_at: DateTime<Utc>,
}

/// Listing view of a booking. No PIN field exists on this type.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BookingView {
    pub id: String,
    pub test_code: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: BookingStatus,
}

impl From<&Booking> for BookingView {
    fn from(b: &Booking) -> Self {
        Self {
            id: b.id.to_string(),
            test_code: b.test_code.clone(),
            scheduled_at: b.scheduled_at,
            status: b.status,
        }
    }
}
