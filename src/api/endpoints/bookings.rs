//! Booking endpoints.
//!
//! - `POST /api/bookings` — create a booking; the only response that ever
//!   carries the plaintext PIN.
//! - `GET /api/bookings?user_id=` — list a user's bookings, soonest first,
//!   with no PIN field.

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::booking::{self, LedgerError};
use crate::models::BookingView;

#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub user_id: String,
    pub test_code: String,
    pub scheduled_at: String,
    pub address: Option<String>,
}

#[derive(Serialize)]
pub struct CreateBookingResponse {
    pub id: String,
    pub pin: String,
}

/// `POST /api/bookings` — create a booking.
pub async fn create(
    State(ctx): State<ApiContext>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<Json<CreateBookingResponse>, ApiError> {
    let user_id = req.user_id.trim();
    if user_id.is_empty() {
        return Err(ApiError::BadRequest("user_id cannot be empty".into()));
    }
    if req.test_code.trim().is_empty() {
        return Err(ApiError::BadRequest("test_code cannot be empty".into()));
    }

    let scheduled_at = booking::parse_schedule(&req.scheduled_at).ok_or_else(|| {
        ApiError::BadRequest(
            "scheduled_at must be an RFC 3339 or YYYY-MM-DDTHH:MM timestamp".into(),
        )
    })?;

    let created = ctx
        .core
        .with_db(|conn| {
            match booking::create_booking(
                conn,
                &ctx.core.catalog,
                user_id,
                &req.test_code,
                scheduled_at,
                req.address.clone(),
                Utc::now(),
            ) {
                Ok(created) => Ok(Ok(created)),
                Err(LedgerError::Database(e)) => Err(e),
                Err(domain) => Ok(Err(domain)),
            }
        })
        .map_err(ApiError::from)?
        .map_err(ApiError::from)?;

    Ok(Json(CreateBookingResponse {
        id: created.booking.id.to_string(),
        pin: created.pin,
    }))
}

#[derive(Deserialize)]
pub struct ListBookingsQuery {
    pub user_id: Option<String>,
}

#[derive(Serialize)]
pub struct ListBookingsResponse {
    pub items: Vec<BookingView>,
}

/// `GET /api/bookings?user_id=` — list bookings for a user.
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<ListBookingsResponse>, ApiError> {
    let user_id = query
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::BadRequest("user_id query parameter is required".into()))?;

    let items = ctx
        .core
        .with_db(|conn| booking::list_bookings(conn, user_id))
        .map_err(ApiError::from)?;

    Ok(Json(ListBookingsResponse { items }))
}
