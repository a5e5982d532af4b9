//! Report access endpoint.
//!
//! `POST /api/reports/view` — the PIN-gated report release path. All the
//! security discipline (constant-time comparison, lockout, enumeration
//! resistance) lives in the gate; this handler only shapes the response.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::report_gate::{self, GateError};

#[derive(Deserialize)]
pub struct ViewReportRequest {
    pub booking_id: String,
    pub pin: String,
}

#[derive(Serialize)]
pub struct ViewReportResponse {
    pub report: serde_json::Value,
}

/// `POST /api/reports/view` — verify booking ID + PIN and return the report.
pub async fn view(
    State(ctx): State<ApiContext>,
    Json(req): Json<ViewReportRequest>,
) -> Result<Json<ViewReportResponse>, ApiError> {
    if req.booking_id.trim().is_empty() || req.pin.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "booking_id and pin are both required".into(),
        ));
    }

    let report = ctx
        .core
        .with_db(|conn| {
            match report_gate::verify_and_fetch(
                conn,
                &req.booking_id,
                &req.pin,
                Utc::now(),
                ctx.core.policy,
            ) {
                Err(GateError::Database(e)) => Err(e),
                other => Ok(other),
            }
        })
        .map_err(ApiError::from)?
        .map_err(ApiError::from)?;

    Ok(Json(ViewReportResponse { report }))
}
