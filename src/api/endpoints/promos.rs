//! Promo code endpoint.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::promo::Quote;

#[derive(Deserialize)]
pub struct ApplyPromoRequest {
    pub code: String,
    pub price: f64,
}

/// `POST /api/promos/apply` — evaluate a promo code against a price.
pub async fn apply(
    State(ctx): State<ApiContext>,
    Json(req): Json<ApplyPromoRequest>,
) -> Result<Json<Quote>, ApiError> {
    if !req.price.is_finite() || req.price < 0.0 {
        return Err(ApiError::BadRequest(
            "price must be a non-negative number".into(),
        ));
    }

    let quote = ctx.core.promos.apply(&req.code, req.price, Utc::now());
    Ok(Json(quote))
}
