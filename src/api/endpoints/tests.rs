//! Test catalog endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::types::ApiContext;
use crate::models::Test;

#[derive(Serialize)]
pub struct TestsResponse {
    pub items: Vec<Test>,
}

/// `GET /api/tests` — the full test catalog in stable order.
pub async fn list(State(ctx): State<ApiContext>) -> Json<TestsResponse> {
    Json(TestsResponse {
        items: ctx.core.catalog.list().to_vec(),
    })
}
