//! Chat endpoint.
//!
//! `POST /api/chat` — one conversation turn. The whole message lifecycle
//! (intent classification, state transitions, turn persistence) lives in
//! the conversation engine; this handler only validates the envelope.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::conversation::{self, ChatReply};

#[derive(Deserialize)]
pub struct ChatRequest {
    pub user_id: String,
    pub text: String,
}

/// `POST /api/chat` — process one message and return the reply.
pub async fn send(
    State(ctx): State<ApiContext>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let reply = conversation::handle_turn(&ctx.core, &req.user_id, &req.text).await?;
    Ok(Json(reply))
}
