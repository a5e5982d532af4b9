//! API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`. Handlers receive `ApiContext` via
//! `State`; the audit middleware reads it from request extensions, so the
//! `Extension` layer is outermost. CORS is permissive: the booking client
//! is served from a different origin than this API.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router.
pub fn api_router(core: Arc<CoreState>) -> Router {
    let ctx = ApiContext::new(core);
    build_router(ctx)
}

fn build_router(ctx: ApiContext) -> Router {
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/chat", post(endpoints::chat::send))
        .route("/tests", get(endpoints::tests::list))
        .route(
            "/bookings",
            post(endpoints::bookings::create).get(endpoints::bookings::list),
        )
        .route("/reports/view", post(endpoints::reports::view))
        .route("/promos/apply", post(endpoints::promos::apply))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx));

    Router::new().nest("/api", api).layer(CorsLayer::permissive())
}
