//! Axum router configuration with middleware.
//!
//! Chat routes are under `/api/v1/ai/chat` and require an API key.
//! Middleware: CORS, tracing.

use axum::Router;
use axum::routing::{delete, get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([handlers::chat::SESSION_ID_HEADER]);

    let chat_routes = Router::new()
        .route(
            "/sessions",
            get(handlers::session::list_sessions).post(handlers::session::create_session),
        )
        .route("/sessions/{id}", delete(handlers::session::delete_session))
        .route("/history/{id}", get(handlers::session::get_history))
        .route("/message", post(handlers::chat::send_message))
        .route("/stream", post(handlers::chat::stream_message))
        .route("/quick-schedule", post(handlers::chat::quick_schedule));

    Router::new()
        .nest("/api/v1/ai/chat", chat_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint (no auth required).
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
