use super::handlers;
use super::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Largest request body accepted (inline attachments travel as base64)
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session lifecycle
        .route("/sessions", post(handlers::start_session))
        .route("/sessions/:session_id", delete(handlers::end_session))
        // Turns
        .route(
            "/sessions/:session_id/messages",
            post(handlers::send_message),
        )
        .route("/sessions/:session_id/audio", post(handlers::audio_chunk))
        .route(
            "/sessions/:session_id/audio/end",
            post(handlers::audio_end),
        )
        // Session queries
        .route(
            "/sessions/:session_id/events",
            get(handlers::session_events),
        )
        .route(
            "/sessions/:session_id/status",
            get(handlers::get_session_status),
        )
        .route(
            "/sessions/:session_id/transcript",
            get(handlers::get_session_transcript),
        )
        .layer(
            ServiceBuilder::new()
                // Request logging
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}
