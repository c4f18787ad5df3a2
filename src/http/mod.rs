//! HTTP API exposing the chat UI hooks
//!
//! - POST /sessions - Start a session (new thread + greeting)
//! - DELETE /sessions/:id - Close a session
//! - POST /sessions/:id/messages - Send a typed message
//! - POST /sessions/:id/audio - Buffer a voice chunk
//! - POST /sessions/:id/audio/end - Finish a voice capture
//! - GET /sessions/:id/events - Server-sent UI updates
//! - GET /sessions/:id/status - Query session status
//! - GET /sessions/:id/transcript - Get the transcript so far
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
