use super::state::AppState;
use crate::audio::AudioError;
use crate::relay::UiEvent;
use crate::session::{ChatSession, Element, SessionStats, Turn, TurnError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,

    /// Files attached to the message
    #[serde(default)]
    pub elements: Vec<Element>,
}

#[derive(Debug, Deserialize)]
pub struct AudioChunkRequest {
    /// Set on the first chunk of a capture
    #[serde(default)]
    pub is_start: bool,

    /// Required on the first chunk (e.g. "audio/webm")
    pub mime_type: Option<String>,

    /// Base64-encoded audio bytes
    pub data: String,
}

#[derive(Debug, Deserialize)]
pub struct AudioEndRequest {
    #[serde(default)]
    pub elements: Vec<Element>,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: Uuid,
    pub thread_id: String,
    pub transcript: Vec<Turn>,
}

#[derive(Debug, Serialize)]
pub struct EndSessionResponse {
    pub session_id: Uuid,
    pub status: String,
    pub stats: SessionStats,
}

#[derive(Debug, Serialize)]
pub struct AudioChunkResponse {
    pub buffered_bytes: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

fn session_not_found(session_id: Uuid) -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        format!("Session {} not found", session_id),
    )
}

fn turn_error_response(err: TurnError) -> Response {
    let status = match &err {
        TurnError::Audio(AudioError::NoCapture) => StatusCode::CONFLICT,
        TurnError::Audio(AudioError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
        TurnError::Audio(AudioError::MissingMimeType) => StatusCode::BAD_REQUEST,
        TurnError::Audio(AudioError::EmptyCapture) | TurnError::EmptyTranscription => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        TurnError::SessionClosed => StatusCode::GONE,
        TurnError::ThreadNotCreated(_)
        | TurnError::MessageNotSent(_)
        | TurnError::ResponseFailed(_)
        | TurnError::Transcription(_) => StatusCode::BAD_GATEWAY,
    };
    error_response(status, err.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /sessions
/// Open a chat session with a fresh conversation thread
pub async fn start_session(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.session_config.as_ref().clone();

    let session = match ChatSession::on_session_start(config, Arc::clone(&state.client)).await {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Failed to start session: {}", e);
            return turn_error_response(e);
        }
    };

    let response = StartSessionResponse {
        session_id: session.id(),
        thread_id: session.thread_id().to_string(),
        transcript: session.transcript(),
    };

    {
        let mut sessions = state.sessions.write().await;
        sessions.insert(session.id(), session);
    }

    info!("Session {} opened", response.session_id);

    (StatusCode::CREATED, Json(response)).into_response()
}

/// DELETE /sessions/:session_id
/// Close a session, cancelling any in-flight response
pub async fn end_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    let session = {
        let mut sessions = state.sessions.write().await;
        sessions.remove(&session_id)
    };

    match session {
        Some(session) => {
            session.close();
            (
                StatusCode::OK,
                Json(EndSessionResponse {
                    session_id,
                    status: "closed".to_string(),
                    stats: session.stats(),
                }),
            )
                .into_response()
        }
        None => session_not_found(session_id),
    }
}

/// POST /sessions/:session_id/messages
/// Send a typed message and wait for the assistant's response
pub async fn send_message(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> impl IntoResponse {
    let Some(session) = state.session(&session_id).await else {
        return session_not_found(session_id);
    };

    match session.on_user_turn(&req.content, req.elements).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            warn!("Session {}: turn failed: {}", session_id, e);
            turn_error_response(e)
        }
    }
}

/// POST /sessions/:session_id/audio
/// Buffer one chunk of a voice capture
pub async fn audio_chunk(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<AudioChunkRequest>,
) -> impl IntoResponse {
    let Some(session) = state.session(&session_id).await else {
        return session_not_found(session_id);
    };

    let data = match base64::engine::general_purpose::STANDARD.decode(req.data.as_bytes()) {
        Ok(data) => data,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("Audio data is not valid base64: {}", e),
            )
        }
    };

    match session.on_audio_chunk_event(req.is_start, req.mime_type.as_deref(), &data) {
        Ok(buffered_bytes) => {
            (StatusCode::OK, Json(AudioChunkResponse { buffered_bytes })).into_response()
        }
        Err(e) => turn_error_response(e),
    }
}

/// POST /sessions/:session_id/audio/end
/// Finish the voice capture, transcribe it and respond to it
pub async fn audio_end(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<AudioEndRequest>,
) -> impl IntoResponse {
    let Some(session) = state.session(&session_id).await else {
        return session_not_found(session_id);
    };

    match session.on_audio_end(req.elements).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            warn!("Session {}: voice turn failed: {}", session_id, e);
            turn_error_response(e)
        }
    }
}

/// One SSE connection to a session
///
/// When the last connection of a session goes away the session is closed
/// and forgotten.
struct EventListener {
    rx: Option<broadcast::Receiver<UiEvent>>,
    session_id: Uuid,
    state: AppState,
}

impl Drop for EventListener {
    fn drop(&mut self) {
        // Unsubscribe first so the listener count no longer includes us
        drop(self.rx.take());

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let state = self.state.clone();
        let session_id = self.session_id;
        runtime.spawn(async move {
            if state.release_if_unwatched(&session_id).await {
                info!("Session {} released after its last listener left", session_id);
            }
        });
    }
}

/// GET /sessions/:session_id/events
/// Server-sent stream of UI updates for a session
pub async fn session_events(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    let Some(session) = state.session(&session_id).await else {
        return session_not_found(session_id);
    };

    let listener = EventListener {
        rx: Some(session.subscribe()),
        session_id,
        state: state.clone(),
    };

    let events = futures::stream::unfold(listener, move |mut listener| async move {
        loop {
            let rx = listener.rx.as_mut()?;
            match rx.recv().await {
                Ok(event) => return Some((Event::default().json_data(&event), listener)),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "Session {}: UI listener fell behind, skipped {} events",
                        session_id, skipped
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// GET /sessions/:session_id/status
pub async fn get_session_status(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.session(&session_id).await {
        Some(session) => (StatusCode::OK, Json(session.stats())).into_response(),
        None => session_not_found(session_id),
    }
}

/// GET /sessions/:session_id/transcript
/// Turns recorded so far, oldest first
pub async fn get_session_transcript(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.session(&session_id).await {
        Some(session) => (StatusCode::OK, Json(session.transcript())).into_response(),
        None => session_not_found(session_id),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
