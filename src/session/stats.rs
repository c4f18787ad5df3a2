use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of a chat session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,

    /// Remote thread all turns of this session are appended to
    pub thread_id: String,

    /// When the session started
    pub started_at: DateTime<Utc>,

    /// Session age in seconds
    pub duration_secs: f64,

    /// Turns recorded so far
    pub turns_count: usize,

    /// Whether a run is currently streaming
    pub is_responding: bool,

    /// Bytes held by the live audio capture, if any
    pub audio_buffered_bytes: Option<usize>,

    /// Whether the session has been closed
    pub is_closed: bool,
}
