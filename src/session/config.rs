use crate::config::{Config, DEFAULT_MAX_AUDIO_BYTES};
use std::time::Duration;

/// Settings shared read-only by every chat session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Assistant every run is started against
    pub assistant_id: String,

    /// Display name used in the greeting
    pub assistant_name: String,

    /// Upper bound on one voice capture
    /// Default: 25 MiB (the transcription upload limit)
    pub max_audio_bytes: usize,

    /// Upper bound on one streamed run
    /// Default: 120 seconds
    pub run_timeout: Duration,

    /// Grant `code_interpreter` on every attachment
    pub code_interpreter: bool,

    /// Capacity of the per-session UI event channel
    pub event_capacity: usize,
}

impl SessionConfig {
    pub fn new(assistant_id: impl Into<String>, assistant_name: impl Into<String>) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            assistant_name: assistant_name.into(),
            max_audio_bytes: DEFAULT_MAX_AUDIO_BYTES,
            run_timeout: Duration::from_secs(120),
            code_interpreter: false,
            event_capacity: 256,
        }
    }

    /// Session settings from the service config and the retrieved assistant name
    pub fn from_config(config: &Config, assistant_name: impl Into<String>) -> Self {
        Self {
            max_audio_bytes: config.audio.max_buffer_bytes,
            run_timeout: Duration::from_secs(config.run.stream_timeout_secs),
            code_interpreter: config.attachments.code_interpreter,
            ..Self::new(config.openai.assistant_id.clone(), assistant_name)
        }
    }
}
