pub mod buffer;
pub mod transcription;

pub use buffer::{extension_for_mime, AudioBuffer, SealedAudio};
pub use transcription::Transcriber;

/// Errors raised while capturing voice input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AudioError {
    #[error("no audio capture in progress")]
    NoCapture,

    #[error("audio capture exceeded the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("audio capture ended without any audio")]
    EmptyCapture,

    #[error("audio capture started without a MIME type")]
    MissingMimeType,
}
