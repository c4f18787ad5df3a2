use crate::assistant::ClientError;
use crate::audio::AudioError;

/// Why a session operation did not produce a response
///
/// Apart from `ThreadNotCreated` (there is no session to show it in yet),
/// remote failures have already been rendered as an error turn by the time
/// they are returned. Nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("could not start the conversation: {0}")]
    ThreadNotCreated(#[source] ClientError),

    #[error("message was not sent: {0}")]
    MessageNotSent(#[source] ClientError),

    /// The message is on the thread but no run could be started for it
    #[error("message sent, response failed: {0}")]
    ResponseFailed(#[source] ClientError),

    #[error("transcription failed: {0}")]
    Transcription(#[source] ClientError),

    #[error("no speech recognised in the audio capture")]
    EmptyTranscription,

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("session is closed")]
    SessionClosed,
}
