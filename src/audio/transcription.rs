use super::buffer::SealedAudio;
use crate::assistant::{ClientError, ConversationClient};
use std::sync::Arc;
use tracing::info;

/// Speech-to-text through the remote transcription endpoint
#[derive(Clone)]
pub struct Transcriber {
    client: Arc<dyn ConversationClient>,
}

impl Transcriber {
    pub fn new(client: Arc<dyn ConversationClient>) -> Self {
        Self { client }
    }

    /// Transcribe a sealed capture; remote errors propagate unchanged
    pub async fn transcribe(&self, audio: &SealedAudio) -> Result<String, ClientError> {
        info!(
            "Transcribing {} ({} bytes, {})",
            audio.filename,
            audio.bytes.len(),
            audio.mime_type
        );

        let text = self
            .client
            .transcribe(audio.bytes.clone(), &audio.filename)
            .await?;

        Ok(text.trim().to_string())
    }
}
