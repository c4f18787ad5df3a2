use super::events::StreamEvent;
use super::types::{AssistantInfo, NewMessage, ToolResources};
use futures::stream::Stream;
use std::pin::Pin;

/// Lazily consumed sequence of events for one run
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ClientError>> + Send>>;

/// Errors returned by remote calls
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("event stream error: {0}")]
    Stream(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

/// Remote conversation service: threads, messages, streamed runs, files,
/// transcription and vector stores
///
/// Implementations own retries, persistence and run state; callers treat
/// every method as a single request that either succeeds or fails.
#[async_trait::async_trait]
pub trait ConversationClient: Send + Sync {
    /// Fetch the assistant's id and display name
    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<AssistantInfo, ClientError>;

    /// Create a new empty thread and return its id
    async fn create_thread(&self) -> Result<String, ClientError>;

    /// Append a user message to a thread and return the message id
    async fn append_message(
        &self,
        thread_id: &str,
        message: NewMessage,
    ) -> Result<String, ClientError>;

    /// Start a run on the thread and return its event stream
    async fn stream_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<EventStream, ClientError>;

    /// Ask the service to stop a run that has not reached a terminal state
    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<(), ClientError>;

    /// Upload a file for assistant use and return its file id
    async fn upload_file(&self, filename: &str, bytes: Vec<u8>) -> Result<String, ClientError>;

    /// Transcribe an audio payload; `filename` must carry the right extension
    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String, ClientError>;

    /// Create a vector store from already uploaded files and return its id
    async fn create_vector_store(
        &self,
        name: &str,
        file_ids: &[String],
    ) -> Result<String, ClientError>;

    /// Replace the assistant's tool resources
    async fn update_assistant(
        &self,
        assistant_id: &str,
        resources: ToolResources,
    ) -> Result<(), ClientError>;
}
