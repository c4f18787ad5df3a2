pub mod assistant;
pub mod attachments;
pub mod audio;
pub mod config;
pub mod http;
pub mod openai;
pub mod relay;
pub mod session;
pub mod vector_store;

pub use assistant::{
    AssistantInfo, Attachment, ClientError, ConversationClient, EventStream, FileTool, NewMessage,
    StreamEvent, ToolKind, ToolResources,
};
pub use attachments::{AttachmentBatch, FilePreprocessor, UploadFailure};
pub use audio::{AudioBuffer, AudioError, SealedAudio, Transcriber};
pub use config::Config;
pub use http::{create_router, AppState};
pub use openai::OpenAIClient;
pub use relay::{RecordingSink, RelayOutcome, RenderSink, RunStatus, StreamRelay, UiEvent};
pub use session::{ChatSession, Element, SessionConfig, SessionStats, Turn, TurnError, TurnReport};
