//! Contract for the hosted assistant service
//!
//! The session orchestrator and the relay only talk to the remote service
//! through [`ConversationClient`]. The OpenAI implementation lives in
//! `crate::openai`; tests provide scripted in-memory clients.

mod client;
mod events;
mod types;

pub use client::{ClientError, ConversationClient, EventStream};
pub use events::{StreamEvent, ToolKind};
pub use types::{AssistantInfo, Attachment, FileTool, NewMessage, ToolResources};
