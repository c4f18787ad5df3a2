use serde::{Deserialize, Serialize};

/// Tool allowed to read an attached file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileTool {
    FileSearch,
    CodeInterpreter,
}

/// Uploaded file handle plus the tools permitted to use it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_id: String,
    pub tools: Vec<FileTool>,
}

/// A user message to append to a thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub content: String,
    pub attachments: Vec<Attachment>,
}

impl NewMessage {
    pub fn new(content: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            content: content.into(),
            attachments,
        }
    }
}

/// Tool resources attached to the assistant itself
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolResources {
    /// Vector stores searched by the `file_search` tool
    pub vector_store_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantInfo {
    pub id: String,
    pub name: String,
}
