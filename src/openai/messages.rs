use crate::assistant::{Attachment, FileTool};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CreateMessageRequest {
    pub role: &'static str,
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<MessageAttachment>,
}

#[derive(Debug, Serialize)]
pub struct MessageAttachment {
    pub file_id: String,
    pub tools: Vec<AttachmentTool>,
}

#[derive(Debug, Serialize)]
pub struct AttachmentTool {
    #[serde(rename = "type")]
    pub kind: FileTool,
}

impl From<Attachment> for MessageAttachment {
    fn from(attachment: Attachment) -> Self {
        Self {
            file_id: attachment.file_id,
            tools: attachment
                .tools
                .into_iter()
                .map(|kind| AttachmentTool { kind })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateRunRequest<'a> {
    pub assistant_id: &'a str,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub struct CreateVectorStoreRequest<'a> {
    pub name: &'a str,
    pub file_ids: &'a [String],
}

#[derive(Debug, Serialize)]
pub struct UpdateAssistantRequest {
    pub tool_resources: ToolResourcesPayload,
}

#[derive(Debug, Serialize)]
pub struct ToolResourcesPayload {
    pub file_search: FileSearchResources,
}

#[derive(Debug, Serialize)]
pub struct FileSearchResources {
    pub vector_store_ids: Vec<String>,
}

// ============================================================================
// Responses
// ============================================================================

/// Any object the API returns where only the id matters
#[derive(Debug, Deserialize)]
pub struct ObjectId {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct AssistantObject {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptionResponse {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct RunObject {
    pub id: String,
    #[serde(default)]
    pub last_error: Option<RunError>,
    #[serde(default)]
    pub incomplete_details: Option<IncompleteDetails>,
}

#[derive(Debug, Deserialize)]
pub struct RunError {
    pub code: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct IncompleteDetails {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageObject {
    pub id: String,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

impl MessageObject {
    /// Concatenated text parts of the message
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                MessageContent::Text { text } => Some(text.value.as_str()),
                MessageContent::Other => None,
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: TextValue },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct TextValue {
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageDeltaObject {
    pub id: String,
    pub delta: MessageDelta,
}

#[derive(Debug, Deserialize)]
pub struct MessageDelta {
    #[serde(default)]
    pub content: Vec<MessageDeltaContent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageDeltaContent {
    Text {
        #[serde(default)]
        text: Option<TextDelta>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct TextDelta {
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RunStepObject {
    pub id: String,
    #[serde(default)]
    pub step_details: Option<StepDetails>,
}

#[derive(Debug, Deserialize)]
pub struct RunStepDeltaObject {
    pub id: String,
    pub delta: RunStepDelta,
}

#[derive(Debug, Deserialize)]
pub struct RunStepDelta {
    #[serde(default)]
    pub step_details: Option<StepDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepDetails {
    ToolCalls {
        #[serde(default)]
        tool_calls: Vec<ToolCall>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Pull a human readable message out of an API error body
///
/// Accepts `{"error": {"message": ..}}`, `{"error": ".."}` and `{"message": ..}`.
pub fn extract_error_message(body: &Value) -> Option<String> {
    if let Some(error) = body.get("error") {
        if let Some(message) = error.get("message").and_then(Value::as_str) {
            return Some(message.to_string());
        }
        if let Some(message) = error.as_str() {
            return Some(message.to_string());
        }
    }
    body.get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
}
