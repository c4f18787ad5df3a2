use serde::{Deserialize, Serialize};
use std::fmt;

/// Tool invoked by the assistant during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    FileSearch,
    CodeInterpreter,
    Function,
    Other(String),
}

impl ToolKind {
    pub fn from_wire(kind: &str) -> Self {
        match kind {
            "file_search" => ToolKind::FileSearch,
            "code_interpreter" => ToolKind::CodeInterpreter,
            "function" => ToolKind::Function,
            other => ToolKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolKind::FileSearch => f.write_str("file_search"),
            ToolKind::CodeInterpreter => f.write_str("code_interpreter"),
            ToolKind::Function => f.write_str("function"),
            ToolKind::Other(name) => f.write_str(name),
        }
    }
}

/// One event from a run's stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    RunStarted { run_id: String },
    MessageStarted { message_id: String },
    TextDelta { message_id: String, text: String },
    /// Final text of a message as stored on the thread
    MessageCompleted { message_id: String, text: String },
    ToolCallStarted { call_id: String, tool: ToolKind },
    /// Incremental tool input or output; carries no id after the first delta
    ToolCallDelta { index: u32, tool: ToolKind },
    ToolCallCompleted { call_id: String, tool: ToolKind },
    RunCompleted,
    RunFailed { reason: String },
    RunCancelled,
    RunExpired,
    RunIncomplete { reason: String },
    /// The run is waiting for function outputs this relay never provides
    RunRequiresAction,
    /// Error reported by the service inside the stream
    Error { message: String },
    /// End-of-stream sentinel
    Done,
}

impl StreamEvent {
    /// Whether the run has reached a state after which no more output arrives
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::RunCompleted
                | StreamEvent::RunFailed { .. }
                | StreamEvent::RunCancelled
                | StreamEvent::RunExpired
                | StreamEvent::RunIncomplete { .. }
                | StreamEvent::RunRequiresAction
                | StreamEvent::Error { .. }
        )
    }
}
