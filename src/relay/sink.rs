use crate::assistant::ToolKind;
use crate::session::Turn;
use serde::Serialize;
use std::sync::Mutex;

/// What the UI is told to draw
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    /// A complete turn (greeting, user message, error, notice)
    Turn { turn: Turn },
    /// An assistant message began streaming
    MessageStarted { message_id: String },
    Token { message_id: String, delta: String },
    /// The streamed message is final; `content` is everything shown so far
    MessageCompleted { message_id: String, content: String },
    ToolStarted { call_id: String, tool: ToolKind },
    ToolFinished { call_id: String, tool: ToolKind, ok: bool },
    Error { message: String },
}

/// Destination for rendered UI updates
pub trait RenderSink: Send + Sync {
    fn render(&self, event: UiEvent);
}

/// Sink that keeps every event, for inspection
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<UiEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<UiEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl RenderSink for RecordingSink {
    fn render(&self, event: UiEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
