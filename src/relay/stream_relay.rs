use super::sink::{RenderSink, UiEvent};
use crate::assistant::{ClientError, StreamEvent, ToolKind};
use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a relayed run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed(String),
    /// Cancelled on the service side
    Cancelled,
    Expired,
    Incomplete(String),
    RequiresAction,
    StreamError(String),
    /// The stream closed without a terminal event
    Interrupted,
    TimedOut,
    /// Stopped locally because the session went away
    Aborted,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }

    /// Whether the remote run may still be active and holding the thread
    pub fn may_leave_run_active(&self) -> bool {
        matches!(
            self,
            RunStatus::StreamError(_)
                | RunStatus::Interrupted
                | RunStatus::TimedOut
                | RunStatus::Aborted
        )
    }

    /// Text shown to the user for an unsuccessful run
    pub fn describe(&self) -> String {
        match self {
            RunStatus::Completed => "The assistant finished responding".to_string(),
            RunStatus::Failed(reason) => format!("The assistant run failed: {}", reason),
            RunStatus::Cancelled => "The assistant run was cancelled".to_string(),
            RunStatus::Expired => "The assistant run expired before completing".to_string(),
            RunStatus::Incomplete(reason) => {
                format!("The assistant response is incomplete ({})", reason)
            }
            RunStatus::RequiresAction => {
                "The assistant requested a function call, which is not supported here".to_string()
            }
            RunStatus::StreamError(err) => format!("Lost the response stream: {}", err),
            RunStatus::Interrupted => {
                "The response stream ended before the run finished".to_string()
            }
            RunStatus::TimedOut => {
                "The assistant did not finish responding in time".to_string()
            }
            RunStatus::Aborted => "The response was cancelled".to_string(),
        }
    }
}

/// Text of one assistant message as rendered to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssistantMessage {
    pub message_id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayOutcome {
    pub run_id: Option<String>,
    pub status: RunStatus,
    /// Non-empty messages in the order they started, partial ones included
    pub messages: Vec<AssistantMessage>,
}

impl RelayOutcome {
    /// All assistant text of the run
    pub fn text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Renders one run's event stream into UI events until the run ends
///
/// The relay never retries and never discards what it already rendered:
/// on any terminal state open messages are finalized with the text shown
/// so far.
pub struct StreamRelay<'a> {
    sink: &'a dyn RenderSink,
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl<'a> StreamRelay<'a> {
    pub fn new(sink: &'a dyn RenderSink) -> Self {
        Self {
            sink,
            timeout: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Give up once the run has streamed for this long
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn run<S>(self, mut events: S) -> RelayOutcome
    where
        S: Stream<Item = Result<StreamEvent, ClientError>> + Unpin,
    {
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        let mut state = RelayState::default();

        let status = loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break RunStatus::Aborted,
                next = next_event(&mut events, deadline) => next,
            };

            match next {
                None => break RunStatus::TimedOut,
                Some(None) => break RunStatus::Interrupted,
                Some(Some(Err(e))) => break RunStatus::StreamError(e.to_string()),
                Some(Some(Ok(event))) => {
                    if let Some(status) = state.apply(event, self.sink) {
                        break status;
                    }
                }
            }
        };

        state.finish(self.sink, &status);

        if status.is_success() {
            info!(
                "Run {} completed with {} message(s)",
                state.run_id.as_deref().unwrap_or("<unknown>"),
                state.messages.len()
            );
        } else {
            warn!(
                "Run {} ended without completing: {:?}",
                state.run_id.as_deref().unwrap_or("<unknown>"),
                status
            );
            self.sink.render(UiEvent::Error {
                message: status.describe(),
            });
        }

        RelayOutcome {
            run_id: state.run_id,
            status,
            messages: state
                .messages
                .into_iter()
                .filter(|m| !m.text.is_empty())
                .map(|m| AssistantMessage {
                    message_id: m.id,
                    text: m.text,
                })
                .collect(),
        }
    }
}

/// Next stream item, or `None` once the deadline passes
async fn next_event<S>(
    events: &mut S,
    deadline: Option<Instant>,
) -> Option<Option<Result<StreamEvent, ClientError>>>
where
    S: Stream<Item = Result<StreamEvent, ClientError>> + Unpin,
{
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, events.next()).await.ok(),
        None => Some(events.next().await),
    }
}

struct MessageState {
    id: String,
    text: String,
    saw_delta: bool,
    completed: bool,
}

struct ToolState {
    call_id: String,
    tool: ToolKind,
    running: bool,
}

#[derive(Default)]
struct RelayState {
    run_id: Option<String>,
    messages: Vec<MessageState>,
    tools: Vec<ToolState>,
}

impl RelayState {
    /// Apply one event; returns the run status once the event is terminal
    fn apply(&mut self, event: StreamEvent, sink: &dyn RenderSink) -> Option<RunStatus> {
        match event {
            StreamEvent::RunStarted { run_id } => {
                debug!("Run {} started", run_id);
                self.run_id = Some(run_id);
            }
            StreamEvent::MessageStarted { message_id } => {
                self.message(&message_id, sink);
            }
            StreamEvent::TextDelta { message_id, text } => {
                let message = self.message(&message_id, sink);
                message.text.push_str(&text);
                message.saw_delta = true;
                sink.render(UiEvent::Token {
                    message_id,
                    delta: text,
                });
            }
            StreamEvent::MessageCompleted { message_id, text } => {
                let message = self.message(&message_id, sink);
                if !message.saw_delta {
                    message.text = text;
                }
                if !message.completed {
                    message.completed = true;
                    sink.render(UiEvent::MessageCompleted {
                        message_id,
                        content: message.text.clone(),
                    });
                }
            }
            StreamEvent::ToolCallStarted { call_id, tool } => {
                self.tool_started(call_id, tool, sink);
            }
            StreamEvent::ToolCallDelta { .. } => {}
            StreamEvent::ToolCallCompleted { call_id, tool } => {
                self.tool_started(call_id.clone(), tool, sink);
                if let Some(state) = self.tools.iter_mut().find(|t| t.call_id == call_id) {
                    if state.running {
                        state.running = false;
                        sink.render(UiEvent::ToolFinished {
                            call_id,
                            tool: state.tool.clone(),
                            ok: true,
                        });
                    }
                }
            }
            StreamEvent::RunCompleted => return Some(RunStatus::Completed),
            StreamEvent::RunFailed { reason } => return Some(RunStatus::Failed(reason)),
            StreamEvent::RunCancelled => return Some(RunStatus::Cancelled),
            StreamEvent::RunExpired => return Some(RunStatus::Expired),
            StreamEvent::RunIncomplete { reason } => return Some(RunStatus::Incomplete(reason)),
            StreamEvent::RunRequiresAction => return Some(RunStatus::RequiresAction),
            StreamEvent::Error { message } => return Some(RunStatus::Failed(message)),
            StreamEvent::Done => return Some(RunStatus::Interrupted),
        }
        None
    }

    /// The message with this id, rendering its start on first sight
    fn message(&mut self, message_id: &str, sink: &dyn RenderSink) -> &mut MessageState {
        let position = match self.messages.iter().position(|m| m.id == message_id) {
            Some(position) => position,
            None => {
                sink.render(UiEvent::MessageStarted {
                    message_id: message_id.to_string(),
                });
                self.messages.push(MessageState {
                    id: message_id.to_string(),
                    text: String::new(),
                    saw_delta: false,
                    completed: false,
                });
                self.messages.len() - 1
            }
        };
        &mut self.messages[position]
    }

    fn tool_started(&mut self, call_id: String, tool: ToolKind, sink: &dyn RenderSink) {
        if self.tools.iter().any(|t| t.call_id == call_id) {
            return;
        }
        sink.render(UiEvent::ToolStarted {
            call_id: call_id.clone(),
            tool: tool.clone(),
        });
        self.tools.push(ToolState {
            call_id,
            tool,
            running: true,
        });
    }

    /// Close whatever is still open so the rendered output stays consistent
    fn finish(&mut self, sink: &dyn RenderSink, status: &RunStatus) {
        for message in self.messages.iter_mut().filter(|m| !m.completed) {
            message.completed = true;
            sink.render(UiEvent::MessageCompleted {
                message_id: message.id.clone(),
                content: message.text.clone(),
            });
        }

        for tool in self.tools.iter_mut().filter(|t| t.running) {
            tool.running = false;
            sink.render(UiEvent::ToolFinished {
                call_id: tool.call_id.clone(),
                tool: tool.tool.clone(),
                ok: status.is_success(),
            });
        }
    }
}
