use super::messages::{
    extract_error_message, MessageDeltaContent, MessageDeltaObject, MessageObject,
    RunStepDeltaObject, RunStepObject, RunObject, StepDetails,
};
use crate::assistant::{ClientError, EventStream, StreamEvent, ToolKind};
use eventsource_stream::Eventsource;
use futures::stream::{self, StreamExt};
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{trace, warn};

/// Turn a streamed run response into a sequence of [`StreamEvent`]s
pub fn into_event_stream(response: Response) -> EventStream {
    let events = response
        .bytes_stream()
        .eventsource()
        .flat_map(|item| {
            let batch: Vec<Result<StreamEvent, ClientError>> = match item {
                Ok(sse) => {
                    trace!("Assistant SSE {}: {}", sse.event, sse.data);
                    match decode_event(&sse.event, &sse.data) {
                        Ok(events) => events.into_iter().map(Ok).collect(),
                        Err(e) => vec![Err(e)],
                    }
                }
                Err(e) => vec![Err(ClientError::Stream(e.to_string()))],
            };
            stream::iter(batch)
        });

    Box::pin(events)
}

fn parse<T: DeserializeOwned>(event: &str, data: &str) -> Result<T, ClientError> {
    serde_json::from_str(data)
        .map_err(|e| ClientError::Decode(format!("{} payload: {}, data: {}", event, e, data)))
}

/// Map one server-sent event onto zero or more stream events
///
/// Status changes that carry no renderable content (queued, in_progress,
/// step created for message creation, ...) map to nothing.
pub fn decode_event(event: &str, data: &str) -> Result<Vec<StreamEvent>, ClientError> {
    let mapped = match event {
        "thread.run.created" => {
            let run: RunObject = parse(event, data)?;
            vec![StreamEvent::RunStarted { run_id: run.id }]
        }
        "thread.run.completed" => vec![StreamEvent::RunCompleted],
        "thread.run.failed" => {
            let run: RunObject = parse(event, data)?;
            let reason = match run.last_error {
                Some(err) => match err.code {
                    Some(code) => format!("{}: {}", code, err.message),
                    None => err.message,
                },
                None => "run failed".to_string(),
            };
            vec![StreamEvent::RunFailed { reason }]
        }
        "thread.run.cancelled" => vec![StreamEvent::RunCancelled],
        "thread.run.expired" => vec![StreamEvent::RunExpired],
        "thread.run.incomplete" => {
            let run: RunObject = parse(event, data)?;
            let reason = run
                .incomplete_details
                .and_then(|details| details.reason)
                .unwrap_or_else(|| "unknown".to_string());
            vec![StreamEvent::RunIncomplete { reason }]
        }
        "thread.run.requires_action" => vec![StreamEvent::RunRequiresAction],
        "thread.message.created" => {
            let message: MessageObject = parse(event, data)?;
            vec![StreamEvent::MessageStarted {
                message_id: message.id,
            }]
        }
        "thread.message.delta" => {
            let delta: MessageDeltaObject = parse(event, data)?;
            let message_id = delta.id;
            delta
                .delta
                .content
                .into_iter()
                .filter_map(|part| match part {
                    MessageDeltaContent::Text { text } => text.and_then(|t| t.value),
                    MessageDeltaContent::Other => None,
                })
                .filter(|text| !text.is_empty())
                .map(|text| StreamEvent::TextDelta {
                    message_id: message_id.clone(),
                    text,
                })
                .collect()
        }
        "thread.message.completed" => {
            let message: MessageObject = parse(event, data)?;
            let text = message.text();
            vec![StreamEvent::MessageCompleted {
                message_id: message.id,
                text,
            }]
        }
        "thread.run.step.created" => {
            let step: RunStepObject = parse(event, data)?;
            tool_calls(step.step_details)
                .into_iter()
                .filter_map(|(id, _, tool)| {
                    id.map(|call_id| StreamEvent::ToolCallStarted { call_id, tool })
                })
                .collect()
        }
        "thread.run.step.delta" => {
            let step: RunStepDeltaObject = parse(event, data)?;
            tool_calls(step.delta.step_details)
                .into_iter()
                .map(|(id, index, tool)| match id {
                    Some(call_id) => StreamEvent::ToolCallStarted { call_id, tool },
                    None => StreamEvent::ToolCallDelta { index, tool },
                })
                .collect()
        }
        "thread.run.step.completed" => {
            let step: RunStepObject = parse(event, data)?;
            let step_id = step.id;
            tool_calls(step.step_details)
                .into_iter()
                .map(|(id, index, tool)| StreamEvent::ToolCallCompleted {
                    call_id: id.unwrap_or_else(|| format!("{}:{}", step_id, index)),
                    tool,
                })
                .collect()
        }
        "error" => {
            let message = serde_json::from_str::<Value>(data)
                .ok()
                .and_then(|body| extract_error_message(&body))
                .unwrap_or_else(|| data.to_string());
            vec![StreamEvent::Error { message }]
        }
        "done" => vec![StreamEvent::Done],
        other if other.starts_with("thread.") => Vec::new(),
        other => {
            warn!("Ignoring unknown assistant stream event: {}", other);
            Vec::new()
        }
    };

    Ok(mapped)
}

fn tool_calls(details: Option<StepDetails>) -> Vec<(Option<String>, u32, ToolKind)> {
    match details {
        Some(StepDetails::ToolCalls { tool_calls }) => tool_calls
            .into_iter()
            .enumerate()
            .map(|(position, call)| {
                let index = call.index.unwrap_or(position as u32);
                (call.id, index, ToolKind::from_wire(&call.kind))
            })
            .collect(),
        _ => Vec::new(),
    }
}
