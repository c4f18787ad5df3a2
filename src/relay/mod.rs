//! Stream event relay
//!
//! Adapts a run's event stream to incremental UI updates:
//! - text deltas become tokens on the in-progress assistant message
//! - tool calls show a running indicator until their step completes
//! - unsuccessful terminal states add a single error indicator

mod sink;
mod stream_relay;

pub use sink::{RecordingSink, RenderSink, UiEvent};
pub use stream_relay::{AssistantMessage, RelayOutcome, RunStatus, StreamRelay};
