pub mod client;
pub mod messages;
pub mod stream;

pub use client::OpenAIClient;
pub use stream::{decode_event, into_event_stream};
