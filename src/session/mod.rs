//! Chat session management
//!
//! This module provides the `ChatSession` abstraction that manages:
//! - The remote conversation thread opened at session start
//! - Typed and voice user turns, serialized per session
//! - Attachment upload and run streaming for each turn
//! - The in-memory transcript and live UI updates

mod config;
mod error;
mod session;
mod stats;
mod transcript;

pub use config::SessionConfig;
pub use error::TurnError;
pub use session::{ChatSession, TurnReport};
pub use stats::SessionStats;
pub use transcript::{Element, ElementKind, Role, Turn, TurnKind};
