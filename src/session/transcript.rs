use crate::assistant::Attachment;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    #[default]
    Message,
    /// A failure shown to the user in place of (or after) a response
    Error,
}

/// One contribution to a session's conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    #[serde(default)]
    pub kind: TurnKind,
    pub content: String,
    /// Uploaded files of a user turn, set once when its upload finishes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<Element>,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, TurnKind::Message, content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, TurnKind::Message, content.into())
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, TurnKind::Error, content.into())
    }

    pub fn with_elements(mut self, elements: Vec<Element>) -> Self {
        self.elements = elements;
        self
    }

    fn new(role: Role, kind: TurnKind, content: String) -> Self {
        Self {
            role,
            kind,
            content,
            attachments: Vec::new(),
            elements: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    #[default]
    File,
    Audio,
    Image,
}

/// A file, image or audio clip attached to a UI message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub name: String,
    #[serde(default)]
    pub kind: ElementKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    /// Inline bytes, base64 on the wire
    #[serde(default, with = "inline_bytes", skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<u8>,
    /// Server-side file to read when no inline bytes are given
    ///
    /// Set only by the server (e.g. for its own upload spool); never taken
    /// from or written to the wire.
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

impl Element {
    pub fn file(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            kind: ElementKind::File,
            mime: None,
            content,
            path: None,
        }
    }

    pub fn audio(name: impl Into<String>, mime: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            kind: ElementKind::Audio,
            mime: Some(mime.into()),
            content,
            path: None,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }
}

mod inline_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
