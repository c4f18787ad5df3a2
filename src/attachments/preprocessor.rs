use crate::assistant::{Attachment, ConversationClient, FileTool};
use crate::session::{Element, ElementKind};
use anyhow::{bail, Context, Result};
use futures::future::join_all;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Extensions the `file_search` tool can index
const SEARCHABLE_EXTENSIONS: &[&str] = &[
    "c", "cpp", "cs", "css", "doc", "docx", "go", "html", "java", "js", "json", "md", "pdf",
    "php", "pptx", "py", "rb", "sh", "tex", "ts", "txt",
];

const SEARCHABLE_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/json",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "text/markdown",
    "text/plain",
    "text/html",
];

/// A file that could not be attached, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadFailure {
    pub name: String,
    pub reason: String,
}

/// Result of preprocessing one message's elements
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttachmentBatch {
    /// Successful uploads, in element order
    pub attachments: Vec<Attachment>,
    pub failures: Vec<UploadFailure>,
}

impl AttachmentBatch {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Whether `file_search` can read this file
pub fn is_search_eligible(element: &Element) -> bool {
    let by_mime = element.mime.as_deref().is_some_and(|mime| {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        SEARCHABLE_MIME_TYPES
            .iter()
            .any(|m| m.eq_ignore_ascii_case(essence))
    });

    let by_extension = Path::new(&element.name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SEARCHABLE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        });

    by_mime || by_extension
}

/// Uploads message elements and builds their attachment references
#[derive(Clone)]
pub struct FilePreprocessor {
    client: Arc<dyn ConversationClient>,
    code_interpreter: bool,
}

impl FilePreprocessor {
    pub fn new(client: Arc<dyn ConversationClient>) -> Self {
        Self {
            client,
            code_interpreter: false,
        }
    }

    /// Grant `code_interpreter` on every attachment as well
    pub fn with_code_interpreter(mut self, enabled: bool) -> Self {
        self.code_interpreter = enabled;
        self
    }

    /// Upload every element concurrently and collect references and failures
    ///
    /// Audio clips are only rendered; they are transcribed, never attached.
    pub async fn process(&self, elements: &[Element]) -> AttachmentBatch {
        let files: Vec<&Element> = elements
            .iter()
            .filter(|element| element.kind != ElementKind::Audio)
            .collect();
        if files.len() < elements.len() {
            debug!(
                "Skipping {} audio element(s) for upload",
                elements.len() - files.len()
            );
        }
        if files.is_empty() {
            return AttachmentBatch::default();
        }

        let results = join_all(files.iter().map(|element| self.upload(element))).await;

        let mut batch = AttachmentBatch::default();
        for (element, result) in files.iter().zip(results) {
            match result {
                Ok(attachment) => batch.attachments.push(attachment),
                Err(e) => {
                    warn!("Failed to attach {}: {:#}", element.name, e);
                    batch.failures.push(UploadFailure {
                        name: element.name.clone(),
                        reason: format!("{:#}", e),
                    });
                }
            }
        }

        info!(
            "Prepared {} attachment(s), {} failed",
            batch.attachments.len(),
            batch.failures.len()
        );

        batch
    }

    async fn upload(&self, element: &Element) -> Result<Attachment> {
        let bytes = read_element(element).await?;
        let file_id = self
            .client
            .upload_file(&element.name, bytes)
            .await
            .context("upload rejected")?;

        Ok(Attachment {
            file_id,
            tools: self.tools_for(element),
        })
    }

    fn tools_for(&self, element: &Element) -> Vec<FileTool> {
        let mut tools = Vec::new();
        if self.code_interpreter {
            tools.push(FileTool::CodeInterpreter);
        }
        if is_search_eligible(element) {
            tools.push(FileTool::FileSearch);
        }
        tools
    }
}

async fn read_element(element: &Element) -> Result<Vec<u8>> {
    if !element.content.is_empty() {
        return Ok(element.content.clone());
    }

    match &element.path {
        Some(path) => tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display())),
        None => bail!("element has no content"),
    }
}
