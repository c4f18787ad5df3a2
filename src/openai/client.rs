use super::messages::{
    extract_error_message, AssistantObject, CreateMessageRequest, CreateRunRequest,
    CreateVectorStoreRequest, FileSearchResources, MessageAttachment, ObjectId,
    ToolResourcesPayload, TranscriptionResponse, UpdateAssistantRequest,
};
use super::stream::into_event_stream;
use crate::assistant::{
    AssistantInfo, ClientError, ConversationClient, EventStream, NewMessage, ToolResources,
};
use crate::config::OpenAIConfig;
use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

const ASSISTANTS_BETA: &str = "assistants=v2";

/// Assistants API client over HTTPS
pub struct OpenAIClient {
    http: Client,
    base_url: String,
    api_key: String,
    transcription_model: String,
}

impl OpenAIClient {
    pub fn new(config: &OpenAIConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;

        info!("Assistants API client targeting {}", config.base_url);

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            transcription_model: config.transcription_model.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Request against an Assistants v2 endpoint
    fn beta(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", ASSISTANTS_BETA)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = check_status(request.send().await?).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Convert a non-success response into [`ClientError::Api`]
async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str(&body)
        .ok()
        .and_then(|value| extract_error_message(&value))
        .unwrap_or(body);

    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait::async_trait]
impl ConversationClient for OpenAIClient {
    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<AssistantInfo, ClientError> {
        let request = self.beta(self.http.get(self.url(&format!("/assistants/{}", assistant_id))));
        let assistant: AssistantObject = self.send_json(request).await?;

        Ok(AssistantInfo {
            name: assistant.name.unwrap_or_else(|| "Assistant".to_string()),
            id: assistant.id,
        })
    }

    async fn create_thread(&self) -> Result<String, ClientError> {
        let request = self
            .beta(self.http.post(self.url("/threads")))
            .json(&serde_json::json!({}));
        let thread: ObjectId = self.send_json(request).await?;

        debug!("Created thread {}", thread.id);
        Ok(thread.id)
    }

    async fn append_message(
        &self,
        thread_id: &str,
        message: NewMessage,
    ) -> Result<String, ClientError> {
        let body = CreateMessageRequest {
            role: "user",
            content: message.content,
            attachments: message
                .attachments
                .into_iter()
                .map(MessageAttachment::from)
                .collect(),
        };
        let request = self
            .beta(self.http.post(self.url(&format!("/threads/{}/messages", thread_id))))
            .json(&body);
        let created: ObjectId = self.send_json(request).await?;

        debug!("Appended message {} to thread {}", created.id, thread_id);
        Ok(created.id)
    }

    async fn stream_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<EventStream, ClientError> {
        let body = CreateRunRequest {
            assistant_id,
            stream: true,
        };
        let response = self
            .beta(self.http.post(self.url(&format!("/threads/{}/runs", thread_id))))
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;

        debug!("Streaming run on thread {}", thread_id);
        Ok(into_event_stream(response))
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<(), ClientError> {
        let request = self.beta(self.http.post(self.url(&format!(
            "/threads/{}/runs/{}/cancel",
            thread_id, run_id
        ))));
        let _: ObjectId = self.send_json(request).await?;

        info!("Cancelled run {} on thread {}", run_id, thread_id);
        Ok(())
    }

    async fn upload_file(&self, filename: &str, bytes: Vec<u8>) -> Result<String, ClientError> {
        let size = bytes.len();
        let form = Form::new()
            .text("purpose", "assistants")
            .part("file", Part::bytes(bytes).file_name(filename.to_string()));
        let request = self
            .http
            .post(self.url("/files"))
            .bearer_auth(&self.api_key)
            .multipart(form);
        let file: ObjectId = self.send_json(request).await?;

        info!("Uploaded {} ({} bytes) as {}", filename, size, file.id);
        Ok(file.id)
    }

    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String, ClientError> {
        let form = Form::new()
            .text("model", self.transcription_model.clone())
            .part("file", Part::bytes(audio).file_name(filename.to_string()));
        let request = self
            .http
            .post(self.url("/audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form);
        let transcription: TranscriptionResponse = self.send_json(request).await?;

        Ok(transcription.text)
    }

    async fn create_vector_store(
        &self,
        name: &str,
        file_ids: &[String],
    ) -> Result<String, ClientError> {
        let request = self
            .beta(self.http.post(self.url("/vector_stores")))
            .json(&CreateVectorStoreRequest { name, file_ids });
        let store: ObjectId = self.send_json(request).await?;

        Ok(store.id)
    }

    async fn update_assistant(
        &self,
        assistant_id: &str,
        resources: ToolResources,
    ) -> Result<(), ClientError> {
        let body = UpdateAssistantRequest {
            tool_resources: ToolResourcesPayload {
                file_search: FileSearchResources {
                    vector_store_ids: resources.vector_store_ids,
                },
            },
        };
        let request = self
            .beta(self.http.post(self.url(&format!("/assistants/{}", assistant_id))))
            .json(&body);
        let _: ObjectId = self.send_json(request).await?;

        Ok(())
    }
}
