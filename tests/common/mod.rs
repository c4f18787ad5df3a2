// Scripted in-memory assistant service shared by the integration tests
#![allow(dead_code)]

use assistant_relay::{
    AssistantInfo, ClientError, ConversationClient, EventStream, NewMessage, StreamEvent,
    ToolResources,
};
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    RetrieveAssistant { assistant_id: String },
    CreateThread,
    AppendMessage { thread_id: String, message: NewMessage },
    StreamRun { thread_id: String, assistant_id: String },
    CancelRun { thread_id: String, run_id: String },
    UploadFile { filename: String, size: usize },
    Transcribe { filename: String, size: usize },
    CreateVectorStore { name: String, file_ids: Vec<String> },
    UpdateAssistant { assistant_id: String, vector_store_ids: Vec<String> },
}

/// Counts runs whose event stream is still alive
struct ActiveRun {
    active: Arc<AtomicUsize>,
}

impl ActiveRun {
    fn new(active: Arc<AtomicUsize>, max: Arc<AtomicUsize>) -> Self {
        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        Self { active }
    }
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct MockClient {
    calls: Mutex<Vec<Call>>,
    runs: Mutex<VecDeque<Vec<StreamEvent>>>,
    failing_uploads: Mutex<Vec<String>>,
    transcription: Mutex<String>,
    event_delay: Mutex<Option<Duration>>,
    threads_created: AtomicUsize,
    files_uploaded: AtomicUsize,
    pub fail_create_thread: AtomicBool,
    pub fail_append: AtomicBool,
    pub fail_stream_run: AtomicBool,
    pub fail_transcribe: AtomicBool,
    pub fail_vector_store: AtomicBool,
    /// Streams stay open after their scripted events
    pub hang_after_script: AtomicBool,
    active_runs: Arc<AtomicUsize>,
    max_active_runs: Arc<AtomicUsize>,
    append_gate: Mutex<Option<Arc<Semaphore>>>,
    pub append_entered: Notify,
}

impl MockClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue the events of the next run
    pub fn push_run(&self, events: Vec<StreamEvent>) {
        self.runs.lock().unwrap().push_back(events);
    }

    pub fn fail_upload_of(&self, name: &str) {
        self.failing_uploads.lock().unwrap().push(name.to_string());
    }

    pub fn set_transcription(&self, text: &str) {
        *self.transcription.lock().unwrap() = text.to_string();
    }

    pub fn set_event_delay(&self, delay: Duration) {
        *self.event_delay.lock().unwrap() = Some(delay);
    }

    /// Make `append_message` wait for a permit on the returned semaphore
    pub fn gate_appends(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.append_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_concurrent_runs(&self) -> usize {
        self.max_active_runs.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn api_error(message: &str) -> ClientError {
        ClientError::Api {
            status: 500,
            message: message.to_string(),
        }
    }
}

/// A complete successful run answering with `text`
pub fn completed_run(run_id: &str, message_id: &str, deltas: &[&str]) -> Vec<StreamEvent> {
    let mut events = vec![
        StreamEvent::RunStarted {
            run_id: run_id.to_string(),
        },
        StreamEvent::MessageStarted {
            message_id: message_id.to_string(),
        },
    ];
    events.extend(deltas.iter().map(|text| StreamEvent::TextDelta {
        message_id: message_id.to_string(),
        text: text.to_string(),
    }));
    events.push(StreamEvent::MessageCompleted {
        message_id: message_id.to_string(),
        text: deltas.concat(),
    });
    events.push(StreamEvent::RunCompleted);
    events
}

#[async_trait::async_trait]
impl ConversationClient for MockClient {
    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<AssistantInfo, ClientError> {
        self.record(Call::RetrieveAssistant {
            assistant_id: assistant_id.to_string(),
        });
        Ok(AssistantInfo {
            id: assistant_id.to_string(),
            name: "Docs Helper".to_string(),
        })
    }

    async fn create_thread(&self) -> Result<String, ClientError> {
        self.record(Call::CreateThread);
        if self.fail_create_thread.load(Ordering::SeqCst) {
            return Err(Self::api_error("thread creation unavailable"));
        }
        let n = self.threads_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("thread_{}", n))
    }

    async fn append_message(
        &self,
        thread_id: &str,
        message: NewMessage,
    ) -> Result<String, ClientError> {
        self.append_entered.notify_one();
        let gate = self.append_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire()
                .await
                .map_err(|e| ClientError::Transport(e.to_string()))?
                .forget();
        }

        self.record(Call::AppendMessage {
            thread_id: thread_id.to_string(),
            message,
        });
        if self.fail_append.load(Ordering::SeqCst) {
            return Err(Self::api_error("append rejected"));
        }
        Ok("msg_user".to_string())
    }

    async fn stream_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<EventStream, ClientError> {
        self.record(Call::StreamRun {
            thread_id: thread_id.to_string(),
            assistant_id: assistant_id.to_string(),
        });
        if self.fail_stream_run.load(Ordering::SeqCst) {
            return Err(ClientError::Api {
                status: 429,
                message: "rate limited".to_string(),
            });
        }

        let script = self
            .runs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| completed_run("run_default", "msg_default", &["ok"]));
        let delay = *self.event_delay.lock().unwrap();
        let hang = self.hang_after_script.load(Ordering::SeqCst);
        let guard = ActiveRun::new(
            Arc::clone(&self.active_runs),
            Arc::clone(&self.max_active_runs),
        );

        let scripted = stream::iter(script.into_iter().map(Ok)).then(move |event| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            event
        });
        let events = if hang {
            scripted.chain(stream::pending()).boxed()
        } else {
            scripted.boxed()
        };

        Ok(Box::pin(events.map(move |event| {
            let _alive = &guard;
            event
        })))
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<(), ClientError> {
        self.record(Call::CancelRun {
            thread_id: thread_id.to_string(),
            run_id: run_id.to_string(),
        });
        Ok(())
    }

    async fn upload_file(&self, filename: &str, bytes: Vec<u8>) -> Result<String, ClientError> {
        self.record(Call::UploadFile {
            filename: filename.to_string(),
            size: bytes.len(),
        });
        if self
            .failing_uploads
            .lock()
            .unwrap()
            .iter()
            .any(|name| name == filename)
        {
            return Err(ClientError::Api {
                status: 400,
                message: format!("{} is not supported", filename),
            });
        }
        let n = self.files_uploaded.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("file_{}", n))
    }

    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String, ClientError> {
        self.record(Call::Transcribe {
            filename: filename.to_string(),
            size: audio.len(),
        });
        if self.fail_transcribe.load(Ordering::SeqCst) {
            return Err(Self::api_error("transcription backend down"));
        }
        Ok(self.transcription.lock().unwrap().clone())
    }

    async fn create_vector_store(
        &self,
        name: &str,
        file_ids: &[String],
    ) -> Result<String, ClientError> {
        self.record(Call::CreateVectorStore {
            name: name.to_string(),
            file_ids: file_ids.to_vec(),
        });
        if self.fail_vector_store.load(Ordering::SeqCst) {
            return Err(Self::api_error("vector store quota exceeded"));
        }
        Ok("vs_1".to_string())
    }

    async fn update_assistant(
        &self,
        assistant_id: &str,
        resources: ToolResources,
    ) -> Result<(), ClientError> {
        self.record(Call::UpdateAssistant {
            assistant_id: assistant_id.to_string(),
            vector_store_ids: resources.vector_store_ids,
        });
        Ok(())
    }
}
