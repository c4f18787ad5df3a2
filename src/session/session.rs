use super::config::SessionConfig;
use super::error::TurnError;
use super::stats::SessionStats;
use super::transcript::{Element, Turn};
use crate::assistant::{Attachment, ConversationClient, NewMessage, StreamEvent};
use crate::attachments::{FilePreprocessor, UploadFailure};
use crate::audio::{AudioBuffer, AudioError, Transcriber};
use crate::relay::{RelayOutcome, RenderSink, StreamRelay, UiEvent};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// What one user turn produced
#[derive(Debug, Clone, Serialize)]
pub struct TurnReport {
    pub thread_id: String,

    /// Text the voice capture was transcribed to, for voice turns
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription: Option<String>,

    /// Number of files attached to the message
    pub attachments: usize,

    /// Files that could not be attached
    pub upload_failures: Vec<UploadFailure>,

    pub outcome: RelayOutcome,
}

/// A connected user's conversation with the assistant
///
/// Owns the remote thread handle, the transcript and the live voice
/// capture. Turns are serialized so at most one run streams on the thread.
pub struct ChatSession {
    id: Uuid,

    /// Thread every message and run of this session goes to
    thread_id: String,

    config: SessionConfig,

    client: Arc<dyn ConversationClient>,

    preprocessor: FilePreprocessor,

    transcriber: Transcriber,

    /// Ordered turns, oldest first
    transcript: Mutex<Vec<Turn>>,

    /// Live voice capture, if any
    audio: Mutex<Option<AudioBuffer>>,

    /// Held for the whole of a turn, from message append until its run is over
    /// (including a remote cancel after the turn was dropped)
    turn_lock: Arc<tokio::sync::Mutex<()>>,

    /// Whether a run is currently streaming
    responding: AtomicBool,

    /// UI updates for connected listeners
    events: broadcast::Sender<UiEvent>,

    /// Cancelled when the session closes
    cancel: CancellationToken,

    started_at: DateTime<Utc>,
}

impl ChatSession {
    /// Open a session: create its thread and greet the user
    ///
    /// Thread creation is not retried; there is no way to make it idempotent.
    pub async fn on_session_start(
        config: SessionConfig,
        client: Arc<dyn ConversationClient>,
    ) -> Result<Self, TurnError> {
        let thread_id = client
            .create_thread()
            .await
            .map_err(TurnError::ThreadNotCreated)?;

        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let preprocessor =
            FilePreprocessor::new(Arc::clone(&client)).with_code_interpreter(config.code_interpreter);
        let transcriber = Transcriber::new(Arc::clone(&client));

        let session = Self {
            id: Uuid::new_v4(),
            thread_id,
            config,
            client,
            preprocessor,
            transcriber,
            transcript: Mutex::new(Vec::new()),
            audio: Mutex::new(None),
            turn_lock: Arc::new(tokio::sync::Mutex::new(())),
            responding: AtomicBool::new(false),
            events,
            cancel: CancellationToken::new(),
            started_at: Utc::now(),
        };

        info!(
            "Session {} started on thread {}",
            session.id, session.thread_id
        );

        session.record(Turn::assistant(format!(
            "Hello, I'm {}!",
            session.config.assistant_name
        )));

        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Handle a typed user message
    ///
    /// Waits for any previous turn of this session to finish first.
    pub async fn on_user_turn(
        &self,
        content: &str,
        elements: Vec<Element>,
    ) -> Result<TurnReport, TurnError> {
        self.ensure_open()?;
        let turn = Arc::clone(&self.turn_lock).lock_owned().await;
        self.ensure_open()?;

        self.submit(turn, content.to_string(), elements).await
    }

    /// Begin a new voice capture, replacing any unfinished one
    pub fn on_audio_start(&self, mime_type: &str) -> Result<(), TurnError> {
        self.ensure_open()?;
        if mime_type.trim().is_empty() {
            return Err(AudioError::MissingMimeType.into());
        }

        let buffer = AudioBuffer::new(mime_type.trim(), self.config.max_audio_bytes);
        if let Some(stale) = self.audio().replace(buffer) {
            warn!(
                "Session {}: discarding unfinished capture ({} bytes of {})",
                self.id,
                stale.len(),
                stale.mime_type()
            );
        }

        debug!("Session {}: audio capture started ({})", self.id, mime_type);
        Ok(())
    }

    /// Append bytes to the live capture; returns the bytes buffered so far
    ///
    /// A capture that outgrows the configured limit is dropped.
    pub fn on_audio_chunk(&self, chunk: &[u8]) -> Result<usize, TurnError> {
        self.ensure_open()?;

        let appended = {
            let mut audio = self.audio();
            let buffer = audio.as_mut().ok_or(AudioError::NoCapture)?;
            match buffer.append(chunk) {
                Ok(()) => Ok(buffer.len()),
                Err(e) => {
                    *audio = None;
                    Err(e)
                }
            }
        };

        appended.map_err(|e| {
            warn!("Session {}: {}", self.id, e);
            self.surface("Your voice message was too long and has been discarded.");
            TurnError::Audio(e)
        })
    }

    /// Audio chunk as delivered by the UI: the first chunk of a capture carries
    /// `is_start` and the MIME type
    pub fn on_audio_chunk_event(
        &self,
        is_start: bool,
        mime_type: Option<&str>,
        chunk: &[u8],
    ) -> Result<usize, TurnError> {
        if is_start {
            self.on_audio_start(mime_type.ok_or(AudioError::MissingMimeType)?)?;
        }
        self.on_audio_chunk(chunk)
    }

    /// Finish the live capture: show it, transcribe it and send the text as a
    /// regular user turn with the same trailing elements
    pub async fn on_audio_end(&self, elements: Vec<Element>) -> Result<TurnReport, TurnError> {
        self.ensure_open()?;

        let buffer = self.audio().take().ok_or(AudioError::NoCapture)?;
        if buffer.is_empty() {
            warn!("Session {}: audio capture ended without any audio", self.id);
            self.surface("Your voice message was empty.");
            return Err(AudioError::EmptyCapture.into());
        }
        let audio = buffer.seal();

        let turn = Arc::clone(&self.turn_lock).lock_owned().await;
        self.ensure_open()?;

        let mut shown = vec![Element::audio(
            audio.filename.clone(),
            audio.mime_type.clone(),
            audio.bytes.clone(),
        )];
        shown.extend(elements.iter().cloned());
        self.record(Turn::user("").with_elements(shown));

        let text = match self.cancellable(self.transcriber.transcribe(&audio)).await? {
            Ok(text) => text,
            Err(e) => {
                error!("Session {}: transcription failed: {}", self.id, e);
                self.surface(format!("Your voice message could not be transcribed: {}", e));
                return Err(TurnError::Transcription(e));
            }
        };

        if text.is_empty() {
            self.surface("No speech was recognised in your voice message.");
            return Err(TurnError::EmptyTranscription);
        }

        info!("Session {}: transcribed {} characters", self.id, text.len());

        let mut report = self.submit(turn, text.clone(), elements).await?;
        report.transcription = Some(text);
        Ok(report)
    }

    /// Tear the session down: stop in-flight work and drop any capture
    pub fn close(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();

        if let Some(buffer) = self.audio().take() {
            debug!(
                "Session {}: dropped {} bytes of unfinished audio",
                self.id,
                buffer.len()
            );
        }

        info!("Session {} closed", self.id);
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Listen to this session's UI updates
    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.events.subscribe()
    }

    /// Turns recorded so far, oldest first
    pub fn transcript(&self) -> Vec<Turn> {
        self.turns().clone()
    }

    pub fn stats(&self) -> SessionStats {
        let duration = Utc::now().signed_duration_since(self.started_at);

        SessionStats {
            session_id: self.id.to_string(),
            thread_id: self.thread_id.clone(),
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            turns_count: self.turns().len(),
            is_responding: self.responding.load(Ordering::SeqCst),
            audio_buffered_bytes: self.audio().as_ref().map(AudioBuffer::len),
            is_closed: self.is_closed(),
        }
    }

    /// Steps of one turn, run while holding `turn`
    async fn submit(
        &self,
        turn: OwnedMutexGuard<()>,
        content: String,
        elements: Vec<Element>,
    ) -> Result<TurnReport, TurnError> {
        let user_turn = self.record_turn(Turn::user(content.clone()).with_elements(elements.clone()));

        let batch = self.cancellable(self.preprocessor.process(&elements)).await?;
        if !batch.failures.is_empty() {
            let names: Vec<&str> = batch.failures.iter().map(|f| f.name.as_str()).collect();
            self.surface(format!(
                "{} of {} file(s) could not be attached: {}",
                batch.failures.len(),
                batch.attachments.len() + batch.failures.len(),
                names.join(", ")
            ));
        }
        self.record_attachments(user_turn, &batch.attachments);

        let message = NewMessage::new(content, batch.attachments.clone());
        let appended = self
            .cancellable(self.client.append_message(&self.thread_id, message))
            .await?;
        if let Err(e) = appended {
            error!("Session {}: append to {} failed: {}", self.id, self.thread_id, e);
            self.surface(format!("Your message could not be sent: {}", e));
            return Err(TurnError::MessageNotSent(e));
        }

        let started = self
            .cancellable(
                self.client
                    .stream_run(&self.thread_id, &self.config.assistant_id),
            )
            .await?;
        let events = match started {
            Ok(events) => events,
            Err(e) => {
                error!("Session {}: run start on {} failed: {}", self.id, self.thread_id, e);
                self.surface(format!(
                    "Your message was sent, but the assistant could not respond: {}",
                    e
                ));
                return Err(TurnError::ResponseFailed(e));
            }
        };

        self.responding.store(true, Ordering::SeqCst);
        let guard = RunGuard {
            session_id: self.id,
            client: Arc::clone(&self.client),
            thread_id: self.thread_id.clone(),
            run_id: Arc::new(Mutex::new(None)),
            responding: &self.responding,
            turn: Some(turn),
        };

        let seen_run = Arc::clone(&guard.run_id);
        let events = events.inspect(move |event| {
            if let Ok(StreamEvent::RunStarted { run_id }) = event {
                *lock(&seen_run) = Some(run_id.clone());
            }
        });

        let outcome = StreamRelay::new(self)
            .with_timeout(self.config.run_timeout)
            .with_cancellation(self.cancel.child_token())
            .run(events)
            .await;
        guard.finish(&outcome).await;

        Ok(TurnReport {
            thread_id: self.thread_id.clone(),
            transcription: None,
            attachments: batch.attachments.len(),
            upload_failures: batch.failures,
            outcome,
        })
    }

    /// Run `work` unless the session closes first
    async fn cancellable<F: Future>(&self, work: F) -> Result<F::Output, TurnError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TurnError::SessionClosed),
            output = work => Ok(output),
        }
    }

    fn ensure_open(&self) -> Result<(), TurnError> {
        if self.is_closed() {
            return Err(TurnError::SessionClosed);
        }
        Ok(())
    }

    fn record(&self, turn: Turn) {
        self.render(UiEvent::Turn { turn });
    }

    /// Record and render a turn; returns its transcript position
    fn record_turn(&self, turn: Turn) -> usize {
        let position = {
            let mut turns = self.turns();
            turns.push(turn.clone());
            turns.len() - 1
        };
        let _ = self.events.send(UiEvent::Turn { turn });
        position
    }

    /// Give a just-recorded user turn the references of its uploaded files
    fn record_attachments(&self, position: usize, attachments: &[Attachment]) {
        if attachments.is_empty() {
            return;
        }
        if let Some(turn) = self.turns().get_mut(position) {
            if turn.attachments.is_empty() {
                turn.attachments = attachments.to_vec();
            }
        }
    }

    /// Show an error to the user and keep it in the transcript
    fn surface(&self, message: impl Into<String>) {
        self.render(UiEvent::Error {
            message: message.into(),
        });
    }

    fn turns(&self) -> MutexGuard<'_, Vec<Turn>> {
        lock(&self.transcript)
    }

    fn audio(&self) -> MutexGuard<'_, Option<AudioBuffer>> {
        lock(&self.audio)
    }

    /// Number of connected UI listeners
    pub fn listener_count(&self) -> usize {
        self.events.receiver_count()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Cleanup of a streamed run that also happens when the turn is dropped
/// before the relay returns (e.g. the HTTP client went away)
///
/// While armed, the guard holds the turn lock. On drop it clears the
/// responding flag and, if a run was seen, cancels it remotely in a
/// background task that keeps the turn lock until the cancel completes.
struct RunGuard<'a> {
    session_id: Uuid,
    client: Arc<dyn ConversationClient>,
    thread_id: String,
    /// Run id once the stream reported it; taken when the run is settled
    run_id: Arc<Mutex<Option<String>>>,
    responding: &'a AtomicBool,
    turn: Option<OwnedMutexGuard<()>>,
}

impl RunGuard<'_> {
    /// The relay returned: cancel the run only if it may still be active
    async fn finish(self, outcome: &RelayOutcome) {
        let run_id = lock(&self.run_id).clone();
        if outcome.status.may_leave_run_active() {
            if let Some(run_id) = run_id {
                cancel_run(self.session_id, self.client.as_ref(), &self.thread_id, &run_id).await;
            }
        }
        lock(&self.run_id).take();
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.responding.store(false, Ordering::SeqCst);

        let Some(run_id) = lock(&self.run_id).take() else {
            return;
        };
        warn!(
            "Session {}: turn dropped while run {} was streaming",
            self.session_id, run_id
        );

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!(
                "Session {}: no runtime to cancel run {} on",
                self.session_id, run_id
            );
            return;
        };

        let session_id = self.session_id;
        let client = Arc::clone(&self.client);
        let thread_id = self.thread_id.clone();
        let turn = self.turn.take();
        runtime.spawn(async move {
            cancel_run(session_id, client.as_ref(), &thread_id, &run_id).await;
            drop(turn);
        });
    }
}

async fn cancel_run(
    session_id: Uuid,
    client: &dyn ConversationClient,
    thread_id: &str,
    run_id: &str,
) {
    match client.cancel_run(thread_id, run_id).await {
        Ok(()) => debug!("Session {}: cancelled run {}", session_id, run_id),
        Err(e) => warn!("Session {}: failed to cancel run {}: {}", session_id, run_id, e),
    }
}

/// Rendered events become transcript turns: explicit turns, finished
/// assistant messages and errors
impl RenderSink for ChatSession {
    fn render(&self, event: UiEvent) {
        let turn = match &event {
            UiEvent::Turn { turn } => Some(turn.clone()),
            UiEvent::MessageCompleted { content, .. } if !content.is_empty() => {
                Some(Turn::assistant(content.clone()))
            }
            UiEvent::Error { message } => Some(Turn::error(message.clone())),
            _ => None,
        };
        if let Some(turn) = turn {
            self.turns().push(turn);
        }

        // No listeners is fine; the transcript keeps the record
        let _ = self.events.send(event);
    }
}
