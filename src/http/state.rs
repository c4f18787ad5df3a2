use crate::assistant::ConversationClient;
use crate::session::{ChatSession, SessionConfig};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Open chat sessions (session_id → session)
    pub sessions: Arc<RwLock<HashMap<Uuid, Arc<ChatSession>>>>,

    /// Client every session talks to the assistant service through
    pub client: Arc<dyn ConversationClient>,

    /// Read-only settings handed to each new session
    pub session_config: Arc<SessionConfig>,
}

impl AppState {
    pub fn new(client: Arc<dyn ConversationClient>, session_config: SessionConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            client,
            session_config: Arc::new(session_config),
        }
    }

    /// Look up an open session
    pub async fn session(&self, id: &Uuid) -> Option<Arc<ChatSession>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Close and forget a session that has no UI listener left
    ///
    /// Returns whether the session was released.
    pub async fn release_if_unwatched(&self, id: &Uuid) -> bool {
        let mut sessions = self.sessions.write().await;
        let unwatched = sessions
            .get(id)
            .is_some_and(|session| session.listener_count() == 0);
        if !unwatched {
            return false;
        }

        if let Some(session) = sessions.remove(id) {
            debug!("Session {}: no listeners left, closing", id);
            session.close();
        }
        true
    }
}
