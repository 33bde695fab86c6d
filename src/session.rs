//! Per-session conversation memory.
//!
//! Each session keeps a bounded window of recent (question, answer)
//! exchanges; the oldest exchange is dropped first. Sessions live in memory
//! only and vanish on restart.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exchange {
    pub user: String,
    pub assistant: String,
}

pub struct SessionManager {
    max_history: usize,
    sessions: RwLock<HashMap<String, VecDeque<Exchange>>>,
}

impl SessionManager {
    /// `max_history` is the number of exchanges kept per session; `0`
    /// disables history.
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new empty session and return its id.
    pub async fn create_session(&self) -> String {
        let id = Uuid::new_v4().to_string();
        self.sessions.write().await.insert(id.clone(), VecDeque::new());
        tracing::debug!(session_id = %id, "session created");
        id
    }

    /// Exchanges for `session_id`, oldest first. Unknown ids start empty.
    pub async fn get_history(&self, session_id: &str) -> Vec<Exchange> {
        if let Some(history) = self.sessions.read().await.get(session_id) {
            return history.iter().cloned().collect();
        }
        self.sessions
            .write()
            .await
            .entry(session_id.to_string())
            .or_default();
        Vec::new()
    }

    /// History as `User: ...\nAssistant: ...` lines, or `None` when empty.
    pub async fn format_history(&self, session_id: &str) -> Option<String> {
        let history = self.get_history(session_id).await;
        if history.is_empty() {
            return None;
        }
        Some(
            history
                .iter()
                .map(|e| format!("User: {}\nAssistant: {}", e.user, e.assistant))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }

    /// Append an exchange, evicting the oldest beyond the configured bound.
    pub async fn add_exchange(&self, session_id: &str, user: &str, assistant: &str) {
        let mut sessions = self.sessions.write().await;
        let history = sessions.entry(session_id.to_string()).or_default();
        history.push_back(Exchange {
            user: user.to_string(),
            assistant: assistant.to_string(),
        });
        while history.len() > self.max_history {
            history.pop_front();
        }
    }

    /// Forget a session. Returns whether it existed.
    pub async fn clear_session(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
