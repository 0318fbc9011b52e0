use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Client-provided session memory consulted by `build_context`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SessionState {
    /// Free-text facts the client wants remembered across calls.
    #[serde(default)]
    pub facts: Vec<String>,
    /// Node ids pinned into every context built for this session.
    #[serde(default)]
    pub pinned: Vec<String>,
}

/// In-memory session store keyed by client session id.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionState>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, session_id: &str, state: SessionState) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(session_id.to_string(), state);
        }
    }

    pub fn get(&self, session_id: &str) -> Option<SessionState> {
        self.sessions.lock().ok()?.get(session_id).cloned()
    }
}
