//! Coordinator session bookkeeping.
//!
//! The session id is owned by the coordinator: the node never invents
//! one, it adopts whatever the last frame carried. Authentication is a
//! separate latch set only by a `connected` frame and dropped when the
//! channel closes.

/// Mutable session slot, one per channel.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    session_id: Option<String>,
    node_id: Option<String>,
    authenticated: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// `connected` path: record the ids and latch authentication.
    pub fn establish(&mut self, session_id: impl Into<String>, node_id: impl Into<String>) {
        self.session_id = Some(session_id.into());
        self.node_id = Some(node_id.into());
        self.authenticated = true;
    }

    /// Refresh the ids without touching the authentication latch.
    pub fn refresh(&mut self, session_id: impl Into<String>, node_id: impl Into<String>) {
        self.session_id = Some(session_id.into());
        self.node_id = Some(node_id.into());
    }

    /// Adopt the session id of an inbound frame when it carries one.
    pub fn adopt(&mut self, frame_session: Option<&str>) {
        if let Some(id) = frame_session {
            if !id.is_empty() {
                self.session_id = Some(id.to_owned());
            }
        }
    }

    /// Reset on disconnect.
    pub fn clear(&mut self) {
        self.session_id = None;
        self.node_id = None;
        self.authenticated = false;
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn node_id(&self) -> Option<&str> {
        self.node_id.as_deref()
    }

    /// True once `connected` was seen and a non-empty session id is held.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated && self.session_id.as_deref().is_some_and(|s| !s.is_empty())
    }
}
