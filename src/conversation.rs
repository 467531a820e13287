//! Message list of the active session and the query round-trip

use std::sync::{Arc, TryLockError};
use tokio::sync::watch;

use crate::api::QueryBackend;
use crate::error::FailureKind;
use crate::events::{ActiveSession, Message, Session, UserRole, WorkflowAnswer};
use crate::session::SharedSessions;
use crate::storage::{self, SESSIONS_KEY, SharedStore};

/// A query that has been sent and not yet answered.
///
/// Tagged with the session that was active when it was sent so the reply can
/// be routed back there.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingQuery {
    pub query: String,
    pub role: UserRole,
    pub origin: ActiveSession,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Idle,
    Submitting,
}

/// Owns the messages of whichever session is active
pub struct ConversationController {
    store: SharedStore,
    sessions: SharedSessions,
    backend: Arc<dyn QueryBackend>,
    active_rx: watch::Receiver<ActiveSession>,
    active: ActiveSession,
    messages: Vec<Message>,
    input: String,
    role: UserRole,
    in_flight: bool,
}

impl ConversationController {
    pub fn new(
        store: SharedStore,
        sessions: SharedSessions,
        backend: Arc<dyn QueryBackend>,
        role: UserRole,
    ) -> Self {
        let mut active_rx = crate::session::lock(&sessions).subscribe();
        let active = active_rx.borrow_and_update().clone();

        let mut controller = Self {
            store,
            sessions,
            backend,
            active_rx,
            active: ActiveSession::NewChat,
            messages: Vec::new(),
            input: String::new(),
            role,
            in_flight: false,
        };
        controller.load_for_session(active);
        controller
    }

    /// Replace the in-memory list with the persisted history of `active`
    pub fn load_for_session(&mut self, active: ActiveSession) {
        self.messages = match active.id() {
            None => Vec::new(),
            Some(id) => {
                storage::load_json(self.store.as_ref(), &storage::messages_key(id)).unwrap_or_default()
            }
        };
        tracing::debug!(active = ?active, count = self.messages.len(), "loaded conversation");
        self.active = active;
    }

    /// Follow the session store's active session. Returns true if the view was reloaded.
    pub fn sync_active_session(&mut self) -> bool {
        if !self.active_rx.has_changed().unwrap_or(false) {
            return false;
        }
        let next = self.active_rx.borrow_and_update().clone();
        if next == self.active {
            return false;
        }
        self.load_for_session(next);
        true
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn active(&self) -> &ActiveSession {
        &self.active
    }

    pub fn state(&self) -> ConversationState {
        if self.in_flight {
            ConversationState::Submitting
        } else {
            ConversationState::Idle
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    pub fn role(&self) -> UserRole {
        self.role
    }

    pub fn set_role(&mut self, role: UserRole) {
        self.role = role;
    }

    pub fn backend(&self) -> Arc<dyn QueryBackend> {
        self.backend.clone()
    }

    /// Send `query` and append the reply. Failures become assistant messages.
    pub async fn submit(&mut self, query: &str) {
        let Some(pending) = self.begin_submit(query) else {
            return;
        };
        self.run(pending).await;
    }

    /// Ask the last user question again, replacing its answer
    pub async fn regenerate_last(&mut self) {
        let Some(pending) = self.begin_regenerate() else {
            return;
        };
        self.run(pending).await;
    }

    async fn run(&mut self, pending: PendingQuery) {
        let result = self.backend.query(&pending.query, pending.role).await;
        self.complete(pending, result);
    }

    /// Append the user message, make sure a session exists and arm the
    /// in-flight guard. `None` means the submission was rejected.
    pub fn begin_submit(&mut self, query: &str) -> Option<PendingQuery> {
        if query.trim().is_empty() || self.in_flight {
            return None;
        }
        self.sync_active_session();

        let first_message = self.messages.is_empty();
        self.messages.push(Message::user(query));
        if self.active.is_new_chat() || first_message {
            self.adopt_new_session(query);
        }

        Some(self.arm(query))
    }

    /// Drop the last user message and its paired answer, then resend it
    pub fn begin_regenerate(&mut self) -> Option<PendingQuery> {
        if self.messages.len() < 2 || self.in_flight {
            return None;
        }
        self.sync_active_session();

        let index = self.messages.iter().rposition(Message::is_user)?;
        if self
            .messages
            .get(index + 1)
            .is_some_and(Message::is_assistant)
        {
            self.messages.remove(index + 1);
        }
        let original = self.messages.remove(index);

        self.messages.push(Message::user(original.content.clone()));
        if self.active.is_new_chat() {
            self.adopt_new_session(&original.content);
        }

        Some(self.arm(&original.content))
    }

    /// Apply the outcome of a query and return to idle
    pub fn complete(&mut self, pending: PendingQuery, result: Result<WorkflowAnswer, FailureKind>) {
        let reply = match result {
            Ok(answer) => Message::from_answer(answer),
            Err(failure) => {
                tracing::warn!(error = %failure, "query failed");
                Message::from_failure(&failure)
            }
        };

        self.sync_active_session();
        if pending.origin == self.active {
            self.messages.push(reply);
            self.persist();
        } else {
            self.reroute(&pending.origin, reply);
        }

        self.in_flight = false;
        self.input.clear();
    }

    fn arm(&mut self, query: &str) -> PendingQuery {
        self.persist();
        self.in_flight = true;
        PendingQuery {
            query: query.to_string(),
            role: self.role,
            origin: self.active.clone(),
        }
    }

    fn adopt_new_session(&mut self, title: &str) {
        // try_lock: the session list may be held by the caller
        let created = match self.sessions.try_lock() {
            Ok(mut sessions) => Some(sessions.create_session(title)),
            Err(TryLockError::Poisoned(poisoned)) => {
                Some(poisoned.into_inner().create_session(title))
            }
            Err(TryLockError::WouldBlock) => None,
        };

        match created {
            Some(id) => {
                // Already showing this session; skip the reload the notification would trigger
                self.active_rx.borrow_and_update();
                self.active = ActiveSession::Session(id);
            }
            None => {
                tracing::warn!("could not create a session, continuing without persistence");
            }
        }
    }

    /// Deliver a reply to a session that is no longer on screen
    fn reroute(&self, origin: &ActiveSession, reply: Message) {
        let Some(id) = origin.id() else {
            tracing::warn!("dropping reply for an unsaved chat that is no longer shown");
            return;
        };

        let still_exists = match self.sessions.try_lock() {
            Ok(sessions) => sessions.get(id).is_some(),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().get(id).is_some(),
            // Busy: go by the last saved list
            Err(TryLockError::WouldBlock) => {
                storage::load_json::<Vec<Session>>(self.store.as_ref(), SESSIONS_KEY)
                    .unwrap_or_default()
                    .iter()
                    .any(|s| s.id == id)
            }
        };
        if !still_exists {
            tracing::warn!(session_id = %id, "dropping reply for a deleted session");
            return;
        }

        let key = storage::messages_key(id);
        let mut history: Vec<Message> =
            storage::load_json(self.store.as_ref(), &key).unwrap_or_default();
        history.push(reply);
        storage::save_json(self.store.as_ref(), &key, &history);
        tracing::info!(session_id = %id, "stored reply for background session");
    }

    fn persist(&self) {
        if let Some(id) = self.active.id() {
            storage::save_json(self.store.as_ref(), &storage::messages_key(id), &self.messages);
        }
    }
}
