use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

use crate::events::{ActiveSession, Session, truncate_title};
use crate::storage::{self, SESSIONS_KEY, SharedStore};

/// Handle both the sidebar and the conversation view hold
pub type SharedSessions = Arc<Mutex<SessionStore>>;

/// Session list manager, persisted under `hr-chat-sessions`
pub struct SessionStore {
    store: SharedStore,
    sessions: Vec<Session>,
    is_loading: bool,
    last_id: i64,
    active_tx: watch::Sender<ActiveSession>,
}

impl SessionStore {
    /// Create a store in the loading state; call [`SessionStore::load`] to populate it.
    pub fn new(store: SharedStore) -> Self {
        let (active_tx, _) = watch::channel(ActiveSession::NewChat);
        Self {
            store,
            sessions: Vec::new(),
            is_loading: true,
            last_id: 0,
            active_tx,
        }
    }

    pub fn shared(self) -> SharedSessions {
        Arc::new(Mutex::new(self))
    }

    /// Read the persisted list. Missing or malformed data leaves the list empty.
    pub fn load(&mut self) {
        let mut sessions: Vec<Session> =
            storage::load_json(self.store.as_ref(), SESSIONS_KEY).unwrap_or_default();

        // Keep at most one active flag, whatever was on disk
        let mut seen_active = false;
        for session in sessions.iter_mut() {
            if session.active {
                if seen_active {
                    session.active = false;
                }
                seen_active = true;
            }
        }

        self.last_id = sessions
            .iter()
            .filter_map(|s| s.id.parse::<i64>().ok())
            .max()
            .unwrap_or(0)
            .max(self.last_id);
        self.sessions = sessions;
        self.is_loading = false;

        tracing::info!(count = self.sessions.len(), "loaded sessions");
        self.notify(self.active_id());
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// True until the persisted list has been read
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn active_id(&self) -> ActiveSession {
        self.sessions
            .iter()
            .find(|s| s.active)
            .map(|s| ActiveSession::Session(s.id.clone()))
            .unwrap_or_default()
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Observe active-session changes
    pub fn subscribe(&self) -> watch::Receiver<ActiveSession> {
        self.active_tx.subscribe()
    }

    /// Add a new active session at the front of the list and return its id
    pub fn create_session(&mut self, title: &str) -> String {
        let id = self.next_id();
        for session in self.sessions.iter_mut() {
            session.active = false;
        }
        self.sessions.insert(
            0,
            Session {
                id: id.clone(),
                title: truncate_title(title),
                active: true,
            },
        );
        self.persist();

        tracing::info!(session_id = %id, "created session");
        self.notify(ActiveSession::Session(id.clone()));
        id
    }

    /// Make `id` the active session. Unknown ids leave the flags alone.
    pub fn select_session(&mut self, id: &str) {
        let found = self.sessions.iter().any(|s| s.id == id);
        if found {
            for session in self.sessions.iter_mut() {
                session.active = session.id == id;
            }
        } else {
            tracing::debug!(session_id = %id, "selected unknown session");
        }
        self.persist();

        if found {
            self.notify(ActiveSession::Session(id.to_string()));
        }
    }

    /// Deactivate every session and switch the view to a fresh chat
    pub fn new_chat(&mut self) {
        for session in self.sessions.iter_mut() {
            session.active = false;
        }
        self.persist();
        self.notify(ActiveSession::NewChat);
    }

    /// Remove a session and its message history
    pub fn delete_session(&mut self, id: &str) {
        let Some(index) = self.sessions.iter().position(|s| s.id == id) else {
            tracing::debug!(session_id = %id, "delete of unknown session");
            self.persist();
            return;
        };

        let removed = self.sessions.remove(index);
        storage::remove_key(self.store.as_ref(), &storage::messages_key(&removed.id));

        if removed.active {
            let next = match self.sessions.first_mut() {
                Some(first) => {
                    first.active = true;
                    ActiveSession::Session(first.id.clone())
                }
                None => ActiveSession::NewChat,
            };
            self.persist();
            self.notify(next);
        } else {
            self.persist();
        }

        tracing::info!(session_id = %id, "deleted session");
    }

    fn next_id(&mut self) -> String {
        let now = Utc::now().timestamp_millis();
        self.last_id = now.max(self.last_id + 1);
        self.last_id.to_string()
    }

    fn persist(&self) {
        storage::save_json(self.store.as_ref(), SESSIONS_KEY, &self.sessions);
    }

    fn notify(&self, active: ActiveSession) {
        self.active_tx.send_replace(active);
    }
}

/// Lock the shared store. A panic elsewhere never leaves the list half-edited,
/// so a poisoned lock is still usable.
pub fn lock(sessions: &SharedSessions) -> MutexGuard<'_, SessionStore> {
    sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Message;
    use crate::storage::{FailingStore, KeyValueStore, MemoryStore, messages_key};

    fn loaded_store() -> (SessionStore, Arc<MemoryStore>) {
        let backing = Arc::new(MemoryStore::new());
        let mut store = SessionStore::new(backing.clone());
        store.load();
        (store, backing)
    }

    fn active_count(store: &SessionStore) -> usize {
        store.sessions().iter().filter(|s| s.active).count()
    }

    #[test]
    fn starts_loading_until_load() {
        let store = SessionStore::new(Arc::new(MemoryStore::new()));
        assert!(store.is_loading());
        assert!(store.sessions().is_empty());

        let (store, _) = loaded_store();
        assert!(!store.is_loading());
    }

    #[test]
    fn most_recent_session_is_the_only_active_one() {
        let (mut store, _) = loaded_store();
        let mut last = String::new();
        for i in 0..5 {
            last = store.create_session(&format!("question {i}"));
            assert_eq!(active_count(&store), 1);
        }
        assert_eq!(store.sessions()[0].id, last);
        assert!(store.sessions()[0].active);
        assert_eq!(store.active_id(), ActiveSession::Session(last));
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let (mut store, _) = loaded_store();
        let a: i64 = store.create_session("a").parse().unwrap();
        let b: i64 = store.create_session("b").parse().unwrap();
        let c: i64 = store.create_session("c").parse().unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn titles_are_truncated() {
        let (mut store, _) = loaded_store();
        let id = store.create_session(&"x".repeat(35));
        assert_eq!(store.get(&id).unwrap().title.chars().count(), 33);
    }

    #[test]
    fn create_persists_the_full_list() {
        let (mut store, backing) = loaded_store();
        store.create_session("first");
        store.create_session("second");

        let persisted: Vec<Session> =
            serde_json::from_str(&backing.get(SESSIONS_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(persisted, store.sessions());
    }

    #[test]
    fn select_switches_the_active_flag_and_notifies() {
        let (mut store, _) = loaded_store();
        let first = store.create_session("first");
        let _second = store.create_session("second");
        let mut rx = store.subscribe();

        store.select_session(&first);
        assert!(store.get(&first).unwrap().active);
        assert_eq!(active_count(&store), 1);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), ActiveSession::Session(first));
    }

    #[test]
    fn select_unknown_id_is_a_noop() {
        let (mut store, _) = loaded_store();
        let id = store.create_session("only");
        let mut rx = store.subscribe();
        rx.borrow_and_update();

        store.select_session("missing");
        assert!(store.get(&id).unwrap().active);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn deleting_active_promotes_first_remaining() {
        let (mut store, _) = loaded_store();
        let older = store.create_session("older");
        let newer = store.create_session("newer");
        let mut rx = store.subscribe();

        store.delete_session(&newer);
        assert_eq!(store.sessions().len(), 1);
        assert!(store.get(&older).unwrap().active);
        assert_eq!(*rx.borrow_and_update(), ActiveSession::Session(older));
    }

    #[test]
    fn deleting_the_only_session_signals_new_chat() {
        let (mut store, _) = loaded_store();
        let id = store.create_session("only");
        let mut rx = store.subscribe();

        store.delete_session(&id);
        assert!(store.sessions().is_empty());
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), ActiveSession::NewChat);
    }

    #[test]
    fn deleting_inactive_session_keeps_active_one() {
        let (mut store, _) = loaded_store();
        let older = store.create_session("older");
        let newer = store.create_session("newer");
        let mut rx = store.subscribe();
        rx.borrow_and_update();

        store.delete_session(&older);
        assert!(store.get(&newer).unwrap().active);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn deleting_removes_message_history() {
        let (mut store, backing) = loaded_store();
        let id = store.create_session("with history");
        storage::save_json(backing.as_ref(), &messages_key(&id), &vec![Message::user("hi")]);

        store.delete_session(&id);
        assert_eq!(backing.get(&messages_key(&id)).unwrap(), None);
    }

    #[test]
    fn new_chat_clears_all_flags() {
        let (mut store, _) = loaded_store();
        store.create_session("a");
        store.new_chat();
        assert_eq!(active_count(&store), 0);
        assert_eq!(store.active_id(), ActiveSession::NewChat);
    }

    #[test]
    fn load_restores_persisted_list_and_active_session() {
        let backing = Arc::new(MemoryStore::new());
        let id = {
            let mut store = SessionStore::new(backing.clone());
            store.load();
            store.create_session("first");
            store.create_session("second")
        };

        let mut reopened = SessionStore::new(backing);
        let rx = reopened.subscribe();
        reopened.load();
        assert_eq!(reopened.sessions().len(), 2);
        assert_eq!(reopened.active_id(), ActiveSession::Session(id.clone()));
        assert_eq!(*rx.borrow(), ActiveSession::Session(id.clone()));

        // New ids keep increasing past the persisted ones
        let next = reopened.create_session("third");
        assert!(next.parse::<i64>().unwrap() > id.parse::<i64>().unwrap());
    }

    #[test]
    fn load_of_corrupt_list_is_empty() {
        let backing = Arc::new(MemoryStore::new());
        backing.set(SESSIONS_KEY, "[{\"id\":").unwrap();
        let mut store = SessionStore::new(backing);
        store.load();
        assert!(!store.is_loading());
        assert!(store.sessions().is_empty());
    }

    #[test]
    fn load_repairs_multiple_active_flags() {
        let backing = Arc::new(MemoryStore::new());
        backing
            .set(
                SESSIONS_KEY,
                r#"[{"id":"2","title":"b","active":true},{"id":"1","title":"a","active":true}]"#,
            )
            .unwrap();
        let mut store = SessionStore::new(backing);
        store.load();
        assert_eq!(active_count(&store), 1);
        assert_eq!(store.active_id(), ActiveSession::Session("2".into()));
    }

    #[test]
    fn failed_writes_keep_the_in_memory_list() {
        let mut store = SessionStore::new(Arc::new(FailingStore));
        store.load();
        let mut active = store.subscribe();

        let first = store.create_session("first");
        let second = store.create_session("second");
        assert_eq!(store.sessions().len(), 2);
        assert_eq!(store.active_id(), ActiveSession::Session(second.clone()));

        store.select_session(&first);
        assert_eq!(store.active_id(), ActiveSession::Session(first.clone()));
        assert_eq!(*active.borrow_and_update(), ActiveSession::Session(first.clone()));

        store.delete_session(&first);
        assert_eq!(store.sessions().len(), 1);
        assert_eq!(store.active_id(), ActiveSession::Session(second));

        store.new_chat();
        assert_eq!(store.active_id(), ActiveSession::NewChat);
        assert_eq!(active_count(&store), 0);
    }
}
