use anyhow::Result;
use std::fs;
use std::sync::Arc;

use crate::api::{HrApiClient, QueryBackend};
use crate::config::Config;
use crate::conversation::ConversationController;
use crate::events::{Message, MessageRole, UserRole};
use crate::session::{SessionStore, SharedSessions, lock};
use crate::storage::{self, FileStore, MemoryStore, SharedStore};
use crate::ui::conversation::history::{confidence_label, format_citation};

/// Storage and session list shared by every entry point
pub struct Workspace {
    pub config: Config,
    pub store: SharedStore,
    pub sessions: SharedSessions,
}

impl Workspace {
    /// Open the data directory, falling back to memory if it cannot be created.
    /// The session list is left in its loading state.
    pub fn open(config: Config) -> Self {
        let store: SharedStore = match fs::create_dir_all(&config.data_dir) {
            Ok(()) => Arc::new(FileStore::new(config.data_dir.clone())),
            Err(e) => {
                tracing::warn!(
                    dir = %config.data_dir.display(),
                    error = %e,
                    "data directory unavailable, chats will not be saved"
                );
                Arc::new(MemoryStore::new())
            }
        };
        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, store: SharedStore) -> Self {
        let sessions = SessionStore::new(store.clone()).shared();
        Self {
            config,
            store,
            sessions,
        }
    }

    /// Open and read the session list right away
    pub fn open_loaded(config: Config) -> Self {
        let workspace = Self::open(config);
        lock(&workspace.sessions).load();
        workspace
    }

    pub fn controller(&self, backend: Arc<dyn QueryBackend>, role: UserRole) -> ConversationController {
        ConversationController::new(self.store.clone(), self.sessions.clone(), backend, role)
    }

    pub fn http_backend(&self) -> Result<Arc<dyn QueryBackend>> {
        Ok(Arc::new(HrApiClient::new(&self.config)?))
    }
}

pub fn list_sessions(workspace: &Workspace) -> Result<()> {
    let store = lock(&workspace.sessions);
    if store.sessions().is_empty() {
        println!("No chats yet. Run 'hr-chat' or 'hr-chat ask <question>' to start one!");
        return Ok(());
    }

    println!("💬 Your chats:");
    println!("{}", "=".repeat(50));
    for session in store.sessions() {
        let marker = if session.active { "●" } else { " " };
        println!("{} {}  {}", marker, session.id, session.title);
    }

    Ok(())
}

/// One-shot question through the same controller the TUI uses.
/// Without `session` the question starts a chat of its own.
pub async fn ask(
    workspace: &Workspace,
    backend: Arc<dyn QueryBackend>,
    query: &str,
    session: Option<&str>,
    role: UserRole,
) -> Result<()> {
    {
        let mut store = lock(&workspace.sessions);
        match session {
            Some(id) => {
                if store.get(id).is_none() {
                    println!("❌ Chat '{}' not found.", id);
                    println!("Run 'hr-chat sessions' to see available chats.");
                    return Ok(());
                }
                store.select_session(id);
            }
            None => store.new_chat(),
        }
    }

    let mut controller = workspace.controller(backend, role);
    let before = controller.messages().len();
    controller.submit(query).await;

    for message in controller.messages().iter().skip(before) {
        if message.role == MessageRole::Assistant {
            println!("{}", format_message(message));
        }
    }
    if let Some(id) = controller.active().id() {
        println!("(chat {})", id);
    }

    Ok(())
}

pub fn show_session(workspace: &Workspace, id: &str) -> Result<()> {
    if lock(&workspace.sessions).get(id).is_none() {
        println!("❌ Chat '{}' not found.", id);
        return Ok(());
    }

    let messages: Vec<Message> =
        storage::load_json(workspace.store.as_ref(), &storage::messages_key(id)).unwrap_or_default();
    if messages.is_empty() {
        println!("(no messages)");
    }
    for message in &messages {
        println!("{}", format_message(message));
        println!();
    }

    Ok(())
}

pub fn delete_session(workspace: &Workspace, id: &str) -> Result<()> {
    let mut store = lock(&workspace.sessions);
    if store.get(id).is_none() {
        println!("❌ Chat '{}' not found.", id);
        return Ok(());
    }
    store.delete_session(id);
    println!("🗑  Deleted chat {}", id);
    Ok(())
}

/// Plain-text rendering of a message for terminal output
pub fn format_message(message: &Message) -> String {
    let mut out = match message.role {
        MessageRole::User => format!("👤 You: {}", message.content),
        MessageRole::Assistant => format!("🤖 {}", message.content),
    };

    if let Some(label) = confidence_label(message) {
        out.push_str(&format!("\n   Confidence: {}", label));
    }
    if let Some(sources) = message.sources.as_ref().filter(|s| !s.is_empty()) {
        out.push_str("\n   Sources:");
        for citation in sources {
            out.push_str(&format!("\n   • {}", format_citation(citation)));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::events::{SourceCitation, WorkflowAnswer};
    use async_trait::async_trait;

    struct FixedBackend;

    #[async_trait]
    impl QueryBackend for FixedBackend {
        async fn query(&self, query: &str, _role: UserRole) -> Result<WorkflowAnswer, FailureKind> {
            Ok(WorkflowAnswer {
                answer: format!("answer to {}", query),
                ..Default::default()
            })
        }
    }

    fn memory_workspace() -> Workspace {
        let workspace = Workspace::with_store(Config::default(), Arc::new(MemoryStore::new()));
        lock(&workspace.sessions).load();
        workspace
    }

    fn history_of(workspace: &Workspace, id: &str) -> Vec<Message> {
        storage::load_json(workspace.store.as_ref(), &storage::messages_key(id)).unwrap_or_default()
    }

    #[tokio::test]
    async fn each_ask_without_session_starts_its_own_chat() {
        let workspace = memory_workspace();
        let backend: Arc<dyn QueryBackend> = Arc::new(FixedBackend);

        ask(&workspace, backend.clone(), "vacation", None, UserRole::Employee).await.unwrap();
        ask(&workspace, backend, "payroll", None, UserRole::Employee).await.unwrap();

        let store = lock(&workspace.sessions);
        assert_eq!(store.sessions().len(), 2);
        assert_eq!(store.sessions()[0].title, "payroll");
        assert_eq!(store.sessions()[1].title, "vacation");
        for session in store.sessions() {
            assert_eq!(history_of(&workspace, &session.id).len(), 2);
        }
    }

    #[tokio::test]
    async fn ask_with_session_continues_that_chat() {
        let workspace = memory_workspace();
        let backend: Arc<dyn QueryBackend> = Arc::new(FixedBackend);

        ask(&workspace, backend.clone(), "first", None, UserRole::Employee).await.unwrap();
        let first = lock(&workspace.sessions).sessions()[0].id.clone();
        ask(&workspace, backend.clone(), "other", None, UserRole::Employee).await.unwrap();

        ask(&workspace, backend, "follow-up", Some(&first), UserRole::Employee).await.unwrap();

        assert_eq!(lock(&workspace.sessions).sessions().len(), 2);
        let history = history_of(&workspace, &first);
        assert_eq!(history.len(), 4);
        assert_eq!(history[3].content, "answer to follow-up");
    }

    #[tokio::test]
    async fn ask_with_unknown_session_sends_nothing() {
        let workspace = memory_workspace();
        ask(&workspace, Arc::new(FixedBackend), "q", Some("missing"), UserRole::Hr).await.unwrap();
        assert!(lock(&workspace.sessions).sessions().is_empty());
    }

    #[test]
    fn formats_answer_with_sources_and_confidence() {
        let mut message = Message::assistant("Submit the form to payroll.");
        message.sources = Some(vec![SourceCitation {
            source: "payroll.pdf".into(),
            page: Some(2),
            section: "Forms".into(),
        }]);
        message.confidence_level = Some("low".into());

        let text = format_message(&message);
        assert!(text.starts_with("🤖 Submit the form to payroll."));
        assert!(text.contains("Confidence: low"));
        assert!(text.contains("• payroll.pdf · p. 2 · Forms"));
    }

    #[test]
    fn formats_user_message() {
        assert_eq!(format_message(&Message::user("hi")), "👤 You: hi");
    }

    #[test]
    fn unwritable_data_dir_falls_back_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "not a directory").unwrap();

        let mut config = Config::default();
        config.data_dir = blocker.join("data");
        let workspace = Workspace::open_loaded(config);

        let id = lock(&workspace.sessions).create_session("still works");
        assert!(lock(&workspace.sessions).get(&id).is_some());
    }
}
