use crate::config::UiConfig;
use crate::conversation::{ConversationController, PendingQuery};
use crate::error::FailureKind;
use crate::events::{ActiveSession, AppEvent, WorkflowAnswer};
use crate::session::{SharedSessions, lock};
use crate::ui::conversation::composer::ComposerResult;
use crate::ui::conversation::{
    Composer, ConversationHistory, ParsedCommand, SlashCommand, get_help_text,
};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};
use tokio::sync::mpsc;

/// Actions that can be requested by the conversation manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationAction {
    None,
    Exit,
    /// Put this text on the clipboard
    Copy(String),
}

/// Drives the conversation pane: composer input, slash commands and query tasks
pub struct ConversationManager {
    controller: ConversationController,
    sessions: SharedSessions,
    history: ConversationHistory,
    composer: Composer,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    notice: Option<String>,
}

impl ConversationManager {
    pub fn new(
        controller: ConversationController,
        sessions: SharedSessions,
        ui: &UiConfig,
        events_tx: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        let composer = Composer::new(
            "Ask a question about HR policies, benefits or leave...",
            controller.role(),
        );
        let mut manager = Self {
            controller,
            sessions,
            history: ConversationHistory::new(ui),
            composer,
            events_tx,
            notice: None,
        };
        manager.refresh();
        manager
    }

    /// Pull the latest state into the widgets
    pub fn refresh(&mut self) {
        self.controller.sync_active_session();

        let title = match self.controller.active() {
            ActiveSession::NewChat => "New chat".to_string(),
            ActiveSession::Session(id) => lock(&self.sessions)
                .get(id)
                .map(|s| s.title.clone())
                .unwrap_or_else(|| "Chat".to_string()),
        };
        self.history.set_title(title);
        self.history.set_messages(self.controller.messages());
        if !self.controller.messages().is_empty() {
            self.history.select_suggestion(None);
        }
        self.history.set_waiting(self.controller.is_submitting());
        self.composer.set_role(self.controller.role());
        self.composer.set_submitting(self.controller.is_submitting());
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ConversationAction {
        if key.kind != KeyEventKind::Press {
            return ConversationAction::None;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('n') => {
                    self.new_chat();
                    return ConversationAction::None;
                }
                KeyCode::Char('r') => {
                    self.regenerate();
                    return ConversationAction::None;
                }
                _ => {}
            }
        }

        if self.offers_suggestions() {
            match key.code {
                KeyCode::Up => {
                    self.move_suggestion(false);
                    return ConversationAction::None;
                }
                KeyCode::Down => {
                    self.move_suggestion(true);
                    return ConversationAction::None;
                }
                KeyCode::Enter if key.modifiers.is_empty() => {
                    if let Some(index) = self.history.selected_suggestion() {
                        let suggestion = self.history.suggestions()[index].clone();
                        self.history.select_suggestion(None);
                        self.submit(suggestion);
                        self.refresh();
                        return ConversationAction::None;
                    }
                }
                _ => {}
            }
        }

        let action = match self.composer.handle_key(key) {
            ComposerResult::Submitted(input) => {
                self.submit(input);
                ConversationAction::None
            }
            ComposerResult::Command(command) => self.handle_slash_command(command),
            ComposerResult::None => ConversationAction::None,
        };
        self.refresh();
        action
    }

    /// Send the composer text as a query
    pub fn submit(&mut self, input: String) {
        self.controller.set_input(input.clone());
        match self.controller.begin_submit(&input) {
            Some(pending) => {
                self.composer.clear();
                self.notice = None;
                self.spawn_query(pending);
            }
            None if self.controller.is_submitting() => {
                self.notice = Some("Still waiting for the previous answer.".to_string());
            }
            None => {}
        }
    }

    pub fn regenerate(&mut self) {
        if let Some(pending) = self.controller.begin_regenerate() {
            self.notice = None;
            self.spawn_query(pending);
        }
        self.refresh();
    }

    pub fn new_chat(&mut self) {
        lock(&self.sessions).new_chat();
        self.refresh();
    }

    /// Apply a finished query
    pub fn finish(&mut self, pending: PendingQuery, result: Result<WorkflowAnswer, FailureKind>) {
        self.controller.complete(pending, result);
        self.refresh();
    }

    /// Starter questions are pickable on an empty, idle chat with nothing typed
    fn offers_suggestions(&self) -> bool {
        self.controller.messages().is_empty()
            && !self.controller.is_submitting()
            && !self.history.suggestions().is_empty()
            && self.composer.content().is_empty()
            && !self.composer.palette_open()
    }

    fn move_suggestion(&mut self, down: bool) {
        let last = self.history.suggestions().len().saturating_sub(1);
        let next = match (self.history.selected_suggestion(), down) {
            (None, true) => 0,
            (None, false) => last,
            (Some(i), true) => (i + 1).min(last),
            (Some(i), false) => i.saturating_sub(1),
        };
        self.history.select_suggestion(Some(next));
    }

    pub fn set_focus(&mut self, has_focus: bool) {
        self.composer.set_focus(has_focus);
    }

    /// Whether the composer wants Tab for itself
    pub fn captures_tab(&self) -> bool {
        self.composer.palette_open()
    }

    pub fn controller(&self) -> &ConversationController {
        &self.controller
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    fn spawn_query(&self, pending: PendingQuery) {
        let backend = self.controller.backend();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = backend.query(&pending.query, pending.role).await;
            let _ = tx.send(AppEvent::QueryFinished { pending, result });
        });
    }

    /// Handle slash commands
    fn handle_slash_command(&mut self, command: ParsedCommand) -> ConversationAction {
        if self.controller.is_submitting() && !command.command.available_while_submitting() {
            self.notice = Some(format!(
                "/{} is not available while waiting for an answer.",
                command.command.command()
            ));
            return ConversationAction::None;
        }

        match command.command {
            SlashCommand::New => {
                self.new_chat();
            }
            SlashCommand::Regenerate => {
                self.regenerate();
            }
            SlashCommand::Role => match command.role_target() {
                Some(role) => {
                    self.controller.set_role(role);
                    self.notice = Some(format!("Now asking as {}.", role.display_name()));
                }
                None => {
                    self.notice = Some("Usage: /role <employee|hr|manager>".to_string());
                }
            },
            SlashCommand::Delete => {
                if let Some(id) = self.controller.active().id().map(str::to_string) {
                    lock(&self.sessions).delete_session(&id);
                }
            }
            SlashCommand::Copy => {
                let last_answer = self
                    .controller
                    .messages()
                    .iter()
                    .rev()
                    .find(|m| m.is_assistant())
                    .map(|m| m.content.clone());
                match last_answer {
                    Some(text) => {
                        self.notice = Some("Copied the last answer to the clipboard.".to_string());
                        return ConversationAction::Copy(text);
                    }
                    None => {
                        self.notice = Some("Nothing to copy yet.".to_string());
                    }
                }
            }
            SlashCommand::Bye => return ConversationAction::Exit,
            SlashCommand::Help => {
                self.notice = Some(get_help_text());
            }
        }
        ConversationAction::None
    }

    /// Render the conversation UI components
    pub fn render_conversation_ui(&self, area: Rect, buf: &mut Buffer) {
        let notice_height = self
            .notice
            .as_ref()
            .map(|n| n.lines().count().min(10) as u16 + 2)
            .unwrap_or(0);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(5),
                Constraint::Length(notice_height),
                Constraint::Length(3),
            ])
            .split(area);

        self.history.clone().render(chunks[0], buf);

        if let Some(notice) = &self.notice {
            Paragraph::new(notice.as_str())
                .wrap(Wrap { trim: false })
                .block(Block::default().borders(Borders::ALL).title("ℹ️  Info"))
                .render(chunks[1], buf);
        }

        self.composer.clone().render(chunks[2], buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::QueryBackend;
    use crate::events::UserRole;
    use crate::session::SessionStore;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct EchoBackend;

    #[async_trait]
    impl QueryBackend for EchoBackend {
        async fn query(&self, query: &str, role: UserRole) -> Result<WorkflowAnswer, FailureKind> {
            Ok(WorkflowAnswer {
                answer: format!("{} asked: {}", role, query),
                ..Default::default()
            })
        }
    }

    fn manager() -> (ConversationManager, mpsc::UnboundedReceiver<AppEvent>, SharedSessions) {
        let store = Arc::new(MemoryStore::new());
        let mut sessions = SessionStore::new(store.clone());
        sessions.load();
        let sessions = sessions.shared();
        let controller = ConversationController::new(
            store,
            sessions.clone(),
            Arc::new(EchoBackend),
            UserRole::Employee,
        );
        let (tx, rx) = mpsc::unbounded_channel();
        (
            ConversationManager::new(controller, sessions.clone(), &UiConfig::default(), tx),
            rx,
            sessions,
        )
    }

    fn type_and_send(manager: &mut ConversationManager, text: &str) -> ConversationAction {
        for c in text.chars() {
            manager.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
        }
        manager.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE))
    }

    #[tokio::test]
    async fn query_round_trip_through_the_event_channel() {
        let (mut manager, mut rx, sessions) = manager();
        type_and_send(&mut manager, "parental leave");
        assert!(manager.controller().is_submitting());

        let AppEvent::QueryFinished { pending, result } = rx.recv().await.unwrap();
        manager.finish(pending, result);

        let messages = manager.controller().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "employee asked: parental leave");
        assert_eq!(lock(&sessions).sessions().len(), 1);
    }

    #[tokio::test]
    async fn role_command_changes_forwarded_role() {
        let (mut manager, mut rx, _) = manager();
        type_and_send(&mut manager, "/role manager");
        type_and_send(&mut manager, "headcount");

        let Some(AppEvent::QueryFinished { pending, result }) = rx.recv().await else {
            panic!("expected a finished query");
        };
        assert_eq!(pending.role, UserRole::Manager);
        manager.finish(pending, result);
        assert_eq!(
            manager.controller().messages()[1].content,
            "manager asked: headcount"
        );
    }

    #[tokio::test]
    async fn bye_exits_and_new_resets() {
        let (mut manager, mut rx, _) = manager();
        type_and_send(&mut manager, "hello");
        if let Some(AppEvent::QueryFinished { pending, result }) = rx.recv().await {
            manager.finish(pending, result);
        }

        type_and_send(&mut manager, "/new");
        assert!(manager.controller().messages().is_empty());
        assert_eq!(type_and_send(&mut manager, "/bye"), ConversationAction::Exit);
    }

    #[tokio::test]
    async fn picking_a_suggestion_submits_it() {
        let (mut manager, mut rx, _) = manager();
        let down = KeyEvent::new(KeyCode::Down, KeyModifiers::NONE);
        manager.handle_key(down);
        manager.handle_key(down);
        manager.handle_key(KeyEvent::new(KeyCode::Up, KeyModifiers::NONE));
        manager.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));

        let expected = UiConfig::default().suggestions[0].clone();
        assert!(manager.controller().is_submitting());
        assert_eq!(manager.controller().messages()[0].content, expected);

        let Some(AppEvent::QueryFinished { pending, result }) = rx.recv().await else {
            panic!("expected a finished query");
        };
        assert_eq!(pending.query, expected);
        manager.finish(pending, result);
        assert_eq!(manager.controller().messages().len(), 2);
    }

    #[test]
    fn enter_without_a_pick_or_text_does_nothing() {
        let (mut manager, _rx, sessions) = manager();
        manager.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
        assert!(!manager.controller().is_submitting());
        assert!(lock(&sessions).sessions().is_empty());
    }

    #[tokio::test]
    async fn copy_returns_the_last_answer() {
        let (mut manager, mut rx, _) = manager();
        assert_eq!(type_and_send(&mut manager, "/copy"), ConversationAction::None);
        assert_eq!(manager.notice(), Some("Nothing to copy yet."));

        type_and_send(&mut manager, "benefits");
        if let Some(AppEvent::QueryFinished { pending, result }) = rx.recv().await {
            manager.finish(pending, result);
        }
        assert_eq!(
            type_and_send(&mut manager, "/copy"),
            ConversationAction::Copy("employee asked: benefits".to_string())
        );
    }

    #[tokio::test]
    async fn delete_command_removes_current_session() {
        let (mut manager, mut rx, sessions) = manager();
        type_and_send(&mut manager, "to be deleted");
        if let Some(AppEvent::QueryFinished { pending, result }) = rx.recv().await {
            manager.finish(pending, result);
        }

        type_and_send(&mut manager, "/delete");
        assert!(lock(&sessions).sessions().is_empty());
        assert!(manager.controller().active().is_new_chat());
    }
}
