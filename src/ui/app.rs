use anyhow::{Context, Result};
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use futures::StreamExt;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use std::io;
use tokio::sync::mpsc;

use crate::events::AppEvent;
use crate::session::{SharedSessions, lock};
use crate::ui::clipboard;
use crate::ui::conversation::{ConversationAction, ConversationManager};
use crate::ui::sidebar::{SessionSidebar, SidebarAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Composer,
    Sidebar,
}

/// Full-screen chat: session list on the left, conversation on the right
pub struct App {
    sessions: SharedSessions,
    manager: ConversationManager,
    sidebar: SessionSidebar,
    events_rx: mpsc::UnboundedReceiver<AppEvent>,
    focus: Focus,
    should_quit: bool,
}

impl App {
    pub fn new(
        sessions: SharedSessions,
        manager: ConversationManager,
        events_rx: mpsc::UnboundedReceiver<AppEvent>,
    ) -> Self {
        let sidebar = SessionSidebar::new(sessions.clone());
        let mut app = Self {
            sessions,
            manager,
            sidebar,
            events_rx,
            focus: Focus::Composer,
            should_quit: false,
        };
        app.set_focus(Focus::Composer);
        app
    }

    /// Take over the terminal until the user quits
    pub async fn run(mut self) -> Result<()> {
        terminal::enable_raw_mode().context("Failed to enable raw mode")?;
        let mut stdout = io::stdout();
        crossterm::execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.main_loop(&mut terminal).await;

        terminal::disable_raw_mode()?;
        crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    async fn main_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> Result<()> {
        // First frame shows the loading state; the list is read afterwards
        self.draw(terminal)?;
        lock(&self.sessions).load();
        self.manager.refresh();

        let mut input = EventStream::new();

        while !self.should_quit {
            self.draw(terminal)?;

            tokio::select! {
                maybe_event = input.next() => {
                    match maybe_event {
                        Some(Ok(Event::Key(key))) => self.handle_key(key),
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e).context("Failed to read terminal input"),
                        None => break,
                    }
                }
                Some(event) = self.events_rx.recv() => {
                    self.handle_event(event);
                }
            }
        }

        Ok(())
    }

    fn draw(&self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
        terminal.draw(|frame| {
            let area = frame.size();
            let chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Length(34), Constraint::Min(30)])
                .split(area);

            let buf = frame.buffer_mut();
            self.sidebar.render_sidebar(chunks[0], buf);
            self.manager.render_conversation_ui(chunks[1], buf);
        })?;
        Ok(())
    }

    fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::QueryFinished { pending, result } => {
                self.manager.finish(pending, result);
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        if key.code == KeyCode::Tab && !self.manager.captures_tab() {
            let next = match self.focus {
                Focus::Composer => Focus::Sidebar,
                Focus::Sidebar => Focus::Composer,
            };
            self.set_focus(next);
            return;
        }

        match self.focus {
            Focus::Composer => match self.manager.handle_key(key) {
                ConversationAction::Exit => self.should_quit = true,
                ConversationAction::Copy(text) => {
                    if let Err(e) = clipboard::copy_to(&mut io::stdout(), &text) {
                        tracing::warn!(error = %e, "failed to copy to clipboard");
                    }
                }
                ConversationAction::None => {}
            },
            Focus::Sidebar => {
                if key.code == KeyCode::Esc {
                    self.set_focus(Focus::Composer);
                    return;
                }
                if self.sidebar.handle_key(key) == SidebarAction::Opened {
                    self.set_focus(Focus::Composer);
                }
                self.manager.refresh();
            }
        }
    }

    fn set_focus(&mut self, focus: Focus) {
        self.focus = focus;
        self.sidebar.set_focus(focus == Focus::Sidebar);
        self.manager.set_focus(focus == Focus::Composer);
    }
}
