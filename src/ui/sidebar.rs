//! Chat list shown beside the conversation

use crate::session::{SharedSessions, lock};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidebarAction {
    None,
    /// A chat was opened; focus should go back to the composer
    Opened,
}

pub struct SessionSidebar {
    sessions: SharedSessions,
    cursor: usize,
    has_focus: bool,
}

impl SessionSidebar {
    pub fn new(sessions: SharedSessions) -> Self {
        Self {
            sessions,
            cursor: 0,
            has_focus: false,
        }
    }

    pub fn set_focus(&mut self, has_focus: bool) {
        self.has_focus = has_focus;
        if has_focus {
            // Start on the chat being shown
            let store = lock(&self.sessions);
            self.cursor = store
                .sessions()
                .iter()
                .position(|s| s.active)
                .unwrap_or(0);
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> SidebarAction {
        if key.kind != KeyEventKind::Press {
            return SidebarAction::None;
        }

        let mut store = lock(&self.sessions);
        if store.is_loading() {
            return SidebarAction::None;
        }
        let len = store.sessions().len();

        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.cursor = self.cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.cursor + 1 < len {
                    self.cursor += 1;
                }
            }
            KeyCode::Enter => {
                if let Some(id) = store.sessions().get(self.cursor).map(|s| s.id.clone()) {
                    store.select_session(&id);
                    return SidebarAction::Opened;
                }
            }
            KeyCode::Char('n') => {
                store.new_chat();
                return SidebarAction::Opened;
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(id) = store.sessions().get(self.cursor).map(|s| s.id.clone()) {
                    store.delete_session(&id);
                    let remaining = store.sessions().len();
                    self.cursor = self.cursor.min(remaining.saturating_sub(1));
                }
            }
            _ => {}
        }

        SidebarAction::None
    }

    pub fn render_sidebar(&self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title("🗂  Chats")
            .style(if self.has_focus {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Gray)
            });
        let inner = block.inner(area);
        block.render(area, buf);

        let store = lock(&self.sessions);
        let mut lines: Vec<Line> = Vec::new();

        if store.is_loading() {
            lines.push(Line::from(Span::styled(
                "Loading chats…",
                Style::default().fg(Color::DarkGray),
            )));
        } else if store.sessions().is_empty() {
            lines.push(Line::from(Span::styled(
                "No chats yet",
                Style::default().fg(Color::DarkGray),
            )));
        } else {
            for (index, session) in store.sessions().iter().enumerate() {
                let marker = if session.active { "● " } else { "  " };
                let mut style = if session.active {
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };
                if self.has_focus && index == self.cursor {
                    style = style.bg(Color::DarkGray);
                }
                lines.push(Line::from(vec![
                    Span::styled(marker, style),
                    Span::styled(session.title.clone(), style),
                ]));
            }
        }

        // Keep the cursor row visible
        let height = inner.height as usize;
        let start = if self.cursor >= height {
            self.cursor + 1 - height
        } else {
            0
        };
        for (i, line) in lines.iter().skip(start).take(height).enumerate() {
            buf.set_line(inner.x, inner.y + i as u16, line, inner.width);
        }

        if self.has_focus && inner.height > 0 {
            let hint = Line::from(Span::styled(
                "↑↓ move · Enter open · d delete · n new",
                Style::default().fg(Color::DarkGray),
            ));
            buf.set_line(inner.x, inner.y + inner.height - 1, &hint, inner.width);
        }
    }
}
