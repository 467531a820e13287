//! Conversation history display component

use crate::config::UiConfig;
use crate::events::{Message, MessageRole, SourceCitation};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Citations shown under an answer before the rest are summarised
pub const MAX_DISPLAYED_SOURCES: usize = 3;

/// Conversation history display component
#[derive(Clone)]
pub struct ConversationHistory {
    messages: Vec<Message>,
    title: String,
    waiting: bool,
    show_sources: bool,
    show_confidence: bool,
    suggestions: Vec<String>,
    selected_suggestion: Option<usize>,
}

impl ConversationHistory {
    pub fn new(ui: &UiConfig) -> Self {
        Self {
            messages: Vec::new(),
            title: "New chat".to_string(),
            waiting: false,
            show_sources: ui.show_sources,
            show_confidence: ui.show_confidence,
            suggestions: ui.suggestions.clone(),
            selected_suggestion: None,
        }
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    /// Highlight one of the starter questions
    pub fn select_suggestion(&mut self, index: Option<usize>) {
        self.selected_suggestion = index.filter(|i| *i < self.suggestions.len());
    }

    pub fn selected_suggestion(&self) -> Option<usize> {
        self.selected_suggestion
    }

    /// Replace the displayed messages
    pub fn set_messages(&mut self, messages: &[Message]) {
        self.messages = messages.to_vec();
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Show the typing indicator below the last message
    pub fn set_waiting(&mut self, waiting: bool) {
        self.waiting = waiting;
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// All lines of the conversation at the given width
    pub fn lines(&self, width: u16) -> Vec<Line<'static>> {
        let mut all_lines: Vec<Line<'static>> = Vec::new();
        for message in &self.messages {
            all_lines.append(&mut self.render_message(message, width));
            all_lines.push(Line::from(""));
        }

        if self.waiting {
            all_lines.push(Line::from(vec![
                Span::styled("🤖 HR Assistant ", Style::default().fg(Color::DarkGray)),
                Span::styled("is looking that up ▋", Style::default().fg(Color::Yellow)),
            ]));
        }
        all_lines
    }

    /// Render a single message into lines
    fn render_message(&self, message: &Message, width: u16) -> Vec<Line<'static>> {
        let mut lines = Vec::new();

        let (icon, name) = match message.role {
            MessageRole::User => ("👤", "You"),
            MessageRole::Assistant => ("🤖", "HR Assistant"),
        };
        let mut header = vec![Span::styled(
            format!("{} {} ", icon, name),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::BOLD),
        )];
        if self.show_confidence {
            if let Some(badge) = confidence_badge(message) {
                header.push(badge);
            }
        }
        lines.push(Line::from(header));

        let style = content_style(message.role);
        for paragraph in message.content.split('\n') {
            for content_line in wrap_text(paragraph, width.saturating_sub(2) as usize) {
                lines.push(Line::from(vec![
                    Span::raw("  "),
                    Span::styled(content_line, style),
                ]));
            }
        }

        if self.show_sources {
            if let Some(sources) = message.sources.as_ref().filter(|s| !s.is_empty()) {
                lines.push(Line::from(vec![Span::styled(
                    "  Sources:",
                    Style::default().fg(Color::Cyan),
                )]));
                for citation in sources.iter().take(MAX_DISPLAYED_SOURCES) {
                    lines.push(Line::from(vec![Span::styled(
                        format!("    📄 {}", format_citation(citation)),
                        Style::default().fg(Color::Gray),
                    )]));
                }
                if sources.len() > MAX_DISPLAYED_SOURCES {
                    lines.push(Line::from(vec![Span::styled(
                        format!("    … and {} more", sources.len() - MAX_DISPLAYED_SOURCES),
                        Style::default().fg(Color::DarkGray),
                    )]));
                }
            }
        }

        lines
    }
}

/// `handbook.pdf · p. 12 · Leave`; missing parts are left out
pub fn format_citation(citation: &SourceCitation) -> String {
    let mut text = if citation.source.trim().is_empty() {
        "unknown source".to_string()
    } else {
        citation.source.clone()
    };
    if let Some(page) = citation.page {
        text.push_str(&format!(" · p. {}", page));
    }
    if !citation.section.trim().is_empty() {
        text.push_str(" · ");
        text.push_str(&citation.section);
    }
    text
}

/// `high (92%)`, `medium`, `71%`, or nothing
pub fn confidence_label(message: &Message) -> Option<String> {
    let percent = message
        .confidence_score
        .map(|score| format!("{:.0}%", score.clamp(0.0, 1.0) * 100.0));
    match (message.confidence_level.as_deref(), percent) {
        (Some(level), Some(percent)) => Some(format!("{} ({})", level, percent)),
        (Some(level), None) => Some(level.to_string()),
        (None, Some(percent)) => Some(percent),
        (None, None) => None,
    }
}

fn confidence_badge(message: &Message) -> Option<Span<'static>> {
    let label = confidence_label(message)?;
    let color = match message.confidence_level.as_deref().map(str::to_lowercase).as_deref() {
        Some("high") => Color::Green,
        Some("medium") => Color::Yellow,
        Some("low") => Color::Red,
        _ => Color::Gray,
    };
    Some(Span::styled(format!("[{}]", label), Style::default().fg(color)))
}

impl ConversationHistory {
    /// Numbered starter questions, the selected one highlighted
    fn suggestion_lines(&self, width: u16) -> Vec<Line<'static>> {
        if self.suggestions.is_empty() {
            return Vec::new();
        }

        let mut lines = vec![
            Line::from(""),
            Line::from(Span::styled(
                "Try one of these (↑↓ to pick, Enter to ask):",
                Style::default().fg(Color::Cyan),
            )),
        ];
        for (index, suggestion) in self.suggestions.iter().enumerate() {
            let selected = self.selected_suggestion == Some(index);
            let style = if selected {
                Style::default().fg(Color::Black).bg(Color::Cyan)
            } else {
                Style::default().fg(Color::Gray)
            };
            let marker = if selected { "›" } else { " " };
            let text = format!("{} {}. {}", marker, index + 1, suggestion);
            let clipped: String = text.chars().take(width as usize).collect();
            lines.push(Line::from(Span::styled(clipped, style)));
        }
        lines
    }
}

/// Get content style based on role
fn content_style(role: MessageRole) -> Style {
    match role {
        MessageRole::User => Style::default().fg(Color::Blue),
        MessageRole::Assistant => Style::default().fg(Color::Green),
    }
}

/// Wrap text to fit within the given width
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current_len > 0 && current_len + word_len + 1 > width {
            lines.push(std::mem::take(&mut current_line));
            current_len = 0;
        }
        if current_len > 0 {
            current_line.push(' ');
            current_len += 1;
        }
        current_line.push_str(word);
        current_len += word_len;
    }

    if !current_line.is_empty() || lines.is_empty() {
        lines.push(current_line);
    }

    lines
}

impl Widget for ConversationHistory {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("💬 {}", self.title));

        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.messages.is_empty() && !self.waiting {
            let mut welcome_lines = vec![
                Line::from(vec![Span::styled(
                    "Welcome to the HR assistant!",
                    Style::default().fg(Color::Green),
                )]),
                Line::from(""),
                Line::from(vec![Span::styled(
                    "Ask about leave, benefits, payroll or company policy below.",
                    Style::default().fg(Color::Gray),
                )]),
                Line::from(""),
                Line::from(vec![Span::styled(
                    "Press Enter to send, Shift+Enter for a new line, / for commands.",
                    Style::default().fg(Color::DarkGray),
                )]),
            ];
            welcome_lines.extend(self.suggestion_lines(inner_area.width));

            for (i, line) in welcome_lines.iter().enumerate() {
                if i < inner_area.height as usize {
                    buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
                }
            }
            return;
        }

        // Show the tail of the conversation
        let all_lines = self.lines(inner_area.width);
        let height = inner_area.height as usize;
        let start = all_lines.len().saturating_sub(height);

        for (i, line) in all_lines[start..].iter().enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(lines: &[Line<'_>]) -> String {
        lines
            .iter()
            .map(|line| {
                line.spans
                    .iter()
                    .map(|span| span.content.as_ref())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn answered() -> Message {
        let mut message = Message::assistant("You get 25 days of annual leave.");
        message.sources = Some(vec![SourceCitation {
            source: "handbook.pdf".into(),
            page: Some(12),
            section: "Annual leave".into(),
        }]);
        message.confidence_score = Some(0.92);
        message.confidence_level = Some("high".into());
        message
    }

    #[test]
    fn renders_sources_and_confidence() {
        let mut history = ConversationHistory::new(&UiConfig::default());
        history.set_messages(&[Message::user("How much leave?"), answered()]);
        let text = text_of(&history.lines(80));

        assert!(text.contains("How much leave?"));
        assert!(text.contains("[high (92%)]"));
        assert!(text.contains("handbook.pdf · p. 12 · Annual leave"));
    }

    #[test]
    fn display_toggles_hide_extras() {
        let ui = UiConfig {
            show_confidence: false,
            show_sources: false,
            ..UiConfig::default()
        };
        let mut history = ConversationHistory::new(&ui);
        history.set_messages(&[answered()]);
        let text = text_of(&history.lines(80));

        assert!(!text.contains("high"));
        assert!(!text.contains("handbook.pdf"));
    }

    #[test]
    fn only_the_first_three_sources_are_listed() {
        let mut message = Message::assistant("See the policies.");
        message.sources = Some(
            (1..=5)
                .map(|page| SourceCitation {
                    source: format!("doc{}.pdf", page),
                    page: Some(page),
                    section: String::new(),
                })
                .collect(),
        );
        let mut history = ConversationHistory::new(&UiConfig::default());
        history.set_messages(&[message]);
        let text = text_of(&history.lines(80));

        assert!(text.contains("doc3.pdf · p. 3"));
        assert!(!text.contains("doc4.pdf"));
        assert!(text.contains("… and 2 more"));
    }

    #[test]
    fn citation_without_metadata_still_formats() {
        let citation = SourceCitation {
            source: String::new(),
            page: None,
            section: "chunk-4".into(),
        };
        assert_eq!(format_citation(&citation), "unknown source · chunk-4");
    }

    #[test]
    fn empty_chat_lists_numbered_suggestions() {
        let mut history = ConversationHistory::new(&UiConfig::default());
        history.select_suggestion(Some(1));
        assert_eq!(history.selected_suggestion(), Some(1));

        let area = Rect::new(0, 0, 120, 20);
        let mut buf = Buffer::empty(area);
        history.clone().render(area, &mut buf);
        let text: String = buf.content().iter().map(|cell| cell.symbol()).collect();
        assert!(text.contains("1. What is the company match"));
        assert!(text.contains("› 2. How many weeks"));

        history.select_suggestion(Some(99));
        assert_eq!(history.selected_suggestion(), None);
    }

    #[test]
    fn waiting_indicator_is_appended() {
        let mut history = ConversationHistory::new(&UiConfig::default());
        history.set_messages(&[Message::user("q")]);
        history.set_waiting(true);
        assert!(text_of(&history.lines(80)).contains("looking that up"));
    }

    #[test]
    fn confidence_label_variants() {
        let mut message = Message::assistant("x");
        assert_eq!(confidence_label(&message), None);
        message.confidence_score = Some(0.714);
        assert_eq!(confidence_label(&message).as_deref(), Some("71%"));
        message.confidence_level = Some("medium".into());
        assert_eq!(confidence_label(&message).as_deref(), Some("medium (71%)"));
    }

    #[test]
    fn wraps_on_word_boundaries() {
        assert_eq!(wrap_text("one two three", 7), vec!["one two", "three"]);
        assert_eq!(wrap_text("", 10), vec![String::new()]);
        assert_eq!(wrap_text("supercalifragilistic", 5), vec!["supercalifragilistic"]);
    }
}
