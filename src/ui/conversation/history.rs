//! Conversation history display component

use crate::render::{render, Segment};
use crate::session::{ChatThread, Message, MessageKind};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// A run of non-whitespace text with its style
#[derive(Debug, Clone, PartialEq)]
struct Word {
    text: String,
    style: Style,
    space_before: bool,
}

/// Renders the active thread, newest lines at the bottom
pub struct ConversationHistory<'a> {
    thread: &'a ChatThread,
    scroll_offset: usize,
    show_timestamps: bool,
}

impl<'a> ConversationHistory<'a> {
    pub fn new(thread: &'a ChatThread, scroll_offset: usize, show_timestamps: bool) -> Self {
        Self {
            thread,
            scroll_offset,
            show_timestamps,
        }
    }

    /// All lines for the thread at the given width
    pub fn lines(&self, width: u16) -> Vec<Line<'static>> {
        let mut all_lines = Vec::new();
        for message in &self.thread.messages {
            all_lines.extend(self.render_message(message, width));
            all_lines.push(Line::from(""));
        }
        all_lines
    }

    fn render_message(&self, message: &Message, width: u16) -> Vec<Line<'static>> {
        let mut lines = Vec::new();

        let (icon, name) = match message.kind {
            MessageKind::User => ("👤", "You"),
            MessageKind::Bot => ("🤖", "Bot"),
        };
        let header = if self.show_timestamps {
            format!("{} {} {}", icon, name, message.sent_at.format("%H:%M:%S"))
        } else {
            format!("{} {}", icon, name)
        };
        lines.push(Line::from(vec![Span::styled(
            header,
            Style::default().fg(Color::DarkGray),
        )]));

        let content_width = width.saturating_sub(2) as usize;
        let base = content_style(message.kind);
        let mut link_number = 0;

        for text_line in message.text.split('\n') {
            let words = match message.kind {
                MessageKind::User => words_of(text_line, base),
                MessageKind::Bot => styled_words(text_line, base, &mut link_number),
            };
            for spans in wrap_words(words, content_width) {
                let mut line = vec![Span::raw("  ")];
                line.extend(spans);
                lines.push(Line::from(line));
            }
        }

        lines
    }
}

fn content_style(kind: MessageKind) -> Style {
    match kind {
        MessageKind::User => Style::default().fg(Color::Blue),
        MessageKind::Bot => Style::default().fg(Color::Green),
    }
}

fn link_style() -> Style {
    Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::UNDERLINED)
}

/// Split plain text into words, remembering which ones followed whitespace
fn words_of(text: &str, style: Style) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut space_before = false;
    let mut pending_space = false;

    for ch in text.chars() {
        if ch.is_whitespace() {
            if !current.is_empty() {
                words.push(Word {
                    text: std::mem::take(&mut current),
                    style,
                    space_before,
                });
            }
            pending_space = true;
        } else {
            if current.is_empty() {
                space_before = pending_space;
                pending_space = false;
            }
            current.push(ch);
        }
    }

    if !current.is_empty() {
        words.push(Word {
            text: current,
            style,
            space_before,
        });
    }

    words
}

/// Words of a bot line with links underlined and numbered `[n]`
fn styled_words(text: &str, base: Style, link_number: &mut usize) -> Vec<Word> {
    let mut words = Vec::new();
    let mut trailing_space = false;

    for segment in render(text) {
        match segment {
            Segment::Text(plain) => {
                let mut segment_words = words_of(&plain, base);
                if let Some(first) = segment_words.first_mut() {
                    if !words.is_empty() && !plain.starts_with(char::is_whitespace) {
                        first.space_before = false;
                    }
                }
                trailing_space = plain.ends_with(char::is_whitespace);
                words.extend(segment_words);
            }
            Segment::Link(link) => {
                *link_number += 1;
                words.push(Word {
                    text: link.text,
                    style: link_style(),
                    space_before: trailing_space,
                });
                words.push(Word {
                    text: format!("[{}]", link_number),
                    style: Style::default().fg(Color::DarkGray),
                    space_before: false,
                });
                trailing_space = false;
            }
        }
    }

    words
}

/// Greedy word wrap. Words longer than `width` get a line of their own.
fn wrap_words(words: Vec<Word>, width: usize) -> Vec<Vec<Span<'static>>> {
    let mut lines = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut current_width = 0;

    for word in words {
        let word_width = word.text.chars().count();
        let gap = usize::from(word.space_before && !current.is_empty());

        if !current.is_empty() && width > 0 && current_width + gap + word_width > width {
            lines.push(std::mem::take(&mut current));
            current_width = 0;
        } else if gap == 1 {
            current.push(Span::raw(" "));
            current_width += 1;
        }

        current_width += word_width;
        current.push(Span::styled(word.text, word.style));
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }

    lines
}

impl Widget for ConversationHistory<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("💬 {}", self.thread.title));

        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.thread.messages.is_empty() {
            let welcome = Line::from(vec![Span::styled(
                "Start chatting...",
                Style::default().fg(Color::DarkGray),
            )]);
            buf.set_line(inner_area.x, inner_area.y, &welcome, inner_area.width);
            return;
        }

        let all_lines = self.lines(inner_area.width);
        let height = inner_area.height as usize;
        let end = all_lines.len().saturating_sub(self.scroll_offset);
        let start = end.saturating_sub(height);

        for (i, line) in all_lines[start..end].iter().enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
        }
    }
}
