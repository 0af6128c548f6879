//! Thread list and voice picker

use crate::session::{SessionStore, ThreadId};
use crate::voice::Voice;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

pub struct Sidebar<'a> {
    store: &'a SessionStore,
    voices: &'a [Voice],
    selected_voice: usize,
}

impl<'a> Sidebar<'a> {
    pub fn new(store: &'a SessionStore, voices: &'a [Voice], selected_voice: usize) -> Self {
        Self {
            store,
            voices,
            selected_voice,
        }
    }

    fn thread_lines(&self) -> Vec<Line<'static>> {
        let active: ThreadId = self.store.active_id();
        self.store
            .threads()
            .iter()
            .map(|thread| {
                let style = if thread.id == active {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };
                Line::from(vec![
                    Span::styled(
                        format!("{:>2} ", thread.id),
                        Style::default().fg(Color::DarkGray),
                    ),
                    Span::styled(thread.title.clone(), style),
                ])
            })
            .collect()
    }

    fn voice_lines(&self) -> Vec<Line<'static>> {
        if self.voices.is_empty() {
            return vec![Line::from(Span::styled(
                "default voice",
                Style::default().fg(Color::DarkGray),
            ))];
        }

        self.voices
            .iter()
            .enumerate()
            .map(|(index, voice)| {
                let (marker, style) = if index == self.selected_voice {
                    ("●", Style::default().fg(Color::Magenta))
                } else {
                    ("○", Style::default().fg(Color::Gray))
                };
                Line::from(vec![
                    Span::styled(format!("{} {:>2} ", marker, index), style),
                    Span::styled(voice.label(), style),
                ])
            })
            .collect()
    }
}

fn render_lines(lines: &[Line<'_>], area: Rect, buf: &mut Buffer) {
    for (i, line) in lines.iter().take(area.height as usize).enumerate() {
        buf.set_line(area.x, area.y + i as u16, line, area.width);
    }
}

impl Widget for Sidebar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(5), Constraint::Length(8)])
            .split(area);

        let chats = Block::default().borders(Borders::ALL).title("Chats");
        let chats_inner = chats.inner(chunks[0]);
        chats.render(chunks[0], buf);
        render_lines(&self.thread_lines(), chats_inner, buf);

        let voices = Block::default().borders(Borders::ALL).title("Voices");
        let voices_inner = voices.inner(chunks[1]);
        voices.render(chunks[1], buf);
        render_lines(&self.voice_lines(), voices_inner, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Message;

    fn text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_threads_listed_in_creation_order() {
        let mut store = SessionStore::new();
        store.append_message(1, Message::user("hello there"));
        store.create_thread();
        let sidebar = Sidebar::new(&store, &[], 0);
        let lines: Vec<String> = sidebar.thread_lines().iter().map(text).collect();
        assert_eq!(lines, vec![" 1 hello there", " 2 Chat 2"]);
    }

    #[test]
    fn test_selected_voice_is_marked() {
        let store = SessionStore::new();
        let voices = vec![Voice::new("alice", "en-US"), Voice::new("bert", "en-GB")];
        let sidebar = Sidebar::new(&store, &voices, 1);
        let lines: Vec<String> = sidebar.voice_lines().iter().map(text).collect();
        assert_eq!(lines, vec!["○  0 alice (en-US)", "●  1 bert (en-GB)"]);
    }
}
