use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Widget,
};

/// Snapshot of what the app is busy with, drawn above the composer
#[derive(Debug, Clone, Default)]
pub struct StatusLine {
    pub awaiting_reply: bool,
    pub listening: bool,
    pub speaking: bool,
    pub notice: Option<String>,
    /// Animation frame, advanced on every tick
    pub frame: usize,
}

impl StatusLine {
    fn dots(&self) -> &'static str {
        match self.frame % 4 {
            0 => ".",
            1 => "..",
            2 => "...",
            _ => "   ",
        }
    }

    pub fn spans(&self) -> Vec<Span<'static>> {
        let mut spans = Vec::new();

        if self.listening {
            spans.push(Span::styled("🎤 Listening", Style::default().fg(Color::Red)));
            spans.push(Span::styled(self.dots(), Style::default().fg(Color::Yellow)));
            spans.push(Span::raw("  "));
        }
        if self.speaking {
            spans.push(Span::styled("🔊 Speaking", Style::default().fg(Color::Magenta)));
            spans.push(Span::raw("  "));
        }
        if self.awaiting_reply {
            spans.push(Span::styled("🤖 Waiting for reply", Style::default().fg(Color::Green)));
            spans.push(Span::styled(self.dots(), Style::default().fg(Color::Yellow)));
            spans.push(Span::raw("  "));
        }
        if let Some(notice) = &self.notice {
            spans.push(Span::styled(notice.clone(), Style::default().fg(Color::DarkGray)));
        }

        spans
    }
}

impl Widget for StatusLine {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let spans = self.spans();
        if spans.is_empty() {
            return;
        }
        buf.set_line(area.x, area.y, &Line::from(spans), area.width);
    }
}
