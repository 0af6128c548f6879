use crate::chat::{dispatch, ChatController};
use crate::client::ChatClient;
use crate::config::Config;
use crate::events::AppEvent;
use crate::identity::UserIdentity;
use crate::render::links;
use crate::session::ThreadId;
use crate::ui::conversation::{
    composer::ComposerResult, get_help_text, ConversationComposer, ConversationHistory,
    ParsedCommand, Sidebar, SlashCommand, StatusLine,
};
use crate::voice::{RecognitionEvent, SynthesisEvent};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::Line,
    widgets::{Block, Borders, Clear, Widget},
};
use tokio::sync::mpsc;

const SCROLL_STEP: usize = 5;

/// Actions that can be requested by the conversation manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationAction {
    None,
    Exit,
}

/// Ties the chat controller to the widgets and routes input between them
pub struct ConversationManager {
    chat: ChatController,
    composer: ConversationComposer,
    client: ChatClient,
    user: UserIdentity,
    config: Config,
    app_tx: mpsc::UnboundedSender<AppEvent>,
    scroll_offset: usize,
    show_help: bool,
    notice: Option<String>,
    frame: usize,
}

impl ConversationManager {
    pub fn new(
        chat: ChatController,
        client: ChatClient,
        user: UserIdentity,
        config: Config,
        app_tx: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        let placeholder = if chat.voice().can_listen() {
            "Type a message, or press Ctrl+L to speak..."
        } else {
            "Type a message..."
        };

        Self {
            chat,
            composer: ConversationComposer::new(placeholder),
            client,
            user,
            config,
            app_tx,
            scroll_offset: 0,
            show_help: false,
            notice: None,
            frame: 0,
        }
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ConversationAction {
        if key.kind != KeyEventKind::Press {
            return ConversationAction::None;
        }

        if self.show_help {
            self.show_help = false;
            return ConversationAction::None;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let alt = key.modifiers.contains(KeyModifiers::ALT);

        match key.code {
            KeyCode::Char('c') if ctrl => return ConversationAction::Exit,
            KeyCode::Char('n') if ctrl => self.new_chat(),
            KeyCode::Char('l') if ctrl => self.start_listening(),
            KeyCode::Char('s') if ctrl => self.stop_all(),
            KeyCode::Up if alt => self.step_chat(-1),
            KeyCode::Down if alt => self.step_chat(1),
            KeyCode::PageUp => {
                self.scroll_offset = self.scroll_offset.saturating_add(SCROLL_STEP);
            }
            KeyCode::PageDown => {
                self.scroll_offset = self.scroll_offset.saturating_sub(SCROLL_STEP);
            }
            _ => match self.composer.handle_key(key) {
                ComposerResult::Submitted(text) => self.submit(&text),
                ComposerResult::Command(command) => return self.handle_slash_command(command),
                ComposerResult::None => {}
            },
        }

        ConversationAction::None
    }

    /// Apply a reply (or failure) that arrived from the backend
    pub fn handle_app_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::ReplyReceived { turn, result } => {
                let landed_here = turn.thread_id == self.chat.store().active_id();
                self.chat.complete_turn(turn, result);
                if landed_here {
                    self.scroll_offset = 0;
                }
            }
        }
    }

    pub fn handle_recognition_event(&mut self, event: RecognitionEvent) {
        if let Some(transcript) = self.chat.handle_recognition_event(event) {
            self.composer.set_content(transcript);
        }
    }

    pub fn handle_synthesis_event(&mut self, event: SynthesisEvent) {
        self.chat.handle_synthesis_event(event);
    }

    /// Advance animations
    pub fn tick(&mut self) {
        self.frame = self.frame.wrapping_add(1);
    }

    pub fn chat(&self) -> &ChatController {
        &self.chat
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    fn submit(&mut self, text: &str) {
        let Some(turn) = self.chat.submit(text) else {
            return;
        };
        self.scroll_offset = 0;
        self.notice = None;
        dispatch(
            turn,
            self.client.clone(),
            self.user.clone(),
            self.app_tx.clone(),
        );
    }

    fn new_chat(&mut self) {
        let id = self.chat.new_chat();
        self.scroll_offset = 0;
        self.notice = Some(format!("Started chat {}", id));
    }

    fn switch_chat(&mut self, id: ThreadId) {
        if self.chat.select_chat(id) {
            self.scroll_offset = 0;
            self.notice = None;
        } else {
            self.notice = Some(format!("No chat with id {}", id));
        }
    }

    fn step_chat(&mut self, delta: isize) {
        let threads = self.chat.store().threads();
        let Some(current) = threads
            .iter()
            .position(|t| t.id == self.chat.store().active_id())
        else {
            return;
        };
        let next = current as isize + delta;
        if next < 0 || next as usize >= threads.len() {
            return;
        }
        let id = threads[next as usize].id;
        self.switch_chat(id);
    }

    fn start_listening(&mut self) {
        if self.chat.start_listening() {
            self.notice = None;
            return;
        }

        let reason = if !self.chat.voice().can_listen() {
            "Speech recognition is not available"
        } else if self.chat.voice().is_speaking() {
            "Still speaking; press Ctrl+S to stop first"
        } else {
            "Could not start listening; see the log"
        };
        self.notice = Some(reason.to_string());
    }

    fn stop_all(&mut self) {
        self.chat.stop_all();
        self.notice = None;
    }

    fn select_voice(&mut self, command: &ParsedCommand) {
        let Some(index) = command.number() else {
            let voices = self.chat.voice().voices();
            self.notice = Some(if voices.is_empty() {
                "No voices available".to_string()
            } else {
                let listed: Vec<String> = voices
                    .iter()
                    .enumerate()
                    .map(|(i, voice)| format!("{} {}", i, voice.label()))
                    .collect();
                format!("Voices: {}", listed.join(", "))
            });
            return;
        };

        let index = index as usize;
        if !self.chat.select_voice(index) {
            self.notice = Some(format!("No voice number {}", index));
            return;
        }

        let label = self.chat.voice().voices()[index].label();
        self.config.speech.selected_voice = index;
        if let Err(e) = self.config.save() {
            tracing::warn!(error = %e, "Could not persist voice selection");
        }
        self.notice = Some(format!("Replies will use {}", label));
    }

    fn open_link(&mut self, command: &ParsedCommand) {
        let number = command.number().unwrap_or(1) as usize;
        let found = self
            .chat
            .store()
            .active_thread()
            .last_bot_message()
            .map(|m| links(&m.text))
            .unwrap_or_default();

        let Some(link) = number.checked_sub(1).and_then(|i| found.get(i)) else {
            self.notice = Some(format!("No link [{}] in the latest reply", number));
            return;
        };

        self.notice = Some(match link.open() {
            Ok(()) => format!("Opened {}", link.href),
            Err(e) => {
                tracing::warn!(error = %e, url = %link.href, "Could not open link");
                format!("Could not open {}: {}", link.href, e)
            }
        });
    }

    /// Handle slash commands
    fn handle_slash_command(&mut self, command: ParsedCommand) -> ConversationAction {
        match command.command {
            SlashCommand::New => self.new_chat(),
            SlashCommand::Chat => match command.number() {
                Some(id) => self.switch_chat(id),
                None => self.notice = Some("Usage: /chat <id>".to_string()),
            },
            SlashCommand::Listen => self.start_listening(),
            SlashCommand::Stop => self.stop_all(),
            SlashCommand::Voice => self.select_voice(&command),
            SlashCommand::Open => self.open_link(&command),
            SlashCommand::Help => self.show_help = true,
            SlashCommand::Bye => return ConversationAction::Exit,
        }
        ConversationAction::None
    }

    fn status(&self) -> StatusLine {
        StatusLine {
            awaiting_reply: self.chat.awaiting_reply(),
            listening: self.chat.voice().is_listening(),
            speaking: self.chat.voice().is_speaking(),
            notice: self.notice.clone(),
            frame: self.frame,
        }
    }

    fn render_help(&self, area: Rect, buf: &mut Buffer) {
        let help = get_help_text();
        let height = (help.lines().count() as u16 + 3).min(area.height);
        let width = 64.min(area.width);
        let popup = Rect {
            x: area.x + (area.width - width) / 2,
            y: area.y + (area.height - height) / 2,
            width,
            height,
        };

        Clear.render(popup, buf);
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Help (any key to close)")
            .style(Style::default().fg(Color::Yellow));
        let inner = block.inner(popup);
        block.render(popup, buf);

        for (i, text) in help.lines().take(inner.height as usize).enumerate() {
            buf.set_line(inner.x, inner.y + i as u16, &Line::from(text), inner.width);
        }
    }
}

impl Widget for &ConversationManager {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(28), Constraint::Min(20)])
            .split(area);

        Sidebar::new(
            self.chat.store(),
            self.chat.voice().voices(),
            self.chat.selected_voice(),
        )
        .render(columns[0], buf);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(5),    // History
                Constraint::Length(1), // Status
                Constraint::Length(3), // Composer
            ])
            .split(columns[1]);

        ConversationHistory::new(
            self.chat.store().active_thread(),
            self.scroll_offset,
            self.config.ui.show_timestamps,
        )
        .render(chunks[0], buf);
        self.status().render(chunks[1], buf);
        self.composer.render(chunks[2], buf);

        if self.show_help {
            self.render_help(area, buf);
        }
    }
}
