//! Terminal setup and the main event loop.

use std::io::{self, Stdout};
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{Event, EventStream},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::events::AppEvent;
use crate::ui::conversation::{ConversationAction, ConversationManager};
use crate::voice::{RecognitionEvent, SynthesisEvent};

/// Receiving ends of everything that can wake the UI besides the keyboard
pub struct Channels {
    pub app_rx: UnboundedReceiver<AppEvent>,
    pub recognition_rx: UnboundedReceiver<RecognitionEvent>,
    pub synthesis_rx: UnboundedReceiver<SynthesisEvent>,
}

/// Put the terminal in raw mode on the alternate screen
pub fn init_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

pub fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Draw and dispatch events until the user quits
pub async fn run<B: Backend>(
    terminal: &mut Terminal<B>,
    mut manager: ConversationManager,
    mut channels: Channels,
    tick_rate: Duration,
) -> Result<()> {
    let mut term_events = EventStream::new();
    let mut ticker = tokio::time::interval(tick_rate);

    loop {
        terminal.draw(|frame| frame.render_widget(&manager, frame.size()))?;

        tokio::select! {
            Some(event) = channels.app_rx.recv() => {
                manager.handle_app_event(event);
            }
            Some(event) = channels.recognition_rx.recv() => {
                manager.handle_recognition_event(event);
            }
            Some(event) = channels.synthesis_rx.recv() => {
                manager.handle_synthesis_event(event);
            }
            term_event = term_events.next() => match term_event {
                Some(Ok(Event::Key(key))) => {
                    if manager.handle_key(key) == ConversationAction::Exit {
                        break;
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },
            _ = ticker.tick() => {
                manager.tick();
            }
        }
    }

    tracing::info!("Leaving chat");
    Ok(())
}
