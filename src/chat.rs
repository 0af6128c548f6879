//! The send cycle: optimistic user append, background request, reply append
//! and optional spoken reply.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::client::ChatClient;
use crate::error::ClientError;
use crate::events::AppEvent;
use crate::identity::UserIdentity;
use crate::input_mode::{InputModeTracker, InputOrigin};
use crate::session::{Message, SessionStore, ThreadId};
use crate::voice::{RecognitionEvent, SynthesisEvent, VoiceAdapter};

/// A message that has been shown locally and is waiting for its reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTurn {
    pub thread_id: ThreadId,
    pub text: String,
    pub origin: InputOrigin,
}

/// Owns the session state and speech adapter, driven by the UI loop
pub struct ChatController {
    store: SessionStore,
    tracker: InputModeTracker,
    voice: VoiceAdapter,
    selected_voice: usize,
    in_flight: usize,
}

impl ChatController {
    pub fn new(voice: VoiceAdapter, selected_voice: usize) -> Self {
        Self {
            store: SessionStore::new(),
            tracker: InputModeTracker::new(),
            voice,
            selected_voice,
            in_flight: 0,
        }
    }

    /// Phase one: append the user message to the active thread.
    ///
    /// Returns `None` for blank input. The turn remembers where it was sent
    /// from and how the input arrived.
    pub fn submit(&mut self, text: &str) -> Option<PendingTurn> {
        if text.trim().is_empty() {
            return None;
        }

        let origin = self.tracker.take_for_submit();
        let thread_id = self.store.active_id();
        self.store.append_message(thread_id, Message::user(text));
        self.in_flight += 1;

        Some(PendingTurn {
            thread_id,
            text: text.to_string(),
            origin,
        })
    }

    /// Phase two: record the backend's answer for `turn`.
    ///
    /// Failures are logged and dropped; the user message stays unanswered.
    pub fn complete_turn(&mut self, turn: PendingTurn, result: Result<String, ClientError>) {
        self.in_flight = self.in_flight.saturating_sub(1);

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(error = %e, thread_id = turn.thread_id, "Error sending message");
                return;
            }
        };

        self.store.append_message(turn.thread_id, Message::bot(reply.clone()));

        if turn.origin.is_voice() {
            self.voice.speak(&reply, self.selected_voice);
        }
    }

    /// Start listening unless a reply is being spoken
    pub fn start_listening(&mut self) -> bool {
        if self.voice.is_speaking() {
            return false;
        }
        self.tracker.on_listen_started();
        self.voice.start_listening()
    }

    pub fn stop_all(&mut self) {
        self.voice.stop_all();
    }

    /// Route a recognition event. Returns the transcript to place in the
    /// composer, if the event carried one.
    pub fn handle_recognition_event(&mut self, event: RecognitionEvent) -> Option<String> {
        if !self.voice.on_recognition_event(&event) {
            return None;
        }
        match event {
            RecognitionEvent::Result(_, transcript) => {
                self.tracker.on_voice_result();
                Some(transcript)
            }
            RecognitionEvent::Error(..) | RecognitionEvent::Ended(_) => None,
        }
    }

    pub fn handle_synthesis_event(&mut self, event: SynthesisEvent) {
        self.voice.on_synthesis_event(&event);
    }

    pub fn new_chat(&mut self) -> ThreadId {
        self.store.create_thread()
    }

    /// Switch to thread `id` if it exists
    pub fn select_chat(&mut self, id: ThreadId) -> bool {
        if self.store.thread(id).is_none() {
            return false;
        }
        self.store.select_thread(id);
        true
    }

    /// Choose the output voice if `index` is in the catalog
    pub fn select_voice(&mut self, index: usize) -> bool {
        if index >= self.voice.voices().len() {
            return false;
        }
        self.selected_voice = index;
        true
    }

    pub fn selected_voice(&self) -> usize {
        self.selected_voice
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn voice(&self) -> &VoiceAdapter {
        &self.voice
    }

    pub fn awaiting_reply(&self) -> bool {
        self.in_flight > 0
    }
}

/// Run the request for `turn` in the background and post the outcome to `tx`
pub fn dispatch(
    turn: PendingTurn,
    client: ChatClient,
    user: UserIdentity,
    tx: mpsc::UnboundedSender<AppEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = client.send_message(&turn.text, &user).await;
        let _ = tx.send(AppEvent::ReplyReceived { turn, result });
    })
}
