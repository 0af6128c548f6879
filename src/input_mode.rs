//! Tracks whether the pending input was spoken or typed.

/// Where a submitted message came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputOrigin {
    #[default]
    Typed,
    Voice,
}

impl InputOrigin {
    pub fn is_voice(self) -> bool {
        self == InputOrigin::Voice
    }
}

/// The "last input was voice" flag.
///
/// Only a recognition result sets it. Starting a new listening session or
/// submitting a message clears it, so each reply is spoken only when its own
/// turn was dictated.
#[derive(Debug, Clone, Default)]
pub struct InputModeTracker {
    last_input_was_voice: bool,
}

impl InputModeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_voice_result(&mut self) {
        self.last_input_was_voice = true;
    }

    pub fn on_listen_started(&mut self) {
        self.last_input_was_voice = false;
    }

    /// Consume the flag for the message being submitted
    pub fn take_for_submit(&mut self) -> InputOrigin {
        let origin = if self.last_input_was_voice {
            InputOrigin::Voice
        } else {
            InputOrigin::Typed
        };
        self.last_input_was_voice = false;
        origin
    }

    pub fn last_input_was_voice(&self) -> bool {
        self.last_input_was_voice
    }
}
