//! Speech input/output behind capability traits.
//!
//! Recognizers and synthesizers report what happens through typed events on
//! channels handed to them at construction, so the UI loop can react to them
//! like any other input and tests can drive them deterministically. Every
//! event names the session it belongs to; the adapter drops events from
//! sessions it has already moved past.

pub mod command;

use serde::{Deserialize, Serialize};

use crate::error::VoiceError;

pub use command::{CommandRecognizer, CommandSynthesizer};

/// Identifies one listening session or one utterance
pub type SessionId = u64;

/// A synthesis voice offered by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub name: String,
    pub locale: String,
}

impl Voice {
    pub fn new(name: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locale: locale.into(),
        }
    }

    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.locale)
    }
}

/// Events from a listening session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Final transcript of the utterance
    Result(SessionId, String),
    Error(SessionId, String),
    /// The session is over, with or without a result
    Ended(SessionId),
}

impl RecognitionEvent {
    pub fn session(&self) -> SessionId {
        match self {
            RecognitionEvent::Result(session, _)
            | RecognitionEvent::Error(session, _)
            | RecognitionEvent::Ended(session) => *session,
        }
    }
}

/// Events from the synthesizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisEvent {
    Started(SessionId),
    Ended(SessionId),
    Error(SessionId, String),
    /// The voice catalog changed and should be fetched again
    VoicesChanged,
}

impl SynthesisEvent {
    /// The utterance this event belongs to; `None` for catalog updates
    pub fn session(&self) -> Option<SessionId> {
        match self {
            SynthesisEvent::Started(session)
            | SynthesisEvent::Ended(session)
            | SynthesisEvent::Error(session, _) => Some(*session),
            SynthesisEvent::VoicesChanged => None,
        }
    }
}

/// Single-utterance speech recognition
pub trait SpeechRecognizer: Send {
    fn is_available(&self) -> bool;

    /// Begin a non-continuous session that yields at most one final result.
    /// Events for it carry `session`.
    fn start(&mut self, session: SessionId, locale: &str) -> Result<(), VoiceError>;

    /// End the current session. No-op when idle.
    fn stop(&mut self);
}

/// Text-to-speech output
pub trait SpeechSynthesizer: Send {
    fn is_available(&self) -> bool;

    /// Current catalog, complete
    fn voices(&self) -> Vec<Voice>;

    /// Speak `text` with `voice`, or the platform default when `None`.
    /// Events for the utterance carry `session`.
    fn speak(
        &mut self,
        session: SessionId,
        text: &str,
        voice: Option<&Voice>,
    ) -> Result<(), VoiceError>;

    /// Stop any utterance in progress. No-op when idle.
    fn cancel(&mut self);
}

/// Recognizer used when no recognition program is configured
#[derive(Debug, Default)]
pub struct UnsupportedRecognizer;

impl SpeechRecognizer for UnsupportedRecognizer {
    fn is_available(&self) -> bool {
        false
    }

    fn start(&mut self, _session: SessionId, _locale: &str) -> Result<(), VoiceError> {
        Err(VoiceError::Unsupported("speech recognition"))
    }

    fn stop(&mut self) {}
}

/// Synthesizer used when no synthesis program is configured
#[derive(Debug, Default)]
pub struct UnsupportedSynthesizer;

impl SpeechSynthesizer for UnsupportedSynthesizer {
    fn is_available(&self) -> bool {
        false
    }

    fn voices(&self) -> Vec<Voice> {
        Vec::new()
    }

    fn speak(
        &mut self,
        _session: SessionId,
        _text: &str,
        _voice: Option<&Voice>,
    ) -> Result<(), VoiceError> {
        Err(VoiceError::Unsupported("speech synthesis"))
    }

    fn cancel(&mut self) {}
}

/// Wraps the speech capabilities and tracks listening/speaking state and the
/// voice catalog.
pub struct VoiceAdapter {
    recognizer: Box<dyn SpeechRecognizer>,
    synthesizer: Box<dyn SpeechSynthesizer>,
    locale: String,
    catalog: Vec<Voice>,
    is_listening: bool,
    is_speaking: bool,
    /// Only events tagged with these are applied
    listen_session: SessionId,
    utterance: SessionId,
}

impl VoiceAdapter {
    pub fn new(
        recognizer: Box<dyn SpeechRecognizer>,
        synthesizer: Box<dyn SpeechSynthesizer>,
        locale: impl Into<String>,
    ) -> Self {
        if !recognizer.is_available() {
            tracing::warn!("Speech recognition not supported; voice input is disabled");
        }
        if !synthesizer.is_available() {
            tracing::warn!("Speech synthesis not supported; replies will not be spoken");
        }

        let catalog = synthesizer.voices();

        Self {
            recognizer,
            synthesizer,
            locale: locale.into(),
            catalog,
            is_listening: false,
            is_speaking: false,
            listen_session: 0,
            utterance: 0,
        }
    }

    /// Start a listening session. Returns whether one was started.
    pub fn start_listening(&mut self) -> bool {
        if !self.recognizer.is_available() {
            return false;
        }

        self.listen_session += 1;
        match self.recognizer.start(self.listen_session, &self.locale) {
            Ok(()) => {
                self.is_listening = true;
                self.is_speaking = false;
                tracing::debug!(
                    locale = %self.locale,
                    session = self.listen_session,
                    "Listening for speech"
                );
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Speech recognition failed to start");
                false
            }
        }
    }

    /// Speak `text` with the catalog voice at `voice_index`, falling back to
    /// the default voice when the index is out of range
    pub fn speak(&mut self, text: &str, voice_index: usize) {
        if !self.synthesizer.is_available() {
            return;
        }

        self.utterance += 1;
        let voice = self.catalog.get(voice_index).cloned();
        if let Err(e) = self.synthesizer.speak(self.utterance, text, voice.as_ref()) {
            tracing::error!(error = %e, "Speech synthesis failed");
            self.is_speaking = false;
        }
    }

    /// Cancel recognition and synthesis. Safe to call when idle.
    ///
    /// Events still queued from the cancelled sessions are ignored afterwards.
    pub fn stop_all(&mut self) {
        self.recognizer.stop();
        self.synthesizer.cancel();
        self.listen_session += 1;
        self.utterance += 1;
        self.is_listening = false;
        self.is_speaking = false;
    }

    /// Replace the whole catalog with what the synthesizer reports now
    pub fn refresh_voices(&mut self) {
        self.catalog = self.synthesizer.voices();
        tracing::debug!(count = self.catalog.len(), "Voice catalog refreshed");
    }

    /// Update listening state. Returns `false` for events from an earlier
    /// session, which are dropped. The transcript itself is handled by the
    /// caller.
    pub fn on_recognition_event(&mut self, event: &RecognitionEvent) -> bool {
        if event.session() != self.listen_session {
            tracing::debug!(
                session = event.session(),
                current = self.listen_session,
                "Dropping stale recognition event"
            );
            return false;
        }

        match event {
            RecognitionEvent::Result(..) => {}
            RecognitionEvent::Error(_, reason) => {
                tracing::error!(reason = %reason, "Speech recognition error");
            }
            RecognitionEvent::Ended(_) => {
                self.is_listening = false;
            }
        }
        true
    }

    pub fn on_synthesis_event(&mut self, event: &SynthesisEvent) {
        if let Some(session) = event.session() {
            if session != self.utterance {
                tracing::debug!(
                    session,
                    current = self.utterance,
                    "Dropping stale synthesis event"
                );
                return;
            }
        }

        match event {
            SynthesisEvent::Started(_) => self.is_speaking = true,
            SynthesisEvent::Ended(_) => self.is_speaking = false,
            SynthesisEvent::Error(_, reason) => {
                tracing::warn!(reason = %reason, "Speech synthesis error");
                self.is_speaking = false;
            }
            SynthesisEvent::VoicesChanged => self.refresh_voices(),
        }
    }

    pub fn voices(&self) -> &[Voice] {
        &self.catalog
    }

    pub fn is_listening(&self) -> bool {
        self.is_listening
    }

    pub fn is_speaking(&self) -> bool {
        self.is_speaking
    }

    pub fn can_listen(&self) -> bool {
        self.recognizer.is_available()
    }

    pub fn can_speak(&self) -> bool {
        self.synthesizer.is_available()
    }

    /// Session id of the latest listening session
    pub fn listen_session(&self) -> SessionId {
        self.listen_session
    }

    /// Session id of the latest utterance
    pub fn utterance(&self) -> SessionId {
        self.utterance
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Recognizer that records calls
    #[derive(Clone, Default)]
    pub struct FakeRecognizer {
        pub starts: Arc<Mutex<Vec<String>>>,
        pub stops: Arc<Mutex<usize>>,
    }

    impl SpeechRecognizer for FakeRecognizer {
        fn is_available(&self) -> bool {
            true
        }

        fn start(&mut self, _session: SessionId, locale: &str) -> Result<(), VoiceError> {
            self.starts.lock().unwrap().push(locale.to_string());
            Ok(())
        }

        fn stop(&mut self) {
            *self.stops.lock().unwrap() += 1;
        }
    }

    /// Synthesizer that records what it was asked to say
    #[derive(Clone, Default)]
    pub struct FakeSynthesizer {
        pub catalog: Arc<Mutex<Vec<Voice>>>,
        pub spoken: Arc<Mutex<Vec<(String, Option<Voice>)>>>,
        pub cancels: Arc<Mutex<usize>>,
    }

    impl FakeSynthesizer {
        pub fn with_voices(voices: Vec<Voice>) -> Self {
            Self {
                catalog: Arc::new(Mutex::new(voices)),
                ..Self::default()
            }
        }

        pub fn spoken(&self) -> Vec<(String, Option<Voice>)> {
            self.spoken.lock().unwrap().clone()
        }
    }

    impl SpeechSynthesizer for FakeSynthesizer {
        fn is_available(&self) -> bool {
            true
        }

        fn voices(&self) -> Vec<Voice> {
            self.catalog.lock().unwrap().clone()
        }

        fn speak(
            &mut self,
            _session: SessionId,
            text: &str,
            voice: Option<&Voice>,
        ) -> Result<(), VoiceError> {
            self.spoken
                .lock()
                .unwrap()
                .push((text.to_string(), voice.cloned()));
            Ok(())
        }

        fn cancel(&mut self) {
            *self.cancels.lock().unwrap() += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::{FakeRecognizer, FakeSynthesizer};
    use super::*;

    fn adapter_with(voices: Vec<Voice>) -> (VoiceAdapter, FakeRecognizer, FakeSynthesizer) {
        let recognizer = FakeRecognizer::default();
        let synthesizer = FakeSynthesizer::with_voices(voices);
        let adapter = VoiceAdapter::new(
            Box::new(recognizer.clone()),
            Box::new(synthesizer.clone()),
            "en-US",
        );
        (adapter, recognizer, synthesizer)
    }

    #[test]
    fn test_unsupported_capabilities_are_no_ops() {
        let mut adapter = VoiceAdapter::new(
            Box::new(UnsupportedRecognizer),
            Box::new(UnsupportedSynthesizer),
            "en-US",
        );
        assert!(!adapter.can_listen());
        assert!(!adapter.can_speak());
        assert!(!adapter.start_listening());
        adapter.speak("hello", 0);
        adapter.stop_all();
        assert!(!adapter.is_listening());
        assert!(!adapter.is_speaking());
    }

    #[test]
    fn test_start_listening_uses_locale() {
        let (mut adapter, recognizer, _) = adapter_with(vec![]);
        assert!(adapter.start_listening());
        assert!(adapter.is_listening());
        assert_eq!(*recognizer.starts.lock().unwrap(), vec!["en-US".to_string()]);

        let session = adapter.listen_session();
        assert!(adapter.on_recognition_event(&RecognitionEvent::Result(session, "hi".to_string())));
        assert!(adapter.is_listening());
        assert!(adapter.on_recognition_event(&RecognitionEvent::Ended(session)));
        assert!(!adapter.is_listening());
    }

    #[test]
    fn test_speak_selects_voice_by_index() {
        let voices = vec![Voice::new("alice", "en-US"), Voice::new("bert", "de-DE")];
        let (mut adapter, _, synthesizer) = adapter_with(voices);
        adapter.speak("hallo", 1);
        adapter.speak("hello", 7);

        let spoken = synthesizer.spoken();
        assert_eq!(spoken[0], ("hallo".to_string(), Some(Voice::new("bert", "de-DE"))));
        assert_eq!(spoken[1], ("hello".to_string(), None));
    }

    #[test]
    fn test_speaking_state_follows_events() {
        let (mut adapter, _, _) = adapter_with(vec![]);
        adapter.speak("one", 0);
        let first = adapter.utterance();
        adapter.on_synthesis_event(&SynthesisEvent::Started(first));
        assert!(adapter.is_speaking());
        adapter.on_synthesis_event(&SynthesisEvent::Ended(first));
        assert!(!adapter.is_speaking());

        adapter.speak("two", 0);
        let second = adapter.utterance();
        adapter.on_synthesis_event(&SynthesisEvent::Started(second));
        adapter.on_synthesis_event(&SynthesisEvent::Error(second, "device busy".to_string()));
        assert!(!adapter.is_speaking());
    }

    #[test]
    fn test_stop_all_is_idempotent() {
        let (mut adapter, recognizer, synthesizer) = adapter_with(vec![]);
        adapter.stop_all();
        adapter.stop_all();
        assert!(!adapter.is_listening());
        assert!(!adapter.is_speaking());
        assert_eq!(*recognizer.stops.lock().unwrap(), 2);
        assert_eq!(*synthesizer.cancels.lock().unwrap(), 2);

        adapter.start_listening();
        adapter.speak("hello", 0);
        adapter.on_synthesis_event(&SynthesisEvent::Started(adapter.utterance()));
        adapter.stop_all();
        assert!(!adapter.is_listening());
        assert!(!adapter.is_speaking());
    }

    #[test]
    fn test_restart_after_stop_ignores_old_session() {
        let (mut adapter, _, _) = adapter_with(vec![]);
        assert!(adapter.start_listening());
        let old = adapter.listen_session();
        adapter.stop_all();
        assert!(adapter.start_listening());

        // Queued from the stopped session
        assert!(!adapter.on_recognition_event(&RecognitionEvent::Ended(old)));
        assert!(!adapter.on_recognition_event(&RecognitionEvent::Result(old, "late".to_string())));
        assert!(adapter.is_listening());

        assert!(adapter.on_recognition_event(&RecognitionEvent::Ended(adapter.listen_session())));
        assert!(!adapter.is_listening());
    }

    #[test]
    fn test_cancelled_utterance_does_not_end_the_next() {
        let (mut adapter, _, _) = adapter_with(vec![]);
        adapter.speak("first", 0);
        let first = adapter.utterance();
        adapter.on_synthesis_event(&SynthesisEvent::Started(first));
        adapter.stop_all();

        adapter.speak("second", 0);
        adapter.on_synthesis_event(&SynthesisEvent::Started(adapter.utterance()));
        adapter.on_synthesis_event(&SynthesisEvent::Ended(first));
        assert!(adapter.is_speaking());
    }

    #[test]
    fn test_voices_changed_replaces_catalog() {
        let (mut adapter, _, synthesizer) = adapter_with(vec![]);
        assert!(adapter.voices().is_empty());

        *synthesizer.catalog.lock().unwrap() =
            vec![Voice::new("a", "en-US"), Voice::new("b", "en-GB")];
        adapter.on_synthesis_event(&SynthesisEvent::VoicesChanged);
        assert_eq!(adapter.voices().len(), 2);

        *synthesizer.catalog.lock().unwrap() = vec![Voice::new("c", "fr-FR")];
        adapter.on_synthesis_event(&SynthesisEvent::VoicesChanged);
        assert_eq!(adapter.voices(), &[Voice::new("c", "fr-FR")]);
    }

    #[test]
    fn test_voice_label() {
        assert_eq!(Voice::new("alice", "en-US").label(), "alice (en-US)");
    }
}
