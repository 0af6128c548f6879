//! Speech capabilities backed by external programs.

use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use super::{
    RecognitionEvent, SessionId, SpeechRecognizer, SpeechSynthesizer, SynthesisEvent, Voice,
};
use crate::error::VoiceError;

fn build_command(argv: &[String]) -> Result<Command, VoiceError> {
    let (program, args) = argv.split_first().ok_or(VoiceError::EmptyCommand)?;
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::piped())
        .stdout(Stdio::piped())
        .kill_on_drop(true);
    Ok(cmd)
}

fn substitute(args: &[String], placeholder: &str, value: &str) -> Vec<String> {
    args.iter().map(|a| a.replace(placeholder, value)).collect()
}

fn is_running(task: &Option<JoinHandle<()>>) -> bool {
    task.as_ref().is_some_and(|t| !t.is_finished())
}

/// Runs a program that records one utterance and prints its transcript
pub struct CommandRecognizer {
    argv: Vec<String>,
    events: UnboundedSender<RecognitionEvent>,
    session: SessionId,
    task: Option<JoinHandle<()>>,
}

impl CommandRecognizer {
    pub fn new(argv: Vec<String>, events: UnboundedSender<RecognitionEvent>) -> Self {
        Self {
            argv,
            events,
            session: 0,
            task: None,
        }
    }
}

impl SpeechRecognizer for CommandRecognizer {
    fn is_available(&self) -> bool {
        !self.argv.is_empty()
    }

    fn start(&mut self, session: SessionId, locale: &str) -> Result<(), VoiceError> {
        if is_running(&self.task) {
            return Err(VoiceError::AlreadyListening);
        }

        let argv = substitute(&self.argv, "{locale}", locale);
        let mut cmd = build_command(&argv)?;
        let program = argv[0].clone();
        let events = self.events.clone();
        self.session = session;

        self.task = Some(tokio::spawn(async move {
            match cmd.output().await {
                Ok(output) if output.status.success() => {
                    let stdout = String::from_utf8_lossy(&output.stdout);
                    match stdout.lines().map(str::trim).find(|l| !l.is_empty()) {
                        Some(transcript) => {
                            let transcript = transcript.to_string();
                            let _ = events.send(RecognitionEvent::Result(session, transcript));
                        }
                        None => {
                            let reason = "no-speech".to_string();
                            let _ = events.send(RecognitionEvent::Error(session, reason));
                        }
                    }
                }
                Ok(output) => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    let reason =
                        format!("{} exited with {}: {}", program, output.status, stderr.trim());
                    let _ = events.send(RecognitionEvent::Error(session, reason));
                }
                Err(e) => {
                    let reason = format!("{}: {}", program, e);
                    let _ = events.send(RecognitionEvent::Error(session, reason));
                }
            }
            let _ = events.send(RecognitionEvent::Ended(session));
        }));

        Ok(())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            if !task.is_finished() {
                task.abort();
                let _ = self.events.send(RecognitionEvent::Ended(self.session));
            }
        }
    }
}

/// Speaks through a text-to-speech program such as `espeak-ng` or `say`
pub struct CommandSynthesizer {
    argv: Vec<String>,
    voice_args: Vec<String>,
    catalog: Arc<Mutex<Vec<Voice>>>,
    events: UnboundedSender<SynthesisEvent>,
    utterance: SessionId,
    task: Option<JoinHandle<()>>,
}

impl CommandSynthesizer {
    pub fn new(
        argv: Vec<String>,
        voice_args: Vec<String>,
        voices: Vec<Voice>,
        events: UnboundedSender<SynthesisEvent>,
    ) -> Self {
        Self {
            argv,
            voice_args,
            catalog: Arc::new(Mutex::new(voices)),
            events,
            utterance: 0,
            task: None,
        }
    }

    /// Populate the catalog from a program that prints `name locale` lines.
    ///
    /// Runs in the background; `VoicesChanged` is sent once the list is in.
    pub fn load_voices(&self, argv: Vec<String>) -> Result<(), VoiceError> {
        let mut cmd = build_command(&argv)?;
        let catalog = Arc::clone(&self.catalog);
        let events = self.events.clone();

        tokio::spawn(async move {
            match cmd.output().await {
                Ok(output) if output.status.success() => {
                    let voices = parse_voice_list(&String::from_utf8_lossy(&output.stdout));
                    if let Ok(mut guard) = catalog.lock() {
                        *guard = voices;
                    }
                    let _ = events.send(SynthesisEvent::VoicesChanged);
                }
                Ok(output) => {
                    tracing::warn!(status = %output.status, "Voice listing command failed");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Could not run voice listing command");
                }
            }
        });

        Ok(())
    }

    fn args_for(&self, text: &str, voice: Option<&Voice>) -> Vec<String> {
        let mut argv = self.argv.clone();
        if let Some(voice) = voice {
            argv.extend(substitute(&self.voice_args, "{voice}", &voice.name));
        }
        argv.push(text.to_string());
        argv
    }
}

/// Parse `name locale` lines; a missing locale is left empty
pub fn parse_voice_list(output: &str) -> Vec<Voice> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let name = parts.next()?;
            let locale = parts.next().unwrap_or_default();
            Some(Voice::new(name, locale))
        })
        .collect()
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn is_available(&self) -> bool {
        !self.argv.is_empty()
    }

    fn voices(&self) -> Vec<Voice> {
        self.catalog
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn speak(
        &mut self,
        session: SessionId,
        text: &str,
        voice: Option<&Voice>,
    ) -> Result<(), VoiceError> {
        self.cancel();

        let argv = self.args_for(text, voice);
        let mut cmd = build_command(&argv)?;
        let program = argv[0].clone();
        let child = cmd.spawn().map_err(|source| VoiceError::Spawn {
            program: program.clone(),
            source,
        })?;
        let events = self.events.clone();
        self.utterance = session;
        let _ = events.send(SynthesisEvent::Started(session));

        self.task = Some(tokio::spawn(async move {
            match child.wait_with_output().await {
                Ok(output) if output.status.success() => {
                    let _ = events.send(SynthesisEvent::Ended(session));
                }
                Ok(output) => {
                    let reason = format!("{} exited with {}", program, output.status);
                    let _ = events.send(SynthesisEvent::Error(session, reason));
                }
                Err(e) => {
                    let _ = events.send(SynthesisEvent::Error(session, e.to_string()));
                }
            }
        }));

        Ok(())
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            if !task.is_finished() {
                task.abort();
                let _ = self.events.send(SynthesisEvent::Ended(self.utterance));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::{UnsupportedSynthesizer, VoiceAdapter};
    use tokio::sync::mpsc;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_parse_voice_list() {
        let voices = parse_voice_list("alice en-US\n\nbert de-DE extra\nsolo\n");
        assert_eq!(
            voices,
            vec![
                Voice::new("alice", "en-US"),
                Voice::new("bert", "de-DE"),
                Voice::new("solo", ""),
            ]
        );
    }

    #[test]
    fn test_args_include_voice_only_when_selected() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let synth = CommandSynthesizer::new(
            vec!["espeak-ng".to_string()],
            vec!["-v".to_string(), "{voice}".to_string()],
            vec![],
            tx,
        );
        assert_eq!(synth.args_for("hi", None), vec!["espeak-ng", "hi"]);
        assert_eq!(
            synth.args_for("hi", Some(&Voice::new("de", "de-DE"))),
            vec!["espeak-ng", "-v", "de", "hi"]
        );
    }

    #[test]
    fn test_empty_command_is_unavailable() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let recognizer = CommandRecognizer::new(vec![], tx);
        assert!(!recognizer.is_available());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_recognizer_reports_transcript_then_ends() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut recognizer = CommandRecognizer::new(sh("echo \"hello from {locale}\""), tx);
        recognizer.start(1, "en-US").unwrap();

        assert_eq!(
            rx.recv().await,
            Some(RecognitionEvent::Result(1, "hello from en-US".to_string()))
        );
        assert_eq!(rx.recv().await, Some(RecognitionEvent::Ended(1)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_recognizer_failure_is_an_error_event() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut recognizer = CommandRecognizer::new(sh("echo mic busy >&2; exit 3"), tx);
        recognizer.start(1, "en-US").unwrap();

        match rx.recv().await {
            Some(RecognitionEvent::Error(1, reason)) => assert!(reason.contains("mic busy")),
            other => panic!("expected error, got {:?}", other),
        }
        assert_eq!(rx.recv().await, Some(RecognitionEvent::Ended(1)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_recognizer_stop_ends_session() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut recognizer = CommandRecognizer::new(sh("sleep 5; echo late"), tx);
        recognizer.start(1, "en-US").unwrap();
        assert!(matches!(
            recognizer.start(2, "en-US"),
            Err(VoiceError::AlreadyListening)
        ));

        recognizer.stop();
        recognizer.stop();
        assert_eq!(rx.recv().await, Some(RecognitionEvent::Ended(1)));
        assert!(rx.try_recv().is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_synthesizer_start_and_end() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut synth = CommandSynthesizer::new(sh("true"), vec![], vec![], tx);
        synth.speak(1, "hello", None).unwrap();

        assert_eq!(rx.recv().await, Some(SynthesisEvent::Started(1)));
        assert_eq!(rx.recv().await, Some(SynthesisEvent::Ended(1)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_synthesizer_cancel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut synth = CommandSynthesizer::new(sh("sleep 5"), vec![], vec![], tx);
        synth.speak(1, "a long answer", None).unwrap();
        synth.cancel();
        synth.cancel();

        assert_eq!(rx.recv().await, Some(SynthesisEvent::Started(1)));
        assert_eq!(rx.recv().await, Some(SynthesisEvent::Ended(1)));
        assert!(rx.try_recv().is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_listening_again_after_stop_stays_listening() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let recognizer = CommandRecognizer::new(sh("sleep 5; echo late"), tx);
        let mut adapter =
            VoiceAdapter::new(Box::new(recognizer), Box::new(UnsupportedSynthesizer), "en-US");

        assert!(adapter.start_listening());
        adapter.stop_all();
        assert!(adapter.start_listening());

        while let Ok(event) = rx.try_recv() {
            adapter.on_recognition_event(&event);
        }
        assert!(adapter.is_listening());
        adapter.stop_all();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_load_voices_replaces_catalog() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let synth = CommandSynthesizer::new(
            sh("true"),
            vec![],
            vec![Voice::new("old", "en-US")],
            tx,
        );
        synth
            .load_voices(sh("printf 'alice en-US\\nbert de-DE\\n'"))
            .unwrap();

        assert_eq!(rx.recv().await, Some(SynthesisEvent::VoicesChanged));
        assert_eq!(
            synth.voices(),
            vec![Voice::new("alice", "en-US"), Voice::new("bert", "de-DE")]
        );
    }
}
