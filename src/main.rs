use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use voxchat::chat::ChatController;
use voxchat::client::ChatClient;
use voxchat::config::Config;
use voxchat::identity::UserIdentity;
use voxchat::ui::app::{init_terminal, restore_terminal};
use voxchat::ui::conversation::ConversationManager;
use voxchat::ui::{run, Channels};
use voxchat::voice::{
    CommandRecognizer, CommandSynthesizer, RecognitionEvent, SpeechRecognizer,
    SpeechSynthesizer, SynthesisEvent, UnsupportedRecognizer, UnsupportedSynthesizer,
    VoiceAdapter,
};

const VOICE_LIST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "voxchat")]
#[command(version = "0.1.0")]
#[command(about = "Chat with a backend bot by keyboard or voice", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message and print the reply
    Send { message: String },
    /// Print the user id sent with every message
    Whoami,
    /// List the voices available for spoken replies
    Voices,
}

fn init_logging(log_file: Option<&Path>, default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            registry
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => {
            registry
                .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}

/// Pick program-backed speech capabilities where configured
fn build_voice(
    config: &Config,
    recognition_tx: mpsc::UnboundedSender<RecognitionEvent>,
    synthesis_tx: mpsc::UnboundedSender<SynthesisEvent>,
) -> VoiceAdapter {
    let speech = &config.speech;

    let recognizer: Box<dyn SpeechRecognizer> = match &speech.recognizer_command {
        Some(argv) if !argv.is_empty() => {
            Box::new(CommandRecognizer::new(argv.clone(), recognition_tx))
        }
        _ => Box::new(UnsupportedRecognizer),
    };

    let synthesizer: Box<dyn SpeechSynthesizer> = match &speech.synthesizer_command {
        Some(argv) if !argv.is_empty() => {
            let synthesizer = CommandSynthesizer::new(
                argv.clone(),
                speech.synthesizer_voice_args.clone(),
                speech.voices.clone(),
                synthesis_tx,
            );
            if let Some(list_argv) = &speech.voices_command {
                if let Err(e) = synthesizer.load_voices(list_argv.clone()) {
                    tracing::warn!(error = %e, "Ignoring voices_command");
                }
            }
            Box::new(synthesizer)
        }
        _ => Box::new(UnsupportedSynthesizer),
    };

    VoiceAdapter::new(recognizer, synthesizer, speech.locale.clone())
}

async fn run_chat(config: Config, user: UserIdentity) -> Result<()> {
    let (app_tx, app_rx) = mpsc::unbounded_channel();
    let (recognition_tx, recognition_rx) = mpsc::unbounded_channel();
    let (synthesis_tx, synthesis_rx) = mpsc::unbounded_channel();

    let voice = build_voice(&config, recognition_tx, synthesis_tx);
    let chat = ChatController::new(voice, config.speech.selected_voice);
    let client = ChatClient::new(&config)?;
    let tick_rate = Duration::from_millis(config.ui.tick_rate_ms.max(1));

    tracing::info!(endpoint = %client.endpoint(), user_id = %user, "Starting chat");

    let manager = ConversationManager::new(chat, client, user, config, app_tx);
    let channels = Channels {
        app_rx,
        recognition_rx,
        synthesis_rx,
    };

    let mut terminal = init_terminal()?;
    let result = run(&mut terminal, manager, channels, tick_rate).await;
    restore_terminal(&mut terminal)?;
    result
}

async fn send_once(config: &Config, user: &UserIdentity, message: &str) -> Result<()> {
    let client = ChatClient::new(config)?;
    let reply = client
        .send_message(message, user)
        .await
        .with_context(|| format!("Failed to reach {}", client.endpoint()))?;
    println!("{}", reply);
    Ok(())
}

async fn list_voices(config: &Config) -> Result<()> {
    let (recognition_tx, _recognition_rx) = mpsc::unbounded_channel();
    let (synthesis_tx, mut synthesis_rx) = mpsc::unbounded_channel();
    let mut voice = build_voice(config, recognition_tx, synthesis_tx);

    if !voice.can_speak() {
        println!("🔇 No synthesizer configured. Set speech.synthesizer_command in config.toml");
        return Ok(());
    }

    if config.speech.voices_command.is_some() {
        if let Ok(Some(event)) = tokio::time::timeout(VOICE_LIST_TIMEOUT, synthesis_rx.recv()).await {
            voice.on_synthesis_event(&event);
        }
    }

    if voice.voices().is_empty() {
        println!("🔊 Only the default voice is available");
        return Ok(());
    }

    println!("🔊 Voices:\n");
    for (index, v) in voice.voices().iter().enumerate() {
        let marker = if index == config.speech.selected_voice { "●" } else { " " };
        println!("  {} {:>2}  {}", marker, index, v.label());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        None => {
            init_logging(Some(config.log_path().as_path()), "info")?;
            let user = UserIdentity::load_or_create(&config.home)?;
            run_chat(config, user).await
        }
        Some(Commands::Send { message }) => {
            init_logging(None, "warn")?;
            let user = UserIdentity::load_or_create(&config.home)?;
            send_once(&config, &user, &message).await
        }
        Some(Commands::Whoami) => {
            init_logging(None, "warn")?;
            let user = UserIdentity::load_or_create(&config.home)?;
            println!("{}", user);
            Ok(())
        }
        Some(Commands::Voices) => {
            init_logging(None, "warn")?;
            list_voices(&config).await
        }
    }
}
