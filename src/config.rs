use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::voice::Voice;

/// Endpoint used when the config file does not name one
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000/chat";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat backend endpoint (receives `{message, user_id}`)
    pub backend_url: String,

    /// Request timeout for the backend, in seconds
    pub request_timeout_secs: u64,

    /// Voxchat home directory
    #[serde(skip)]
    pub home: PathBuf,

    /// Speech input/output settings
    pub speech: SpeechConfig,

    /// UI preferences
    pub ui: UiConfig,
}

/// Speech capability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Locale passed to the recognizer
    pub locale: String,

    /// Program (and arguments) that records one utterance and prints the
    /// transcript on stdout. `{locale}` is substituted.
    pub recognizer_command: Option<Vec<String>>,

    /// Program (and arguments) that speaks the text appended as the final
    /// argument
    pub synthesizer_command: Option<Vec<String>>,

    /// Extra arguments inserted before the text when a voice is selected.
    /// `{voice}` is substituted with the voice name.
    pub synthesizer_voice_args: Vec<String>,

    /// Program that lists voices, one `name locale` pair per line
    pub voices_command: Option<Vec<String>>,

    /// Index into `voices` used for output
    pub selected_voice: usize,

    /// Voices offered by the synthesizer
    pub voices: Vec<Voice>,
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub show_timestamps: bool,
    pub tick_rate_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));

        Config {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            request_timeout_secs: 60,
            home: home.join(".voxchat"),
            speech: SpeechConfig::default(),
            ui: UiConfig::default(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            locale: "en-US".to_string(),
            recognizer_command: None,
            synthesizer_command: None,
            synthesizer_voice_args: Vec::new(),
            voices_command: None,
            selected_voice: 0,
            voices: Vec::new(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_timestamps: true,
            tick_rate_ms: 250,
        }
    }
}

impl Config {
    /// Load configuration from `~/.voxchat/config.toml`
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Self::load_from(&home.join(".voxchat"))
    }

    /// Load configuration from the given voxchat home directory
    pub fn load_from(voxchat_home: &Path) -> Result<Self> {
        let config_path = voxchat_home.join("config.toml");

        fs::create_dir_all(voxchat_home)
            .context("Failed to create .voxchat directory")?;

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            Self::parse(&content)?
        } else {
            Config::default()
        };

        config.home = voxchat_home.to_path_buf();

        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.home)
            .context("Failed to create .voxchat directory")?;
        let config_path = self.home.join("config.toml");
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .context("Failed to write config file")?;
        Ok(())
    }

    /// Log file used while the TUI owns the terminal
    pub fn log_path(&self) -> PathBuf {
        self.home.join("voxchat.log")
    }
}
