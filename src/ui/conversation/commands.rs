use std::str::FromStr;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands that can be invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Start a new chat thread
    New,
    /// Switch to another chat thread
    Chat,
    /// Dictate the next message
    Listen,
    /// Stop listening and speaking
    Stop,
    /// Pick the voice used for spoken replies
    Voice,
    /// Open a link from the latest reply
    Open,
    /// Show help
    Help,
    /// Exit the application
    Bye,
}

pub fn command_entries() -> Vec<CommandEntry> {
    SlashCommand::iter()
        .map(|command| CommandEntry {
            command,
            keyword: command.command(),
            description: command.description(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    pub command: SlashCommand,
    pub keyword: &'static str,
    pub description: &'static str,
}

impl ParsedCommand {
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    /// Numeric argument, e.g. `/chat 3`
    pub fn number(&self) -> Option<u64> {
        self.argument()?.trim().parse().ok()
    }
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::New => "start a new chat",
            SlashCommand::Chat => "switch to chat <id>",
            SlashCommand::Listen => "dictate the next message",
            SlashCommand::Stop => "stop listening and speaking",
            SlashCommand::Voice => "list voices, or pick voice <n> for replies",
            SlashCommand::Open => "open link <n> from the latest reply",
            SlashCommand::Help => "show available commands",
            SlashCommand::Bye => "exit the application",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let body = input.strip_prefix('/')?;

    let mut parts = body.split_whitespace();
    let head = parts.next()?;
    let rest: Vec<String> = parts.map(|s| s.to_string()).collect();

    let command = SlashCommand::from_str(head).ok().or_else(|| match head.to_lowercase().as_str() {
        "q" | "quit" | "exit" => Some(SlashCommand::Bye),
        "n" => Some(SlashCommand::New),
        "c" | "switch" => Some(SlashCommand::Chat),
        "mic" | "l" => Some(SlashCommand::Listen),
        "s" => Some(SlashCommand::Stop),
        "voices" | "v" => Some(SlashCommand::Voice),
        "o" | "link" => Some(SlashCommand::Open),
        "h" | "?" => Some(SlashCommand::Help),
        _ => None,
    })?;

    let argument = if rest.is_empty() {
        None
    } else {
        Some(rest.join(" "))
    };

    Some(ParsedCommand { command, argument })
}

/// Get help text for all available commands
pub fn get_help_text() -> String {
    let mut help = String::from("Available commands:\n\n");
    for entry in command_entries() {
        help.push_str(&format!("/{} - {}\n", entry.keyword, entry.description));
    }

    help.push_str("\nKeys: Enter send, Ctrl+N new chat, Ctrl+L listen, Ctrl+S stop,");
    help.push_str("\nAlt+Up/Down switch chat, PgUp/PgDn scroll, Ctrl+C quit");

    help
}
