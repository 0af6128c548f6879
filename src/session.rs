use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Title shown for a thread whose first user message was empty
pub const UNTITLED: &str = "New Chat";

const TITLE_MAX_CHARS: usize = 20;
const TITLE_KEEP_CHARS: usize = 17;

pub type ThreadId = u64;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    User,
    Bot,
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::User,
            text: text.into(),
            sent_at: Utc::now(),
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Bot,
            text: text.into(),
            sent_at: Utc::now(),
        }
    }
}

/// One independent conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatThread {
    pub id: ThreadId,
    pub title: String,
    pub messages: Vec<Message>,
}

impl ChatThread {
    fn new(id: ThreadId, title: String) -> Self {
        Self {
            id,
            title,
            messages: Vec::new(),
        }
    }

    fn has_user_message(&self) -> bool {
        self.messages.iter().any(|m| m.kind == MessageKind::User)
    }

    /// Most recent bot message, if any
    pub fn last_bot_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.kind == MessageKind::Bot)
    }
}

/// Derive a sidebar title from the first user message of a thread
pub fn derive_title(text: &str) -> String {
    if text.is_empty() {
        return UNTITLED.to_string();
    }

    if text.chars().count() > TITLE_MAX_CHARS {
        let head: String = text.chars().take(TITLE_KEEP_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Holds every chat thread and which one is active.
///
/// The active id always names an existing thread.
#[derive(Debug, Clone)]
pub struct SessionStore {
    threads: Vec<ChatThread>,
    active: ThreadId,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// A store with a single empty thread, already active
    pub fn new() -> Self {
        Self {
            threads: vec![ChatThread::new(1, UNTITLED.to_string())],
            active: 1,
        }
    }

    /// Allocate a new thread and make it active
    pub fn create_thread(&mut self) -> ThreadId {
        let id = self.threads.iter().map(|t| t.id).max().map_or(1, |max| max + 1);
        self.threads.push(ChatThread::new(id, format!("Chat {}", id)));
        self.active = id;
        tracing::debug!(thread_id = id, "Created chat thread");
        id
    }

    /// Make `id` the active thread. `id` must exist.
    pub fn select_thread(&mut self, id: ThreadId) {
        debug_assert!(self.thread(id).is_some(), "unknown thread {}", id);
        if self.thread(id).is_none() {
            tracing::warn!(thread_id = id, "Ignoring selection of unknown thread");
            return;
        }
        self.active = id;
    }

    /// Append to the identified thread, retitling on its first user message
    pub fn append_message(&mut self, thread_id: ThreadId, message: Message) {
        let Some(thread) = self.threads.iter_mut().find(|t| t.id == thread_id) else {
            tracing::warn!(thread_id, "Dropping message for unknown thread");
            return;
        };

        if message.kind == MessageKind::User && !thread.has_user_message() {
            thread.title = derive_title(&message.text);
        }

        thread.messages.push(message);
    }

    pub fn active_id(&self) -> ThreadId {
        self.active
    }

    pub fn active_thread(&self) -> &ChatThread {
        self.thread(self.active).unwrap_or_else(|| &self.threads[0])
    }

    pub fn thread(&self, id: ThreadId) -> Option<&ChatThread> {
        self.threads.iter().find(|t| t.id == id)
    }

    /// Threads in creation order
    pub fn threads(&self) -> &[ChatThread] {
        &self.threads
    }
}
