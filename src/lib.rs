//! Voice-enabled terminal chat client.

pub mod chat;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod input_mode;
pub mod render;
pub mod session;
pub mod ui;
pub mod voice;
