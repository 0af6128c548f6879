//! Terminal front end

pub mod app;
pub mod conversation;

pub use app::{run, Channels};
