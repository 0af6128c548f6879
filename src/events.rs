use crate::chat::PendingTurn;
use crate::error::ClientError;

/// Internal application events delivered to the UI loop
#[derive(Debug)]
pub enum AppEvent {
    /// The backend answered (or failed to answer) a submitted turn
    ReplyReceived {
        turn: PendingTurn,
        result: Result<String, ClientError>,
    },
}
