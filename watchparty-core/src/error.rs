use thiserror::Error;

use crate::protocol::ServerEvent;

/// Message shown to joins for unknown room codes and for private rooms
/// without a valid password, so private rooms cannot be enumerated.
pub const CONCEALED_JOIN_FAILURE: &str = "Room not found or incorrect password";

#[derive(Error, Debug)]
pub enum Error {
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    #[error("Incorrect room password")]
    InvalidPassword,

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Invalid poll: {0}")]
    InvalidPoll(String),

    #[error("Poll not found: {0}")]
    PollNotFound(String),

    #[error("Poll is closed")]
    PollClosed,

    #[error("Invalid poll option: {0}")]
    InvalidOption(String),

    #[error("Invalid content: {0}")]
    InvalidContent(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Room is full")]
    RoomFull,

    #[error("Not in a room")]
    NotInRoom,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Poll failures travel on `poll:error`, everything else on `room:error`.
    #[must_use]
    pub const fn is_poll_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidPoll(_) | Self::PollNotFound(_) | Self::PollClosed | Self::InvalidOption(_)
        )
    }

    /// Message that is safe to show to the client that caused the error.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::RoomNotFound(code) => format!("Room {code} not found"),
            Self::InvalidPassword => CONCEALED_JOIN_FAILURE.to_string(),
            Self::NotAuthorized(msg)
            | Self::InvalidPoll(msg)
            | Self::InvalidContent(msg)
            | Self::InvalidInput(msg) => msg.clone(),
            Self::PollNotFound(_) => "Poll not found".to_string(),
            Self::PollClosed => "This poll is closed".to_string(),
            Self::InvalidOption(_) => "Invalid poll option".to_string(),
            Self::RoomFull => "Room is full".to_string(),
            Self::NotInRoom => "You are not in a room".to_string(),
            Self::Serialization(_) => "Malformed message".to_string(),
            Self::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                "Internal error".to_string()
            }
        }
    }

    /// Convert into the unicast error event sent back to the originating client.
    #[must_use]
    pub fn into_server_event(self) -> ServerEvent {
        let message = self.client_message();
        if self.is_poll_error() {
            ServerEvent::PollError { message }
        } else {
            ServerEvent::RoomError { message }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
