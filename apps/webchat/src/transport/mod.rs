use std::fmt;
use thiserror::Error;

pub mod mock;
pub mod websocket;

/// Close code reported when the socket ends without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;
/// Close code reported for a close frame that carried no status.
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// Lifecycle of the single chat connection. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Uninitialized,
    Open,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Uninitialized => "not connected",
            ConnectionState::Open => "connected",
            ConnectionState::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// Everything the socket reports back to the session, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened { url: String },
    Frame(String),
    Closed { code: u16 },
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: Box<tokio_tungstenite::tungstenite::Error>,
    },
    #[error("not connected")]
    NotConnected,
}

/// Outbound half of a chat connection.
pub trait Outbound {
    fn state(&self) -> ConnectionState;

    /// Queue `text` as one text frame. Fails with
    /// [`ConnectionError::NotConnected`] unless the connection is open.
    fn send_text(&self, text: String) -> Result<(), ConnectionError>;

    fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }
}
